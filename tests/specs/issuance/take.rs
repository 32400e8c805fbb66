//! Issuance specs
//!
//! Drawing an advance moves pool funds into the wallet and registers
//! the liability. Refusals happen before any write and leave every
//! balance untouched.

use crate::prelude::*;

#[tokio::test]
async fn a_draw_moves_pool_funds_into_the_wallet() {
    let books = memory_books().await;
    let user = books.member("u-1", dec!(1000.00)).await;

    let issued = books
        .engine
        .take_advance(&user, dec!(500.00))
        .await
        .unwrap();

    assert_eq!(issued.new_balance, dec!(1500.00));
    assert_eq!(issued.advance.total_amount, dec!(500.00));
    assert_eq!(issued.advance.outstanding_amount, dec!(500.00));
    assert_eq!(issued.advance.status, AdvanceStatus::Active);
    assert_eq!(books.wallet_balance(&user).await, dec!(1500.00));

    let pool = books.pool().await;
    assert_eq!(pool.current_balance, dec!(1500.00));
    assert_eq!(pool.total_lent, dec!(500.00));
    assert!(pool.is_balanced());

    assert_eq!(
        books.notify.messages_on("advances"),
        vec!["advance s-2 issued to u-1 for 500.00"]
    );
}

#[tokio::test]
async fn a_second_draw_is_blocked_while_one_is_active() {
    let books = memory_books().await;
    let user = books.member("u-1", dec!(1000.00)).await;
    let first = books
        .engine
        .take_advance(&user, dec!(200.00))
        .await
        .unwrap();

    let err = books
        .engine
        .take_advance(&user, dec!(100.00))
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        EngineError::AdvanceAlreadyOutstanding { advance, .. } if *advance == first.advance.id
    ));
    assert!(err.is_business());

    // Nothing moved on the refused draw
    assert_eq!(books.wallet_balance(&user).await, dec!(1200.00));
    assert_eq!(books.pool().await.current_balance, dec!(1800.00));
}

#[tokio::test]
async fn draws_beyond_pool_liquidity_are_refused_without_writes() {
    let books = memory_books().await;
    let user = books.member("u-1", dec!(1000.00)).await;
    books.drain_pool(dec!(1700.00)).await;

    let err = books
        .engine
        .take_advance(&user, dec!(400.00))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::InsufficientLiquidity {
            available,
            requested,
        } if available == dec!(300.00) && requested == dec!(400.00)
    ));
    assert_eq!(books.wallet_balance(&user).await, dec!(1000.00));
    let pool = books.pool().await;
    assert_eq!(pool.current_balance, dec!(300.00));
    assert!(pool.is_balanced());
}
