//! Idempotent retry specs
//!
//! A saga step that times out has an unknown outcome. The retry layer
//! re-sends the same reference; the store either applies it now or
//! returns the recorded receipt, so a lost acknowledgement never moves
//! money twice.

use crate::prelude::*;

#[tokio::test]
async fn a_lost_acknowledgement_is_replayed_not_reapplied() {
    let books = memory_books().await;
    let user = books.member("u-1", dec!(1000.00)).await;
    // The credit lands but its response is lost
    books.store.fail_after(StoreOp::WalletCredit, 1);

    let issued = books
        .engine
        .take_advance(&user, dec!(300.00))
        .await
        .unwrap();

    // Seed credit, lost-ack credit, replayed credit
    assert_eq!(books.store.calls_for(StoreOp::WalletCredit), 3);
    assert_eq!(issued.new_balance, dec!(1300.00));
    assert_eq!(books.wallet_balance(&user).await, dec!(1300.00));

    let wallet = books.store.wallet_for_user(&user).await.unwrap();
    let transactions = books.store.transactions(&wallet.id).await.unwrap();
    assert_eq!(transactions.len(), 2);
}

#[tokio::test]
async fn a_real_outage_retries_until_the_write_lands() {
    let books = memory_books().await;
    let user = books.member("u-1", dec!(1000.00)).await;
    // One failed attempt, then the endpoint recovers
    books.store.fail_before(StoreOp::WalletCredit, 1);

    let issued = books
        .engine
        .take_advance(&user, dec!(300.00))
        .await
        .unwrap();

    assert_eq!(books.store.calls_for(StoreOp::WalletCredit), 3);
    assert_eq!(issued.new_balance, dec!(1300.00));
    let pool = books.pool().await;
    assert_eq!(pool.current_balance, dec!(1700.00));
    assert!(pool.is_balanced());

    let wallet = books.store.wallet_for_user(&user).await.unwrap();
    assert_eq!(books.store.transactions(&wallet.id).await.unwrap().len(), 2);
}
