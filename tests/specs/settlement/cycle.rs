//! Settlement cycle specs, run over the on-disk books.
//!
//! Each cycle collects the larger of the flat-rate amount and the
//! amortization-forcing amount, capped at what remains owed. Repayment
//! is opportunistic: an advance the wallet cannot cover is passed over
//! without failing the batch.

use crate::prelude::*;

#[tokio::test]
async fn the_weekly_cycle_follows_the_blended_formula() {
    let dir = TempDir::new().unwrap();
    let books = disk_books(&dir.path().join("books")).await;
    let user = books.member("u-1", dec!(1000.00)).await;
    books
        .engine
        .take_advance(&user, dec!(500.00))
        .await
        .unwrap();
    books.clock.advance(Duration::days(8));

    let report = books.engine.run_settlement().await.unwrap();

    assert_eq!(report.cycle, "2026-03-10");
    assert_eq!(report.processed.len(), 1);
    let settled = &report.processed[0];
    // 20% of the 1500.00 wallet beats the forced 500/3 installment
    assert_eq!(settled.amount, dec!(300.00));
    assert_eq!(settled.outstanding_after, dec!(200.00));
    assert!(!settled.repaid);
    assert!(report.skipped.is_empty());
    assert!(report.errors.is_empty());

    assert_eq!(books.wallet_balance(&user).await, dec!(1200.00));
    let pool = books.pool().await;
    assert_eq!(pool.current_balance, dec!(1800.00));
    assert_eq!(pool.total_repaid, dec!(300.00));
    assert!(pool.is_balanced());

    let records = books
        .store
        .repayments_for(&settled.advance_id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reference, "s-2:2026-03-10");
}

#[tokio::test]
async fn an_empty_wallet_is_passed_over_without_failing_the_batch() {
    let dir = TempDir::new().unwrap();
    let books = disk_books(&dir.path().join("books")).await;
    let user = books.member("u-1", dec!(1000.00)).await;
    books
        .engine
        .take_advance(&user, dec!(500.00))
        .await
        .unwrap();
    books
        .store
        .debit(DebitRequest {
            user_id: user.clone(),
            amount: dec!(1500.00),
            reference: "spend:u-1".to_string(),
            kind: TransactionKind::Withdrawal,
            description: "card purchase".to_string(),
            metadata: BTreeMap::new(),
        })
        .await
        .unwrap();
    books.clock.advance(Duration::days(8));

    let report = books.engine.run_settlement().await.unwrap();

    assert!(report.processed.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::InsufficientFunds);
    assert!(report.errors.is_empty());

    assert_eq!(books.wallet_balance(&user).await, Decimal::ZERO);
    let advance = books
        .store
        .advance(&report.skipped[0].advance_id)
        .await
        .unwrap();
    assert_eq!(advance.outstanding_amount, dec!(500.00));
    assert_eq!(advance.status, AdvanceStatus::Active);
    assert_eq!(books.pool().await.total_repaid, Decimal::ZERO);
}

#[tokio::test]
async fn cycles_follow_until_the_advance_is_repaid() {
    let dir = TempDir::new().unwrap();
    let books = disk_books(&dir.path().join("books")).await;
    let user = books.member("u-1", dec!(1000.00)).await;
    books
        .engine
        .take_advance(&user, dec!(500.00))
        .await
        .unwrap();

    books.clock.advance(Duration::days(8));
    let first = books.engine.run_settlement().await.unwrap();
    assert_eq!(first.processed[0].amount, dec!(300.00));

    books.clock.advance(Duration::days(7));
    let second = books.engine.run_settlement().await.unwrap();
    assert_eq!(second.processed.len(), 1);
    assert_eq!(second.processed[0].amount, dec!(200.00));
    assert!(second.processed[0].repaid);

    let advance = books
        .store
        .advance(&second.processed[0].advance_id)
        .await
        .unwrap();
    assert_eq!(advance.status, AdvanceStatus::Repaid);
    assert_eq!(advance.outstanding_amount, Decimal::ZERO);
    assert!(advance.repaid_at.is_some());
    assert!(books
        .notify
        .messages_on("advances")
        .iter()
        .any(|m| m == "advance s-2 fully repaid"));

    let pool = books.pool().await;
    assert_eq!(pool.current_balance, dec!(2000.00));
    assert_eq!(pool.total_lent, dec!(500.00));
    assert_eq!(pool.total_repaid, dec!(500.00));
    assert!(pool.is_balanced());

    // Nothing left for later cycles
    books.clock.advance(Duration::days(7));
    let last = books.engine.run_settlement().await.unwrap();
    assert!(last.processed.is_empty());
    assert!(last.skipped.is_empty());
    assert!(last.errors.is_empty());
}
