//! Restart specs
//!
//! The on-disk books are the system of record. A restarted engine picks
//! up wallets, the pool, active advances, and every recorded reference,
//! so neither a crash nor a duplicated cycle can move money twice.

use crate::prelude::*;

#[tokio::test]
async fn the_books_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("books");
    {
        let books = disk_books(&path).await;
        let user = books.member("u-1", dec!(1000.00)).await;
        books
            .engine
            .take_advance(&user, dec!(500.00))
            .await
            .unwrap();
    }

    let store = JsonStore::open(&path).unwrap();
    let books = Books::open_at(store, opening_day() + Duration::days(8), "s2").await;
    let user = UserId("u-1".to_string());
    books.subs.subscribe(user.clone(), "basic");

    assert_eq!(books.wallet_balance(&user).await, dec!(1500.00));
    let active = books.store.all_active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].outstanding_amount, dec!(500.00));

    let availability = books.engine.availability(&user).await.unwrap();
    assert_eq!(availability.used, dec!(500.00));
    assert_eq!(availability.limit_remaining, Decimal::ZERO);
    assert_eq!(availability.available, Decimal::ZERO);

    // The next cycle settles against the reloaded records
    let report = books.engine.run_settlement().await.unwrap();
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].amount, dec!(300.00));
    assert_eq!(books.pool().await.current_balance, dec!(1800.00));
}

#[tokio::test]
async fn recorded_references_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("books");
    {
        let books = disk_books(&path).await;
        let user = books.member("u-1", dec!(1000.00)).await;
        books
            .engine
            .take_advance(&user, dec!(500.00))
            .await
            .unwrap();
    }

    let store = JsonStore::open(&path).unwrap();
    let books = Books::open_at(store, opening_day(), "s2").await;
    let user = UserId("u-1".to_string());

    // Re-sending the issuance credit is a replay, not new money
    let receipt = books
        .store
        .credit(CreditRequest {
            user_id: user.clone(),
            amount: dec!(500.00),
            reference: "s-1:wallet-credit".to_string(),
            kind: TransactionKind::Deposit,
            description: "duplicate delivery".to_string(),
            metadata: BTreeMap::new(),
        })
        .await
        .unwrap();

    assert!(receipt.replayed);
    assert_eq!(receipt.new_balance, dec!(1500.00));
    assert_eq!(books.wallet_balance(&user).await, dec!(1500.00));

    let wallet = books.store.wallet_for_user(&user).await.unwrap();
    assert_eq!(books.store.transactions(&wallet.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn a_rerun_cycle_after_a_restart_replays_the_settlement() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("books");
    {
        let books = disk_books(&path).await;
        let user = books.member("u-1", dec!(1000.00)).await;
        books
            .engine
            .take_advance(&user, dec!(500.00))
            .await
            .unwrap();
        books.clock.advance(Duration::days(8));
        let first = books.engine.run_settlement().await.unwrap();
        assert_eq!(first.processed.len(), 1);
    }

    // A crashed scheduler comes back and fires the same cycle again
    let store = JsonStore::open(&path).unwrap();
    let books = Books::open_at(store, opening_day() + Duration::days(8), "s2").await;
    let user = UserId("u-1".to_string());
    books.subs.subscribe(user.clone(), "basic");

    let rerun = books.engine.run_settlement().await.unwrap();

    assert_eq!(rerun.processed.len(), 1);
    assert_eq!(rerun.processed[0].amount, dec!(300.00));
    assert!(rerun.errors.is_empty());

    // Balances exactly as after the first run
    assert_eq!(books.wallet_balance(&user).await, dec!(1200.00));
    let pool = books.pool().await;
    assert_eq!(pool.current_balance, dec!(1800.00));
    assert!(pool.is_balanced());

    let records = books
        .store
        .repayments_for(&rerun.processed[0].advance_id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
}
