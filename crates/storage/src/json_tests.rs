// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use adv_core::TransactionKind;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

fn credit_req(user: &str, amount: Decimal, reference: &str) -> CreditRequest {
    CreditRequest {
        user_id: UserId(user.to_string()),
        amount,
        reference: reference.to_string(),
        kind: TransactionKind::Deposit,
        description: "test credit".to_string(),
        metadata: BTreeMap::new(),
    }
}

#[tokio::test]
async fn wallet_and_dedupe_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = JsonStore::open(dir.path()).unwrap();
        store.create_wallet(&UserId("u-1".into())).await.unwrap();
        let receipt = store.credit(credit_req("u-1", dec!(80.00), "r-1")).await.unwrap();
        assert!(!receipt.replayed);
    }

    let store = JsonStore::open(dir.path()).unwrap();
    let replay = store.credit(credit_req("u-1", dec!(80.00), "r-1")).await.unwrap();
    assert!(replay.replayed);

    let wallet = store.wallet_for_user(&UserId("u-1".into())).await.unwrap();
    assert_eq!(wallet.balance, dec!(80.00), "credit applied once across restarts");
}

#[tokio::test]
async fn create_wallet_is_get_or_create() {
    let store = JsonStore::open_temp().unwrap();
    let first = store.create_wallet(&UserId("u-1".into())).await.unwrap();
    let second = store.create_wallet(&UserId("u-1".into())).await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn pool_version_conflict_and_replay() {
    let store = JsonStore::open_temp().unwrap();
    let pool = LiquidityPool::new(PoolId("pool-1".into()), dec!(5000.00), Utc::now());
    store.create_pool(pool).await.unwrap();

    let update = PoolUpdate {
        pool_id: PoolId("pool-1".into()),
        reference: "saga-1:pool-debit".to_string(),
        kind: PoolUpdateKind::Lend,
        amount: dec!(500.00),
        expected_version: 0,
    };
    let receipt = store.apply(update.clone()).await.unwrap();
    assert_eq!(receipt.pool.current_balance, dec!(4500.00));

    // Stale version with a fresh reference conflicts
    let stale = PoolUpdate {
        reference: "saga-2:pool-debit".to_string(),
        ..update.clone()
    };
    let err = store.apply(stale).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    // Same reference replays despite the stale version
    let replay = store.apply(update).await.unwrap();
    assert!(replay.replayed);
    assert_eq!(replay.pool.current_balance, dec!(4500.00));
}

#[tokio::test]
async fn single_active_rule_enforced_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = JsonStore::open(dir.path()).unwrap();
        let advance = Advance::new(
            AdvanceId("adv-1".into()),
            UserId("u-1".into()),
            PoolId("pool-1".into()),
            dec!(100.00),
            Utc::now(),
        );
        store.create(advance).await.unwrap();
    }

    let store = JsonStore::open(dir.path()).unwrap();
    let err = store
        .create(Advance::new(
            AdvanceId("adv-2".into()),
            UserId("u-1".into()),
            PoolId("pool-1".into()),
            dec!(50.00),
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ActiveAdvanceExists(_)));
}

#[tokio::test]
async fn repayment_journal_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let record = RepaymentRecord {
        id: "rec-1".to_string(),
        advance_id: AdvanceId("adv-1".into()),
        user_id: UserId("u-1".into()),
        amount: dec!(25.00),
        reference: "adv-1:2026-03-02:debit".to_string(),
        recorded_at: Utc::now(),
    };
    {
        let store = JsonStore::open(dir.path()).unwrap();
        store.record_repayment(record.clone()).await.unwrap();
        // Duplicate reference is a no-op
        store.record_repayment(record.clone()).await.unwrap();
    }

    let store = JsonStore::open(dir.path()).unwrap();
    let records = store.repayments_for(&AdvanceId("adv-1".into())).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0], record);
}

#[tokio::test]
async fn repayment_dedupe_by_reference() {
    let store = JsonStore::open_temp().unwrap();
    let advance = Advance::new(
        AdvanceId("adv-1".into()),
        UserId("u-1".into()),
        PoolId("pool-1".into()),
        dec!(100.00),
        Utc::now(),
    );
    store.create(advance).await.unwrap();

    let repayment = AdvanceRepayment {
        advance_id: AdvanceId("adv-1".into()),
        reference: "adv-1:cycle:outstanding".to_string(),
        amount: dec!(40.00),
        at: Utc::now(),
    };
    store.apply_repayment(repayment.clone()).await.unwrap();
    let replay = store.apply_repayment(repayment).await.unwrap();
    assert!(replay.replayed);

    let advance = store.advance(&AdvanceId("adv-1".into())).await.unwrap();
    assert_eq!(advance.outstanding_amount, dec!(60.00));
}
