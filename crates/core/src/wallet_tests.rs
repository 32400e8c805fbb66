// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use rust_decimal_macros::dec;
use yare::parameterized;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
}

fn make_tx(kind: TransactionKind, amount: Decimal, status: TransactionStatus) -> Transaction {
    Transaction {
        id: TransactionId("tx-1".into()),
        wallet_id: WalletId("w-1".into()),
        kind,
        amount,
        reference: "ref-1".to_string(),
        status,
        description: String::new(),
        metadata: BTreeMap::new(),
        created_at: now(),
    }
}

#[test]
fn new_wallet_is_active_with_zero_balance() {
    let wallet = Wallet::new(WalletId("w-1".into()), UserId("u-1".into()), now());
    assert!(wallet.is_active());
    assert_eq!(wallet.balance, Decimal::ZERO);
    assert_eq!(wallet.created_at, wallet.updated_at);
}

#[parameterized(
    deposit_adds = { TransactionKind::Deposit, dec!(50.00) },
    withdrawal_subtracts = { TransactionKind::Withdrawal, dec!(-50.00) },
    transfer_subtracts = { TransactionKind::Transfer, dec!(-50.00) },
    payment_subtracts = { TransactionKind::Payment, dec!(-50.00) },
)]
fn signed_amount_follows_kind(kind: TransactionKind, expected: Decimal) {
    let tx = make_tx(kind, dec!(50.00), TransactionStatus::Completed);
    assert_eq!(tx.signed_amount(), expected);
}

#[test]
fn completed_total_ignores_pending_and_failed() {
    let txs = vec![
        make_tx(TransactionKind::Deposit, dec!(100.00), TransactionStatus::Completed),
        make_tx(TransactionKind::Payment, dec!(30.00), TransactionStatus::Completed),
        make_tx(TransactionKind::Deposit, dec!(999.00), TransactionStatus::Pending),
        make_tx(TransactionKind::Withdrawal, dec!(999.00), TransactionStatus::Failed),
    ];
    assert_eq!(completed_total(&txs), dec!(70.00));
}

#[test]
fn completed_total_of_empty_ledger_is_zero() {
    assert_eq!(completed_total(&[]), Decimal::ZERO);
}

#[test]
fn wallet_serde_round_trips() {
    let wallet = Wallet::new(WalletId("w-9".into()), UserId("u-9".into()), now());
    let json = serde_json::to_string(&wallet).unwrap();
    let back: Wallet = serde_json::from_str(&json).unwrap();
    assert_eq!(back, wallet);
}

#[test]
fn transaction_status_uses_snake_case_on_the_wire() {
    let tx = make_tx(TransactionKind::Deposit, dec!(1.00), TransactionStatus::Completed);
    let json = serde_json::to_string(&tx).unwrap();
    assert!(json.contains("\"status\":\"completed\""));
    assert!(json.contains("\"kind\":\"deposit\""));
}
