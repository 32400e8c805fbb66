// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store traits and their request/receipt types
//!
//! Each trait covers one record service. Mutations take a typed request
//! carrying the caller's idempotency reference and return a receipt whose
//! `replayed` flag tells the caller whether the effect was applied now or
//! had already been recorded under that reference.

use adv_core::{
    Advance, AdvanceId, LiquidityPool, PoolId, Transaction, TransactionKind, UserId, Wallet,
    WalletId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StoreError;

/// Request to credit a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditRequest {
    pub user_id: UserId,
    pub amount: Decimal,
    pub reference: String,
    pub kind: TransactionKind,
    pub description: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Request to debit a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebitRequest {
    pub user_id: UserId,
    pub amount: Decimal,
    pub reference: String,
    pub kind: TransactionKind,
    pub description: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Outcome of a ledger write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub transaction: Transaction,
    pub new_balance: Decimal,
    /// True when the reference had already been applied and this is the
    /// recorded outcome
    pub replayed: bool,
}

/// Wallet balances and their transaction ledger
#[async_trait]
pub trait LedgerStore: Clone + Send + Sync + 'static {
    /// Open a wallet for a user, or return the existing one
    async fn create_wallet(&self, user_id: &UserId) -> Result<Wallet, StoreError>;

    async fn wallet(&self, id: &WalletId) -> Result<Wallet, StoreError>;

    async fn wallet_for_user(&self, user_id: &UserId) -> Result<Wallet, StoreError>;

    /// Add funds to a user's wallet
    async fn credit(&self, request: CreditRequest) -> Result<LedgerReceipt, StoreError>;

    /// Remove funds from a user's wallet; never drives the balance negative
    async fn debit(&self, request: DebitRequest) -> Result<LedgerReceipt, StoreError>;

    /// Look up a transaction by its idempotency reference
    async fn find_reference(&self, reference: &str) -> Result<Option<Transaction>, StoreError>;

    /// Transactions against a wallet, oldest first
    async fn transactions(&self, wallet_id: &WalletId) -> Result<Vec<Transaction>, StoreError>;
}

/// Direction of a pool update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolUpdateKind {
    Lend,
    Repay,
}

/// Versioned update to a liquidity pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolUpdate {
    pub pool_id: PoolId,
    pub reference: String,
    pub kind: PoolUpdateKind,
    pub amount: Decimal,
    /// Version the caller read; a stale value fails with a conflict
    pub expected_version: u64,
}

/// Outcome of a pool update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolReceipt {
    pub pool: LiquidityPool,
    pub replayed: bool,
}

/// Liquidity pool records with optimistic concurrency
#[async_trait]
pub trait PoolStore: Clone + Send + Sync + 'static {
    /// Create a pool, or return the existing record under the same id
    async fn create_pool(&self, pool: LiquidityPool) -> Result<LiquidityPool, StoreError>;

    async fn pool(&self, id: &PoolId) -> Result<LiquidityPool, StoreError>;

    /// Apply a lend or repay movement at the expected version
    async fn apply(&self, update: PoolUpdate) -> Result<PoolReceipt, StoreError>;
}

/// Reference-deduped repayment against an advance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceRepayment {
    pub advance_id: AdvanceId,
    pub reference: String,
    pub amount: Decimal,
    pub at: DateTime<Utc>,
}

/// Outcome of an advance repayment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceReceipt {
    pub advance: Advance,
    pub replayed: bool,
}

/// Audit record of one collected repayment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentRecord {
    pub id: String,
    pub advance_id: AdvanceId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub reference: String,
    pub recorded_at: DateTime<Utc>,
}

/// Advance registry enforcing the one-active-advance rule
#[async_trait]
pub trait AdvanceStore: Clone + Send + Sync + 'static {
    /// Register a new advance.
    ///
    /// Atomic check-and-insert: fails with `ActiveAdvanceExists` when the
    /// user already has a different active advance. Re-sending the same
    /// advance id returns the stored record.
    async fn create(&self, advance: Advance) -> Result<Advance, StoreError>;

    async fn advance(&self, id: &AdvanceId) -> Result<Advance, StoreError>;

    async fn active_for_user(&self, user_id: &UserId) -> Result<Vec<Advance>, StoreError>;

    /// Every active advance, across all users
    async fn all_active(&self) -> Result<Vec<Advance>, StoreError>;

    /// Reduce the outstanding balance; flips the record to repaid at zero
    async fn apply_repayment(
        &self,
        repayment: AdvanceRepayment,
    ) -> Result<AdvanceReceipt, StoreError>;

    /// Append to the repayment audit log; a reference already logged is
    /// a no-op
    async fn record_repayment(&self, record: RepaymentRecord) -> Result<(), StoreError>;

    /// Audit log entries for an advance, oldest first
    async fn repayments_for(
        &self,
        advance_id: &AdvanceId,
    ) -> Result<Vec<RepaymentRecord>, StoreError>;
}
