// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store with scripted failure injection
//!
//! Backs unit and scenario tests. Failure injection covers both halves of
//! the unknown-outcome problem: `fail_before` rejects a call without
//! applying it, while `fail_after` applies the effect and then reports
//! failure, the way a remote service behaves when its response is lost.

use adv_core::{
    Advance, AdvanceId, LiquidityPool, PoolId, Transaction, TransactionId, TransactionStatus,
    UserId, Wallet, WalletId,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::traits::{
    AdvanceReceipt, AdvanceRepayment, AdvanceStore, CreditRequest, DebitRequest, LedgerReceipt,
    LedgerStore, PoolReceipt, PoolStore, PoolUpdate, PoolUpdateKind, RepaymentRecord,
};

/// Mutating operations that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StoreOp {
    WalletCredit,
    WalletDebit,
    PoolApply,
    AdvanceCreate,
    AdvanceRepay,
    RepaymentLog,
}

/// Recorded mutating call
#[derive(Debug, Clone)]
pub struct StoreCall {
    pub op: StoreOp,
    pub reference: String,
}

#[derive(Default)]
struct Inner {
    wallets: BTreeMap<String, Wallet>,
    wallet_by_user: BTreeMap<UserId, WalletId>,
    transactions: Vec<Transaction>,
    ledger_refs: BTreeMap<String, LedgerReceipt>,
    pools: BTreeMap<String, LiquidityPool>,
    pool_refs: BTreeMap<String, (PoolUpdateKind, Decimal, PoolReceipt)>,
    advances: BTreeMap<String, Advance>,
    advance_refs: BTreeMap<String, (Decimal, AdvanceReceipt)>,
    repayments: Vec<RepaymentRecord>,
    fail_before: BTreeMap<StoreOp, u32>,
    fail_after: BTreeMap<StoreOp, u32>,
    calls: Vec<StoreCall>,
    tx_seq: u64,
    wallet_seq: u64,
}

/// In-memory implementation of all three store traits
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a wallet, replacing any record under the same id
    pub fn put_wallet(&self, wallet: Wallet) {
        let mut inner = self.lock();
        inner
            .wallet_by_user
            .insert(wallet.user_id.clone(), wallet.id.clone());
        inner.wallets.insert(wallet.id.0.clone(), wallet);
    }

    /// Seed a pool
    pub fn put_pool(&self, pool: LiquidityPool) {
        self.lock().pools.insert(pool.id.0.clone(), pool);
    }

    /// Seed an advance, bypassing the one-active check
    pub fn put_advance(&self, advance: Advance) {
        self.lock().advances.insert(advance.id.0.clone(), advance);
    }

    /// Script the next `count` calls of `op` to fail without applying
    pub fn fail_before(&self, op: StoreOp, count: u32) {
        self.lock().fail_before.insert(op, count);
    }

    /// Script the next `count` calls of `op` to apply and then fail
    pub fn fail_after(&self, op: StoreOp, count: u32) {
        self.lock().fail_after.insert(op, count);
    }

    /// All recorded mutating calls, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls for one operation
    pub fn calls_for(&self, op: StoreOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }

    fn trip_before(inner: &mut Inner, op: StoreOp) -> Result<(), StoreError> {
        if let Some(n) = inner.fail_before.get_mut(&op) {
            if *n > 0 {
                *n -= 1;
                return Err(StoreError::Unavailable(format!(
                    "scripted outage before {op:?}"
                )));
            }
        }
        Ok(())
    }

    fn trip_after(inner: &mut Inner, op: StoreOp) -> Result<(), StoreError> {
        if let Some(n) = inner.fail_after.get_mut(&op) {
            if *n > 0 {
                *n -= 1;
                return Err(StoreError::Unavailable(format!(
                    "response lost after {op:?}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn create_wallet(&self, user_id: &UserId) -> Result<Wallet, StoreError> {
        let mut inner = self.lock();
        if let Some(wallet_id) = inner.wallet_by_user.get(user_id).cloned() {
            if let Some(wallet) = inner.wallets.get(&wallet_id.0) {
                return Ok(wallet.clone());
            }
        }
        inner.wallet_seq += 1;
        let id = WalletId(format!("wal-{}", inner.wallet_seq));
        let wallet = Wallet::new(id.clone(), user_id.clone(), Utc::now());
        inner.wallet_by_user.insert(user_id.clone(), id);
        inner.wallets.insert(wallet.id.0.clone(), wallet.clone());
        Ok(wallet)
    }

    async fn wallet(&self, id: &WalletId) -> Result<Wallet, StoreError> {
        self.lock()
            .wallets
            .get(&id.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "wallet".to_string(),
                id: id.0.clone(),
            })
    }

    async fn wallet_for_user(&self, user_id: &UserId) -> Result<Wallet, StoreError> {
        let inner = self.lock();
        inner
            .wallet_by_user
            .get(user_id)
            .and_then(|id| inner.wallets.get(&id.0))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "wallet".to_string(),
                id: user_id.to_string(),
            })
    }

    async fn credit(&self, request: CreditRequest) -> Result<LedgerReceipt, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall {
            op: StoreOp::WalletCredit,
            reference: request.reference.clone(),
        });
        Self::trip_before(&mut inner, StoreOp::WalletCredit)?;

        if let Some(recorded) = inner.ledger_refs.get(&request.reference) {
            if recorded.transaction.amount != request.amount
                || recorded.transaction.kind != request.kind
            {
                return Err(StoreError::ReferenceMismatch(request.reference));
            }
            let mut receipt = recorded.clone();
            receipt.replayed = true;
            return Ok(receipt);
        }

        if !request.kind.is_credit() {
            return Err(StoreError::Invalid(format!(
                "credit with non-credit kind {:?}",
                request.kind
            )));
        }
        if request.amount <= Decimal::ZERO {
            return Err(StoreError::Invalid(format!(
                "credit amount must be positive, got {}",
                request.amount
            )));
        }

        let wallet_id = inner
            .wallet_by_user
            .get(&request.user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "wallet".to_string(),
                id: request.user_id.to_string(),
            })?;
        let wallet = inner
            .wallets
            .get(&wallet_id.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "wallet".to_string(),
                id: wallet_id.0.clone(),
            })?;
        if !wallet.is_active() {
            return Err(StoreError::WalletNotActive(wallet.id.clone()));
        }

        let now = Utc::now();
        inner.tx_seq += 1;
        let transaction = Transaction {
            id: TransactionId(format!("tx-{}", inner.tx_seq)),
            wallet_id: wallet.id.clone(),
            kind: request.kind,
            amount: request.amount,
            reference: request.reference.clone(),
            status: TransactionStatus::Completed,
            description: request.description,
            metadata: request.metadata,
            created_at: now,
        };
        let new_balance = wallet.balance + request.amount;
        if let Some(w) = inner.wallets.get_mut(&wallet_id.0) {
            w.balance = new_balance;
            w.updated_at = now;
        }
        inner.transactions.push(transaction.clone());
        let receipt = LedgerReceipt {
            transaction,
            new_balance,
            replayed: false,
        };
        inner
            .ledger_refs
            .insert(request.reference.clone(), receipt.clone());

        Self::trip_after(&mut inner, StoreOp::WalletCredit)?;
        Ok(receipt)
    }

    async fn debit(&self, request: DebitRequest) -> Result<LedgerReceipt, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall {
            op: StoreOp::WalletDebit,
            reference: request.reference.clone(),
        });
        Self::trip_before(&mut inner, StoreOp::WalletDebit)?;

        if let Some(recorded) = inner.ledger_refs.get(&request.reference) {
            if recorded.transaction.amount != request.amount
                || recorded.transaction.kind != request.kind
            {
                return Err(StoreError::ReferenceMismatch(request.reference));
            }
            let mut receipt = recorded.clone();
            receipt.replayed = true;
            return Ok(receipt);
        }

        if request.kind.is_credit() {
            return Err(StoreError::Invalid(format!(
                "debit with credit kind {:?}",
                request.kind
            )));
        }
        if request.amount <= Decimal::ZERO {
            return Err(StoreError::Invalid(format!(
                "debit amount must be positive, got {}",
                request.amount
            )));
        }

        let wallet_id = inner
            .wallet_by_user
            .get(&request.user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "wallet".to_string(),
                id: request.user_id.to_string(),
            })?;
        let wallet = inner
            .wallets
            .get(&wallet_id.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "wallet".to_string(),
                id: wallet_id.0.clone(),
            })?;
        if !wallet.is_active() {
            return Err(StoreError::WalletNotActive(wallet.id.clone()));
        }
        if wallet.balance < request.amount {
            return Err(StoreError::InsufficientFunds {
                available: wallet.balance,
                requested: request.amount,
            });
        }

        let now = Utc::now();
        inner.tx_seq += 1;
        let transaction = Transaction {
            id: TransactionId(format!("tx-{}", inner.tx_seq)),
            wallet_id: wallet.id.clone(),
            kind: request.kind,
            amount: request.amount,
            reference: request.reference.clone(),
            status: TransactionStatus::Completed,
            description: request.description,
            metadata: request.metadata,
            created_at: now,
        };
        let new_balance = wallet.balance - request.amount;
        if let Some(w) = inner.wallets.get_mut(&wallet_id.0) {
            w.balance = new_balance;
            w.updated_at = now;
        }
        inner.transactions.push(transaction.clone());
        let receipt = LedgerReceipt {
            transaction,
            new_balance,
            replayed: false,
        };
        inner
            .ledger_refs
            .insert(request.reference.clone(), receipt.clone());

        Self::trip_after(&mut inner, StoreOp::WalletDebit)?;
        Ok(receipt)
    }

    async fn find_reference(&self, reference: &str) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .lock()
            .ledger_refs
            .get(reference)
            .map(|r| r.transaction.clone()))
    }

    async fn transactions(&self, wallet_id: &WalletId) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .lock()
            .transactions
            .iter()
            .filter(|t| &t.wallet_id == wallet_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PoolStore for MemoryStore {
    async fn create_pool(&self, pool: LiquidityPool) -> Result<LiquidityPool, StoreError> {
        let mut inner = self.lock();
        if let Some(existing) = inner.pools.get(&pool.id.0) {
            return Ok(existing.clone());
        }
        inner.pools.insert(pool.id.0.clone(), pool.clone());
        Ok(pool)
    }

    async fn pool(&self, id: &PoolId) -> Result<LiquidityPool, StoreError> {
        self.lock()
            .pools
            .get(&id.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "pool".to_string(),
                id: id.0.clone(),
            })
    }

    async fn apply(&self, update: PoolUpdate) -> Result<PoolReceipt, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall {
            op: StoreOp::PoolApply,
            reference: update.reference.clone(),
        });
        Self::trip_before(&mut inner, StoreOp::PoolApply)?;

        // Replay wins over the version check: the recorded outcome already
        // moved the version forward
        if let Some((kind, amount, receipt)) = inner.pool_refs.get(&update.reference) {
            if *kind != update.kind || *amount != update.amount {
                return Err(StoreError::ReferenceMismatch(update.reference));
            }
            let mut receipt = receipt.clone();
            receipt.replayed = true;
            return Ok(receipt);
        }

        let pool = inner
            .pools
            .get(&update.pool_id.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "pool".to_string(),
                id: update.pool_id.0.clone(),
            })?;
        if pool.version != update.expected_version {
            return Err(StoreError::Conflict {
                kind: "pool".to_string(),
                id: update.pool_id.0.clone(),
                expected: update.expected_version,
                actual: pool.version,
            });
        }

        let now = Utc::now();
        let next = match update.kind {
            PoolUpdateKind::Lend => pool.lend(update.amount, now),
            PoolUpdateKind::Repay => pool.absorb(update.amount, now),
        }
        .map_err(|e| match e {
            adv_core::PoolError::InsufficientBalance {
                available,
                requested,
            } => StoreError::InsufficientFunds {
                available,
                requested,
            },
            other => StoreError::Invalid(other.to_string()),
        })?;

        inner.pools.insert(next.id.0.clone(), next.clone());
        let receipt = PoolReceipt {
            pool: next,
            replayed: false,
        };
        inner.pool_refs.insert(
            update.reference.clone(),
            (update.kind, update.amount, receipt.clone()),
        );

        Self::trip_after(&mut inner, StoreOp::PoolApply)?;
        Ok(receipt)
    }
}

#[async_trait]
impl AdvanceStore for MemoryStore {
    async fn create(&self, advance: Advance) -> Result<Advance, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall {
            op: StoreOp::AdvanceCreate,
            reference: advance.id.0.clone(),
        });
        Self::trip_before(&mut inner, StoreOp::AdvanceCreate)?;

        if let Some(existing) = inner.advances.get(&advance.id.0) {
            return Ok(existing.clone());
        }
        let clash = inner
            .advances
            .values()
            .any(|a| a.user_id == advance.user_id && a.is_active());
        if clash {
            return Err(StoreError::ActiveAdvanceExists(advance.user_id.clone()));
        }
        inner.advances.insert(advance.id.0.clone(), advance.clone());

        Self::trip_after(&mut inner, StoreOp::AdvanceCreate)?;
        Ok(advance)
    }

    async fn advance(&self, id: &AdvanceId) -> Result<Advance, StoreError> {
        self.lock()
            .advances
            .get(&id.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "advance".to_string(),
                id: id.0.clone(),
            })
    }

    async fn active_for_user(&self, user_id: &UserId) -> Result<Vec<Advance>, StoreError> {
        Ok(self
            .lock()
            .advances
            .values()
            .filter(|a| &a.user_id == user_id && a.is_active())
            .cloned()
            .collect())
    }

    async fn all_active(&self) -> Result<Vec<Advance>, StoreError> {
        let mut advances: Vec<Advance> = self
            .lock()
            .advances
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        advances.sort_by(|a, b| (a.created_at, &a.id.0).cmp(&(b.created_at, &b.id.0)));
        Ok(advances)
    }

    async fn apply_repayment(
        &self,
        repayment: AdvanceRepayment,
    ) -> Result<AdvanceReceipt, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall {
            op: StoreOp::AdvanceRepay,
            reference: repayment.reference.clone(),
        });
        Self::trip_before(&mut inner, StoreOp::AdvanceRepay)?;

        if let Some((amount, receipt)) = inner.advance_refs.get(&repayment.reference) {
            if *amount != repayment.amount {
                return Err(StoreError::ReferenceMismatch(repayment.reference));
            }
            let mut receipt = receipt.clone();
            receipt.replayed = true;
            return Ok(receipt);
        }

        let advance = inner
            .advances
            .get(&repayment.advance_id.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "advance".to_string(),
                id: repayment.advance_id.0.clone(),
            })?;
        let next = advance
            .apply_repayment(repayment.amount, repayment.at)
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        inner.advances.insert(next.id.0.clone(), next.clone());
        let receipt = AdvanceReceipt {
            advance: next,
            replayed: false,
        };
        inner.advance_refs.insert(
            repayment.reference.clone(),
            (repayment.amount, receipt.clone()),
        );

        Self::trip_after(&mut inner, StoreOp::AdvanceRepay)?;
        Ok(receipt)
    }

    async fn record_repayment(&self, record: RepaymentRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall {
            op: StoreOp::RepaymentLog,
            reference: record.reference.clone(),
        });
        Self::trip_before(&mut inner, StoreOp::RepaymentLog)?;

        if inner
            .repayments
            .iter()
            .any(|r| r.reference == record.reference)
        {
            return Ok(());
        }
        inner.repayments.push(record);
        Ok(())
    }

    async fn repayments_for(
        &self,
        advance_id: &AdvanceId,
    ) -> Result<Vec<RepaymentRecord>, StoreError> {
        Ok(self
            .lock()
            .repayments
            .iter()
            .filter(|r| &r.advance_id == advance_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
