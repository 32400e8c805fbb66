// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON file-backed store
//!
//! One record per file under a state directory, for the standalone daemon:
//!
//! ```text
//! state/
//!   wallets/<wallet-id>.json      pools/<pool-id>.json
//!   wallet_index/<user-id>.json   pool_refs/<ref>.json
//!   transactions/<tx-id>.json     advances/<advance-id>.json
//!   ledger_refs/<ref>.json        advance_refs/<ref>.json
//!   repayments.log                (checksummed journal)
//! ```
//!
//! Reference dedupe indexes are persisted, so idempotency survives a
//! daemon restart. A single process owns the directory; writes serialize
//! through an internal lock.

use adv_core::{
    Advance, AdvanceId, LiquidityPool, PoolId, Transaction, TransactionId, TransactionStatus,
    UserId, Wallet, WalletId,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::journal::Journal;
use crate::traits::{
    AdvanceReceipt, AdvanceRepayment, AdvanceStore, CreditRequest, DebitRequest, LedgerReceipt,
    LedgerStore, PoolReceipt, PoolStore, PoolUpdate, PoolUpdateKind, RepaymentRecord,
};

#[derive(Serialize, Deserialize)]
struct RecordedPoolUpdate {
    kind: PoolUpdateKind,
    amount: Decimal,
    receipt: PoolReceipt,
}

#[derive(Serialize, Deserialize)]
struct RecordedRepayment {
    amount: Decimal,
    receipt: AdvanceReceipt,
}

/// JSON file-backed implementation of all three store traits
#[derive(Clone)]
pub struct JsonStore {
    base_path: PathBuf,
    journal_path: PathBuf,
    journal: Arc<Mutex<Journal>>,
    // One writer at a time; read-modify-write cycles must not interleave
    write_lock: Arc<Mutex<()>>,
}

impl JsonStore {
    /// Open a store at the given path
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        let journal_path = base_path.join("repayments.log");
        let journal = Journal::open(&journal_path)?;
        Ok(Self {
            base_path,
            journal_path,
            journal: Arc::new(Mutex::new(journal)),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Open a temporary store for testing
    pub fn open_temp() -> Result<Self, StoreError> {
        let temp_dir = std::env::temp_dir().join(format!("adv-test-{}", uuid::Uuid::new_v4()));
        Self::open(temp_dir)
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn save<T: Serialize>(&self, kind: &str, id: &str, data: &T) -> Result<(), StoreError> {
        let dir = self.base_path.join(kind);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(data)?;
        fs::write(dir.join(format!("{id}.json")), json)?;
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, kind: &str, id: &str) -> Result<T, StoreError> {
        self.load_opt(kind, id)?.ok_or_else(|| StoreError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        })
    }

    fn load_opt<T: DeserializeOwned>(&self, kind: &str, id: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(kind, id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn list(&self, kind: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.base_path.join(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().to_string());
                }
            }
        }
        Ok(ids)
    }

    fn path_for(&self, kind: &str, id: &str) -> PathBuf {
        self.base_path.join(kind).join(format!("{}.json", id))
    }

    /// References become file names. Distinct references that sanitize to
    /// the same key are treated as reuse and fail the payload check.
    fn ref_key(reference: &str) -> String {
        reference
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    fn all_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let mut txs = Vec::new();
        for id in self.list("transactions")? {
            txs.push(self.load::<Transaction>("transactions", &id)?);
        }
        txs.sort_by(|a, b| (a.created_at, &a.id.0).cmp(&(b.created_at, &b.id.0)));
        Ok(txs)
    }

    fn all_advances(&self) -> Result<Vec<Advance>, StoreError> {
        let mut advances = Vec::new();
        for id in self.list("advances")? {
            advances.push(self.load::<Advance>("advances", &id)?);
        }
        advances.sort_by(|a, b| (a.created_at, &a.id.0).cmp(&(b.created_at, &b.id.0)));
        Ok(advances)
    }
}

#[async_trait]
impl LedgerStore for JsonStore {
    async fn create_wallet(&self, user_id: &UserId) -> Result<Wallet, StoreError> {
        let _guard = self.guard();
        if let Some(wallet_id) = self.load_opt::<String>("wallet_index", &user_id.0)? {
            return self.load("wallets", &wallet_id);
        }
        let id = WalletId(format!("wal-{}", uuid::Uuid::new_v4()));
        let wallet = Wallet::new(id, user_id.clone(), Utc::now());
        self.save("wallets", &wallet.id.0, &wallet)?;
        self.save("wallet_index", &user_id.0, &wallet.id.0)?;
        Ok(wallet)
    }

    async fn wallet(&self, id: &WalletId) -> Result<Wallet, StoreError> {
        self.load("wallets", &id.0)
    }

    async fn wallet_for_user(&self, user_id: &UserId) -> Result<Wallet, StoreError> {
        let wallet_id: String = self.load("wallet_index", &user_id.0).map_err(|_| {
            StoreError::NotFound {
                kind: "wallet".to_string(),
                id: user_id.to_string(),
            }
        })?;
        self.load("wallets", &wallet_id)
    }

    async fn credit(&self, request: CreditRequest) -> Result<LedgerReceipt, StoreError> {
        let _guard = self.guard();
        let key = Self::ref_key(&request.reference);
        if let Some(recorded) = self.load_opt::<LedgerReceipt>("ledger_refs", &key)? {
            if recorded.transaction.amount != request.amount
                || recorded.transaction.kind != request.kind
            {
                return Err(StoreError::ReferenceMismatch(request.reference));
            }
            let mut receipt = recorded;
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

        let wallet_id: String = self.load("wallet_index", &request.user_id.0).map_err(|_| {
            StoreError::NotFound {
                kind: "wallet".to_string(),
                id: request.user_id.to_string(),
            }
        })?;
        let mut wallet: Wallet = self.load("wallets", &wallet_id)?;
        if !wallet.is_active() {
            return Err(StoreError::WalletNotActive(wallet.id.clone()));
        }

        let now = Utc::now();
        let transaction = Transaction {
            id: TransactionId(format!("tx-{}", uuid::Uuid::new_v4())),
            wallet_id: wallet.id.clone(),
            kind: request.kind,
            amount: request.amount,
            reference: request.reference.clone(),
            status: TransactionStatus::Completed,
            description: request.description,
            metadata: request.metadata,
            created_at: now,
        };
        wallet.balance += request.amount;
        wallet.updated_at = now;

        self.save("transactions", &transaction.id.0, &transaction)?;
        self.save("wallets", &wallet.id.0, &wallet)?;
        let receipt = LedgerReceipt {
            new_balance: wallet.balance,
            transaction,
            replayed: false,
        };
        self.save("ledger_refs", &key, &receipt)?;
        Ok(receipt)
    }

    async fn debit(&self, request: DebitRequest) -> Result<LedgerReceipt, StoreError> {
        let _guard = self.guard();
        let key = Self::ref_key(&request.reference);
        if let Some(recorded) = self.load_opt::<LedgerReceipt>("ledger_refs", &key)? {
            if recorded.transaction.amount != request.amount
                || recorded.transaction.kind != request.kind
            {
                return Err(StoreError::ReferenceMismatch(request.reference));
            }
            let mut receipt = recorded;
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

        let wallet_id: String = self.load("wallet_index", &request.user_id.0).map_err(|_| {
            StoreError::NotFound {
                kind: "wallet".to_string(),
                id: request.user_id.to_string(),
            }
        })?;
        let mut wallet: Wallet = self.load("wallets", &wallet_id)?;
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
        let transaction = Transaction {
            id: TransactionId(format!("tx-{}", uuid::Uuid::new_v4())),
            wallet_id: wallet.id.clone(),
            kind: request.kind,
            amount: request.amount,
            reference: request.reference.clone(),
            status: TransactionStatus::Completed,
            description: request.description,
            metadata: request.metadata,
            created_at: now,
        };
        wallet.balance -= request.amount;
        wallet.updated_at = now;

        self.save("transactions", &transaction.id.0, &transaction)?;
        self.save("wallets", &wallet.id.0, &wallet)?;
        let receipt = LedgerReceipt {
            new_balance: wallet.balance,
            transaction,
            replayed: false,
        };
        self.save("ledger_refs", &key, &receipt)?;
        Ok(receipt)
    }

    async fn find_reference(&self, reference: &str) -> Result<Option<Transaction>, StoreError> {
        let key = Self::ref_key(reference);
        Ok(self
            .load_opt::<LedgerReceipt>("ledger_refs", &key)?
            .map(|r| r.transaction))
    }

    async fn transactions(&self, wallet_id: &WalletId) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .all_transactions()?
            .into_iter()
            .filter(|t| &t.wallet_id == wallet_id)
            .collect())
    }
}

#[async_trait]
impl PoolStore for JsonStore {
    async fn create_pool(&self, pool: LiquidityPool) -> Result<LiquidityPool, StoreError> {
        let _guard = self.guard();
        if let Some(existing) = self.load_opt::<LiquidityPool>("pools", &pool.id.0)? {
            return Ok(existing);
        }
        self.save("pools", &pool.id.0, &pool)?;
        Ok(pool)
    }

    async fn pool(&self, id: &PoolId) -> Result<LiquidityPool, StoreError> {
        self.load("pools", &id.0)
    }

    async fn apply(&self, update: PoolUpdate) -> Result<PoolReceipt, StoreError> {
        let _guard = self.guard();
        let key = Self::ref_key(&update.reference);
        if let Some(recorded) = self.load_opt::<RecordedPoolUpdate>("pool_refs", &key)? {
            if recorded.kind != update.kind || recorded.amount != update.amount {
                return Err(StoreError::ReferenceMismatch(update.reference));
            }
            let mut receipt = recorded.receipt;
            receipt.replayed = true;
            return Ok(receipt);
        }

        let pool: LiquidityPool = self.load("pools", &update.pool_id.0)?;
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

        self.save("pools", &next.id.0, &next)?;
        let receipt = PoolReceipt {
            pool: next,
            replayed: false,
        };
        self.save(
            "pool_refs",
            &key,
            &RecordedPoolUpdate {
                kind: update.kind,
                amount: update.amount,
                receipt: receipt.clone(),
            },
        )?;
        Ok(receipt)
    }
}

#[async_trait]
impl AdvanceStore for JsonStore {
    async fn create(&self, advance: Advance) -> Result<Advance, StoreError> {
        let _guard = self.guard();
        if let Some(existing) = self.load_opt::<Advance>("advances", &advance.id.0)? {
            return Ok(existing);
        }
        let clash = self
            .all_advances()?
            .iter()
            .any(|a| a.user_id == advance.user_id && a.is_active());
        if clash {
            return Err(StoreError::ActiveAdvanceExists(advance.user_id.clone()));
        }
        self.save("advances", &advance.id.0, &advance)?;
        Ok(advance)
    }

    async fn advance(&self, id: &AdvanceId) -> Result<Advance, StoreError> {
        self.load("advances", &id.0)
    }

    async fn active_for_user(&self, user_id: &UserId) -> Result<Vec<Advance>, StoreError> {
        Ok(self
            .all_advances()?
            .into_iter()
            .filter(|a| &a.user_id == user_id && a.is_active())
            .collect())
    }

    async fn all_active(&self) -> Result<Vec<Advance>, StoreError> {
        Ok(self
            .all_advances()?
            .into_iter()
            .filter(Advance::is_active)
            .collect())
    }

    async fn apply_repayment(
        &self,
        repayment: AdvanceRepayment,
    ) -> Result<AdvanceReceipt, StoreError> {
        let _guard = self.guard();
        let key = Self::ref_key(&repayment.reference);
        if let Some(recorded) = self.load_opt::<RecordedRepayment>("advance_refs", &key)? {
            if recorded.amount != repayment.amount {
                return Err(StoreError::ReferenceMismatch(repayment.reference));
            }
            let mut receipt = recorded.receipt;
            receipt.replayed = true;
            return Ok(receipt);
        }

        let advance: Advance = self.load("advances", &repayment.advance_id.0)?;
        let next = advance
            .apply_repayment(repayment.amount, repayment.at)
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        self.save("advances", &next.id.0, &next)?;
        let receipt = AdvanceReceipt {
            advance: next,
            replayed: false,
        };
        self.save(
            "advance_refs",
            &key,
            &RecordedRepayment {
                amount: repayment.amount,
                receipt: receipt.clone(),
            },
        )?;
        Ok(receipt)
    }

    async fn record_repayment(&self, record: RepaymentRecord) -> Result<(), StoreError> {
        let _guard = self.guard();
        let already = Journal::replay(&self.journal_path)?
            .iter()
            .any(|e| e.record.reference == record.reference);
        if already {
            return Ok(());
        }
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .append(record)?;
        Ok(())
    }

    async fn repayments_for(
        &self,
        advance_id: &AdvanceId,
    ) -> Result<Vec<RepaymentRecord>, StoreError> {
        Ok(Journal::replay(&self.journal_path)?
            .into_iter()
            .map(|e| e.record)
            .filter(|r| &r.advance_id == advance_id)
            .collect())
    }
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
