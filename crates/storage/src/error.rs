// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type shared by all record stores

use adv_core::{UserId, WalletId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from record store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {kind}/{id}")]
    NotFound { kind: String, id: String },
    #[error("version conflict on {kind}/{id}: expected {expected}, found {actual}")]
    Conflict {
        kind: String,
        id: String,
        expected: u64,
        actual: u64,
    },
    #[error("insufficient funds: have {available}, need {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    #[error("user {0} already has an active advance")]
    ActiveAdvanceExists(UserId),
    #[error("reference {0} was already used with a different payload")]
    ReferenceMismatch(String),
    #[error("wallet {0} is not active")]
    WalletNotActive(WalletId),
    #[error("invalid record operation: {0}")]
    Invalid(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether a retry of the same call could succeed.
    ///
    /// Conflicts are retryable too, but only after a re-read; callers
    /// handle those separately.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Io(_))
    }
}
