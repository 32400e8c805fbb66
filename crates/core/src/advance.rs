// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cash advance record
//!
//! An advance tracks what a user drew and what they still owe. The only
//! mutating transition is repayment; `Repaid` is terminal. The invariant
//! `0 <= outstanding_amount <= total_amount` holds by construction.

use crate::pool::PoolId;
use crate::wallet::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for an advance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdvanceId(pub String);

impl std::fmt::Display for AdvanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AdvanceId {
    fn from(s: String) -> Self {
        AdvanceId(s)
    }
}

impl From<&str> for AdvanceId {
    fn from(s: &str) -> Self {
        AdvanceId(s.to_string())
    }
}

/// Lifecycle state of an advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceStatus {
    Active,
    Repaid,
}

/// Errors from advance transitions
#[derive(Debug, Error, PartialEq)]
pub enum AdvanceError {
    #[error("repayment must be positive, got {0}")]
    NonPositiveRepayment(Decimal),
    #[error("repayment {amount} exceeds outstanding {outstanding}")]
    OverRepayment {
        amount: Decimal,
        outstanding: Decimal,
    },
    #[error("advance is already repaid")]
    AlreadyRepaid,
}

/// A cash advance drawn against a liquidity pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advance {
    pub id: AdvanceId,
    pub user_id: UserId,
    pub pool_id: PoolId,
    pub total_amount: Decimal,
    pub outstanding_amount: Decimal,
    pub status: AdvanceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub repaid_at: Option<DateTime<Utc>>,
}

impl Advance {
    pub fn new(
        id: AdvanceId,
        user_id: UserId,
        pool_id: PoolId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            pool_id,
            total_amount: amount,
            outstanding_amount: amount,
            status: AdvanceStatus::Active,
            created_at: now,
            updated_at: now,
            repaid_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AdvanceStatus::Active
    }

    /// Apply a repayment.
    ///
    /// Pure transition: returns the updated record. Flips to `Repaid` and
    /// stamps `repaid_at` exactly when the outstanding balance reaches zero.
    pub fn apply_repayment(&self, amount: Decimal, now: DateTime<Utc>) -> Result<Self, AdvanceError> {
        if self.status == AdvanceStatus::Repaid {
            return Err(AdvanceError::AlreadyRepaid);
        }
        if amount <= Decimal::ZERO {
            return Err(AdvanceError::NonPositiveRepayment(amount));
        }
        if amount > self.outstanding_amount {
            return Err(AdvanceError::OverRepayment {
                amount,
                outstanding: self.outstanding_amount,
            });
        }
        let mut next = self.clone();
        next.outstanding_amount -= amount;
        next.updated_at = now;
        if next.outstanding_amount.is_zero() {
            next.status = AdvanceStatus::Repaid;
            next.repaid_at = Some(now);
        }
        Ok(next)
    }

    /// Whole weeks since the advance was issued
    pub fn weeks_open(&self, now: DateTime<Utc>) -> u32 {
        let days = (now - self.created_at).num_days().max(0);
        (days / 7) as u32
    }
}

#[cfg(test)]
#[path = "advance_tests.rs"]
mod tests;
