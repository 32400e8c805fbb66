// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liquidity pool record
//!
//! The pool is the shared float that funds advances. Transitions are pure:
//! they take the current record and return the next one, with the version
//! bumped for optimistic concurrency at the store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a liquidity pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolId(pub String);

impl std::fmt::Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PoolId {
    fn from(s: String) -> Self {
        PoolId(s)
    }
}

impl From<&str> for PoolId {
    fn from(s: &str) -> Self {
        PoolId(s.to_string())
    }
}

/// Errors from pool transitions
#[derive(Debug, Error, PartialEq)]
pub enum PoolError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
    #[error("insufficient pool balance: have {available}, need {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },
}

/// Shared liquidity pool that funds advances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub id: PoolId,
    pub current_balance: Decimal,
    pub initial_balance: Decimal,
    pub total_lent: Decimal,
    pub total_repaid: Decimal,
    /// Bumped on every committed update; stale writers get a conflict
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl LiquidityPool {
    pub fn new(id: PoolId, initial_balance: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            id,
            current_balance: initial_balance,
            initial_balance,
            total_lent: Decimal::ZERO,
            total_repaid: Decimal::ZERO,
            version: 0,
            updated_at: now,
        }
    }

    /// Move funds out of the pool to fund an advance
    pub fn lend(&self, amount: Decimal, now: DateTime<Utc>) -> Result<Self, PoolError> {
        if amount <= Decimal::ZERO {
            return Err(PoolError::NonPositiveAmount(amount));
        }
        if amount > self.current_balance {
            return Err(PoolError::InsufficientBalance {
                available: self.current_balance,
                requested: amount,
            });
        }
        let mut next = self.clone();
        next.current_balance -= amount;
        next.total_lent += amount;
        next.version += 1;
        next.updated_at = now;
        Ok(next)
    }

    /// Return repaid funds to the pool
    pub fn absorb(&self, amount: Decimal, now: DateTime<Utc>) -> Result<Self, PoolError> {
        if amount <= Decimal::ZERO {
            return Err(PoolError::NonPositiveAmount(amount));
        }
        let mut next = self.clone();
        next.current_balance += amount;
        next.total_repaid += amount;
        next.version += 1;
        next.updated_at = now;
        Ok(next)
    }

    /// Conservation identity: balance equals initial minus lent plus repaid
    pub fn is_balanced(&self) -> bool {
        self.current_balance == self.initial_balance - self.total_lent + self.total_repaid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    fn make_pool(balance: Decimal) -> LiquidityPool {
        LiquidityPool::new(PoolId("pool-1".into()), balance, now())
    }

    #[test]
    fn lend_moves_funds_and_bumps_version() {
        let pool = make_pool(dec!(10000.00));
        let next = pool.lend(dec!(1500.00), now()).unwrap();
        assert_eq!(next.current_balance, dec!(8500.00));
        assert_eq!(next.total_lent, dec!(1500.00));
        assert_eq!(next.version, 1);
        assert!(next.is_balanced());
    }

    #[test]
    fn lend_more_than_balance_fails() {
        let pool = make_pool(dec!(100.00));
        let err = pool.lend(dec!(100.01), now()).unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientBalance {
                available: dec!(100.00),
                requested: dec!(100.01),
            }
        );
    }

    #[test]
    fn lend_exact_balance_drains_pool_to_zero() {
        let pool = make_pool(dec!(100.00));
        let next = pool.lend(dec!(100.00), now()).unwrap();
        assert_eq!(next.current_balance, Decimal::ZERO);
        assert!(next.is_balanced());
    }

    #[test]
    fn lend_rejects_non_positive_amounts() {
        let pool = make_pool(dec!(100.00));
        assert!(pool.lend(Decimal::ZERO, now()).is_err());
        assert!(pool.lend(dec!(-5.00), now()).is_err());
    }

    #[test]
    fn absorb_returns_funds() {
        let pool = make_pool(dec!(10000.00));
        let pool = pool.lend(dec!(2000.00), now()).unwrap();
        let pool = pool.absorb(dec!(500.00), now()).unwrap();
        assert_eq!(pool.current_balance, dec!(8500.00));
        assert_eq!(pool.total_repaid, dec!(500.00));
        assert_eq!(pool.version, 2);
        assert!(pool.is_balanced());
    }

    // Property-based tests
    use proptest::prelude::*;

    fn arb_cents() -> impl Strategy<Value = Decimal> {
        (1i64..=500_00).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        #[test]
        fn random_lend_absorb_sequences_stay_balanced(
            steps in proptest::collection::vec((any::<bool>(), arb_cents()), 0..40)
        ) {
            let mut pool = make_pool(dec!(1000.00));
            for (is_lend, amount) in steps {
                let result = if is_lend {
                    pool.lend(amount, now())
                } else {
                    pool.absorb(amount, now())
                };
                if let Ok(next) = result {
                    pool = next;
                }
                prop_assert!(pool.current_balance >= Decimal::ZERO);
                prop_assert!(pool.is_balanced());
            }
        }
    }
}
