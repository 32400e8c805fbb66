// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advance eligibility math
//!
//! Pure calculation over inputs read upstream. The caller gathers the
//! user's package limits, outstanding debt, wallet balance, and the pool
//! balance; this module only does arithmetic, so every rule is unit
//! testable without IO.

use crate::subscription::PackageLimits;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Breakdown of how much a user may draw right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    pub weekly_limit: Decimal,
    /// Total outstanding across the user's active advances
    pub used: Decimal,
    pub limit_remaining: Decimal,
    /// Wallet-performance cap: balance scaled by the package percentage
    pub performance_limit: Decimal,
    pub pool_balance: Decimal,
    pub available: Decimal,
}

/// Compute how much a user may draw.
///
/// Outstanding debt shrinks the weekly headroom rather than zeroing it;
/// the one-active-advance rule is enforced at issuance, not here.
/// `outstanding_total` sums across active advances so a duplicate record
/// reduces availability instead of crashing the query.
pub fn compute_availability(
    limits: &PackageLimits,
    outstanding_total: Decimal,
    wallet_balance: Decimal,
    pool_balance: Decimal,
) -> Availability {
    let limit_remaining = (limits.weekly_limit - outstanding_total).max(Decimal::ZERO);
    // Truncate to cents so we never offer more than the rate allows
    let performance_limit = (wallet_balance * limits.advance_percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let available = limit_remaining
        .min(performance_limit)
        .min(pool_balance)
        .max(Decimal::ZERO);
    Availability {
        weekly_limit: limits.weekly_limit,
        used: outstanding_total,
        limit_remaining,
        performance_limit,
        pool_balance,
        available,
    }
}

#[cfg(test)]
#[path = "eligibility_tests.rs"]
mod tests;
