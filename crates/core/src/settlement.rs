// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repayment schedule math
//!
//! Each settlement cycle collects a percentage of the wallet balance, with
//! a catch-up floor that keeps the advance on track to clear within the
//! amortization horizon. Collection is opportunistic: an underfunded
//! wallet skips the cycle and the balance carries to the next one.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Weeks an advance is amortized over before full collection is due
pub const AMORTIZATION_WEEKS: i64 = 4;

/// Why a settlement cycle left an advance alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Computed repayment was zero
    NothingDue,
    /// Wallet balance below the computed repayment
    InsufficientFunds,
    /// Wallet missing or not active
    WalletUnavailable,
    /// No active subscription to price the repayment
    NoSubscription,
    /// An earlier run of this cycle was compensated; its references are
    /// spent until the next cycle
    AlreadyAttempted,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NothingDue => write!(f, "nothing due"),
            SkipReason::InsufficientFunds => write!(f, "insufficient wallet funds"),
            SkipReason::WalletUnavailable => write!(f, "wallet unavailable"),
            SkipReason::NoSubscription => write!(f, "no active subscription"),
            SkipReason::AlreadyAttempted => write!(f, "already attempted this cycle"),
        }
    }
}

/// Outcome of the repayment calculation for one advance
#[derive(Debug, Clone, PartialEq)]
pub enum RepaymentDecision {
    Collect(Decimal),
    Skip(SkipReason),
}

/// Amount to collect this cycle.
///
/// The standard collection is `wallet_balance * repay_rate%`; the catch-up
/// floor is the outstanding balance spread over the weeks left in the
/// amortization horizon (never less than one week). The result never
/// exceeds the outstanding balance.
pub fn repayment_amount(
    wallet_balance: Decimal,
    outstanding: Decimal,
    repay_rate: Decimal,
    weeks_elapsed: u32,
) -> Decimal {
    let standard = wallet_balance * repay_rate / Decimal::ONE_HUNDRED;
    let weeks_left = (AMORTIZATION_WEEKS - i64::from(weeks_elapsed)).max(1);
    let required = outstanding / Decimal::from(weeks_left);
    standard
        .max(required)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .min(outstanding)
}

/// Decide what to collect from a wallet this cycle
pub fn decide(
    wallet_balance: Decimal,
    outstanding: Decimal,
    repay_rate: Decimal,
    weeks_elapsed: u32,
) -> RepaymentDecision {
    let amount = repayment_amount(wallet_balance, outstanding, repay_rate, weeks_elapsed);
    if amount <= Decimal::ZERO {
        return RepaymentDecision::Skip(SkipReason::NothingDue);
    }
    if wallet_balance < amount {
        return RepaymentDecision::Skip(SkipReason::InsufficientFunds);
    }
    RepaymentDecision::Collect(amount)
}

#[cfg(test)]
#[path = "settlement_tests.rs"]
mod tests;
