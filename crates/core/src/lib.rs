// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! adv-core: Core library for the advance (adv) settlement engine
//!
//! This crate provides:
//! - Domain records for wallets, liquidity pools, and cash advances
//! - Pure eligibility and repayment math
//! - Clock and id abstractions for deterministic tests
//! - Engine configuration

pub mod clock;
pub mod id;

// Records (order matters for dependencies)
pub mod wallet;
pub mod pool;
pub mod advance;
pub mod subscription;

// Pure business math
pub mod eligibility;
pub mod settlement;

pub mod config;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};

pub use advance::{Advance, AdvanceError, AdvanceId, AdvanceStatus};
pub use pool::{LiquidityPool, PoolError, PoolId};
pub use subscription::{PackageLimits, Subscription};
pub use wallet::{
    completed_total, Transaction, TransactionId, TransactionKind, TransactionStatus, UserId,
    Wallet, WalletId, WalletStatus,
};

pub use config::{ConfigError, EngineConfig, RetryConfig, SettlementConfig};
pub use eligibility::{compute_availability, Availability};
pub use settlement::{decide, repayment_amount, RepaymentDecision, SkipReason, AMORTIZATION_WEEKS};
