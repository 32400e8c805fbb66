// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Advance issuance and settlement engine

mod engine;
mod error;
mod retry;
mod services;

pub use engine::{
    Engine, IssuedAdvance, RepaymentOutcome, SettledAdvance, SettlementFailure, SettlementReport,
    SkippedAdvance,
};
pub use error::EngineError;
pub use retry::{RetryPolicy, StepError};
pub use services::{ServiceSet, Services};
