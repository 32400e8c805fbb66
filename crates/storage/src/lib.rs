// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Record stores for the advance engine
//!
//! The stores model remote record services: one record per call, no
//! multi-record transactions. Every mutating call carries a caller
//! reference; replaying a reference returns the originally recorded
//! outcome without re-applying the effect. `MemoryStore` backs tests,
//! `JsonStore` backs the standalone daemon.

mod error;
mod journal;
mod json;
mod memory;
mod traits;

pub use error::StoreError;
pub use journal::{Journal, JournalEntry};
pub use json::JsonStore;
pub use memory::{MemoryStore, StoreCall, StoreOp};
pub use traits::{
    AdvanceReceipt, AdvanceRepayment, AdvanceStore, CreditRequest, DebitRequest, LedgerReceipt,
    LedgerStore, PoolReceipt, PoolStore, PoolUpdate, PoolUpdateKind, RepaymentRecord,
};
