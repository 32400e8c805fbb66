// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Advance daemon internals
//!
//! The `advd` binary lives in `main.rs`; this library carries the
//! protocol, lifecycle, and server so the CLI can speak to the daemon
//! with the same types.

pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use protocol::{Request, Response, PROTOCOL_VERSION};
