// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription and package limit types
//!
//! Advances are priced by the package a user subscribes to. These records
//! live in the subscription service; the engine only reads them.

use crate::wallet::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Link between a user and the package that prices their advances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: UserId,
    pub package_id: String,
}

/// Limits derived from a subscription package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageLimits {
    /// Cap on a user's total outstanding advances
    pub weekly_limit: Decimal,
    /// Percent of wallet balance collected per settlement cycle
    pub repay_rate: Decimal,
    /// Percent of wallet balance a user may draw as an advance
    pub advance_percentage: Decimal,
}
