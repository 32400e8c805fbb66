// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for engine operations

use adv_core::{AdvanceId, UserId};
use adv_storage::StoreError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while issuing or settling advances
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("amount must be positive: {0}")]
    NonPositiveAmount(Decimal),
    #[error("no active subscription for user {0}")]
    NoActiveSubscription(UserId),
    #[error("existing advance outstanding: {advance}")]
    AdvanceAlreadyOutstanding { user: UserId, advance: AdvanceId },
    #[error("requested {requested} exceeds available limit {available}")]
    LimitExceeded {
        requested: Decimal,
        available: Decimal,
    },
    #[error("issuer pool insufficient funds: have {available}, need {requested}")]
    InsufficientLiquidity {
        available: Decimal,
        requested: Decimal,
    },
    #[error("repayment {requested} exceeds outstanding {outstanding}")]
    OverRepayment {
        requested: Decimal,
        outstanding: Decimal,
    },
    #[error("wallet has {available}, repayment needs {requested}")]
    WalletUnderfunded {
        available: Decimal,
        requested: Decimal,
    },
    #[error("no active advance for user {0}")]
    NoActiveAdvance(UserId),
    #[error("saga {saga} failed at {step} after {attempts} attempts: {source}")]
    SagaStepFailed {
        saga: String,
        step: &'static str,
        attempts: u32,
        #[source]
        source: StoreError,
    },
    #[error("reconciliation required for saga {saga}: {detail}")]
    ReconciliationRequired { saga: String, detail: String },
    #[error("subscription error: {0}")]
    Subscription(#[from] adv_adapters::subscriptions::SubscriptionError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether the message is a business reason safe to show the caller.
    ///
    /// Saga and reconciliation failures surface as a generic message;
    /// their detail goes to the log for operator follow-up.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            EngineError::NonPositiveAmount(_)
                | EngineError::NoActiveSubscription(_)
                | EngineError::AdvanceAlreadyOutstanding { .. }
                | EngineError::LimitExceeded { .. }
                | EngineError::InsufficientLiquidity { .. }
                | EngineError::OverRepayment { .. }
                | EngineError::WalletUnderfunded { .. }
                | EngineError::NoActiveAdvance(_)
        )
    }
}
