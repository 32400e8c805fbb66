// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issuance saga, manual repayment, and the settlement batch
//!
//! Money moves through sequences of per-record writes against services
//! that offer no cross-record transaction, so every sequence is a saga:
//! each step idempotent under a reference derived from the saga id, later
//! steps only after earlier ones are acknowledged, and failures unwound
//! by compensating writes in the reverse direction.

use adv_core::{
    compute_availability, decide, Advance, AdvanceId, AdvanceStatus, Availability, Clock,
    EngineConfig, IdGen, LiquidityPool, PackageLimits, PoolId, RepaymentDecision, SkipReason,
    TransactionKind, UserId,
};
use adv_adapters::{NotifyAdapter, SubscriptionAdapter};
use adv_storage::{
    AdvanceRepayment, AdvanceStore, CreditRequest, DebitRequest, LedgerStore, PoolReceipt,
    PoolStore, PoolUpdate, PoolUpdateKind, RepaymentRecord, StoreError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::retry::{RetryPolicy, StepError};
use crate::services::Services;

/// Result of a successful issuance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedAdvance {
    pub advance: Advance,
    pub new_balance: Decimal,
}

/// Result of a collected repayment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentOutcome {
    pub advance: Advance,
    pub amount: Decimal,
    pub new_balance: Decimal,
}

/// One advance settled during a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettledAdvance {
    pub advance_id: AdvanceId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub outstanding_after: Decimal,
    pub repaid: bool,
}

/// One advance passed over during a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedAdvance {
    pub advance_id: AdvanceId,
    pub user_id: UserId,
    pub reason: SkipReason,
}

/// One advance whose settlement failed mid-saga
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementFailure {
    pub advance_id: AdvanceId,
    pub user_id: UserId,
    pub error: String,
}

/// Outcome of one settlement cycle.
///
/// Item failures are collected here, never raised: one advance cannot
/// abort the batch for the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub cycle: String,
    pub processed: Vec<SettledAdvance>,
    pub skipped: Vec<SkippedAdvance>,
    pub errors: Vec<SettlementFailure>,
}

enum ItemOutcome {
    Collected(SettledAdvance),
    Skipped(SkipReason),
}

/// Coordinates advances across the ledger, pool, and advance stores
pub struct Engine<S, C, G> {
    services: S,
    retry: RetryPolicy,
    pool_id: PoolId,
    clock: C,
    id_gen: G,
}

impl<S, C, G> Engine<S, C, G>
where
    S: Services,
    C: Clock,
    G: IdGen,
{
    pub fn new(services: S, config: &EngineConfig, clock: C, id_gen: G) -> Self {
        Self {
            retry: RetryPolicy::new(&config.retry),
            pool_id: config.pool_id.clone(),
            services,
            clock,
            id_gen,
        }
    }

    pub fn pool_id(&self) -> &PoolId {
        &self.pool_id
    }

    /// Create the configured pool on first start, or load the existing
    /// record under the same id
    pub async fn ensure_pool(&self, initial_balance: Decimal) -> Result<LiquidityPool, EngineError> {
        let pool = LiquidityPool::new(self.pool_id.clone(), initial_balance, self.clock.now());
        Ok(self.services.pools().create_pool(pool).await?)
    }

    /// How much the user may draw right now.
    ///
    /// Read-only: business refusals carry a reason and nothing is
    /// written. A user without a wallet simply has no performance limit
    /// yet.
    pub async fn availability(&self, user_id: &UserId) -> Result<Availability, EngineError> {
        let (limits, active, wallet_balance, pool) = self.eligibility_inputs(user_id).await?;
        let outstanding_total: Decimal = active.iter().map(|a| a.outstanding_amount).sum();
        Ok(compute_availability(
            &limits,
            outstanding_total,
            wallet_balance,
            pool.current_balance,
        ))
    }

    /// Issue an advance: debit the pool, credit the wallet, record the
    /// liability.
    ///
    /// Preconditions are checked read-only and in order, so a refused
    /// request has no side effects. The saga steps afterwards share one
    /// saga id; a step that keeps failing is unwound rather than left
    /// half-applied.
    pub async fn take_advance(
        &self,
        user_id: &UserId,
        amount: Decimal,
    ) -> Result<IssuedAdvance, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::NonPositiveAmount(amount));
        }

        let (limits, active, wallet_balance, pool) = self.eligibility_inputs(user_id).await?;
        if let Some(existing) = active.first() {
            return Err(EngineError::AdvanceAlreadyOutstanding {
                user: user_id.clone(),
                advance: existing.id.clone(),
            });
        }
        let availability =
            compute_availability(&limits, Decimal::ZERO, wallet_balance, pool.current_balance);
        if amount > availability.limit_remaining.min(availability.performance_limit) {
            return Err(EngineError::LimitExceeded {
                requested: amount,
                available: availability.available,
            });
        }
        if amount > pool.current_balance {
            return Err(EngineError::InsufficientLiquidity {
                available: pool.current_balance,
                requested: amount,
            });
        }

        // Open the wallet up front so the credit step cannot miss it
        self.services.ledger().create_wallet(user_id).await?;

        let saga = self.id_gen.next();
        let advance_id = AdvanceId(self.id_gen.next());
        tracing::info!(
            saga = %saga,
            user = %user_id,
            advance = %advance_id,
            %amount,
            "issuing advance"
        );

        let mut metadata = BTreeMap::new();
        metadata.insert("saga".to_string(), saga.clone());
        metadata.insert("advance_id".to_string(), advance_id.0.clone());

        // Step 1: reserve the funds in the pool. Nothing to unwind on
        // failure; a raced-away balance gets its own reason.
        let pool_ref = format!("{}:pool-debit", saga);
        if let Err(e) = self
            .pool_apply(PoolUpdateKind::Lend, amount, &pool_ref, "pool-debit")
            .await
        {
            return Err(match e {
                StepError {
                    source:
                        StoreError::InsufficientFunds {
                            available,
                            requested,
                        },
                    ..
                } => EngineError::InsufficientLiquidity {
                    available,
                    requested,
                },
                other => Self::step_failed(&saga, other),
            });
        }

        // Step 2: credit the user's wallet
        let credit = CreditRequest {
            user_id: user_id.clone(),
            amount,
            reference: format!("{}:wallet-credit", saga),
            kind: TransactionKind::Deposit,
            description: format!("cash advance {}", advance_id),
            metadata: metadata.clone(),
        };
        let ledger = self.services.ledger();
        let credit_result = self
            .retry
            .run("wallet-credit", move || {
                let ledger = ledger.clone();
                let request = credit.clone();
                async move { ledger.credit(request).await }
            })
            .await;
        let ledger_receipt = match credit_result {
            Ok(receipt) => receipt,
            Err(e) => {
                // Unwind step 1. The pool keeping the funds is the safe
                // direction, so a failed re-credit is alerted, not escalated.
                let reverse_ref = format!("{}:pool-reverse", saga);
                if let Err(reverse_err) = self
                    .pool_apply(PoolUpdateKind::Repay, amount, &reverse_ref, "pool-reverse")
                    .await
                {
                    tracing::error!(
                        saga = %saga,
                        %amount,
                        error = %reverse_err,
                        "pool re-credit failed while unwinding"
                    );
                    self.notify(
                        "alerts",
                        &format!(
                            "issuance {}: pool re-credit of {} failed: {}",
                            saga, amount, reverse_err
                        ),
                    )
                    .await;
                }
                return Err(Self::step_failed(&saga, e));
            }
        };

        // Step 3: record the liability
        let advance = Advance::new(
            advance_id,
            user_id.clone(),
            self.pool_id.clone(),
            amount,
            self.clock.now(),
        );
        let advances = self.services.advances();
        let create_result = self
            .retry
            .run("advance-create", move || {
                let advances = advances.clone();
                let record = advance.clone();
                async move { advances.create(record).await }
            })
            .await;
        let advance = match create_result {
            Ok(created) => created,
            Err(e) => return self.unwind_issuance(&saga, user_id, amount, metadata, e).await,
        };

        tracing::info!(
            saga = %saga,
            advance = %advance.id,
            balance = %ledger_receipt.new_balance,
            "advance issued"
        );
        self.notify(
            "advances",
            &format!(
                "advance {} issued to {} for {}",
                advance.id, user_id, amount
            ),
        )
        .await;

        Ok(IssuedAdvance {
            advance,
            new_balance: ledger_receipt.new_balance,
        })
    }

    /// User-initiated repayment of an explicit amount against their
    /// active advance
    pub async fn repay_manual(
        &self,
        user_id: &UserId,
        amount: Decimal,
    ) -> Result<RepaymentOutcome, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::NonPositiveAmount(amount));
        }
        let active = self.services.advances().active_for_user(user_id).await?;
        let advance = match active.first() {
            Some(advance) => advance.clone(),
            None => return Err(EngineError::NoActiveAdvance(user_id.clone())),
        };
        if amount > advance.outstanding_amount {
            return Err(EngineError::OverRepayment {
                requested: amount,
                outstanding: advance.outstanding_amount,
            });
        }
        let wallet = self.services.ledger().wallet_for_user(user_id).await?;
        if wallet.balance < amount {
            return Err(EngineError::WalletUnderfunded {
                available: wallet.balance,
                requested: amount,
            });
        }

        let saga = self.id_gen.next();
        let base_ref = format!("manual:{}", saga);
        tracing::info!(saga = %saga, user = %user_id, advance = %advance.id, %amount, "manual repayment");

        match self.collect_repayment(&advance, amount, &base_ref).await {
            // The balance check above can lose a race; keep the caller's
            // reason accurate
            Err(EngineError::SagaStepFailed {
                step: "wallet-debit",
                source:
                    StoreError::InsufficientFunds {
                        available,
                        requested,
                    },
                ..
            }) => Err(EngineError::WalletUnderfunded {
                available,
                requested,
            }),
            other => other,
        }
    }

    /// Run one settlement cycle keyed on today's date
    pub async fn run_settlement(&self) -> Result<SettlementReport, EngineError> {
        let cycle = self.clock.now().format("%Y-%m-%d").to_string();
        self.settle_cycle(&cycle).await
    }

    /// Collect repayments from every active advance.
    ///
    /// Re-running a cycle under the same key replays the recorded
    /// receipts instead of charging twice, so a duplicate timer tick or a
    /// crash-retry is safe.
    pub async fn settle_cycle(&self, cycle: &str) -> Result<SettlementReport, EngineError> {
        let advances = self.services.advances().all_active().await?;
        tracing::info!(cycle, advances = advances.len(), "settlement cycle started");

        let mut report = SettlementReport {
            cycle: cycle.to_string(),
            processed: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
        };
        for advance in &advances {
            match self.settle_one(advance, cycle).await {
                Ok(ItemOutcome::Collected(settled)) => {
                    tracing::info!(
                        cycle,
                        advance = %settled.advance_id,
                        amount = %settled.amount,
                        repaid = settled.repaid,
                        "collected"
                    );
                    report.processed.push(settled);
                }
                Ok(ItemOutcome::Skipped(reason)) => {
                    tracing::info!(cycle, advance = %advance.id, %reason, "skipped");
                    report.skipped.push(SkippedAdvance {
                        advance_id: advance.id.clone(),
                        user_id: advance.user_id.clone(),
                        reason,
                    });
                }
                Err(e) => {
                    tracing::error!(cycle, advance = %advance.id, error = %e, "settlement item failed");
                    report.errors.push(SettlementFailure {
                        advance_id: advance.id.clone(),
                        user_id: advance.user_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            cycle,
            processed = report.processed.len(),
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            "settlement cycle complete"
        );
        Ok(report)
    }

    /// Decide and collect for a single advance; failures here are the
    /// item's alone
    async fn settle_one(
        &self,
        advance: &Advance,
        cycle: &str,
    ) -> Result<ItemOutcome, EngineError> {
        let user_id = &advance.user_id;
        let base_ref = format!("{}:{}", advance.id, cycle);

        // A recorded debit means an earlier run of this cycle got partway.
        // Resume with its amount so every step replays or completes; a
        // recomputed amount would no longer match the stored references.
        // A reversed debit was compensated, and the cycle's references are
        // spent, so that advance waits for the next cycle.
        let ledger = self.services.ledger();
        let resumed = match ledger.find_reference(&format!("{}:debit", base_ref)).await? {
            Some(tx) => {
                let reversed = ledger
                    .find_reference(&format!("{}:debit-reverse", base_ref))
                    .await?;
                if reversed.is_some() {
                    return Ok(ItemOutcome::Skipped(SkipReason::AlreadyAttempted));
                }
                Some(tx.amount)
            }
            None => None,
        };

        let amount = match resumed {
            Some(amount) => amount,
            None => {
                let subscription = match self
                    .services
                    .subscriptions()
                    .active_subscription(user_id)
                    .await?
                {
                    Some(subscription) => subscription,
                    None => return Ok(ItemOutcome::Skipped(SkipReason::NoSubscription)),
                };
                let limits = self
                    .services
                    .subscriptions()
                    .package_limits(&subscription.package_id)
                    .await?;

                let wallet = match ledger.wallet_for_user(user_id).await {
                    Ok(wallet) if wallet.is_active() => wallet,
                    Ok(_) => return Ok(ItemOutcome::Skipped(SkipReason::WalletUnavailable)),
                    Err(StoreError::NotFound { .. }) => {
                        return Ok(ItemOutcome::Skipped(SkipReason::WalletUnavailable))
                    }
                    Err(e) => return Err(e.into()),
                };

                let weeks = advance.weeks_open(self.clock.now());
                match decide(
                    wallet.balance,
                    advance.outstanding_amount,
                    limits.repay_rate,
                    weeks,
                ) {
                    RepaymentDecision::Collect(amount) => amount,
                    RepaymentDecision::Skip(reason) => return Ok(ItemOutcome::Skipped(reason)),
                }
            }
        };

        match self.collect_repayment(advance, amount, &base_ref).await {
            Ok(outcome) => Ok(ItemOutcome::Collected(SettledAdvance {
                advance_id: advance.id.clone(),
                user_id: user_id.clone(),
                amount,
                outstanding_after: outcome.advance.outstanding_amount,
                repaid: outcome.advance.status == AdvanceStatus::Repaid,
            })),
            // Raced a concurrent spend; collection stays opportunistic
            Err(EngineError::SagaStepFailed {
                step: "wallet-debit",
                source: StoreError::InsufficientFunds { .. },
                ..
            }) => Ok(ItemOutcome::Skipped(SkipReason::InsufficientFunds)),
            Err(e) => Err(e),
        }
    }

    /// Repayment saga: wallet debit, outstanding reduction, pool credit,
    /// audit append.
    ///
    /// Every reference hangs off `base_ref`, so a repeated run replays
    /// recorded receipts instead of double-charging.
    async fn collect_repayment(
        &self,
        advance: &Advance,
        amount: Decimal,
        base_ref: &str,
    ) -> Result<RepaymentOutcome, EngineError> {
        let user_id = advance.user_id.clone();
        let mut metadata = BTreeMap::new();
        metadata.insert("advance_id".to_string(), advance.id.0.clone());

        // Step 1: take the funds
        let debit = DebitRequest {
            user_id: user_id.clone(),
            amount,
            reference: format!("{}:debit", base_ref),
            kind: TransactionKind::Payment,
            description: format!("repayment on advance {}", advance.id),
            metadata: metadata.clone(),
        };
        let ledger = self.services.ledger();
        let debit_receipt = self
            .retry
            .run("wallet-debit", move || {
                let ledger = ledger.clone();
                let request = debit.clone();
                async move { ledger.debit(request).await }
            })
            .await
            .map_err(|e| Self::step_failed(base_ref, e))?;

        // Step 2: reduce the liability
        let repayment = AdvanceRepayment {
            advance_id: advance.id.clone(),
            reference: format!("{}:outstanding", base_ref),
            amount,
            at: self.clock.now(),
        };
        let advances = self.services.advances();
        let repay_result = self
            .retry
            .run("outstanding-reduce", move || {
                let advances = advances.clone();
                let repayment = repayment.clone();
                async move { advances.apply_repayment(repayment).await }
            })
            .await;
        let advance_receipt = match repay_result {
            Ok(receipt) => receipt,
            Err(e) => {
                // Give the money back; a debited wallet with an unreduced
                // liability overcharges the user
                let refund = CreditRequest {
                    user_id: user_id.clone(),
                    amount,
                    reference: format!("{}:debit-reverse", base_ref),
                    kind: TransactionKind::Deposit,
                    description: format!("repayment reversal on advance {}", advance.id),
                    metadata: metadata.clone(),
                };
                let ledger = self.services.ledger();
                let refund_result = self
                    .retry
                    .run("debit-reverse", move || {
                        let ledger = ledger.clone();
                        let request = refund.clone();
                        async move { ledger.credit(request).await }
                    })
                    .await;
                if let Err(refund_err) = refund_result {
                    let detail = format!(
                        "outstanding-reduce failed ({}) and the refund failed ({}); wallet {} is short {}",
                        e, refund_err, user_id, amount
                    );
                    tracing::error!(saga = base_ref, detail = %detail, "reconciliation required");
                    self.notify(
                        "alerts",
                        &format!("reconciliation required for repayment {}: {}", base_ref, detail),
                    )
                    .await;
                    return Err(EngineError::ReconciliationRequired {
                        saga: base_ref.to_string(),
                        detail,
                    });
                }
                return Err(Self::step_failed(base_ref, e));
            }
        };

        // Step 3: return the funds to the pool. The wallet and advance
        // already carry the repayment; a re-run under the same references
        // retries only this step.
        let pool_ref = format!("{}:pool", base_ref);
        if let Err(e) = self
            .pool_apply(PoolUpdateKind::Repay, amount, &pool_ref, "pool-credit")
            .await
        {
            tracing::error!(saga = base_ref, error = %e, "pool credit failed after repayment applied");
            self.notify(
                "alerts",
                &format!("repayment {}: pool credit of {} failed: {}", base_ref, amount, e),
            )
            .await;
            return Err(Self::step_failed(base_ref, e));
        }

        // Step 4: audit log; losing it never claws back a collected
        // repayment
        let record = RepaymentRecord {
            id: self.id_gen.next(),
            advance_id: advance.id.clone(),
            user_id: user_id.clone(),
            amount,
            reference: base_ref.to_string(),
            recorded_at: self.clock.now(),
        };
        let advances = self.services.advances();
        let log_result = self
            .retry
            .run("repayment-log", move || {
                let advances = advances.clone();
                let record = record.clone();
                async move { advances.record_repayment(record).await }
            })
            .await;
        if let Err(e) = log_result {
            tracing::error!(saga = base_ref, error = %e, "repayment audit append failed");
            self.notify(
                "alerts",
                &format!("repayment {}: audit append failed: {}", base_ref, e),
            )
            .await;
        }

        if advance_receipt.advance.status == AdvanceStatus::Repaid && !advance_receipt.replayed {
            self.notify(
                "advances",
                &format!("advance {} fully repaid", advance.id),
            )
            .await;
        }

        Ok(RepaymentOutcome {
            advance: advance_receipt.advance,
            amount,
            new_balance: debit_receipt.new_balance,
        })
    }

    /// Step 3 of issuance failed: the wallet holds funds with no tracked
    /// liability. Pull the credit back, then return the pool's money.
    async fn unwind_issuance(
        &self,
        saga: &str,
        user_id: &UserId,
        amount: Decimal,
        metadata: BTreeMap<String, String>,
        cause: StepError,
    ) -> Result<IssuedAdvance, EngineError> {
        tracing::warn!(saga, user = %user_id, %amount, error = %cause, "unwinding issuance");

        let debit = DebitRequest {
            user_id: user_id.clone(),
            amount,
            reference: format!("{}:wallet-reverse", saga),
            kind: TransactionKind::Withdrawal,
            description: "cash advance issuance reversal".to_string(),
            metadata,
        };
        let ledger = self.services.ledger();
        let debit_result = self
            .retry
            .run("wallet-reverse", move || {
                let ledger = ledger.clone();
                let request = debit.clone();
                async move { ledger.debit(request).await }
            })
            .await;

        if let Err(reverse_err) = debit_result {
            let detail = format!(
                "advance-create failed ({}) and the compensating debit failed ({}); wallet of {} holds {} untracked",
                cause, reverse_err, user_id, amount
            );
            tracing::error!(saga, detail = %detail, "reconciliation required");
            self.notify(
                "alerts",
                &format!("reconciliation required for issuance {}: {}", saga, detail),
            )
            .await;
            return Err(EngineError::ReconciliationRequired {
                saga: saga.to_string(),
                detail,
            });
        }

        let reverse_ref = format!("{}:pool-reverse", saga);
        if let Err(reverse_err) = self
            .pool_apply(PoolUpdateKind::Repay, amount, &reverse_ref, "pool-reverse")
            .await
        {
            tracing::error!(saga, error = %reverse_err, "pool re-credit failed while unwinding");
            self.notify(
                "alerts",
                &format!(
                    "issuance {}: pool re-credit of {} failed: {}",
                    saga, amount, reverse_err
                ),
            )
            .await;
        }

        Err(Self::step_failed(saga, cause))
    }

    /// Apply a pool movement, re-reading the version on every attempt so
    /// a conflict heals on retry
    async fn pool_apply(
        &self,
        kind: PoolUpdateKind,
        amount: Decimal,
        reference: &str,
        step: &'static str,
    ) -> Result<PoolReceipt, StepError> {
        let pools = self.services.pools();
        let pool_id = self.pool_id.clone();
        let reference = reference.to_string();
        self.retry
            .run(step, move || {
                let pools = pools.clone();
                let pool_id = pool_id.clone();
                let reference = reference.clone();
                async move {
                    let pool = pools.pool(&pool_id).await?;
                    pools
                        .apply(PoolUpdate {
                            pool_id: pool_id.clone(),
                            reference,
                            kind,
                            amount,
                            expected_version: pool.version,
                        })
                        .await
                }
            })
            .await
    }

    /// Gather the read-only inputs behind both the availability query and
    /// the issuance preconditions
    async fn eligibility_inputs(
        &self,
        user_id: &UserId,
    ) -> Result<(PackageLimits, Vec<Advance>, Decimal, LiquidityPool), EngineError> {
        let subscription = match self
            .services
            .subscriptions()
            .active_subscription(user_id)
            .await?
        {
            Some(subscription) => subscription,
            None => return Err(EngineError::NoActiveSubscription(user_id.clone())),
        };
        let limits = self
            .services
            .subscriptions()
            .package_limits(&subscription.package_id)
            .await?;
        let active = self.services.advances().active_for_user(user_id).await?;
        let wallet_balance = match self.services.ledger().wallet_for_user(user_id).await {
            Ok(wallet) => wallet.balance,
            Err(StoreError::NotFound { .. }) => Decimal::ZERO,
            Err(e) => return Err(e.into()),
        };
        let pool = self.services.pools().pool(&self.pool_id).await?;
        Ok((limits, active, wallet_balance, pool))
    }

    /// Delivery failures never fail the money movement that triggered
    /// them
    async fn notify(&self, channel: &str, message: &str) {
        if let Err(e) = self.services.notifier().send(channel, message).await {
            tracing::warn!(channel, error = %e, "notification failed");
        }
    }

    fn step_failed(saga: &str, e: StepError) -> EngineError {
        EngineError::SagaStepFailed {
            saga: saga.to_string(),
            step: e.step,
            attempts: e.attempts,
            source: e.source,
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
