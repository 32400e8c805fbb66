// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn policy(max_attempts: u32, op_timeout_ms: u64) -> RetryPolicy {
    RetryPolicy::new(&RetryConfig {
        max_attempts,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        op_timeout: Duration::from_millis(op_timeout_ms),
    })
}

#[tokio::test]
async fn first_success_needs_no_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result = policy(3, 1000)
        .run("step", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StoreError>(7)
            }
        })
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_errors_retry_until_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result = policy(3, 1000)
        .run("step", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    return Err(StoreError::Unavailable("flaky".into()));
                }
                Ok(7)
            }
        })
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let err = policy(3, 1000)
        .run("step", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(StoreError::Unavailable("down".into()))
            }
        })
        .await
        .unwrap_err();

    assert_eq!(err.step, "step");
    assert_eq!(err.attempts, 3);
    assert!(matches!(err.source, StoreError::Unavailable(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn business_errors_are_terminal() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let err = policy(3, 1000)
        .run("step", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(StoreError::InsufficientFunds {
                    available: dec!(10.00),
                    requested: dec!(25.00),
                })
            }
        })
        .await
        .unwrap_err();

    assert_eq!(err.attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "no retry on business errors");
}

#[tokio::test]
async fn conflicts_retry_so_a_reread_can_win() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result = policy(3, 1000)
        .run("step", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(StoreError::Conflict {
                        kind: "pool".into(),
                        id: "pool-test".into(),
                        expected: 3,
                        actual: 4,
                    });
                }
                Ok(7)
            }
        })
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn timeout_counts_as_unknown_outcome_and_retries() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result = policy(3, 25)
        .run("step", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    // Never answers; the policy must cut it off
                    std::future::pending::<()>().await;
                }
                Ok::<_, StoreError>(7)
            }
        })
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn timeout_exhaustion_reports_unavailable() {
    let err = policy(2, 10)
        .run("step", || async {
            std::future::pending::<()>().await;
            Ok::<_, StoreError>(7)
        })
        .await
        .unwrap_err();

    assert_eq!(err.attempts, 2);
    assert!(matches!(err.source, StoreError::Unavailable(_)));
}
