// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rust_decimal_macros::dec;

fn basic_package() -> PackageLimits {
    PackageLimits {
        weekly_limit: dec!(5000),
        repay_rate: dec!(10),
        advance_percentage: dec!(50),
    }
}

#[tokio::test]
async fn lookup_returns_subscription_for_registered_user() {
    let subs = FixedSubscriptions::new();
    subs.define_package("basic", basic_package());
    subs.subscribe(UserId::from("user-1"), "basic");

    let found = subs
        .active_subscription(&UserId::from("user-1"))
        .await
        .unwrap();
    let subscription = found.unwrap();
    assert_eq!(subscription.user_id, UserId::from("user-1"));
    assert_eq!(subscription.package_id, "basic");
}

#[tokio::test]
async fn lookup_returns_none_for_unknown_user() {
    let subs = FixedSubscriptions::new();

    let found = subs
        .active_subscription(&UserId::from("stranger"))
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn unsubscribe_removes_the_entry() {
    let subs = FixedSubscriptions::new();
    subs.define_package("basic", basic_package());
    subs.subscribe(UserId::from("user-1"), "basic");

    subs.unsubscribe(&UserId::from("user-1"));

    let found = subs
        .active_subscription(&UserId::from("user-1"))
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn package_limits_round_trip() {
    let subs = FixedSubscriptions::new();
    subs.define_package(
        "premium",
        PackageLimits {
            weekly_limit: dec!(20000),
            repay_rate: dec!(15),
            advance_percentage: dec!(75),
        },
    );

    let limits = subs.package_limits("premium").await.unwrap();
    assert_eq!(limits.weekly_limit, dec!(20000));
    assert_eq!(limits.repay_rate, dec!(15));
    assert_eq!(limits.advance_percentage, dec!(75));
}

#[tokio::test]
async fn unknown_package_is_an_error() {
    let subs = FixedSubscriptions::new();

    let err = subs.package_limits("ghost").await.unwrap_err();
    assert!(matches!(err, SubscriptionError::UnknownPackage(ref id) if id == "ghost"));
}

#[tokio::test]
async fn clones_share_the_same_table() {
    let subs = FixedSubscriptions::new();
    let other = subs.clone();

    subs.define_package("basic", basic_package());
    other.subscribe(UserId::from("user-1"), "basic");

    let found = subs
        .active_subscription(&UserId::from("user-1"))
        .await
        .unwrap();
    assert!(found.is_some());
    assert!(other.package_limits("basic").await.is_ok());
}
