//! Eligibility specs
//!
//! Availability is the least of the remaining weekly limit, the
//! performance limit, and the pool balance. Outstanding debt consumes
//! the limit without zeroing it; only issuance enforces the hard
//! one-active-advance gate.

use crate::prelude::*;

#[tokio::test]
async fn available_is_the_least_of_limit_performance_and_pool() {
    let books = memory_books().await;
    let user = books.member("u-1", dec!(1000.00)).await;

    let availability = books.engine.availability(&user).await.unwrap();

    assert_eq!(availability.weekly_limit, dec!(500.00));
    assert_eq!(availability.used, Decimal::ZERO);
    assert_eq!(availability.limit_remaining, dec!(500.00));
    assert_eq!(availability.performance_limit, dec!(500.00));
    assert_eq!(availability.pool_balance, dec!(2000.00));
    assert_eq!(availability.available, dec!(500.00));
}

#[tokio::test]
async fn debt_consumes_the_weekly_limit_without_zeroing_it() {
    let books = memory_books().await;
    let user = books.member("u-1", dec!(1000.00)).await;
    books
        .engine
        .take_advance(&user, dec!(200.00))
        .await
        .unwrap();

    let availability = books.engine.availability(&user).await.unwrap();

    assert_eq!(availability.used, dec!(200.00));
    assert_eq!(availability.limit_remaining, dec!(300.00));
    assert_eq!(availability.available, dec!(300.00));
}

#[tokio::test]
async fn a_thin_pool_caps_availability() {
    let books = memory_books().await;
    let user = books.member("u-1", dec!(1000.00)).await;
    books.drain_pool(dec!(1700.00)).await;

    let availability = books.engine.availability(&user).await.unwrap();

    assert_eq!(availability.pool_balance, dec!(300.00));
    assert_eq!(availability.available, dec!(300.00));
}

#[tokio::test]
async fn a_user_without_a_package_is_refused() {
    let books = memory_books().await;
    let user = UserId("u-ghost".to_string());

    let err = books.engine.availability(&user).await.unwrap_err();

    assert!(matches!(&err, EngineError::NoActiveSubscription(u) if *u == user));
    assert!(err.is_business());
}
