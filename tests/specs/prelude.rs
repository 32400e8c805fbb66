//! Shared harness for the engine specs.
//!
//! `Books` bundles an engine with the store it runs over. Seeding goes
//! through the store traits only, so the same helpers work for the
//! in-memory doubles and the on-disk books.

pub use std::collections::BTreeMap;
pub use std::path::Path;

pub use adv_adapters::{FakeNotifyAdapter, FixedSubscriptions};
pub use adv_core::{
    AdvanceStatus, EngineConfig, FakeClock, LiquidityPool, PackageLimits, SequentialIdGen,
    SkipReason, TransactionKind, UserId,
};
pub use adv_engine::{Engine, EngineError, ServiceSet};
pub use adv_storage::{
    AdvanceStore, CreditRequest, DebitRequest, JsonStore, LedgerStore, MemoryStore, PoolStore,
    PoolUpdate, PoolUpdateKind, StoreOp,
};
pub use chrono::{DateTime, Duration, TimeZone, Utc};
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
pub use tempfile::TempDir;

/// Noon on the opening Monday
pub fn opening_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
}

/// Engine over one store.
///
/// Opens with a pool float of 2000.00 and a "basic" package: 500.00
/// weekly limit, 20% repayment rate, advances up to 50% of the wallet
/// balance.
pub struct Books<S: LedgerStore + PoolStore + AdvanceStore> {
    pub engine:
        Engine<ServiceSet<S, S, S, FixedSubscriptions, FakeNotifyAdapter>, FakeClock, SequentialIdGen>,
    pub store: S,
    pub subs: FixedSubscriptions,
    pub notify: FakeNotifyAdapter,
    pub clock: FakeClock,
}

pub async fn memory_books() -> Books<MemoryStore> {
    Books::open_with(MemoryStore::new()).await
}

pub async fn disk_books(path: &Path) -> Books<JsonStore> {
    Books::open_with(JsonStore::open(path).unwrap()).await
}

impl<S: LedgerStore + PoolStore + AdvanceStore> Books<S> {
    pub async fn open_with(store: S) -> Self {
        Self::open_at(store, opening_day(), "s").await
    }

    /// Open the books at a given instant with a given id prefix.
    ///
    /// Reopening the same store simulates a daemon restart: adapters and
    /// id generator are fresh, the records carry the history.
    pub async fn open_at(store: S, now: DateTime<Utc>, id_prefix: &str) -> Self {
        let subs = FixedSubscriptions::new();
        subs.define_package(
            "basic",
            PackageLimits {
                weekly_limit: dec!(500.00),
                repay_rate: dec!(20.00),
                advance_percentage: dec!(50.00),
            },
        );
        let notify = FakeNotifyAdapter::new();
        let clock = FakeClock::at(now);
        let services = ServiceSet {
            ledger: store.clone(),
            pools: store.clone(),
            advances: store.clone(),
            subscriptions: subs.clone(),
            notifier: notify.clone(),
        };
        let engine = Engine::new(
            services,
            &EngineConfig::for_testing(),
            clock.clone(),
            SequentialIdGen::new(id_prefix),
        );
        engine.ensure_pool(dec!(2000.00)).await.unwrap();
        Books {
            engine,
            store,
            subs,
            notify,
            clock,
        }
    }

    /// Subscribe a user to the basic package and open a funded wallet
    pub async fn member(&self, id: &str, balance: Decimal) -> UserId {
        let user_id = UserId(id.to_string());
        self.subs.subscribe(user_id.clone(), "basic");
        self.store.create_wallet(&user_id).await.unwrap();
        if balance > Decimal::ZERO {
            self.store
                .credit(CreditRequest {
                    user_id: user_id.clone(),
                    amount: balance,
                    reference: format!("payroll:{}", id),
                    kind: TransactionKind::Deposit,
                    description: "payroll deposit".to_string(),
                    metadata: BTreeMap::new(),
                })
                .await
                .unwrap();
        }
        user_id
    }

    pub async fn wallet_balance(&self, user_id: &UserId) -> Decimal {
        self.store.wallet_for_user(user_id).await.unwrap().balance
    }

    pub async fn pool(&self) -> LiquidityPool {
        self.store.pool(self.engine.pool_id()).await.unwrap()
    }

    /// Lend pool funds out of band so a spec can squeeze liquidity
    pub async fn drain_pool(&self, amount: Decimal) {
        let pool = self.pool().await;
        self.store
            .apply(PoolUpdate {
                pool_id: pool.id.clone(),
                reference: format!("drain:{}", pool.version),
                kind: PoolUpdateKind::Lend,
                amount,
                expected_version: pool.version,
            })
            .await
            .unwrap();
    }
}
