// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service bundle the engine works through

use adv_adapters::notify::NotifyAdapter;
use adv_adapters::subscriptions::SubscriptionAdapter;
use adv_storage::{AdvanceStore, LedgerStore, PoolStore};

/// Bundle of the engine's collaborators.
///
/// Every store and adapter is injected, so tests substitute in-memory
/// doubles for the remote record services.
pub trait Services: Clone + Send + Sync + 'static {
    type Ledger: LedgerStore;
    type Pools: PoolStore;
    type Advances: AdvanceStore;
    type Subscriptions: SubscriptionAdapter;
    type Notifier: NotifyAdapter;

    fn ledger(&self) -> Self::Ledger;
    fn pools(&self) -> Self::Pools;
    fn advances(&self) -> Self::Advances;
    fn subscriptions(&self) -> Self::Subscriptions;
    fn notifier(&self) -> Self::Notifier;
}

/// Concrete service bundle assembled at startup
#[derive(Clone)]
pub struct ServiceSet<L, P, A, S, N> {
    pub ledger: L,
    pub pools: P,
    pub advances: A,
    pub subscriptions: S,
    pub notifier: N,
}

impl<L, P, A, S, N> Services for ServiceSet<L, P, A, S, N>
where
    L: LedgerStore,
    P: PoolStore,
    A: AdvanceStore,
    S: SubscriptionAdapter,
    N: NotifyAdapter,
{
    type Ledger = L;
    type Pools = P;
    type Advances = A;
    type Subscriptions = S;
    type Notifier = N;

    fn ledger(&self) -> Self::Ledger {
        self.ledger.clone()
    }

    fn pools(&self) -> Self::Pools {
        self.pools.clone()
    }

    fn advances(&self) -> Self::Advances {
        self.advances.clone()
    }

    fn subscriptions(&self) -> Self::Subscriptions {
        self.subscriptions.clone()
    }

    fn notifier(&self) -> Self::Notifier {
        self.notifier.clone()
    }
}
