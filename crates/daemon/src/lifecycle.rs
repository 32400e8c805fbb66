// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, configuration.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use adv_adapters::notify::{NotifyAdapter, NotifyError};
use adv_adapters::subscriptions::{SubscriptionAdapter, SubscriptionError};
use adv_adapters::{
    FixedSubscriptions, HttpSubscriptionClient, NoOpNotifyAdapter, TracedNotifyAdapter,
    TracedSubscriptionAdapter, WebhookNotifier,
};
use adv_core::{
    ConfigError, EngineConfig, PackageLimits, Subscription, SystemClock, UserId, UuidIdGen,
};
use adv_engine::{Engine, EngineError, ServiceSet};
use adv_storage::{JsonStore, StoreError};
use async_trait::async_trait;
use fs2::FileExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

/// Startup marker prefix written to the log before anything else.
/// The CLI uses this to find where the current startup attempt begins.
/// Full format: "--- advd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- advd: starting (pid: ";

/// Engine with the daemon's concrete stores and adapters (wrapped with tracing)
pub type DaemonEngine = Engine<
    ServiceSet<
        JsonStore,
        JsonStore,
        JsonStore,
        TracedSubscriptionAdapter<SubscriptionSource>,
        TracedNotifyAdapter<NotifySink>,
    >,
    SystemClock,
    UuidIdGen,
>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the books: settings, stores, nothing else
    pub data_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the settings file (TOML)
    pub settings_path: PathBuf,
    /// Path to the record store directory
    pub store_path: PathBuf,
}

impl Config {
    /// Create config for a data directory
    pub fn for_data_dir(data_dir: &Path) -> Result<Self, LifecycleError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| LifecycleError::DataDir(data_dir.to_path_buf(), e))?;
        let canonical = data_dir
            .canonicalize()
            .map_err(|e| LifecycleError::DataDir(data_dir.to_path_buf(), e))?;

        let hash = data_dir_hash(&canonical);
        let state_dir = state_dir()?.join("books").join(&hash);
        let socket_dir = socket_dir()?;

        Ok(Self {
            socket_path: socket_dir.join(format!("{}.sock", hash)),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            settings_path: canonical.join("advance.toml"),
            store_path: canonical.join("store"),
            data_dir: canonical,
        })
    }
}

/// Daemon settings, loaded from `advance.toml` in the data directory.
///
/// Everything is optional; a missing file runs the engine on defaults
/// with an empty pool and no subscribers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub pool: PoolSettings,
    pub notify: NotifySettings,
    pub subscriptions: SubscriptionSettings,
}

impl Settings {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Liquidity pool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Balance the pool is created with; ignored once the pool exists
    pub initial_balance: Decimal,
}

/// Notification settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    /// Webhook endpoint for notifications; silent when unset
    pub webhook_url: Option<String>,
}

/// Subscription lookup settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionSettings {
    /// Remote subscription service; when unset, the fixed table below applies
    pub service_url: Option<String>,
    pub packages: Vec<PackageSetting>,
    pub subscribers: Vec<SubscriberSetting>,
}

/// One package in the fixed subscription table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSetting {
    pub id: String,
    #[serde(flatten)]
    pub limits: PackageLimits,
}

/// One subscriber in the fixed subscription table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberSetting {
    pub user_id: String,
    pub package: String,
}

/// Subscription adapter chosen by config: remote service or fixed table
#[derive(Clone)]
pub enum SubscriptionSource {
    Service(HttpSubscriptionClient),
    Fixed(FixedSubscriptions),
}

impl SubscriptionSource {
    fn from_settings(settings: &SubscriptionSettings) -> Self {
        if let Some(url) = &settings.service_url {
            return Self::Service(HttpSubscriptionClient::new(url.as_str()));
        }
        let fixed = FixedSubscriptions::new();
        for package in &settings.packages {
            fixed.define_package(package.id.as_str(), package.limits.clone());
        }
        for subscriber in &settings.subscribers {
            fixed.subscribe(
                UserId(subscriber.user_id.clone()),
                subscriber.package.as_str(),
            );
        }
        Self::Fixed(fixed)
    }
}

#[async_trait]
impl SubscriptionAdapter for SubscriptionSource {
    async fn active_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        match self {
            Self::Service(client) => client.active_subscription(user_id).await,
            Self::Fixed(table) => table.active_subscription(user_id).await,
        }
    }

    async fn package_limits(&self, package_id: &str) -> Result<PackageLimits, SubscriptionError> {
        match self {
            Self::Service(client) => client.package_limits(package_id).await,
            Self::Fixed(table) => table.package_limits(package_id).await,
        }
    }
}

/// Notify adapter chosen by config: webhook or silent
#[derive(Clone)]
pub enum NotifySink {
    Webhook(WebhookNotifier),
    Silent(NoOpNotifyAdapter),
}

impl NotifySink {
    fn from_settings(settings: &NotifySettings) -> Self {
        match &settings.webhook_url {
            Some(url) => Self::Webhook(WebhookNotifier::new(url.as_str())),
            None => Self::Silent(NoOpNotifyAdapter::new()),
        }
    }
}

#[async_trait]
impl NotifyAdapter for NotifySink {
    async fn send(&self, channel: &str, message: &str) -> Result<(), NotifyError> {
        match self {
            Self::Webhook(webhook) => webhook.send(channel, message).await,
            Self::Silent(noop) => noop.send(channel, message).await,
        }
    }
}

/// Daemon state during operation
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    /// Settings loaded at startup
    pub settings: Settings,
    // NOTE(lifetime): held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    /// Record store, shared with the engine (status reads go direct)
    pub store: JsonStore,
    /// The advance engine
    pub engine: DaemonEngine,
    /// When daemon started
    pub start_time: Instant,
    /// Shutdown requested flag
    pub shutdown_requested: bool,
}

impl std::fmt::Debug for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonState")
            .field("config", &self.config)
            .field("settings", &self.settings)
            .field("listener", &self.listener)
            .field("start_time", &self.start_time)
            .field("shutdown_requested", &self.shutdown_requested)
            .finish_non_exhaustive()
    }
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Remove socket file
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 2. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 3. Remove version file
        if self.config.version_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.version_path) {
                warn!("Failed to remove version file: {}", e);
            }
        }

        // 4. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Data directory unusable at {0}: {1}")]
    DataDir(PathBuf, std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state and socket directories
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents races
    let lock_file = File::create(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    use std::io::Write;
    let mut lock_file = lock_file;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file; // Reborrow as immutable

    // Write version file
    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    // 3. Load settings BEFORE binding socket (fail fast, don't accept
    //    connections on a misconfigured book)
    let settings = Settings::load(&config.settings_path)?;

    // 4. Open the record store
    let store = JsonStore::open(&config.store_path)?;

    // 5. Set up adapters (wrapped with tracing for observability)
    let subscriptions =
        TracedSubscriptionAdapter::new(SubscriptionSource::from_settings(&settings.subscriptions));
    let notifier = TracedNotifyAdapter::new(NotifySink::from_settings(&settings.notify));

    if settings.subscriptions.service_url.is_none() {
        info!(
            "Using fixed subscription table: {} packages, {} subscribers",
            settings.subscriptions.packages.len(),
            settings.subscriptions.subscribers.len()
        );
    }

    // 6. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    // 7. Create the engine and make sure the pool exists
    let services = ServiceSet {
        ledger: store.clone(),
        pools: store.clone(),
        advances: store.clone(),
        subscriptions,
        notifier,
    };
    let engine = Engine::new(services, &settings.engine, SystemClock, UuidIdGen);
    let pool = engine.ensure_pool(settings.pool.initial_balance).await?;

    info!(
        "Pool {} holds {} (lent {}, repaid {})",
        pool.id, pool.current_balance, pool.total_lent, pool.total_repaid
    );
    info!("Daemon started for books at: {}", config.data_dir.display());

    Ok(DaemonState {
        config: config.clone(),
        settings,
        lock_file,
        listener,
        store,
        engine,
        start_time: Instant::now(),
        shutdown_requested: false,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    // Remove version file
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }

    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Get the state directory for adv
fn state_dir() -> Result<PathBuf, LifecycleError> {
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("adv"));
    }

    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/adv"))
}

/// Get the socket directory for adv
///
/// Uses /tmp/adv by default to keep paths short (macOS SUN_LEN = 104).
/// Can be overridden with ADV_SOCKET_DIR for testing.
fn socket_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("ADV_SOCKET_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(PathBuf::from("/tmp/adv"))
}

/// Compute data directory hash for unique daemon directory
fn data_dir_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    // Take first 16 chars of hex digest
    hex_encode(&result[..8])
}

// Hex encoding helper
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
