//! Refresh scheduler for periodic flag cache reloads.
//!
//! One background task per process. Each tick, one interval after the
//! previous, reloads the engine cache from the store. Failures and timeouts
//! are logged and never surface to evaluators; the previous cache contents
//! keep being served.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use flaggate_core::FlagEngine;
//! use flaggate_infra::scheduling::{RefreshScheduler, RefreshSchedulerConfig};
//!
//! # async fn example(engine: Arc<FlagEngine>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut scheduler = RefreshScheduler::new(engine, RefreshSchedulerConfig::default());
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flaggate_core::FlagEngine;
use flaggate_domain::constants::{DEFAULT_CACHE_TTL_SECS, DEFAULT_REFRESH_TIMEOUT_SECS};
use flaggate_domain::Config;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for refresh scheduler
#[derive(Debug, Clone)]
pub struct RefreshSchedulerConfig {
    /// Delay between refreshes
    pub interval: Duration,
    /// Upper bound on a single refresh
    pub refresh_timeout: Duration,
}

impl Default for RefreshSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
        }
    }
}

impl From<&Config> for RefreshSchedulerConfig {
    /// The cache TTL doubles as the refresh interval.
    fn from(config: &Config) -> Self {
        Self { interval: config.cache.ttl(), refresh_timeout: config.refresh.timeout() }
    }
}

/// Refresh scheduler for periodic cache reloads
pub struct RefreshScheduler {
    engine: Arc<FlagEngine>,
    config: RefreshSchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
    completed_ticks: Arc<AtomicU64>,
}

impl RefreshScheduler {
    /// Create a new refresh scheduler
    pub fn new(engine: Arc<FlagEngine>, config: RefreshSchedulerConfig) -> Self {
        Self {
            engine,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
            completed_ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start the scheduler
    ///
    /// Spawns a background task that refreshes the cache periodically.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(interval_secs = self.config.interval.as_secs(), "Starting refresh scheduler");

        // Fresh token so the scheduler can restart after stop
        self.cancellation_token = CancellationToken::new();

        let engine = Arc::clone(&self.engine);
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();
        let ticks = Arc::clone(&self.completed_ticks);

        let handle = tokio::spawn(async move {
            Self::refresh_loop(engine, config, cancel, ticks).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Refresh scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully
    ///
    /// Cancels the background task and awaits completion.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running, or the task does not finish
    /// within the join timeout
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping refresh scheduler");

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            tokio::time::timeout(JOIN_TIMEOUT, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { duration: JOIN_TIMEOUT })??;
        }

        info!("Refresh scheduler stopped");
        Ok(())
    }

    /// Check if scheduler is running
    ///
    /// A scheduler is considered running if it has an active task handle that
    /// hasn't finished.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Ticks that ran to completion, successful or not.
    pub fn completed_ticks(&self) -> u64 {
        self.completed_ticks.load(Ordering::Relaxed)
    }

    /// Background refresh loop
    async fn refresh_loop(
        engine: Arc<FlagEngine>,
        config: RefreshSchedulerConfig,
        cancel: CancellationToken,
        ticks: Arc<AtomicU64>,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Refresh loop cancelled");
                    break;
                }
                () = tokio::time::sleep(config.interval) => {
                    let started = Instant::now();
                    let refresh =
                        tokio::time::timeout(config.refresh_timeout, engine.refresh_cache());
                    match refresh.await {
                        Ok(Ok(count)) => {
                            debug!(
                                count,
                                elapsed_ms = started.elapsed().as_millis(),
                                "Scheduled cache refresh completed"
                            );
                        }
                        Ok(Err(e)) => {
                            error!(
                                error = %e,
                                "Scheduled cache refresh failed; serving previous entries"
                            );
                        }
                        Err(_) => {
                            warn!(
                                timeout_secs = config.refresh_timeout.as_secs(),
                                "Scheduled cache refresh timed out; serving previous entries"
                            );
                        }
                    }
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Ensure scheduler is stopped when dropped
impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            debug!("RefreshScheduler dropped; cancelling background task");
            self.cancellation_token.cancel();
        }
    }
}
