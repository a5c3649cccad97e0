//! Runtime composition root
//!
//! Wires configuration, the flag store, the evaluation engine, bootstrap
//! seeding and the refresh scheduler. Initialization is fail-fast: any
//! error while opening the store, seeding or starting the scheduler aborts
//! startup.

use std::sync::Arc;
use std::time::Duration;

use flaggate_core::{BootstrapSeeder, FlagEngine, FlagStore, SeedReport};
use flaggate_domain::{Config, FlagError, Result};
use tokio::sync::Mutex;
use tokio::task;
use tracing::info;

use crate::config;
use crate::database::{DbManager, InMemoryFlagStore, SqliteFlagStore};
use crate::errors::InfraError;
use crate::scheduling::{RefreshScheduler, RefreshSchedulerConfig, SchedulerError};

const SCHEDULER_START_TIMEOUT: Duration = Duration::from_secs(5);

/// Running flag subsystem: engine plus its background refresh.
pub struct FlagRuntime {
    config: Config,
    engine: Arc<FlagEngine>,
    database: Option<Arc<DbManager>>,
    scheduler: Mutex<Option<RefreshScheduler>>,
    seed_report: SeedReport,
}

impl FlagRuntime {
    /// Load configuration from the environment or files and start.
    ///
    /// # Errors
    /// Configuration, store, seeding or scheduler failures.
    pub async fn new() -> Result<Self> {
        Self::new_with_config(config::load()?).await
    }

    /// Start with an explicit configuration.
    ///
    /// Uses SQLite when `database.path` is set, the in-memory store otherwise.
    ///
    /// # Errors
    /// Configuration, store, seeding or scheduler failures.
    pub async fn new_with_config(config: Config) -> Result<Self> {
        config.validate()?;

        let database = match config.database.path.clone() {
            Some(path) => {
                let pool_size = config.database.pool_size;
                let db = task::spawn_blocking(move || -> Result<DbManager> {
                    let db = DbManager::new(&path, pool_size)?;
                    db.run_migrations()?;
                    Ok(db)
                })
                .await
                .map_err(InfraError::from)??;
                Some(Arc::new(db))
            }
            None => None,
        };

        let store: Arc<dyn FlagStore> = match &database {
            Some(db) => {
                info!(db_path = %db.path().display(), "using sqlite flag store");
                Arc::new(SqliteFlagStore::new(Arc::clone(db)))
            }
            None => {
                info!("no database configured; using in-memory flag store");
                Arc::new(InMemoryFlagStore::new())
            }
        };

        let mut runtime = Self::new_with_store(config, store).await?;
        runtime.database = database;
        Ok(runtime)
    }

    /// Start over a caller-provided store.
    ///
    /// # Errors
    /// Seeding or scheduler failures.
    pub async fn new_with_store(config: Config, store: Arc<dyn FlagStore>) -> Result<Self> {
        let engine = Arc::new(FlagEngine::new(store, &config.cache));

        let seed_report = BootstrapSeeder::new().run(&engine).await?;

        let scheduler = if config.refresh.enabled {
            let mut scheduler =
                RefreshScheduler::new(Arc::clone(&engine), RefreshSchedulerConfig::from(&config));
            tokio::time::timeout(SCHEDULER_START_TIMEOUT, scheduler.start())
                .await
                .map_err(|_| SchedulerError::Timeout { duration: SCHEDULER_START_TIMEOUT })??;
            Some(scheduler)
        } else {
            info!("background refresh disabled");
            None
        };

        info!(
            seeded = seed_report.seeded.len(),
            version = seed_report.version,
            refresh = scheduler.is_some(),
            "flag runtime started"
        );

        Ok(Self {
            config,
            engine,
            database: None,
            scheduler: Mutex::new(scheduler),
            seed_report,
        })
    }

    /// Shared evaluation engine.
    pub const fn engine(&self) -> &Arc<FlagEngine> {
        &self.engine
    }

    /// Configuration the runtime started with.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// What startup seeding upserted.
    pub const fn seed_report(&self) -> &SeedReport {
        &self.seed_report
    }

    /// Database manager, when running on SQLite.
    pub const fn database(&self) -> Option<&Arc<DbManager>> {
        self.database.as_ref()
    }

    /// Whether the background refresh task is alive.
    pub async fn is_refreshing(&self) -> bool {
        self.scheduler.lock().await.as_ref().is_some_and(RefreshScheduler::is_running)
    }

    /// Stop the background refresh. Safe to call more than once.
    ///
    /// # Errors
    /// `Timeout` or `Internal` if the refresh task does not stop cleanly.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(mut scheduler) = self.scheduler.lock().await.take() else {
            return Ok(());
        };

        match scheduler.stop().await {
            Ok(()) | Err(SchedulerError::NotRunning) => {
                info!("flag runtime shut down");
                Ok(())
            }
            Err(err) => Err(FlagError::from(err)),
        }
    }
}

impl std::fmt::Debug for FlagRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagRuntime")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .field("seed_report", &self.seed_report)
            .finish_non_exhaustive()
    }
}
