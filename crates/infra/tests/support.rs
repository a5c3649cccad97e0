#![allow(dead_code)]

use std::sync::{Arc, Once};

use flaggate_infra::database::{DbManager, SqliteFlagStore};
use tempfile::TempDir;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a migrated database in a fresh temp directory.
    pub fn new() -> Self {
        init_tracing();
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("flags.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should run");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    pub fn store(&self) -> SqliteFlagStore {
        SqliteFlagStore::new(Arc::clone(&self.manager))
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self
            .manager
            .get_connection()
            .expect("connection should be available for execute_batch");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}
