//! SQLite-backed flag store.
//!
//! Implements the `FlagStore` port over the pooled database. All database
//! operations run in `spawn_blocking` to avoid blocking the async runtime.
//! Conditions and metadata are stored as JSON text; timestamps as Unix
//! milliseconds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use flaggate_core::FlagStore;
use flaggate_domain::{FlagConditions, FlagError, FlagPatch, FlagRecord, Metadata, NewFlag, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use tokio::task;
use tracing::debug;

use super::manager::DbManager;
use crate::errors::{is_unique_violation, InfraError};

const SELECT_COLUMNS: &str = "SELECT name, description, enabled, rollout_percentage, conditions, \
     metadata, created_at, updated_at, created_by, updated_by FROM flags";

/// SQLite-backed flag store.
pub struct SqliteFlagStore {
    db: Arc<DbManager>,
}

impl SqliteFlagStore {
    /// Create a store over `db`. The schema must already exist.
    pub const fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Run `op` on a pooled connection inside `spawn_blocking`.
    async fn with_connection<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> std::result::Result<T, InfraError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let result = task::spawn_blocking(move || {
            let mut conn = db.get_connection()?;
            op(&mut conn)
        })
        .await
        .map_err(InfraError::from)?;

        Ok(result?)
    }
}

impl std::fmt::Debug for SqliteFlagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteFlagStore").field("db", &self.db).finish()
    }
}

#[async_trait]
impl FlagStore for SqliteFlagStore {
    async fn find(&self, name: &str) -> Result<Option<FlagRecord>> {
        let name = name.to_owned();
        self.with_connection(move |conn| query_flag(conn, &name)).await
    }

    async fn find_all(&self) -> Result<Vec<FlagRecord>> {
        self.with_connection(|conn| query_all_flags(conn)).await
    }

    async fn find_by_metadata_tag(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<FlagRecord>> {
        let key = key.to_owned();
        let value = value.clone();
        // flag tables are small; matching happens on decoded records
        self.with_connection(move |conn| {
            let records = query_all_flags(conn)?;
            Ok(records.into_iter().filter(|record| record.has_metadata_tag(&key, &value)).collect())
        })
        .await
    }

    async fn upsert(
        &self,
        name: &str,
        patch: FlagPatch,
        insert_defaults: NewFlag,
        actor: Option<&str>,
    ) -> Result<FlagRecord> {
        let name = name.to_owned();
        let actor = actor.map(str::to_owned);
        self.with_connection(move |conn| {
            let tx = write_transaction(conn)?;
            let now = now_millis();

            let mut record = if let Some(existing) = query_flag(&tx, &name)? {
                existing
            } else {
                let mut defaults = insert_defaults;
                defaults.name.clone_from(&name);
                let record = defaults.into_record(actor.as_deref(), now);
                insert_flag(&tx, &record)?;
                debug!(flag_name = %name, "inserted flag during upsert");
                record
            };

            let patch_actor = if patch.is_empty() { None } else { actor.as_deref() };
            patch.apply_to(&mut record, patch_actor, now);
            update_flag(&tx, &record)?;

            tx.commit()?;
            Ok(record)
        })
        .await
    }

    async fn create(&self, flag: NewFlag, actor: Option<&str>) -> Result<FlagRecord> {
        let record = flag.into_record(actor, now_millis());
        self.with_connection(move |conn| match insert_flag(conn, &record) {
            Ok(()) => Ok(record),
            Err(err) if is_unique_violation(&err) => {
                Err(InfraError(FlagError::DuplicateName(record.name)))
            }
            Err(err) => Err(err.into()),
        })
        .await
    }

    async fn update(
        &self,
        name: &str,
        patch: FlagPatch,
        actor: Option<&str>,
    ) -> Result<Option<FlagRecord>> {
        let name = name.to_owned();
        let actor = actor.map(str::to_owned);
        self.with_connection(move |conn| {
            let tx = write_transaction(conn)?;
            let Some(mut record) = query_flag(&tx, &name)? else {
                return Ok(None);
            };

            patch.apply_to(&mut record, actor.as_deref(), now_millis());
            update_flag(&tx, &record)?;
            tx.commit()?;
            Ok(Some(record))
        })
        .await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let name = name.to_owned();
        self.with_connection(move |conn| {
            let removed = conn.execute("DELETE FROM flags WHERE name = ?1", params![name])?;
            Ok(removed > 0)
        })
        .await
    }
}

// ============================================================================
// Synchronous SQL Operations (called inside spawn_blocking)
// ============================================================================

/// Row as stored, before JSON and timestamp decoding.
struct FlagRow {
    name: String,
    description: String,
    enabled: bool,
    rollout_percentage: u8,
    conditions: Option<String>,
    metadata: String,
    created_at: i64,
    updated_at: i64,
    created_by: Option<String>,
    updated_by: Option<String>,
}

impl FlagRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            description: row.get(1)?,
            enabled: row.get(2)?,
            rollout_percentage: row.get(3)?,
            conditions: row.get(4)?,
            metadata: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            created_by: row.get(8)?,
            updated_by: row.get(9)?,
        })
    }

    fn decode(self) -> std::result::Result<FlagRecord, InfraError> {
        let conditions: Option<FlagConditions> =
            self.conditions.as_deref().map(serde_json::from_str).transpose()?;
        let metadata: Metadata = serde_json::from_str(&self.metadata)?;

        Ok(FlagRecord {
            created_at: from_millis(&self.name, self.created_at)?,
            updated_at: from_millis(&self.name, self.updated_at)?,
            name: self.name,
            description: self.description,
            enabled: self.enabled,
            rollout_percentage: self.rollout_percentage,
            conditions,
            metadata,
            created_by: self.created_by,
            updated_by: self.updated_by,
        })
    }
}

fn query_flag(
    conn: &Connection,
    name: &str,
) -> std::result::Result<Option<FlagRecord>, InfraError> {
    let row = conn
        .query_row(&format!("{SELECT_COLUMNS} WHERE name = ?1"), params![name], FlagRow::from_row)
        .optional()?;
    row.map(FlagRow::decode).transpose()
}

fn query_all_flags(conn: &Connection) -> std::result::Result<Vec<FlagRecord>, InfraError> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY name"))?;
    let rows = stmt.query_map(params![], FlagRow::from_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.decode()?);
    }
    Ok(records)
}

/// Read-modify-write transaction holding the write lock from `BEGIN`, so
/// concurrent writers wait on `busy_timeout` instead of failing busy.
fn write_transaction(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

fn insert_flag(conn: &Connection, record: &FlagRecord) -> rusqlite::Result<()> {
    let (conditions, metadata) = encode_json(record)?;
    conn.execute(
        "INSERT INTO flags (name, description, enabled, rollout_percentage, conditions, metadata,
                            created_at, updated_at, created_by, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            record.name,
            record.description,
            record.enabled,
            record.rollout_percentage,
            conditions,
            metadata,
            record.created_at.timestamp_millis(),
            record.updated_at.timestamp_millis(),
            record.created_by,
            record.updated_by,
        ],
    )?;
    Ok(())
}

fn update_flag(conn: &Connection, record: &FlagRecord) -> std::result::Result<(), InfraError> {
    let (conditions, metadata) = encode_json(record)?;
    conn.execute(
        "UPDATE flags
         SET description = ?2, enabled = ?3, rollout_percentage = ?4, conditions = ?5,
             metadata = ?6, updated_at = ?7, updated_by = ?8
         WHERE name = ?1",
        params![
            record.name,
            record.description,
            record.enabled,
            record.rollout_percentage,
            conditions,
            metadata,
            record.updated_at.timestamp_millis(),
            record.updated_by,
        ],
    )?;
    Ok(())
}

fn encode_json(record: &FlagRecord) -> rusqlite::Result<(Option<String>, String)> {
    let conditions = record
        .conditions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let metadata = serde_json::to_string(&record.metadata)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    Ok((conditions, metadata))
}

fn from_millis(name: &str, millis: i64) -> std::result::Result<DateTime<Utc>, InfraError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        InfraError(FlagError::Internal(format!("flag {name} has an out-of-range timestamp")))
    })
}

/// Current time at the precision the table stores.
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
