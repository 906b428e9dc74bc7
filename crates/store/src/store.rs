//! Record store trait and the SQLite implementation.

use crate::ddl;
use crate::error::{StoreError, StoreResult};
use crate::query::{self, Scope};
use crate::resolver;
use async_trait::async_trait;
use reliquary_core::{EntityDef, FieldType, Filter, Record, Schema, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// The store surface consumed by calling code.
///
/// All multi-step sequences (probe-then-write in [`RecordStore::create`],
/// bulk state flips) execute inside a single storage transaction, so a
/// concurrent writer observes either a conflict or a consistent result,
/// never a duplicate live row for the same key.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Check database connectivity and health.
    async fn health_check(&self) -> StoreResult<()>;

    /// The registered schema.
    fn schema(&self) -> &Schema;

    /// Create a record from field values. Every declared field is required.
    ///
    /// For a restorable entity this reconciles against removed rows first:
    /// a tombstone matching one of the entity's restore keys is resurrected
    /// in place (same row id, `remver` untouched, fields fully replaced by
    /// the supplied values) instead of inserting a duplicate. When
    /// tombstones match several keys, keys with more fields win, then
    /// declaration order, then the lowest row id.
    ///
    /// Fails with [`StoreError::UniquenessConflict`] when a row already
    /// holds one of the requested keys and no tombstone was eligible.
    async fn create(&self, entity: &str, values: BTreeMap<String, Value>) -> StoreResult<Record>;

    /// Read a record by id, whatever its state.
    async fn get(&self, entity: &str, id: i64) -> StoreResult<Option<Record>>;

    /// List records in a scope, optionally filtered, ordered by id.
    async fn list(&self, entity: &str, scope: Scope, filter: &Filter) -> StoreResult<Vec<Record>>;

    /// Count records in a scope, optionally filtered.
    async fn count(&self, entity: &str, scope: Scope, filter: &Filter) -> StoreResult<u64>;

    /// Soft-remove one record by id and return its new state.
    ///
    /// Valid on an already-removed record: the removal-version counter is
    /// bumped again, there is no special case for re-removal.
    async fn soft_remove(&self, entity: &str, id: i64) -> StoreResult<Record>;

    /// Soft-remove every live record matching the filter in one
    /// transaction. Returns the number of records removed.
    async fn soft_remove_where(&self, entity: &str, filter: &Filter) -> StoreResult<u64>;

    /// Permanently delete one record by id. Irreversible: the row is gone
    /// from all three views and its keys are released.
    async fn remove_fully(&self, entity: &str, id: i64) -> StoreResult<()>;

    /// Permanently delete every record in the scope matching the filter.
    /// Returns the number of records deleted.
    async fn remove_fully_where(
        &self,
        entity: &str,
        scope: Scope,
        filter: &Filter,
    ) -> StoreResult<u64>;
}

/// SQLite-backed record store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    schema: Schema,
    /// Per-entity restore-key probe order, resolved once at registration.
    restore_plans: HashMap<String, Vec<Vec<String>>>,
}

impl SqliteStore {
    /// Open (or create) an on-disk store and apply the schema.
    pub async fn new(
        path: impl AsRef<Path>,
        schema: Schema,
        busy_timeout_secs: Option<u64>,
    ) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Config(format!("creating {}: {e}", parent.display())))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(busy_timeout_secs.unwrap_or(5)));

        Self::connect(opts, schema).await
    }

    /// Open an in-memory store; data does not survive the process.
    pub async fn in_memory(schema: Schema) -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(opts, schema).await
    }

    async fn connect(opts: SqliteConnectOptions, schema: Schema) -> StoreResult<Self> {
        // SQLite permits limited write concurrency; a single connection keeps
        // every probe-then-write transaction serialized without lock churn.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let restore_plans = schema
            .entities()
            .iter()
            .map(|def| (def.name().to_string(), resolver::resolution_order(def)))
            .collect();

        let store = Self {
            pool,
            schema,
            restore_plans,
        };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Apply idempotent DDL for every registered entity.
    async fn migrate(&self) -> StoreResult<()> {
        for def in self.schema.entities() {
            for statement in ddl::entity_ddl(def) {
                sqlx::query(&statement).execute(&self.pool).await?;
            }
        }
        tracing::info!(
            entities = self.schema.entities().len(),
            "record store migrated"
        );
        Ok(())
    }

    fn entity(&self, name: &str) -> StoreResult<&EntityDef> {
        self.schema
            .entity(name)
            .ok_or_else(|| StoreError::UnknownEntity(name.to_string()))
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn create(&self, entity: &str, values: BTreeMap<String, Value>) -> StoreResult<Record> {
        let def = self.entity(entity)?;
        let ordered = ordered_values(def, &values)?;
        let plan = self
            .restore_plans
            .get(def.name())
            .map(|p| p.as_slice())
            .unwrap_or_default();

        // Probe and write under one transaction: a concurrent create of the
        // same key either sees the resurrected row or trips the uniqueness
        // constraint at commit, never a duplicate live row. Conflict
        // detection stays with the engine's constraint enforcement;
        // pre-validating here would reopen the check-then-act race.
        let mut tx = self.pool.begin().await?;

        let mut target: Option<i64> = None;
        for key_fields in plan {
            let conditions: Vec<String> =
                key_fields.iter().map(|f| format!("{f} = ?")).collect();
            let sql = format!(
                "SELECT id FROM {} WHERE removed = 1 AND {} ORDER BY id LIMIT 1",
                def.name(),
                conditions.join(" AND ")
            );
            let mut q = sqlx::query(&sql);
            for field in key_fields {
                let value = values.get(field).ok_or_else(|| {
                    StoreError::Internal(format!("restore key field {field} not validated"))
                })?;
                q = bind_value(q, value);
            }
            if let Some(row) = q.fetch_optional(&mut *tx).await? {
                target = Some(row.try_get("id")?);
                break;
            }
        }

        let id = match target {
            Some(id) => {
                // Resurrect in place: full field replace, remver untouched,
                // row identity preserved.
                let assignments: Vec<String> = def
                    .fields()
                    .iter()
                    .map(|f| format!("{} = ?", f.name))
                    .collect();
                let sql = format!(
                    "UPDATE {} SET removed = 0, {} WHERE id = ?",
                    def.name(),
                    assignments.join(", ")
                );
                let mut q = sqlx::query(&sql);
                for &value in &ordered {
                    q = bind_value(q, value);
                }
                q.bind(id).execute(&mut *tx).await?;
                tracing::debug!(entity = def.name(), id, "resurrected removed record");
                id
            }
            None => {
                let columns: Vec<&str> =
                    def.fields().iter().map(|f| f.name.as_str()).collect();
                let placeholders = vec!["?"; columns.len()];
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    def.name(),
                    columns.join(", "),
                    placeholders.join(", ")
                );
                let mut q = sqlx::query(&sql);
                for &value in &ordered {
                    q = bind_value(q, value);
                }
                let result = q.execute(&mut *tx).await?;
                let id = result.last_insert_rowid();
                tracing::debug!(entity = def.name(), id, "inserted record");
                id
            }
        };

        let record = fetch_record(def, &mut *tx, id)
            .await?
            .ok_or_else(|| StoreError::Internal(format!("row {id} vanished before commit")))?;
        tx.commit().await?;
        Ok(record)
    }

    async fn get(&self, entity: &str, id: i64) -> StoreResult<Option<Record>> {
        let def = self.entity(entity)?;
        fetch_record(def, &self.pool, id).await
    }

    async fn list(&self, entity: &str, scope: Scope, filter: &Filter) -> StoreResult<Vec<Record>> {
        let def = self.entity(entity)?;
        let clause = query::where_clause(def, scope, filter)?;
        let sql = format!("SELECT * FROM {}{} ORDER BY id", def.name(), clause.sql);
        let mut q = sqlx::query(&sql);
        for value in &clause.binds {
            q = bind_value(q, value);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(|row| row_to_record(def, row)).collect()
    }

    async fn count(&self, entity: &str, scope: Scope, filter: &Filter) -> StoreResult<u64> {
        let def = self.entity(entity)?;
        let clause = query::where_clause(def, scope, filter)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", def.name(), clause.sql);
        let mut q = sqlx::query(&sql);
        for value in &clause.binds {
            q = bind_value(q, value);
        }
        let row = q.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get(0)?;
        Ok(count as u64)
    }

    async fn soft_remove(&self, entity: &str, id: i64) -> StoreResult<Record> {
        let def = self.entity(entity)?;
        let mut tx = self.pool.begin().await?;

        let Some(record) = fetch_record(def, &mut *tx, id).await? else {
            return Err(StoreError::NotFound(format!("{entity} id {id}")));
        };
        let remver = next_remver(def, &mut tx, &record).await?;
        let sql = format!(
            "UPDATE {} SET removed = 1, remver = ? WHERE id = ?",
            def.name()
        );
        sqlx::query(&sql)
            .bind(remver)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let updated = fetch_record(def, &mut *tx, id)
            .await?
            .ok_or_else(|| StoreError::Internal(format!("row {id} vanished before commit")))?;
        tx.commit().await?;
        tracing::debug!(entity, id, remver, "soft-removed record");
        Ok(updated)
    }

    async fn soft_remove_where(&self, entity: &str, filter: &Filter) -> StoreResult<u64> {
        let def = self.entity(entity)?;
        let clause = query::where_clause(def, Scope::Live, filter)?;
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT * FROM {}{} ORDER BY id", def.name(), clause.sql);
        let mut q = sqlx::query(&sql);
        for value in &clause.binds {
            q = bind_value(q, value);
        }
        let rows = q.fetch_all(&mut *tx).await?;
        let records: Vec<Record> = rows
            .iter()
            .map(|row| row_to_record(def, row))
            .collect::<StoreResult<_>>()?;

        for record in &records {
            let remver = next_remver(def, &mut tx, record).await?;
            let update_sql = format!(
                "UPDATE {} SET removed = 1, remver = ? WHERE id = ?",
                def.name()
            );
            sqlx::query(&update_sql)
                .bind(remver)
                .bind(record.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        if !records.is_empty() {
            tracing::debug!(entity, count = records.len(), "soft-removed records");
        }
        Ok(records.len() as u64)
    }

    async fn remove_fully(&self, entity: &str, id: i64) -> StoreResult<()> {
        let def = self.entity(entity)?;
        let sql = format!("DELETE FROM {} WHERE id = ?", def.name());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{entity} id {id}")));
        }
        tracing::debug!(entity, id, "fully deleted record");
        Ok(())
    }

    async fn remove_fully_where(
        &self,
        entity: &str,
        scope: Scope,
        filter: &Filter,
    ) -> StoreResult<u64> {
        let def = self.entity(entity)?;
        let clause = query::where_clause(def, scope, filter)?;
        let sql = format!("DELETE FROM {}{}", def.name(), clause.sql);
        let mut q = sqlx::query(&sql);
        for value in &clause.binds {
            q = bind_value(q, value);
        }
        let result = q.execute(&self.pool).await?;
        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::debug!(entity, count = deleted, "fully deleted records");
        }
        Ok(deleted)
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_value<'q>(q: SqliteQuery<'q>, value: &'q Value) -> SqliteQuery<'q> {
    match value {
        Value::Text(s) => q.bind(s.as_str()),
        Value::Integer(i) => q.bind(*i),
        Value::Real(f) => q.bind(*f),
        Value::Boolean(b) => q.bind(*b),
    }
}

/// Validate supplied values against the entity's declarations and return
/// them ordered by field declaration, ready for binding.
fn ordered_values<'a>(
    def: &EntityDef,
    values: &'a BTreeMap<String, Value>,
) -> StoreResult<Vec<&'a Value>> {
    for (name, value) in values {
        let Some(field) = def.field(name) else {
            return Err(StoreError::UnknownField(format!("{}.{}", def.name(), name)));
        };
        if !value.matches(field.field_type) {
            return Err(StoreError::TypeMismatch {
                field: name.clone(),
                expected: field.field_type,
            });
        }
    }
    def.fields()
        .iter()
        .map(|field| {
            values.get(&field.name).ok_or_else(|| {
                StoreError::MissingField(format!("{}.{}", def.name(), field.name))
            })
        })
        .collect()
}

fn row_to_record(def: &EntityDef, row: &SqliteRow) -> StoreResult<Record> {
    let id: i64 = row.try_get("id")?;
    let removed: bool = row.try_get("removed")?;
    let remver: i64 = row.try_get("remver")?;
    let mut fields = BTreeMap::new();
    for field in def.fields() {
        let name = field.name.as_str();
        let value = match field.field_type {
            FieldType::Text => Value::Text(row.try_get::<String, _>(name)?),
            FieldType::Integer => Value::Integer(row.try_get::<i64, _>(name)?),
            FieldType::Real => Value::Real(row.try_get::<f64, _>(name)?),
            FieldType::Boolean => Value::Boolean(row.try_get::<bool, _>(name)?),
        };
        fields.insert(field.name.clone(), value);
    }
    Ok(Record {
        id,
        removed,
        remver,
        fields,
    })
}

async fn fetch_record<'e, E>(def: &EntityDef, executor: E, id: i64) -> StoreResult<Option<Record>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT * FROM {} WHERE id = ?", def.name());
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    row.map(|r| row_to_record(def, &r)).transpose()
}

/// Next removal version for a record about to be soft-removed.
///
/// For every versioned constraint the new tombstone must land in a key slot
/// distinct from any prior tombstone holding the same key, so the bump
/// starts from the highest version already present in each key group, not
/// just the record's own counter. Without versioned constraints this
/// degenerates to a plain self-increment.
async fn next_remver(
    def: &EntityDef,
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    record: &Record,
) -> StoreResult<i64> {
    let mut base = record.remver;
    for constraint in def.constraints().iter().filter(|c| c.versioned) {
        let conditions: Vec<String> = constraint
            .fields
            .iter()
            .map(|f| format!("{f} = ?"))
            .collect();
        let sql = format!(
            "SELECT COALESCE(MAX(remver), 0) FROM {} WHERE {}",
            def.name(),
            conditions.join(" AND ")
        );
        let mut q = sqlx::query(&sql);
        for field in &constraint.fields {
            let value = record.fields.get(field).ok_or_else(|| {
                StoreError::Internal(format!("field {field} missing from record"))
            })?;
            q = bind_value(q, value);
        }
        let row = q.fetch_one(&mut **tx).await?;
        let group_max: i64 = row.try_get(0)?;
        base = base.max(group_max);
    }
    Ok(base + 1)
}
