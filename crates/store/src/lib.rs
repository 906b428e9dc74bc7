//! Record store abstraction and SQLite implementation.
//!
//! This crate provides the soft-removal control plane:
//! - Live / Removed / All partitioned views over each entity table
//! - Soft-removal with removal-version bookkeeping, single and bulk
//! - Irreversible full deletion, single and bulk
//! - Creation with restore reconciliation for restorable entities

pub mod ddl;
pub mod error;
pub mod query;
pub mod resolver;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use query::Scope;
pub use store::{RecordStore, SqliteStore};

use reliquary_core::{Schema, StoreConfig};
use std::sync::Arc;

/// Create a record store from configuration.
pub async fn from_config(
    config: &StoreConfig,
    schema: Schema,
) -> StoreResult<Arc<dyn RecordStore>> {
    match config {
        StoreConfig::Sqlite {
            path,
            busy_timeout_secs,
        } => {
            tracing::info!(path = %path.display(), "opening SQLite record store");
            let store = SqliteStore::new(path, schema, *busy_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        }
        StoreConfig::Memory => {
            let store = SqliteStore::in_memory(schema).await?;
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        }
    }
}
