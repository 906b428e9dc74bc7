//! Store backend configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Backend configuration for the record store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// On-disk SQLite database.
    Sqlite {
        path: PathBuf,
        /// Busy timeout applied to the connection, in seconds.
        #[serde(default)]
        busy_timeout_secs: Option<u64>,
    },
    /// In-memory SQLite database; data does not survive the process.
    Memory,
}
