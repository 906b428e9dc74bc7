//! DDL generation for registered entities.
//!
//! Each entity gets one table. The system columns come first; user fields
//! follow in declaration order. A versioned uniqueness constraint appends
//! `remver` to its index column list so successive tombstones occupy
//! distinct key slots, while a non-versioned one spans live and removed
//! rows alike and keeps blocking its key after soft-removal.

use reliquary_core::{EntityDef, REMVER_FIELD};

/// CREATE TABLE and CREATE INDEX statements for one entity.
///
/// All statements are idempotent so startup migration can re-run them.
pub fn entity_ddl(def: &EntityDef) -> Vec<String> {
    let mut columns = vec![
        "id INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
        "removed INTEGER NOT NULL DEFAULT 0".to_string(),
        "remver INTEGER NOT NULL DEFAULT 0".to_string(),
    ];
    for field in def.fields() {
        columns.push(format!(
            "{} {} NOT NULL",
            field.name,
            field.field_type.sql_type()
        ));
    }

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        def.name(),
        columns.join(",\n    ")
    )];

    for constraint in def.constraints() {
        let mut key_columns: Vec<&str> = constraint.fields.iter().map(String::as_str).collect();
        if constraint.versioned {
            key_columns.push(REMVER_FIELD);
        }
        statements.push(format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_{}_{} ON {}({})",
            def.name(),
            constraint.name,
            def.name(),
            key_columns.join(", ")
        ));
    }

    // The Live/Removed views filter on this column in every query.
    statements.push(format!(
        "CREATE INDEX IF NOT EXISTS idx_{0}_removed ON {0}(removed)",
        def.name()
    ));

    statements
}
