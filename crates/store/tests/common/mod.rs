//! Shared fixtures for record store integration tests.
//!
//! The entity definitions cover the shapes the store has to handle:
//! unconstrained, versioned uniqueness (single and several), non-versioned
//! uniqueness, and the restorable variants with derived or explicit
//! restore keys.

#![allow(dead_code)]

use reliquary_core::{EntityDef, FieldDef, Schema, Value};
use reliquary_store::SqliteStore;
use std::collections::BTreeMap;

/// Build an in-memory store over the given entities.
pub async fn store_with(defs: Vec<EntityDef>) -> SqliteStore {
    let mut schema = Schema::new();
    for def in defs {
        schema = schema.with_entity(def).expect("valid entity");
    }
    SqliteStore::in_memory(schema).await.expect("in-memory store")
}

/// Field map helper.
pub fn values(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// `name` only, no constraints, not restorable.
pub fn labels() -> EntityDef {
    EntityDef::new("labels", vec![FieldDef::text("name")]).expect("valid entity")
}

/// Versioned composite uniqueness over (category, name), not restorable:
/// soft-removal frees the key for a new live row.
pub fn slots() -> EntityDef {
    EntityDef::new(
        "slots",
        vec![
            FieldDef::text("category"),
            FieldDef::text("name"),
            FieldDef::integer("value"),
        ],
    )
    .expect("valid entity")
    .with_unique("key", ["category", "name"], true)
    .expect("valid constraint")
}

/// Two versioned composite constraints, not restorable.
pub fn tagged_slots() -> EntityDef {
    EntityDef::new(
        "tagged_slots",
        vec![
            FieldDef::text("category"),
            FieldDef::text("name"),
            FieldDef::text("tag"),
            FieldDef::integer("value"),
        ],
    )
    .expect("valid entity")
    .with_unique("name_key", ["category", "name"], true)
    .expect("valid constraint")
    .with_unique("tag_key", ["category", "tag"], true)
    .expect("valid constraint")
}

/// Non-versioned unique `name`, not restorable: the tombstone keeps holding
/// the key after soft-removal.
pub fn handles() -> EntityDef {
    EntityDef::new("handles", vec![FieldDef::text("name")])
        .expect("valid entity")
        .with_unique("name", ["name"], false)
        .expect("valid constraint")
}

/// Restorable with a single derived restore key (unique `name`).
pub fn accounts() -> EntityDef {
    EntityDef::new("accounts", vec![FieldDef::text("name")])
        .expect("valid entity")
        .restorable()
        .with_unique("name", ["name"], false)
        .expect("valid constraint")
}

/// Restorable with two independent derived restore keys.
pub fn aliases() -> EntityDef {
    EntityDef::new("aliases", vec![FieldDef::text("name"), FieldDef::text("tag")])
        .expect("valid entity")
        .restorable()
        .with_unique("name", ["name"], false)
        .expect("valid constraint")
        .with_unique("tag", ["tag"], false)
        .expect("valid constraint")
}

/// Restorable with a composite derived restore key.
pub fn memberships() -> EntityDef {
    EntityDef::new(
        "memberships",
        vec![
            FieldDef::text("category"),
            FieldDef::text("name"),
            FieldDef::integer("value"),
        ],
    )
    .expect("valid entity")
    .restorable()
    .with_unique("key", ["category", "name"], false)
    .expect("valid constraint")
}

/// Restorable but with nothing to match on: no constraints, no explicit
/// keys. Creation is always a plain insert.
pub fn drafts() -> EntityDef {
    EntityDef::new("drafts", vec![FieldDef::text("name")])
        .expect("valid entity")
        .restorable()
}

/// Restorable via an explicit restore key, without any uniqueness
/// constraint backing it.
pub fn profiles() -> EntityDef {
    EntityDef::new("profiles", vec![FieldDef::text("name")])
        .expect("valid entity")
        .restorable()
        .with_restore_key(["name"])
        .expect("valid restore key")
}

/// Explicit composite restore key, no uniqueness constraints. Duplicate
/// key values can accumulate, exercising the lowest-id tiebreak.
pub fn channels() -> EntityDef {
    EntityDef::new(
        "channels",
        vec![
            FieldDef::text("category"),
            FieldDef::text("name"),
            FieldDef::integer("value"),
        ],
    )
    .expect("valid entity")
    .restorable()
    .with_restore_key(["category", "name"])
    .expect("valid restore key")
}

/// Single-field key declared before the composite one: resolution must
/// still probe the composite key first.
pub fn contacts() -> EntityDef {
    EntityDef::new(
        "contacts",
        vec![
            FieldDef::text("category"),
            FieldDef::text("name"),
            FieldDef::integer("value"),
        ],
    )
    .expect("valid entity")
    .restorable()
    .with_restore_key(["name"])
    .expect("valid restore key")
    .with_restore_key(["category", "name"])
    .expect("valid restore key")
}

/// Two single-field explicit keys: declaration order decides.
pub fn badges() -> EntityDef {
    EntityDef::new("badges", vec![FieldDef::text("name"), FieldDef::text("tag")])
        .expect("valid entity")
        .restorable()
        .with_restore_key(["name"])
        .expect("valid restore key")
        .with_restore_key(["tag"])
        .expect("valid restore key")
}

/// Unique `name` plus an explicit `tag` restore key: the declaration
/// overrides derivation, so only `tag` is ever probed.
pub fn devices() -> EntityDef {
    EntityDef::new("devices", vec![FieldDef::text("name"), FieldDef::text("tag")])
        .expect("valid entity")
        .restorable()
        .with_unique("name", ["name"], false)
        .expect("valid constraint")
        .with_restore_key(["tag"])
        .expect("valid restore key")
}
