//! Restore-key resolution for creation requests.
//!
//! Given an entity's declarations, produce the ordered list of field sets to
//! probe against removed rows when reconciling a create. Explicit restore
//! keys override the derivation entirely; otherwise every non-versioned
//! uniqueness constraint contributes its field set. Versioned constraints
//! are excluded: once the removal-version counter joins the key, a tombstone
//! no longer holds an identity a new row could collide with.
//!
//! The order is the externally observable resurrection policy: keys with
//! more fields probe first, declaration order breaks ties. The store probes
//! keys in sequence and takes the first hit (lowest row id within a key),
//! so a composite match always wins over a single-field match.

use reliquary_core::EntityDef;

/// Ordered restore-key field sets for one entity.
///
/// Resolved once at schema registration, not per call.
pub fn resolution_order(def: &EntityDef) -> Vec<Vec<String>> {
    if !def.is_restorable() {
        return Vec::new();
    }

    let mut keys: Vec<Vec<String>> = if def.restore_keys().is_empty() {
        def.constraints()
            .iter()
            .filter(|c| !c.versioned)
            .map(|c| c.fields.clone())
            .collect()
    } else {
        def.restore_keys().iter().map(|k| k.fields.clone()).collect()
    };

    // Stable sort keeps declaration order within each specificity class.
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));
    keys
}
