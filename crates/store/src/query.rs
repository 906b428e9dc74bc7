//! Partitioned view scopes and WHERE-clause assembly.

use crate::error::{StoreError, StoreResult};
use reliquary_core::{EntityDef, Filter, Value};

/// The three read scopes over an entity's records.
///
/// `Live` and `Removed` partition the record set with no overlap and no
/// gaps at every transaction boundary; `All` is their union.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Live,
    Removed,
    All,
}

impl Scope {
    /// SQL predicate for this scope, or `None` for the unfiltered view.
    pub(crate) fn predicate(self) -> Option<&'static str> {
        match self {
            Scope::Live => Some("removed = 0"),
            Scope::Removed => Some("removed = 1"),
            Scope::All => None,
        }
    }
}

/// A rendered WHERE clause plus the values to bind, in placeholder order.
pub(crate) struct WhereClause {
    /// Empty, or a leading-space `" WHERE ..."` fragment.
    pub sql: String,
    pub binds: Vec<Value>,
}

/// Build the WHERE clause for a scope + filter over a registered entity.
///
/// Filter fields are checked against the entity's declarations before any
/// query text is assembled.
pub(crate) fn where_clause(
    def: &EntityDef,
    scope: Scope,
    filter: &Filter,
) -> StoreResult<WhereClause> {
    let mut conditions: Vec<String> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();

    if let Some(predicate) = scope.predicate() {
        conditions.push(predicate.to_string());
    }

    for (field, value) in filter.predicates() {
        let Some(field_def) = def.field(field) else {
            return Err(StoreError::UnknownField(format!(
                "{}.{}",
                def.name(),
                field
            )));
        };
        if !value.matches(field_def.field_type) {
            return Err(StoreError::TypeMismatch {
                field: field.clone(),
                expected: field_def.field_type,
            });
        }
        conditions.push(format!("{field} = ?"));
        binds.push(value.clone());
    }

    let sql = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    Ok(WhereClause { sql, binds })
}
