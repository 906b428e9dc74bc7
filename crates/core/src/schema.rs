//! Entity schema declarations: fields, uniqueness constraints, restore keys.

use crate::error::{Error, Result};
use crate::value::FieldType;
use crate::{ID_FIELD, REMOVED_FIELD, REMVER_FIELD};

/// Names claimed by the system columns on every entity table.
const RESERVED_NAMES: [&str; 3] = [ID_FIELD, REMOVED_FIELD, REMVER_FIELD];

/// A user-declared field on an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Real)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }
}

/// A named uniqueness constraint over one or more fields.
///
/// When `versioned` is true the removal-version counter participates in the
/// key: successive tombstones occupy distinct slots and the key becomes
/// reusable by a new live row after soft-removal. A non-versioned constraint
/// spans live and removed rows alike, so its key stays blocked until the
/// tombstone is fully deleted or resurrected.
///
/// Versioning is an explicit capability flag; it is never inferred from the
/// constraint's field names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: String,
    pub fields: Vec<String>,
    pub versioned: bool,
}

/// An explicit restore-key declaration: a field set probed against removed
/// rows when reconciling a creation request. Declaring any restore key on an
/// entity overrides the implicit derivation from its uniqueness constraints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoreKey {
    pub fields: Vec<String>,
}

/// A registered entity type: its fields, uniqueness constraints, optional
/// explicit restore keys, and whether creation reconciles against tombstones.
#[derive(Clone, Debug)]
pub struct EntityDef {
    name: String,
    fields: Vec<FieldDef>,
    constraints: Vec<UniqueConstraint>,
    restore_keys: Vec<RestoreKey>,
    restorable: bool,
}

impl EntityDef {
    /// Declare an entity with its field list, validating every identifier.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Result<Self> {
        let name = name.into();
        validate_identifier(&name)?;
        if fields.is_empty() {
            return Err(Error::NoFields(name));
        }
        for (i, field) in fields.iter().enumerate() {
            validate_identifier(&field.name)?;
            if RESERVED_NAMES.contains(&field.name.as_str()) {
                return Err(Error::ReservedName(field.name.clone()));
            }
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self {
            name,
            fields,
            constraints: Vec::new(),
            restore_keys: Vec::new(),
            restorable: false,
        })
    }

    /// Mark the entity as restorable: creation reconciles against removed
    /// rows instead of blindly inserting. Must precede any
    /// [`EntityDef::with_restore_key`] call.
    pub fn restorable(mut self) -> Self {
        self.restorable = true;
        self
    }

    /// Declare a uniqueness constraint over the given fields.
    ///
    /// `versioned` adds the removal-version counter to the enforced key.
    pub fn with_unique<I, S>(mut self, name: impl Into<String>, fields: I, versioned: bool) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        validate_identifier(&name)?;
        if self.constraints.iter().any(|c| c.name == name) {
            return Err(Error::DuplicateConstraint(name));
        }
        let fields = self.checked_field_set(fields, &format!("constraint '{name}'"))?;
        self.constraints.push(UniqueConstraint {
            name,
            fields,
            versioned,
        });
        Ok(self)
    }

    /// Declare an explicit restore key. Requires the entity to be restorable.
    pub fn with_restore_key<I, S>(mut self, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.restorable {
            return Err(Error::NotRestorable(self.name.clone()));
        }
        let fields = self.checked_field_set(fields, "restore key")?;
        self.restore_keys.push(RestoreKey { fields });
        Ok(self)
    }

    fn checked_field_set<I, S>(&self, fields: I, context: &str) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(Error::EmptyFieldSet(format!(
                "{context} on entity '{}'",
                self.name
            )));
        }
        for field in &fields {
            if self.field(field).is_none() {
                return Err(Error::UnknownField {
                    field: field.clone(),
                    context: format!("{context} on entity '{}'", self.name),
                });
            }
        }
        Ok(fields)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Constraints in declaration order.
    pub fn constraints(&self) -> &[UniqueConstraint] {
        &self.constraints
    }

    /// Explicit restore keys in declaration order; empty when the entity
    /// relies on derivation from its non-versioned uniqueness constraints.
    pub fn restore_keys(&self) -> &[RestoreKey] {
        &self.restore_keys
    }

    pub fn is_restorable(&self) -> bool {
        self.restorable
    }
}

/// An ordered collection of entity definitions with unique names.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    entities: Vec<EntityDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, rejecting duplicate names.
    pub fn with_entity(mut self, def: EntityDef) -> Result<Self> {
        if self.entity(def.name()).is_some() {
            return Err(Error::DuplicateEntity(def.name().to_string()));
        }
        self.entities.push(def);
        Ok(self)
    }

    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    /// Look up an entity by name.
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }
}

/// Validate a name for use as a SQL table, column, or index identifier.
///
/// Lowercase ASCII letters, digits, and underscores only, not starting with
/// a digit. Declarations are interpolated into DDL and query text, so
/// nothing outside this alphabet is ever accepted.
fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    let mut chars = name.chars();
    if !matches!(chars.next(), Some('a'..='z' | '_')) {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    for c in chars {
        if !matches!(c, 'a'..='z' | '0'..='9' | '_') {
            return Err(Error::InvalidIdentifier(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<FieldDef> {
        vec![FieldDef::text("name"), FieldDef::integer("value")]
    }

    #[test]
    fn test_valid_entity() {
        let def = EntityDef::new("widgets", fields())
            .unwrap()
            .with_unique("widgets_name", ["name"], false)
            .unwrap();
        assert_eq!(def.name(), "widgets");
        assert_eq!(def.constraints().len(), 1);
        assert!(!def.is_restorable());
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        assert!(EntityDef::new("Widgets", fields()).is_err());
        assert!(EntityDef::new("wid gets", fields()).is_err());
        assert!(EntityDef::new("1widgets", fields()).is_err());
        assert!(EntityDef::new("", fields()).is_err());
        assert!(EntityDef::new("w; DROP TABLE x", fields()).is_err());
    }

    #[test]
    fn test_rejects_reserved_field_names() {
        for reserved in ["id", "removed", "remver"] {
            let err = EntityDef::new("widgets", vec![FieldDef::text(reserved)]);
            assert!(matches!(err, Err(Error::ReservedName(_))), "{reserved}");
        }
    }

    #[test]
    fn test_rejects_duplicate_field() {
        let err = EntityDef::new(
            "widgets",
            vec![FieldDef::text("name"), FieldDef::integer("name")],
        );
        assert!(matches!(err, Err(Error::DuplicateField(_))));
    }

    #[test]
    fn test_rejects_unknown_constraint_field() {
        let err = EntityDef::new("widgets", fields())
            .unwrap()
            .with_unique("widgets_tag", ["tag"], false);
        assert!(matches!(err, Err(Error::UnknownField { .. })));
    }

    #[test]
    fn test_rejects_empty_constraint() {
        let err = EntityDef::new("widgets", fields())
            .unwrap()
            .with_unique("widgets_none", Vec::<String>::new(), false);
        assert!(matches!(err, Err(Error::EmptyFieldSet(_))));
    }

    #[test]
    fn test_restore_key_requires_restorable() {
        let err = EntityDef::new("widgets", fields())
            .unwrap()
            .with_restore_key(["name"]);
        assert!(matches!(err, Err(Error::NotRestorable(_))));

        let def = EntityDef::new("widgets", fields())
            .unwrap()
            .restorable()
            .with_restore_key(["name"])
            .unwrap();
        assert_eq!(def.restore_keys().len(), 1);
    }

    #[test]
    fn test_schema_rejects_duplicate_entity() {
        let schema = Schema::new()
            .with_entity(EntityDef::new("widgets", fields()).unwrap())
            .unwrap();
        let err = schema.with_entity(EntityDef::new("widgets", fields()).unwrap());
        assert!(matches!(err, Err(Error::DuplicateEntity(_))));
    }
}
