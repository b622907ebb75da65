use std::collections::BTreeSet;

use crate::value::Value;

use super::{EntityError, Result};

/// One declared attribute of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub default: Value,
    /// Declared with a tag, so it joins the property lookup.
    pub persisted: bool,
}

/// Declaration of an entity model: its kind, its attributes and the
/// properties excluded from indexes.
///
/// ```
/// use dsentity_core::{Schema, Value};
///
/// let schema = Schema::new("User")
///     .field("username", Value::Null)
///     .field("password", Value::Null)
///     .plain("session", Value::Null)
///     .exclude_from_index("password");
/// assert_eq!(schema.kind(), Some("User"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    kind: Option<String>,
    fields: Vec<FieldDef>,
    exclude_from_index: BTreeSet<String>,
}

impl Schema {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// A schema that names no kind. Entities built from it fail validation.
    pub fn without_kind() -> Self {
        Self::default()
    }

    /// Declares a persisted field. Redeclaring a name replaces it in place.
    pub fn field(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.declare(name.into(), default.into(), true)
    }

    /// Declares a plain attribute that is never persisted on its own.
    pub fn plain(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.declare(name.into(), value.into(), false)
    }

    pub fn exclude_from_index(mut self, name: impl Into<String>) -> Self {
        self.exclude_from_index.insert(name.into());
        self
    }

    fn declare(mut self, name: String, default: Value, persisted: bool) -> Self {
        let field = FieldDef {
            name,
            default,
            persisted,
        };
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref().filter(|kind| !kind.is_empty())
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn excluded_from_index(&self) -> &BTreeSet<String> {
        &self.exclude_from_index
    }

    /// Returns the kind, failing when none was declared.
    pub fn validate(&self) -> Result<&str> {
        self.kind().ok_or(EntityError::MissingKind)
    }
}

/// A type that declares an entity schema.
pub trait Model {
    fn schema() -> Schema;
}
