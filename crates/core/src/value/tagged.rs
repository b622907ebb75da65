use serde::{Deserialize, Serialize};

use super::Value;

/// Marks an attribute as persistable.
///
/// Attributes declared with a `TaggedValue` are picked up into an entity's
/// property lookup and written on save. The wrapper itself is never stored;
/// only the inner value is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaggedValue {
    pub value: Value,
}

impl TaggedValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn into_inner(self) -> Value {
        self.value
    }
}

impl From<Value> for TaggedValue {
    fn from(value: Value) -> Self {
        Self { value }
    }
}

/// An attribute slot on an entity instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// Declared persistable; joins the lookup on the next recompute.
    Tagged(TaggedValue),
    /// Plain value. Persisted only if the name is already in the lookup.
    Raw(Value),
}

impl Attribute {
    pub fn is_tagged(&self) -> bool {
        matches!(self, Attribute::Tagged(_))
    }

    /// The underlying value, unwrapped from the tag if present.
    pub fn value(&self) -> &Value {
        match self {
            Attribute::Tagged(tagged) => &tagged.value,
            Attribute::Raw(value) => value,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Attribute::Tagged(tagged) => tagged.value,
            Attribute::Raw(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tagged_value_is_null() {
        assert_eq!(TaggedValue::default().value, Value::Null);
    }

    #[test]
    fn test_attribute_unwraps_tag() {
        let tagged = Attribute::Tagged(TaggedValue::new("alice"));
        let raw = Attribute::Raw(Value::from("alice"));
        assert!(tagged.is_tagged());
        assert!(!raw.is_tagged());
        assert_eq!(tagged.value(), raw.value());
        assert_eq!(tagged.into_value(), Value::from("alice"));
    }
}
