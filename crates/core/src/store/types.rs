use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::key::Key;
use crate::value::{PropertyMap, Value};

use super::{Cursor, StoreError};

/// Largest page a single query may request.
pub const MAX_QUERY_LIMIT: usize = 500;

/// A stored entity: its key, its properties and the properties the store
/// should leave out of its indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Key,
    pub properties: PropertyMap,
    #[serde(default)]
    pub exclude_from_indexes: BTreeSet<String>,
}

impl Record {
    pub fn new(key: Key, properties: PropertyMap) -> Self {
        Self {
            key,
            properties,
            exclude_from_indexes: BTreeSet::new(),
        }
    }

    pub fn exclude_from_indexes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_from_indexes
            .extend(names.into_iter().map(Into::into));
        self
    }
}

/// Comparison operator of a property filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
        }
    }
}

impl FromStr for Operator {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(Operator::Equal),
            "!=" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            other => Err(StoreError::InvalidData(format!(
                "unknown operator '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `property <op> value` restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub property: String,
    pub op: Operator,
    pub value: Value,
}

impl Filter {
    pub fn new(property: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            op,
            value: value.into(),
        }
    }
}

/// A kind query with optional filters, ancestor restriction and paging.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub kind: String,
    pub namespace: Option<String>,
    pub filters: Vec<Filter>,
    pub ancestor: Option<Key>,
    pub limit: Option<usize>,
    pub cursor: Option<Cursor>,
}

impl Query {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: None,
            filters: Vec::new(),
            ancestor: None,
            limit: None,
            cursor: None,
        }
    }

    pub fn in_namespace(mut self, namespace: Option<&str>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty()).map(str::to_string);
        self
    }

    pub fn filter(mut self, property: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(property, op, value));
        self
    }

    pub fn ancestor(mut self, ancestor: Key) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    /// Sets the page size, clamped to [`MAX_QUERY_LIMIT`].
    pub fn limit(mut self, limit: usize) -> Self {
        if limit > MAX_QUERY_LIMIT {
            tracing::warn!(
                requested = limit,
                max = MAX_QUERY_LIMIT,
                "Query limit clamped"
            );
        }
        self.limit = Some(limit.min(MAX_QUERY_LIMIT));
        self
    }

    pub fn start_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Effective page size.
    pub fn page_size(&self) -> usize {
        self.limit.unwrap_or(MAX_QUERY_LIMIT)
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub records: Vec<Record>,
    /// Position after the last returned record; `None` when exhausted.
    pub next_cursor: Option<Cursor>,
}

/// Options handed to a [`Connector`](super::Connector).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    pub namespace: Option<String>,
    pub credentials_profile: Option<String>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn credentials_profile(mut self, profile: impl Into<String>) -> Self {
        self.credentials_profile = Some(profile.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_from_str() {
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::Equal);
        assert_eq!("==".parse::<Operator>().unwrap(), Operator::Equal);
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::NotEqual);
        assert_eq!(" <= ".parse::<Operator>().unwrap(), Operator::LessThanOrEqual);
        assert_eq!(">".parse::<Operator>().unwrap(), Operator::GreaterThan);
    }

    #[test]
    fn test_operator_from_str_unknown() {
        assert!(matches!(
            "~".parse::<Operator>(),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_query_limit_is_clamped() {
        let query = Query::new("User").limit(10_000);
        assert_eq!(query.limit, Some(MAX_QUERY_LIMIT));
        assert_eq!(Query::new("User").limit(20).page_size(), 20);
        assert_eq!(Query::new("User").page_size(), MAX_QUERY_LIMIT);
    }

    #[test]
    fn test_query_empty_namespace_is_default() {
        let query = Query::new("User").in_namespace(Some(""));
        assert_eq!(query.namespace, None);
    }

    #[test]
    fn test_record_deserializes_without_excludes() {
        let key = Key::with_id("User", 1);
        let json = serde_json::json!({
            "key": key,
            "properties": {"name": {"string": "alice"}}
        });
        let record: Record = serde_json::from_value(json).unwrap();
        assert!(record.exclude_from_indexes.is_empty());
        assert_eq!(record.properties.get("name"), Some(&Value::from("alice")));
    }
}
