//! DynamoDB query expression builders.
//!
//! Pure functions turning a `Query` into the key condition and filter
//! expression sent to the `KindIndex` GSI. Only equality filters on scalar
//! operands are pushed down; every filter is still checked in process.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use dsentity_core::store::{Filter, Operator, Query, StoreError};
use dsentity_core::Value;

use super::conversions::value_to_attribute;
use super::keys;

/// Update raising a sequence counter to `:id`.
pub const RAISE_SEQUENCE: &str = "SET #next_id = :id";

/// Only raise a counter that is missing or below `:id`.
pub const RAISE_SEQUENCE_CONDITION: &str = "attribute_not_exists(#next_id) OR #next_id < :id";

/// Only write an item whose `#pk` is not taken.
pub const INSERT_ONLY_CONDITION: &str = "attribute_not_exists(#pk)";

/// Expressions and placeholders for one `Query` request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpressions {
    pub key_condition: String,
    pub filter: Option<String>,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

/// Build the expressions for a query.
pub fn build_query_expressions(query: &Query) -> Result<QueryExpressions, StoreError> {
    let mut names = HashMap::new();
    let mut values = HashMap::new();

    names.insert("#kind_ns".to_string(), keys::KIND_NS.to_string());
    values.insert(
        ":kind_ns".to_string(),
        AttributeValue::S(keys::kind_ns(query.namespace.as_deref(), &query.kind)),
    );
    let mut key_condition = "#kind_ns = :kind_ns".to_string();

    if let Some(ancestor) = &query.ancestor {
        let (lower, upper) = keys::ancestor_range(ancestor)?;
        names.insert("#pk".to_string(), keys::PK.to_string());
        values.insert(":lower".to_string(), AttributeValue::S(lower));
        values.insert(":upper".to_string(), AttributeValue::S(upper));
        key_condition.push_str(" AND #pk BETWEEN :lower AND :upper");
    }

    let mut clauses = Vec::new();
    for (index, filter) in query.filters.iter().enumerate() {
        let Some(operand) = pushdown_operand(filter) else {
            continue;
        };
        let name = format!("#f{index}");
        let value = format!(":v{index}");
        clauses.push(format!(
            "(#props.{name} = {value} OR contains(#props.{name}, {value}))"
        ));
        names.insert(name, filter.property.clone());
        values.insert(value, operand);
    }

    let filter = if clauses.is_empty() {
        None
    } else {
        names.insert("#props".to_string(), keys::PROPS.to_string());
        Some(clauses.join(" AND "))
    };

    Ok(QueryExpressions {
        key_condition,
        filter,
        names,
        values,
    })
}

/// The stored form of a filter operand, when the filter can run server side.
fn pushdown_operand(filter: &Filter) -> Option<AttributeValue> {
    if filter.op != Operator::Equal {
        return None;
    }
    match &filter.value {
        Value::Null | Value::Array(_) | Value::Map(_) => None,
        scalar => value_to_attribute(scalar).ok().map(|(attribute, _)| attribute),
    }
}
