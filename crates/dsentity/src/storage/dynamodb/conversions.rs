//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB items and records.
//! These are testable in isolation without DynamoDB access.
//!
//! Properties are stored natively under the `props` map. Types DynamoDB
//! cannot tell apart (doubles, timestamps, keys) are recorded in a parallel
//! `types` descriptor, and `order` keeps the property order.

use std::collections::{BTreeSet, HashMap};

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, SecondsFormat, Utc};
use dsentity_core::key::{parse_storage_key, storage_key};
use dsentity_core::store::{Record, StoreError};
use dsentity_core::{PropertyMap, Value};

use super::keys;

// ============================================================================
// Type markers
// ============================================================================

pub const TYPE_DOUBLE: &str = "double";
pub const TYPE_TIMESTAMP: &str = "timestamp";
pub const TYPE_KEY: &str = "key";

pub type Item = HashMap<String, AttributeValue>;

// ============================================================================
// Values
// ============================================================================

/// Render a timestamp with fixed precision so stored strings sort in time
/// order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Convert a value to an attribute plus an optional type descriptor.
///
/// The descriptor is `None` when the attribute's native type is enough to
/// restore the value.
pub fn value_to_attribute(
    value: &Value,
) -> Result<(AttributeValue, Option<AttributeValue>), StoreError> {
    let marker = |name: &str| Some(AttributeValue::S(name.to_string()));

    Ok(match value {
        Value::Null => (AttributeValue::Null(true), None),
        Value::Boolean(b) => (AttributeValue::Bool(*b), None),
        Value::Integer(i) => (AttributeValue::N(i.to_string()), None),
        Value::Double(d) => {
            if !d.is_finite() {
                return Err(StoreError::InvalidData(format!(
                    "DynamoDB cannot store the number {d}"
                )));
            }
            (AttributeValue::N(d.to_string()), marker(TYPE_DOUBLE))
        }
        Value::String(s) => (AttributeValue::S(s.clone()), None),
        Value::Bytes(bytes) => (AttributeValue::B(Blob::new(bytes.clone())), None),
        Value::Timestamp(ts) => (AttributeValue::S(format_timestamp(ts)), marker(TYPE_TIMESTAMP)),
        Value::Key(key) => (AttributeValue::S(storage_key(key)?), marker(TYPE_KEY)),
        Value::Array(items) => {
            let mut attributes = Vec::with_capacity(items.len());
            let mut descriptors = Vec::with_capacity(items.len());
            for item in items {
                let (attribute, descriptor) = value_to_attribute(item)?;
                attributes.push(attribute);
                descriptors.push(descriptor);
            }
            let descriptor = descriptors.iter().any(Option::is_some).then(|| {
                AttributeValue::L(
                    descriptors
                        .into_iter()
                        .map(|d| d.unwrap_or(AttributeValue::Null(true)))
                        .collect(),
                )
            });
            (AttributeValue::L(attributes), descriptor)
        }
        Value::Map(map) => {
            let (attributes, descriptors) = map_to_attributes(map)?;
            let descriptor = (!descriptors.is_empty()).then_some(AttributeValue::M(descriptors));
            (AttributeValue::M(attributes), descriptor)
        }
    })
}

/// Convert a property map to attributes and the descriptors of the
/// properties that need one.
fn map_to_attributes(map: &PropertyMap) -> Result<(Item, Item), StoreError> {
    let mut attributes = HashMap::with_capacity(map.len());
    let mut descriptors = HashMap::new();
    for (name, value) in map.iter() {
        let (attribute, descriptor) = value_to_attribute(value)?;
        attributes.insert(name.to_string(), attribute);
        if let Some(descriptor) = descriptor {
            descriptors.insert(name.to_string(), descriptor);
        }
    }
    Ok((attributes, descriptors))
}

/// Convert an attribute back to a value using its type descriptor.
pub fn attribute_to_value(
    attribute: &AttributeValue,
    descriptor: Option<&AttributeValue>,
) -> Result<Value, StoreError> {
    let marker = descriptor.and_then(|d| d.as_s().ok()).map(String::as_str);

    match attribute {
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::Bool(b) => Ok(Value::Boolean(*b)),
        AttributeValue::N(n) => parse_number(n, marker == Some(TYPE_DOUBLE)),
        AttributeValue::S(s) => match marker {
            Some(TYPE_TIMESTAMP) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::Timestamp(dt.with_timezone(&Utc)))
                .map_err(|e| StoreError::InvalidData(format!("invalid timestamp '{s}': {e}"))),
            Some(TYPE_KEY) => Ok(Value::Key(parse_storage_key(s)?)),
            _ => Ok(Value::String(s.clone())),
        },
        AttributeValue::B(blob) => Ok(Value::Bytes(blob.as_ref().to_vec())),
        AttributeValue::L(items) => {
            let descriptors = descriptor.and_then(|d| d.as_l().ok());
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let descriptor = descriptors.and_then(|d| d.get(i));
                    attribute_to_value(item, descriptor)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        AttributeValue::M(map) => {
            let descriptors = descriptor.and_then(|d| d.as_m().ok());
            let mut names: Vec<&String> = map.keys().collect();
            names.sort();
            let mut properties = PropertyMap::with_capacity(names.len());
            for name in names {
                let descriptor = descriptors.and_then(|d| d.get(name));
                properties.insert(name.clone(), attribute_to_value(&map[name], descriptor)?);
            }
            Ok(Value::Map(properties))
        }
        AttributeValue::Ss(values) => Ok(Value::Array(
            values.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(values) => values
            .iter()
            .map(|n| parse_number(n, false))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::Bs(values) => Ok(Value::Array(
            values
                .iter()
                .map(|blob| Value::Bytes(blob.as_ref().to_vec()))
                .collect(),
        )),
        other => Err(StoreError::InvalidData(format!(
            "unsupported attribute: {other:?}"
        ))),
    }
}

fn parse_number(n: &str, double: bool) -> Result<Value, StoreError> {
    if !double {
        if let Ok(i) = n.parse::<i64>() {
            return Ok(Value::Integer(i));
        }
    }
    n.parse::<f64>()
        .map(Value::Double)
        .map_err(|e| StoreError::InvalidData(format!("invalid number '{n}': {e}")))
}

// ============================================================================
// Records
// ============================================================================

/// Convert a record with a complete key to a DynamoDB item.
pub fn record_to_item(record: &Record) -> Result<Item, StoreError> {
    let (props, types) = map_to_attributes(&record.properties)?;

    let mut item = HashMap::new();

    // Keys
    item.insert(
        keys::PK.to_string(),
        AttributeValue::S(keys::entity_pk(&record.key)?),
    );
    item.insert(
        keys::KIND_NS.to_string(),
        AttributeValue::S(keys::entity_kind_ns(&record.key)),
    );

    // Data
    item.insert(keys::PROPS.to_string(), AttributeValue::M(props));
    if !types.is_empty() {
        item.insert(keys::TYPES.to_string(), AttributeValue::M(types));
    }
    item.insert(
        keys::ORDER.to_string(),
        AttributeValue::L(
            record
                .properties
                .keys()
                .map(|name| AttributeValue::S(name.to_string()))
                .collect(),
        ),
    );
    item.insert(
        keys::UNINDEXED.to_string(),
        AttributeValue::L(
            record
                .exclude_from_indexes
                .iter()
                .map(|name| AttributeValue::S(name.clone()))
                .collect(),
        ),
    );

    Ok(item)
}

/// Convert a DynamoDB item to a record.
pub fn item_to_record(item: &Item) -> Result<Record, StoreError> {
    let key = parse_storage_key(&get_string(item, keys::PK)?)?;

    let empty: Item = HashMap::new();
    let props = match item.get(keys::PROPS) {
        Some(attribute) => attribute
            .as_m()
            .map_err(|_| StoreError::InvalidData(format!("Invalid field: {}", keys::PROPS)))?,
        None => &empty,
    };
    let types = item.get(keys::TYPES).and_then(|t| t.as_m().ok());

    let order = get_string_list(item, keys::ORDER);
    let mut names: Vec<&String> = order.iter().filter(|name| props.contains_key(*name)).collect();
    let mut unordered: Vec<&String> = props.keys().filter(|name| !order.contains(*name)).collect();
    unordered.sort();
    names.extend(unordered);

    let mut properties = PropertyMap::with_capacity(names.len());
    for name in names {
        let descriptor = types.and_then(|t| t.get(name));
        properties.insert(name.clone(), attribute_to_value(&props[name], descriptor)?);
    }

    let exclude_from_indexes: BTreeSet<String> =
        get_string_list(item, keys::UNINDEXED).into_iter().collect();

    Ok(Record {
        key,
        properties,
        exclude_from_indexes,
    })
}

// ============================================================================
// Helper functions
// ============================================================================

/// Get a required string attribute.
fn get_string(item: &Item, key: &str) -> Result<String, StoreError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| StoreError::InvalidData(format!("Missing or invalid field: {key}")))
}

/// Get an optional list of strings; missing or malformed lists are empty.
fn get_string_list(item: &Item, key: &str) -> Vec<String> {
    item.get(key)
        .and_then(|v| v.as_l().ok())
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_s().ok().cloned())
                .collect()
        })
        .unwrap_or_default()
}
