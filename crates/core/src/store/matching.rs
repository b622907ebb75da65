//! Query evaluation shared by stores that filter in process.

use std::cmp::Ordering;

use crate::value::Value;

use super::{Cursor, Filter, Operator, Query, QueryPage, Record, Result};

/// Checks one value against an operator and operand.
fn value_matches(value: &Value, op: Operator, operand: &Value) -> bool {
    let ordering = if value == operand {
        Some(Ordering::Equal)
    } else {
        value.compare(operand)
    };
    match op {
        Operator::Equal => ordering == Some(Ordering::Equal),
        Operator::NotEqual => ordering != Some(Ordering::Equal),
        Operator::LessThan => ordering == Some(Ordering::Less),
        Operator::LessThanOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        Operator::GreaterThan => ordering == Some(Ordering::Greater),
        Operator::GreaterThanOrEqual => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
    }
}

/// True when the record's property satisfies the filter.
///
/// A missing property never matches. An array property matches when the
/// whole array or any of its elements does.
pub fn filter_matches(record: &Record, filter: &Filter) -> bool {
    let Some(value) = record.properties.get(&filter.property) else {
        return false;
    };
    if value_matches(value, filter.op, &filter.value) {
        return true;
    }
    match value {
        Value::Array(items) if filter.op != Operator::NotEqual => items
            .iter()
            .any(|item| value_matches(item, filter.op, &filter.value)),
        _ => false,
    }
}

/// True when the record belongs to the query's kind, namespace and ancestor
/// and satisfies every filter.
pub fn record_matches(query: &Query, record: &Record) -> bool {
    if record.key.kind() != query.kind {
        return false;
    }
    if record.key.namespace() != query.namespace.as_deref() {
        return false;
    }
    if let Some(ancestor) = &query.ancestor {
        if ancestor != &record.key && !ancestor.is_ancestor_of(&record.key) {
            return false;
        }
    }
    query
        .filters
        .iter()
        .all(|filter| filter_matches(record, filter))
}

/// Builds a page from candidates ordered by storage key.
///
/// Candidates at or before the query's cursor are skipped. A cursor is only
/// returned when at least one further match exists.
pub fn collect_page<I>(candidates: I, query: &Query) -> Result<QueryPage>
where
    I: IntoIterator<Item = (String, Record)>,
{
    let after = query
        .cursor
        .as_ref()
        .map(Cursor::decode_position)
        .transpose()?;
    let page_size = query.page_size();

    let mut matches = candidates
        .into_iter()
        .filter(|(storage_key, _)| after.as_deref().is_none_or(|after| storage_key.as_str() > after))
        .filter(|(_, record)| record_matches(query, record));

    let mut records = Vec::new();
    let mut last_key = None;
    while records.len() < page_size {
        match matches.next() {
            Some((storage_key, record)) => {
                last_key = Some(storage_key);
                records.push(record);
            }
            None => break,
        }
    }

    let next_cursor = match last_key {
        Some(last_key) if records.len() == page_size && matches.next().is_some() => {
            Some(Cursor::encode_position(&last_key))
        }
        _ => None,
    };

    Ok(QueryPage {
        records,
        next_cursor,
    })
}
