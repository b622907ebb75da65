//! Indented text listing.

use std::fmt::Write;

use dsentity_core::store::{Cursor, Record};

pub fn record(record: &Record) -> String {
    let mut out = record.key.to_string();
    for (name, value) in record.properties.iter() {
        let _ = write!(out, "\n  {name}: {}", value.to_json());
    }
    out
}

pub fn records(records: &[Record], cursor: Option<&Cursor>) -> String {
    let mut blocks: Vec<String> = records.iter().map(record).collect();
    if blocks.is_empty() {
        blocks.push("no records".to_string());
    }
    if let Some(cursor) = cursor {
        blocks.push(format!("next cursor: {cursor}"));
    }
    blocks.join("\n\n")
}
