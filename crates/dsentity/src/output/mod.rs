//! Rendering of CLI results.
//!
//! Records are converted to JSON through `dsentity_core::map_to_json`, then
//! printed either as JSON or as an indented text listing.

mod pretty;

use dsentity_core::store::{Cursor, Record};
use dsentity_core::{map_to_json, Key};
use serde_json::json;

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

/// JSON form of a record.
pub fn record_json(record: &Record) -> serde_json::Value {
    json!({
        "key": record.key.to_string(),
        "properties": map_to_json(&record.properties),
    })
}

/// Render a single lookup result.
pub fn render_record(record: Option<&Record>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => record.map(record_json).unwrap_or(serde_json::Value::Null).to_string(),
        OutputFormat::Pretty => match record {
            Some(record) => pretty::record(record),
            None => "not found".to_string(),
        },
    }
}

/// Render a list of records with an optional continuation cursor.
pub fn render_records(records: &[Record], cursor: Option<&Cursor>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!({
            "records": records.iter().map(record_json).collect::<Vec<_>>(),
            "next_cursor": cursor.map(Cursor::as_str),
        })
        .to_string(),
        OutputFormat::Pretty => pretty::records(records, cursor),
    }
}

/// Render a list of keys.
pub fn render_keys(keys: &[Key], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::Value::from(keys.iter().map(Key::to_string).collect::<Vec<_>>()).to_string()
        }
        OutputFormat::Pretty => keys
            .iter()
            .map(Key::to_string)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsentity_core::{PropertyMap, Value};

    fn sample() -> Record {
        Record::new(
            Key::with_id("User", 5),
            PropertyMap::from([("name", Value::from("alice")), ("age", Value::from(30))]),
        )
    }

    #[test]
    fn test_record_json() {
        let json = record_json(&sample());
        assert_eq!(json["key"], "User:5");
        assert_eq!(json["properties"]["name"], "alice");
        assert_eq!(json["properties"]["age"], 30);
    }

    #[test]
    fn test_missing_record() {
        assert_eq!(render_record(None, OutputFormat::Json), "null");
        assert_eq!(render_record(None, OutputFormat::Pretty), "not found");
    }

    #[test]
    fn test_records_with_cursor() {
        let cursor = Cursor::new("abc");
        let rendered = render_records(&[sample()], Some(&cursor), OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed["records"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["next_cursor"], "abc");
    }

    #[test]
    fn test_keys() {
        let keys = vec![Key::with_id("User", 1), Key::with_id("User", 2)];
        assert_eq!(render_keys(&keys, OutputFormat::Json), r#"["User:1","User:2"]"#);
        assert_eq!(render_keys(&keys, OutputFormat::Pretty), "User:1\nUser:2");
    }
}
