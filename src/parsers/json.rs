use std::path::Path;

use serde_json::Value as JsonValue;

use super::{ParseOptions, ParsedFile, RawRow};
use crate::{error::ImportError, io_utils};

fn json_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) if s.trim().is_empty() => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

/// Accepts an array of objects or a single object. Headers follow the keys of
/// the first record, extended by keys that only appear later.
pub fn parse(path: &Path, options: &ParseOptions) -> Result<ParsedFile, ImportError> {
    let encoding = match options.encoding {
        Some(encoding) => encoding,
        None => {
            let prefix = io_utils::read_prefix(path, io_utils::SNIFF_BYTES)
                .map_err(|err| ImportError::parse(path, format!("{err:#}")))?;
            io_utils::sniff_encoding(&prefix)
        }
    };
    let text = io_utils::read_decoded_to_string(path, encoding)
        .map_err(|err| ImportError::parse(path, format!("{err:#}")))?;
    parse_str(path, &text)
}

pub fn parse_str(path: &Path, text: &str) -> Result<ParsedFile, ImportError> {
    let document: JsonValue =
        serde_json::from_str(text).map_err(|err| ImportError::parse(path, err))?;
    let records = match document {
        JsonValue::Array(items) => items,
        object @ JsonValue::Object(_) => vec![object],
        other => {
            return Err(ImportError::parse(
                path,
                format!("expected an array of objects or an object, found {}", kind(&other)),
            ));
        }
    };

    let mut headers: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let map = match record {
            JsonValue::Object(map) => map,
            other => {
                return Err(ImportError::parse(
                    path,
                    format!("element {} is {}, expected an object", index + 1, kind(&other)),
                ));
            }
        };
        for key in map.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
        rows.push(RawRow::from_pairs(
            map.iter().map(|(key, value)| (key.clone(), json_text(value))),
        ));
    }

    Ok(ParsedFile::new(headers, rows))
}

fn kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
