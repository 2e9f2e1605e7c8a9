use log::debug;

use crate::{
    infer::{is_missing, parse_integer_token},
    schema::{Confidence, DetectedColumn, SqlType},
};

pub const SYNTHESIZED_KEY_NAME: &str = "id";
const SYNTHESIZED_KEY_FALLBACK: &str = "row_id";
const KEY_NAME_HINTS: [&str; 3] = ["id", "key", "code"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryKeySource {
    /// `id`, `*_id`, `no` or `number` with an integer-like type.
    NamePattern,
    /// First column holding exactly `1..=n`.
    SequentialFirstColumn,
    /// All-distinct column whose header mentions `id`, `key` or `code`.
    UniqueKeyHint,
    Synthesized,
}

fn has_key_name(name: &str) -> bool {
    name == "id" || name.ends_with("_id") || name == "no" || name == "number"
}

fn is_sequential_from_one(values: &[Option<&str>]) -> bool {
    if values.is_empty() {
        return false;
    }
    let mut parsed = Vec::with_capacity(values.len());
    for value in values {
        match value.filter(|v| !is_missing(v)).and_then(parse_integer_token) {
            Some(number) => parsed.push(number),
            None => return false,
        }
    }
    parsed.sort_unstable();
    parsed
        .iter()
        .enumerate()
        .all(|(index, value)| *value == index as i64 + 1)
}

fn is_all_distinct(values: &[Option<&str>]) -> bool {
    if values.is_empty() {
        return false;
    }
    let mut seen = std::collections::HashSet::with_capacity(values.len());
    values.iter().all(|value| match value {
        Some(v) if !is_missing(v) => seen.insert(v.trim()),
        _ => false,
    })
}

fn synthesized_name(columns: &[DetectedColumn]) -> String {
    let taken = |name: &str| columns.iter().any(|c| c.name == name);
    if !taken(SYNTHESIZED_KEY_NAME) {
        return SYNTHESIZED_KEY_NAME.to_string();
    }
    let mut candidate = SYNTHESIZED_KEY_FALLBACK.to_string();
    let mut suffix = 2;
    while taken(&candidate) {
        candidate = format!("{SYNTHESIZED_KEY_FALLBACK}_{suffix}");
        suffix += 1;
    }
    candidate
}

fn synthesized_column(name: String) -> DetectedColumn {
    DetectedColumn {
        original_name: name.clone(),
        name,
        inferred_type: SqlType::Serial,
        length: None,
        is_primary: true,
        is_required: true,
        is_unique: true,
        confidence: Confidence::High,
        sample_values: Vec::new(),
        is_generated: true,
    }
}

/// Marks exactly one primary column, synthesizing a leading SERIAL key when
/// no natural key is found.
///
/// `sample` holds the sampled cells of each column, parallel to `columns`.
pub fn apply_primary_key(
    columns: &mut Vec<DetectedColumn>,
    sample: &[Vec<Option<&str>>],
) -> PrimaryKeySource {
    for column in columns.iter_mut() {
        column.is_primary = false;
    }

    if let Some(column) = columns
        .iter_mut()
        .find(|c| has_key_name(&c.name) && c.inferred_type.is_integer_like())
    {
        debug!("Primary key '{}' chosen by name", column.name);
        column.mark_primary();
        return PrimaryKeySource::NamePattern;
    }

    if sample.first().is_some_and(|values| is_sequential_from_one(values)) {
        if let Some(first) = columns.first_mut() {
            debug!("Primary key '{}' chosen as sequential first column", first.name);
            first.mark_primary();
            return PrimaryKeySource::SequentialFirstColumn;
        }
    }

    let hinted = columns.iter().zip(sample).position(|(column, values)| {
        let original = column.original_name.to_lowercase();
        KEY_NAME_HINTS.iter().any(|hint| original.contains(hint)) && is_all_distinct(values)
    });
    if let Some(index) = hinted {
        let column = &mut columns[index];
        debug!("Primary key '{}' chosen by uniqueness", column.name);
        column.mark_primary();
        return PrimaryKeySource::UniqueKeyHint;
    }

    let name = synthesized_name(columns);
    debug!("No natural key found; synthesizing '{name}'");
    columns.insert(0, synthesized_column(name));
    PrimaryKeySource::Synthesized
}
