use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

/// PostgreSQL truncates identifiers longer than this many bytes.
pub const MAX_IDENTIFIER_BYTES: usize = 63;
pub const FALLBACK_COLUMN_NAME: &str = "unnamed_column";

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("valid underscore pattern"));

pub fn sanitize_column_name(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let collapsed = WHITESPACE_RUN.replace_all(lowered.trim(), "_");
    let word_only: String = collapsed
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let squeezed = UNDERSCORE_RUN.replace_all(&word_only, "_");
    let mut name = squeezed.trim_matches('_').to_string();

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if name.is_empty() {
        return FALLBACK_COLUMN_NAME.to_string();
    }
    truncate_identifier(&name).to_string()
}

fn truncate_identifier(name: &str) -> &str {
    if name.len() <= MAX_IDENTIFIER_BYTES {
        return name;
    }
    // Sanitized names are ASCII, so any byte index is a char boundary.
    name[..MAX_IDENTIFIER_BYTES].trim_end_matches('_')
}

/// Appends `_2`, `_3`, ... to repeated names, keeping every result within
/// [`MAX_IDENTIFIER_BYTES`].
pub fn dedupe_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut output = Vec::with_capacity(names.len());

    for name in names {
        if taken.insert(name.clone()) {
            output.push(name);
            continue;
        }
        let mut suffix = 2usize;
        loop {
            let tail = format!("_{suffix}");
            let keep = MAX_IDENTIFIER_BYTES.saturating_sub(tail.len()).min(name.len());
            let candidate = format!("{}{tail}", &name[..keep]);
            if taken.insert(candidate.clone()) {
                output.push(candidate);
                break;
            }
            suffix += 1;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_applies_transform_in_order() {
        assert_eq!(sanitize_column_name("  Order   ID "), "order_id");
        assert_eq!(sanitize_column_name("$Percent%"), "percent");
        assert_eq!(sanitize_column_name("e-mail / address"), "e_mail_address");
        assert_eq!(sanitize_column_name("2024 total"), "_2024_total");
        assert_eq!(sanitize_column_name("Café"), "caf");
    }

    #[test]
    fn sanitize_falls_back_for_symbol_only_headers() {
        assert_eq!(sanitize_column_name(""), FALLBACK_COLUMN_NAME);
        assert_eq!(sanitize_column_name("  ### "), FALLBACK_COLUMN_NAME);
    }

    #[test]
    fn sanitize_truncates_to_identifier_limit() {
        let long = "a".repeat(80);
        let sanitized = sanitize_column_name(&long);
        assert_eq!(sanitized.len(), MAX_IDENTIFIER_BYTES);

        let with_gap = format!("{} {}", "b".repeat(62), "c".repeat(10));
        let sanitized = sanitize_column_name(&with_gap);
        assert_eq!(sanitized, "b".repeat(62));
        assert_eq!(sanitize_column_name(&sanitized), sanitized);
    }

    #[test]
    fn dedupe_names_appends_numeric_suffixes() {
        let names = dedupe_names(["name", "name", "name_2", "id"]);
        assert_eq!(names, vec!["name", "name_2", "name_2_2", "id"]);
    }

    #[test]
    fn dedupe_names_respects_identifier_limit() {
        let long = "x".repeat(MAX_IDENTIFIER_BYTES);
        let names = dedupe_names([long.clone(), long.clone()]);
        assert_eq!(names[0], long);
        assert_eq!(names[1].len(), MAX_IDENTIFIER_BYTES);
        assert!(names[1].ends_with("_2"));
    }
}
