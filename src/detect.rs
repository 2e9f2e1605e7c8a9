use encoding_rs::Encoding;

use crate::io_utils;

/// Tried in order; earlier candidates win ties.
pub const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
pub const DEFAULT_DELIMITER: u8 = b',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureInfo {
    pub delimiter: u8,
    pub has_header: bool,
    pub encoding: &'static Encoding,
}

/// Splits one line on `delimiter`, leaving delimiters inside double quotes
/// alone and unwrapping quoted fields.
pub fn split_fields(line: &str, delimiter: u8) -> Vec<String> {
    let delimiter = delimiter as char;
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}

pub fn count_fields(line: &str, delimiter: u8) -> usize {
    split_fields(line, delimiter).len()
}

/// Picks the candidate producing the most fields on `first_line`.
pub fn detect_delimiter(first_line: &str) -> u8 {
    let mut best = DEFAULT_DELIMITER;
    let mut best_count = 0usize;
    for candidate in DELIMITER_CANDIDATES {
        let count = count_fields(first_line, candidate);
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

fn is_numeric_token(token: &str) -> bool {
    let trimmed = token.trim();
    trimmed.parse::<i64>().is_ok() || trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

/// A first row reads as a header when any of its non-empty tokens is not a number.
pub fn detect_header(first_line: &str, delimiter: u8) -> bool {
    split_fields(first_line, delimiter)
        .iter()
        .filter(|token| !token.trim().is_empty())
        .any(|token| !is_numeric_token(token))
}

pub fn first_line(text: &str) -> &str {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
}

/// Sniffs encoding, delimiter, and header presence from the leading bytes of a file.
///
/// `encoding_override` skips sniffing and `delimiter_override` skips delimiter
/// detection; header detection always runs.
pub fn detect_structure(
    prefix: &[u8],
    encoding_override: Option<&'static Encoding>,
    delimiter_override: Option<u8>,
) -> StructureInfo {
    let encoding = encoding_override.unwrap_or_else(|| io_utils::sniff_encoding(prefix));
    let (text, _, _) = encoding.decode(prefix);
    let line = first_line(&text);
    let delimiter = delimiter_override.unwrap_or_else(|| detect_delimiter(line));
    let has_header = if line.is_empty() {
        true
    } else {
        detect_header(line, delimiter)
    };
    StructureInfo {
        delimiter,
        has_header,
        encoding,
    }
}
