use std::path::Path;

use super::{ParseOptions, ParsedFile, csv::read_delimited};
use crate::error::ImportError;

/// `.tsv` and `.tab` files default to tabs; anything else is sniffed.
fn delimiter_hint(path: &Path) -> Option<u8> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    matches!(extension.as_str(), "tsv" | "tab").then_some(b'\t')
}

pub fn parse(path: &Path, options: &ParseOptions) -> Result<ParsedFile, ImportError> {
    read_delimited(path, options, delimiter_hint(path))
}
