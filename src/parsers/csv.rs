use std::{collections::HashSet, path::Path};

use log::debug;

use super::{ParseOptions, ParsedFile, RawRow};
use crate::{detect, error::ImportError, io_utils};

pub fn parse(path: &Path, options: &ParseOptions) -> Result<ParsedFile, ImportError> {
    read_delimited(path, options, None)
}

fn placeholder_header(index: usize) -> String {
    format!("column_{}", index + 1)
}

/// Makes raw header keys unique and non-blank so every cell stays addressable.
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(raw.len());
    raw.into_iter()
        .enumerate()
        .map(|(index, header)| {
            let base = if header.is_empty() {
                placeholder_header(index)
            } else {
                header
            };
            let mut candidate = base.clone();
            let mut suffix = 2;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}_{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}

fn to_row(headers: &[String], record: &csv::StringRecord) -> RawRow {
    RawRow::from_pairs(headers.iter().zip(record.iter()).map(|(header, cell)| {
        let value = if cell.trim().is_empty() {
            None
        } else {
            Some(cell.to_string())
        };
        (header.clone(), value)
    }))
}

/// Shared reader for CSV and delimited text: sniffs the layout from the file
/// prefix, then streams the decoded file through the `csv` crate.
pub(crate) fn read_delimited(
    path: &Path,
    options: &ParseOptions,
    delimiter_hint: Option<u8>,
) -> Result<ParsedFile, ImportError> {
    let prefix = io_utils::read_prefix(path, io_utils::SNIFF_BYTES)
        .map_err(|err| ImportError::parse(path, format!("{err:#}")))?;
    let structure =
        detect::detect_structure(&prefix, options.encoding, options.delimiter.or(delimiter_hint));
    debug!(
        "Detected layout for {:?}: delimiter '{}', header {}, encoding {}",
        path,
        char::from(structure.delimiter).escape_default(),
        structure.has_header,
        structure.encoding.name()
    );

    let decoded = io_utils::open_decoded_reader(path, structure.encoding)
        .map_err(|err| ImportError::parse(path, format!("{err:#}")))?;
    let mut reader = io_utils::open_csv_reader(decoded, structure.delimiter);

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record
            .map_err(|err| ImportError::parse(path, format!("record {}: {err}", index + 1)))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        if headers.is_none() {
            if structure.has_header {
                let raw = record
                    .iter()
                    .map(|cell| io_utils::strip_bom(cell).trim().to_string())
                    .collect();
                headers = Some(unique_headers(raw));
                continue;
            }
            headers = Some((0..record.len()).map(placeholder_header).collect());
        }
        let Some(header_list) = headers.as_mut() else {
            continue;
        };
        // Rows wider than the header still keep their trailing cells.
        while header_list.len() < record.len() {
            let extra = placeholder_header(header_list.len());
            header_list.push(extra);
        }
        rows.push(to_row(header_list, &record));
    }

    let mut parsed = ParsedFile::new(headers.unwrap_or_default(), rows);
    parsed.structure = Some(structure);
    Ok(parsed)
}
