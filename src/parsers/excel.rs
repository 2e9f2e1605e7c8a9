use std::{collections::HashSet, path::Path};

use calamine::{Data, Reader, open_workbook_auto};
use chrono::NaiveTime;

use super::{ParsedFile, RawRow};
use crate::error::ImportError;

/// Renders a cell as the raw text a delimited export would contain.
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
        Data::Float(f) => f.to_string(),
        Data::String(s) => s.trim().to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.time() == NaiveTime::MIN => value.date().to_string(),
            Some(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    };
    (!text.is_empty()).then_some(text)
}

fn header_names(cells: &[Data]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(cells.len());
    cells
        .iter()
        .enumerate()
        .map(|(index, cell)| {
            let base = cell_text(cell).unwrap_or_else(|| format!("column_{}", index + 1));
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

/// Reads the first worksheet; its first row holds the headers.
pub fn parse(path: &Path) -> Result<ParsedFile, ImportError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| ImportError::parse(path, err))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::parse(path, "workbook has no worksheets"))?
        .map_err(|err| ImportError::parse(path, err))?;

    let mut rows_iter = range.rows();
    let Some(header_row) = rows_iter.next() else {
        return Ok(ParsedFile::new(Vec::new(), Vec::new()));
    };
    let headers = header_names(header_row);

    let rows = rows_iter
        .filter(|cells| cells.iter().any(|cell| cell_text(cell).is_some()))
        .map(|cells| {
            RawRow::from_pairs(
                headers
                    .iter()
                    .zip(cells.iter())
                    .map(|(header, cell)| (header.clone(), cell_text(cell))),
            )
        })
        .collect();

    Ok(ParsedFile::new(headers, rows))
}
