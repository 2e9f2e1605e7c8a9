pub mod csv;
pub mod excel;
pub mod json;
pub mod text;

use std::{fmt, path::Path, str::FromStr};

use anyhow::anyhow;
use encoding_rs::Encoding;
use log::debug;

use crate::{detect::StructureInfo, error::ImportError, io_utils};

/// 50 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Excel,
    Json,
    DelimitedText,
}

impl FileFormat {
    /// Resolves the format from the file extension, falling back to the mime type.
    pub fn detect(path: &Path, mime: Option<&str>) -> Option<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        let by_extension = match extension.as_deref() {
            Some("csv") => Some(FileFormat::Csv),
            Some("xlsx" | "xls" | "xlsm" | "xlsb" | "ods") => Some(FileFormat::Excel),
            Some("json") => Some(FileFormat::Json),
            Some("txt" | "tsv" | "tab") => Some(FileFormat::DelimitedText),
            _ => None,
        };
        by_extension.or_else(|| mime.and_then(Self::from_mime))
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/csv" | "application/csv" => Some(FileFormat::Csv),
            "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(FileFormat::Excel),
            "application/json" | "text/json" => Some(FileFormat::Json),
            "text/plain" | "text/tab-separated-values" => Some(FileFormat::DelimitedText),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Excel => "excel",
            FileFormat::Json => "json",
            FileFormat::DelimitedText => "text",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "excel" | "xlsx" | "xls" => Ok(FileFormat::Excel),
            "json" => Ok(FileFormat::Json),
            "text" | "txt" | "tsv" => Ok(FileFormat::DelimitedText),
            other => Err(anyhow!(
                "Unknown format '{other}'. Expected csv, excel, json or text"
            )),
        }
    }
}

/// One input record keyed by original header, in header order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    fields: Vec<(String, Option<String>)>,
}

impl RawRow {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, Option<String>)>,
    {
        RawRow {
            fields: pairs.into_iter().collect(),
        }
    }

    pub fn fields(&self) -> &[(String, Option<String>)] {
        &self.fields
    }

    pub fn contains_key(&self, header: &str) -> bool {
        self.fields.iter().any(|(key, _)| key == header)
    }

    /// The cell for `header`; `None` when the key is absent or the cell is empty.
    pub fn value(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == header)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|(key, value)| {
                let value = value
                    .as_ref()
                    .map_or(serde_json::Value::Null, |v| serde_json::Value::String(v.clone()));
                (key.clone(), value)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Sniffed layout for delimited formats.
    pub structure: Option<StructureInfo>,
}

impl ParsedFile {
    pub fn new(headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        ParsedFile {
            headers,
            rows,
            structure: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub encoding: Option<&'static Encoding>,
    pub delimiter: Option<u8>,
    pub max_file_bytes: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            encoding: None,
            delimiter: None,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Parses `path` as `format`, rejecting oversized and row-less files.
pub fn parse_file(
    path: &Path,
    format: FileFormat,
    options: &ParseOptions,
) -> Result<ParsedFile, ImportError> {
    let size = io_utils::file_size(path).map_err(|err| ImportError::parse(path, format!("{err:#}")))?;
    if size > options.max_file_bytes {
        return Err(ImportError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            limit: options.max_file_bytes,
        });
    }
    if size == 0 {
        return Err(ImportError::EmptyFile {
            path: path.to_path_buf(),
        });
    }

    let parsed = match format {
        FileFormat::Csv => csv::parse(path, options)?,
        FileFormat::DelimitedText => text::parse(path, options)?,
        FileFormat::Excel => excel::parse(path)?,
        FileFormat::Json => json::parse(path, options)?,
    };
    debug!(
        "Parsed {:?} as {format}: {} header(s), {} row(s)",
        path,
        parsed.headers.len(),
        parsed.rows.len()
    );
    if parsed.rows.is_empty() {
        return Err(ImportError::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    Ok(parsed)
}
