//! File access helpers shared by the parsers.

use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use encoding_rs_io::DecodeReaderBytesBuilder;

/// Bytes read up front for structure and encoding sniffing.
pub const SNIFF_BYTES: usize = 64 * 1024;

pub fn resolve_encoding(label: Option<&str>) -> Result<Option<&'static Encoding>> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .map(Some)
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(None),
    }
}

/// `truncated` marks a prefix that stopped at the sniff window rather than at
/// the end of the file; only then may it end inside a multi-byte sequence.
pub fn detect_encoding(prefix: &[u8], truncated: bool) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(prefix) {
        return encoding;
    }
    match std::str::from_utf8(prefix) {
        Ok(_) => UTF_8,
        Err(err) if truncated && err.error_len().is_none() => UTF_8,
        Err(_) => WINDOWS_1252,
    }
}

/// Sniffs a prefix returned by [`read_prefix`] with the [`SNIFF_BYTES`] window.
pub fn sniff_encoding(prefix: &[u8]) -> &'static Encoding {
    detect_encoding(prefix, prefix.len() >= SNIFF_BYTES)
}

pub fn file_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).with_context(|| format!("Reading metadata of {path:?}"))?;
    Ok(metadata.len())
}

pub fn read_prefix(path: &Path, limit: usize) -> Result<Vec<u8>> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let mut buffer = Vec::with_capacity(limit.min(SNIFF_BYTES));
    file.take(limit as u64)
        .read_to_end(&mut buffer)
        .with_context(|| format!("Reading input file {path:?}"))?;
    Ok(buffer)
}

/// Opens `path` as a UTF-8 stream transcoded from `encoding`. A BOM in the
/// file takes precedence over the requested encoding.
pub fn open_decoded_reader(path: &Path, encoding: &'static Encoding) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .bom_override(true)
        .build(BufReader::new(file));
    Ok(Box::new(decoder))
}

pub fn read_decoded_to_string(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let mut reader = open_decoded_reader(path, encoding)?;
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .with_context(|| format!("Decoding {path:?} as {}", encoding.name()))?;
    Ok(strip_bom(&text).to_string())
}

pub fn strip_bom(value: &str) -> &str {
    value.strip_prefix('\u{feff}').unwrap_or(value)
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}
