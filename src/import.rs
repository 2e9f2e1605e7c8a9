//! The batch import executor.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    data::coerce_value,
    ddl,
    error::ImportError,
    mapper::{self, MappingReport},
    parsers::{self, FileFormat, ParseOptions, ParsedFile},
    schema::{TablePlan, build_table_plan},
    store::{RelationalStore, TableColumn},
};

pub const DEFAULT_BATCH_SIZE: i64 = 1000;
pub const MIN_BATCH_SIZE: i64 = 1;
pub const MAX_BATCH_SIZE: i64 = 10_000;
pub const DEFAULT_SAMPLE_ROWS: usize = 100;
pub const DEFAULT_ERROR_PREVIEW_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub schema: String,
    pub table_name: String,
    pub create_table_if_missing: bool,
    pub truncate_before_import: bool,
    pub skip_row_errors: bool,
    /// Signed so out-of-range requests can be reported instead of wrapped.
    pub batch_size: i64,
    pub map_columns: bool,
    /// Rows used for type inference; zero means every row.
    pub sample_rows: usize,
    pub error_preview_limit: usize,
}

impl ImportOptions {
    pub fn new(schema: impl Into<String>, table_name: impl Into<String>) -> Self {
        ImportOptions {
            schema: schema.into(),
            table_name: table_name.into(),
            create_table_if_missing: false,
            truncate_before_import: false,
            skip_row_errors: false,
            batch_size: DEFAULT_BATCH_SIZE,
            map_columns: false,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            error_preview_limit: DEFAULT_ERROR_PREVIEW_LIMIT,
        }
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        ddl::validate_identifier(&self.schema)
            .map_err(|err| ImportError::validation("schema", err.to_string()))?;
        ddl::validate_identifier(&self.table_name)
            .map_err(|err| ImportError::validation("table_name", err.to_string()))?;
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(ImportError::validation(
                "batch_size",
                format!(
                    "{} is outside the allowed range {MIN_BATCH_SIZE}..={MAX_BATCH_SIZE}",
                    self.batch_size
                ),
            ));
        }
        Ok(())
    }

    fn batch_len(&self) -> usize {
        usize::try_from(self.batch_size).unwrap_or(DEFAULT_BATCH_SIZE as usize)
    }
}

/// The file to import and how to read it.
#[derive(Debug, Clone)]
pub struct ImportSource {
    pub path: PathBuf,
    /// Overrides detection from extension and mime type.
    pub format: Option<FileFormat>,
    pub mime: Option<String>,
    pub parse: ParseOptions,
    /// Uploaded files are deleted once the import ends, however it ends.
    pub temporary: bool,
}

impl ImportSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ImportSource {
            path: path.into(),
            format: None,
            mime: None,
            parse: ParseOptions::default(),
            temporary: false,
        }
    }

    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn resolve_format(&self) -> Result<FileFormat, ImportError> {
        self.format
            .or_else(|| FileFormat::detect(&self.path, self.mime.as_deref()))
            .ok_or_else(|| ImportError::UnsupportedFormat {
                path: self.path.clone(),
            })
    }

    pub fn parse(&self) -> Result<ParsedFile, ImportError> {
        let format = self.resolve_format()?;
        parsers::parse_file(&self.path, format, &self.parse)
    }
}

/// Removes a temporary upload when dropped. Several guards may cover the
/// same file; whichever drops first deletes it.
pub struct UploadGuard {
    path: Option<PathBuf>,
}

impl UploadGuard {
    pub fn new(source: &ImportSource) -> Self {
        UploadGuard {
            path: source.temporary.then(|| source.path.clone()),
        }
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed temporary upload {path:?}"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove temporary upload {path:?}: {err}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Idle,
    Parsing,
    TableEnsured,
    Truncated,
    Inserting,
    Completed,
    Aborted,
    Cancelled,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImportPhase::Idle => "idle",
            ImportPhase::Parsing => "parsing",
            ImportPhase::TableEnsured => "table-ensured",
            ImportPhase::Truncated => "truncated",
            ImportPhase::Inserting => "inserting",
            ImportPhase::Completed => "completed",
            ImportPhase::Aborted => "aborted",
            ImportPhase::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

struct PhaseTracker {
    run_id: Uuid,
    phase: ImportPhase,
}

impl PhaseTracker {
    fn advance(&mut self, next: ImportPhase) {
        debug!("Import {}: {} -> {}", self.run_id, self.phase, next);
        self.phase = next;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Completed,
    Aborted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based position among the file's data rows.
    pub row: usize,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub run_id: Uuid,
    pub status: ImportStatus,
    /// Rows attempted, so `success_rows + error_rows == total_rows` always holds.
    pub total_rows: usize,
    pub success_rows: usize,
    pub error_rows: usize,
    pub errors: Vec<RowError>,
    pub errors_truncated: bool,
    pub success: bool,
    pub partial_success: bool,
    pub execution_time_ms: u64,
}

/// Cooperative cancellation, checked between batches.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A source column bound to the destination column it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    /// Raw header key in the parsed rows.
    pub source_header: String,
    pub target_column: String,
    pub target_type: String,
}

fn bind_by_name(plan: &TablePlan, existing: &[TableColumn]) -> Vec<ColumnBinding> {
    plan.source_columns()
        .into_iter()
        .filter_map(|column| {
            existing
                .iter()
                .find(|target| target.column_name.eq_ignore_ascii_case(&column.name))
                .map(|target| ColumnBinding {
                    source_header: column.original_name.clone(),
                    target_column: target.column_name.clone(),
                    target_type: target.sql_type.clone(),
                })
        })
        .collect()
}

fn bind_by_mapping(
    plan: &TablePlan,
    existing: &[TableColumn],
    report: &MappingReport,
) -> Vec<ColumnBinding> {
    report
        .bindings()
        .into_iter()
        .filter_map(|(source, target)| {
            let column = plan.column(&source)?;
            let target = existing.iter().find(|t| t.column_name == target)?;
            Some(ColumnBinding {
                source_header: column.original_name.clone(),
                target_column: target.column_name.clone(),
                target_type: target.sql_type.clone(),
            })
        })
        .collect()
}

/// Infers a plan for `source` without touching any store.
pub fn probe(source: &ImportSource, sample_rows: usize) -> Result<(ParsedFile, TablePlan), ImportError> {
    let parsed = source.parse()?;
    let plan = build_table_plan(&parsed, sample_rows);
    plan.validate()?;
    Ok((parsed, plan))
}

pub struct Importer {
    options: ImportOptions,
    plan: Option<TablePlan>,
    cancellation: CancellationToken,
}

impl Importer {
    pub fn new(options: ImportOptions) -> Self {
        Importer {
            options,
            plan: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Uses a reviewed plan instead of inferring one from the file.
    pub fn with_plan(mut self, plan: TablePlan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn run<S>(&self, store: &mut S, source: &ImportSource) -> Result<ImportResult, ImportError>
    where
        S: RelationalStore + ?Sized,
    {
        let _guard = UploadGuard::new(source);
        let started = Instant::now();
        let mut tracker = PhaseTracker {
            run_id: Uuid::new_v4(),
            phase: ImportPhase::Idle,
        };
        let options = &self.options;
        options.validate()?;

        tracker.advance(ImportPhase::Parsing);
        let parsed = source.parse()?;
        let plan = match &self.plan {
            Some(plan) => plan.clone(),
            None => build_table_plan(&parsed, options.sample_rows),
        };
        plan.validate()?;

        let existing = self.ensure_table(store, &plan)?;
        tracker.advance(ImportPhase::TableEnsured);

        let bindings = self.bindings(&plan, &existing)?;
        if options.truncate_before_import {
            store.truncate_table(&options.schema, &options.table_name)?;
            tracker.advance(ImportPhase::Truncated);
        }

        tracker.advance(ImportPhase::Inserting);
        let mut result = self.insert_rows(store, &parsed, &bindings, &mut tracker);
        result.execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            "Import {} into {}.{} {:?}: {} row(s), {} succeeded, {} failed in {} ms",
            result.run_id,
            options.schema,
            options.table_name,
            result.status,
            result.total_rows,
            result.success_rows,
            result.error_rows,
            result.execution_time_ms
        );
        Ok(result)
    }

    fn ensure_table<S>(&self, store: &mut S, plan: &TablePlan) -> Result<Vec<TableColumn>, ImportError>
    where
        S: RelationalStore + ?Sized,
    {
        let options = &self.options;
        let existing = store.get_column_schema(&options.schema, &options.table_name)?;
        if !existing.is_empty() {
            return Ok(existing);
        }
        let missing = || ImportError::MissingTable {
            schema: options.schema.clone(),
            table: options.table_name.clone(),
        };
        if !options.create_table_if_missing {
            return Err(missing());
        }
        info!(
            "Creating table {}.{} with {} column(s)",
            options.schema,
            options.table_name,
            plan.columns.len()
        );
        store.create_table(
            &options.schema,
            &options.table_name,
            &plan.column_definitions(),
            true,
        )?;
        let created = store.get_column_schema(&options.schema, &options.table_name)?;
        if created.is_empty() {
            return Err(missing());
        }
        Ok(created)
    }

    fn bindings(
        &self,
        plan: &TablePlan,
        existing: &[TableColumn],
    ) -> Result<Vec<ColumnBinding>, ImportError> {
        let bindings = if self.options.map_columns {
            let report = mapper::map_columns(&plan.source_columns(), existing);
            for mapping in report.mappings.iter().filter(|m| !m.is_matched) {
                warn!(
                    "Column '{}' has no match in {}.{} and will be skipped{}",
                    mapping.original_name,
                    self.options.schema,
                    self.options.table_name,
                    mapping
                        .suggestion
                        .as_ref()
                        .map(|s| format!(" ({s})"))
                        .unwrap_or_default()
                );
            }
            debug!(
                "Mapped {}/{} column(s): {}",
                report.matched, report.total, report.recommendation
            );
            bind_by_mapping(plan, existing, &report)
        } else {
            bind_by_name(plan, existing)
        };
        if bindings.is_empty() {
            return Err(ImportError::NoMatchingColumns {
                schema: self.options.schema.clone(),
                table: self.options.table_name.clone(),
            });
        }
        Ok(bindings)
    }

    fn insert_rows<S>(
        &self,
        store: &mut S,
        parsed: &ParsedFile,
        bindings: &[ColumnBinding],
        tracker: &mut PhaseTracker,
    ) -> ImportResult
    where
        S: RelationalStore + ?Sized,
    {
        let options = &self.options;
        let mut status = ImportStatus::Completed;
        let mut success_rows = 0usize;
        let mut error_rows = 0usize;
        let mut errors: Vec<RowError> = Vec::new();
        let mut errors_truncated = false;

        'batches: for (batch_index, batch) in parsed.rows.chunks(options.batch_len()).enumerate() {
            if self.cancellation.is_cancelled() {
                status = ImportStatus::Cancelled;
                break;
            }
            let offset = batch_index * options.batch_len();
            debug!(
                "Import {}: batch {} ({} row(s))",
                tracker.run_id,
                batch_index + 1,
                batch.len()
            );
            for (position, row) in batch.iter().enumerate() {
                let row_number = offset + position + 1;
                match insert_row(store, options, row, bindings) {
                    Ok(()) => success_rows += 1,
                    Err(message) => {
                        error_rows += 1;
                        warn!("Row {row_number} failed: {message}");
                        if errors.len() < options.error_preview_limit {
                            errors.push(RowError {
                                row: row_number,
                                error: message,
                                data: Some(row.to_json()),
                            });
                        } else {
                            errors_truncated = true;
                        }
                        if !options.skip_row_errors {
                            status = ImportStatus::Aborted;
                            break 'batches;
                        }
                    }
                }
            }
        }

        tracker.advance(match status {
            ImportStatus::Completed => ImportPhase::Completed,
            ImportStatus::Aborted => ImportPhase::Aborted,
            ImportStatus::Cancelled => ImportPhase::Cancelled,
        });
        ImportResult {
            run_id: tracker.run_id,
            status,
            total_rows: success_rows + error_rows,
            success_rows,
            error_rows,
            errors,
            errors_truncated,
            success: status == ImportStatus::Completed && error_rows == 0,
            partial_success: options.skip_row_errors && success_rows > 0 && error_rows > 0,
            execution_time_ms: 0,
        }
    }
}

fn insert_row<S>(
    store: &mut S,
    options: &ImportOptions,
    row: &parsers::RawRow,
    bindings: &[ColumnBinding],
) -> Result<(), String>
where
    S: RelationalStore + ?Sized,
{
    let mut columns = Vec::with_capacity(bindings.len());
    let mut values = Vec::with_capacity(bindings.len());
    for binding in bindings
        .iter()
        .filter(|b| row.contains_key(&b.source_header))
    {
        let value = coerce_value(
            row.value(&binding.source_header),
            &binding.target_column,
            &binding.target_type,
        )
        .map_err(|err| err.to_string())?;
        columns.push(binding.target_column.clone());
        values.push(value);
    }
    if columns.is_empty() {
        return Err("Row has no values for any mapped column".to_string());
    }
    store
        .insert_row(&options.schema, &options.table_name, &columns, &values)
        .map_err(|err| err.to_string())
}

/// Convenience for callers holding a plain path: imports `path` and removes
/// it afterwards when `remove_source` is set.
pub fn import_file<S>(
    store: &mut S,
    path: &Path,
    options: ImportOptions,
    remove_source: bool,
) -> Result<ImportResult, ImportError>
where
    S: RelationalStore + ?Sized,
{
    let source = ImportSource::new(path).temporary(remove_source);
    Importer::new(options).run(store, &source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_validation_names_the_field() {
        let mut options = ImportOptions::new("public", "people");
        assert!(options.validate().is_ok());

        options.batch_size = 0;
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));

        options.batch_size = MAX_BATCH_SIZE + 1;
        assert!(options.validate().is_err());

        let options = ImportOptions::new("public", "people; drop");
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("table_name"));
    }

    #[test]
    fn cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let source = ImportSource::new("upload.png");
        assert!(matches!(
            source.resolve_format(),
            Err(ImportError::UnsupportedFormat { .. })
        ));
    }
}
