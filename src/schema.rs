//! Detected column model and table plans.

use std::{collections::HashSet, fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    error::ImportError,
    infer::{self, TypeInference},
    parsers::ParsedFile,
    primary_key,
    sanitize::{dedupe_names, sanitize_column_name},
    store::{ColumnDefinition, TableColumn},
};

pub const SAMPLE_VALUE_LIMIT: usize = 5;
const CURRENT_PLAN_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Boolean,
    Integer,
    BigInt,
    Decimal,
    Date,
    Timestamp,
    Varchar,
    Text,
    Serial,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Decimal => "DECIMAL",
            SqlType::Date => "DATE",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Varchar => "VARCHAR",
            SqlType::Text => "TEXT",
            SqlType::Serial => "SERIAL",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "BOOLEAN",
            "INTEGER",
            "BIGINT",
            "DECIMAL",
            "DATE",
            "TIMESTAMP",
            "VARCHAR",
            "TEXT",
            "SERIAL",
        ]
    }

    pub fn is_integer_like(&self) -> bool {
        matches!(self, SqlType::Integer | SqlType::BigInt | SqlType::Serial)
    }

    /// Type clause for `CREATE TABLE`, e.g. `VARCHAR(300)`.
    pub fn ddl(&self, length: Option<u32>) -> String {
        match (self, length) {
            (SqlType::Varchar, Some(length)) => format!("VARCHAR({length})"),
            (SqlType::Varchar, None) => format!("VARCHAR({})", infer::MIN_VARCHAR_LENGTH),
            _ => self.as_str().to_string(),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        let base = normalized.split('(').next().unwrap_or_default().trim();
        match base {
            "BOOLEAN" | "BOOL" => Ok(SqlType::Boolean),
            "INTEGER" | "INT" | "INT4" => Ok(SqlType::Integer),
            "BIGINT" | "INT8" => Ok(SqlType::BigInt),
            "DECIMAL" | "NUMERIC" => Ok(SqlType::Decimal),
            "DATE" => Ok(SqlType::Date),
            "TIMESTAMP" => Ok(SqlType::Timestamp),
            "VARCHAR" | "CHARACTER VARYING" => Ok(SqlType::Varchar),
            "TEXT" => Ok(SqlType::Text),
            "SERIAL" => Ok(SqlType::Serial),
            _ => Err(anyhow!(
                "Unknown SQL type '{value}'. Supported types: {}",
                SqlType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedColumn {
    pub name: String,
    pub original_name: String,
    pub inferred_type: SqlType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_unique: bool,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<String>,
    /// Set on columns that do not come from the file (the synthesized key).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_generated: bool,
}

impl DetectedColumn {
    pub fn from_inference(
        name: String,
        original_name: String,
        inference: TypeInference,
        sample_values: Vec<String>,
    ) -> Self {
        DetectedColumn {
            name,
            original_name,
            inferred_type: inference.sql_type,
            length: inference.length,
            is_primary: false,
            is_required: false,
            is_unique: false,
            confidence: inference.confidence,
            sample_values,
            is_generated: false,
        }
    }

    pub fn mark_primary(&mut self) {
        self.is_primary = true;
        self.is_required = true;
        self.is_unique = true;
    }

    pub fn ddl_type(&self) -> String {
        self.inferred_type.ddl(self.length)
    }

    pub fn to_definition(&self) -> ColumnDefinition {
        ColumnDefinition {
            name: self.name.clone(),
            sql_type: self.ddl_type(),
            nullable: !self.is_required,
            primary_key: self.is_primary,
            unique: self.is_unique && !self.is_primary,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePlan {
    pub columns: Vec<DetectedColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_version: Option<String>,
}

impl TablePlan {
    pub fn primary_key(&self) -> Option<&DetectedColumn> {
        self.columns.iter().find(|column| column.is_primary)
    }

    pub fn column(&self, name: &str) -> Option<&DetectedColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Columns that carry file data, excluding synthesized ones.
    pub fn source_columns(&self) -> Vec<DetectedColumn> {
        self.columns
            .iter()
            .filter(|column| !column.is_generated)
            .cloned()
            .collect()
    }

    pub fn column_definitions(&self) -> Vec<ColumnDefinition> {
        self.columns
            .iter()
            .map(DetectedColumn::to_definition)
            .collect()
    }

    /// The plan viewed as an existing table, for mapping against a saved plan.
    pub fn as_table_columns(&self) -> Vec<TableColumn> {
        self.columns
            .iter()
            .map(|column| TableColumn::from_definition(&column.to_definition()))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        if self.columns.is_empty() {
            return Err(ImportError::validation(
                "columns",
                "at least one column is required",
            ));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            crate::ddl::validate_identifier(&column.name).map_err(|err| {
                ImportError::validation(format!("column '{}'", column.name), err.to_string())
            })?;
            if !seen.insert(column.name.as_str()) {
                return Err(ImportError::validation(
                    "columns",
                    format!("duplicate column name '{}'", column.name),
                ));
            }
        }
        match self.columns.iter().filter(|c| c.is_primary).count() {
            1 => Ok(()),
            0 => Err(ImportError::validation(
                "primary key",
                "no primary key column was detected or synthesized",
            )),
            n => Err(ImportError::validation(
                "primary key",
                format!("{n} columns are marked primary; exactly one is required"),
            )),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating plan file {path:?}"))?;
        serde_yaml::to_writer(file, &self.versioned()).context("Writing plan YAML")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(&self.versioned()).context("Serializing plan to YAML string")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening plan file {path:?}"))?;
        let plan: TablePlan =
            serde_yaml::from_reader(BufReader::new(file)).context("Parsing plan YAML")?;
        plan.validate()
            .with_context(|| format!("Validating plan {path:?}"))?;
        Ok(plan)
    }

    fn versioned(&self) -> TablePlan {
        let mut plan = self.clone();
        if plan.plan_version.is_none() {
            plan.plan_version = Some(CURRENT_PLAN_VERSION.to_string());
        }
        plan
    }
}

/// Infers a primary-keyed column plan from the first `sample_rows` rows.
/// A `sample_rows` of zero scans every row.
pub fn build_table_plan(parsed: &ParsedFile, sample_rows: usize) -> TablePlan {
    let sample = if sample_rows == 0 {
        &parsed.rows[..]
    } else {
        &parsed.rows[..parsed.rows.len().min(sample_rows)]
    };

    let names = dedupe_names(parsed.headers.iter().map(|h| sanitize_column_name(h)));
    let column_values: Vec<Vec<Option<&str>>> = parsed
        .headers
        .iter()
        .map(|header| sample.iter().map(|row| row.value(header)).collect())
        .collect();

    let mut columns: Vec<DetectedColumn> = parsed
        .headers
        .iter()
        .zip(names)
        .zip(&column_values)
        .map(|((header, name), values)| {
            let inference = infer::infer_column_type(values.iter().copied());
            DetectedColumn::from_inference(
                name,
                header.clone(),
                inference,
                collect_sample_values(values),
            )
        })
        .collect();

    primary_key::apply_primary_key(&mut columns, &column_values);
    TablePlan {
        columns,
        plan_version: None,
    }
}

fn collect_sample_values(values: &[Option<&str>]) -> Vec<String> {
    let mut samples: Vec<String> = Vec::with_capacity(SAMPLE_VALUE_LIMIT);
    for value in values.iter().flatten() {
        if samples.len() >= SAMPLE_VALUE_LIMIT {
            break;
        }
        let trimmed = value.trim();
        if infer::is_missing(trimmed) || samples.iter().any(|s| s == trimmed) {
            continue;
        }
        samples.push(trimmed.to_string());
    }
    samples
}
