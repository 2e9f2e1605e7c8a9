use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    import::{DEFAULT_BATCH_SIZE, DEFAULT_ERROR_PREVIEW_LIMIT, DEFAULT_SAMPLE_ROWS},
    parsers::DEFAULT_MAX_FILE_BYTES,
};

pub const DEFAULT_CONFIG_FILE: &str = "tabular-import.yml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportDefaults {
    pub batch_size: i64,
    pub sample_rows: usize,
    pub error_preview_limit: usize,
    pub max_file_bytes: u64,
}

impl Default for ImportDefaults {
    fn default() -> Self {
        ImportDefaults {
            batch_size: DEFAULT_BATCH_SIZE,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            error_preview_limit: DEFAULT_ERROR_PREVIEW_LIMIT,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    /// libpq-style connection string.
    pub connection: String,
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_schema() -> String {
    "public".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub defaults: ImportDefaults,
    pub tenants: BTreeMap<String, TenantConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: AppConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))?;
        debug!(
            "Loaded config {:?} with {} tenant(s)",
            path,
            config.tenants.len()
        );
        Ok(config)
    }

    /// Loads `path` when given, else `tabular-import.yml` in the working
    /// directory when present, else the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    Ok(AppConfig::default())
                }
            }
        }
    }
}
