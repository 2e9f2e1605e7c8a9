//! The relational store boundary.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use anyhow::{Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{config::TenantConfig, data::Value, ddl, error::StoreError};

/// A column of an existing table as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub column_name: String,
    pub sql_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl TableColumn {
    /// The column a store reports after creating `definition`.
    pub fn from_definition(definition: &ColumnDefinition) -> Self {
        let (sql_type, max_length) = ddl::information_schema_type(&definition.sql_type);
        let default_value = ddl::is_serial_type(&definition.sql_type)
            .then(|| format!("nextval('{}_seq'::regclass)", definition.name));
        TableColumn {
            column_name: definition.name.clone(),
            sql_type,
            nullable: definition.nullable && !definition.primary_key,
            default_value,
            max_length,
        }
    }
}

/// A column to create, with its DDL type clause (e.g. `VARCHAR(255)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
}

pub trait RelationalStore {
    /// Columns of `schema.table` in ordinal order; empty when the table is missing.
    fn get_column_schema(&mut self, schema: &str, table: &str)
    -> Result<Vec<TableColumn>, StoreError>;

    fn create_table(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[ColumnDefinition],
        if_not_exists: bool,
    ) -> Result<(), StoreError>;

    fn drop_table(&mut self, schema: &str, table: &str) -> Result<(), StoreError>;

    fn create_schema(&mut self, schema: &str) -> Result<(), StoreError>;

    fn drop_schema(&mut self, schema: &str) -> Result<(), StoreError>;

    fn truncate_table(&mut self, schema: &str, table: &str) -> Result<(), StoreError>;

    /// Inserts one row; `columns` and `values` are parallel.
    fn insert_row(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[String],
        values: &[Value],
    ) -> Result<(), StoreError>;
}

impl<S: RelationalStore + ?Sized> RelationalStore for Box<S> {
    fn get_column_schema(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<TableColumn>, StoreError> {
        (**self).get_column_schema(schema, table)
    }

    fn create_table(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[ColumnDefinition],
        if_not_exists: bool,
    ) -> Result<(), StoreError> {
        (**self).create_table(schema, table, columns, if_not_exists)
    }

    fn drop_table(&mut self, schema: &str, table: &str) -> Result<(), StoreError> {
        (**self).drop_table(schema, table)
    }

    fn create_schema(&mut self, schema: &str) -> Result<(), StoreError> {
        (**self).create_schema(schema)
    }

    fn drop_schema(&mut self, schema: &str) -> Result<(), StoreError> {
        (**self).drop_schema(schema)
    }

    fn truncate_table(&mut self, schema: &str, table: &str) -> Result<(), StoreError> {
        (**self).truncate_table(schema, table)
    }

    fn insert_row(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[String],
        values: &[Value],
    ) -> Result<(), StoreError> {
        (**self).insert_row(schema, table, columns, values)
    }
}

/// Opens one store handle per request from explicitly supplied tenant config.
/// The handle is released when the returned box is dropped.
#[derive(Debug, Clone)]
pub struct TenantStoreFactory {
    tenants: std::collections::BTreeMap<String, TenantConfig>,
}

impl TenantStoreFactory {
    pub fn new(tenants: std::collections::BTreeMap<String, TenantConfig>) -> Self {
        TenantStoreFactory { tenants }
    }

    pub fn tenant(&self, code: &str) -> Result<&TenantConfig> {
        self.tenants.get(code).ok_or_else(|| {
            let known: Vec<&str> = self.tenants.keys().map(String::as_str).collect();
            anyhow!(
                "Unknown tenant '{code}'. Configured tenants: {}",
                if known.is_empty() {
                    "(none)".to_string()
                } else {
                    known.join(", ")
                }
            )
        })
    }

    /// Default schema for `code`, used when the caller names none.
    pub fn default_schema(&self, code: &str) -> Result<&str> {
        Ok(self.tenant(code)?.schema.as_str())
    }

    pub fn open(&self, code: &str) -> Result<Box<dyn RelationalStore>> {
        let tenant = self.tenant(code)?;
        debug!("Opening store for tenant '{code}'");
        open_connection(tenant)
    }
}

#[cfg(feature = "postgres")]
fn open_connection(tenant: &TenantConfig) -> Result<Box<dyn RelationalStore>> {
    let store = self::postgres::PostgresStore::connect(&tenant.connection)?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "postgres"))]
fn open_connection(_tenant: &TenantConfig) -> Result<Box<dyn RelationalStore>> {
    Err(anyhow!(
        "This build has no database driver; rebuild with `--features postgres` or use --dry-run"
    ))
}
