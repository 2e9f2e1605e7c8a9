use std::collections::HashMap;

use anyhow::{Context, Result};
use log::{debug, info};
use postgres::{Client, NoTls, error::SqlState, types::ToSql};

use super::{ColumnDefinition, RelationalStore, TableColumn};
use crate::{data::Value, ddl, error::StoreError};

const COLUMN_SCHEMA_QUERY: &str = "SELECT column_name::text, data_type::text, udt_name::text, \
     is_nullable::text, column_default::text, character_maximum_length::int4 \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 \
     ORDER BY ordinal_position";

pub struct PostgresStore {
    client: Client,
    /// Cast target per column, filled on first insert into a table.
    cast_types: HashMap<(String, String), HashMap<String, String>>,
}

fn map_error(err: postgres::Error) -> StoreError {
    let Some(db) = err.as_db_error() else {
        return StoreError::Database(err.to_string());
    };
    let column = db
        .column()
        .or(db.constraint())
        .unwrap_or_default()
        .to_string();
    match db.code() {
        code if *code == SqlState::NOT_NULL_VIOLATION => StoreError::NotNullViolation { column },
        code if *code == SqlState::UNIQUE_VIOLATION => StoreError::UniqueViolation { column },
        code if *code == SqlState::DUPLICATE_TABLE => StoreError::AlreadyExists(db.message().to_string()),
        code if *code == SqlState::UNDEFINED_TABLE => StoreError::NotFound(db.message().to_string()),
        _ => StoreError::Database(db.message().to_string()),
    }
}

impl PostgresStore {
    pub fn connect(connection: &str) -> Result<Self> {
        let client = Client::connect(connection, NoTls).context("Connecting to PostgreSQL")?;
        info!("Connected to PostgreSQL");
        Ok(PostgresStore {
            client,
            cast_types: HashMap::new(),
        })
    }

    fn execute_ddl(&mut self, sql: &str) -> Result<(), StoreError> {
        debug!("Executing: {sql}");
        self.client.batch_execute(sql).map_err(map_error)
    }

    fn cast_types(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<&HashMap<String, String>, StoreError> {
        let key = (schema.to_string(), table.to_string());
        if !self.cast_types.contains_key(&key) {
            let columns = self.get_column_schema(schema, table)?;
            if columns.is_empty() {
                return Err(StoreError::NotFound(format!("{schema}.{table}")));
            }
            let types = columns
                .into_iter()
                .map(|column| (column.column_name, column.sql_type))
                .collect();
            self.cast_types.insert(key.clone(), types);
        }
        Ok(&self.cast_types[&key])
    }

    fn forget(&mut self, schema: &str, table: &str) {
        self.cast_types
            .remove(&(schema.to_string(), table.to_string()));
    }
}

impl RelationalStore for PostgresStore {
    fn get_column_schema(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<TableColumn>, StoreError> {
        ddl::validate_identifier(schema)?;
        ddl::validate_identifier(table)?;
        let rows = self
            .client
            .query(COLUMN_SCHEMA_QUERY, &[&schema, &table])
            .map_err(map_error)?;
        Ok(rows
            .iter()
            .map(|row| {
                let data_type: String = row.get(1);
                let udt_name: String = row.get(2);
                let is_nullable: String = row.get(3);
                let max_length: Option<i32> = row.get(5);
                TableColumn {
                    column_name: row.get(0),
                    sql_type: if data_type == "USER-DEFINED" {
                        udt_name
                    } else {
                        data_type
                    },
                    nullable: is_nullable.eq_ignore_ascii_case("YES"),
                    default_value: row.get(4),
                    max_length: max_length.and_then(|n| u32::try_from(n).ok()),
                }
            })
            .collect())
    }

    fn create_table(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[ColumnDefinition],
        if_not_exists: bool,
    ) -> Result<(), StoreError> {
        let sql = ddl::create_table_sql(schema, table, columns, if_not_exists)?;
        self.forget(schema, table);
        self.execute_ddl(&sql)
    }

    fn drop_table(&mut self, schema: &str, table: &str) -> Result<(), StoreError> {
        let sql = ddl::drop_table_sql(schema, table)?;
        self.forget(schema, table);
        self.execute_ddl(&sql)
    }

    fn create_schema(&mut self, schema: &str) -> Result<(), StoreError> {
        let sql = ddl::create_schema_sql(schema)?;
        self.execute_ddl(&sql)
    }

    fn drop_schema(&mut self, schema: &str) -> Result<(), StoreError> {
        let sql = ddl::drop_schema_sql(schema, true)?;
        self.cast_types.retain(|(cached, _), _| cached != schema);
        self.execute_ddl(&sql)
    }

    fn truncate_table(&mut self, schema: &str, table: &str) -> Result<(), StoreError> {
        let sql = ddl::truncate_table_sql(schema, table)?;
        self.execute_ddl(&sql)
    }

    fn insert_row(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[String],
        values: &[Value],
    ) -> Result<(), StoreError> {
        let qualified = format!("{schema}.{table}");
        let types = self.cast_types(schema, table)?;
        let typed_columns = columns
            .iter()
            .map(|column| {
                types
                    .get(column)
                    .map(|sql_type| (column.as_str(), sql_type.clone()))
                    .ok_or_else(|| StoreError::UnknownColumn {
                        table: qualified.clone(),
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let pairs: Vec<(&str, &str)> = typed_columns
            .iter()
            .map(|(name, sql_type)| (*name, sql_type.as_str()))
            .collect();
        let sql = ddl::insert_row_sql(schema, table, &pairs)?;

        let params: Vec<Option<String>> = values.iter().map(Value::as_sql_text).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        self.client.execute(&sql, &refs).map_err(map_error)?;
        Ok(())
    }
}
