use std::collections::BTreeMap;

use super::{ColumnDefinition, RelationalStore, TableColumn};
use crate::{
    data::{TargetKind, Value},
    ddl,
    error::StoreError,
};

pub const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<ColumnDefinition>,
    rows: Vec<Vec<Value>>,
    /// Last value handed out per SERIAL column.
    sequences: BTreeMap<String, i64>,
}

impl MemoryTable {
    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    schemas: BTreeMap<String, BTreeMap<String, MemoryTable>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let mut schemas = BTreeMap::new();
        schemas.insert(DEFAULT_SCHEMA.to_string(), BTreeMap::new());
        MemoryStore { schemas }
    }
}

fn check_kind(column: &ColumnDefinition, value: Value) -> Result<Value, StoreError> {
    let mismatch = || StoreError::TypeMismatch {
        column: column.name.clone(),
        sql_type: column.sql_type.clone(),
    };
    let value = match (TargetKind::from_sql_type(&column.sql_type), value) {
        (_, Value::Null) => Value::Null,
        (TargetKind::Integer, v @ Value::Integer(_)) => v,
        (TargetKind::Float, Value::Integer(i)) => Value::Float(i as f64),
        (TargetKind::Float, v @ Value::Float(_)) => v,
        (TargetKind::Boolean, v @ Value::Boolean(_)) => v,
        (TargetKind::Date, v @ Value::Date(_)) => v,
        (TargetKind::Timestamp, v @ Value::Timestamp(_)) => v,
        (TargetKind::Timestamp, Value::Date(d)) => Value::Timestamp(d.and_time(chrono::NaiveTime::MIN)),
        (TargetKind::Text, v @ Value::Text(_)) => v,
        (TargetKind::Text, other) => Value::Text(other.to_string()),
        _ => return Err(mismatch()),
    };

    let (_, max_length) = ddl::information_schema_type(&column.sql_type);
    if let (Some(limit), Value::Text(text)) = (max_length, &value)
        && text.chars().count() > limit as usize
    {
        return Err(StoreError::Database(format!(
            "value too long for type {} in column '{}'",
            column.sql_type, column.name
        )));
    }
    Ok(value)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, schema: &str, table: &str) -> Option<&MemoryTable> {
        self.schemas.get(schema)?.get(table)
    }

    fn table_mut(&mut self, schema: &str, table: &str) -> Result<&mut MemoryTable, StoreError> {
        self.schemas
            .get_mut(schema)
            .and_then(|tables| tables.get_mut(table))
            .ok_or_else(|| StoreError::NotFound(format!("{schema}.{table}")))
    }

    pub fn has_table(&self, schema: &str, table: &str) -> bool {
        self.table(schema, table).is_some()
    }

    pub fn rows(&self, schema: &str, table: &str) -> Option<&[Vec<Value>]> {
        self.table(schema, table).map(|t| t.rows.as_slice())
    }

    pub fn row_count(&self, schema: &str, table: &str) -> usize {
        self.rows(schema, table).map_or(0, <[_]>::len)
    }

    /// Every stored value of one column, in insertion order.
    pub fn column_values(&self, schema: &str, table: &str, column: &str) -> Vec<Value> {
        let Some(table) = self.table(schema, table) else {
            return Vec::new();
        };
        let Some(index) = table.position(column) else {
            return Vec::new();
        };
        table.rows.iter().map(|row| row[index].clone()).collect()
    }
}

impl RelationalStore for MemoryStore {
    fn get_column_schema(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<TableColumn>, StoreError> {
        ddl::validate_identifier(schema)?;
        ddl::validate_identifier(table)?;
        Ok(self
            .table(schema, table)
            .map(|t| t.columns.iter().map(TableColumn::from_definition).collect())
            .unwrap_or_default())
    }

    fn create_table(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[ColumnDefinition],
        if_not_exists: bool,
    ) -> Result<(), StoreError> {
        // Rendering runs the same validation a database-backed store relies on.
        ddl::create_table_sql(schema, table, columns, if_not_exists)?;
        let tables = self
            .schemas
            .get_mut(schema)
            .ok_or_else(|| StoreError::NotFound(schema.to_string()))?;
        if tables.contains_key(table) {
            return if if_not_exists {
                Ok(())
            } else {
                Err(StoreError::AlreadyExists(format!("{schema}.{table}")))
            };
        }
        for (index, column) in columns.iter().enumerate() {
            if columns[..index].iter().any(|c| c.name == column.name) {
                return Err(StoreError::Database(format!(
                    "column '{}' specified more than once",
                    column.name
                )));
            }
        }
        tables.insert(
            table.to_string(),
            MemoryTable {
                columns: columns.to_vec(),
                ..MemoryTable::default()
            },
        );
        Ok(())
    }

    fn drop_table(&mut self, schema: &str, table: &str) -> Result<(), StoreError> {
        ddl::qualified_name(schema, table)?;
        if let Some(tables) = self.schemas.get_mut(schema) {
            tables.remove(table);
        }
        Ok(())
    }

    fn create_schema(&mut self, schema: &str) -> Result<(), StoreError> {
        ddl::validate_identifier(schema)?;
        self.schemas.entry(schema.to_string()).or_default();
        Ok(())
    }

    fn drop_schema(&mut self, schema: &str) -> Result<(), StoreError> {
        ddl::validate_identifier(schema)?;
        self.schemas.remove(schema);
        Ok(())
    }

    fn truncate_table(&mut self, schema: &str, table: &str) -> Result<(), StoreError> {
        self.table_mut(schema, table)?.rows.clear();
        Ok(())
    }

    fn insert_row(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[String],
        values: &[Value],
    ) -> Result<(), StoreError> {
        if columns.len() != values.len() {
            return Err(StoreError::Database(format!(
                "{} column(s) but {} value(s)",
                columns.len(),
                values.len()
            )));
        }
        let qualified = format!("{schema}.{table}");
        let target = self.table_mut(schema, table)?;

        let mut provided: Vec<Option<Value>> = vec![None; target.columns.len()];
        for (column, value) in columns.iter().zip(values) {
            let index = target
                .position(column)
                .ok_or_else(|| StoreError::UnknownColumn {
                    table: qualified.clone(),
                    column: column.clone(),
                })?;
            provided[index] = Some(check_kind(&target.columns[index], value.clone())?);
        }

        let mut row = Vec::with_capacity(target.columns.len());
        let mut claimed_serials = Vec::new();
        for (definition, value) in target.columns.iter().zip(provided) {
            let value = match value {
                Some(value) if !value.is_null() => value,
                _ if ddl::is_serial_type(&definition.sql_type) => {
                    let next = target.sequences.get(&definition.name).copied().unwrap_or(0) + 1;
                    claimed_serials.push((definition.name.clone(), next));
                    Value::Integer(next)
                }
                _ if !definition.nullable || definition.primary_key => {
                    return Err(StoreError::NotNullViolation {
                        column: definition.name.clone(),
                    });
                }
                _ => Value::Null,
            };
            if (definition.primary_key || definition.unique)
                && !value.is_null()
                && let Some(index) = target.position(&definition.name)
                && target.rows.iter().any(|existing| existing[index] == value)
            {
                return Err(StoreError::UniqueViolation {
                    column: definition.name.clone(),
                });
            }
            row.push(value);
        }

        // Like a database sequence, a value is consumed only by a written row here.
        for (name, next) in claimed_serials {
            target.sequences.insert(name, next);
        }
        target.rows.push(row);
        Ok(())
    }
}
