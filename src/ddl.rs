//! Identifier validation and SQL statement rendering. Names are checked, then
//! double-quoted; row values are always bound as parameters.

use std::sync::LazyLock;

use regex::Regex;

use crate::{error::StoreError, store::ColumnDefinition};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier pattern")
});
static TYPE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_ ]*(\(\s*\d+\s*(,\s*\d+\s*)?\))?$")
        .expect("valid type pattern")
});

pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

pub fn validate_type_clause(sql_type: &str) -> Result<(), StoreError> {
    if TYPE_CLAUSE.is_match(sql_type.trim()) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(sql_type.to_string()))
    }
}

pub fn quote_identifier(name: &str) -> Result<String, StoreError> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

pub fn qualified_name(schema: &str, table: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}.{}",
        quote_identifier(schema)?,
        quote_identifier(table)?
    ))
}

fn column_clause(column: &ColumnDefinition) -> Result<String, StoreError> {
    validate_type_clause(&column.sql_type)?;
    let mut clause = format!("{} {}", quote_identifier(&column.name)?, column.sql_type);
    if column.primary_key {
        clause.push_str(" PRIMARY KEY");
    } else {
        if !column.nullable {
            clause.push_str(" NOT NULL");
        }
        if column.unique {
            clause.push_str(" UNIQUE");
        }
    }
    Ok(clause)
}

pub fn create_table_sql(
    schema: &str,
    table: &str,
    columns: &[ColumnDefinition],
    if_not_exists: bool,
) -> Result<String, StoreError> {
    let clauses = columns
        .iter()
        .map(column_clause)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(
        "CREATE TABLE {}{} (\n  {}\n)",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        qualified_name(schema, table)?,
        clauses.join(",\n  ")
    ))
}

pub fn drop_table_sql(schema: &str, table: &str) -> Result<String, StoreError> {
    Ok(format!("DROP TABLE IF EXISTS {}", qualified_name(schema, table)?))
}

pub fn create_schema_sql(schema: &str) -> Result<String, StoreError> {
    Ok(format!(
        "CREATE SCHEMA IF NOT EXISTS {}",
        quote_identifier(schema)?
    ))
}

pub fn drop_schema_sql(schema: &str, cascade: bool) -> Result<String, StoreError> {
    Ok(format!(
        "DROP SCHEMA IF EXISTS {}{}",
        quote_identifier(schema)?,
        if cascade { " CASCADE" } else { "" }
    ))
}

pub fn truncate_table_sql(schema: &str, table: &str) -> Result<String, StoreError> {
    Ok(format!("TRUNCATE TABLE {}", qualified_name(schema, table)?))
}

/// Renders a single-row insert binding every value as text and casting it to
/// the declared type of its column: `columns` pairs each name with that type.
pub fn insert_row_sql(
    schema: &str,
    table: &str,
    columns: &[(&str, &str)],
) -> Result<String, StoreError> {
    let mut names = Vec::with_capacity(columns.len());
    let mut placeholders = Vec::with_capacity(columns.len());
    for (index, (name, sql_type)) in columns.iter().enumerate() {
        validate_type_clause(sql_type)?;
        names.push(quote_identifier(name)?);
        placeholders.push(format!("CAST(${}::text AS {sql_type})", index + 1));
    }
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified_name(schema, table)?,
        names.join(", "),
        placeholders.join(", ")
    ))
}

/// Maps a DDL type clause onto the `information_schema.columns` data type and
/// character length it reports once the table exists.
pub fn information_schema_type(ddl_type: &str) -> (String, Option<u32>) {
    let normalized = ddl_type.trim().to_ascii_lowercase();
    let (base, args) = match normalized.split_once('(') {
        Some((base, rest)) => (base.trim(), rest.trim_end_matches(')').trim()),
        None => (normalized.as_str(), ""),
    };
    let length = args.split(',').next().and_then(|n| n.trim().parse().ok());
    let data_type = match base {
        "varchar" | "character varying" => return ("character varying".to_string(), length),
        "char" | "character" => return ("character".to_string(), length.or(Some(1))),
        "int" | "int4" | "integer" | "serial" => "integer",
        "int8" | "bigint" | "bigserial" => "bigint",
        "int2" | "smallint" | "smallserial" => "smallint",
        "decimal" | "numeric" => "numeric",
        "float4" | "real" => "real",
        "float8" | "double precision" => "double precision",
        "bool" | "boolean" => "boolean",
        "timestamp" => "timestamp without time zone",
        "timestamptz" => "timestamp with time zone",
        other => other,
    };
    (data_type.to_string(), None)
}

pub fn is_serial_type(ddl_type: &str) -> bool {
    matches!(
        ddl_type.trim().to_ascii_lowercase().as_str(),
        "serial" | "bigserial" | "smallserial"
    )
}
