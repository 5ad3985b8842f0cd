//! Store seam between query construction and PostgreSQL

use crate::error::{GlodapError, Result};
use crate::output::QueryRows;
use crate::query::{BuiltQuery, SqlParam};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row, TypeInfo};
use std::collections::BTreeSet;
use tracing::{debug, error};

/// Read-only access to the GLODAP tables
#[async_trait]
pub trait GlodapStore: Send + Sync {
    /// Column names of `table`, from schema introspection
    async fn fetch_columns(&self, table: &str) -> Result<BTreeSet<String>>;

    /// Run a composed query and materialize its rows in `query.columns` order
    async fn fetch_rows(&self, query: &BuiltQuery) -> Result<QueryRows>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GlodapStore for PgStore {
    async fn fetch_columns(&self, table: &str) -> Result<BTreeSet<String>> {
        debug!(table, "introspecting table columns");
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name::text FROM information_schema.columns
            WHERE table_name = $1
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(table, error = %e, "schema introspection failed");
            GlodapError::Store(format!("Failed to load columns of {}: {}", table, e))
        })?;

        Ok(names.into_iter().collect())
    }

    async fn fetch_rows(&self, query: &BuiltQuery) -> Result<QueryRows> {
        let mut statement = sqlx::query(&query.sql);
        for param in &query.params {
            statement = match param {
                SqlParam::Text(s) => statement.bind(s.clone()),
                SqlParam::Float(v) => statement.bind(*v),
                SqlParam::Timestamp(ts) => statement.bind(*ts),
            };
        }

        let rows = statement.fetch_all(&self.pool).await.map_err(|e| {
            error!(table = %query.table, error = %e, "query failed");
            GlodapError::from(e)
        })?;

        let mut result = QueryRows::new(query.columns.clone());
        for row in &rows {
            result.rows.push(decode_row(row)?);
        }
        debug!(table = %query.table, rows = result.len(), "query complete");
        Ok(result)
    }
}

fn decode_row(row: &PgRow) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), decode_value(row, idx)?);
    }
    Ok(map)
}

/// How a Postgres column type is rendered into JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Timestamp,
    TimestampTz,
    Date,
    Text,
}

fn cell_kind(type_name: &str) -> CellKind {
    match type_name {
        "BOOL" => CellKind::Bool,
        "INT2" => CellKind::Int2,
        "INT4" => CellKind::Int4,
        "INT8" => CellKind::Int8,
        "FLOAT4" => CellKind::Float4,
        "FLOAT8" => CellKind::Float8,
        "NUMERIC" => CellKind::Numeric,
        "TIMESTAMP" => CellKind::Timestamp,
        "TIMESTAMPTZ" => CellKind::TimestampTz,
        "DATE" => CellKind::Date,
        _ => CellKind::Text,
    }
}

/// NUMERIC values become JSON numbers; NaN has no JSON form and becomes null.
fn numeric_to_json(value: Decimal) -> Value {
    value.to_f64().map(Value::from).unwrap_or(Value::Null)
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(idx).map_err(|e| {
        let column = &row.columns()[idx];
        let type_name = column.type_info().name();
        error!(column = column.name(), type_name, error = %e, "column decode failed");
        GlodapError::Store(format!(
            "Cannot decode column {} of type {}",
            column.name(),
            type_name
        ))
    })
}

/// Decode one cell by its Postgres type. Types without a dedicated mapping
/// must decode as text, otherwise the query fails.
fn decode_value(row: &PgRow, idx: usize) -> Result<Value> {
    let kind = cell_kind(row.columns()[idx].type_info().name());
    let value = match kind {
        CellKind::Bool => get::<bool>(row, idx)?.map(Value::from),
        CellKind::Int2 => get::<i16>(row, idx)?.map(Value::from),
        CellKind::Int4 => get::<i32>(row, idx)?.map(Value::from),
        CellKind::Int8 => get::<i64>(row, idx)?.map(Value::from),
        CellKind::Float4 => get::<f32>(row, idx)?.map(|v| Value::from(v as f64)),
        CellKind::Float8 => get::<f64>(row, idx)?.map(Value::from),
        CellKind::Numeric => get::<Decimal>(row, idx)?.map(numeric_to_json),
        CellKind::Timestamp => get::<NaiveDateTime>(row, idx)?
            .map(|ts| Value::from(ts.format("%Y-%m-%dT%H:%M:%S").to_string())),
        CellKind::TimestampTz => {
            get::<DateTime<Utc>>(row, idx)?.map(|ts| Value::from(ts.to_rfc3339()))
        }
        CellKind::Date => {
            get::<NaiveDate>(row, idx)?.map(|d| Value::from(d.format("%Y-%m-%d").to_string()))
        }
        CellKind::Text => get::<String>(row, idx)?.map(Value::from),
    };
    Ok(value.unwrap_or(Value::Null))
}
