//! # Database Module
//!
//! One pool, two backends. Every database touch in Nimbus (the definition
//! store, the embedded runtime bindings, the sidecar worker's ops) goes
//! through [`Database`], a thin handle over a sqlx `Any` pool that speaks
//! SQLite or PostgreSQL depending on the configured URL.
//!
//! The three JSON primitives (`query_many`, `query_one`, `execute`) are the
//! exact surface submitted code sees, so their value mapping is the
//! engine's de facto wire format: rows become string-keyed JSON objects,
//! writes report `{changes, lastInsertId}`.

pub mod errors;

use std::sync::Once;

use serde::Serialize;
use serde_json::Value;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row, ValueRef};

use crate::config::DatabaseConfig;

pub use errors::{DbError, DbResult};

static DRIVERS: Once = Once::new();

/// One-time registration of the bundled sqlx drivers.
///
/// Must run before the first `Any` pool is built, in the host and in the
/// worker alike.
pub fn install_drivers() {
    DRIVERS.call_once(sqlx::any::install_default_drivers);
}

/// Result of a write statement
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteResult {
    pub changes: u64,
    #[serde(rename = "lastInsertId")]
    pub last_insert_id: Option<i64>,
}

/// Shared database handle. Cloning shares the underlying pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    /// Connect a pool per the configured backend
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        install_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;
        Ok(Self { pool })
    }

    /// The raw pool, for callers that need sqlx directly
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Run a query and return all rows as JSON objects
    pub async fn query_many(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Value>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// Run a query and return the first row, or null if none matched
    pub async fn query_one(&self, sql: &str, params: &[Value]) -> DbResult<Option<Value>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_json))
    }

    /// Run a write statement and report affected rows / last insert id
    pub async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecuteResult> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }
        let result = query.execute(&self.pool).await?;
        Ok(ExecuteResult {
            changes: result.rows_affected(),
            last_insert_id: result.last_insert_id(),
        })
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

type AnyQuery<'q> = sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>;

/// Bind one JSON value as a statement parameter.
///
/// Arrays and objects are bound as their JSON text; both backends store
/// them as TEXT.
fn bind_value<'q>(query: AnyQuery<'q>, value: &Value) -> AnyQuery<'q> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

/// Map one row to a string-keyed JSON object
fn row_to_json(row: &AnyRow) -> Value {
    let mut object = serde_json::Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), column_to_json(row, index));
    }
    Value::Object(object)
}

/// Decode one column to JSON, probing the narrow set of types the Any
/// driver supports. NULL wins first; unknown types degrade to null.
fn column_to_json(row: &AnyRow, index: usize) -> Value {
    if let Ok(raw) = row.try_get_raw(index) {
        if raw.is_null() {
            return Value::Null;
        }
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return serde_json::json!(v);
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return Value::Bool(v);
    }
    Value::Null
}
