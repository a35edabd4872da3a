//! # Worker Database Ops
//!
//! The three DB primitives submitted JavaScript can await. Each op pulls
//! the worker's shared [`Database`] out of the op state, so the pool is
//! injected per-isolate rather than living in a process-wide global.

use std::cell::RefCell;
use std::io::{Error as IoError, ErrorKind};
use std::rc::Rc;

use deno_core::error::CoreError;
use deno_core::{op2, OpState};
use serde_json::Value;

use crate::db::Database;

fn db_error(e: crate::db::DbError) -> CoreError {
    CoreError::from(IoError::new(ErrorKind::Other, e.to_string()))
}

fn shared_db(state: &Rc<RefCell<OpState>>) -> Database {
    state.borrow().borrow::<Database>().clone()
}

/// Run a query and resolve with all rows
#[op2(async(lazy))]
#[serde]
pub async fn op_nimbus_db_query_many(
    state: Rc<RefCell<OpState>>,
    #[string] sql: String,
    #[serde] params: Vec<Value>,
) -> Result<Vec<Value>, CoreError> {
    let db = shared_db(&state);
    db.query_many(&sql, &params).await.map_err(db_error)
}

/// Run a query and resolve with the first row, or null
#[op2(async(lazy))]
#[serde]
pub async fn op_nimbus_db_query_one(
    state: Rc<RefCell<OpState>>,
    #[string] sql: String,
    #[serde] params: Vec<Value>,
) -> Result<serde_json::Value, CoreError> {
    let db = shared_db(&state);
    let row = db.query_one(&sql, &params).await.map_err(db_error)?;
    Ok(row.unwrap_or(Value::Null))
}

/// Run a write statement and resolve with `{changes, lastInsertId}`
#[op2(async(lazy))]
#[serde]
pub async fn op_nimbus_db_execute(
    state: Rc<RefCell<OpState>>,
    #[string] sql: String,
    #[serde] params: Vec<Value>,
) -> Result<serde_json::Value, CoreError> {
    let db = shared_db(&state);
    let result = db.execute(&sql, &params).await.map_err(db_error)?;
    serde_json::to_value(&result).map_err(|e| CoreError::from(IoError::new(ErrorKind::Other, e)))
}

deno_core::extension!(
    nimbus_db,
    ops = [
        op_nimbus_db_query_many,
        op_nimbus_db_query_one,
        op_nimbus_db_execute,
    ],
);

/// Build the ops extension for one isolate. The pool itself is injected
/// into the isolate's op state after construction.
pub fn db_extension() -> deno_core::Extension {
    nimbus_db::init()
}
