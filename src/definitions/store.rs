//! # Definition Store
//!
//! Trait surface the engine resolves against, plus the two
//! implementations: SQL-backed (production) and in-memory (tests, embedded
//! hosts). The engine path only reads enabled records; the write helpers
//! exist for schema bootstrap and for the admin UI's storage layer.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::Database;

use super::errors::{DefinitionError, DefinitionResult};
use super::function::FunctionDefinition;
use super::middleware::MiddlewareDefinition;

/// Read surface the engine uses to resolve calls
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Find an enabled function by name. Disabled records are invisible.
    async fn find_enabled_function(
        &self,
        name: &str,
    ) -> DefinitionResult<Option<FunctionDefinition>>;

    /// Find an enabled middleware by id. Disabled records are invisible.
    async fn find_enabled_middleware(
        &self,
        id: Uuid,
    ) -> DefinitionResult<Option<MiddlewareDefinition>>;

    /// List enabled functions (admin surface, health introspection)
    async fn list_enabled_functions(&self) -> DefinitionResult<Vec<FunctionDefinition>>;

    /// How many functions reference a middleware. The admin UI must check
    /// this before deleting: a referenced middleware cannot be removed.
    async fn middleware_reference_count(&self, id: Uuid) -> DefinitionResult<u64>;
}

// ==================
// SQL-backed store
// ==================

const FUNCTION_COLUMNS: &str = "id, name, description, code, language, http_method, endpoint, \
     enabled, middleware_id, created_by, created_at, updated_at";

const MIDDLEWARE_COLUMNS: &str =
    "id, name, description, code, language, enabled, created_by, created_at, updated_at";

/// Definition store backed by the shared database
#[derive(Debug, Clone)]
pub struct SqlDefinitionStore {
    db: Database,
}

impl SqlDefinitionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create the definition tables if missing. Idempotent; the admin UI
    /// normally owns the schema, this covers first boot and tests.
    pub async fn ensure_schema(&self) -> DefinitionResult<()> {
        self.db
            .execute(
                "CREATE TABLE IF NOT EXISTS cloud_middlewares (\
                 id TEXT PRIMARY KEY, \
                 name TEXT NOT NULL UNIQUE, \
                 description TEXT NOT NULL DEFAULT '', \
                 code TEXT NOT NULL, \
                 language TEXT NOT NULL, \
                 enabled INTEGER NOT NULL DEFAULT 1, \
                 created_by TEXT NOT NULL DEFAULT '', \
                 created_at TEXT NOT NULL, \
                 updated_at TEXT NOT NULL)",
                &[],
            )
            .await?;
        self.db
            .execute(
                "CREATE TABLE IF NOT EXISTS cloud_functions (\
                 id TEXT PRIMARY KEY, \
                 name TEXT NOT NULL UNIQUE, \
                 description TEXT NOT NULL DEFAULT '', \
                 code TEXT NOT NULL, \
                 language TEXT NOT NULL, \
                 http_method TEXT NOT NULL, \
                 endpoint TEXT NOT NULL UNIQUE, \
                 enabled INTEGER NOT NULL DEFAULT 1, \
                 middleware_id TEXT, \
                 created_by TEXT NOT NULL DEFAULT '', \
                 created_at TEXT NOT NULL, \
                 updated_at TEXT NOT NULL)",
                &[],
            )
            .await?;
        Ok(())
    }

    /// Insert a function record (admin/bootstrap surface)
    pub async fn insert_function(&self, function: &FunctionDefinition) -> DefinitionResult<()> {
        let existing = self
            .db
            .query_one(
                "SELECT id FROM cloud_functions WHERE name = $1",
                &[json!(function.name)],
            )
            .await?;
        if existing.is_some() {
            return Err(DefinitionError::AlreadyExists(function.name.clone()));
        }

        self.db
            .execute(
                "INSERT INTO cloud_functions (id, name, description, code, language, \
                 http_method, endpoint, enabled, middleware_id, created_by, created_at, \
                 updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
                &[
                    json!(function.id.to_string()),
                    json!(function.name),
                    json!(function.description),
                    json!(function.code),
                    json!(function.language.as_str()),
                    json!(function.http_method.as_str()),
                    json!(function.endpoint),
                    json!(if function.enabled { 1 } else { 0 }),
                    function
                        .middleware_id
                        .map(|id| json!(id.to_string()))
                        .unwrap_or(Value::Null),
                    json!(function.created_by),
                    json!(function.created_at.to_rfc3339()),
                    json!(function.updated_at.to_rfc3339()),
                ],
            )
            .await?;
        Ok(())
    }

    /// Insert a middleware record (admin/bootstrap surface)
    pub async fn insert_middleware(
        &self,
        middleware: &MiddlewareDefinition,
    ) -> DefinitionResult<()> {
        let existing = self
            .db
            .query_one(
                "SELECT id FROM cloud_middlewares WHERE name = $1",
                &[json!(middleware.name)],
            )
            .await?;
        if existing.is_some() {
            return Err(DefinitionError::AlreadyExists(middleware.name.clone()));
        }

        self.db
            .execute(
                "INSERT INTO cloud_middlewares (id, name, description, code, language, \
                 enabled, created_by, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    json!(middleware.id.to_string()),
                    json!(middleware.name),
                    json!(middleware.description),
                    json!(middleware.code),
                    json!(middleware.language.as_str()),
                    json!(if middleware.enabled { 1 } else { 0 }),
                    json!(middleware.created_by),
                    json!(middleware.created_at.to_rfc3339()),
                    json!(middleware.updated_at.to_rfc3339()),
                ],
            )
            .await?;
        Ok(())
    }

    /// Delete a middleware, rejecting the delete while any function still
    /// references it.
    pub async fn delete_middleware(&self, id: Uuid) -> DefinitionResult<()> {
        let references = self.middleware_reference_count(id).await?;
        if references > 0 {
            return Err(DefinitionError::MiddlewareInUse(references));
        }
        self.db
            .execute(
                "DELETE FROM cloud_middlewares WHERE id = $1",
                &[json!(id.to_string())],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DefinitionStore for SqlDefinitionStore {
    async fn find_enabled_function(
        &self,
        name: &str,
    ) -> DefinitionResult<Option<FunctionDefinition>> {
        let row = self
            .db
            .query_one(
                &format!(
                    "SELECT {} FROM cloud_functions WHERE name = $1 AND enabled = 1",
                    FUNCTION_COLUMNS
                ),
                &[json!(name)],
            )
            .await?;
        row.map(|r| function_from_row(&r)).transpose()
    }

    async fn find_enabled_middleware(
        &self,
        id: Uuid,
    ) -> DefinitionResult<Option<MiddlewareDefinition>> {
        let row = self
            .db
            .query_one(
                &format!(
                    "SELECT {} FROM cloud_middlewares WHERE id = $1 AND enabled = 1",
                    MIDDLEWARE_COLUMNS
                ),
                &[json!(id.to_string())],
            )
            .await?;
        row.map(|r| middleware_from_row(&r)).transpose()
    }

    async fn list_enabled_functions(&self) -> DefinitionResult<Vec<FunctionDefinition>> {
        let rows = self
            .db
            .query_many(
                &format!(
                    "SELECT {} FROM cloud_functions WHERE enabled = 1 ORDER BY name",
                    FUNCTION_COLUMNS
                ),
                &[],
            )
            .await?;
        rows.iter().map(function_from_row).collect()
    }

    async fn middleware_reference_count(&self, id: Uuid) -> DefinitionResult<u64> {
        let row = self
            .db
            .query_one(
                "SELECT COUNT(*) AS n FROM cloud_functions WHERE middleware_id = $1",
                &[json!(id.to_string())],
            )
            .await?;
        Ok(row
            .as_ref()
            .and_then(|r| r.get("n"))
            .and_then(Value::as_i64)
            .unwrap_or(0) as u64)
    }
}

// ==================
// Row mapping
// ==================

fn str_field(row: &Value, field: &str) -> DefinitionResult<String> {
    row.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DefinitionError::Corrupt(format!("missing field '{}'", field)))
}

fn enabled_field(row: &Value) -> bool {
    match row.get("enabled") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

fn timestamp_field(row: &Value, field: &str) -> DateTime<Utc> {
    row.get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn function_from_row(row: &Value) -> DefinitionResult<FunctionDefinition> {
    let middleware_id = match row.get("middleware_id").and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Some(
            Uuid::parse_str(s)
                .map_err(|e| DefinitionError::Corrupt(format!("bad middleware_id: {}", e)))?,
        ),
        _ => None,
    };

    Ok(FunctionDefinition {
        id: Uuid::parse_str(&str_field(row, "id")?)
            .map_err(|e| DefinitionError::Corrupt(format!("bad id: {}", e)))?,
        name: str_field(row, "name")?,
        description: row
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        code: str_field(row, "code")?,
        language: str_field(row, "language")?
            .parse()
            .map_err(DefinitionError::Corrupt)?,
        http_method: str_field(row, "http_method")?
            .parse()
            .map_err(DefinitionError::Corrupt)?,
        endpoint: str_field(row, "endpoint")?,
        enabled: enabled_field(row),
        middleware_id,
        created_by: row
            .get("created_by")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        created_at: timestamp_field(row, "created_at"),
        updated_at: timestamp_field(row, "updated_at"),
    })
}

fn middleware_from_row(row: &Value) -> DefinitionResult<MiddlewareDefinition> {
    Ok(MiddlewareDefinition {
        id: Uuid::parse_str(&str_field(row, "id")?)
            .map_err(|e| DefinitionError::Corrupt(format!("bad id: {}", e)))?,
        name: str_field(row, "name")?,
        description: row
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        code: str_field(row, "code")?,
        language: str_field(row, "language")?
            .parse()
            .map_err(DefinitionError::Corrupt)?,
        enabled: enabled_field(row),
        created_by: row
            .get("created_by")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        created_at: timestamp_field(row, "created_at"),
        updated_at: timestamp_field(row, "updated_at"),
    })
}

// ==================
// In-memory store
// ==================

/// In-memory definition store for tests and embedded hosts
#[derive(Debug, Default)]
pub struct MemoryDefinitionStore {
    functions: RwLock<HashMap<String, FunctionDefinition>>,
    middlewares: RwLock<HashMap<Uuid, MiddlewareDefinition>>,
}

impl MemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any record with the same name
    pub fn register_function(&self, function: FunctionDefinition) -> DefinitionResult<()> {
        let mut functions = self
            .functions
            .write()
            .map_err(|_| DefinitionError::Store("lock poisoned".into()))?;
        functions.insert(function.name.clone(), function);
        Ok(())
    }

    /// Register a middleware, replacing any record with the same id
    pub fn register_middleware(&self, middleware: MiddlewareDefinition) -> DefinitionResult<()> {
        let mut middlewares = self
            .middlewares
            .write()
            .map_err(|_| DefinitionError::Store("lock poisoned".into()))?;
        middlewares.insert(middleware.id, middleware);
        Ok(())
    }
}

#[async_trait]
impl DefinitionStore for MemoryDefinitionStore {
    async fn find_enabled_function(
        &self,
        name: &str,
    ) -> DefinitionResult<Option<FunctionDefinition>> {
        let functions = self
            .functions
            .read()
            .map_err(|_| DefinitionError::Store("lock poisoned".into()))?;
        Ok(functions.get(name).filter(|f| f.enabled).cloned())
    }

    async fn find_enabled_middleware(
        &self,
        id: Uuid,
    ) -> DefinitionResult<Option<MiddlewareDefinition>> {
        let middlewares = self
            .middlewares
            .read()
            .map_err(|_| DefinitionError::Store("lock poisoned".into()))?;
        Ok(middlewares.get(&id).filter(|m| m.enabled).cloned())
    }

    async fn list_enabled_functions(&self) -> DefinitionResult<Vec<FunctionDefinition>> {
        let functions = self
            .functions
            .read()
            .map_err(|_| DefinitionError::Store("lock poisoned".into()))?;
        let mut list: Vec<_> = functions.values().filter(|f| f.enabled).cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn middleware_reference_count(&self, id: Uuid) -> DefinitionResult<u64> {
        let functions = self
            .functions
            .read()
            .map_err(|_| DefinitionError::Store("lock poisoned".into()))?;
        Ok(functions
            .values()
            .filter(|f| f.middleware_id == Some(id))
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::function::{HttpMethod, Language};

    #[tokio::test]
    async fn test_memory_store_disabled_invisible() {
        let store = MemoryDefinitionStore::new();
        let func = FunctionDefinition::new("off", "1", Language::Rhai, HttpMethod::Get)
            .with_enabled(false);
        store.register_function(func).unwrap();

        assert!(store
            .find_enabled_function("off")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_memory_store_reference_count() {
        let store = MemoryDefinitionStore::new();
        let mw = MiddlewareDefinition::new("guard", "1", Language::Rhai);
        let mw_id = mw.id;
        store.register_middleware(mw).unwrap();
        store
            .register_function(
                FunctionDefinition::new("a", "1", Language::Rhai, HttpMethod::Get)
                    .with_middleware(mw_id),
            )
            .unwrap();

        assert_eq!(store.middleware_reference_count(mw_id).await.unwrap(), 1);
        assert_eq!(
            store
                .middleware_reference_count(Uuid::new_v4())
                .await
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_function_row_mapping() {
        let row = serde_json::json!({
            "id": "7c2f3d8e-5b1a-4e9c-8f7d-2a6b4c8e0f1a",
            "name": "hello",
            "description": "",
            "code": "response.success = true;",
            "language": "rhai",
            "http_method": "GET",
            "endpoint": "hello",
            "enabled": 1,
            "middleware_id": null,
            "created_by": "admin",
            "created_at": "2025-11-02T10:00:00+00:00",
            "updated_at": "2025-11-02T10:00:00+00:00",
        });

        let func = function_from_row(&row).unwrap();
        assert_eq!(func.name, "hello");
        assert_eq!(func.language, Language::Rhai);
        assert_eq!(func.http_method, HttpMethod::Get);
        assert!(func.enabled);
        assert!(func.middleware_id.is_none());
    }

    #[test]
    fn test_function_row_mapping_rejects_bad_language() {
        let row = serde_json::json!({
            "id": "7c2f3d8e-5b1a-4e9c-8f7d-2a6b4c8e0f1a",
            "name": "x",
            "code": "1",
            "language": "cobol",
            "http_method": "GET",
            "endpoint": "x",
            "enabled": 1,
            "created_at": "2025-11-02T10:00:00+00:00",
            "updated_at": "2025-11-02T10:00:00+00:00",
        });
        assert!(function_from_row(&row).is_err());
    }
}
