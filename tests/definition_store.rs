//! Definition Store Invariant Tests
//!
//! SQL-backed store over a scratch SQLite database: enabled-only reads,
//! uniqueness, and the middleware referential guard.

use serde_json::json;
use uuid::Uuid;

use nimbus::config::DatabaseConfig;
use nimbus::db::Database;
use nimbus::definitions::{
    DefinitionError, DefinitionStore, FunctionDefinition, HttpMethod, Language,
    MiddlewareDefinition, SqlDefinitionStore,
};

async fn scratch_store(dir: &tempfile::TempDir) -> SqlDefinitionStore {
    let path = dir.path().join("definitions.db");
    let db = Database::connect(&DatabaseConfig {
        backend: "sqlite".to_string(),
        url: format!("sqlite://{}?mode=rwc", path.display()),
        max_connections: 1,
    })
    .await
    .unwrap();

    let store = SqlDefinitionStore::new(db);
    store.ensure_schema().await.unwrap();
    store
}

#[tokio::test]
async fn test_insert_and_find_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = scratch_store(&dir).await;

    let function = FunctionDefinition::new(
        "hello",
        "response.success = true;",
        Language::Rhai,
        HttpMethod::Get,
    )
    .with_description("greets");
    store.insert_function(&function).await.unwrap();

    let found = store
        .find_enabled_function("hello")
        .await
        .unwrap()
        .expect("function should be visible");
    assert_eq!(found.id, function.id);
    assert_eq!(found.code, function.code);
    assert_eq!(found.language, Language::Rhai);
    assert_eq!(found.http_method, HttpMethod::Get);
    assert_eq!(found.description, "greets");
}

#[tokio::test]
async fn test_disabled_function_invisible() {
    let dir = tempfile::tempdir().unwrap();
    let store = scratch_store(&dir).await;

    let function = FunctionDefinition::new("off", "1", Language::Rhai, HttpMethod::Get)
        .with_enabled(false);
    store.insert_function(&function).await.unwrap();

    assert!(store.find_enabled_function("off").await.unwrap().is_none());
    assert!(store.list_enabled_functions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_name_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = scratch_store(&dir).await;

    let first = FunctionDefinition::new("dup", "1", Language::Rhai, HttpMethod::Get);
    let second = FunctionDefinition::new("dup", "2", Language::Javascript, HttpMethod::Post);

    store.insert_function(&first).await.unwrap();
    let err = store.insert_function(&second).await.unwrap_err();
    assert!(matches!(err, DefinitionError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_middleware_resolution_and_linkage() {
    let dir = tempfile::tempdir().unwrap();
    let store = scratch_store(&dir).await;

    let middleware = MiddlewareDefinition::new("guard", "// check", Language::Javascript);
    let mw_id = middleware.id;
    store.insert_middleware(&middleware).await.unwrap();

    let function = FunctionDefinition::new("guarded", "1", Language::Rhai, HttpMethod::Post)
        .with_middleware(mw_id);
    store.insert_function(&function).await.unwrap();

    let found = store
        .find_enabled_function("guarded")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.middleware_id, Some(mw_id));

    let guard = store
        .find_enabled_middleware(mw_id)
        .await
        .unwrap()
        .expect("middleware should be visible");
    assert_eq!(guard.name, "guard");
    assert_eq!(guard.language, Language::Javascript);
}

#[tokio::test]
async fn test_disabled_middleware_invisible() {
    let dir = tempfile::tempdir().unwrap();
    let store = scratch_store(&dir).await;

    let middleware =
        MiddlewareDefinition::new("off-guard", "1", Language::Rhai).with_enabled(false);
    let mw_id = middleware.id;
    store.insert_middleware(&middleware).await.unwrap();

    assert!(store
        .find_enabled_middleware(mw_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_referenced_middleware_cannot_be_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let store = scratch_store(&dir).await;

    let middleware = MiddlewareDefinition::new("guard", "1", Language::Rhai);
    let mw_id = middleware.id;
    store.insert_middleware(&middleware).await.unwrap();
    store
        .insert_function(
            &FunctionDefinition::new("guarded", "1", Language::Rhai, HttpMethod::Get)
                .with_middleware(mw_id),
        )
        .await
        .unwrap();

    assert_eq!(store.middleware_reference_count(mw_id).await.unwrap(), 1);
    let err = store.delete_middleware(mw_id).await.unwrap_err();
    assert!(matches!(err, DefinitionError::MiddlewareInUse(1)));
}

#[tokio::test]
async fn test_unreferenced_middleware_deletes() {
    let dir = tempfile::tempdir().unwrap();
    let store = scratch_store(&dir).await;

    let middleware = MiddlewareDefinition::new("loose", "1", Language::Rhai);
    let mw_id = middleware.id;
    store.insert_middleware(&middleware).await.unwrap();

    store.delete_middleware(mw_id).await.unwrap();
    assert!(store
        .find_enabled_middleware(mw_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_unknown_middleware_reference_count_zero() {
    let dir = tempfile::tempdir().unwrap();
    let store = scratch_store(&dir).await;
    assert_eq!(
        store
            .middleware_reference_count(Uuid::new_v4())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_list_orders_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = scratch_store(&dir).await;

    for name in ["zeta", "alpha", "mid"] {
        store
            .insert_function(&FunctionDefinition::new(
                name,
                "1",
                Language::Rhai,
                HttpMethod::Get,
            ))
            .await
            .unwrap();
    }

    let names: Vec<String> = store
        .list_enabled_functions()
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

#[tokio::test]
async fn test_rows_survive_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = scratch_store(&dir).await;
        store
            .insert_function(&FunctionDefinition::new(
                "persistent",
                "response.data = 1;",
                Language::Rhai,
                HttpMethod::Get,
            ))
            .await
            .unwrap();
    }

    let path = dir.path().join("definitions.db");
    let db = Database::connect(&DatabaseConfig {
        backend: "sqlite".to_string(),
        url: format!("sqlite://{}?mode=rwc", path.display()),
        max_connections: 1,
    })
    .await
    .unwrap();
    let row = db
        .query_one(
            "SELECT name FROM cloud_functions WHERE name = $1",
            &[json!("persistent")],
        )
        .await
        .unwrap();
    assert!(row.is_some());
}
