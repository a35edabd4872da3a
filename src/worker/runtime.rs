//! # Worker JavaScript Runtime
//!
//! Executes one submitted snippet per isolate. The snippet runs as an
//! async IIFE with `request`, `method`, `headers`, `response`, and the
//! awaitable `db` helpers bound as globals; the event loop is driven to
//! completion under the call's deadline, then the mutated `response`
//! global is harvested as the envelope.
//!
//! Isolates are per-call and live on a blocking thread with their own
//! current-thread event loop: `JsRuntime` is !Send, and per-call isolation
//! keeps one request's globals out of the next.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use deno_core::{JsRuntime, ModuleCodeString, PollEventLoopOptions, RuntimeOptions};
use serde_json::{json, Value};

use crate::db::Database;
use crate::engine::sanitize::sanitize_with_line;
use crate::observability::Logger;

use super::ops::db_extension;
use super::{ERROR_TYPE_TIMEOUT, ERROR_TYPE_UNAVAILABLE};

/// Lines the wrapper prepends before the first line of submitted code
const WRAPPER_LINE_OFFSET: u32 = 1;

const DB_PRELUDE: &str = r#"
globalThis.db = {
  queryMany: (sql, params = []) => Deno.core.ops.op_nimbus_db_query_many(sql, params),
  queryOne: (sql, params = []) => Deno.core.ops.op_nimbus_db_query_one(sql, params),
  execute: (sql, params = []) => Deno.core.ops.op_nimbus_db_execute(sql, params),
};
"#;

/// Execute one snippet to an envelope. Always resolves; every failure
/// class becomes an envelope the protocol can carry at HTTP 200.
pub async fn execute(db: Database, code: String, context: Value, budget: Duration) -> Value {
    let joined =
        tokio::task::spawn_blocking(move || run_isolate(db, &code, &context, budget)).await;
    joined.unwrap_or_else(|_| fault_envelope("execution thread failure", "runtime_error"))
}

fn run_isolate(db: Database, code: &str, context: &Value, budget: Duration) -> Value {
    let logger = Logger::new("worker");

    let event_loop = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            logger.error("ISOLATE_EVENT_LOOP_FAILED", &[("error", &e.to_string())]);
            return unavailable_envelope();
        }
    };

    let mut js = JsRuntime::new(RuntimeOptions {
        extensions: vec![db_extension()],
        ..Default::default()
    });
    js.op_state().borrow_mut().put::<Database>(db);

    // Deadline watchdog: terminates the isolate if the snippet is still
    // running at the budget, which also interrupts synchronous loops that
    // never yield to the event loop.
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let isolate_handle = js.v8_isolate().thread_safe_handle();
    let deadline_hit = Arc::new(AtomicBool::new(false));
    let deadline_flag = Arc::clone(&deadline_hit);
    let watchdog = thread::spawn(move || {
        if done_rx.recv_timeout(budget).is_err() {
            deadline_flag.store(true, Ordering::SeqCst);
            isolate_handle.terminate_execution();
        }
    });
    let finish_watchdog = move || {
        let _ = done_tx.send(());
        let _ = watchdog.join();
    };

    let bootstrap = bootstrap_script(context);
    if let Err(e) = js.execute_script("nimbus:bootstrap", ModuleCodeString::from(bootstrap)) {
        finish_watchdog();
        logger.error("ISOLATE_BOOTSTRAP_FAILED", &[("error", &e.to_string())]);
        return fault_envelope("execution context setup failed", "runtime_error");
    }

    let wrapped = format!("(async () => {{\n{}\n}})()", code);
    let promise = match js.execute_script("nimbus:function", ModuleCodeString::from(wrapped)) {
        Ok(value) => value,
        Err(e) => {
            finish_watchdog();
            if deadline_hit.load(Ordering::SeqCst) {
                return timeout_envelope();
            }
            let raw = e.to_string();
            return fault_envelope(
                &sanitize_with_line(&raw, WRAPPER_LINE_OFFSET),
                classify(&raw),
            );
        }
    };

    let resolve_future = js.resolve(promise);
    let resolved = event_loop.block_on(async {
        tokio::time::timeout(
            budget,
            js.with_event_loop_promise(resolve_future, PollEventLoopOptions::default()),
        )
        .await
    });
    finish_watchdog();

    match resolved {
        Err(_) => return timeout_envelope(),
        Ok(Err(e)) => {
            if deadline_hit.load(Ordering::SeqCst) {
                return timeout_envelope();
            }
            let raw = e.to_string();
            return fault_envelope(
                &sanitize_with_line(&raw, WRAPPER_LINE_OFFSET),
                classify(&raw),
            );
        }
        Ok(Ok(_)) => {}
    }

    harvest_response(&mut js)
}

fn bootstrap_script(context: &Value) -> String {
    let request = context.get("request").cloned().unwrap_or(json!({}));
    let method = context.get("method").cloned().unwrap_or(json!("GET"));
    let headers = context.get("headers").cloned().unwrap_or(json!({}));
    let response = context.get("response").cloned().unwrap_or(json!({
        "success": false, "data": null, "message": "", "error": null,
    }));

    format!(
        "globalThis.request = {};\nglobalThis.method = {};\nglobalThis.headers = {};\nglobalThis.response = {};\n{}",
        request, method, headers, response, DB_PRELUDE
    )
}

fn harvest_response(js: &mut JsRuntime) -> Value {
    let global = match js.execute_script(
        "nimbus:harvest",
        ModuleCodeString::from("globalThis.response".to_string()),
    ) {
        Ok(value) => value,
        Err(_) => return fault_envelope("response state unavailable", "runtime_error"),
    };

    deno_core::scope!(scope, &mut *js);
    let local = deno_core::v8::Local::new(scope, &global);
    match deno_core::serde_v8::from_v8::<Value>(scope, local) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(_) => fault_envelope("code did not produce a response object", "runtime_error"),
        Err(_) => fault_envelope("response state not serializable", "runtime_error"),
    }
}

fn classify(raw: &str) -> &'static str {
    if raw.contains("SyntaxError") {
        "syntax_error"
    } else {
        "runtime_error"
    }
}

fn fault_envelope(message: &str, error_type: &str) -> Value {
    json!({
        "success": false,
        "data": null,
        "message": message,
        "error": message,
        "error_type": error_type,
    })
}

fn timeout_envelope() -> Value {
    json!({
        "success": false,
        "data": null,
        "message": "execution time exceeded",
        "error_type": ERROR_TYPE_TIMEOUT,
    })
}

/// Envelope for a worker whose database never came up
pub fn unavailable_envelope() -> Value {
    json!({
        "success": false,
        "data": null,
        "message": "execution backend unavailable",
        "error_type": ERROR_TYPE_UNAVAILABLE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    async fn scratch_db(dir: &tempfile::TempDir) -> Database {
        let path = dir.path().join("worker.db");
        Database::connect(&DatabaseConfig {
            backend: "sqlite".to_string(),
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 1,
        })
        .await
        .unwrap()
    }

    fn test_context() -> Value {
        json!({
            "request": {"n": 3},
            "method": "POST",
            "headers": {"x-api-key": "k"},
            "response": {"success": false, "data": null, "message": "", "error": null},
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_code_mutates_response() {
        let dir = tempfile::tempdir().unwrap();
        let db = scratch_db(&dir).await;

        let envelope = execute(
            db,
            "response.success = true; response.data = { tripled: request.n * 3 };".to_string(),
            test_context(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(envelope["success"], json!(true));
        assert_eq!(envelope["data"]["tripled"], json!(9));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_async_db_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = scratch_db(&dir).await;
        db.execute("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT)", &[])
            .await
            .unwrap();

        let code = r#"
            await db.execute("INSERT INTO kv (k, v) VALUES ($1, $2)", ["lang", "js"]);
            const row = await db.queryOne("SELECT v FROM kv WHERE k = $1", ["lang"]);
            response.data = row.v;
            response.success = true;
        "#;
        let envelope = execute(db, code.to_string(), test_context(), Duration::from_secs(5)).await;

        assert_eq!(envelope["success"], json!(true));
        assert_eq!(envelope["data"], json!("js"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_thrown_error_is_fault_with_sanitized_message() {
        let dir = tempfile::tempdir().unwrap();
        let db = scratch_db(&dir).await;

        let envelope = execute(
            db,
            r#"throw new Error("cannot read /srv/nimbus/config.json");"#.to_string(),
            test_context(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(envelope["success"], json!(false));
        assert_eq!(envelope["error_type"], json!("runtime_error"));
        let message = envelope["message"].as_str().unwrap();
        assert!(!message.contains("/srv/nimbus"), "leaked: {}", message);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_syntax_error_classified() {
        let dir = tempfile::tempdir().unwrap();
        let db = scratch_db(&dir).await;

        let envelope = execute(
            db,
            "const = broken".to_string(),
            test_context(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(envelope["error_type"], json!("syntax_error"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deadline_interrupts_busy_loop() {
        let dir = tempfile::tempdir().unwrap();
        let db = scratch_db(&dir).await;

        let envelope = execute(
            db,
            "while (true) {}".to_string(),
            test_context(),
            Duration::from_millis(200),
        )
        .await;

        assert_eq!(envelope["error_type"], json!(ERROR_TYPE_TIMEOUT));
        assert_eq!(envelope["message"], json!("execution time exceeded"));
    }
}
