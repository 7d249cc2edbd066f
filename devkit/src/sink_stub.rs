/*!
HTTP stub of the aggregation server for tests without a cloud deployment.

Implements the batch/delete/clear endpoints on an ephemeral local port,
records everything it receives, and can be told to fail or hang so error
and backpressure paths can be exercised.
*/

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// How the stub answers batch deliveries
#[derive(Debug, Clone, Copy)]
pub enum StubBehavior {
    /// 200 with a server-shaped ack
    Ok,
    /// Answer every batch with this status code
    Status(u16),
    /// Accept the connection and never respond
    Hang,
}

struct StubState {
    behavior: StubBehavior,
    /// One entry per batch attempt: the "messages" array as received
    batches: Mutex<Vec<Value>>,
    deleted: Mutex<Vec<String>>,
    clear_calls: Mutex<usize>,
}

/// Records every call; accessors below are for test assertions
pub struct SinkStub {
    addr: SocketAddr,
    state: Arc<StubState>,
}

impl SinkStub {
    pub async fn start() -> Result<Self> {
        Self::start_with(StubBehavior::Ok).await
    }

    pub async fn start_with(behavior: StubBehavior) -> Result<Self> {
        env_logger::try_init().ok();

        let state = Arc::new(StubState {
            behavior,
            batches: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            clear_calls: Mutex::new(0),
        });

        let app = Router::new()
            .route("/api/messages/batch", post(handle_batch))
            .route("/api/messages/delete", post(handle_delete))
            .route("/api/messages/clear", post(handle_clear))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[stub] sink stub server error: {e}");
            }
        });

        log::info!("[stub] sink stub listening on {addr}");
        Ok(Self { addr, state })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every batch attempt, in arrival order
    pub fn batches(&self) -> Vec<Value> {
        self.state.batches.lock().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.state.batches.lock().len()
    }

    /// Total records across all received batches
    pub fn record_count(&self) -> usize {
        self.state
            .batches
            .lock()
            .iter()
            .map(|batch| batch.as_array().map(Vec::len).unwrap_or(0))
            .sum()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.state.deleted.lock().clone()
    }

    pub fn clear_calls(&self) -> usize {
        *self.state.clear_calls.lock()
    }
}

async fn handle_batch(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> Response {
    let messages = body.get("messages").cloned().unwrap_or(Value::Null);
    match state.behavior {
        StubBehavior::Hang => {
            log::info!("[stub] hanging on batch as told");
            std::future::pending::<()>().await;
            unreachable!()
        }
        StubBehavior::Status(code) => {
            state.batches.lock().push(messages);
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({ "error": "stub failure" }))).into_response()
        }
        StubBehavior::Ok => {
            let processed = count_kinds(&messages);
            state.batches.lock().push(messages);
            (StatusCode::OK, Json(json!({ "success": true, "processed": processed }))).into_response()
        }
    }
}

async fn handle_delete(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> Response {
    let Some(id) = body.get("messageId").and_then(Value::as_str) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Message ID required" }))).into_response();
    };
    state.deleted.lock().push(id.to_string());
    (StatusCode::OK, Json(json!({ "success": true, "deleted": true }))).into_response()
}

async fn handle_clear(State(state): State<Arc<StubState>>) -> Response {
    *state.clear_calls.lock() += 1;
    (StatusCode::OK, Json(json!({ "success": true, "cleared": 0 }))).into_response()
}

fn count_kinds(messages: &Value) -> Value {
    let mut msg = 0;
    let mut pos = 0;
    let mut telem = 0;
    if let Some(list) = messages.as_array() {
        for item in list {
            match item.get("type").and_then(Value::as_str) {
                Some("message") => msg += 1,
                Some("position") => pos += 1,
                Some("telemetry") => telem += 1,
                _ => {}
            }
        }
    }
    json!({ "messages": msg, "positions": pos, "telemetry": telem })
}
