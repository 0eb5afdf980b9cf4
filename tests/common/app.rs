use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use chainrun::config::Config;
use chainrun::services::BackoffStrategy;
use chainrun::state::AppState;

/// Test configuration with short timeouts and fixed backoff so retry
/// tests finish quickly
pub fn test_config() -> Config {
    Config {
        step_timeout: Duration::from_secs(5),
        max_retries: 2,
        retry_base_delay: Duration::from_millis(10),
        backoff_strategy: BackoffStrategy::Fixed,
        worker_pool_size: 4,
        max_chain_depth: 8,
    }
}

/// Test application wrapper
pub struct TestApp {
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self {
            state: AppState::new(test_config()),
        }
    }
}

/// A small user CRUD API the engine runs cases against, bound to a
/// random local port. `hits` counts every request that reached a route.
pub struct MockTarget {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
}

impl MockTarget {
    pub async fn spawn() -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route("/health", get(health))
            .route("/whoami", get(whoami))
            .route("/slow", get(slow))
            .route("/users", post(create_user))
            .route("/users/{id}", get(get_user))
            .route("/users/{id}", delete(delete_user))
            .with_state(hits.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock target");
        let addr = listener.local_addr().expect("Failed to read local addr");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("Mock target stopped");
        });

        Self {
            base_url: format!("http://{}", addr),
            hits,
        }
    }

    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn health(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "status": "ok" }))
}

/// Echoes selected request headers back so header plumbing can be
/// asserted from the response body
async fn whoami(
    State(hits): State<Arc<AtomicUsize>>,
    headers: axum::http::HeaderMap,
) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    let pick = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "authorization": pick("authorization"),
        "source": pick("x-request-source"),
    }))
}

/// Never answers within a realistic step budget; used to park a request
/// in flight for cancellation and timeout tests
async fn slow(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(60)).await;
    Json(json!({ "status": "late" }))
}

async fn create_user(
    State(hits): State<Arc<AtomicUsize>>,
    body: Option<Json<Value>>,
) -> (StatusCode, Json<Value>) {
    hits.fetch_add(1, Ordering::SeqCst);
    // Steps without a declared body still post here
    let name = body
        .as_ref()
        .and_then(|Json(b)| b.get("name"))
        .cloned()
        .unwrap_or_else(|| json!("anonymous"));
    (
        StatusCode::CREATED,
        Json(json!({ "id": 7, "name": name, "token": "tok-7" })),
    )
}

async fn get_user(
    State(hits): State<Arc<AtomicUsize>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    hits.fetch_add(1, Ordering::SeqCst);
    if id == "7" {
        (StatusCode::OK, Json(json!({ "id": 7, "active": true })))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "user not found" })),
        )
    }
}

async fn delete_user(
    State(hits): State<Arc<AtomicUsize>>,
    Path(_id): Path<String>,
) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

/// Accepts TCP connections and immediately drops them, producing
/// transport-level failures. `attempts` counts accepted connections.
pub struct RefusingTarget {
    pub base_url: String,
    pub attempts: Arc<AtomicUsize>,
}

impl RefusingTarget {
    pub async fn spawn() -> Self {
        let attempts = Arc::new(AtomicUsize::new(0));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind refusing target");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let counter = attempts.clone();
        tokio::spawn(async move {
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    counter.fetch_add(1, Ordering::SeqCst);
                    drop(socket);
                }
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            attempts,
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}
