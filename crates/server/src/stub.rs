//! In-process downstream services for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};

/// How a stub answers every request.
#[derive(Clone)]
pub enum Reply {
    Json(serde_json::Value),
    Raw(&'static str),
    Status(StatusCode),
    Delayed(Duration, serde_json::Value),
}

pub struct StubService {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl StubService {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serves `reply` on `path` from an ephemeral port.
pub async fn spawn(path: &str, reply: Reply) -> StubService {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new().route(
        path,
        get(move || {
            let counter = Arc::clone(&counter);
            let reply = reply.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                respond(reply).await
            }
        }),
    );

    StubService { base_url: serve(router).await, hits }
}

pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub listener");
    let address = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{address}")
}

/// A base URL nothing listens on.
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("address");
    drop(listener);
    format!("http://{address}")
}

async fn respond(reply: Reply) -> axum::response::Response {
    match reply {
        Reply::Json(body) => axum::Json(body).into_response(),
        Reply::Raw(body) => {
            (StatusCode::OK, [("content-type", "application/json")], body).into_response()
        }
        Reply::Status(status) => status.into_response(),
        Reply::Delayed(delay, body) => {
            tokio::time::sleep(delay).await;
            axum::Json(body).into_response()
        }
    }
}
