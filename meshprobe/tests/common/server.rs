use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tokio::sync::oneshot;

#[derive(Clone)]
struct ServerState {
    failures_before_ready: usize,
    hits: Arc<AtomicUsize>,
}

/// HTTP endpoints with scripted readiness, served from a background runtime.
///
/// - `/flaky`: 503 for the first `failures_before_ready` requests, then 200
/// - `/error-body`: 200 whose body reads like a failure
/// - `/down`: always 503
pub struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn start(failures_before_ready: usize) -> Self {
        let listener =
            std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind test listener");
        listener
            .set_nonblocking(true)
            .expect("Failed to set listener non-blocking");
        let addr = listener.local_addr().expect("Failed to read listener address");

        let hits = Arc::new(AtomicUsize::new(0));
        let state = ServerState {
            failures_before_ready,
            hits: Arc::clone(&hits),
        };
        let router = Router::new()
            .route("/flaky", get(flaky_handler))
            .route("/error-body", get(error_body_handler))
            .route("/down", get(down_handler))
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to build test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener)
                    .expect("Failed to adopt test listener");
                axum::serve(listener, router)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .expect("Test server failed");
            });
        });

        crate::test_log!("FIXTURE: Test HTTP server on {addr}");
        Self {
            addr,
            hits,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Requests served by `/flaky` so far.
    pub fn flaky_hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn flaky_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    if hit <= state.failures_before_ready {
        (StatusCode::SERVICE_UNAVAILABLE, format!("warming up ({hit})"))
    } else {
        (StatusCode::OK, "ready".to_string())
    }
}

async fn error_body_handler() -> impl IntoResponse {
    (StatusCode::OK, "error: upstream reported a failure")
}

async fn down_handler() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "no healthy upstream")
}
