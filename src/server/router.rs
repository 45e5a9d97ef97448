use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use super::account::account_router;
use super::dashboard::dashboard_router;
use super::extract::evict_rejected_session;
use super::public::public_router;
use super::sessions::{SESSION_IDLE_TIMEOUT, SessionRegistry};
use crate::cpv::CpvCatalog;
use crate::gateway::{Backend, Gateway};

pub struct AppState {
    pub backend: Arc<dyn Backend>,
    /// Gateway without a user session, for the public forms and search.
    pub gateway: Gateway,
    pub sessions: SessionRegistry,
    /// Full CPV catalog, loaded on first use.
    pub catalog: OnceCell<CpvCatalog>,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            gateway: Gateway::new(Arc::clone(&backend)),
            backend,
            sessions: SessionRegistry::default(),
            catalog: OnceCell::new(),
        }
    }

    /// Periodically drops idle and signed-out client sessions.
    pub fn spawn_session_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            loop {
                ticks.tick().await;
                state.sessions.evict_stale(SESSION_IDLE_TIMEOUT);
            }
        })
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", public_router())
        .nest("/api/v1", account_router())
        .nest(
            "/api/v1",
            dashboard_router().layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                evict_rejected_session,
            )),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
