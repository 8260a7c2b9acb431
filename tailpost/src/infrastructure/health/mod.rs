//! Serves `/health`, `/ready`, `/metrics` on a TCP address, optionally
//! behind TLS and an auth gate shared with [`crate::infrastructure::auth`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tokio::sync::RwLock;

use tailpost_domain::entities::HealthState;
use tailpost_domain::TailPostError;

use crate::infrastructure::auth::AuthAttacher;
use crate::infrastructure::metrics::MetricsSink;
use crate::infrastructure::tls::TlsContext;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const VERSION: &str = env!("CARGO_PKG_VERSION");

struct ServerState {
    health: Arc<RwLock<HealthState>>,
    metrics: Arc<dyn MetricsSink>,
    auth: AuthAttacher,
}

pub struct HealthServer {
    health: Arc<RwLock<HealthState>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    join_handle: Option<tokio::task::JoinHandle<()>>,
}

impl HealthServer {
    /// Binds immediately and spawns the accept loop in the background;
    /// returns as soon as the listener is bound, not when it's serving its
    /// first request.
    pub async fn start(
        addr: SocketAddr,
        metrics: Arc<dyn MetricsSink>,
        auth: AuthAttacher,
        tls: &TlsContext,
    ) -> Result<Self, TailPostError> {
        let health = Arc::new(RwLock::new(HealthState::new(Instant::now())));
        let state = Arc::new(ServerState {
            health: health.clone(),
            metrics,
            auth,
        });

        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let join_handle = if let Some(server_config) = tls.server_config.clone() {
            let handle = axum_server::Handle::new();
            let serve_handle = handle.clone();
            let listener_addr = addr;
            tokio::spawn(async move {
                let _ = axum_server::bind_rustls(listener_addr, axum_server::tls_rustls::RustlsConfig::from_config(server_config))
                    .handle(serve_handle)
                    .serve(app.into_make_service())
                    .await;
            });
            tokio::spawn(async move {
                let _ = shutdown_rx.await;
                handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            })
        } else {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| TailPostError::internal(format!("failed to bind health server on {addr}: {e}")))?;
            tokio::spawn(async move {
                let _ = axum::serve(listener, app.into_make_service())
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await;
            })
        };

        Ok(Self {
            health,
            shutdown_tx: Some(shutdown_tx),
            join_handle: Some(join_handle),
        })
    }

    pub async fn set_ready(&self, ready: bool) {
        self.health.write().await.set_ready(ready);
    }

    /// Graceful shutdown with the 5-second deadline; tasks that outlive it
    /// are abandoned, matching the supervisor's overall shutdown policy.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.join_handle.take() {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }
    }
}

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
    timestamp: u64,
    version: &'static str,
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

async fn check_auth(state: &ServerState, headers: &HeaderMap) -> Option<StatusCode> {
    let mut reqwest_headers = reqwest::header::HeaderMap::new();
    for (name, value) in headers {
        if let Ok(name) = reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()) {
            if let Ok(value) = reqwest::header::HeaderValue::from_bytes(value.as_bytes()) {
                reqwest_headers.insert(name, value);
            }
        }
    }
    match state.auth.authenticate(&reqwest_headers) {
        Ok(true) => None,
        Ok(false) => Some(StatusCode::UNAUTHORIZED),
        Err(_) => Some(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

async fn health_handler(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(status) = check_auth(&state, &headers).await {
        return status.into_response();
    }
    Json(StatusBody {
        status: "ok",
        timestamp: now_unix(),
        version: VERSION,
    })
    .into_response()
}

async fn ready_handler(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(status) = check_auth(&state, &headers).await {
        return status.into_response();
    }
    let ready = state.health.read().await.is_ready();
    let body = StatusBody {
        status: if ready { "ready" } else { "not ready" },
        timestamp: now_unix(),
        version: VERSION,
    };
    if ready {
        Json(body).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

async fn metrics_handler(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(status) = check_auth(&state, &headers).await {
        return status.into_response();
    }
    (
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::metrics::NoopMetricsSink;

    #[tokio::test]
    async fn ready_is_503_until_set_ready() {
        let tls = TlsContext::build(&tailpost_domain::config::TlsSettings::default()).unwrap();
        let mut server = HealthServer::start(
            "127.0.0.1:0".parse().unwrap(),
            Arc::new(NoopMetricsSink),
            AuthAttacher::None,
            &tls,
        )
        .await
        .unwrap();
        assert!(!server.health.read().await.is_ready());
        server.set_ready(true).await;
        assert!(server.health.read().await.is_ready());
        server.stop().await;
    }
}
