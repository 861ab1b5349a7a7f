//! `CorticalServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::{Extensions, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use cortical_core::{ErrorEnvelope, Session};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::errors::{Result, ServerError};
use crate::health::HealthResponse;
use crate::metrics::WS_UPGRADE_FAILURES_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{Dispatcher, SessionState, state_channel, transition};

/// State cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Runs each upgraded connection.
    pub dispatcher: Dispatcher,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Largest accepted websocket message, in bytes.
    pub max_message_size: usize,
}

/// The main Cortical server.
pub struct CorticalServer {
    config: ServerConfig,
    dispatcher: Dispatcher,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl CorticalServer {
    /// Create a new server. Sessions end when the server shuts down.
    pub fn new(config: ServerConfig, dispatcher: Dispatcher, metrics: Option<PrometheusHandle>) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        Self {
            config,
            dispatcher: dispatcher.with_shutdown(shutdown.token()),
            shutdown,
            metrics,
            start_time: Instant::now(),
        }
    }

    /// `/ws`, `/health`, `/metrics`, then static files for everything else.
    pub fn router(&self) -> Router {
        let state = AppState {
            dispatcher: self.dispatcher.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            max_message_size: self.config.max_message_size,
        };

        let static_files = ServiceBuilder::new()
            .layer(CompressionLayer::new())
            .service(ServeDir::new(&self.config.static_dir));

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .fallback_service(static_files)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the listener and serve in a background task.
    ///
    /// Returns the bound address and the serve task, which completes after
    /// [`ShutdownCoordinator::shutdown`] once in-flight requests finish.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>)> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local = listener.local_addr()?;

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server error");
            }
        });

        info!(addr = %local, cortexes = ?self.dispatcher.cortex_names(), "listening");
        Ok((local, handle))
    }

    /// Fire this to stop the listener and end every session.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Listener and dispatch configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The dispatcher serving upgraded connections.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// GET /ws
///
/// A failed upgrade never starts a session: the client gets a 500 error
/// envelope as the HTTP body.
async fn ws_handler(
    State(state): State<AppState>,
    extensions: Extensions,
    ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let (state_tx, _) = state_channel();
    transition(&state_tx, SessionState::Upgrading);

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(error = %rejection, "websocket upgrade rejected");
            counter!(WS_UPGRADE_FAILURES_TOTAL).increment(1);
            transition(&state_tx, SessionState::Closed);
            let envelope = ErrorEnvelope::internal(rejection.body_text());
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(envelope)).into_response();
        }
    };

    let remote_addr = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let session = Session::new(remote_addr);
    debug!(session_id = %session.id(), ?remote_addr, "upgrading");

    let dispatcher = state.dispatcher.clone();
    ws.max_message_size(state.max_message_size)
        .on_failed_upgrade(|err| {
            warn!(error = %err, "websocket upgrade failed");
            counter!(WS_UPGRADE_FAILURES_TOTAL).increment(1);
        })
        .on_upgrade(move |socket| async move {
            let _ = dispatcher.run_observed(socket, session, state_tx).await;
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::snapshot(state.start_time, &state.dispatcher))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
