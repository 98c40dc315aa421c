use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use ferrule_core::{BridgeError, Command, FerrulePaths, RawCommand, SUPPORTED_COMMANDS};
use ferrule_handlers::{dispatch, recognize, BridgeContext};
use ferrule_store::discovery::{self, DiscoveryRecord};

// ── Config ──

pub struct ServeConfig {
    /// IDE identifier advertised in the discovery record.
    pub ide: String,
    pub version: String,
    /// Answer only after the handler finished, with per-file outcomes.
    pub wait_for_completion: bool,
    pub body_limit_bytes: usize,
}

// ── Endpoint ──

/// Where this process accepts commands. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEndpoint {
    pub addr: SocketAddr,
    pub path: String,
}

impl SessionEndpoint {
    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.addr.ip(), self.addr.port(), self.path)
    }

    fn record(&self, config: &ServeConfig) -> DiscoveryRecord {
        DiscoveryRecord {
            ide: config.ide.clone(),
            endpoint: self.url(),
            port: self.addr.port(),
            version: config.version.clone(),
            supported_actions: SUPPORTED_COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// An unguessable request path, fresh per process.
pub fn random_path() -> String {
    format!("/endpoint-{}", hex::encode(rand::random::<[u8; 16]>()))
}

// ── Delivery ──

/// How an accepted command reaches its handler.
#[derive(Clone)]
pub enum Delivery {
    /// Run the handler inside the request and answer with its report.
    Wait,
    /// Answer at once and hand the command to the backlog worker.
    Queue(Backlog),
}

/// Sending side of the fire-and-forget queue. A single worker runs the
/// commands one after another, in the order the requests arrived.
#[derive(Clone)]
pub struct Backlog {
    tx: mpsc::UnboundedSender<Command>,
}

impl Backlog {
    /// Start the worker. Once `stop` is cancelled it refuses new commands,
    /// runs the ones already queued, and ends.
    pub fn spawn(ctx: Arc<BridgeContext>, stop: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_backlog(ctx, rx, stop));
        (Self { tx }, worker)
    }

    fn push(&self, command: Command) -> Result<(), AppError> {
        self.tx.send(command).map_err(|_| AppError::Closed)
    }
}

async fn run_backlog(
    ctx: Arc<BridgeContext>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            next = rx.recv() => match next {
                Some(command) => {
                    dispatch(&ctx, command).await;
                }
                None => return,
            },
            () = stop.cancelled() => break,
        }
    }
    rx.close();
    let mut drained = 0usize;
    while let Some(command) = rx.recv().await {
        dispatch(&ctx, command).await;
        drained += 1;
    }
    debug!(drained, "backlog closed");
}

// ── App State ──

struct AppState {
    ctx: Arc<BridgeContext>,
    delivery: Delivery,
}

// ── Error Handling ──

enum AppError {
    Body(JsonRejection),
    Command(BridgeError),
    Closed,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Body(rejection) => {
                // Anything wrong with the body is the client's fault; only a
                // body over the limit keeps its own status.
                let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    StatusCode::PAYLOAD_TOO_LARGE
                } else {
                    StatusCode::BAD_REQUEST
                };
                (status, rejection.body_text())
            }
            AppError::Command(err) if err.is_client_error() => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::Command(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            AppError::Closed => (
                StatusCode::SERVICE_UNAVAILABLE,
                "bridge is shutting down".to_string(),
            ),
        };
        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("malformed request body: {}", rejection.body_text());
        Self::Body(rejection)
    }
}

impl From<BridgeError> for AppError {
    fn from(err: BridgeError) -> Self {
        Self::Command(err)
    }
}

// ── Entrypoint ──

/// Run the session server until `shutdown` is cancelled.
///
/// Binds an ephemeral loopback port, publishes the discovery record, and
/// removes it again on the way out, also when serving fails. In
/// fire-and-forget mode the queued commands run to the end before the ledger
/// is reset.
pub async fn serve(
    ctx: Arc<BridgeContext>,
    paths: &FerrulePaths,
    config: ServeConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let _instance = ferrule_store::try_lock_file(&paths.lock_file)?;

    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let endpoint = SessionEndpoint {
        addr: listener.local_addr()?,
        path: random_path(),
    };
    discovery::publish(paths, &endpoint.record(&config))?;
    info!(url = %endpoint.url(), "bridge listening");

    let stop_backlog = CancellationToken::new();
    let (delivery, worker) = if config.wait_for_completion {
        (Delivery::Wait, None)
    } else {
        let (backlog, worker) = Backlog::spawn(ctx.clone(), stop_backlog.clone());
        (Delivery::Queue(backlog), Some(worker))
    };

    let app = router(ctx.clone(), &endpoint.path, delivery, config.body_limit_bytes);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    match discovery::delete(paths) {
        Ok(_) => info!("discovery record removed"),
        Err(e) => warn!("could not remove discovery record: {e}"),
    }
    stop_backlog.cancel();
    if let Some(worker) = worker {
        if let Err(e) = worker.await {
            warn!("backlog worker ended abnormally: {e}");
        }
    }
    ctx.coordinator.reset();
    served?;
    Ok(())
}

/// Build the router (for testing without binding to a port).
pub fn router(
    ctx: Arc<BridgeContext>,
    path: &str,
    delivery: Delivery,
    body_limit_bytes: usize,
) -> Router {
    let state = Arc::new(AppState { ctx, delivery });
    Router::new()
        .route(path, post(post_command))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── POST <session path> ──

async fn post_command(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RawCommand>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(raw) = body?;
    let command = recognize(raw)?;

    match &state.delivery {
        Delivery::Wait => {
            let report = dispatch(&state.ctx, command).await;
            Ok(Json(report).into_response())
        }
        Delivery::Queue(backlog) => {
            let name = command.name();
            backlog.push(command)?;
            Ok(Json(serde_json::json!({ "command": name, "accepted": true })).into_response())
        }
    }
}

// ── Tests ──
