//! WebSocket trigger server built on axum.
//!
//! Clients send `{"type":"start_research","topic":"..."}` and receive every
//! `ResearchEvent` of the resulting run as JSON text frames. Each frame
//! carries a `run_id`, so runs started on the same socket can be told apart.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use delve_core::{ResearchEvent, ResearchObserver, ResearchRequest, ResearchService, ServerConfig};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Messages accepted from websocket clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartResearch {
        #[serde(default)]
        topic: Option<String>,
    },
}

/// A research event tagged with the run that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub run_id: Uuid,
    #[serde(flatten)]
    pub event: ResearchEvent,
}

/// Forwards one run's events to a socket, tagged with its id.
struct RunObserver {
    run_id: Uuid,
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ResearchObserver for RunObserver {
    fn on_event(&self, event: ResearchEvent) {
        // The client may already be gone; the run carries on regardless.
        let _ = self.tx.send(RunEvent {
            run_id: self.run_id,
            event,
        });
    }
}

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    service: ResearchService,
    started: Instant,
    runs_started: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(service: ResearchService) -> Self {
        Self {
            service,
            started: Instant::now(),
            runs_started: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Hand a client message to the research service.
    ///
    /// Returns the id of the started run; blank topics start nothing.
    fn dispatch(
        &self,
        message: ClientMessage,
        tx: &mpsc::UnboundedSender<RunEvent>,
    ) -> Option<Uuid> {
        match message {
            ClientMessage::StartResearch { topic } => {
                let run_id = Uuid::new_v4();
                let observer = Arc::new(RunObserver {
                    run_id,
                    tx: tx.clone(),
                });
                self.service
                    .trigger_with_id(ResearchRequest { topic }, run_id, observer)?;
                self.runs_started.fetch_add(1, Ordering::Relaxed);
                tracing::info!(%run_id, "Research run started from websocket");
                Some(run_id)
            }
        }
    }
}

/// Build an axum Router with `/ws` and `/health` routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Health check endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "ok",
        "runs_started": state.runs_started.load(Ordering::Relaxed),
        "tool_hint": state.service.hint().last_good().map(|t| t.to_string()),
        "uptime_secs": state.started.elapsed().as_secs(),
    });
    axum::Json(body)
}

/// Handle an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<RunEvent>();

    // Forward run events to the client until it goes away.
    let forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(ws_msg)) = receiver.next().await {
        let text = match ws_msg {
            WsMessage::Text(t) => t.to_string(),
            WsMessage::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => {
                if state.dispatch(message, &tx).is_none() {
                    tracing::debug!("Ignoring start_research without a topic");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Invalid client message"),
        }
    }

    // Runs in flight keep their own senders; the forwarder ends once the
    // socket send fails or every run has finished.
    drop(tx);
    if let Err(e) = forward.await {
        tracing::debug!(error = %e, "Event forwarder ended abnormally");
    }
}

/// Start the server on the configured address and run until Ctrl-C.
pub async fn run(service: ResearchService, config: &ServerConfig) -> Result<(), std::io::Error> {
    let app = router(AppState::new(service));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Delve server listening on ws://{}/ws", addr);
    println!("Delve server listening on ws://{}/ws", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
