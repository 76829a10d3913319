//! Thin HTTP/WebSocket transport over the core pipeline.
//!
//! Three routes:
//! - `GET /`: embedded WebGL viewer page
//! - `GET /ws`: WebSocket upgrade into a [`StreamingSession`]
//! - `GET /snapshot.png`: most recent PNG still, or 503 before the
//!   first capture
//!
//! The server itself shuts down via the shared [`Shutdown`] token
//! (`with_graceful_shutdown`); each session additionally polls the
//! token once per pacing tick.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::ws::{CloseFrame, Message, WebSocket},
    extract::{State, WebSocketUpgrade},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use tracing::{info, warn};

use glint_core::{
    encode_png, CachedSource, CloseReason, FrameCache, GlintError, RegionResolver, ScreenGrabber,
    Shutdown, StreamingSession, ViewerSink,
};

use crate::config::CaptureMode;

const VIEWER_PAGE: &str = include_str!("../assets/viewer.html");

// ── AppState ─────────────────────────────────────────────────────

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub mode: CaptureMode,
    pub target_fps: u32,
    pub cache: Arc<FrameCache>,
    pub resolver: RegionResolver,
    pub grabber: Arc<dyn ScreenGrabber>,
    pub shutdown: Shutdown,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/snapshot.png", get(snapshot))
        .with_state(state)
}

/// Bind and serve until the shutdown token fires.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), GlintError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");

    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(VIEWER_PAGE)
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("viewer connected");
    let sink = WsViewer { socket };
    let shutdown = state.shutdown.clone();

    let result = match state.mode {
        CaptureMode::Background => {
            let source = CachedSource::new(Arc::clone(&state.cache));
            StreamingSession::new(sink, source, shutdown, state.target_fps)
                .run()
                .await
        }
        CaptureMode::OnDemand => {
            let source =
                glint_core::OnDemandSource::new(state.resolver.clone(), Arc::clone(&state.grabber));
            StreamingSession::new(sink, source, shutdown, state.target_fps)
                .run()
                .await
        }
    };

    match result {
        Ok(()) => info!("viewer session closed"),
        // Already notified to the peer by the session; contained here.
        Err(e) => warn!(error = %e, "viewer session failed"),
    }
}

async fn snapshot(State(state): State<AppState>) -> Response {
    match state.mode {
        CaptureMode::Background => match state.cache.latest_png() {
            Some(png) => png_response(png),
            None => (StatusCode::SERVICE_UNAVAILABLE, "capture not ready").into_response(),
        },
        CaptureMode::OnDemand => {
            let resolver = state.resolver.clone();
            let grabber = Arc::clone(&state.grabber);
            let grabbed = tokio::task::spawn_blocking(move || {
                let region = resolver.resolve(grabber.as_ref())?;
                let frame = grabber.grab(&region)?;
                encode_png(&frame)
            })
            .await;

            match grabbed {
                Ok(Ok(png)) => png_response(png),
                Ok(Err(e))
                    if e.is_retryable() || matches!(e, GlintError::InvalidRegion { .. }) =>
                {
                    (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
                }
                Ok(Err(e)) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("capture error: {e}"),
                )
                    .into_response(),
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("capture task failed: {e}"),
                )
                    .into_response(),
            }
        }
    }
}

fn png_response(png: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], png).into_response()
}

// ── WsViewer ─────────────────────────────────────────────────────

/// [`ViewerSink`] over an axum WebSocket.
///
/// The protocol is server-push only, so the socket is never read;
/// peer disconnects surface as send failures.
struct WsViewer {
    socket: WebSocket,
}

#[async_trait]
impl ViewerSink for WsViewer {
    async fn send_text(&mut self, text: String) -> Result<(), GlintError> {
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| GlintError::PeerDisconnected)
    }

    async fn send_binary(&mut self, payload: Bytes) -> Result<(), GlintError> {
        self.socket
            .send(Message::Binary(payload))
            .await
            .map_err(|_| GlintError::PeerDisconnected)
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), GlintError> {
        let frame = CloseFrame {
            code: reason.code(),
            reason: reason.reason().into(),
        };
        self.socket
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|_| GlintError::PeerDisconnected)
    }
}
