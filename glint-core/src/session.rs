//! Per-viewer streaming session.
//!
//! One session per connected viewer, driving the paced protocol over
//! an abstract [`ViewerSink`]:
//!
//! 1. **Handshaking**: wait for a first resolvable frame (retrying
//!    `RegionNotReady`/empty-cache with a short backoff), then send an
//!    `init` message carrying the frame dimensions.
//! 2. **Streaming**: once per pacing tick, check shutdown, fetch the
//!    current frame, re-announce if the dimensions changed, send the
//!    raw RGBA payload, sleep for the remainder of the tick.
//! 3. **Closed**: terminal, on disconnect, shutdown or error.
//!
//! Within a session an `init` always precedes the payload it
//! describes, and a resolution change is never skipped even when
//! frames are dropped. Sessions never affect each other: an error
//! here is notified to this peer (best effort) and the session ends.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::capture::FrameSource;
use crate::error::GlintError;
use crate::shutdown::Shutdown;

/// Backoff between retries while no frame is available yet.
pub const NOT_READY_BACKOFF: Duration = Duration::from_millis(50);

// ── Viewer protocol ──────────────────────────────────────────────

/// Text-side control messages of the viewer protocol. The pixel
/// payloads themselves travel as separate binary messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Announces payload dimensions. Sent once at session start and
    /// again whenever they change.
    Init { width: u32, height: u32 },
    /// Best-effort internal-error notification before closing.
    Error { message: String },
}

impl ControlMessage {
    pub fn to_json(&self) -> Result<String, GlintError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Why the server is closing the connection. Server-initiated
/// shutdown uses a distinct code/reason pair so clients can tell it
/// apart from ordinary network loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Normal,
    ServerShutdown,
}

impl CloseReason {
    /// WebSocket close code for this reason.
    pub fn code(self) -> u16 {
        match self {
            CloseReason::Normal => 1000,
            CloseReason::ServerShutdown => 1001,
        }
    }

    /// Human-readable close reason.
    pub fn reason(self) -> &'static str {
        match self {
            CloseReason::Normal => "",
            CloseReason::ServerShutdown => "server shutdown",
        }
    }
}

/// Connection-side of a session. Implemented over an axum WebSocket
/// in the server crate and by a recording fake in tests.
#[async_trait]
pub trait ViewerSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), GlintError>;
    async fn send_binary(&mut self, payload: Bytes) -> Result<(), GlintError>;
    async fn close(&mut self, reason: CloseReason) -> Result<(), GlintError>;
}

// ── StreamingSession ─────────────────────────────────────────────

/// Session lifecycle states. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Streaming,
    Closed,
}

/// State machine for one connected viewer.
pub struct StreamingSession<K: ViewerSink, S: FrameSource> {
    sink: K,
    source: S,
    shutdown: Shutdown,
    interval: Duration,
    state: SessionState,
    announced: Option<(u32, u32)>,
}

impl<K: ViewerSink, S: FrameSource> StreamingSession<K, S> {
    pub fn new(sink: K, source: S, shutdown: Shutdown, target_fps: u32) -> Self {
        Self {
            sink,
            source,
            shutdown,
            interval: Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1))),
            state: SessionState::Handshaking,
            announced: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session until disconnect, shutdown or error.
    ///
    /// Peer disconnects are normal termination and surface as
    /// `Ok(())`. Any other failure is notified to the peer (best
    /// effort), the connection is closed, and the error is returned
    /// for the caller to log; it must never escape further.
    pub async fn run(&mut self) -> Result<(), GlintError> {
        let result = self.run_inner().await;
        self.state = SessionState::Closed;

        match result {
            Ok(()) => Ok(()),
            Err(GlintError::PeerDisconnected) => {
                info!("viewer disconnected");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "session failed");
                let notice = ControlMessage::Error {
                    message: format!("server error: {e}"),
                };
                if let Ok(text) = notice.to_json() {
                    let _ = self.sink.send_text(text).await;
                }
                let _ = self.sink.close(CloseReason::Normal).await;
                Err(e)
            }
        }
    }

    async fn run_inner(&mut self) -> Result<(), GlintError> {
        // Handshake: single wait-then-stream sequence. Poll for the
        // first frame with a bounded backoff, observing shutdown on
        // every iteration.
        let first = loop {
            if self.shutdown.is_requested() {
                let _ = self.sink.close(CloseReason::ServerShutdown).await;
                return Ok(());
            }
            match self.source.next_frame()? {
                Some(frame) => break frame,
                None => tokio::time::sleep(NOT_READY_BACKOFF).await,
            }
        };

        self.announce(first.size()).await?;
        self.state = SessionState::Streaming;
        debug!(
            width = first.width,
            height = first.height,
            "session streaming"
        );
        self.sink.send_binary(first.pixels()).await?;

        loop {
            let tick = Instant::now();

            if self.shutdown.is_requested() {
                let _ = self.sink.close(CloseReason::ServerShutdown).await;
                return Ok(());
            }

            match self.source.next_frame()? {
                Some(frame) => {
                    if Some(frame.size()) != self.announced {
                        self.announce(frame.size()).await?;
                    }
                    self.sink.send_binary(frame.pixels()).await?;
                }
                None => {
                    tokio::time::sleep(NOT_READY_BACKOFF).await;
                    continue;
                }
            }

            self.pace(tick).await;
        }
    }

    /// Send an `init` for the given dimensions and remember them.
    async fn announce(&mut self, (width, height): (u32, u32)) -> Result<(), GlintError> {
        let text = ControlMessage::Init { width, height }.to_json()?;
        self.sink.send_text(text).await?;
        self.announced = Some((width, height));
        Ok(())
    }

    /// Sleep for the remainder of the pacing interval, floor at zero.
    async fn pace(&mut self, tick: Instant) {
        let elapsed = tick.elapsed();
        if elapsed < self.interval {
            tokio::time::sleep(self.interval - elapsed).await;
        }
    }
}
