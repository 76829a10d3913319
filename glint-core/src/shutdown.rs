//! Process-wide shutdown coordination.
//!
//! A single monotonic flag settable exactly once, observed by every
//! loop in the system: async streaming sessions, the background
//! capture thread, and the overlay UI poll. Setting it is a
//! fire-and-forget broadcast; each consumer notices within one of
//! its own bounded ticks, so no blocking barrier is needed (or safe;
//! a join against a loop stuck in long I/O would deadlock).
//!
//! Shutdown sources: OS termination signals, the transport server
//! exiting, and the overlay window being closed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cloneable handle to the process-wide shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    logged: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent: the first caller's reason is
    /// logged, later calls are no-ops. The flag never resets.
    pub fn request(&self, reason: &str) {
        if self.logged.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(reason, "shutdown requested");
        self.token.cancel();
    }

    /// Polling check for synchronous loops (capture thread, overlay UI).
    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Await cancellation, for async suspension points such as
    /// `axum::serve(..).with_graceful_shutdown(..)`.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
