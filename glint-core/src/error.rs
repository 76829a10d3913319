//! Domain-specific error types for the capture/streaming pipeline.
//!
//! All fallible operations return `Result<T, GlintError>`.
//! No panics on invalid input: every error is typed, and each one is
//! contained to the smallest affected scope: a single session, or the
//! whole process only for background-mode capture failures.

use thiserror::Error;

/// The canonical error type for the glint pipeline.
#[derive(Debug, Error)]
pub enum GlintError {
    // ── Region Errors ────────────────────────────────────────────
    /// Overlay mode is active but the overlay window has not yet
    /// reported a geometry. Retryable: callers back off and retry
    /// rather than treating this as fatal.
    #[error("overlay geometry not yet reported")]
    RegionNotReady,

    /// Configuration resolves to an unusable capture rectangle
    /// (non-positive size, or a monitor selector outside the
    /// enumerated range).
    #[error("invalid capture region: {reason}")]
    InvalidRegion { reason: String },

    // ── Capture Errors ───────────────────────────────────────────
    /// The underlying screen grab failed. Fatal to background
    /// capture, session-local in on-demand mode.
    #[error("screen capture failed: {0}")]
    CaptureFailure(String),

    /// A pixel buffer does not match its declared dimensions.
    #[error("frame geometry mismatch: expected {expected} bytes, got {actual}")]
    FrameGeometry { expected: usize, actual: usize },

    // ── Session Errors ───────────────────────────────────────────
    /// The remote viewer went away. Normal termination: logged,
    /// never alarmed.
    #[error("peer disconnected")]
    PeerDisconnected,

    /// The peer violated the viewer protocol.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    // ── Ambient Errors ───────────────────────────────────────────
    /// The underlying I/O layer reported an error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding a control message or still image failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl GlintError {
    /// Build a [`GlintError::InvalidRegion`] from anything displayable.
    pub fn invalid_region(reason: impl Into<String>) -> Self {
        GlintError::InvalidRegion {
            reason: reason.into(),
        }
    }

    /// Whether the caller should retry after a short backoff instead
    /// of propagating.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GlintError::RegionNotReady)
    }
}

impl From<serde_json::Error> for GlintError {
    fn from(e: serde_json::Error) -> Self {
        GlintError::Encoding(e.to_string())
    }
}

impl From<image::ImageError> for GlintError {
    fn from(e: image::ImageError) -> Self {
        GlintError::Encoding(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = GlintError::invalid_region("monitor index 7 out of range (3 available)");
        assert!(e.to_string().contains("monitor index 7"));

        let e = GlintError::FrameGeometry {
            expected: 4096,
            actual: 100,
        };
        assert!(e.to_string().contains("4096"));
        assert!(e.to_string().contains("100"));
    }

    #[test]
    fn only_region_not_ready_is_retryable() {
        assert!(GlintError::RegionNotReady.is_retryable());
        assert!(!GlintError::PeerDisconnected.is_retryable());
        assert!(!GlintError::CaptureFailure("x".into()).is_retryable());
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: GlintError = io_err.into();
        assert!(matches!(e, GlintError::Io(_)));
    }
}
