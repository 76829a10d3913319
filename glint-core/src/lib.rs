//! # glint-core
//!
//! Capture-and-streaming pipeline for the glint screen-region
//! streamer.
//!
//! This crate contains:
//! - **Region**: `CaptureRegion` resolution from configuration or the
//!   live overlay geometry, with its readiness latch
//! - **Capture**: the `ScreenGrabber` backend seam and the per-session
//!   `FrameSource` implementations (cached vs. on-demand)
//! - **Frame**: immutable RGBA `Frame`, the single-slot `FrameCache`,
//!   PNG still encoding
//! - **Engine**: the background capture thread
//! - **Session**: the per-viewer `StreamingSession` state machine and
//!   wire-level `ControlMessage`/`CloseReason` types
//! - **Shutdown**: the process-wide cancellation broadcast
//! - **Error**: `GlintError`, the typed `thiserror`-based error taxonomy
//!
//! The HTTP/WebSocket transport, the real `xcap` grabber and the
//! overlay window live in `glint-server`; everything here runs
//! against the trait seams and is exercised headlessly in tests.

pub mod capture;
pub mod engine;
pub mod error;
pub mod frame;
pub mod region;
pub mod session;
pub mod shutdown;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{CachedSource, FrameSource, MonitorInfo, OnDemandSource, ScreenGrabber};
pub use engine::CaptureEngine;
pub use error::GlintError;
pub use frame::{encode_png, Frame, FrameCache, BYTES_PER_PIXEL};
pub use region::{
    resolve_monitor_region, CaptureRegion, OverlayGeometry, RegionConfig, RegionResolver,
    OVERLAY_SENTINEL,
};
pub use session::{CloseReason, ControlMessage, SessionState, StreamingSession, ViewerSink};
pub use shutdown::Shutdown;
