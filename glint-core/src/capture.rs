//! Screen-grabbing seam and per-session frame sources.
//!
//! [`ScreenGrabber`] is the boundary to the OS capture backend: the
//! server crate provides an `xcap`-based implementation, tests use
//! synthetic grabbers. Everything above this trait is
//! platform-independent and runs against either.
//!
//! [`FrameSource`] is what a streaming session polls once per pacing
//! tick. In background mode it reads the shared [`FrameCache`]; in
//! on-demand mode it resolves the region and grabs a fresh frame on
//! every call, which is what lets an overlay rectangle be dragged
//! live mid-stream.

use std::sync::Arc;

use crate::error::GlintError;
use crate::frame::{Frame, FrameCache};
use crate::region::{CaptureRegion, RegionResolver};

// ── MonitorInfo ──────────────────────────────────────────────────

/// Geometry of one enumerated monitor, in absolute screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

// ── ScreenGrabber ────────────────────────────────────────────────

/// Backend capable of enumerating monitors and grabbing one frame of
/// pixel data for a rectangle.
///
/// Implementations must deliver canonical RGBA; if the OS hands back
/// blue-red-swapped data, reordering is the grabber's job.
pub trait ScreenGrabber: Send + Sync {
    /// Enumerate the attached monitors.
    fn monitors(&self) -> Result<Vec<MonitorInfo>, GlintError>;

    /// Capture exactly one frame of the given region.
    fn grab(&self, region: &CaptureRegion) -> Result<Frame, GlintError>;
}

// ── FrameSource ──────────────────────────────────────────────────

/// Where a streaming session obtains its next frame.
///
/// `Ok(None)` means "nothing available yet, retry after a short
/// backoff" (empty cache, or overlay geometry not yet reported).
/// `Err` is a real failure and is session-local.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Arc<Frame>>, GlintError>;
}

/// Frame source backed by the shared cache (background capture mode).
pub struct CachedSource {
    cache: Arc<FrameCache>,
}

impl CachedSource {
    pub fn new(cache: Arc<FrameCache>) -> Self {
        Self { cache }
    }
}

impl FrameSource for CachedSource {
    fn next_frame(&mut self) -> Result<Option<Arc<Frame>>, GlintError> {
        Ok(self.cache.latest_frame())
    }
}

/// Frame source that captures per call (on-demand mode).
///
/// Re-resolves the region on every tick so overlay drags and resizes
/// take effect immediately. A grab failure here is reported to this
/// session only and never takes the process down.
pub struct OnDemandSource {
    resolver: RegionResolver,
    grabber: Arc<dyn ScreenGrabber>,
}

impl OnDemandSource {
    pub fn new(resolver: RegionResolver, grabber: Arc<dyn ScreenGrabber>) -> Self {
        Self { resolver, grabber }
    }
}

impl FrameSource for OnDemandSource {
    fn next_frame(&mut self) -> Result<Option<Arc<Frame>>, GlintError> {
        let region = match self.resolver.resolve(self.grabber.as_ref()) {
            Ok(region) => region,
            Err(e) if e.is_retryable() => return Ok(None),
            Err(e) => return Err(e),
        };
        let frame = self.grabber.grab(&region)?;
        Ok(Some(Arc::new(frame)))
    }
}
