//! Capture-region resolution.
//!
//! Turns configuration (a monitor selector plus relative offsets, or
//! the overlay sentinel) into a concrete absolute-screen rectangle:
//!
//! - **Fixed mode**: region = monitor origin + relative top/left, with
//!   width/height defaulting to the remaining monitor extent.
//! - **Overlay mode** (`monitor == -1`): the latest geometry reported
//!   by the overlay window is returned verbatim, and resolution fails
//!   with [`GlintError::RegionNotReady`] until a first geometry is
//!   known.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::capture::{MonitorInfo, ScreenGrabber};
use crate::error::GlintError;

/// Monitor selector value that switches to overlay mode.
pub const OVERLAY_SENTINEL: i32 = -1;

// ── CaptureRegion ────────────────────────────────────────────────

/// An absolute-screen-coordinate rectangle to capture.
///
/// Width and height are always positive once a region has been
/// resolved; the resolver rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    /// Top edge in absolute screen coordinates.
    pub top: i32,
    /// Left edge in absolute screen coordinates.
    pub left: i32,
    /// Width in pixels (> 0).
    pub width: u32,
    /// Height in pixels (> 0).
    pub height: u32,
}

impl CaptureRegion {
    /// `(width, height)` pair.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

// ── RegionConfig ─────────────────────────────────────────────────

/// Region configuration as supplied by the CLI layer.
#[derive(Debug, Clone)]
pub struct RegionConfig {
    /// Monitor index (0-based into the enumerated list), or
    /// [`OVERLAY_SENTINEL`] for overlay mode.
    pub monitor: i32,
    /// Top offset relative to the chosen monitor.
    pub top: i32,
    /// Left offset relative to the chosen monitor.
    pub left: i32,
    /// Capture width. If unset, uses monitor width - left.
    pub width: Option<u32>,
    /// Capture height. If unset, uses monitor height - top.
    pub height: Option<u32>,
}

impl RegionConfig {
    /// Whether this configuration selects the overlay window as the
    /// region source.
    pub fn overlay_mode(&self) -> bool {
        self.monitor == OVERLAY_SENTINEL
    }
}

/// Resolve a fixed (non-overlay) configuration against an enumerated
/// monitor list.
///
/// Pure function so the geometry arithmetic is testable without a
/// display.
pub fn resolve_monitor_region(
    config: &RegionConfig,
    monitors: &[MonitorInfo],
) -> Result<CaptureRegion, GlintError> {
    let index = usize::try_from(config.monitor)
        .ok()
        .filter(|i| *i < monitors.len())
        .ok_or_else(|| {
            GlintError::invalid_region(format!(
                "monitor index {} out of range ({} enumerated)",
                config.monitor,
                monitors.len()
            ))
        })?;
    let mon = &monitors[index];

    let top = mon.y + config.top;
    let left = mon.x + config.left;
    let width = config
        .width
        .map(i64::from)
        .unwrap_or(i64::from(mon.width) - i64::from(config.left));
    let height = config
        .height
        .map(i64::from)
        .unwrap_or(i64::from(mon.height) - i64::from(config.top));

    if width <= 0 || height <= 0 {
        return Err(GlintError::invalid_region(format!(
            "computed size {width}x{height}"
        )));
    }

    Ok(CaptureRegion {
        top,
        left,
        width: width as u32,
        height: height as u32,
    })
}

// ── OverlayGeometry ──────────────────────────────────────────────

/// Shared slot for the overlay window's current rectangle.
///
/// Exactly one writer (the overlay UI thread) and any number of
/// readers. The condition variable acts as a one-shot readiness
/// latch: [`wait_ready`](Self::wait_ready) takes a bounded timeout so
/// waiting loops can interleave shutdown checks.
#[derive(Default)]
pub struct OverlayGeometry {
    slot: Mutex<Option<CaptureRegion>>,
    ready: Condvar,
}

impl OverlayGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new geometry and wake anyone waiting for the first one.
    pub fn set(&self, region: CaptureRegion) {
        let mut slot = self.slot.lock();
        *slot = Some(region);
        self.ready.notify_all();
    }

    /// Latest reported geometry, or `None` before the first report.
    pub fn get(&self) -> Option<CaptureRegion> {
        *self.slot.lock()
    }

    /// Block until a geometry is available or `timeout` elapses.
    /// Returns whether a geometry is now known.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return true;
        }
        self.ready.wait_for(&mut slot, timeout);
        slot.is_some()
    }
}

// ── RegionResolver ───────────────────────────────────────────────

/// Produces the current [`CaptureRegion`] for every capture step.
///
/// Cheap to clone: one copy per streaming session in on-demand mode.
#[derive(Clone)]
pub struct RegionResolver {
    config: RegionConfig,
    overlay: Option<Arc<OverlayGeometry>>,
}

impl RegionResolver {
    /// Resolver for a fixed monitor-relative configuration.
    pub fn fixed(config: RegionConfig) -> Self {
        Self {
            config,
            overlay: None,
        }
    }

    /// Resolver driven by the overlay window's live geometry.
    pub fn overlay(config: RegionConfig, overlay: Arc<OverlayGeometry>) -> Self {
        Self {
            config,
            overlay: Some(overlay),
        }
    }

    /// Whether the region must be re-resolved on every capture step.
    pub fn overlay_driven(&self) -> bool {
        self.overlay.is_some()
    }

    /// The overlay geometry slot, when overlay-driven.
    pub fn overlay_geometry(&self) -> Option<&Arc<OverlayGeometry>> {
        self.overlay.as_ref()
    }

    /// Resolve the current capture rectangle.
    pub fn resolve(&self, grabber: &dyn ScreenGrabber) -> Result<CaptureRegion, GlintError> {
        match &self.overlay {
            Some(overlay) => overlay.get().ok_or(GlintError::RegionNotReady),
            None => {
                let monitors = grabber.monitors()?;
                resolve_monitor_region(&self.config, &monitors)
            }
        }
    }
}
