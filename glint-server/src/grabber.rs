//! `xcap`-backed screen grabber.
//!
//! Cross-platform capture via the `xcap` crate. Regions arrive in
//! absolute screen coordinates; xcap captures relative to a monitor,
//! so each grab locates the monitor under the region's origin and
//! crops the monitor-relative sub-rectangle. xcap already delivers
//! RGBA, which is the pipeline's canonical layout, so no byte
//! reordering needed.

use bytes::Bytes;
use glint_core::{CaptureRegion, Frame, GlintError, MonitorInfo, ScreenGrabber};
use xcap::Monitor;

pub struct XcapGrabber;

impl XcapGrabber {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XcapGrabber {
    fn default() -> Self {
        Self::new()
    }
}

fn xcap_err(e: xcap::XCapError) -> GlintError {
    GlintError::CaptureFailure(e.to_string())
}

impl ScreenGrabber for XcapGrabber {
    fn monitors(&self) -> Result<Vec<MonitorInfo>, GlintError> {
        Monitor::all()
            .map_err(xcap_err)?
            .iter()
            .map(|m| {
                Ok(MonitorInfo {
                    x: m.x().map_err(xcap_err)?,
                    y: m.y().map_err(xcap_err)?,
                    width: m.width().map_err(xcap_err)?,
                    height: m.height().map_err(xcap_err)?,
                })
            })
            .collect()
    }

    fn grab(&self, region: &CaptureRegion) -> Result<Frame, GlintError> {
        let monitor = Monitor::from_point(region.left, region.top).map_err(|e| {
            GlintError::CaptureFailure(format!(
                "no monitor under ({}, {}): {e}",
                region.left, region.top
            ))
        })?;

        let rel_x = (region.left - monitor.x().map_err(xcap_err)?).max(0) as u32;
        let rel_y = (region.top - monitor.y().map_err(xcap_err)?).max(0) as u32;

        let image = monitor
            .capture_region(rel_x, rel_y, region.width, region.height)
            .map_err(xcap_err)?;

        let (width, height) = (image.width(), image.height());
        Frame::new(Bytes::from(image.into_raw()), width, height)
    }
}
