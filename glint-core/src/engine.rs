//! Background capture engine.
//!
//! A single dedicated OS thread that grabs frames at a fixed cadence
//! and publishes them (plus a PNG still) into the shared
//! [`FrameCache`]:
//!
//! 1. Wait for the overlay readiness latch, if overlay-driven.
//! 2. Resolve the capture region: once for fixed configurations,
//!    every tick when overlay-driven.
//! 3. Grab, PNG-encode, publish atomically.
//! 4. Sleep `interval - elapsed`, floor at zero. If a capture
//!    overruns the interval the next tick starts immediately; frames
//!    are dropped, never queued.
//!
//! Background capture is all-or-nothing for the process: a grab or
//! encode failure requests process shutdown and ends the thread. The
//! loop polls the shutdown flag every cycle, so external shutdown is
//! observed within one capture cycle.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::capture::ScreenGrabber;
use crate::error::GlintError;
use crate::frame::{encode_png, FrameCache};
use crate::region::RegionResolver;
use crate::shutdown::Shutdown;

/// Backoff when the overlay geometry momentarily disappears mid-run.
const NOT_READY_BACKOFF: Duration = Duration::from_millis(50);

/// Bounded slice for the readiness wait, so the gate can interleave
/// shutdown checks.
const READY_WAIT_SLICE: Duration = Duration::from_millis(200);

/// Continuous capture producer feeding the shared frame cache.
pub struct CaptureEngine {
    grabber: Arc<dyn ScreenGrabber>,
    resolver: RegionResolver,
    cache: Arc<FrameCache>,
    shutdown: Shutdown,
    interval: Duration,
}

impl CaptureEngine {
    pub fn new(
        grabber: Arc<dyn ScreenGrabber>,
        resolver: RegionResolver,
        cache: Arc<FrameCache>,
        shutdown: Shutdown,
        target_fps: u32,
    ) -> Self {
        Self {
            grabber,
            resolver,
            cache,
            shutdown,
            interval: Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1))),
        }
    }

    /// Start the capture loop on its own named OS thread.
    pub fn spawn(self) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("capture".into())
            .spawn(move || self.run())
    }

    /// Run the capture loop on the current thread until shutdown or
    /// failure. Failures request process shutdown; this process
    /// exists to serve exactly one capture session, so there is no
    /// narrower scope to contain them.
    pub fn run(&self) {
        if let Err(e) = self.run_inner() {
            error!(error = %e, "background capture failed");
            self.shutdown.request("background capture failed");
        }
    }

    fn run_inner(&self) -> Result<(), GlintError> {
        // Gate: no capture until a first overlay geometry is known.
        if let Some(overlay) = self.resolver.overlay_geometry() {
            while !overlay.wait_ready(READY_WAIT_SLICE) {
                if self.shutdown.is_requested() {
                    return Ok(());
                }
            }
        }

        let mut region = self.resolver.resolve(self.grabber.as_ref())?;
        info!(
            top = region.top,
            left = region.left,
            width = region.width,
            height = region.height,
            "background capture started"
        );

        while !self.shutdown.is_requested() {
            let tick = Instant::now();

            if self.resolver.overlay_driven() {
                match self.resolver.resolve(self.grabber.as_ref()) {
                    Ok(r) => region = r,
                    Err(e) if e.is_retryable() => {
                        thread::sleep(NOT_READY_BACKOFF);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            let frame = self.grabber.grab(&region)?;
            let png = encode_png(&frame)?;
            self.cache.publish(frame, png);

            let elapsed = tick.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }

        info!("background capture stopped");
        Ok(())
    }
}
