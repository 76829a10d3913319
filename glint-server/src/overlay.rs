//! Draggable/resizable capture-marker overlay window.
//!
//! An eframe window whose on-screen rectangle *is* the capture
//! region. Every repaint publishes the current geometry into the
//! shared [`OverlayGeometry`] slot (first publish releases the
//! readiness latch) and polls the shutdown flag on a fixed interval.
//! Closing the window is itself a shutdown trigger; the reverse
//! direction (shutdown closing the window) goes through the same
//! poll. The window talks to nothing else directly.

use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use glint_core::{CaptureRegion, OverlayGeometry, Shutdown};
use tracing::debug;

/// How often the window re-checks the shutdown flag even when idle.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Run the overlay event loop on the current thread until the window
/// closes or shutdown is requested. Must run on the main thread on
/// some platforms, which is why the transport server moves to a
/// worker thread in overlay mode.
pub fn run(geometry: Arc<OverlayGeometry>, shutdown: Shutdown) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Capture Area (move/resize)")
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([200.0, 150.0]),
        ..Default::default()
    };

    let app = OverlayApp {
        geometry,
        shutdown: shutdown.clone(),
    };
    let result = eframe::run_native(
        "glint-overlay",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    );

    // Reached on user close as well as on shutdown-driven close;
    // request() is idempotent either way.
    shutdown.request("overlay closed");
    result
}

struct OverlayApp {
    geometry: Arc<OverlayGeometry>,
    shutdown: Shutdown,
}

impl OverlayApp {
    /// Publish the window's absolute content rectangle in physical
    /// pixels. egui reports logical points, so scale by
    /// pixels-per-point before handing the rectangle to capture.
    fn publish_geometry(&self, ctx: &egui::Context) {
        let (rect, scale) = ctx.input(|i| (i.viewport().inner_rect, i.pixels_per_point()));
        let Some(rect) = rect else { return };

        let region = CaptureRegion {
            top: (rect.min.y * scale).round() as i32,
            left: (rect.min.x * scale).round() as i32,
            width: ((rect.width() * scale).round() as i64).max(1) as u32,
            height: ((rect.height() * scale).round() as i64).max(1) as u32,
        };

        if self.geometry.get() != Some(region) {
            debug!(
                top = region.top,
                left = region.left,
                width = region.width,
                height = region.height,
                "overlay geometry updated"
            );
            self.geometry.set(region);
        }
    }
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.shutdown.is_requested() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        self.publish_geometry(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.centered_and_justified(|ui| {
                ui.label("Streaming this area. Move or resize the window.\nClose it to stop the server.");
            });
        });

        // Wake up on a fixed cadence even without input events, so
        // shutdown is observed within the poll interval.
        ctx.request_repaint_after(SHUTDOWN_POLL);
    }
}
