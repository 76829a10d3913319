//! glint-server entry point.
//!
//! ```text
//! glint-server                          Stream monitor 0, on-demand capture
//! glint-server --monitor 1 --fps 30    Stream another monitor at 30 fps
//! glint-server --monitor -1            Draggable overlay window picks the region
//! glint-server --background            Capture continuously; /snapshot.png
//!                                      works without a connected viewer
//! ```
//!
//! Thread layout: the transport server runs inside a tokio runtime,
//! on the main thread normally, on a worker thread in overlay mode
//! (the UI event loop must own the main thread). Background capture,
//! when enabled, is one dedicated OS thread. All of them observe the
//! shared shutdown flag within one of their own ticks.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use glint_core::{
    CaptureEngine, FrameCache, GlintError, OverlayGeometry, RegionResolver, ScreenGrabber,
    Shutdown,
};
use glint_server::config::{CaptureMode, Cli, ServerConfig};
use glint_server::grabber::XcapGrabber;
use glint_server::http::AppState;
use glint_server::{http, overlay};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from(Cli::parse());

    // Init tracing.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("glint-server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        monitor = config.region.monitor,
        top = config.region.top,
        left = config.region.left,
        width = ?config.region.width,
        height = ?config.region.height,
        fps = config.target_fps,
        addr = %config.addr,
        "configuration"
    );
    if config.mode == CaptureMode::Background {
        info!("background capture enabled");
    }
    if config.overlay_mode() {
        info!("monitor -1 uses a draggable overlay window");
    }

    let shutdown = Shutdown::new();
    let grabber: Arc<dyn ScreenGrabber> = Arc::new(XcapGrabber::new());
    let cache = Arc::new(FrameCache::new());

    let overlay_geometry = config
        .overlay_mode()
        .then(|| Arc::new(OverlayGeometry::new()));
    let resolver = match &overlay_geometry {
        Some(geometry) => RegionResolver::overlay(config.region.clone(), Arc::clone(geometry)),
        None => RegionResolver::fixed(config.region.clone()),
    };

    let engine = (config.mode == CaptureMode::Background).then(|| {
        CaptureEngine::new(
            Arc::clone(&grabber),
            resolver.clone(),
            Arc::clone(&cache),
            shutdown.clone(),
            config.target_fps,
        )
    });
    let engine_handle = match engine {
        Some(engine) => Some(engine.spawn()?),
        None => None,
    };

    let state = AppState {
        mode: config.mode,
        target_fps: config.target_fps,
        cache,
        resolver,
        grabber,
        shutdown: shutdown.clone(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match overlay_geometry {
        Some(geometry) => {
            // The UI event loop owns the main thread; the transport
            // server moves to a worker thread.
            let server = thread::Builder::new().name("server".into()).spawn({
                let shutdown = shutdown.clone();
                let addr = config.addr;
                move || {
                    if let Err(e) = runtime.block_on(run_server(state, addr, shutdown)) {
                        error!(error = %e, "server error");
                    }
                }
            })?;

            overlay::run(geometry, shutdown.clone())?;
            join_with_deadline(server, Duration::from_secs(2));
        }
        None => {
            if let Err(e) = runtime.block_on(run_server(state, config.addr, shutdown.clone())) {
                error!(error = %e, "server error");
            }
        }
    }

    shutdown.request("server exited");
    if let Some(handle) = engine_handle {
        join_with_deadline(handle, Duration::from_secs(2));
    }
    info!("server stopped");
    Ok(())
}

/// Serve HTTP until shutdown, with OS signal handlers installed so
/// Ctrl-C / SIGTERM always request shutdown, even while sessions are
/// mid-stream.
async fn run_server(
    state: AppState,
    addr: std::net::SocketAddr,
    shutdown: Shutdown,
) -> Result<(), GlintError> {
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    shutdown.request("Ctrl-C received");
                }
                _ = terminate_signal() => {
                    shutdown.request("termination signal received");
                }
            }
        }
    });

    let result = http::serve(state, addr).await;
    // The transport exiting for any reason is itself a shutdown source.
    shutdown.request("transport server exited");
    result
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(_) => std::future::pending().await,
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending().await
}

/// Bounded join: never block shutdown behind a thread stuck in a
/// long capture or I/O call.
fn join_with_deadline(handle: thread::JoinHandle<()>, deadline: Duration) {
    let start = Instant::now();
    while !handle.is_finished() {
        if start.elapsed() > deadline {
            warn!(
                thread = handle.thread().name().unwrap_or("?"),
                "thread did not stop in time, abandoning join"
            );
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    let _ = handle.join();
}
