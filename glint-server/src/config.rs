//! CLI and runtime configuration for the server binary.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;
use glint_core::RegionConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "glint-server",
    about = "Local screen-region WebSocket streamer (raw RGBA + WebGL client)"
)]
pub struct Cli {
    /// Monitor index (0-based). -1 opens a draggable overlay window
    /// that defines the capture rectangle.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub monitor: i32,

    /// Top offset relative to the chosen monitor.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub top: i32,

    /// Left offset relative to the chosen monitor.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub left: i32,

    /// Capture width. If not set, uses monitor width - left.
    #[arg(long)]
    pub width: Option<u32>,

    /// Capture height. If not set, uses monitor height - top.
    #[arg(long)]
    pub height: Option<u32>,

    /// HTTP server host.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// HTTP server port.
    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    /// Target frames per second.
    #[arg(long, default_value_t = 15)]
    pub fps: u32,

    /// Capture continuously in the background so /snapshot.png works
    /// without a connected client.
    #[arg(long)]
    pub background: bool,
}

// ── ServerConfig ─────────────────────────────────────────────────

/// How frames are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Capture once per pacing tick of each connected session.
    OnDemand,
    /// A dedicated thread captures continuously into the shared cache.
    Background,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub target_fps: u32,
    pub mode: CaptureMode,
    pub region: RegionConfig,
}

impl ServerConfig {
    pub fn overlay_mode(&self) -> bool {
        self.region.overlay_mode()
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            addr: SocketAddr::new(cli.host, cli.port),
            target_fps: cli.fps.max(1),
            mode: if cli.background {
                CaptureMode::Background
            } else {
                CaptureMode::OnDemand
            },
            region: RegionConfig {
                monitor: cli.monitor,
                top: cli.top,
                left: cli.left,
                width: cli.width,
                height: cli.height,
            },
        }
    }
}
