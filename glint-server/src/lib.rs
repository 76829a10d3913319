//! # glint-server
//!
//! Server binary wiring for the glint screen-region streamer: CLI
//! configuration, the `xcap` capture backend, the axum HTTP/WebSocket
//! transport, and the overlay marker window.

pub mod config;
pub mod grabber;
pub mod http;
pub mod overlay;

pub use config::{CaptureMode, Cli, ServerConfig};
pub use grabber::XcapGrabber;
pub use http::AppState;
