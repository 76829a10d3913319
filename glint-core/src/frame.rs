//! Frame representation and the shared single-slot frame cache.
//!
//! A [`Frame`] is immutable once produced: raw RGBA pixels plus the
//! dimensions that describe them and a capture timestamp. The
//! [`FrameCache`] is a last-writer-wins register holding at most one
//! live frame together with its PNG still, never a queue. Staleness
//! is bounded by the capture interval, not by backlog.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use image::{ImageFormat, RgbaImage};
use parking_lot::Mutex;

use crate::error::GlintError;

/// Bytes per pixel in the canonical red-green-blue-alpha layout.
pub const BYTES_PER_PIXEL: usize = 4;

// ── Frame ────────────────────────────────────────────────────────

/// One captured frame: raw RGBA bytes, row-major, no padding.
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: Bytes,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Monotonic capture timestamp.
    pub captured_at: Instant,
}

impl Frame {
    /// Build a frame, enforcing `pixels.len() == width * height * 4`.
    pub fn new(pixels: Bytes, width: u32, height: u32) -> Result<Self, GlintError> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(GlintError::FrameGeometry {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            width,
            height,
            captured_at: Instant::now(),
        })
    }

    /// Raw RGBA payload. `Bytes` makes the fan-out clone cheap.
    pub fn pixels(&self) -> Bytes {
        self.pixels.clone()
    }

    /// `(width, height)` pair.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Total payload size in bytes.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// PNG-encode a frame for the still-image endpoint.
pub fn encode_png(frame: &Frame) -> Result<Bytes, GlintError> {
    let img = RgbaImage::from_raw(frame.width, frame.height, frame.pixels.to_vec())
        .ok_or_else(|| GlintError::Encoding("pixel buffer shorter than dimensions".into()))?;

    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(Bytes::from(out))
}

// ── FrameCache ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CachedFrame {
    frame: Arc<Frame>,
    png: Bytes,
}

/// The single most-recent published frame plus its PNG still.
///
/// One writer (the background capture engine), many readers
/// (streaming sessions, the snapshot endpoint). The mutex is held
/// only for the swap or the reference copy, never across I/O.
#[derive(Debug, Default)]
pub struct FrameCache {
    slot: Mutex<Option<CachedFrame>>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the cached frame/still pair. A reader never
    /// observes a frame paired with another frame's still.
    pub fn publish(&self, frame: Frame, png: Bytes) {
        let entry = CachedFrame {
            frame: Arc::new(frame),
            png,
        };
        *self.slot.lock() = Some(entry);
    }

    /// Most recently published pair, or `None` before the first publish.
    pub fn latest(&self) -> Option<(Arc<Frame>, Bytes)> {
        self.slot
            .lock()
            .as_ref()
            .map(|e| (Arc::clone(&e.frame), e.png.clone()))
    }

    /// Most recently published frame.
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.slot.lock().as_ref().map(|e| Arc::clone(&e.frame))
    }

    /// Most recently published PNG still.
    pub fn latest_png(&self) -> Option<Bytes> {
        self.slot.lock().as_ref().map(|e| e.png.clone())
    }

    /// Whether nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}
