//! Pipeline integration tests: background engine into shared cache,
//! fan-out to streaming sessions, overlay-driven resizing, and the
//! cross-thread shutdown protocol, all against a synthetic grabber.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use glint_core::{
    CachedSource, CaptureEngine, CaptureRegion, CloseReason, ControlMessage, Frame, FrameCache,
    GlintError, MonitorInfo, OnDemandSource, OverlayGeometry, RegionConfig, RegionResolver,
    ScreenGrabber, Shutdown, StreamingSession, ViewerSink, BYTES_PER_PIXEL, OVERLAY_SENTINEL,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Synthetic grabber: one 640×480 monitor, frames filled with a
/// per-grab counter byte. Can be switched to fail on demand.
struct SyntheticGrabber {
    grabs: AtomicUsize,
    failing: AtomicBool,
}

impl SyntheticGrabber {
    fn new() -> Self {
        Self {
            grabs: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    fn fail_from_now_on(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

impl ScreenGrabber for SyntheticGrabber {
    fn monitors(&self) -> Result<Vec<MonitorInfo>, GlintError> {
        Ok(vec![MonitorInfo {
            x: 0,
            y: 0,
            width: 640,
            height: 480,
        }])
    }

    fn grab(&self, region: &CaptureRegion) -> Result<Frame, GlintError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GlintError::CaptureFailure("synthetic failure".into()));
        }
        let n = self.grabs.fetch_add(1, Ordering::SeqCst);
        let len = region.width as usize * region.height as usize * BYTES_PER_PIXEL;
        Frame::new(Bytes::from(vec![n as u8; len]), region.width, region.height)
    }
}

fn fixed_config(width: u32, height: u32) -> RegionConfig {
    RegionConfig {
        monitor: 0,
        top: 0,
        left: 0,
        width: Some(width),
        height: Some(height),
    }
}

fn overlay_config() -> RegionConfig {
    RegionConfig {
        monitor: OVERLAY_SENTINEL,
        top: 0,
        left: 0,
        width: None,
        height: None,
    }
}

/// Poll `cond` until it holds or the deadline passes.
fn wait_for(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Sink collecting protocol events, with a binary-send budget after
/// which it behaves like a disconnected peer.
#[derive(Debug, Clone, PartialEq)]
enum Event {
    Init(u32, u32),
    Error,
    Binary(usize),
    Close(CloseReason),
}

struct CollectingSink {
    events: Arc<Mutex<Vec<Event>>>,
    binary_budget: usize,
}

impl CollectingSink {
    fn new(binary_budget: usize) -> (Self, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: Arc::clone(&events),
                binary_budget,
            },
            events,
        )
    }
}

#[async_trait]
impl ViewerSink for CollectingSink {
    async fn send_text(&mut self, text: String) -> Result<(), GlintError> {
        let event = match serde_json::from_str(&text).unwrap() {
            ControlMessage::Init { width, height } => Event::Init(width, height),
            ControlMessage::Error { .. } => Event::Error,
        };
        self.events.lock().push(event);
        Ok(())
    }

    async fn send_binary(&mut self, payload: Bytes) -> Result<(), GlintError> {
        if self.binary_budget == 0 {
            return Err(GlintError::PeerDisconnected);
        }
        self.binary_budget -= 1;
        self.events.lock().push(Event::Binary(payload.len()));
        Ok(())
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), GlintError> {
        self.events.lock().push(Event::Close(reason));
        Ok(())
    }
}

// ── Background engine ────────────────────────────────────────────

#[test]
fn background_engine_publishes_then_stops_on_shutdown() {
    let grabber = Arc::new(SyntheticGrabber::new());
    let cache = Arc::new(FrameCache::new());
    let shutdown = Shutdown::new();
    let engine = CaptureEngine::new(
        Arc::clone(&grabber) as Arc<dyn ScreenGrabber>,
        RegionResolver::fixed(fixed_config(64, 48)),
        Arc::clone(&cache),
        shutdown.clone(),
        60,
    );
    let handle = engine.spawn().unwrap();

    assert!(
        wait_for(Duration::from_secs(2), || !cache.is_empty()),
        "engine never published a frame"
    );

    let (frame, png) = cache.latest().unwrap();
    assert_eq!(frame.size(), (64, 48));
    assert_eq!(frame.byte_len(), 64 * 48 * BYTES_PER_PIXEL);
    let still = image::load_from_memory(&png).unwrap();
    assert_eq!((still.width(), still.height()), (64, 48));

    shutdown.request("test over");
    assert!(
        wait_for(Duration::from_secs(1), || handle.is_finished()),
        "engine thread did not stop within a capture cycle"
    );
    handle.join().unwrap();
}

#[test]
fn grab_failure_is_fatal_to_background_capture() {
    let grabber = Arc::new(SyntheticGrabber::new());
    grabber.fail_from_now_on();
    let shutdown = Shutdown::new();
    let engine = CaptureEngine::new(
        Arc::clone(&grabber) as Arc<dyn ScreenGrabber>,
        RegionResolver::fixed(fixed_config(8, 8)),
        Arc::new(FrameCache::new()),
        shutdown.clone(),
        60,
    );

    engine.run();
    assert!(shutdown.is_requested(), "grab failure must broadcast shutdown");
}

#[test]
fn invalid_configuration_is_fatal_to_background_capture() {
    let shutdown = Shutdown::new();
    let engine = CaptureEngine::new(
        Arc::new(SyntheticGrabber::new()) as Arc<dyn ScreenGrabber>,
        RegionResolver::fixed(RegionConfig {
            monitor: 5,
            top: 0,
            left: 0,
            width: None,
            height: None,
        }),
        Arc::new(FrameCache::new()),
        shutdown.clone(),
        60,
    );

    engine.run();
    assert!(shutdown.is_requested());
}

#[test]
fn overlay_gates_capture_until_first_geometry() {
    let cache = Arc::new(FrameCache::new());
    let overlay = Arc::new(OverlayGeometry::new());
    let shutdown = Shutdown::new();
    let engine = CaptureEngine::new(
        Arc::new(SyntheticGrabber::new()) as Arc<dyn ScreenGrabber>,
        RegionResolver::overlay(overlay_config(), Arc::clone(&overlay)),
        Arc::clone(&cache),
        shutdown.clone(),
        60,
    );
    let handle = engine.spawn().unwrap();

    // No geometry yet, nothing may be captured.
    std::thread::sleep(Duration::from_millis(100));
    assert!(cache.is_empty(), "captured before overlay was ready");

    overlay.set(CaptureRegion {
        top: 10,
        left: 20,
        width: 80,
        height: 60,
    });
    assert!(wait_for(Duration::from_secs(2), || !cache.is_empty()));
    assert_eq!(cache.latest_frame().unwrap().size(), (80, 60));

    // Dragging/resizing the overlay shows up in subsequent frames.
    overlay.set(CaptureRegion {
        top: 10,
        left: 20,
        width: 40,
        height: 30,
    });
    assert!(wait_for(Duration::from_secs(2), || {
        cache
            .latest_frame()
            .is_some_and(|f| f.size() == (40, 30))
    }));

    shutdown.request("test over");
    assert!(wait_for(Duration::from_secs(1), || handle.is_finished()));
    handle.join().unwrap();
}

// ── Sessions over the shared cache ───────────────────────────────

#[tokio::test]
async fn session_streams_frames_from_the_cache() {
    let cache = Arc::new(FrameCache::new());
    let pixels = vec![9u8; 16 * 8 * BYTES_PER_PIXEL];
    cache.publish(
        Frame::new(Bytes::from(pixels), 16, 8).unwrap(),
        Bytes::new(),
    );

    let (sink, events) = CollectingSink::new(3);
    let mut session = StreamingSession::new(
        sink,
        CachedSource::new(Arc::clone(&cache)),
        Shutdown::new(),
        500,
    );
    session.run().await.unwrap();

    let events = events.lock();
    assert_eq!(events[0], Event::Init(16, 8));
    assert!(events[1..]
        .iter()
        .all(|e| *e == Event::Binary(16 * 8 * BYTES_PER_PIXEL)));
}

#[tokio::test]
async fn shutdown_closes_every_session_within_a_tick() {
    let cache = Arc::new(FrameCache::new());
    let pixels = vec![0u8; 4 * 4 * BYTES_PER_PIXEL];
    cache.publish(
        Frame::new(Bytes::from(pixels), 4, 4).unwrap(),
        Bytes::new(),
    );
    let shutdown = Shutdown::new();

    let mut handles = Vec::new();
    let mut event_logs = Vec::new();
    for _ in 0..3 {
        let (sink, events) = CollectingSink::new(usize::MAX);
        event_logs.push(events);
        let mut session = StreamingSession::new(
            sink,
            CachedSource::new(Arc::clone(&cache)),
            shutdown.clone(),
            50,
        );
        handles.push(tokio::spawn(async move { session.run().await }));
    }

    tokio::time::sleep(Duration::from_millis(60)).await;
    shutdown.request("test over");

    for handle in handles {
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("session ignored shutdown")
            .unwrap()
            .unwrap();
    }
    for events in event_logs {
        let events = events.lock();
        assert_eq!(
            events.last(),
            Some(&Event::Close(CloseReason::ServerShutdown))
        );
    }
}

// ── On-demand mode with a live overlay ───────────────────────────

#[tokio::test]
async fn overlay_resize_reinits_an_on_demand_session() {
    let grabber = Arc::new(SyntheticGrabber::new());
    let overlay = Arc::new(OverlayGeometry::new());
    overlay.set(CaptureRegion {
        top: 0,
        left: 0,
        width: 8,
        height: 8,
    });

    let source = OnDemandSource::new(
        RegionResolver::overlay(overlay_config(), Arc::clone(&overlay)),
        Arc::clone(&grabber) as Arc<dyn ScreenGrabber>,
    );
    let (sink, events) = CollectingSink::new(20);
    let mut session = StreamingSession::new(sink, source, Shutdown::new(), 100);

    let resize = tokio::spawn({
        let overlay = Arc::clone(&overlay);
        async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            overlay.set(CaptureRegion {
                top: 0,
                left: 0,
                width: 4,
                height: 2,
            });
        }
    });

    session.run().await.unwrap();
    resize.await.unwrap();

    let events = events.lock();
    assert_eq!(events[0], Event::Init(8, 8));
    let reinit_at = events
        .iter()
        .position(|e| *e == Event::Init(4, 2))
        .expect("resize never announced");
    let old = 8 * 8 * BYTES_PER_PIXEL;
    assert!(
        events[reinit_at..].iter().all(|e| *e != Event::Binary(old)),
        "old-size payload sent after re-init"
    );
}
