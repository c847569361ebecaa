//! Playback state, published events, and the error sink.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use roiview_core::FrameBuffer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// How long a surfaced error stays up before clearing itself.
const ERROR_DISPLAY_DURATION: Duration = Duration::from_secs(10);

/// Session lifecycle. `Idle` is both the initial and the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
    Stopping,
}

/// Rolling throughput numbers, recomputed once per second of wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics {
    pub fps: f64,
    /// Latency of the most recent frame through the effect pipeline.
    pub processing_ms: f64,
}

/// Everything the consuming side can observe. Frames are immutable
/// snapshots; errors always arrive as records, never as panics.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Frame(Arc<FrameBuffer>),
    Status(String),
    Metrics(Metrics),
    Position { current: u64, total: Option<u64> },
    Error { message: String },
    ErrorCleared,
    Recording(bool),
    StateChanged(PlaybackState),
}

/// State shared between the command surface and the frame loop.
#[derive(Debug, Default)]
pub struct SessionShared {
    pub state: Mutex<PlaybackState>,
    pub paused: AtomicBool,
    pub recording: AtomicBool,
    pub position: AtomicU64,
}

impl SessionShared {
    pub fn set_state(&self, state: PlaybackState) {
        *self.state.lock() = state;
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock()
    }
}

/// Publishes error records and auto-clears them after a fixed delay,
/// unless a newer error superseded them in the meantime.
#[derive(Clone)]
pub struct ErrorSink {
    events: Sender<PlayerEvent>,
    generation: Arc<AtomicU64>,
}

impl ErrorSink {
    pub fn new(events: Sender<PlayerEvent>) -> Self {
        Self {
            events,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Surface an error and schedule its auto-clear.
    pub fn publish(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "player error surfaced");
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.events.send(PlayerEvent::Error {
            message: message.clone(),
        });

        let events = self.events.clone();
        let counter = Arc::clone(&self.generation);
        std::thread::spawn(move || {
            std::thread::sleep(ERROR_DISPLAY_DURATION);
            // Only clear if no newer error replaced this one.
            if counter.load(Ordering::SeqCst) == generation {
                let _ = events.send(PlayerEvent::ErrorCleared);
            }
        });
    }

    /// Clear immediately and invalidate any pending auto-clear.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.events.send(PlayerEvent::ErrorCleared);
    }
}
