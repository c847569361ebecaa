//! Playback engine: the frame loop, its session state machine, and the
//! command surface the application drives.

pub mod cancel;
pub mod frame_loop;
pub mod player;
pub mod state;

pub use cancel::CancelToken;
pub use frame_loop::{FrameLoop, LoopControl};
pub use player::Player;
pub use state::{ErrorSink, Metrics, PlaybackState, PlayerEvent, SessionShared};
