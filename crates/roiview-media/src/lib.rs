//! Media I/O for RoiView: capture sources, file probing, recording,
//! and still-image snapshots, all through FFmpeg subprocesses.

pub mod capture;
pub mod probe;
pub mod recorder;
pub mod snapshot;

pub use capture::{
    CaptureController, DeviceSource, FileSource, ReadOutcome, TestPatternSource, VideoSource,
    SUPPORTED_EXTENSIONS,
};
pub use probe::{probe_file, VideoMeta};
pub use recorder::Recorder;
