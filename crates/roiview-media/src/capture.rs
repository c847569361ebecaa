//! Video sources and the capture controller.
//!
//! Decoding runs through an FFmpeg subprocess (ffmpeg-sidecar), frames
//! arrive as packed rgb24. A [`VideoSource`] is owned by exactly one
//! thread; the controller adds position tracking on top.

use crate::probe::{probe_file, VideoMeta};
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;
use ffmpeg_sidecar::iter::FfmpegIterator;
use roiview_core::{FrameBuffer, PixelFormat, Result, RoiViewError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File extensions the open dialog and CLI accept.
pub const SUPPORTED_EXTENSIONS: [&str; 9] = [
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "mpg", "mpeg",
];

/// Result of one source read.
pub enum ReadOutcome {
    Frame(FrameBuffer),
    EndOfStream,
}

/// A stream of decoded RGB frames.
pub trait VideoSource: Send {
    /// Pull the next frame. Errors are per-read; the caller decides
    /// whether they are transient.
    fn read(&mut self) -> Result<ReadOutcome>;

    /// Jump to a zero-based frame index. Only meaningful when
    /// [`is_seekable`](Self::is_seekable) is true.
    fn seek(&mut self, frame_index: u64) -> Result<()>;

    fn is_seekable(&self) -> bool;

    /// Total frame count, when known. Live sources report `None`.
    fn total_frames(&self) -> Option<u64>;

    fn dimensions(&self) -> (u32, u32);

    fn fps(&self) -> f64;
}

/// Case-insensitive extension allowlist check.
pub fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

fn convert_frame(frame: ffmpeg_sidecar::event::OutputVideoFrame) -> Result<FrameBuffer> {
    FrameBuffer::from_data(frame.width, frame.height, PixelFormat::Rgb8, frame.data).ok_or_else(
        || {
            RoiViewError::Decode(format!(
                "decoder produced a malformed {}x{} frame",
                frame.width, frame.height
            ))
        },
    )
}

/// Drain decoder events until a frame, end of stream, or error.
fn next_frame(iter: &mut FfmpegIterator) -> Result<ReadOutcome> {
    for event in iter.by_ref() {
        match event {
            FfmpegEvent::OutputFrame(frame) => return Ok(ReadOutcome::Frame(convert_frame(frame)?)),
            FfmpegEvent::Error(e) => return Err(RoiViewError::Decode(e)),
            _ => {}
        }
    }
    Ok(ReadOutcome::EndOfStream)
}

// ── File source ─────────────────────────────────────────────────

/// Seekable decoder for a video file.
pub struct FileSource {
    path: PathBuf,
    meta: VideoMeta,
    child: ffmpeg_sidecar::child::FfmpegChild,
    iter: FfmpegIterator,
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("path", &self.path)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl FileSource {
    /// Probe and open a file. Rejects extensions outside the allowlist
    /// before touching FFmpeg.
    pub fn open(path: &Path) -> Result<Self> {
        if !is_supported_file(path) {
            return Err(RoiViewError::UnsupportedFormat(format!(
                "{}: supported formats are {}",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            )));
        }
        let meta = probe_file(path)?;
        info!(
            path = %path.display(),
            width = meta.width,
            height = meta.height,
            fps = meta.fps,
            frames = meta.frame_count,
            "opened video file"
        );

        let (child, iter) = Self::spawn_decoder(path, None)?;
        Ok(Self {
            path: path.to_path_buf(),
            meta,
            child,
            iter,
        })
    }

    fn spawn_decoder(
        path: &Path,
        seek_seconds: Option<f64>,
    ) -> Result<(ffmpeg_sidecar::child::FfmpegChild, FfmpegIterator)> {
        let mut cmd = FfmpegCommand::new();
        cmd.hide_banner();
        if let Some(seconds) = seek_seconds {
            // Input-side seek: fast keyframe jump, then accurate decode.
            cmd.seek(&format!("{seconds:.3}"));
        }
        let input = path.to_string_lossy().into_owned();
        cmd.input(input.as_str()).no_audio().rawvideo();

        let mut child = cmd
            .spawn()
            .map_err(|e| RoiViewError::SourceUnavailable(format!("failed to spawn ffmpeg: {e}")))?;
        let iter = child
            .iter()
            .map_err(|e| RoiViewError::Decode(format!("failed to read decoder output: {e}")))?;
        Ok((child, iter))
    }

    fn shutdown(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl VideoSource for FileSource {
    fn read(&mut self) -> Result<ReadOutcome> {
        next_frame(&mut self.iter)
    }

    fn seek(&mut self, frame_index: u64) -> Result<()> {
        let seconds = frame_index as f64 / self.meta.fps.max(1.0);
        debug!(frame_index, seconds, "seeking file source");

        self.shutdown();
        let (child, iter) = Self::spawn_decoder(&self.path, Some(seconds))?;
        self.child = child;
        self.iter = iter;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn total_frames(&self) -> Option<u64> {
        self.meta.frame_count
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.meta.width, self.meta.height)
    }

    fn fps(&self) -> f64 {
        self.meta.fps
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Device source ───────────────────────────────────────────────

/// Live capture device (webcam) via FFmpeg's platform capture input.
pub struct DeviceSource {
    index: u32,
    width: u32,
    height: u32,
    fps: f64,
    child: ffmpeg_sidecar::child::FfmpegChild,
    iter: FfmpegIterator,
}

#[cfg(target_os = "linux")]
fn device_input(index: u32) -> (&'static str, String) {
    ("v4l2", format!("/dev/video{index}"))
}

#[cfg(target_os = "macos")]
fn device_input(index: u32) -> (&'static str, String) {
    ("avfoundation", format!("{index}"))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn device_input(index: u32) -> (&'static str, String) {
    ("dshow", format!("video={index}"))
}

impl DeviceSource {
    /// Open device `index` and verify it is actually delivering frames.
    ///
    /// A device that cannot be opened and a device that opens but never
    /// produces a frame get distinct errors, so the UI message can tell
    /// a missing camera from a wedged one.
    pub fn open(index: u32) -> Result<Self> {
        let (format, input) = device_input(index);
        let mut child = FfmpegCommand::new()
            .hide_banner()
            .format(format)
            .input(input.as_str())
            .no_audio()
            .rawvideo()
            .spawn()
            .map_err(|e| {
                RoiViewError::SourceUnavailable(format!("cannot open camera {index}: {e}"))
            })?;
        let mut iter = child.iter().map_err(|e| {
            RoiViewError::SourceUnavailable(format!("cannot open camera {index}: {e}"))
        })?;

        // Liveness probe: one throwaway frame.
        match next_frame(&mut iter) {
            Ok(ReadOutcome::Frame(first)) => {
                info!(
                    index,
                    width = first.width,
                    height = first.height,
                    "camera delivering frames"
                );
                Ok(Self {
                    index,
                    width: first.width,
                    height: first.height,
                    fps: 30.0,
                    child,
                    iter,
                })
            }
            Ok(ReadOutcome::EndOfStream) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(RoiViewError::SourceUnavailable(format!(
                    "camera {index} opened but is not delivering frames"
                )))
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(RoiViewError::SourceUnavailable(format!(
                    "camera {index} opened but failed on first read: {e}"
                )))
            }
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl VideoSource for DeviceSource {
    fn read(&mut self) -> Result<ReadOutcome> {
        next_frame(&mut self.iter)
    }

    fn seek(&mut self, _frame_index: u64) -> Result<()> {
        Err(RoiViewError::InvalidParameter(
            "live sources cannot seek".into(),
        ))
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn total_frames(&self) -> Option<u64> {
        None
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

// ── Test pattern source ─────────────────────────────────────────

/// Synthetic source for tests and `--demo` mode.
///
/// Frames are color bars with a moving band so motion is visible.
/// Reads can be scripted to fail at specific indices (transient) or
/// from an index onward (persistent), which is how the error-threshold
/// behavior gets exercised without a real camera.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    fps: f64,
    total_frames: Option<u64>,
    position: u64,
    fail_on: Vec<u64>,
    fail_from: Option<u64>,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            total_frames: None,
            position: 0,
            fail_on: Vec::new(),
            fail_from: None,
        }
    }

    /// Finite (and therefore seekable) source.
    pub fn with_total_frames(mut self, total: u64) -> Self {
        self.total_frames = Some(total);
        self
    }

    /// Fail the reads at exactly these frame indices.
    pub fn with_failures_at(mut self, indices: &[u64]) -> Self {
        self.fail_on = indices.to_vec();
        self
    }

    /// Fail every read at or past `index`.
    pub fn with_failures_from(mut self, index: u64) -> Self {
        self.fail_from = Some(index);
        self
    }
}

impl VideoSource for TestPatternSource {
    fn read(&mut self) -> Result<ReadOutcome> {
        if let Some(total) = self.total_frames {
            if self.position >= total {
                return Ok(ReadOutcome::EndOfStream);
            }
        }
        let index = self.position;
        if self.fail_on.contains(&index) || self.fail_from.is_some_and(|from| index >= from) {
            self.position += 1;
            return Err(RoiViewError::Decode(format!(
                "scripted failure at frame {index}"
            )));
        }

        let mut frame = FrameBuffer::test_pattern(self.width, self.height);
        // Moving horizontal band, one row per frame.
        let band = (index % self.height.max(1) as u64) as u32;
        frame.row_mut(band).fill(255);

        self.position += 1;
        Ok(ReadOutcome::Frame(frame))
    }

    fn seek(&mut self, frame_index: u64) -> Result<()> {
        if self.total_frames.is_none() {
            return Err(RoiViewError::InvalidParameter(
                "live sources cannot seek".into(),
            ));
        }
        self.position = frame_index;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        self.total_frames.is_some()
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

// ── Capture controller ──────────────────────────────────────────

/// Owns the active source and tracks playback position.
///
/// Position updates are suppressed while a scrub gesture is in
/// progress so the slider does not fight the decoder.
pub struct CaptureController {
    source: Option<Box<dyn VideoSource>>,
    position: u64,
    scrubbing: bool,
}

impl CaptureController {
    pub fn from_source(source: Box<dyn VideoSource>) -> Self {
        Self {
            source: Some(source),
            position: 0,
            scrubbing: false,
        }
    }

    pub fn open_file(path: &Path) -> Result<Self> {
        Ok(Self::from_source(Box::new(FileSource::open(path)?)))
    }

    pub fn open_device(index: u32) -> Result<Self> {
        Ok(Self::from_source(Box::new(DeviceSource::open(index)?)))
    }

    fn source_mut(&mut self) -> Result<&mut Box<dyn VideoSource>> {
        self.source
            .as_mut()
            .ok_or_else(|| RoiViewError::SourceUnavailable("capture already released".into()))
    }

    pub fn read(&mut self) -> Result<ReadOutcome> {
        let outcome = self.source_mut()?.read()?;
        if matches!(outcome, ReadOutcome::Frame(_)) {
            self.position += 1;
        }
        Ok(outcome)
    }

    /// Seek to a clamped frame index. Live sources reject this.
    pub fn seek(&mut self, frame_index: u64) -> Result<()> {
        let total = {
            let source = self.source_mut()?;
            if !source.is_seekable() {
                return Err(RoiViewError::InvalidParameter(
                    "source is not seekable".into(),
                ));
            }
            source.total_frames()
        };
        let target = match total {
            Some(total) if total > 0 => frame_index.min(total - 1),
            _ => frame_index,
        };
        self.source_mut()?.seek(target)?;
        self.position = target;
        Ok(())
    }

    pub fn is_seekable(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.is_seekable())
    }

    pub fn total_frames(&self) -> Option<u64> {
        self.source.as_ref().and_then(|s| s.total_frames())
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.source.as_ref().map(|s| s.dimensions())
    }

    pub fn fps(&self) -> Option<f64> {
        self.source.as_ref().map(|s| s.fps())
    }

    /// Current zero-based position, frozen during scrubs.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn begin_scrub(&mut self) {
        self.scrubbing = true;
    }

    pub fn end_scrub(&mut self) {
        self.scrubbing = false;
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing
    }

    /// Drop the source, terminating any decoder subprocess.
    pub fn release(&mut self) {
        if self.source.take().is_some() {
            debug!("capture released");
        }
        self.position = 0;
        self.scrubbing = false;
    }

    pub fn is_released(&self) -> bool {
        self.source.is_none()
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if self.source.is_some() {
            warn!("capture controller dropped without release");
        }
    }
}
