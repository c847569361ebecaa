//! The per-session frame loop.
//!
//! Runs on a dedicated thread, owns the capture controller, and is the
//! only place frames are decoded, processed, and published. The command
//! surface talks to it exclusively through the control channel.

use crate::cancel::CancelToken;
use crate::state::{ErrorSink, PlaybackState, PlayerEvent, Metrics, SessionShared};
use crossbeam_channel::{Receiver, Sender};
use roiview_core::{BufferPool, DisplayMapper, FrameBuffer, SharedRoi};
use roiview_effects::{EffectConfig, EffectEngine, EffectKind, EffectParam};
use roiview_media::{snapshot, CaptureController, ReadOutcome, Recorder};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Read failures tolerated in a row before the session is torn down.
const MAX_CONSECUTIVE_ERRORS: u32 = 5;
/// Delay before retrying a failed read.
const ERROR_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Wall-time window for the rolling FPS number.
const FPS_WINDOW: Duration = Duration::from_millis(1000);

/// Messages into the loop. Drained every iteration, paused or not.
#[derive(Debug)]
pub enum LoopControl {
    PlayPause,
    SetEffect(EffectKind),
    SetParam(EffectParam),
    ReplaceConfig(EffectConfig),
    SetRenderSize(u32, u32),
    Seek(u64),
    /// Step one frame back (-1) or forward (+1) while paused.
    Step(i64),
    BeginScrub,
    EndScrub,
    StartRecording(PathBuf),
    StopRecording,
    Screenshot(PathBuf),
}

pub struct FrameLoop {
    controller: CaptureController,
    pool: Arc<BufferPool>,
    roi: SharedRoi,
    mapper: DisplayMapper,
    config: EffectConfig,
    events: Sender<PlayerEvent>,
    control: Receiver<LoopControl>,
    cancel: CancelToken,
    shared: Arc<SessionShared>,
    errors: ErrorSink,
    recorder: Option<Recorder>,
    live: bool,
    render_size: (u32, u32),
    /// Most recent raw frame, replaced atomically (install then drop).
    current: Arc<FrameBuffer>,
    /// Most recent post-effect frame, used for snapshots and recording.
    displayed: Arc<FrameBuffer>,
}

impl FrameLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        controller: CaptureController,
        pool: Arc<BufferPool>,
        roi: SharedRoi,
        config: EffectConfig,
        events: Sender<PlayerEvent>,
        control: Receiver<LoopControl>,
        cancel: CancelToken,
        shared: Arc<SessionShared>,
        errors: ErrorSink,
        live: bool,
        render_size: (u32, u32),
    ) -> Self {
        Self {
            controller,
            pool,
            roi,
            mapper: DisplayMapper::default(),
            config,
            events,
            control,
            cancel,
            shared,
            errors,
            recorder: None,
            live,
            render_size,
            current: Arc::new(FrameBuffer::empty()),
            displayed: Arc::new(FrameBuffer::empty()),
        }
    }

    /// Drive the session until cancellation, end of stream, or a fatal
    /// error streak. Always tears down capture and recording on exit.
    pub fn run(mut self) {
        info!(live = self.live, "frame loop started");
        let mut consecutive_errors = 0u32;
        let mut window_start = Instant::now();
        let mut window_frames = 0u32;

        loop {
            self.drain_control();
            if self.cancel.is_cancelled() {
                break;
            }
            if self.shared.paused.load(Ordering::Relaxed) {
                self.cancel.sleep(Duration::from_millis(10));
                continue;
            }

            match self.controller.read() {
                Ok(ReadOutcome::Frame(frame)) => {
                    consecutive_errors = 0;
                    let started = Instant::now();
                    if let Err(e) = self.process_and_publish(frame) {
                        self.errors.publish(e.to_string());
                    }
                    let processing_ms = started.elapsed().as_secs_f64() * 1000.0;

                    window_frames += 1;
                    let elapsed = window_start.elapsed();
                    if elapsed >= FPS_WINDOW {
                        let fps = window_frames as f64 / elapsed.as_secs_f64();
                        let _ = self.events.send(PlayerEvent::Metrics(Metrics {
                            fps,
                            processing_ms,
                        }));
                        window_start = Instant::now();
                        window_frames = 0;
                    }
                }
                Ok(ReadOutcome::EndOfStream) => {
                    if self.live {
                        self.errors
                            .publish("live source stopped delivering frames");
                    } else {
                        let _ = self
                            .events
                            .send(PlayerEvent::Status("end of video".into()));
                    }
                    break;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(
                        error = %e,
                        consecutive = consecutive_errors,
                        "frame read failed"
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        self.errors.publish(format!(
                            "playback stopped after {MAX_CONSECUTIVE_ERRORS} consecutive read failures: {e}"
                        ));
                        break;
                    }
                    if !self.cancel.sleep(ERROR_RETRY_DELAY) {
                        break;
                    }
                    continue;
                }
            }

            // Fixed-interval pacing; no catch-up when a frame ran long.
            let pace = Duration::from_millis((1000 / u64::from(self.config.target_fps())).max(1));
            if !self.cancel.sleep(pace) {
                break;
            }
        }

        self.teardown();
    }

    fn drain_control(&mut self) {
        while let Ok(message) = self.control.try_recv() {
            match message {
                LoopControl::PlayPause => {
                    let paused = !self.shared.paused.load(Ordering::Relaxed);
                    self.shared.paused.store(paused, Ordering::Relaxed);
                    let state = if paused {
                        PlaybackState::Paused
                    } else {
                        PlaybackState::Playing
                    };
                    self.shared.set_state(state);
                    let _ = self.events.send(PlayerEvent::StateChanged(state));
                }
                LoopControl::SetEffect(kind) => self.config.set_kind(kind),
                LoopControl::SetParam(param) => self.config.set_param(param),
                LoopControl::ReplaceConfig(config) => self.config = config,
                LoopControl::SetRenderSize(w, h) => {
                    self.render_size = (w, h);
                    self.mapper.invalidate();
                }
                LoopControl::Seek(index) => self.handle_seek(index),
                LoopControl::Step(delta) => {
                    // Position points one past the displayed frame.
                    let position = self.controller.position();
                    let target = if delta < 0 {
                        position.saturating_sub(2)
                    } else {
                        position
                    };
                    self.handle_seek(target);
                }
                LoopControl::BeginScrub => self.controller.begin_scrub(),
                LoopControl::EndScrub => self.controller.end_scrub(),
                LoopControl::StartRecording(path) => self.start_recording(path),
                LoopControl::StopRecording => self.stop_recording(),
                LoopControl::Screenshot(path) => self.handle_screenshot(path),
            }
        }
    }

    /// Install the raw frame, run the effect pipeline, publish, record.
    fn process_and_publish(&mut self, frame: FrameBuffer) -> roiview_core::Result<()> {
        // New frame installed before the previous Arc is dropped.
        self.current = Arc::new(frame);
        let mut display = (*self.current).clone();

        // Hold the ROI mutex only for the copy.
        let roi = *self.roi.lock();
        if roi.is_defined() {
            let (render_w, render_h) = self.render_size;
            if let Some(rect) = self.mapper.map_to_source(
                roi.rect(),
                display.width,
                display.height,
                f64::from(render_w),
                f64::from(render_h),
            ) {
                EffectEngine::apply(&mut display, rect, &self.config, &self.pool)?;
            }
        }

        let display = Arc::new(display);
        self.displayed = Arc::clone(&display);
        let _ = self.events.send(PlayerEvent::Frame(Arc::clone(&display)));

        let write_error = match self.recorder.as_mut() {
            Some(recorder) => recorder.write(&display).err(),
            None => None,
        };
        if let Some(e) = write_error {
            // A broken sink stops the recording, never the playback.
            self.errors.publish(format!("recording failed: {e}"));
            self.abandon_recording();
        }

        if !self.controller.is_scrubbing() {
            let current = self.controller.position();
            self.shared.position.store(current, Ordering::Relaxed);
            let _ = self.events.send(PlayerEvent::Position {
                current,
                total: self.controller.total_frames(),
            });
        }
        Ok(())
    }

    /// Seek, then synchronously decode and republish one frame so a
    /// paused view updates immediately.
    fn handle_seek(&mut self, index: u64) {
        if let Err(e) = self.controller.seek(index) {
            self.errors.publish(e.to_string());
            return;
        }
        match self.controller.read() {
            Ok(ReadOutcome::Frame(frame)) => {
                if let Err(e) = self.process_and_publish(frame) {
                    self.errors.publish(e.to_string());
                }
            }
            Ok(ReadOutcome::EndOfStream) => {}
            Err(e) => self.errors.publish(e.to_string()),
        }
    }

    fn start_recording(&mut self, path: PathBuf) {
        if self.recorder.is_some() {
            return;
        }
        let Some((width, height)) = self.controller.dimensions() else {
            self.errors.publish("cannot record without an active source");
            return;
        };
        match Recorder::start(&path, f64::from(self.config.target_fps()), width, height) {
            Ok(recorder) => {
                self.recorder = Some(recorder);
                self.shared.recording.store(true, Ordering::Relaxed);
                let _ = self.events.send(PlayerEvent::Recording(true));
                let _ = self.events.send(PlayerEvent::Status(format!(
                    "recording to {}",
                    path.display()
                )));
            }
            Err(e) => {
                // Open failure leaves recording off; playback continues.
                self.errors.publish(format!("could not start recording: {e}"));
            }
        }
    }

    fn stop_recording(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            if let Err(e) = recorder.stop() {
                self.errors.publish(format!("recording finalize failed: {e}"));
            }
            self.shared.recording.store(false, Ordering::Relaxed);
            let _ = self.events.send(PlayerEvent::Recording(false));
        }
    }

    /// Drop the sink without finalizing; used after a write failure.
    fn abandon_recording(&mut self) {
        self.recorder = None;
        self.shared.recording.store(false, Ordering::Relaxed);
        let _ = self.events.send(PlayerEvent::Recording(false));
    }

    fn handle_screenshot(&mut self, path: PathBuf) {
        if self.displayed.is_empty() {
            self.errors.publish("no frame to capture yet");
            return;
        }
        match snapshot::write_png(&self.displayed, &path) {
            Ok(()) => {
                let _ = self.events.send(PlayerEvent::Status(format!(
                    "screenshot saved to {}",
                    path.display()
                )));
            }
            Err(e) => self.errors.publish(format!("screenshot failed: {e}")),
        }
    }

    fn teardown(&mut self) {
        self.stop_recording();
        self.controller.release();
        self.shared.paused.store(false, Ordering::Relaxed);
        self.shared.position.store(0, Ordering::Relaxed);
        self.shared.set_state(PlaybackState::Idle);
        let _ = self
            .events
            .send(PlayerEvent::StateChanged(PlaybackState::Idle));
        let _ = self
            .events
            .send(PlayerEvent::Frame(Arc::new(FrameBuffer::empty())));
        debug!("frame loop exited");
    }
}
