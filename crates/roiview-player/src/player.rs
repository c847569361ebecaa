//! The playback command surface.
//!
//! A `Player` owns at most one session at a time. Opening a source
//! spawns the frame loop on its own thread; every later command is a
//! message into that loop. Consumers observe the session through the
//! event stream only.

use crate::cancel::CancelToken;
use crate::frame_loop::{FrameLoop, LoopControl};
use crate::state::{ErrorSink, PlaybackState, PlayerEvent, SessionShared};
use chrono::Local;
use crossbeam_channel::{unbounded, Receiver, Sender};
use roiview_core::{shared_roi, BufferPool, Rect, Result, RoiViewError, SharedRoi};
use roiview_effects::{EffectConfig, EffectKind, EffectParam};
use roiview_media::{CaptureController, VideoSource};
use roiview_settings::{AppSettings, JsonSettingsService, SettingsService};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Upper bound on waiting for the loop thread during stop.
const STOP_WAIT: Duration = Duration::from_secs(2);

struct Session {
    control: Sender<LoopControl>,
    handle: Option<JoinHandle<()>>,
    cancel: CancelToken,
    shared: Arc<SessionShared>,
    seekable: bool,
}

pub struct Player {
    pool: Arc<BufferPool>,
    roi: SharedRoi,
    config: EffectConfig,
    render_size: Option<(u32, u32)>,
    events_tx: Sender<PlayerEvent>,
    events_rx: Receiver<PlayerEvent>,
    errors: ErrorSink,
    settings: Box<dyn SettingsService>,
    session: Option<Session>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self::with_settings_service(Box::new(JsonSettingsService))
    }

    pub fn with_settings_service(settings: Box<dyn SettingsService>) -> Self {
        let (events_tx, events_rx) = unbounded();
        let errors = ErrorSink::new(events_tx.clone());
        Self {
            pool: Arc::new(BufferPool::new()),
            roi: shared_roi(),
            config: EffectConfig::default(),
            render_size: None,
            events_tx,
            events_rx,
            errors,
            settings,
            session: None,
        }
    }

    /// Subscribe to the published outputs.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.events_rx.clone()
    }

    // ── Session lifecycle ───────────────────────────────────────

    pub fn start_device(&mut self, index: u32) -> Result<()> {
        self.ensure_idle()?;
        let controller = CaptureController::open_device(index)?;
        self.spawn_session(controller, true)
    }

    pub fn open_file(&mut self, path: &Path) -> Result<()> {
        self.ensure_idle()?;
        let controller = CaptureController::open_file(path)?;
        self.spawn_session(controller, false)
    }

    /// Start from an arbitrary source (demo mode, tests).
    pub fn start_source(&mut self, source: Box<dyn VideoSource>, live: bool) -> Result<()> {
        self.ensure_idle()?;
        let controller = CaptureController::from_source(source);
        self.spawn_session(controller, live)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.session.is_some() {
            return Err(RoiViewError::InvalidParameter(
                "a playback session is already active".into(),
            ));
        }
        Ok(())
    }

    fn spawn_session(&mut self, controller: CaptureController, live: bool) -> Result<()> {
        let shared = Arc::new(SessionShared::default());
        shared.set_state(PlaybackState::Playing);
        let cancel = CancelToken::new();
        let (control_tx, control_rx) = unbounded();
        let seekable = controller.is_seekable();
        let render_size = self
            .render_size
            .or_else(|| controller.dimensions())
            .unwrap_or((0, 0));

        let frame_loop = FrameLoop::new(
            controller,
            Arc::clone(&self.pool),
            Arc::clone(&self.roi),
            self.config,
            self.events_tx.clone(),
            control_rx,
            cancel.clone(),
            Arc::clone(&shared),
            self.errors.clone(),
            live,
            render_size,
        );
        let handle = std::thread::Builder::new()
            .name("roiview-frame-loop".into())
            .spawn(move || frame_loop.run())
            .map_err(|e| {
                RoiViewError::SourceUnavailable(format!("failed to spawn frame loop: {e}"))
            })?;

        let _ = self
            .events_tx
            .send(PlayerEvent::StateChanged(PlaybackState::Playing));
        info!(live, "playback session started");

        self.session = Some(Session {
            control: control_tx,
            handle: Some(handle),
            cancel,
            shared,
            seekable,
        });
        Ok(())
    }

    /// Stop the session, bounded wait for the loop. Calling with no
    /// session is a no-op.
    pub fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.shared.set_state(PlaybackState::Stopping);
        session.cancel.cancel();

        if let Some(handle) = session.handle.take() {
            let deadline = Instant::now() + STOP_WAIT;
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // Leave the thread to finish teardown on its own.
                warn!("frame loop did not exit within {STOP_WAIT:?}");
            }
        }
        info!("playback session stopped");
    }

    // ── State queries ───────────────────────────────────────────

    pub fn state(&self) -> PlaybackState {
        self.session
            .as_ref()
            .map(|s| s.shared.state())
            .unwrap_or(PlaybackState::Idle)
    }

    pub fn position(&self) -> u64 {
        self.session
            .as_ref()
            .map(|s| s.shared.position.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Buffer pool diagnostics, for status displays and tests.
    pub fn pool_stats(&self) -> roiview_core::PoolStats {
        self.pool.stats()
    }

    pub fn is_recording(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.shared.recording.load(Ordering::Relaxed))
    }

    pub fn can_start(&self) -> bool {
        self.session.is_none()
    }

    pub fn can_play_pause(&self) -> bool {
        matches!(
            self.state(),
            PlaybackState::Playing | PlaybackState::Paused
        )
    }

    pub fn can_stop(&self) -> bool {
        self.session.is_some()
    }

    pub fn can_navigate_frames(&self) -> bool {
        self.state() == PlaybackState::Paused
            && self.session.as_ref().is_some_and(|s| s.seekable)
    }

    pub fn can_capture(&self) -> bool {
        self.can_play_pause()
    }

    pub fn can_record(&self) -> bool {
        self.can_play_pause()
    }

    // ── Commands into the loop ──────────────────────────────────

    fn send(&self, message: LoopControl) -> Result<()> {
        let session = self.session.as_ref().ok_or_else(|| {
            RoiViewError::InvalidParameter("no active playback session".into())
        })?;
        session.control.send(message).map_err(|_| {
            RoiViewError::SourceUnavailable("playback session has ended".into())
        })
    }

    pub fn play_pause(&mut self) -> Result<()> {
        self.send(LoopControl::PlayPause)
    }

    pub fn seek(&mut self, frame_index: u64) -> Result<()> {
        if !self.can_navigate_frames() {
            return Err(RoiViewError::InvalidParameter(
                "seeking requires a paused, seekable source".into(),
            ));
        }
        self.send(LoopControl::Seek(frame_index))
    }

    pub fn previous_frame(&mut self) -> Result<()> {
        if !self.can_navigate_frames() {
            return Err(RoiViewError::InvalidParameter(
                "frame stepping requires a paused, seekable source".into(),
            ));
        }
        self.send(LoopControl::Step(-1))
    }

    pub fn next_frame(&mut self) -> Result<()> {
        if !self.can_navigate_frames() {
            return Err(RoiViewError::InvalidParameter(
                "frame stepping requires a paused, seekable source".into(),
            ));
        }
        self.send(LoopControl::Step(1))
    }

    pub fn begin_scrub(&mut self) -> Result<()> {
        self.send(LoopControl::BeginScrub)
    }

    pub fn end_scrub(&mut self) -> Result<()> {
        self.send(LoopControl::EndScrub)
    }

    // ── ROI and effect parameters ───────────────────────────────

    pub fn set_roi(&mut self, rect: Rect) {
        self.roi.lock().set_rect(rect);
    }

    pub fn clear_roi(&mut self) {
        self.roi.lock().reset();
    }

    pub fn roi(&self) -> SharedRoi {
        Arc::clone(&self.roi)
    }

    pub fn set_effect(&mut self, kind: EffectKind) {
        self.config.set_kind(kind);
        if self.session.is_some() {
            let _ = self.send(LoopControl::SetEffect(kind));
        }
    }

    pub fn set_param(&mut self, param: EffectParam) {
        self.config.set_param(param);
        if self.session.is_some() {
            let _ = self.send(LoopControl::SetParam(param));
        }
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    /// Size of the surface the ROI is drawn on. Defaults to the source
    /// dimensions, which makes the mapping the identity.
    pub fn set_render_size(&mut self, width: u32, height: u32) {
        self.render_size = Some((width, height));
        if self.session.is_some() {
            let _ = self.send(LoopControl::SetRenderSize(width, height));
        }
    }

    // ── Capture and recording ───────────────────────────────────

    /// Save the currently displayed post-effect frame as a PNG in the
    /// pictures directory.
    pub fn capture_screenshot(&mut self) -> Result<PathBuf> {
        if !self.can_capture() {
            return Err(RoiViewError::InvalidParameter(
                "no frame available to capture".into(),
            ));
        }
        let dir = dirs::picture_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = format!("roiview_{}.png", Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(name);
        self.send(LoopControl::Screenshot(path.clone()))?;
        Ok(path)
    }

    /// Toggle recording to a timestamped file in the videos directory.
    pub fn toggle_recording(&mut self) -> Result<()> {
        let dir = dirs::video_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = format!("roiview_{}.mp4", Local::now().format("%Y%m%d_%H%M%S"));
        self.toggle_recording_at(dir.join(name))
    }

    /// Toggle recording with an explicit output path.
    pub fn toggle_recording_at(&mut self, path: PathBuf) -> Result<()> {
        if !self.can_record() {
            return Err(RoiViewError::InvalidParameter(
                "recording requires an active session".into(),
            ));
        }
        if self.is_recording() {
            self.send(LoopControl::StopRecording)
        } else {
            self.send(LoopControl::StartRecording(path))
        }
    }

    // ── Settings ────────────────────────────────────────────────

    pub fn save_settings(&mut self, path: &Path) -> Result<()> {
        let doc = AppSettings::capture(&self.roi.lock(), &self.config);
        self.settings.save(&doc, path)
    }

    /// Load a settings document and push it into the running session,
    /// clamping every value on the way in.
    pub fn load_settings(&mut self, path: &Path) -> Result<()> {
        let doc = self.settings.load(path)?;
        {
            let mut roi = self.roi.lock();
            doc.apply_to(&mut roi, &mut self.config);
        }
        if self.session.is_some() {
            let _ = self.send(LoopControl::ReplaceConfig(self.config));
        }
        Ok(())
    }

    // ── Errors ──────────────────────────────────────────────────

    pub fn report_error(&self, message: impl Into<String>) {
        self.errors.publish(message);
    }

    pub fn clear_error(&mut self) {
        self.errors.clear();
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roiview_media::TestPatternSource;

    fn demo_source(total: u64) -> Box<dyn VideoSource> {
        Box::new(TestPatternSource::new(32, 24, 60.0).with_total_frames(total))
    }

    fn wait_for_first_frame(events: &Receiver<PlayerEvent>) {
        loop {
            match events.recv_timeout(Duration::from_secs(5)).unwrap() {
                PlayerEvent::Frame(f) if !f.is_empty() => return,
                _ => continue,
            }
        }
    }

    #[test]
    fn test_predicates_when_idle() {
        let player = Player::new();
        assert!(player.can_start());
        assert!(!player.can_play_pause());
        assert!(!player.can_stop());
        assert!(!player.can_navigate_frames());
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_start_and_stop_session() {
        let mut player = Player::new();
        let events = player.events();
        player.start_source(demo_source(1000), false).unwrap();
        assert!(!player.can_start());
        assert!(player.can_stop());
        wait_for_first_frame(&events);

        player.stop();
        assert!(player.can_start());
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_double_stop_is_noop() {
        let mut player = Player::new();
        player.start_source(demo_source(100), false).unwrap();
        player.stop();
        player.stop();
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let mut player = Player::new();
        player.start_source(demo_source(100), false).unwrap();
        let err = player.start_source(demo_source(100), false).unwrap_err();
        assert!(matches!(err, RoiViewError::InvalidParameter(_)));
        player.stop();
    }

    #[test]
    fn test_seek_rejected_while_playing() {
        let mut player = Player::new();
        player.start_source(demo_source(100), false).unwrap();
        // Playing, not paused: navigation must be rejected.
        assert!(matches!(
            player.seek(10),
            Err(RoiViewError::InvalidParameter(_))
        ));
        player.stop();
    }

    #[test]
    fn test_seek_rejected_on_live_source() {
        let mut player = Player::new();
        let live = Box::new(TestPatternSource::new(32, 24, 60.0));
        let events = player.events();
        player.start_source(live, true).unwrap();
        wait_for_first_frame(&events);

        player.play_pause().unwrap();
        // Wait for the paused acknowledgement.
        loop {
            match events.recv_timeout(Duration::from_secs(5)).unwrap() {
                PlayerEvent::StateChanged(PlaybackState::Paused) => break,
                _ => continue,
            }
        }
        assert!(!player.can_navigate_frames());
        assert!(player.seek(3).is_err());
        player.stop();
    }

    #[test]
    fn test_parameter_updates_without_session() {
        let mut player = Player::new();
        player.set_effect(EffectKind::Sharpen);
        player.set_param(EffectParam::Brightness(250.0));
        assert_eq!(player.config().kind(), EffectKind::Sharpen);
        assert_eq!(player.config().brightness(), 100.0);
    }

    #[test]
    fn test_settings_roundtrip_through_player() {
        use roiview_settings::MemorySettingsService;

        let service = Box::new(MemorySettingsService::default());
        let mut player = Player::with_settings_service(service);
        player.set_roi(Rect::new(10.0, 10.0, 80.0, 60.0));
        player.set_effect(EffectKind::Binary);
        player.set_param(EffectParam::BinaryThreshold(200.0));

        let path = Path::new("player-settings.json");
        player.save_settings(path).unwrap();

        player.set_effect(EffectKind::None);
        player.clear_roi();
        player.load_settings(path).unwrap();

        assert_eq!(player.config().kind(), EffectKind::Binary);
        assert_eq!(player.config().binary_threshold(), 200.0);
        assert!(player.roi().lock().is_defined());
    }

    #[test]
    fn test_screenshot_requires_session() {
        let mut player = Player::new();
        assert!(player.capture_screenshot().is_err());
    }
}
