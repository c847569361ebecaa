//! Session lifecycle tests: error policy, recording, stop semantics.

use crossbeam_channel::Receiver;
use roiview_media::TestPatternSource;
use roiview_player::{PlaybackState, Player, PlayerEvent};
use std::path::PathBuf;
use std::time::Duration;

fn recv_until<F: FnMut(&PlayerEvent) -> bool>(events: &Receiver<PlayerEvent>, mut pred: F) {
    loop {
        let event = events
            .recv_timeout(Duration::from_secs(10))
            .expect("expected event never arrived");
        if pred(&event) {
            return;
        }
    }
}

fn wait_for_frame(events: &Receiver<PlayerEvent>) {
    recv_until(events, |e| {
        matches!(e, PlayerEvent::Frame(f) if !f.is_empty())
    });
}

// ── Consecutive-error policy ────────────────────────────────────

#[test]
fn five_consecutive_live_failures_surface_fatal_error_and_go_idle() {
    let mut player = Player::new();
    let events = player.events();
    let source = TestPatternSource::new(32, 24, 60.0).with_failures_from(0);
    player.start_source(Box::new(source), true).unwrap();

    recv_until(&events, |e| {
        matches!(e, PlayerEvent::Error { message } if message.contains("consecutive"))
    });
    recv_until(&events, |e| {
        matches!(e, PlayerEvent::StateChanged(PlaybackState::Idle))
    });

    assert_eq!(player.pool_stats().rented, 0);
    player.stop();
    assert_eq!(player.state(), PlaybackState::Idle);
}

#[test]
fn failures_below_threshold_recover_and_keep_playing() {
    let mut player = Player::new();
    let events = player.events();
    let source = TestPatternSource::new(32, 24, 60.0)
        .with_total_frames(10)
        .with_failures_at(&[2, 3, 4, 5]); // four in a row, below the limit
    player.start_source(Box::new(source), false).unwrap();

    recv_until(&events, |e| {
        matches!(e, PlayerEvent::Status(s) if s == "end of video")
    });
    recv_until(&events, |e| {
        matches!(e, PlayerEvent::StateChanged(PlaybackState::Idle))
    });
    player.stop();
}

#[test]
fn file_end_of_stream_is_a_clean_stop_not_an_error() {
    let mut player = Player::new();
    let events = player.events();
    let source = TestPatternSource::new(32, 24, 60.0).with_total_frames(3);
    player.start_source(Box::new(source), false).unwrap();

    let mut saw_error = false;
    loop {
        match events.recv_timeout(Duration::from_secs(10)).unwrap() {
            PlayerEvent::Error { .. } => saw_error = true,
            PlayerEvent::StateChanged(PlaybackState::Idle) => break,
            _ => {}
        }
    }
    assert!(!saw_error);
    player.stop();
}

// ── Recording ───────────────────────────────────────────────────

#[test]
fn recording_open_failure_leaves_recording_off_and_playback_running() {
    let mut player = Player::new();
    let events = player.events();
    let source = TestPatternSource::new(32, 24, 60.0).with_total_frames(10_000);
    player.start_source(Box::new(source), false).unwrap();
    wait_for_frame(&events);

    player
        .toggle_recording_at(PathBuf::from("/nonexistent/dir/out.mp4"))
        .unwrap();

    recv_until(&events, |e| {
        matches!(e, PlayerEvent::Error { message } if message.contains("recording"))
    });
    assert!(!player.is_recording());

    // Playback keeps going after the failed open.
    wait_for_frame(&events);
    assert!(player.can_play_pause());

    player.stop();
}

#[test]
fn recording_requires_an_active_session() {
    let mut player = Player::new();
    let err = player.toggle_recording_at(PathBuf::from("/tmp/out.mp4"));
    assert!(err.is_err());
    assert!(!player.is_recording());
}

// ── Stop semantics ──────────────────────────────────────────────

#[test]
fn stop_is_idempotent_and_player_is_reusable() {
    let mut player = Player::new();
    let events = player.events();
    let source = TestPatternSource::new(32, 24, 60.0).with_total_frames(1000);
    player.start_source(Box::new(source), false).unwrap();
    wait_for_frame(&events);

    player.stop();
    player.stop();
    assert_eq!(player.state(), PlaybackState::Idle);
    assert!(player.can_start());

    // A fresh session starts after a full stop.
    let source = TestPatternSource::new(32, 24, 60.0).with_total_frames(1000);
    player.start_source(Box::new(source), false).unwrap();
    wait_for_frame(&events);
    player.stop();
}

#[test]
fn stop_publishes_an_empty_frame() {
    let mut player = Player::new();
    let events = player.events();
    let source = TestPatternSource::new(32, 24, 60.0).with_total_frames(1000);
    player.start_source(Box::new(source), false).unwrap();
    wait_for_frame(&events);

    player.stop();
    recv_until(&events, |e| {
        matches!(e, PlayerEvent::Frame(f) if f.is_empty())
    });
}

// ── Frame navigation ────────────────────────────────────────────

#[test]
fn stepping_works_only_while_paused_on_seekable_source() {
    let mut player = Player::new();
    let events = player.events();
    let source = TestPatternSource::new(32, 24, 60.0).with_total_frames(100);
    player.start_source(Box::new(source), false).unwrap();
    wait_for_frame(&events);

    assert!(player.next_frame().is_err());

    player.play_pause().unwrap();
    recv_until(&events, |e| {
        matches!(e, PlayerEvent::StateChanged(PlaybackState::Paused))
    });

    assert!(player.can_navigate_frames());
    player.next_frame().unwrap();
    // The stepped frame is republished even though we are paused.
    wait_for_frame(&events);

    player.stop();
}
