//! End-to-end pipeline tests: source → mapping → effects → events.
//!
//! Exercises cross-crate interactions between roiview-core,
//! roiview-effects, roiview-media, and roiview-player.

use crossbeam_channel::Receiver;
use roiview_core::{BufferPool, DisplayMapper, FrameBuffer, PixelFormat, Rect, SourceRect};
use roiview_effects::{EffectConfig, EffectEngine, EffectKind, EffectParam};
use roiview_media::TestPatternSource;
use roiview_player::{PlaybackState, Player, PlayerEvent};
use std::sync::Arc;
use std::time::Duration;

fn recv_frame(events: &Receiver<PlayerEvent>) -> Arc<FrameBuffer> {
    loop {
        match events.recv_timeout(Duration::from_secs(5)).unwrap() {
            PlayerEvent::Frame(frame) if !frame.is_empty() => return frame,
            _ => continue,
        }
    }
}

fn wait_for_idle(events: &Receiver<PlayerEvent>) {
    loop {
        if let PlayerEvent::StateChanged(PlaybackState::Idle) =
            events.recv_timeout(Duration::from_secs(5)).unwrap()
        {
            return;
        }
    }
}

// ── ROI mapping through the whole stack ─────────────────────────

#[test]
fn roi_drawn_on_half_size_surface_lands_on_doubled_source_rect() {
    // 640x480 source rendered on a 320x240 surface: the display ROI
    // (10,10,100,100) must hit source pixels (20,20)-(220,220).
    let mut player = Player::new();
    player.set_render_size(320, 240);
    player.set_roi(Rect::new(10.0, 10.0, 100.0, 100.0));
    player.set_effect(EffectKind::Grayscale);

    let events = player.events();
    let source = TestPatternSource::new(640, 480, 60.0).with_total_frames(3);
    player.start_source(Box::new(source), false).unwrap();

    let frame = recv_frame(&events);
    let reference = FrameBuffer::test_pattern(640, 480);

    // Interior of the mapped rect is grayscale.
    let px = frame.pixel(120, 120);
    assert_eq!(px[0], px[1]);
    assert_eq!(px[1], px[2]);

    // Outside the mapped rect the color bars are untouched.
    assert_eq!(frame.pixel(400, 300), reference.pixel(400, 300));
    assert_eq!(frame.pixel(10, 300), reference.pixel(10, 300));

    // The lime-green border sits exactly at the mapped origin.
    assert_eq!(frame.pixel(20, 20), &[50, 205, 50]);

    player.stop();
}

#[test]
fn undefined_roi_leaves_frames_unprocessed() {
    let mut player = Player::new();
    player.set_effect(EffectKind::Binary);

    let events = player.events();
    let source = TestPatternSource::new(64, 48, 60.0).with_total_frames(2);
    player.start_source(Box::new(source), false).unwrap();

    let frame = recv_frame(&events);
    let reference = FrameBuffer::test_pattern(64, 48);
    // Row 1 avoids the moving band the pattern source injects at row 0.
    assert_eq!(frame.row(1), reference.row(1));
    player.stop();
}

#[test]
fn mapper_and_engine_compose_without_pool_leaks() {
    let pool = BufferPool::new();
    let mut mapper = DisplayMapper::new();
    let mut config = EffectConfig::default();
    config.set_kind(EffectKind::ColorDetection);
    config.set_param(EffectParam::HueUpper(30.0));

    let mut frame = FrameBuffer::test_pattern(640, 480);
    let rect = mapper
        .map_to_source(Rect::new(10.0, 10.0, 100.0, 100.0), 640, 480, 320.0, 240.0)
        .unwrap();
    assert_eq!(rect, SourceRect::new(20, 20, 200, 200));

    for _ in 0..20 {
        EffectEngine::apply(&mut frame, rect, &config, &pool).unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.rented, 0);
    assert_eq!(stats.total_rented, stats.total_returned);
}

#[test]
fn effect_parameter_updates_reach_the_running_loop() {
    let mut player = Player::new();
    player.set_roi(Rect::new(0.0, 0.0, 64.0, 48.0));
    let events = player.events();
    let source = TestPatternSource::new(64, 48, 60.0).with_total_frames(200);
    player.start_source(Box::new(source), false).unwrap();

    recv_frame(&events);
    player.set_effect(EffectKind::Binary);
    player.set_param(EffectParam::BinaryThreshold(255.0));

    // With the threshold at max, every interior pixel thresholds to 0.
    // Allow a few frames for the control message to take effect.
    let mut saw_binary = false;
    for _ in 0..50 {
        let frame = recv_frame(&events);
        let px = frame.pixel(32, 24);
        if px == &[0, 0, 0] {
            saw_binary = true;
            break;
        }
    }
    assert!(saw_binary, "binary effect never reached the loop");

    player.stop();
    wait_for_idle(&events);
    assert_eq!(player.pool_stats().rented, 0);
}

#[test]
fn grayscale_pixels_stay_gray_through_publishing() {
    let mut config = EffectConfig::default();
    config.set_kind(EffectKind::Grayscale);
    let pool = BufferPool::new();

    let mut frame = FrameBuffer::test_pattern(64, 48);
    EffectEngine::apply(&mut frame, SourceRect::new(8, 8, 32, 32), &config, &pool).unwrap();

    for y in 12..36 {
        for x in 12..36 {
            let px = frame.pixel(x, y);
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }
}
