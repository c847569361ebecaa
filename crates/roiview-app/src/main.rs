//! RoiView - headless ROI video analysis CLI
//!
//! Drives the full pipeline against a camera, a video file, or the
//! built-in demo source, and logs the published event stream.

use anyhow::{bail, Context, Result};
use crossbeam_channel::RecvTimeoutError;
use roiview_effects::EffectKind;
use roiview_media::TestPatternSource;
use roiview_player::{PlaybackState, Player, PlayerEvent};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const USAGE: &str = "usage: roiview (--device N | --demo | FILE) \
[--effect KIND] [--settings FILE] [--duration SECONDS]";

enum SourceArg {
    Device(u32),
    File(PathBuf),
    Demo,
}

struct CliArgs {
    source: SourceArg,
    effect: Option<EffectKind>,
    settings: Option<PathBuf>,
    duration: Option<u64>,
}

fn parse_effect(name: &str) -> Result<EffectKind> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "none" => EffectKind::None,
        "binary" => EffectKind::Binary,
        "grayscale" | "gray" => EffectKind::Grayscale,
        "blur" | "gaussianblur" => EffectKind::GaussianBlur,
        "sharpen" => EffectKind::Sharpen,
        "colordetection" | "color" => EffectKind::ColorDetection,
        other => bail!("unknown effect '{other}'"),
    })
}

fn parse_args() -> Result<CliArgs> {
    let mut source = None;
    let mut effect = None;
    let mut settings = None;
    let mut duration = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--device" => {
                let index = args
                    .next()
                    .context("--device needs an index")?
                    .parse::<u32>()
                    .context("--device index must be a number")?;
                source = Some(SourceArg::Device(index));
            }
            "--demo" => source = Some(SourceArg::Demo),
            "--effect" => {
                let name = args.next().context("--effect needs a name")?;
                effect = Some(parse_effect(&name)?);
            }
            "--settings" => {
                settings = Some(PathBuf::from(args.next().context("--settings needs a path")?));
            }
            "--duration" => {
                duration = Some(
                    args.next()
                        .context("--duration needs seconds")?
                        .parse::<u64>()
                        .context("--duration must be a number of seconds")?,
                );
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            path if !path.starts_with('-') => source = Some(SourceArg::File(PathBuf::from(path))),
            other => bail!("unknown argument '{other}'\n{USAGE}"),
        }
    }

    let source = source.context(USAGE)?;
    Ok(CliArgs {
        source,
        effect,
        settings,
        duration,
    })
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = parse_args()?;
    let mut player = Player::new();
    let events = player.events();

    if let Some(path) = &args.settings {
        player
            .load_settings(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?;
    }
    if let Some(kind) = args.effect {
        player.set_effect(kind);
    }

    match &args.source {
        SourceArg::Device(index) => {
            info!(index, "starting camera");
            player.start_device(*index)?;
        }
        SourceArg::File(path) => {
            info!(path = %path.display(), "opening file");
            player.open_file(path)?;
        }
        SourceArg::Demo => {
            info!("starting demo source");
            let source = TestPatternSource::new(640, 480, 30.0);
            player.start_source(Box::new(source), true)?;
        }
    }

    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    drain_events(&events, deadline);

    player.stop();
    info!("done");
    Ok(())
}

/// Log the event stream until the session ends or the deadline passes.
fn drain_events(
    events: &crossbeam_channel::Receiver<PlayerEvent>,
    deadline: Option<Instant>,
) {
    let mut frames = 0u64;
    loop {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                info!(frames, "duration elapsed");
                return;
            }
        }
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(PlayerEvent::Frame(frame)) => {
                if !frame.is_empty() {
                    frames += 1;
                    if frames % 30 == 0 {
                        info!(frames, width = frame.width, height = frame.height, "frames");
                    }
                }
            }
            Ok(PlayerEvent::Status(status)) => info!(%status),
            Ok(PlayerEvent::Metrics(m)) => {
                info!(fps = format!("{:.1}", m.fps), processing_ms = format!("{:.2}", m.processing_ms), "metrics");
            }
            Ok(PlayerEvent::Position { current, total }) => {
                if current % 100 == 0 {
                    info!(current, total, "position");
                }
            }
            Ok(PlayerEvent::Error { message }) => warn!(%message, "player error"),
            Ok(PlayerEvent::ErrorCleared) => info!("error cleared"),
            Ok(PlayerEvent::Recording(active)) => info!(active, "recording"),
            Ok(PlayerEvent::StateChanged(state)) => {
                info!(?state, "state changed");
                if state == PlaybackState::Idle {
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
