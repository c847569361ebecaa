//! Media file probing via ffprobe, without a full decode.

use roiview_core::{Result, RoiViewError};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

/// Metadata for the primary video stream of a file.
#[derive(Debug, Clone)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Total frame count when the container reports or implies one.
    pub frame_count: Option<u64>,
    pub duration_seconds: Option<f64>,
    pub codec: String,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    /// e.g. "30000/1001"
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Parse an ffprobe rational like "30000/1001" into frames per second.
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

/// Probe the primary video stream of `path`.
pub fn probe_file(path: &Path) -> Result<VideoMeta> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_streams",
            "-show_format",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| RoiViewError::SourceUnavailable(format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(RoiViewError::SourceUnavailable(format!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| RoiViewError::Decode(format!("unreadable ffprobe output: {e}")))?;

    let stream = parsed.streams.first().ok_or_else(|| {
        RoiViewError::UnsupportedFormat(format!("no video stream in {}", path.display()))
    })?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(RoiViewError::Decode(format!(
                "video stream in {} reports no dimensions",
                path.display()
            )))
        }
    };

    // r_frame_rate can be bogus for variable-rate files; prefer the
    // average rate when it parses.
    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(30.0);

    let duration_seconds = stream
        .duration
        .as_deref()
        .or_else(|| parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok());

    // nb_frames is container-dependent; fall back to duration * fps.
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .or_else(|| duration_seconds.map(|d| (d * fps).round() as u64));

    Ok(VideoMeta {
        width,
        height,
        fps,
        frame_count,
        duration_seconds,
        codec: stream.codec_name.clone().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("30/1"), Some(30.0));
        let ntsc = parse_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("whatever"), None);
    }

    #[test]
    fn test_ffprobe_json_shape() {
        let json = r#"{
            "streams": [{
                "codec_name": "h264",
                "width": 1280,
                "height": 720,
                "r_frame_rate": "25/1",
                "avg_frame_rate": "25/1",
                "nb_frames": "250",
                "duration": "10.000000"
            }],
            "format": { "duration": "10.000000" }
        }"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        let stream = &parsed.streams[0];
        assert_eq!(stream.width, Some(1280));
        assert_eq!(stream.nb_frames.as_deref(), Some("250"));
    }

    #[test]
    fn test_missing_file_is_source_unavailable_or_io() {
        let err = probe_file(Path::new("/nonexistent/clip.mp4")).unwrap_err();
        let msg = err.to_string();
        assert!(!msg.is_empty());
    }
}
