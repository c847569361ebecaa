//! Single-frame PNG snapshots of the displayed pixels.

use ffmpeg_sidecar::command::FfmpegCommand;
use roiview_core::{FrameBuffer, PixelFormat, Result, RoiViewError};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Encode one RGB frame to a PNG at `path`.
pub fn write_png(frame: &FrameBuffer, path: &Path) -> Result<()> {
    if frame.format != PixelFormat::Rgb8 || frame.is_empty() {
        return Err(RoiViewError::InvalidParameter(
            "snapshot requires a non-empty RGB frame".into(),
        ));
    }

    let output = path.to_string_lossy().into_owned();
    let mut child = FfmpegCommand::new()
        .hide_banner()
        .format("rawvideo")
        .pix_fmt("rgb24")
        .size(frame.width, frame.height)
        .input("pipe:0")
        .args(["-frames:v", "1"])
        .overwrite()
        .output(output.as_str())
        .spawn()
        .map_err(RoiViewError::Io)?;

    let mut stdin = child
        .take_stdin()
        .ok_or_else(|| RoiViewError::Decode("png encoder has no stdin".into()))?;
    stdin
        .write_all(&frame.data)
        .map_err(RoiViewError::Io)?;
    drop(stdin);

    let status = child.wait().map_err(RoiViewError::Io)?;
    if !status.success() {
        return Err(RoiViewError::Decode(format!(
            "png encoder exited with {status}"
        )));
    }
    info!(path = %path.display(), "snapshot written");
    Ok(())
}
