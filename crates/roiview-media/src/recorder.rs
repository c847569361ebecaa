//! H.264 recording sink fed raw frames over stdin.

use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use roiview_core::{FrameBuffer, PixelFormat, Result, RoiViewError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ChildStdin;
use tracing::info;

/// An open MP4 recording. Frames must match the dimensions given at
/// start; `stop` flushes and finalizes the container.
pub struct Recorder {
    child: FfmpegChild,
    stdin: ChildStdin,
    path: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frames_written", &self.frames_written)
            .finish_non_exhaustive()
    }
}

impl Recorder {
    /// Spawn the encoder. On failure nothing is left running and the
    /// caller keeps recording disabled.
    pub fn start(path: &Path, fps: f64, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RoiViewError::Recording(
                "cannot record a zero-sized frame".into(),
            ));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(RoiViewError::Recording(format!(
                    "recording directory {} does not exist",
                    parent.display()
                )));
            }
        }
        let output = path.to_string_lossy().into_owned();
        let mut child = FfmpegCommand::new()
            .hide_banner()
            .format("rawvideo")
            .pix_fmt("rgb24")
            .size(width, height)
            .rate(fps.max(1.0) as f32)
            .input("pipe:0")
            .codec_video("libx264")
            // yuv420p needs even dimensions.
            .args(["-vf", "scale=trunc(iw/2)*2:trunc(ih/2)*2"])
            .pix_fmt("yuv420p")
            .overwrite()
            .output(output.as_str())
            .spawn()
            .map_err(|e| {
                RoiViewError::Recording(format!("failed to start encoder for {output}: {e}"))
            })?;

        let stdin = match child.take_stdin() {
            Some(stdin) => stdin,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RoiViewError::Recording("encoder has no stdin".into()));
            }
        };

        info!(path = %path.display(), width, height, fps, "recording started");
        Ok(Self {
            child,
            stdin,
            path: path.to_path_buf(),
            width,
            height,
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Push one RGB frame into the encoder.
    pub fn write(&mut self, frame: &FrameBuffer) -> Result<()> {
        if frame.format != PixelFormat::Rgb8
            || frame.width != self.width
            || frame.height != self.height
        {
            return Err(RoiViewError::Recording(format!(
                "frame {}x{} does not match recording {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        self.stdin
            .write_all(&frame.data)
            .map_err(|e| RoiViewError::Recording(format!("encoder write failed: {e}")))?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close stdin so the encoder sees end-of-stream, then wait for it
    /// to finalize the file.
    pub fn stop(mut self) -> Result<()> {
        drop(self.stdin);
        let status = self
            .child
            .wait()
            .map_err(|e| RoiViewError::Recording(format!("failed to wait for encoder: {e}")))?;
        if !status.success() {
            return Err(RoiViewError::Recording(format!(
                "encoder exited with {status}"
            )));
        }
        info!(path = %self.path.display(), frames = self.frames_written, "recording stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_rejects_zero_dimensions() {
        let err = Recorder::start(Path::new("/tmp/out.mp4"), 30.0, 0, 480).unwrap_err();
        assert!(matches!(err, RoiViewError::Recording(_)));
    }

    #[test]
    fn test_start_rejects_missing_directory() {
        let err =
            Recorder::start(Path::new("/nonexistent/dir/out.mp4"), 30.0, 640, 480).unwrap_err();
        assert!(matches!(err, RoiViewError::Recording(_)));
        assert!(err.to_string().contains("does not exist"));
    }
}
