//! The per-frame effect pipeline.
//!
//! Every effect mutates the mapped ROI sub-region of the display frame in
//! place. All scratch buffers are rented from the pool through RAII
//! guards, so they go back to the pool even when an effect errors out.

use crate::config::{EffectConfig, EffectKind};
use crate::contour::{draw_contours, find_external_contours};
use crate::convolve::gaussian_blur;
use crate::hsv::rgb_to_hsv;
use crate::morphology;
use roiview_core::{BufferPool, FrameBuffer, PixelFormat, Result, RoiViewError, SourceRect};

/// ROI bounding rectangle color (lime green).
const ROI_RECT_COLOR: [u8; 3] = [50, 205, 50];
/// Detection overlay color (green).
const OVERLAY_COLOR: [u8; 3] = [0, 255, 0];
/// Contour stroke color (yellow).
const CONTOUR_COLOR: [u8; 3] = [255, 255, 0];
/// Overlay opacity for matched pixels.
const OVERLAY_ALPHA: f32 = 0.3;

/// Stateless dispatcher for the fixed effect set.
pub struct EffectEngine;

impl EffectEngine {
    /// Apply the configured effect, then brightness/contrast, then the ROI
    /// bounding rectangle, all inside `rect`.
    ///
    /// No-ops when the effect kind is `None` (tonal adjustment and the
    /// rectangle still apply). Effect failures come back wrapped with the
    /// effect name; the frame outside `rect` is never touched.
    pub fn apply(
        frame: &mut FrameBuffer,
        rect: SourceRect,
        config: &EffectConfig,
        pool: &BufferPool,
    ) -> Result<()> {
        if frame.format != PixelFormat::Rgb8 {
            return Err(RoiViewError::InvalidParameter(
                "effects require an RGB frame".into(),
            ));
        }
        if rect.width == 0
            || rect.height == 0
            || rect.x + rect.width > frame.width
            || rect.y + rect.height > frame.height
        {
            return Err(RoiViewError::InvalidParameter(format!(
                "ROI {}x{}+{}+{} outside {}x{} frame",
                rect.width, rect.height, rect.x, rect.y, frame.width, frame.height
            )));
        }

        let kind = config.kind();
        let result = match kind {
            EffectKind::None => Ok(()),
            EffectKind::Binary => Self::apply_binary(frame, rect, config, pool),
            EffectKind::Grayscale => Self::apply_grayscale(frame, rect, pool),
            EffectKind::GaussianBlur => Self::apply_gaussian_blur(frame, rect, config, pool),
            EffectKind::Sharpen => Self::apply_sharpen(frame, rect, config, pool),
            EffectKind::ColorDetection => Self::apply_color_detection(frame, rect, config, pool),
        };
        result.map_err(|e| RoiViewError::Effect(format!("{kind:?}: {e}")))?;

        // Tonal adjustment runs after the selected effect so it reflects
        // the transformed pixels.
        Self::apply_brightness_contrast(frame, rect, config);
        Self::draw_roi_rectangle(frame, rect);
        Ok(())
    }

    fn apply_binary(
        frame: &mut FrameBuffer,
        rect: SourceRect,
        config: &EffectConfig,
        pool: &BufferPool,
    ) -> Result<()> {
        let mut gray = pool.rent_shaped(rect.width, rect.height, PixelFormat::Gray8);
        roi_to_gray(frame, rect, &mut gray);

        let threshold = config.binary_threshold() as u8;
        for v in gray.data.iter_mut() {
            *v = if *v > threshold { 255 } else { 0 };
        }

        gray_into_roi(frame, rect, &gray);
        Ok(())
    }

    fn apply_grayscale(frame: &mut FrameBuffer, rect: SourceRect, pool: &BufferPool) -> Result<()> {
        let mut gray = pool.rent_shaped(rect.width, rect.height, PixelFormat::Gray8);
        roi_to_gray(frame, rect, &mut gray);
        gray_into_roi(frame, rect, &gray);
        Ok(())
    }

    fn apply_gaussian_blur(
        frame: &mut FrameBuffer,
        rect: SourceRect,
        config: &EffectConfig,
        pool: &BufferPool,
    ) -> Result<()> {
        let mut src = pool.rent_shaped(rect.width, rect.height, PixelFormat::Rgb8);
        let mut blurred = pool.rent_shaped(rect.width, rect.height, PixelFormat::Rgb8);
        copy_roi(frame, rect, &mut src);
        gaussian_blur(&src, &mut blurred, config.blur_kernel_size(), 0.0);
        paste_roi(frame, rect, &blurred);
        Ok(())
    }

    fn apply_sharpen(
        frame: &mut FrameBuffer,
        rect: SourceRect,
        config: &EffectConfig,
        pool: &BufferPool,
    ) -> Result<()> {
        let mut orig = pool.rent_shaped(rect.width, rect.height, PixelFormat::Rgb8);
        let mut blurred = pool.rent_shaped(rect.width, rect.height, PixelFormat::Rgb8);
        copy_roi(frame, rect, &mut orig);
        gaussian_blur(&orig, &mut blurred, 3, 1.0);

        // Unsharp mask: roi*(1+s) + blurred*(-s).
        let s = config.sharpen_strength() as f32;
        for y in 0..rect.height {
            let frame_row = frame.row_mut(rect.y + y);
            let orig_row = orig.row(y);
            let blur_row = blurred.row(y);
            let start = rect.x as usize * 3;
            for i in 0..rect.width as usize * 3 {
                let v = orig_row[i] as f32 * (1.0 + s) - blur_row[i] as f32 * s;
                frame_row[start + i] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
        Ok(())
    }

    fn apply_color_detection(
        frame: &mut FrameBuffer,
        rect: SourceRect,
        config: &EffectConfig,
        pool: &BufferPool,
    ) -> Result<()> {
        let bounds = config.hsv();
        let mut mask = pool.rent_shaped(rect.width, rect.height, PixelFormat::Gray8);

        // Inclusive in-range mask over the HSV-converted ROI.
        for y in 0..rect.height {
            let frame_row = frame.row(rect.y + y);
            let mask_row = mask.row_mut(y);
            for x in 0..rect.width as usize {
                let i = (rect.x as usize + x) * 3;
                let [h, s, v] = rgb_to_hsv(frame_row[i], frame_row[i + 1], frame_row[i + 2]);
                let matched = (h as f64) >= bounds.hue_lower
                    && (h as f64) <= bounds.hue_upper
                    && (s as f64) >= bounds.saturation_lower
                    && (s as f64) <= bounds.saturation_upper
                    && (v as f64) >= bounds.value_lower
                    && (v as f64) <= bounds.value_upper;
                mask_row[x] = if matched { 255 } else { 0 };
            }
        }

        // Denoise the mask before using it for anything visible.
        {
            let mut scratch = pool.rent_shaped(rect.width, rect.height, PixelFormat::Gray8);
            morphology::open(&mut mask, &mut scratch);
            morphology::close(&mut mask, &mut scratch);
        }

        // Composite the overlay onto matched pixels at 30% opacity.
        for y in 0..rect.height {
            let mask_row_start = y as usize * rect.width as usize;
            let frame_row = frame.row_mut(rect.y + y);
            for x in 0..rect.width as usize {
                if mask.data[mask_row_start + x] == 0 {
                    continue;
                }
                let i = (rect.x as usize + x) * 3;
                for c in 0..3 {
                    let blended = frame_row[i + c] as f32 * (1.0 - OVERLAY_ALPHA)
                        + OVERLAY_COLOR[c] as f32 * OVERLAY_ALPHA;
                    frame_row[i + c] = blended.round() as u8;
                }
            }
        }

        let contours = find_external_contours(&mask);
        draw_contours(frame, rect.x, rect.y, &contours, CONTOUR_COLOR);
        Ok(())
    }

    /// `out = in*contrast + (brightness - 128*(contrast-1))`.
    ///
    /// The 128 pivot assumes 8-bit depth; the pipeline is 8-bit
    /// end to end. Skipped when both values are at neutral.
    fn apply_brightness_contrast(frame: &mut FrameBuffer, rect: SourceRect, config: &EffectConfig) {
        let brightness = config.brightness();
        let contrast = config.contrast();
        if brightness.abs() < 0.01 && (contrast - 1.0).abs() < 0.01 {
            return;
        }

        let alpha = contrast as f32;
        let beta = (brightness - 128.0 * (contrast - 1.0)) as f32;
        for y in 0..rect.height {
            let row = frame.row_mut(rect.y + y);
            let start = rect.x as usize * 3;
            for v in &mut row[start..start + rect.width as usize * 3] {
                *v = (*v as f32 * alpha + beta).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    /// 2px bounding rectangle drawn just inside the ROI.
    fn draw_roi_rectangle(frame: &mut FrameBuffer, rect: SourceRect) {
        let thickness = 2u32.min(rect.width / 2).min(rect.height / 2).max(1);
        for t in 0..thickness {
            let x0 = rect.x + t;
            let y0 = rect.y + t;
            let x1 = rect.x + rect.width - 1 - t;
            let y1 = rect.y + rect.height - 1 - t;
            for x in x0..=x1 {
                frame.pixel_mut(x, y0).copy_from_slice(&ROI_RECT_COLOR);
                frame.pixel_mut(x, y1).copy_from_slice(&ROI_RECT_COLOR);
            }
            for y in y0..=y1 {
                frame.pixel_mut(x0, y).copy_from_slice(&ROI_RECT_COLOR);
                frame.pixel_mut(x1, y).copy_from_slice(&ROI_RECT_COLOR);
            }
        }
    }
}

/// BT.601 luma, matching OpenCV's RGB2GRAY.
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
}

fn roi_to_gray(frame: &FrameBuffer, rect: SourceRect, gray: &mut FrameBuffer) {
    for y in 0..rect.height {
        let frame_row = frame.row(rect.y + y);
        let gray_row = gray.row_mut(y);
        for x in 0..rect.width as usize {
            let i = (rect.x as usize + x) * 3;
            gray_row[x] = luma(frame_row[i], frame_row[i + 1], frame_row[i + 2]);
        }
    }
}

/// Expand a gray buffer back to RGB inside the ROI, keeping the consuming
/// code channel-agnostic.
fn gray_into_roi(frame: &mut FrameBuffer, rect: SourceRect, gray: &FrameBuffer) {
    for y in 0..rect.height {
        let gray_row = gray.row(y);
        let frame_row = frame.row_mut(rect.y + y);
        for x in 0..rect.width as usize {
            let i = (rect.x as usize + x) * 3;
            let v = gray_row[x];
            frame_row[i] = v;
            frame_row[i + 1] = v;
            frame_row[i + 2] = v;
        }
    }
}

fn copy_roi(frame: &FrameBuffer, rect: SourceRect, dst: &mut FrameBuffer) {
    for y in 0..rect.height {
        let src_row = frame.row(rect.y + y);
        let start = rect.x as usize * 3;
        let len = rect.width as usize * 3;
        dst.row_mut(y).copy_from_slice(&src_row[start..start + len]);
    }
}

fn paste_roi(frame: &mut FrameBuffer, rect: SourceRect, src: &FrameBuffer) {
    for y in 0..rect.height {
        let dst_row = frame.row_mut(rect.y + y);
        let start = rect.x as usize * 3;
        let len = rect.width as usize * 3;
        dst_row[start..start + len].copy_from_slice(src.row(y));
    }
}
