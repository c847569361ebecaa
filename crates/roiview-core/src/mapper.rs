//! Display-space to source-pixel-space ROI mapping.
//!
//! The render surface shows the source frame aspect-fit (letterboxed), so
//! a rectangle drawn over the surface must subtract the bar offsets and
//! scale up before it can index the pixel buffer.

use crate::geometry::{Rect, SourceRect};

/// Aspect-fit geometry of a source frame inside a render surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxGeometry {
    /// Displayed image width, in display units.
    pub actual_width: f64,
    /// Displayed image height, in display units.
    pub actual_height: f64,
    /// Horizontal bar offset (bars left/right).
    pub offset_x: f64,
    /// Vertical bar offset (bars top/bottom).
    pub offset_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GeometryKey {
    source_cols: u32,
    source_rows: u32,
    render_width: f64,
    render_height: f64,
}

/// Maps display-space rectangles into source-pixel space.
///
/// Memoizes the letterbox geometry keyed by the four inputs; it is
/// recomputed only when the frame shape or the render surface changes.
#[derive(Debug, Default)]
pub struct DisplayMapper {
    cached: Option<(GeometryKey, LetterboxGeometry)>,
}

impl DisplayMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached geometry (e.g. when the source is released).
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Aspect-fit geometry for a source frame inside a render surface.
    pub fn letterbox(
        &mut self,
        source_cols: u32,
        source_rows: u32,
        render_width: f64,
        render_height: f64,
    ) -> Option<LetterboxGeometry> {
        if source_cols == 0 || source_rows == 0 || render_width <= 0.0 || render_height <= 0.0 {
            return None;
        }

        let key = GeometryKey {
            source_cols,
            source_rows,
            render_width,
            render_height,
        };
        if let Some((cached_key, geom)) = self.cached {
            if cached_key == key {
                return Some(geom);
            }
        }

        let image_aspect = source_cols as f64 / source_rows as f64;
        let container_aspect = render_width / render_height;

        let geom = if image_aspect > container_aspect {
            // Width-constrained: bars top/bottom.
            let actual_width = render_width;
            let actual_height = render_width / image_aspect;
            LetterboxGeometry {
                actual_width,
                actual_height,
                offset_x: 0.0,
                offset_y: (render_height - actual_height) / 2.0,
            }
        } else {
            // Height-constrained: bars left/right.
            let actual_height = render_height;
            let actual_width = render_height * image_aspect;
            LetterboxGeometry {
                actual_width,
                actual_height,
                offset_x: (render_width - actual_width) / 2.0,
                offset_y: 0.0,
            }
        };

        self.cached = Some((key, geom));
        Some(geom)
    }

    /// Translate a display-space ROI into a clamped source-pixel rectangle.
    ///
    /// Returns `None` when the geometry is degenerate or the mapped
    /// rectangle clamps to zero extent; callers treat that as "no ROI".
    pub fn map_to_source(
        &mut self,
        roi: Rect,
        source_cols: u32,
        source_rows: u32,
        render_width: f64,
        render_height: f64,
    ) -> Option<SourceRect> {
        let geom = self.letterbox(source_cols, source_rows, render_width, render_height)?;
        if geom.actual_width <= 0.0 || geom.actual_height <= 0.0 {
            return None;
        }

        let scale_x = source_cols as f64 / geom.actual_width;
        let scale_y = source_rows as f64 / geom.actual_height;

        let x = ((roi.x as f64 - geom.offset_x) * scale_x).round() as i64;
        let y = ((roi.y as f64 - geom.offset_y) * scale_y).round() as i64;
        let w = (roi.width as f64 * scale_x).round() as i64;
        let h = (roi.height as f64 * scale_y).round() as i64;

        let cols = source_cols as i64;
        let rows = source_rows as i64;

        let x = x.clamp(0, cols - 1);
        let y = y.clamp(0, rows - 1);
        let w = w.min(cols - x);
        let h = h.min(rows - y);

        if w <= 0 || h <= 0 {
            return None;
        }

        Some(SourceRect::new(x as u32, y as u32, w as u32, h as u32))
    }
}
