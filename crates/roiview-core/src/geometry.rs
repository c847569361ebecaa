//! Geometric primitives and the user-drawn region of interest.

use glam::Vec2;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Axis-aligned rectangle in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle spanning two corner points, in any order.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self {
            x: min.x,
            y: min.y,
            width: max.x - min.x,
            height: max.y - min.y,
        }
    }

    /// Minimum corner (top-left).
    #[inline]
    pub fn min(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Maximum corner (bottom-right).
    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }
}

/// An integer pixel rectangle in source-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SourceRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Minimum gesture size below which a drawn ROI is discarded.
pub const MIN_ROI_SIZE: f32 = 5.0;

/// Mutable rectangle describing the user-drawn region in display coordinates.
///
/// Written from the input-gesture path and read from the frame-processing
/// path, so it is always accessed through [`SharedRoi`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoiModel {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RoiModel {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A region is defined once it has positive extent on both axes.
    pub fn is_defined(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Set from a drawn rectangle; gestures smaller than
    /// [`MIN_ROI_SIZE`] on either axis reset the region instead.
    pub fn set_rect(&mut self, rect: Rect) {
        if rect.width < MIN_ROI_SIZE || rect.height < MIN_ROI_SIZE {
            self.reset();
        } else {
            self.x = rect.x;
            self.y = rect.y;
            self.width = rect.width;
            self.height = rect.height;
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// The one shared mutable object between the UI context and the frame loop.
/// Every access takes the mutex for the duration of the copy only.
pub type SharedRoi = Arc<Mutex<RoiModel>>;

/// Create a new shared, undefined ROI.
pub fn shared_roi() -> SharedRoi {
    Arc::new(Mutex::new(RoiModel::default()))
}
