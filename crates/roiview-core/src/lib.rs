//! RoiView Core - Foundation types for the real-time frame pipeline
//!
//! This crate provides the fundamental types used throughout RoiView:
//! - Frame buffers and pixel formats
//! - Geometry, the user ROI, and display-to-source coordinate mapping
//! - The bounded pool of reusable frame buffers

pub mod error;
pub mod frame;
pub mod geometry;
pub mod mapper;
pub mod pool;

pub use error::{Result, RoiViewError};
pub use frame::{FrameBuffer, PixelFormat};
pub use geometry::{shared_roi, Rect, RoiModel, SharedRoi, SourceRect, MIN_ROI_SIZE};
pub use mapper::{DisplayMapper, LetterboxGeometry};
pub use pool::{BufferPool, PoolStats, PooledBuffer};
