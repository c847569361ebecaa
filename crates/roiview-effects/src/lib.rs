//! Pixel effects applied to the mapped ROI of each display frame.
//!
//! The engine is stateless; everything it needs arrives per call as an
//! [`EffectConfig`] snapshot, so the playback loop can hold its own copy
//! and apply parameter updates between frames without locking.

pub mod config;
pub mod contour;
pub mod convolve;
pub mod engine;
pub mod hsv;
pub mod morphology;

pub use config::{EffectConfig, EffectKind, EffectParam, HsvBounds};
pub use engine::EffectEngine;
