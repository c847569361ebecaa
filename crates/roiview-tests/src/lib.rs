//! Integration test crate for RoiView.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on multiple roiview crates to verify they work together.

#[cfg(test)]
mod pipeline;

#[cfg(test)]
mod playback;

#[cfg(test)]
mod settings;
