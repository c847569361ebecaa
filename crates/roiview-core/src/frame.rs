//! Frame buffer types for video frames in CPU memory.
//!
//! Frames are packed, row-major, single-plane buffers. The decoder
//! delivers tightly packed rawvideo, so no stride padding is needed.

use serde::{Deserialize, Serialize};

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGB (24 bits per pixel)
    #[default]
    Rgb8,
    /// 8-bit grayscale
    Gray8,
    /// 8-bit HSV, OpenCV convention (hue 0..=179)
    Hsv8,
}

impl PixelFormat {
    /// Number of interleaved channels.
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb8 | Self::Hsv8 => 3,
            Self::Gray8 => 1,
        }
    }

    /// Total bytes needed for a frame of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.channels()
    }
}

/// A video frame in CPU memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Packed pixel data, `width * height * channels` bytes
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a new zero-filled frame buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            format,
            width,
            height,
            data: vec![0u8; format.frame_size(width, height)],
        }
    }

    /// Create an empty (0x0) frame buffer with no allocation.
    pub fn empty() -> Self {
        Self {
            format: PixelFormat::Rgb8,
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }

    /// Wrap existing packed pixel data.
    ///
    /// Returns `None` if the data length does not match the dimensions.
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Option<Self> {
        if data.len() != format.frame_size(width, height) {
            return None;
        }
        Some(Self {
            format,
            width,
            height,
            data,
        })
    }

    /// True if the frame holds no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes per row.
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.channels()
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let rb = self.row_bytes();
        let start = y as usize * rb;
        &self.data[start..start + rb]
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let rb = self.row_bytes();
        let start = y as usize * rb;
        &mut self.data[start..start + rb]
    }

    /// Get one pixel as a channel slice.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.format.channels();
        let idx = (y as usize * self.width as usize + x as usize) * c;
        &self.data[idx..idx + c]
    }

    /// Get one pixel mutably.
    #[inline]
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let c = self.format.channels();
        let idx = (y as usize * self.width as usize + x as usize) * c;
        &mut self.data[idx..idx + c]
    }

    /// Reshape this buffer in place, reusing the allocation where possible,
    /// then zero-fill.
    pub fn reset(&mut self, width: u32, height: u32, format: PixelFormat) {
        let needed = format.frame_size(width, height);
        self.data.clear();
        self.data.resize(needed, 0);
        self.width = width;
        self.height = height;
        self.format = format;
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    /// Create a test pattern frame (color bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgb8);
        const COLORS: [[u8; 3]; 8] = [
            [255, 255, 255], // White
            [255, 255, 0],   // Yellow
            [0, 255, 255],   // Cyan
            [0, 255, 0],     // Green
            [255, 0, 255],   // Magenta
            [255, 0, 0],     // Red
            [0, 0, 255],     // Blue
            [0, 0, 0],       // Black
        ];
        for y in 0..height {
            let row = frame.row_mut(y);
            for x in 0..width {
                let bar = (x * 8 / width).min(7) as usize;
                let i = x as usize * 3;
                row[i..i + 3].copy_from_slice(&COLORS[bar]);
            }
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb8_frame_size() {
        let frame = FrameBuffer::new(640, 480, PixelFormat::Rgb8);
        assert_eq!(frame.memory_size(), 640 * 480 * 3);
    }

    #[test]
    fn test_reset_reuses_dimensions() {
        let mut frame = FrameBuffer::new(640, 480, PixelFormat::Rgb8);
        frame.data[0] = 42;
        frame.reset(320, 240, PixelFormat::Gray8);
        assert_eq!(frame.width, 320);
        assert_eq!(frame.format.channels(), 1);
        assert!(frame.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_test_pattern() {
        let frame = FrameBuffer::test_pattern(640, 480);
        // First bar is white, last bar is black
        assert_eq!(frame.pixel(0, 0), &[255, 255, 255]);
        assert_eq!(frame.pixel(639, 479), &[0, 0, 0]);
    }

    #[test]
    fn test_from_data_rejects_bad_length() {
        assert!(FrameBuffer::from_data(10, 10, PixelFormat::Rgb8, vec![0; 299]).is_none());
        assert!(FrameBuffer::from_data(10, 10, PixelFormat::Rgb8, vec![0; 300]).is_some());
    }
}
