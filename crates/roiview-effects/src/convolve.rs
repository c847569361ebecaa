//! Separable Gaussian convolution on packed 8-bit buffers.

use rayon::prelude::*;
use roiview_core::FrameBuffer;
use smallvec::SmallVec;

/// Kernel weights; largest supported blur kernel is 31 taps.
pub type Kernel = SmallVec<[f32; 31]>;

/// Build a normalized Gaussian kernel of odd size `ksize`.
///
/// A `sigma` of zero or less derives the deviation from the kernel size
/// the way OpenCV's `GaussianBlur(..., 0)` does.
pub fn gaussian_kernel(ksize: usize, sigma: f64) -> Kernel {
    debug_assert!(ksize % 2 == 1);
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };

    let half = (ksize / 2) as i64;
    let mut kernel: Kernel = SmallVec::with_capacity(ksize);
    let mut sum = 0.0f64;
    for i in -half..=half {
        let w = (-(i * i) as f64 / (2.0 * sigma * sigma)).exp();
        kernel.push(w as f32);
        sum += w;
    }
    for w in kernel.iter_mut() {
        *w /= sum as f32;
    }
    kernel
}

/// Reflect-101 border indexing (OpenCV's default border mode).
#[inline]
fn reflect(i: i64, n: i64) -> usize {
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= n {
        i = 2 * n - 2 - i;
    }
    i.max(0) as usize
}

/// Gaussian-blur `src` into `dst`. Both buffers must share shape.
///
/// Two separable passes; rows are processed in parallel.
pub fn gaussian_blur(src: &FrameBuffer, dst: &mut FrameBuffer, ksize: usize, sigma: f64) {
    debug_assert_eq!(src.data.len(), dst.data.len());
    debug_assert_eq!(src.format, dst.format);
    if src.is_empty() {
        return;
    }

    let kernel = gaussian_kernel(ksize, sigma);
    let half = (ksize / 2) as i64;
    let channels = src.format.channels();
    let width = src.width as i64;
    let height = src.height as i64;
    let row_bytes = src.row_bytes();

    // Horizontal pass, src -> tmp.
    let mut tmp = vec![0.0f32; src.data.len()];
    tmp.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, out_row)| {
            let in_row = src.row(y as u32);
            for x in 0..width {
                for c in 0..channels {
                    let mut acc = 0.0f32;
                    for (k, &w) in kernel.iter().enumerate() {
                        let sx = reflect(x + k as i64 - half, width);
                        acc += w * in_row[sx * channels + c] as f32;
                    }
                    out_row[x as usize * channels + c] = acc;
                }
            }
        });

    // Vertical pass, tmp -> dst.
    dst.data
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, out_row)| {
            for x in 0..width as usize {
                for c in 0..channels {
                    let mut acc = 0.0f32;
                    for (k, &w) in kernel.iter().enumerate() {
                        let sy = reflect(y as i64 + k as i64 - half, height);
                        acc += w * tmp[sy * row_bytes + x * channels + c];
                    }
                    out_row[x * channels + c] = acc.round().clamp(0.0, 255.0) as u8;
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use roiview_core::PixelFormat;

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(15, 0.0);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert_eq!(k.len(), 15);
        for i in 0..7 {
            assert!((k[i] - k[14 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_blur_preserves_flat_regions() {
        let mut src = FrameBuffer::new(16, 16, PixelFormat::Rgb8);
        src.data.fill(200);
        let mut dst = FrameBuffer::new(16, 16, PixelFormat::Rgb8);
        gaussian_blur(&src, &mut dst, 5, 0.0);
        assert!(dst.data.iter().all(|&b| b == 200));
    }

    #[test]
    fn test_blur_spreads_impulse() {
        let mut src = FrameBuffer::new(9, 9, PixelFormat::Gray8);
        src.pixel_mut(4, 4)[0] = 255;
        let mut dst = FrameBuffer::new(9, 9, PixelFormat::Gray8);
        gaussian_blur(&src, &mut dst, 3, 1.0);
        assert!(dst.pixel(4, 4)[0] < 255);
        assert!(dst.pixel(3, 4)[0] > 0);
        assert!(dst.pixel(4, 3)[0] > 0);
    }
}
