//! Binary morphology on 0/255 masks with a 5x5 elliptical element.

use roiview_core::FrameBuffer;

/// 5x5 elliptical structuring element, row-major (matches OpenCV's
/// `getStructuringElement(MORPH_ELLIPSE, Size(5, 5))`).
const ELLIPSE_5X5: [[u8; 5]; 5] = [
    [0, 0, 1, 0, 0],
    [1, 1, 1, 1, 1],
    [1, 1, 1, 1, 1],
    [1, 1, 1, 1, 1],
    [0, 0, 1, 0, 0],
];

fn morph(mask: &FrameBuffer, out: &mut FrameBuffer, erode: bool) {
    let w = mask.width as i64;
    let h = mask.height as i64;
    for y in 0..h {
        for x in 0..w {
            let mut keep = erode;
            'se: for (dy, se_row) in ELLIPSE_5X5.iter().enumerate() {
                for (dx, &on) in se_row.iter().enumerate() {
                    if on == 0 {
                        continue;
                    }
                    let sx = x + dx as i64 - 2;
                    let sy = y + dy as i64 - 2;
                    if sx < 0 || sy < 0 || sx >= w || sy >= h {
                        continue; // out-of-bounds taps are ignored
                    }
                    let set = mask.pixel(sx as u32, sy as u32)[0] != 0;
                    if erode && !set {
                        keep = false;
                        break 'se;
                    }
                    if !erode && set {
                        keep = true;
                        break 'se;
                    }
                }
            }
            out.pixel_mut(x as u32, y as u32)[0] = if keep { 255 } else { 0 };
        }
    }
}

/// Erode then dilate: removes speckle noise.
pub fn open(mask: &mut FrameBuffer, scratch: &mut FrameBuffer) {
    morph(mask, scratch, true);
    morph(scratch, mask, false);
}

/// Dilate then erode: fills small holes.
pub fn close(mask: &mut FrameBuffer, scratch: &mut FrameBuffer) {
    morph(mask, scratch, false);
    morph(scratch, mask, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use roiview_core::PixelFormat;

    fn mask_with(pixels: &[(u32, u32)]) -> FrameBuffer {
        let mut m = FrameBuffer::new(16, 16, PixelFormat::Gray8);
        for &(x, y) in pixels {
            m.pixel_mut(x, y)[0] = 255;
        }
        m
    }

    #[test]
    fn test_open_removes_isolated_pixel() {
        let mut mask = mask_with(&[(8, 8)]);
        let mut scratch = FrameBuffer::new(16, 16, PixelFormat::Gray8);
        open(&mut mask, &mut scratch);
        assert!(mask.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_open_keeps_large_blob() {
        let pixels: Vec<_> = (2..14).flat_map(|y| (2..14).map(move |x| (x, y))).collect();
        let mut mask = mask_with(&pixels);
        let mut scratch = FrameBuffer::new(16, 16, PixelFormat::Gray8);
        open(&mut mask, &mut scratch);
        assert_eq!(mask.pixel(8, 8)[0], 255);
    }

    #[test]
    fn test_close_fills_small_hole() {
        let pixels: Vec<_> = (2..14)
            .flat_map(|y| (2..14).map(move |x| (x, y)))
            .filter(|&(x, y)| !(x == 8 && y == 8))
            .collect();
        let mut mask = mask_with(&pixels);
        let mut scratch = FrameBuffer::new(16, 16, PixelFormat::Gray8);
        close(&mut mask, &mut scratch);
        assert_eq!(mask.pixel(8, 8)[0], 255);
    }
}
