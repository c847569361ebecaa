//! RGB to HSV conversion, OpenCV 8-bit convention (hue 0..=179).

/// Convert one RGB pixel to HSV.
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = (v - min) as f32;

    let s = if v == 0 {
        0.0
    } else {
        diff * 255.0 / v as f32
    };

    let h = if diff == 0.0 {
        0.0
    } else {
        let (rf, gf, bf) = (r as f32, g as f32, b as f32);
        let h = if v == r {
            60.0 * (gf - bf) / diff
        } else if v == g {
            120.0 + 60.0 * (bf - rf) / diff
        } else {
            240.0 + 60.0 * (rf - gf) / diff
        };
        if h < 0.0 {
            h + 360.0
        } else {
            h
        }
    };

    [
        (h / 2.0).round().min(179.0) as u8,
        s.round().min(255.0) as u8,
        v,
    ]
}
