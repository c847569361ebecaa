//! External contour extraction from binary masks.
//!
//! Moore neighbor tracing with Jacob's stopping criterion; only outer
//! boundaries are produced, matching `RETR_EXTERNAL` behavior.

use roiview_core::FrameBuffer;

/// Clockwise 8-neighborhood, starting west.
const NEIGHBORS: [(i64, i64); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

#[inline]
fn is_set(mask: &FrameBuffer, x: i64, y: i64) -> bool {
    x >= 0
        && y >= 0
        && x < mask.width as i64
        && y < mask.height as i64
        && mask.pixel(x as u32, y as u32)[0] != 0
}

/// Trace the external contours of a 0/255 mask.
pub fn find_external_contours(mask: &FrameBuffer) -> Vec<Vec<(u32, u32)>> {
    let w = mask.width as i64;
    let h = mask.height as i64;
    let mut visited = vec![false; (w * h) as usize];
    let mut contours = Vec::new();

    for y in 0..h {
        for x in 0..w {
            // A boundary start: foreground pixel whose west neighbor is
            // background, not already part of a traced contour.
            if !is_set(mask, x, y) || is_set(mask, x - 1, y) || visited[(y * w + x) as usize] {
                continue;
            }

            let start = (x, y);
            let mut contour = Vec::new();
            let mut current = start;
            // Backtrack direction: we entered from the west.
            let mut backtrack = 0usize;
            // Upper bound on boundary length, guards the tracer.
            let mut budget = (4 * w * h) as usize;

            while budget > 0 {
                budget -= 1;
                visited[(current.1 * w + current.0) as usize] = true;
                contour.push((current.0 as u32, current.1 as u32));

                // Scan clockwise from the backtrack direction.
                let mut found = None;
                for i in 1..=8 {
                    let dir = (backtrack + i) % 8;
                    let (dx, dy) = NEIGHBORS[dir];
                    let next = (current.0 + dx, current.1 + dy);
                    if is_set(mask, next.0, next.1) {
                        // New backtrack points at the previous (empty)
                        // neighbor, i.e. one step counter-clockwise.
                        backtrack = (dir + 4) % 8;
                        found = Some(next);
                        break;
                    }
                }

                match found {
                    None => break, // isolated pixel
                    Some(next) => {
                        if next == start && contour.len() > 1 {
                            break;
                        }
                        current = next;
                    }
                }
            }

            contours.push(contour);
        }
    }

    contours
}

/// Draw contours onto an RGB frame with roughly 2px stroke.
pub fn draw_contours(
    frame: &mut FrameBuffer,
    offset_x: u32,
    offset_y: u32,
    contours: &[Vec<(u32, u32)>],
    color: [u8; 3],
) {
    for contour in contours {
        for &(cx, cy) in contour {
            let px = offset_x + cx;
            let py = offset_y + cy;
            for dy in 0..2u32 {
                for dx in 0..2u32 {
                    let x = px + dx;
                    let y = py + dy;
                    if x < frame.width && y < frame.height {
                        frame.pixel_mut(x, y).copy_from_slice(&color);
                    }
                }
            }
        }
    }
}
