// crates/velocut-core/src/helpers/pixel.rs
//
// Byte-level pixel operations on packed RGBA8 buffers (no stride padding,
// 4 bytes per pixel, row-major).
//
// Blending happens in gamma-encoded byte space with integer math, which is
// what the compositor needs for per-layer uniform opacity. Callers clip their
// rects to the buffer first; these helpers assert in debug builds only.

use crate::helpers::geometry::Rect;

pub const RGBA_BLACK: [u8; 4] = [0, 0, 0, 255];

/// Blend `src` over `dst` with an 8-bit `opacity`.
///
/// `opacity = 0` → `dst`, `opacity = 255` → `src`. Rounded to nearest.
#[inline]
pub fn blend_u8(dst: u8, src: u8, opacity: u8) -> u8 {
    let o = opacity as u32;
    ((src as u32 * o + dst as u32 * (255 - o) + 127) / 255) as u8
}

/// Byte offset of pixel (`x`, `y`) in a packed RGBA buffer `width` pixels wide.
#[inline]
pub fn rgba_offset(x: u32, y: u32, width: u32) -> usize {
    (y as usize * width as usize + x as usize) * 4
}

/// Fill `rect` (already clipped to the buffer) with `color`.
pub fn fill_rect(buf: &mut [u8], width: u32, rect: Rect, color: [u8; 4]) {
    if rect.is_empty() {
        return;
    }
    debug_assert!(rect.x >= 0 && rect.y >= 0, "fill_rect: rect {rect:?} not clipped");
    for row in rect.y as u32..rect.y as u32 + rect.height {
        let start = rgba_offset(rect.x as u32, row, width);
        let end = start + rect.width as usize * 4;
        for px in buf[start..end].chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }
}

/// Draw a one-pixel outline just inside `rect` (already clipped).
pub fn outline_rect(buf: &mut [u8], width: u32, rect: Rect, color: [u8; 4]) {
    if rect.is_empty() {
        return;
    }
    let (x, y) = (rect.x, rect.y);
    let (w, h) = (rect.width, rect.height);
    fill_rect(buf, width, Rect::new(x, y, w, 1), color);
    fill_rect(buf, width, Rect::new(x, y + h as i32 - 1, w, 1), color);
    fill_rect(buf, width, Rect::new(x, y, 1, h), color);
    fill_rect(buf, width, Rect::new(x + w as i32 - 1, y, 1, h), color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_u8_endpoints() {
        assert_eq!(blend_u8(10, 200, 0), 10);
        assert_eq!(blend_u8(10, 200, 255), 200);
        assert_eq!(blend_u8(0, 255, 255), 255);
    }

    #[test]
    fn blend_u8_midpoint() {
        // (200·128 + 100·127 + 127) / 255 = 150
        assert_eq!(blend_u8(100, 200, 128), 150);
    }

    #[test]
    fn fill_rect_touches_only_rect() {
        let mut buf = vec![0u8; 4 * 4 * 4];
        fill_rect(&mut buf, 4, Rect::new(1, 1, 2, 2), [9, 9, 9, 9]);
        for y in 0..4 {
            for x in 0..4 {
                let inside = (1..3).contains(&x) && (1..3).contains(&y);
                let px = &buf[rgba_offset(x, y, 4)..rgba_offset(x, y, 4) + 4];
                assert_eq!(px == [9, 9, 9, 9], inside, "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn outline_leaves_interior_untouched() {
        let mut buf = vec![0u8; 5 * 5 * 4];
        outline_rect(&mut buf, 5, Rect::new(0, 0, 5, 5), [1, 2, 3, 4]);
        assert_eq!(&buf[rgba_offset(0, 0, 5)..rgba_offset(0, 0, 5) + 4], &[1, 2, 3, 4]);
        assert_eq!(&buf[rgba_offset(4, 4, 5)..rgba_offset(4, 4, 5) + 4], &[1, 2, 3, 4]);
        assert_eq!(&buf[rgba_offset(2, 2, 5)..rgba_offset(2, 2, 5) + 4], &[0, 0, 0, 0]);
    }
}
