// crates/velocut-core/src/helpers/geometry.rs
//
// Integer pixel geometry for frames and the compositor.
//
// Coordinates are signed so a layer can be positioned partially off-canvas;
// sizes are unsigned. Rectangles are half-open: a Rect covers
// [x, x + width) × [y, y + height).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width:  u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x:      i32,
    pub y:      i32,
    pub width:  u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rect at the origin covering a whole `size`.
    pub const fn from_size(size: Size) -> Self {
        Self { x: 0, y: 0, width: size.width, height: size.height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// One past the last column.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// One past the last row.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn translate(&self, by: Point) -> Rect {
        Rect { x: self.x + by.x, y: self.y + by.y, ..*self }
    }

    /// True when `other` lies entirely inside `self`. An empty `other`
    /// is contained as long as its origin is.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Overlap of two rects; empty (zero-sized) when they do not touch.
    ///
    /// ```
    /// use velocut_core::helpers::geometry::Rect;
    /// let a = Rect::new(0, 0, 10, 10);
    /// let b = Rect::new(5, -5, 10, 10);
    /// assert_eq!(a.intersect(&b), Rect::new(5, 0, 5, 5));
    /// assert!(a.intersect(&Rect::new(20, 20, 2, 2)).is_empty());
    /// ```
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = (self.x as i64).max(other.x as i64);
        let y0 = (self.y as i64).max(other.y as i64);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return Rect::new(x0 as i32, y0 as i32, 0, 0);
        }
        Rect::new(x0 as i32, y0 as i32, (x1 - x0) as u32, (y1 - y0) as u32)
    }
}

/// Scale `content` to fit inside `bounds` preserving aspect ratio and centre
/// it. Returns the placed rect (in `bounds` coordinates) and the scale factor.
///
/// The factor is computed once and is what every layer of a composite uses,
/// so all layers share one coordinate space. Partial pixels are truncated.
///
/// ```
/// use velocut_core::helpers::geometry::{fit_centered, Rect, Size};
/// let (rect, scale) = fit_centered(Size::new(1920, 1080), Size::new(960, 960));
/// assert_eq!(rect, Rect::new(0, 210, 960, 540));
/// assert!((scale - 0.5).abs() < 1e-9);
/// ```
pub fn fit_centered(content: Size, bounds: Size) -> (Rect, f64) {
    if content.is_empty() || bounds.is_empty() {
        return (Rect::default(), 0.0);
    }
    let sx = bounds.width as f64 / content.width as f64;
    let sy = bounds.height as f64 / content.height as f64;
    let scale = sx.min(sy);

    let w = ((content.width as f64 * scale) as u32).min(bounds.width);
    let h = ((content.height as f64 * scale) as u32).min(bounds.height);
    let x = ((bounds.width - w) / 2) as i32;
    let y = ((bounds.height - h) / 2) as i32;
    (Rect::new(x, y, w, h), scale)
}
