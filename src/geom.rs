//! Integer rectangles and points in pixel coordinates.

/// A point in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IPoint {
    pub x: i32,
    pub y: i32,
}

/// A half-open rectangle of pixels, `[left, right) × [top, bottom)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        IPoint { x, y }
    }
}

impl IRect {
    pub const fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        IRect {
            left,
            top,
            right,
            bottom,
        }
    }

    /// A rectangle from its top left corner and its size.
    ///
    /// The far edges saturate instead of overflowing.
    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        IRect {
            left: x,
            top: y,
            right: x.saturating_add(width),
            bottom: y.saturating_add(height),
        }
    }

    /// A rectangle at the origin.
    pub const fn from_wh(width: i32, height: i32) -> Self {
        Self::from_xywh(0, 0, width, height)
    }

    pub const fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub const fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub const fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// The common area of both rectangles, if it is not empty.
    pub fn intersect(&self, other: &IRect) -> Option<IRect> {
        let rect = IRect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };

        if rect.is_empty() {
            None
        } else {
            Some(rect)
        }
    }

    pub const fn contains(&self, x: i32, y: i32) -> bool {
        self.left <= x && x < self.right && self.top <= y && y < self.bottom
    }

    pub const fn top_left(&self) -> IPoint {
        IPoint::new(self.left, self.top)
    }
}

#[test]
fn intersections() {
    let bounds = IRect::from_wh(4, 4);
    assert_eq!(
        bounds.intersect(&IRect::from_xywh(2, -1, 5, 2)),
        Some(IRect::from_ltrb(2, 0, 4, 1))
    );
    assert_eq!(bounds.intersect(&IRect::from_xywh(4, 0, 2, 2)), None);
    assert_eq!(bounds.intersect(&IRect::from_xywh(1, 1, 0, 2)), None);
    assert!(bounds.contains(3, 0));
    assert!(!bounds.contains(4, 0));
    assert_eq!(IRect::from_xywh(i32::MAX, 0, 10, 1).width(), 0);
}
