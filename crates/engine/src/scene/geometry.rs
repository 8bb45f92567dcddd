/// Integer axis-aligned rectangle in level pixel space.
///
/// `x`/`y` is the top-left corner; the rectangle covers the half-open ranges
/// `[x, x + w)` and `[y, y + h)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    /// Center point using integer halving of the extent.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }

    pub fn with_position(self, x: i32, y: i32) -> Self {
        Self { x, y, ..self }
    }

    pub fn translated(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// Strict overlap; rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Same rectangle grown by `margin` on every side.
    pub fn expanded(self, margin: i32) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            w: self.w + margin * 2,
            h: self.h + margin * 2,
        }
    }
}

/// Squared Euclidean distance between two rectangle centers.
pub fn center_distance_squared(a: &Rect, b: &Rect) -> i64 {
    let (ax, ay) = a.center();
    let (bx, by) = b.center();
    let dx = i64::from(ax - bx);
    let dy = i64::from(ay - by);
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0, 0, 8, 8);
        assert!(!a.intersects(&Rect::new(8, 0, 8, 8)));
        assert!(!a.intersects(&Rect::new(0, 8, 8, 8)));
        assert!(!a.intersects(&Rect::new(-8, -8, 8, 8)));
    }

    #[test]
    fn single_pixel_overlap_intersects() {
        let a = Rect::new(0, 0, 8, 8);
        assert!(a.intersects(&Rect::new(7, 7, 8, 8)));
        assert!(a.intersects(&Rect::new(-7, 0, 8, 8)));
    }

    #[test]
    fn zero_sized_rect_never_intersects() {
        let a = Rect::new(0, 0, 8, 8);
        assert!(!a.intersects(&Rect::new(4, 4, 0, 0)));
    }

    #[test]
    fn center_uses_integer_halving() {
        assert_eq!(Rect::new(10, 20, 9, 5).center(), (14, 22));
    }

    #[test]
    fn expanded_grows_each_side() {
        assert_eq!(Rect::new(8, 8, 4, 4).expanded(8), Rect::new(0, 0, 20, 20));
    }

    #[test]
    fn center_distance_is_squared_euclidean() {
        let a = Rect::new(0, 0, 2, 2);
        let b = Rect::new(3, 4, 2, 2);
        assert_eq!(center_distance_squared(&a, &b), 25);
    }
}
