//! Axis-aligned screen-space box.

use vek::*;


/// Axis-aligned box of pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScreenBox {
    /// Box minimum corner position.
    pub pos: Vec2<i32>,
    /// Box extent from `pos`. Assumed to be non-negative.
    pub ext: Extent2<i32>,
}

impl ScreenBox {
    /// Smallest box containing both points, inclusive.
    pub fn around(a: Vec2<i32>, b: Vec2<i32>) -> Self {
        let min: Vec2<i32> = Vec2::partial_min(a, b);
        let max: Vec2<i32> = Vec2::partial_max(a, b);
        ScreenBox {
            pos: min,
            ext: Extent2::new(max.x - min.x + 1, max.y - min.y + 1),
        }
    }

    /// Move the minimum corner backwards and the maximum corner forwards on
    /// both axes by `amount`.
    pub fn expand(mut self, amount: i32) -> Self {
        self.pos -= Vec2::from(amount);
        self.ext += Extent2::from(amount * 2);
        self
    }

    /// Does self intersect with `rhs`?
    pub fn intersects(self, rhs: ScreenBox) -> bool {
        for i in 0..2 {
            let (pos, ext) = (self.pos[i], [self.ext.w, self.ext.h][i]);
            let (rhs_pos, rhs_ext) = (rhs.pos[i], [rhs.ext.w, rhs.ext.h][i]);
            if pos >= rhs_pos + rhs_ext {
                return false;
            }
            if pos + ext <= rhs_pos {
                return false;
            }
        }
        true
    }
}


#[test]
fn test_around_and_intersects() {
    let a = ScreenBox::around(Vec2::new(10, 5), Vec2::new(2, 8));
    assert_eq!(a.pos, Vec2::new(2, 5));
    assert_eq!(a.ext, Extent2::new(9, 4));
    // one pixel boxes at the far corner
    let corner = |x, y| ScreenBox { pos: Vec2::new(x, y), ext: Extent2::new(1, 1) };
    assert!(a.intersects(corner(10, 8)));
    assert!(!a.intersects(corner(11, 8)));
    assert!(!a.intersects(corner(10, 9)));

    let b = ScreenBox { pos: Vec2::new(11, 0), ext: Extent2::new(5, 5) };
    assert!(!a.intersects(b));
    assert!(a.expand(1).intersects(b));
    assert!(b.expand(1).intersects(a));
}
