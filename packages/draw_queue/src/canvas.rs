//! Software canvas and the disjoint column regions it splits into.

use crate::{
    screen_box::ScreenBox,
    method::DrawPoint,
};
use vek::*;


/// Depth of a pixel nothing has been drawn to.
pub const DEPTH_FAR: u32 = u32::MAX;


/// RGB pixel buffer with a depth buffer. Stored column-major, so that a run of
/// columns is a contiguous run of memory.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    colour: Vec<Rgb<u8>>,
    depth: Vec<u32>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Canvas {
            width,
            height,
            colour: vec![Rgb::zero(); len],
            depth: vec![DEPTH_FAR; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Extent2<u32> {
        Extent2::new(self.width, self.height)
    }

    /// Fill with a colour and reset the depth buffer.
    pub fn clear(&mut self, colour: Rgb<u8>) {
        self.colour.fill(colour);
        self.depth.fill(DEPTH_FAR);
    }

    /// Colour of pixel <x,y>. Panics if out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        self.colour[x as usize * self.height as usize + y as usize]
    }

    /// Depth of pixel <x,y>. Panics if out of bounds.
    pub fn depth(&self, x: u32, y: u32) -> u32 {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        self.depth[x as usize * self.height as usize + y as usize]
    }

    /// The whole canvas as one region.
    pub fn region(&mut self) -> CanvasRegion {
        CanvasRegion::new(0, self.width, self.height, &mut self.colour, &mut self.depth)
    }

    /// Split into `n` regions of whole columns with near-equal widths,
    /// ordered left to right. Regions may be empty if `n` exceeds the width.
    pub fn regions(&mut self, n: usize) -> Vec<CanvasRegion> {
        assert!(n > 0, "cannot split canvas into 0 regions");
        let height = self.height;
        let mut colour = &mut self.colour[..];
        let mut depth = &mut self.depth[..];
        let mut regions = Vec::with_capacity(n);
        let mut x0 = 0;
        for i in 0..n {
            let x1 = ((i as u64 + 1) * self.width as u64 / n as u64) as u32;
            let len = (x1 - x0) as usize * height as usize;
            let (colour_head, colour_tail) = colour.split_at_mut(len);
            let (depth_head, depth_tail) = depth.split_at_mut(len);
            colour = colour_tail;
            depth = depth_tail;
            regions.push(CanvasRegion::new(x0, x1 - x0, height, colour_head, depth_head));
            x0 = x1;
        }
        regions
    }
}


/// Mutable view of a strip of whole columns of a canvas. Coordinates passed to
/// its drawing operations are canvas coordinates; anything outside the strip
/// is discarded.
#[derive(Debug)]
pub struct CanvasRegion<'a> {
    x0: i32,
    width: i32,
    height: i32,
    colour: &'a mut [Rgb<u8>],
    depth: &'a mut [u32],
    writes: u64,
}

impl<'a> CanvasRegion<'a> {
    fn new(
        x0: u32,
        width: u32,
        height: u32,
        colour: &'a mut [Rgb<u8>],
        depth: &'a mut [u32],
    ) -> Self {
        debug_assert_eq!(colour.len(), width as usize * height as usize);
        CanvasRegion {
            x0: x0 as i32,
            width: width as i32,
            height: height as i32,
            colour,
            depth,
            writes: 0,
        }
    }

    /// Leftmost column, in canvas coordinates.
    pub fn x0(&self) -> i32 {
        self.x0
    }

    /// One past the rightmost column, in canvas coordinates.
    pub fn x1(&self) -> i32 {
        self.x0 + self.width
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Bounds of the region in canvas coordinates.
    pub fn bounds(&self) -> ScreenBox {
        ScreenBox {
            pos: Vec2::new(self.x0, 0),
            ext: Extent2::new(self.width, self.height),
        }
    }

    /// Number of pixels written since construction or the last
    /// `reset_writes`.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn reset_writes(&mut self) {
        self.writes = 0;
    }

    fn idx(&self, x: i32, y: i32) -> Option<usize> {
        let lx = x - self.x0;
        if lx < 0 || lx >= self.width || y < 0 || y >= self.height {
            None
        } else {
            Some(lx as usize * self.height as usize + y as usize)
        }
    }

    /// Colour of pixel <x,y>, if within the region.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb<u8>> {
        self.idx(x, y).map(|i| self.colour[i])
    }

    /// Depth of pixel <x,y>, if within the region.
    pub fn depth(&self, x: i32, y: i32) -> Option<u32> {
        self.idx(x, y).map(|i| self.depth[i])
    }

    /// Depth-tested pixel write. Returns whether it was written.
    pub fn put_pixel(&mut self, x: i32, y: i32, depth: u32, colour: Rgb<u8>) -> bool {
        match self.idx(x, y) {
            Some(i) if depth <= self.depth[i] => {
                self.colour[i] = colour;
                self.depth[i] = depth;
                self.writes += 1;
                true
            }
            _ => false,
        }
    }

    // clip a row range of column x to the region, yielding the index range
    fn column_range(&self, x: i32, y0: i32, y1: i32) -> Option<(usize, usize)> {
        let lx = x - self.x0;
        if lx < 0 || lx >= self.width {
            return None;
        }
        let y0 = y0.max(0);
        let y1 = y1.min(self.height);
        if y0 >= y1 {
            return None;
        }
        let base = lx as usize * self.height as usize;
        Some((base + y0 as usize, base + y1 as usize))
    }

    /// Fill rows `[y0, y1)` of column `x` without depth testing, resetting
    /// their depth to `DEPTH_FAR`.
    pub fn fill_column(&mut self, x: i32, y0: i32, y1: i32, colour: Rgb<u8>) {
        if let Some((i0, i1)) = self.column_range(x, y0, y1) {
            self.colour[i0..i1].fill(colour);
            self.depth[i0..i1].fill(DEPTH_FAR);
            self.writes += (i1 - i0) as u64;
        }
    }

    /// Depth-tested fill of rows `[y0, y1)` of column `x`.
    pub fn fill_span(&mut self, x: i32, y0: i32, y1: i32, depth: u32, colour: Rgb<u8>) {
        if let Some((i0, i1)) = self.column_range(x, y0, y1) {
            for i in i0..i1 {
                if depth <= self.depth[i] {
                    self.colour[i] = colour;
                    self.depth[i] = depth;
                    self.writes += 1;
                }
            }
        }
    }

    /// Filled disc of the given radius. Radius 0 is one pixel.
    pub fn draw_disc(&mut self, centre: Vec2<i32>, radius: u32, depth: u32, colour: Rgb<u8>) {
        let r = radius.min(1 << 20) as i64;
        let (cx, cy) = (centre.x as i64, centre.y as i64);
        let row0 = (cy - r).max(0);
        let row1 = (cy + r + 1).min(self.height as i64);
        for y in row0..row1 {
            let dy = y - cy;
            let half = ((r * r - dy * dy) as f64).sqrt() as i64;
            let col0 = (cx - half).max(self.x0 as i64);
            let col1 = (cx + half + 1).min(self.x1() as i64);
            for x in col0..col1 {
                self.put_pixel(x as i32, y as i32, depth, colour);
            }
        }
    }

    /// Thick line between two points. Thickness and depth are interpolated
    /// from the `size` and `depth` of the endpoints.
    pub fn draw_line(&mut self, from: DrawPoint, to: DrawPoint, colour: Rgb<u8>) {
        // clip the parametric line to the region grown by the stroke width
        let margin = from.size.max(to.size) as f64 / 2.0 + 1.0;
        let a = from.pos.map(|n| n as f64);
        let b = to.pos.map(|n| n as f64);
        let d = b - a;
        let min = Vec2::new(self.x0 as f64 - margin, -margin);
        let max = Vec2::new(self.x1() as f64 + margin, self.height as f64 + margin);
        let (mut t0, mut t1) = (0.0f64, 1.0f64);
        for i in 0..2 {
            if d[i] == 0.0 {
                if a[i] < min[i] || a[i] > max[i] {
                    return;
                }
            } else {
                let mut ta = (min[i] - a[i]) / d[i];
                let mut tb = (max[i] - a[i]) / d[i];
                if ta > tb {
                    std::mem::swap(&mut ta, &mut tb);
                }
                t0 = t0.max(ta);
                t1 = t1.min(tb);
            }
        }
        if t0 > t1 {
            return;
        }

        // step one pixel at a time along the major axis
        let major = if d.x.abs() >= d.y.abs() { 0 } else { 1 };
        let minor = 1 - major;
        let (m0, m1) = {
            let e0 = a[major] + d[major] * t0;
            let e1 = a[major] + d[major] * t1;
            (e0.min(e1).round() as i64, e0.max(e1).round() as i64)
        };
        for m in m0..=m1 {
            let t =
                if d[major] == 0.0 { 0.0 }
                else { ((m as f64 - a[major]) / d[major]).clamp(0.0, 1.0) };
            let n = (a[minor] + d[minor] * t).round() as i64;
            let size = from.size as f64 + (to.size as f64 - from.size as f64) * t;
            let depth = (from.depth as f64 + (to.depth as f64 - from.depth as f64) * t) as u32;
            let w = (size.round() as i64).max(1);
            // run of pixels across the minor axis
            for k in 0..w {
                let mut p = [0i64; 2];
                p[major] = m;
                p[minor] = n + k - w / 2;
                self.put_pixel(p[0] as i32, p[1] as i32, depth, colour);
            }
        }
    }
}


#[test]
fn test_regions_are_disjoint_strips() {
    let mut canvas = Canvas::new(10, 4);
    {
        let mut regions = canvas.regions(3);
        assert_eq!(regions.len(), 3);
        let widths = regions.iter().map(|r| r.width()).collect::<Vec<_>>();
        assert_eq!(widths.iter().sum::<i32>(), 10);
        assert_eq!(regions[0].x0(), 0);
        assert_eq!(regions[1].x0(), regions[0].x1());
        assert_eq!(regions[2].x1(), 10);
        for (i, region) in regions.iter_mut().enumerate() {
            for x in region.x0()..region.x1() {
                region.fill_column(x, 0, 4, Rgb::new(i as u8, 0, 0));
            }
            // out of strip writes are discarded
            assert!(!region.put_pixel(region.x1(), 0, 0, Rgb::white()));
        }
    }
    for x in 0..10 {
        let expected = if x < 3 { 0 } else if x < 6 { 1 } else { 2 };
        for y in 0..4 {
            assert_eq!(canvas.pixel(x, y).r, expected);
        }
    }
}

#[test]
fn test_depth_test() {
    let mut canvas = Canvas::new(4, 4);
    let mut region = canvas.region();
    assert!(region.put_pixel(1, 1, 100, Rgb::red()));
    assert!(!region.put_pixel(1, 1, 200, Rgb::green()));
    assert!(region.put_pixel(1, 1, 50, Rgb::blue()));
    assert_eq!(region.writes(), 2);
    assert_eq!(region.pixel(1, 1), Some(Rgb::blue()));
    assert_eq!(region.depth(1, 1), Some(50));
}

#[test]
fn test_far_line_is_clipped() {
    let mut canvas = Canvas::new(8, 8);
    let mut region = canvas.region();
    let point = |x, y| DrawPoint { pos: Vec2::new(x, y), depth: 1, size: 1 };
    // extremely long line crossing the canvas
    region.draw_line(point(-(1 << 24), 4), point(1 << 24, 4), Rgb::white());
    for x in 0..8 {
        assert_eq!(region.pixel(x, 4), Some(Rgb::white()));
    }
    assert_eq!(region.writes(), 8);

    region.reset_writes();
    region.draw_line(point(-100, -100), point(-50, 200), Rgb::white());
    assert_eq!(region.writes(), 0);
}

#[test]
fn test_steep_lines() {
    let mut canvas = Canvas::new(16, 16);
    let mut region = canvas.region();
    let point = |x, y| DrawPoint { pos: Vec2::new(x, y), depth: 1, size: 1 };
    region.draw_line(point(3, 2), point(3, 12), Rgb::white());
    for y in 2..=12 {
        assert_eq!(region.pixel(3, y), Some(Rgb::white()));
    }
    assert_eq!(region.writes(), 11);
    // nothing lands in the transposed column
    assert_eq!(region.pixel(2, 3), Some(Rgb::black()));

    region.reset_writes();
    region.draw_line(point(8, 2), point(12, 14), Rgb::red());
    assert_eq!(region.writes(), 13);
    assert_eq!(region.pixel(8, 2), Some(Rgb::red()));
    assert_eq!(region.pixel(12, 14), Some(Rgb::red()));
    // one pixel per row
    for y in 2..=14 {
        let row = (0..16).filter(|&x| region.pixel(x, y) == Some(Rgb::red())).count();
        assert_eq!(row, 1);
    }
}

#[test]
fn test_disc() {
    let mut canvas = Canvas::new(16, 16);
    let mut region = canvas.region();
    region.draw_disc(Vec2::new(8, 8), 2, 1, Rgb::white());
    assert_eq!(region.pixel(8, 8), Some(Rgb::white()));
    assert_eq!(region.pixel(10, 8), Some(Rgb::white()));
    assert_eq!(region.pixel(10, 10), Some(Rgb::black()));
    assert_eq!(region.writes(), 13);
}
