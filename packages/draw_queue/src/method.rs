//! Drawing methods and the accumulators they draw through.

use crate::canvas::CanvasRegion;
use std::fmt::Debug;
use vek::*;


/// A recorded point: screen position, depth, and stroke size.
///
/// For lines `size` is the stroke width at that end, for points it is the
/// radius.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DrawPoint {
    pub pos: Vec2<i32>,
    pub depth: u32,
    pub size: u32,
}

impl DrawPoint {
    pub fn new(pos: Vec2<i32>, depth: u32, size: u32) -> Self {
        DrawPoint { pos, depth, size }
    }

    /// Translated by `offset`.
    pub fn offset(mut self, offset: Vec2<i32>) -> Self {
        self.pos += offset;
        self
    }
}


/// Where a drawing method puts primitives before they reach the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum Accum {
    /// Straight to the canvas.
    Canvas,
    /// Buffered, to be composited together when flushed.
    Cluster(Vec<DrawPoint>),
}

impl Accum {
    /// Empty cluster accumulator.
    pub fn cluster() -> Self {
        Accum::Cluster(Vec::new())
    }
}


/// A way of drawing lines and points onto a canvas region.
///
/// Implementations receive the current accumulator with every call and may
/// buffer primitives in it until `flush`.
pub trait DrawMethod: Debug + Send + Sync {
    fn draw_line(&self, from: DrawPoint, to: DrawPoint, accum: &mut Accum, dst: &mut CanvasRegion);

    fn draw_point(&self, at: DrawPoint, accum: &mut Accum, dst: &mut CanvasRegion);

    /// Composite anything buffered in the accumulator.
    fn flush(&self, accum: &mut Accum, dst: &mut CanvasRegion) {
        let _ = (accum, dst);
    }

    /// How many pixels a line may reach beyond the box around its endpoints.
    fn line_margin(&self, from: DrawPoint, to: DrawPoint) -> i32 {
        (from.size.max(to.size) / 2 + 1) as i32
    }

    /// How many pixels a point may reach beyond its position.
    fn point_margin(&self, at: DrawPoint) -> i32 {
        at.size as i32 + 1
    }
}


/// Plain single-colour strokes and discs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Solid {
    pub colour: Rgb<u8>,
}

impl DrawMethod for Solid {
    fn draw_line(&self, from: DrawPoint, to: DrawPoint, _: &mut Accum, dst: &mut CanvasRegion) {
        dst.draw_line(from, to, self.colour);
    }

    fn draw_point(&self, at: DrawPoint, _: &mut Accum, dst: &mut CanvasRegion) {
        dst.draw_disc(at.pos, at.size, at.depth, self.colour);
    }
}


/// Clumps of leaves. Points drawn into a cluster accumulator are merged into
/// one silhouette when flushed: every outline disc is drawn before any fill
/// disc, so outlines only show at the edge of the clump.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Foliage {
    pub fill: Rgb<u8>,
    pub outline: Rgb<u8>,
    /// Outline thickness in pixels.
    pub outline_width: u32,
}

impl Foliage {
    fn draw_disc(&self, at: DrawPoint, dst: &mut CanvasRegion) {
        dst.draw_disc(at.pos, at.size + self.outline_width, at.depth, self.outline);
        dst.draw_disc(at.pos, at.size, at.depth.saturating_sub(1), self.fill);
    }
}

impl DrawMethod for Foliage {
    fn draw_line(&self, from: DrawPoint, to: DrawPoint, _: &mut Accum, dst: &mut CanvasRegion) {
        dst.draw_line(from, to, self.outline);
    }

    fn draw_point(&self, at: DrawPoint, accum: &mut Accum, dst: &mut CanvasRegion) {
        match accum {
            &mut Accum::Cluster(ref mut points) => points.push(at),
            &mut Accum::Canvas => self.draw_disc(at, dst),
        }
    }

    fn flush(&self, accum: &mut Accum, dst: &mut CanvasRegion) {
        if let &mut Accum::Cluster(ref mut points) = accum {
            for &at in points.iter() {
                dst.draw_disc(at.pos, at.size + self.outline_width, at.depth, self.outline);
            }
            // fills sit just in front of their own clump's outlines
            for &at in points.iter() {
                dst.draw_disc(at.pos, at.size, at.depth.saturating_sub(1), self.fill);
            }
            points.clear();
        }
    }

    fn point_margin(&self, at: DrawPoint) -> i32 {
        (at.size + self.outline_width) as i32 + 1
    }
}


#[cfg(test)]
use crate::canvas::Canvas;

#[test]
fn test_foliage_cluster_outlines_under_fills() {
    let foliage = Foliage {
        fill: Rgb::green(),
        outline: Rgb::black(),
        outline_width: 1,
    };
    let mut canvas = Canvas::new(32, 16);
    let mut region = canvas.region();
    let mut accum = Accum::cluster();
    foliage.draw_point(DrawPoint::new(Vec2::new(10, 8), 100, 4), &mut accum, &mut region);
    foliage.draw_point(DrawPoint::new(Vec2::new(15, 8), 100, 4), &mut accum, &mut region);
    assert_eq!(region.writes(), 0);
    assert_eq!(accum, Accum::Cluster(vec![
        DrawPoint::new(Vec2::new(10, 8), 100, 4),
        DrawPoint::new(Vec2::new(15, 8), 100, 4),
    ]));

    foliage.flush(&mut accum, &mut region);
    assert_eq!(accum, Accum::cluster());
    // the second disc's outline does not cut into the first disc's fill
    assert_eq!(region.pixel(13, 8), Some(Rgb::green()));
    assert_eq!(region.pixel(10, 8), Some(Rgb::green()));
    // but the clump is outlined at its edge
    assert_eq!(region.pixel(5, 8), Some(Rgb::black()));
    assert_eq!(region.pixel(20, 8), Some(Rgb::black()));
}
