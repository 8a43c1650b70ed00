//! The terrain horizon buffer.
//!
//! Terrain is sampled in polar coordinates around the camera: a _slice_ is
//! one direction out of a fixed power-of-two number per full turn, and a
//! _ring_ is one distance from the camera. The buffer holds one projected
//! sample per slice per ring, for a contiguous range of slices which narrows
//! from ring to ring as slices are found to be off screen.
//!
//! Rendering walks rings from near to far and, per screen column, fills from
//! each ring's interpolated top edge down to the highest edge drawn so far in
//! that column. Nearer terrain thus occludes farther terrain without any
//! depth test between rings.

use draw_queue::CanvasRegion;
use torus_math::*;
use vek::*;


/// How many slices a ring's high bound grows by while its last sample is
/// still on screen.
pub const LOOKAHEAD: u32 = 4;

/// Rings of no more than this many slices end the scan.
pub const MIN_SLICES: u32 = 4;


/// One projected terrain sample.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Sample {
    pub pos: Vec2<i32>,
    pub depth: u32,
    pub colour: Rgb<u8>,
    /// Pulled onto the near plane to project. Its edge is drawn straight
    /// rather than curved.
    pub clamped: bool,
}


/// One ring of samples, for slices `low..high`.
#[derive(Debug, Clone, Default)]
pub struct Ring {
    low: u32,
    high: u32,
    samples: Vec<Sample>,
}

impl Ring {
    pub fn low(&self) -> u32 {
        self.low
    }

    pub fn high(&self) -> u32 {
        self.high
    }

    /// Samples so far, in slice order starting at `low`.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    fn reset(&mut self, low: u32, high: u32) {
        self.low = low;
        self.high = high;
        self.samples.clear();
    }
}


/// A horizon strip cell: two adjacent samples of one ring, and their outer
/// neighbours for the spline through them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Slice index of the left sample.
    pub slice: u32,
    /// Left of `left`, or `left` itself at the start of the ring.
    pub before: Sample,
    pub left: Sample,
    pub right: Sample,
    /// Right of `right`, or `right` itself at the end of the ring.
    pub after: Sample,
}

impl Cell {
    /// Screen width. Always positive.
    pub fn width(&self) -> i32 {
        self.right.pos.x - self.left.pos.x
    }

    /// Whether the top edge must be drawn straight, as some of its spline
    /// points are not real projections.
    pub fn linear(&self) -> bool {
        self.before.clamped || self.left.clamped || self.right.clamped || self.after.clamped
    }
}


/// Counters from one `Terrabuff::render`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct RenderStats {
    pub rings: usize,
    pub spans: u64,
}


/// The terrain scan buffer. See the module docs.
///
/// Slice indices are unwrapped: a ring may run past `slice_cap` and the slice
/// a sample belongs to is its index modulo `slice_cap`.
#[derive(Debug, Clone)]
pub struct Terrabuff {
    slice_cap: u32,
    scan_cap: usize,
    screen_width: i32,
    // allocations are kept across frames. rings beyond `len` are stale.
    rings: Vec<Ring>,
    len: usize,
    pin_low: bool,
    pin_high: bool,
    // narrowing state of the current ring
    last_left: Option<u32>,
    first_right: Option<u32>,
}

impl Terrabuff {
    /// Construct with a power-of-two number of slices per turn and a maximum
    /// number of rings.
    pub fn new(slice_cap: u32, scan_cap: usize) -> Self {
        assert!(slice_cap.is_power_of_two(), "slice capacity must be a power of two");
        assert!(scan_cap > 0, "scan capacity must be positive");
        Terrabuff {
            slice_cap,
            scan_cap,
            screen_width: i32::MAX,
            rings: Vec::new(),
            len: 0,
            pin_low: false,
            pin_high: false,
            last_left: None,
            first_right: None,
        }
    }

    pub fn slice_cap(&self) -> u32 {
        self.slice_cap
    }

    pub fn scan_cap(&self) -> usize {
        self.scan_cap
    }

    /// Set the screen width samples are classified against when narrowing.
    /// Samples at or right of it are off screen.
    pub fn set_screen_width(&mut self, width: i32) {
        self.screen_width = width;
    }

    /// Start over with one empty ring spanning slices `[low, high)`.
    pub fn clear(&mut self, low: u32, high: u32) {
        self.clear_pinned(low, high, false, false);
    }

    /// Like `clear`, but sides which are pinned never move. Used when the
    /// slices are split between buffers, on the sides where a neighbouring
    /// buffer continues.
    pub fn clear_pinned(&mut self, low: u32, high: u32, pin_low: bool, pin_high: bool) {
        assert!(low <= high, "terrabuff bounds out of order");
        assert!(high - low <= self.slice_cap, "terrabuff bounds exceed slice capacity");
        self.pin_low = pin_low;
        self.pin_high = pin_high;
        self.len = 0;
        self.open_ring(low, high);
    }

    fn open_ring(&mut self, low: u32, high: u32) {
        if self.len == self.rings.len() {
            self.rings.push(Ring::default());
        }
        self.rings[self.len].reset(low, high);
        self.len += 1;
        self.last_left = None;
        self.first_right = None;
    }

    /// Number of rings, including the one being filled.
    pub fn num_rings(&self) -> usize {
        self.len
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings[..self.len]
    }

    /// The ring being filled.
    pub fn current(&self) -> &Ring {
        &self.rings[self.len - 1]
    }

    /// Slice bounds of the ring being filled.
    pub fn bounds(&self) -> (u32, u32) {
        let ring = self.current();
        (ring.low, ring.high)
    }

    /// Append the next sample of the ring being filled.
    ///
    /// If the sample is not right of the previous one on screen, it is moved
    /// to one pixel right of it. This papers over approximation error at
    /// extreme viewing angles.
    ///
    /// Panics if the ring is already full.
    pub fn put(&mut self, mut sample: Sample) {
        let ring = &mut self.rings[self.len - 1];
        let slice = ring.low + ring.samples.len() as u32;
        assert!(slice < ring.high, "terrabuff ring overflow");
        if let Some(prev) = ring.samples.last() {
            if sample.pos.x <= prev.pos.x {
                sample.pos.x = prev.pos.x + 1;
            }
        }
        if sample.pos.x < 0 {
            self.last_left = Some(slice);
        } else if sample.pos.x >= self.screen_width && self.first_right.is_none() {
            self.first_right = Some(slice);
        }
        ring.samples.push(sample);
    }

    /// Finish the ring being filled and open the next, with bounds narrowed
    /// to what was seen to be on screen: the low bound moves up to the last
    /// sample left of the screen, and the high bound moves down to one past
    /// the first sample right of the screen, or if there was none, grows by
    /// `LOOKAHEAD`.
    ///
    /// Returns false without opening a ring if the scan capacity is reached
    /// or if either the finished ring's or the next ring's bounds span no
    /// more than `MIN_SLICES`.
    pub fn next(&mut self) -> bool {
        let (low, high) = self.bounds();
        let mut low_next = low;
        let mut high_next = high;
        if !self.pin_low {
            if let Some(last_left) = self.last_left {
                low_next = last_left;
            }
        }
        if !self.pin_high {
            high_next = match self.first_right {
                Some(first_right) => first_right + 1,
                None => high + LOOKAHEAD,
            };
        }
        high_next = high_next.max(low_next).min(low_next + self.slice_cap);

        if self.len >= self.scan_cap
            || low + MIN_SLICES >= high
            || low_next + MIN_SLICES >= high_next
        {
            return false;
        }
        self.open_ring(low_next, high_next);
        true
    }

    /// Merge a buffer scanned over the slices adjoining this one's on the
    /// right, ring by ring.
    ///
    /// Where both have a ring, the other's samples beyond this one's high
    /// bound are appended, and samples at the seam are moved right as needed
    /// to keep screen X increasing. Where only the other has a ring, it is
    /// copied. A ring which does not meet this one's is skipped.
    pub fn merge(&mut self, other: &Terrabuff) {
        assert_eq!(self.slice_cap, other.slice_cap, "merging terrabuffs of different capacity");
        for (i, theirs) in other.rings().iter().enumerate() {
            if i >= self.len {
                if i > self.len {
                    break;
                }
                self.open_ring(theirs.low, theirs.high);
                self.rings[i].samples.extend_from_slice(&theirs.samples);
                continue;
            }
            let ours = &mut self.rings[i];
            let ours_end = ours.low + ours.samples.len() as u32;
            if theirs.low > ours_end {
                trace!(ring=%i, "terrabuff merge skipped disjoint ring");
                continue;
            }
            let skip = (ours_end - theirs.low) as usize;
            if skip >= theirs.samples.len() {
                continue;
            }
            let room = (ours.low + self.slice_cap).saturating_sub(ours_end) as usize;
            for &sample in theirs.samples[skip..].iter().take(room) {
                let mut sample = sample;
                if let Some(prev) = ours.samples.last() {
                    if sample.pos.x <= prev.pos.x {
                        sample.pos.x = prev.pos.x + 1;
                    }
                }
                ours.samples.push(sample);
            }
            ours.high = ours.low + ours.samples.len() as u32;
        }
    }

    /// Horizon strip cells of a ring, left to right.
    pub fn cells(&self, ring: usize) -> impl Iterator<Item=Cell> + '_ {
        let ring = &self.rings()[ring];
        let p = &ring.samples;
        (0..p.len().saturating_sub(1)).map(move |s| Cell {
            slice: ring.low + s as u32,
            before: p[s.saturating_sub(1)],
            left: p[s],
            right: p[s + 1],
            after: p[(s + 2).min(p.len() - 1)],
        })
    }

    /// Draw the terrain into a canvas region, nearest ring first.
    pub fn render(&self, dst: &mut CanvasRegion) -> RenderStats {
        let x0 = dst.x0();
        let x1 = dst.x1();
        let height = dst.height();
        // per column, the highest terrain edge drawn so far
        let mut ybuf = vec![height; dst.width() as usize];
        let mut stats = RenderStats::default();

        for i in 0..self.len {
            if self.rings[i].samples.len() < 2 {
                continue;
            }
            stats.rings += 1;
            for cell in self.cells(i) {
                let (a, b) = (cell.left, cell.right);
                if b.pos.x <= x0 || a.pos.x >= x1 {
                    continue;
                }
                let linear = cell.linear();
                let cell_width = cell.width() as u32;

                for x in a.pos.x.max(x0)..b.pos.x.min(x1) {
                    let t = Ratio::of((x - a.pos.x) as u32, cell_width);
                    let y =
                        if linear {
                            t.lerp(a.pos.y, b.pos.y)
                        } else {
                            catmull_rom(cell.before.pos.y, a.pos.y, b.pos.y, cell.after.pos.y, t)
                        };
                    let col = (x - x0) as usize;
                    let bottom = ybuf[col];
                    if y < bottom {
                        let depth = (a.depth as i64 + t.scale(b.depth as i64 - a.depth as i64)) as u32;
                        let colour = Rgb::new(
                            t.lerp_u8(a.colour.r, b.colour.r),
                            t.lerp_u8(a.colour.g, b.colour.g),
                            t.lerp_u8(a.colour.b, b.colour.b),
                        );
                        dst.fill_span(x, y, bottom, depth, colour);
                        ybuf[col] = y.max(0);
                        stats.spans += 1;
                    }
                }
            }
        }
        trace!(?stats, x0, "rendered terrain");
        stats
    }
}


/// Uniform Catmull-Rom spline through `p1` at zero and `p2` at one, with
/// tangents from `p0` and `p3`.
pub fn catmull_rom(p0: i32, p1: i32, p2: i32, p3: i32, t: Ratio) -> i32 {
    let (p0, p1, p2, p3) = (p0 as i64, p1 as i64, p2 as i64, p3 as i64);
    let t1 = t.0 as i64;
    let t2 = t1 * t1 >> RATIO_BITS;
    let t3 = t2 * t1 >> RATIO_BITS;
    let c1 = p2 - p0;
    let c2 = 2 * p0 - 5 * p1 + 4 * p2 - p3;
    let c3 = -p0 + 3 * p1 - 3 * p2 + p3;
    // each coefficient is bounded by a few times SCREEN_LIMIT
    let sum = (c1 * t1 >> RATIO_BITS) + (c2 * t2 >> RATIO_BITS) + (c3 * t3 >> RATIO_BITS);
    (p1 + sum / 2).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}


#[cfg(test)]
fn sample(x: i32, y: i32) -> Sample {
    Sample {
        pos: Vec2::new(x, y),
        depth: 1000,
        colour: Rgb::new(10, 200, 10),
        clamped: false,
    }
}

#[test]
fn test_put_keeps_screen_x_increasing() {
    use rand::Rng;
    use rand_pcg::Pcg32;

    let mut rng = Pcg32::new(0x2545f4914f6cdd1d, 0x9e3779b97f4a7c15);
    let mut tb = Terrabuff::new(1024, 8);
    tb.set_screen_width(640);
    for _ in 0..20 {
        tb.clear(100, 600);
        for _ in 100..600 {
            tb.put(sample(rng.gen_range(-200..900), rng.gen_range(0..480)));
        }
        let xs = tb.current().samples().iter().map(|s| s.pos.x).collect::<Vec<_>>();
        assert!(xs.windows(2).all(|w| w[0] < w[1]), "{:?}", xs);
    }
}

#[test]
fn test_small_ring_ends_scan() {
    let mut tb = Terrabuff::new(8, 4);
    tb.set_screen_width(100);
    tb.clear(0, 4);
    for (i, x) in [10, 30, 50, 70].into_iter().enumerate() {
        tb.put(sample(x, 40 + i as i32));
    }
    assert!(!tb.next());
    assert_eq!(tb.num_rings(), 1);
    let cells = tb.cells(0).collect::<Vec<_>>();
    assert_eq!(cells.len(), 3);
    assert!(cells.iter().all(|cell| cell.width() > 0));

    let mut canvas = draw_queue::Canvas::new(100, 64);
    let mut region = canvas.region();
    let stats = tb.render(&mut region);
    assert_eq!(stats.rings, 1);
    assert_eq!(stats.spans, 60);
    assert_eq!(region.pixel(40, 63), Some(Rgb::new(10, 200, 10)));
    assert_eq!(region.pixel(5, 63), Some(Rgb::black()));
    assert_eq!(region.pixel(40, 10), Some(Rgb::black()));
}

#[test]
fn test_bounds_narrow_and_extend() {
    let mut tb = Terrabuff::new(256, 16);
    tb.set_screen_width(100);
    tb.clear(10, 30);
    // slices 10..16 off left, 16..26 on screen, 26..30 off right
    for i in 0..20 {
        tb.put(sample(-60 + i * 10, 0));
    }
    assert!(tb.next());
    assert_eq!(tb.bounds(), (15, 27));

    // entirely on screen, so the high side looks further ahead
    for i in 0..12 {
        tb.put(sample(i * 8, 0));
    }
    assert!(tb.next());
    assert_eq!(tb.bounds(), (15, 27 + LOOKAHEAD));
}

#[test]
fn test_pinned_sides_never_move() {
    let mut tb = Terrabuff::new(256, 16);
    tb.set_screen_width(100);
    tb.clear_pinned(10, 30, true, true);
    for i in 0..20 {
        tb.put(sample(-60 + i * 10, 0));
    }
    assert!(tb.next());
    assert_eq!(tb.bounds(), (10, 30));
}

#[test]
fn test_scan_stops_at_capacity() {
    let mut tb = Terrabuff::new(64, 5);
    tb.set_screen_width(1000);
    tb.clear(0, 32);
    let mut rings = 1;
    loop {
        let (low, high) = tb.bounds();
        for i in low..high {
            tb.put(sample(i as i32 * 10, 0));
        }
        if !tb.next() {
            break;
        }
        rings += 1;
        assert!(rings <= 5);
    }
    assert_eq!(rings, 5);
    assert_eq!(tb.num_rings(), 5);
    // growth by lookahead is capped at a full turn
    assert!(tb.rings().iter().all(|ring| ring.high() - ring.low() <= 64));
}

#[test]
fn test_merge_appends_at_seam() {
    let mut a = Terrabuff::new(256, 4);
    let mut b = Terrabuff::new(256, 4);
    a.set_screen_width(1000);
    b.set_screen_width(1000);
    a.clear_pinned(0, 10, false, true);
    b.clear_pinned(10, 20, true, false);
    for i in 0..10 {
        a.put(sample(i * 10, 0));
        // seam sample of b lands left of a's last sample
        b.put(sample(85 + i * 10, 0));
    }
    // a stops after one ring, b carries on
    assert!(b.next());
    for i in 10..24 {
        b.put(sample(i * 10, 5));
    }
    a.merge(&b);
    assert_eq!(a.num_rings(), 2);
    let ring = &a.rings()[0];
    assert_eq!((ring.low(), ring.high()), (0, 20));
    let xs = ring.samples().iter().map(|s| s.pos.x).collect::<Vec<_>>();
    assert!(xs.windows(2).all(|w| w[0] < w[1]), "{:?}", xs);
    assert_eq!(xs[10], 91);
    assert_eq!(xs[11], 95);
    assert_eq!(a.rings()[1].low(), 10);
    assert_eq!(a.rings()[1].samples().len(), 14);
}

#[test]
fn test_catmull_rom() {
    // passes through its control points
    assert_eq!(catmull_rom(0, 10, 20, 30, Ratio::ZERO), 10);
    assert_eq!(catmull_rom(0, 10, 20, 30, Ratio::ONE), 20);
    // and is linear on a line
    let mid = catmull_rom(0, 10, 20, 30, Ratio::of(1, 2));
    assert!((mid - 15).abs() <= 1);
    // overshoot stays within reason
    let bump = catmull_rom(0, 100, 100, 0, Ratio::of(1, 2));
    assert!(bump >= 100 && bump <= 120, "{}", bump);
}
