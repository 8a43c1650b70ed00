//! The paged drawing queue: recording bursts and replaying them.

use crate::{
    canvas::CanvasRegion,
    method::{
        DrawPoint,
        DrawMethod,
        Accum,
    },
    screen_box::ScreenBox,
};
use std::{
    ops::AddAssign,
    sync::Arc,
};
use vek::*;


/// Instruction capacity of one page.
pub const PAGE_INSTRS: usize = 8192;

/// Point capacity of one page.
pub const PAGE_POINTS: usize = 4096;

/// Method and accumulator table capacity of one page, each.
pub const PAGE_TABLE: usize = 1024;

/// Most instructions one burst may record.
pub const BURST_MAX_INSTRS: usize = 2048;

/// Most points one burst may record.
pub const BURST_MAX_POINTS: usize = 1024;

/// Most methods, and most accumulators, one burst may put.
pub const BURST_MAX_TABLE: usize = 64;

/// Default cap on the number of pages a queue may allocate.
pub const DEFAULT_MAX_PAGES: usize = 64;


#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Instr {
    /// Make the method at this page table index current.
    SetMethod(u16),
    /// Make the accumulator at this page table index current.
    SetAccum(u16),
    /// Move the pen through this many points from the point run.
    Points(u16),
    /// Draw a line from the previous pen point to the current one.
    DrawLine,
    /// Draw a point at the current pen point.
    DrawPoint,
    /// Flush the current accumulator through the current method.
    Flush,
}

#[derive(Debug)]
struct Page {
    instrs: Vec<Instr>,
    points: Vec<DrawPoint>,
    methods: Vec<Arc<dyn DrawMethod>>,
    accums: Vec<Accum>,
}

impl Page {
    fn new() -> Self {
        Page {
            instrs: Vec::with_capacity(PAGE_INSTRS),
            points: Vec::with_capacity(PAGE_POINTS),
            methods: Vec::new(),
            accums: Vec::new(),
        }
    }

    fn clear(&mut self) {
        self.instrs.clear();
        self.points.clear();
        self.methods.clear();
        self.accums.clear();
    }

    fn has_room_for_burst(&self) -> bool {
        self.instrs.len() + BURST_MAX_INSTRS <= PAGE_INSTRS
            && self.points.len() + BURST_MAX_POINTS <= PAGE_POINTS
            && self.methods.len() + BURST_MAX_TABLE <= PAGE_TABLE
            && self.accums.len() + BURST_MAX_TABLE <= PAGE_TABLE
    }
}


/// Deferred, replayable log of drawing instructions.
///
/// Recorded in bursts, each of which lands in a single fixed-capacity page.
/// Running out of pages is fatal.
#[derive(Debug)]
pub struct DrawQueue {
    pages: Vec<Page>,
    // pages in use. pages beyond this are cleared and kept for reuse.
    used: usize,
    max_pages: usize,
}

/// Counters from one `DrawQueue::execute`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ExecStats {
    /// Instructions stepped through, including ones revisited after rewinds.
    pub instrs: u64,
    /// Primitives skipped by fast-forward bounds tests.
    pub skipped: u64,
    /// Primitives passed to a drawing method.
    pub drawn: u64,
    /// Times fast-forward rewound to a checkpoint.
    pub rewinds: u64,
}

impl AddAssign for ExecStats {
    fn add_assign(&mut self, rhs: Self) {
        self.instrs += rhs.instrs;
        self.skipped += rhs.skipped;
        self.drawn += rhs.drawn;
        self.rewinds += rhs.rewinds;
    }
}

// replay state to rewind to
#[derive(Debug, Copy, Clone)]
struct Checkpoint {
    instr: usize,
    point: usize,
    from: DrawPoint,
    to: DrawPoint,
}

impl DrawQueue {
    pub fn new() -> Self {
        Self::with_max_pages(DEFAULT_MAX_PAGES)
    }

    pub fn with_max_pages(max_pages: usize) -> Self {
        assert!(max_pages > 0, "drawing queue must allow at least 1 page");
        DrawQueue {
            pages: Vec::new(),
            used: 0,
            max_pages,
        }
    }

    /// Number of pages in use.
    pub fn num_pages(&self) -> usize {
        self.used
    }

    /// Number of instructions recorded.
    pub fn num_instrs(&self) -> usize {
        self.pages[..self.used].iter().map(|page| page.instrs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_instrs() == 0
    }

    /// Forget everything recorded, keeping allocations.
    pub fn clear(&mut self) {
        for page in &mut self.pages[..self.used] {
            page.clear();
        }
        self.used = 0;
    }

    /// Begin recording a burst, moving on to a fresh page if the current one
    /// lacks room for a maximal burst.
    ///
    /// Panics if that would exceed the page cap.
    pub fn start_burst(&mut self) -> Burst {
        if self.used == 0 || !self.pages[self.used - 1].has_room_for_burst() {
            if self.used == self.max_pages {
                panic!("drawing queue exceeded its cap of {} pages", self.max_pages);
            }
            if self.used == self.pages.len() {
                trace!(page=%self.used, "allocating drawing queue page");
                self.pages.push(Page::new());
            }
            self.used += 1;
        }
        let page = &mut self.pages[self.used - 1];
        Burst {
            instrs_start: page.instrs.len(),
            points_start: page.points.len(),
            methods_start: page.methods.len(),
            accums_start: page.accums.len(),
            page,
        }
    }

    /// Replay everything recorded onto a canvas region, with every recorded
    /// position translated by `offset`.
    ///
    /// Primitives which cannot touch the region are skipped without calling
    /// their method. Whenever the method, accumulator, or page changes, the
    /// replayer remembers a checkpoint and starts fast-forwarding: each
    /// primitive is only bounds tested, until one might touch the region, at
    /// which point the replayer rewinds to the checkpoint and draws for real
    /// until the next change. Flushes always run.
    pub fn execute(&mut self, dst: &mut CanvasRegion, offset: Vec2<i32>) -> ExecStats {
        let bounds = dst.bounds();
        let mut stats = ExecStats::default();
        let mut method: Option<Arc<dyn DrawMethod>> = None;
        let mut from = DrawPoint::default();
        let mut to = DrawPoint::default();

        for page in &mut self.pages[..self.used] {
            let &mut Page {
                ref instrs,
                ref points,
                ref methods,
                ref mut accums,
            } = page;
            // accumulators are local to their page
            let mut canvas_accum = Accum::Canvas;
            let mut accum_idx: Option<usize> = None;

            let mut i = 0;
            let mut p = 0;
            let mut fast_forward = true;
            let mut checkpoint = Checkpoint { instr: 0, point: 0, from, to };

            while i < instrs.len() {
                stats.instrs += 1;
                let mut state_changed = false;
                match instrs[i] {
                    Instr::SetMethod(m) => {
                        method = Some(Arc::clone(&methods[m as usize]));
                        state_changed = true;
                    }
                    Instr::SetAccum(a) => {
                        accum_idx = Some(a as usize);
                        state_changed = true;
                    }
                    Instr::Points(n) => {
                        for &point in &points[p..p + n as usize] {
                            from = to;
                            to = point.offset(offset);
                        }
                        p += n as usize;
                    }
                    Instr::DrawLine | Instr::DrawPoint => {
                        let method = match method.as_ref() {
                            Some(method) => method,
                            None => {
                                debug_assert!(false, "draw instruction before any method");
                                i += 1;
                                continue;
                            }
                        };
                        let is_line = instrs[i] == Instr::DrawLine;
                        if fast_forward {
                            let reach =
                                if is_line {
                                    ScreenBox::around(from.pos, to.pos)
                                        .expand(method.line_margin(from, to))
                                } else {
                                    ScreenBox::around(to.pos, to.pos)
                                        .expand(method.point_margin(to))
                                };
                            if reach.intersects(bounds) {
                                // rewind and draw for real
                                i = checkpoint.instr;
                                p = checkpoint.point;
                                from = checkpoint.from;
                                to = checkpoint.to;
                                fast_forward = false;
                                stats.rewinds += 1;
                                continue;
                            } else {
                                stats.skipped += 1;
                            }
                        } else {
                            let accum = match accum_idx {
                                Some(a) => &mut accums[a],
                                None => &mut canvas_accum,
                            };
                            if is_line {
                                method.draw_line(from, to, accum, dst);
                            } else {
                                method.draw_point(to, accum, dst);
                            }
                            stats.drawn += 1;
                        }
                    }
                    Instr::Flush => {
                        if let Some(method) = method.as_ref() {
                            let accum = match accum_idx {
                                Some(a) => &mut accums[a],
                                None => &mut canvas_accum,
                            };
                            method.flush(accum, dst);
                        }
                        state_changed = true;
                    }
                }
                i += 1;
                if state_changed {
                    fast_forward = true;
                    checkpoint = Checkpoint { instr: i, point: p, from, to };
                }
            }
        }
        trace!(?stats, "executed drawing queue");
        stats
    }
}

impl Default for DrawQueue {
    fn default() -> Self {
        Self::new()
    }
}


/// One recording session, confined to a single page.
///
/// Panics if it records more than `BURST_MAX_INSTRS` instructions,
/// `BURST_MAX_POINTS` points, or `BURST_MAX_TABLE` methods or accumulators.
#[derive(Debug)]
pub struct Burst<'a> {
    page: &'a mut Page,
    instrs_start: usize,
    points_start: usize,
    methods_start: usize,
    accums_start: usize,
}

impl<'a> Burst<'a> {
    fn push_instr(&mut self, instr: Instr) {
        assert!(
            self.page.instrs.len() - self.instrs_start < BURST_MAX_INSTRS,
            "burst exceeded {} instructions", BURST_MAX_INSTRS,
        );
        self.page.instrs.push(instr);
    }

    /// Instructions this burst may still record.
    pub fn instrs_left(&self) -> usize {
        BURST_MAX_INSTRS - (self.page.instrs.len() - self.instrs_start)
    }

    /// Points this burst may still record.
    pub fn points_left(&self) -> usize {
        BURST_MAX_POINTS - (self.page.points.len() - self.points_start)
    }

    /// Whether this burst has room for the given number of instructions and
    /// points.
    pub fn has_room(&self, instrs: usize, points: usize) -> bool {
        instrs <= self.instrs_left() && points <= self.points_left()
    }

    /// Make a method current for the following primitives.
    pub fn put_method(&mut self, method: Arc<dyn DrawMethod>) {
        let reuse = self.page.methods.len() > self.methods_start
            && self.page.methods.last().map_or(false, |last| Arc::ptr_eq(last, &method));
        if !reuse {
            assert!(
                self.page.methods.len() - self.methods_start < BURST_MAX_TABLE,
                "burst exceeded {} methods", BURST_MAX_TABLE,
            );
            self.page.methods.push(method);
        }
        let idx = self.page.methods.len() - 1;
        self.push_instr(Instr::SetMethod(idx as u16));
    }

    /// Make an accumulator current for the following primitives.
    pub fn put_accum(&mut self, accum: Accum) {
        assert!(
            self.page.accums.len() - self.accums_start < BURST_MAX_TABLE,
            "burst exceeded {} accumulators", BURST_MAX_TABLE,
        );
        self.page.accums.push(accum);
        let idx = self.page.accums.len() - 1;
        self.push_instr(Instr::SetAccum(idx as u16));
    }

    /// Move the pen to a point.
    pub fn put_point(&mut self, point: DrawPoint) {
        self.put_points(&[point]);
    }

    /// Move the pen through several points. Only the last two remain as the
    /// pen's previous and current point.
    pub fn put_points(&mut self, points: &[DrawPoint]) {
        if points.is_empty() {
            return;
        }
        assert!(
            self.page.points.len() - self.points_start + points.len() <= BURST_MAX_POINTS,
            "burst exceeded {} points", BURST_MAX_POINTS,
        );
        // extend the previous move rather than adding an instruction
        let merge = self.page.instrs.len() > self.instrs_start
            && matches!(
                self.page.instrs.last(),
                Some(&Instr::Points(n)) if n as usize + points.len() <= u16::MAX as usize
            );
        if merge {
            if let Some(&mut Instr::Points(ref mut n)) = self.page.instrs.last_mut() {
                *n += points.len() as u16;
            }
        } else {
            self.push_instr(Instr::Points(points.len() as u16));
        }
        self.page.points.extend_from_slice(points);
    }

    /// Draw a line from the pen's previous point to its current point.
    pub fn draw_line(&mut self) {
        self.push_instr(Instr::DrawLine);
    }

    /// Draw a point at the pen's current point.
    pub fn draw_point(&mut self) {
        self.push_instr(Instr::DrawPoint);
    }

    /// Flush the current accumulator.
    pub fn flush(&mut self) {
        self.push_instr(Instr::Flush);
    }

    /// Finish the burst.
    pub fn end(self) {}
}


#[cfg(test)]
mod test_util {
    pub use crate::{
        canvas::Canvas,
        method::{Solid, Foliage},
    };
    pub use super::*;

    pub fn pt(x: i32, y: i32, size: u32) -> DrawPoint {
        DrawPoint::new(Vec2::new(x, y), 10, size)
    }

    pub fn solid() -> Arc<dyn DrawMethod> {
        Arc::new(Solid { colour: Rgb::white() })
    }

    pub fn foliage() -> Arc<dyn DrawMethod> {
        Arc::new(Foliage {
            fill: Rgb::green(),
            outline: Rgb::black(),
            outline_width: 1,
        })
    }
}

#[test]
fn test_offscreen_queue_writes_nothing() {
    use test_util::*;

    let mut queue = DrawQueue::new();
    for b in 0..200 {
        let mut burst = queue.start_burst();
        burst.put_method(if b % 2 == 0 { solid() } else { foliage() });
        burst.put_accum(if b % 3 == 0 { Accum::cluster() } else { Accum::Canvas });
        for k in 0..20 {
            // everything far to the left of the canvas
            burst.put_point(pt(-1000 - k * 7, k * 3, 3));
            burst.put_point(pt(-500 - k * 5, 100 - k, 2));
            burst.draw_line();
            burst.draw_point();
        }
        burst.flush();
        burst.end();
    }
    assert!(queue.num_pages() > 1);
    let total = queue.num_instrs() as u64;

    let mut canvas = Canvas::new(64, 64);
    let mut region = canvas.region();
    region.reset_writes();
    let stats = queue.execute(&mut region, Vec2::zero());
    assert_eq!(region.writes(), 0);
    assert_eq!(stats.drawn, 0);
    assert_eq!(stats.rewinds, 0);
    assert_eq!(stats.instrs, total);
    assert_eq!(stats.skipped, 200 * 40);
}

#[test]
fn test_fast_forward_matches_direct_drawing() {
    use test_util::*;

    let mut queue = DrawQueue::new();
    let mut burst = queue.start_burst();
    burst.put_method(solid());
    // offscreen, then onscreen
    burst.put_point(pt(-50, 5, 1));
    burst.put_point(pt(-40, 5, 1));
    burst.draw_line();
    burst.put_point(pt(2, 2, 1));
    burst.put_point(pt(12, 2, 1));
    burst.draw_line();
    burst.put_point(pt(8, 8, 2));
    burst.draw_point();
    burst.end();

    let mut queued = Canvas::new(16, 16);
    let stats = queue.execute(&mut queued.region(), Vec2::zero());
    assert_eq!(stats.rewinds, 1);
    assert_eq!(stats.drawn, 3);

    let mut direct = Canvas::new(16, 16);
    let mut region = direct.region();
    let method = solid();
    let mut accum = Accum::Canvas;
    method.draw_line(pt(2, 2, 1), pt(12, 2, 1), &mut accum, &mut region);
    method.draw_point(pt(8, 8, 2), &mut accum, &mut region);
    for x in 0..16 {
        for y in 0..16 {
            assert_eq!(queued.pixel(x, y), direct.pixel(x, y));
        }
    }
}

#[test]
fn test_execute_applies_offset_and_regions() {
    use test_util::*;

    let mut queue = DrawQueue::new();
    let mut burst = queue.start_burst();
    burst.put_method(solid());
    burst.put_points(&[pt(0, 0, 0), pt(5, 1, 0)]);
    burst.draw_point();
    burst.end();

    let mut canvas = Canvas::new(20, 4);
    let mut regions = canvas.regions(2);
    let left = queue.execute(&mut regions[0], Vec2::new(10, 0));
    let right = queue.execute(&mut regions[1], Vec2::new(10, 0));
    assert_eq!((left.drawn, right.drawn), (0, 1));
    assert_eq!(regions[0].writes(), 0);
    assert_eq!(regions[1].writes(), 1);
    drop(regions);
    assert_eq!(canvas.pixel(15, 1), Rgb::white());
}

#[test]
fn test_cluster_is_composited_on_flush() {
    use test_util::*;

    let mut queue = DrawQueue::new();
    let mut burst = queue.start_burst();
    burst.put_method(foliage());
    burst.put_accum(Accum::cluster());
    burst.put_point(pt(-100, 4, 2));
    burst.draw_point();
    burst.put_point(pt(4, 4, 2));
    burst.draw_point();
    burst.flush();
    burst.end();

    let mut canvas = Canvas::new(8, 8);
    let stats = queue.execute(&mut canvas.region(), Vec2::zero());
    assert_eq!(stats.drawn, 2);
    assert_eq!(canvas.pixel(4, 4), Rgb::green());
    assert_eq!(canvas.pixel(4, 1), Rgb::black());
}

#[test]
fn test_clear_reuses_pages() {
    use test_util::*;

    let mut queue = DrawQueue::new();
    // each burst fills a quarter of a page
    for _ in 0..5 {
        let mut burst = queue.start_burst();
        burst.put_method(solid());
        for _ in 0..2000 {
            burst.draw_point();
        }
        burst.end();
    }
    assert_eq!(queue.num_pages(), 2);
    queue.clear();
    assert_eq!(queue.num_pages(), 0);
    assert!(queue.is_empty());
    queue.start_burst().end();
    assert_eq!(queue.num_pages(), 1);
}

#[test]
#[should_panic]
fn test_page_cap_is_fatal() {
    use test_util::*;

    let mut queue = DrawQueue::with_max_pages(2);
    for _ in 0..100 {
        let mut burst = queue.start_burst();
        burst.put_method(solid());
        for _ in 0..2000 {
            burst.draw_point();
        }
        burst.end();
    }
}

#[test]
#[should_panic]
fn test_burst_reservation_is_enforced() {
    use test_util::*;

    let mut queue = DrawQueue::new();
    let mut burst = queue.start_burst();
    burst.put_method(solid());
    for _ in 0..BURST_MAX_INSTRS {
        burst.draw_point();
    }
}
