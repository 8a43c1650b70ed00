//! Deferred drawing for parallel software rasterization.
//!
//! Worker threads record abstract drawing operations into their own
//! `DrawQueue`, then each replays its queue against its own disjoint
//! `CanvasRegion` of a shared `Canvas`. Regions are split out of the canvas
//! with `split_at_mut`, so no pixel is ever touched by two threads and no
//! locking is needed.
//!
//! Basic example:
//!
//! ```
//! use draw_queue::*;
//! use std::sync::Arc;
//! use vek::*;
//!
//! let mut queue = DrawQueue::new();
//!
//! // record a burst
//! let mut burst = queue.start_burst();
//! burst.put_method(Arc::new(Solid { colour: Rgb::red() }));
//! burst.put_point(DrawPoint::new(Vec2::new(2, 5), 100, 1));
//! burst.put_point(DrawPoint::new(Vec2::new(12, 5), 100, 1));
//! burst.draw_line();
//! burst.end();
//!
//! // replay it onto the right half of a canvas
//! let mut canvas = Canvas::new(16, 8);
//! let mut regions = canvas.regions(2);
//! queue.execute(&mut regions[1], Vec2::zero());
//! drop(regions);
//!
//! assert_eq!(canvas.pixel(10, 5), Rgb::red());
//! assert_eq!(canvas.pixel(4, 5), Rgb::black());
//! ```
//!
//! ## bursts and pages
//!
//! A queue is a list of fixed-capacity pages. Each burst is confined to one
//! page: starting a burst moves to a fresh page unless the current one has
//! room for a burst of the maximum size. A queue has a cap on its page count,
//! exceeding which panics, as do bursts which record more than their
//! reservation. Capacities are sized for the scene, so hitting them is a bug.
//!
//! ## replay
//!
//! Replay keeps a current drawing method, a current accumulator, and a pen
//! holding the previous and current point. Lines go from the previous point to
//! the current one, points go at the current one. Runs of primitives which
//! cannot reach the destination region are skipped with only a bounds test
//! each, see `DrawQueue::execute`.

#[macro_use]
extern crate tracing;


mod screen_box;
mod canvas;
mod method;
mod queue;


pub use self::{
    screen_box::ScreenBox,
    canvas::{
        DEPTH_FAR,
        Canvas,
        CanvasRegion,
    },
    method::{
        DrawPoint,
        Accum,
        DrawMethod,
        Solid,
        Foliage,
    },
    queue::{
        PAGE_INSTRS,
        PAGE_POINTS,
        PAGE_TABLE,
        BURST_MAX_INSTRS,
        BURST_MAX_POINTS,
        BURST_MAX_TABLE,
        DEFAULT_MAX_PAGES,
        DrawQueue,
        ExecStats,
        Burst,
    },
};
