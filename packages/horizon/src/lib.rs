//! Polar-scan terrain and prop renderer for wrapping heightmap worlds.
//!
//! Basic example:
//!
//! ```
//! use horizon::{
//!     context::RenderContext,
//!     demo::*,
//!     frame::FrameParams,
//!     palette::DefaultPalette,
//!     render::render,
//!     settings::Settings,
//! };
//! use draw_queue::Canvas;
//! use torus_math::*;
//! use vek::*;
//!
//! // a small generated world with grass and trees on it
//! let params = DemoParams { size: 64, grass: 100, trees: 20, ..DemoParams::default() };
//! let scene = scatter_props(generate_world(&params), &params);
//!
//! // buffers are allocated once, up front
//! let settings = Settings { screen_width: 64, screen_height: 36, workers: 2, ..Settings::default() };
//! let mut ctx = RenderContext::new(
//!     settings,
//!     demo_renderers()?,
//!     Box::new(DefaultPalette::default()),
//! )?;
//!
//! // stand in the middle of the world and look around
//! let frame = FrameParams::standing(
//!     &scene.world,
//!     32 << TILE_SHIFT,
//!     32 << TILE_SHIFT,
//!     TILE_SIZE,
//!     Angle::from_degrees(45.0),
//!     Angle::ZERO,
//!     0.0,
//!     Extent2::new(64, 36),
//! );
//! let mut canvas = Canvas::new(64, 36);
//! let stats = render(&mut canvas, &scene, &mut ctx, &frame);
//! assert!(stats.rings > 0);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## terrain
//!
//! Terrain is never turned into a mesh. Instead the view is divided into
//! _slices_, thin wedges of angle around the camera, and the world is scanned
//! outwards in _rings_ of increasing distance. Each ring samples the terrain
//! height once per slice, at a level of detail which coarsens with distance,
//! and projects it onto the screen. The rings are stored in a `Terrabuff`,
//! which then draws each ring's top edge as a spline, front to back, only
//! filling what nearer rings have not already covered.
//!
//! Rings narrow as they go, dropping slices which have left the screen. The
//! scan is split between workers by angle, giving the central workers more
//! slices, since edge slices leave the screen sooner.
//!
//! ## props
//!
//! Grass and trees are drawn with turtle graphics into per-worker drawing
//! queues, one queue per vertical strip of the screen, which are then
//! replayed onto their strips. See the `draw_queue` crate.

#[macro_use]
extern crate tracing;

pub mod logging;
pub mod settings;
pub mod thread_pool;
pub mod frame;
pub mod perspective;
pub mod palette;
pub mod terrabuff;
pub mod terrain;
pub mod turtle;
pub mod props;
pub mod flora;
pub mod context;
pub mod render;
pub mod demo;
