//! Selecting props near the camera and recording them into drawing queues.

use crate::{
    flora::FloraStyle,
    palette::Season,
    perspective::Perspective,
};
use draw_queue::{
    Burst,
    DrawQueue,
    ScreenBox,
};
use world_data::*;
use torus_math::*;
use std::{
    fmt::Debug,
    ops::AddAssign,
    sync::Arc,
};
use vek::*;


/// Props whose normalized distance reaches this level are not drawn.
pub const MAX_PROP_LEVEL: u64 = 64;


/// Everything a prop renderer may consult while recording a prop.
#[derive(Debug, Copy, Clone)]
pub struct PropCtx<'a> {
    pub persp: &'a Perspective,
    pub world: &'a World,
    pub style: &'a FloraStyle,
    pub season: Season,
}


/// Records one type of prop as drawing primitives.
pub trait PropRenderer: Debug + Send + Sync {
    /// Upper bound on how far any part of the prop reaches from its base, in
    /// world units.
    fn reach(&self, prop: &Prop) -> u32;

    /// Record the prop. `detail` is in `1..=64`, higher up close. The burst
    /// must be left with room to spare rather than overfilled; use
    /// `Burst::has_room`.
    fn render(&self, prop: &Prop, detail: u32, ctx: &PropCtx, burst: &mut Burst);
}


/// Prop renderers, by prop type.
#[derive(Debug, Clone, Default)]
pub struct PropRenderers {
    by_type: Vec<Option<Arc<dyn PropRenderer>>>,
}

impl PropRenderers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `renderer` for props of type `ty`, replacing any previous one.
    pub fn insert(&mut self, ty: u8, renderer: Arc<dyn PropRenderer>) {
        assert!(ty != PROP_ABSENT, "cannot render absent props");
        let i = ty as usize;
        if self.by_type.len() <= i {
            self.by_type.resize(i + 1, None);
        }
        self.by_type[i] = Some(renderer);
    }

    pub fn get(&self, ty: u8) -> Option<&dyn PropRenderer> {
        self.by_type.get(ty as usize).and_then(|r| r.as_deref())
    }
}


/// Square window of world positions, each axis half-open. An axis whose
/// minimum exceeds its maximum straddles the seam.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PropWindow {
    pub xmin: Coord,
    pub xmax: Coord,
    pub zmin: Coord,
    pub zmax: Coord,
}

impl PropWindow {
    /// Window reaching `radius` in each direction from `centre`. Covers the
    /// whole axis if that is no bigger.
    pub fn around(centre: Vec2<Coord>, radius: u32, torus: Vec2<u32>) -> Self {
        let axis = |c: Coord, modulus: u32| {
            if radius as u64 * 2 >= modulus as u64 {
                (0, modulus)
            } else {
                // less than half the axis, so it fits an i32
                let r = radius as i32;
                (torus_add(c, -r, modulus), torus_add(c, r, modulus))
            }
        };
        let (xmin, xmax) = axis(centre.x, torus.x);
        let (zmin, zmax) = axis(centre.y, torus.y);
        PropWindow { xmin, xmax, zmin, zmax }
    }
}


/// Distance at which props stop being drawn for a distance shift.
pub fn max_prop_distance(distance_shift: u32) -> u32 {
    let sq = (MAX_PROP_LEVEL * MAX_PROP_LEVEL) << distance_shift.min(48);
    isqrt(sq).min(u32::MAX as u64) as u32
}


/// Counters from one `render_props` call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PropStats {
    /// Props within the window.
    pub considered: u32,
    /// Of those, props which were too far away.
    pub culled_distance: u32,
    /// Of those, props which could not reach the screen columns.
    pub culled_screen: u32,
    /// Props with no renderer for their type.
    pub unknown: u32,
    pub rendered: u32,
}


impl AddAssign for PropStats {
    fn add_assign(&mut self, rhs: Self) {
        self.considered += rhs.considered;
        self.culled_distance += rhs.culled_distance;
        self.culled_screen += rhs.culled_screen;
        self.unknown += rhs.unknown;
        self.rendered += rhs.rendered;
    }
}


/// Whether a prop standing at `base` and reaching `reach` around it might
/// touch the columns `[x0, x1)` of the screen.
fn might_touch_columns(persp: &Perspective, base: Vec3<Coord>, reach: u32, columns: (i32, i32)) -> bool {
    let rel = persp.translate_relative(base);
    if rel.z as i64 - reach as i64 >= persp.near() as i64 {
        // entirely behind the near plane
        return false;
    }
    let sp = match persp.project(rel) {
        Some(sp) => sp,
        // base is behind but the top may not be
        None => return true,
    };
    // the prop's nearest possible point bounds its screen size
    let nearest = sp.depth as i64 - reach as i64;
    if nearest <= -(persp.near() as i64) {
        return true;
    }
    let r = persp.screen_len(reach, nearest as u32) as i32;
    let screen = persp.screen();
    let target = ScreenBox {
        pos: Vec2::new(columns.0, 0),
        ext: Extent2::new(columns.1 - columns.0, screen.h as i32),
    };
    ScreenBox::around(sp.pos, sp.pos).expand(r).intersects(target)
}

/// Record every prop of a list which lies in `window`, is near enough to the
/// camera, and might reach the screen columns `[x0, x1)`, into `queue`, one
/// burst per prop.
///
/// Distance is normalized by `distance_shift`: the squared toroidal distance
/// shifted right by it is a squared level of detail, and props at level 64
/// or beyond are skipped.
pub fn render_props(
    props: &PropList,
    window: PropWindow,
    distance_shift: u32,
    renderers: &PropRenderers,
    ctx: &PropCtx,
    columns: (i32, i32),
    queue: &mut DrawQueue,
) -> PropStats {
    let mut stats = PropStats::default();
    let camera = ctx.persp.camera();
    let torus = ctx.persp.torus();

    for (_, prop) in props.window(window.zmin, window.zmax) {
        if !wrapped_contains(prop.x, window.xmin, window.xmax) {
            continue;
        }
        stats.considered += 1;

        let d2 = torus_dist_sq(Vec2::new(prop.x, prop.z), Vec2::new(camera.x, camera.z), torus) >> distance_shift;
        if d2 >= MAX_PROP_LEVEL * MAX_PROP_LEVEL {
            stats.culled_distance += 1;
            continue;
        }
        let detail = (MAX_PROP_LEVEL - isqrt(d2)) as u32;

        let renderer = match renderers.get(prop.ty) {
            Some(renderer) => renderer,
            None => {
                stats.unknown += 1;
                continue;
            }
        };

        let base = Vec3::new(prop.x, ctx.world.terrain_base_y(prop.x, prop.z), prop.z);
        if !might_touch_columns(ctx.persp, base, renderer.reach(prop), columns) {
            stats.culled_screen += 1;
            continue;
        }

        let mut burst = queue.start_burst();
        renderer.render(prop, detail, ctx, &mut burst);
        burst.end();
        stats.rendered += 1;
    }
    if stats.unknown > 0 {
        debug!(unknown = stats.unknown, "props with no renderer");
    }
    stats
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::DefaultPalette;
    use draw_queue::{DrawPoint, Solid};
    use std::sync::Mutex;

    // draws a dot at the base and remembers what it was asked to draw
    #[derive(Debug, Default)]
    struct Marker {
        seen: Mutex<Vec<(Coord, u32)>>,
    }

    impl PropRenderer for Marker {
        fn reach(&self, _: &Prop) -> u32 {
            1000
        }

        fn render(&self, prop: &Prop, detail: u32, ctx: &PropCtx, burst: &mut Burst) {
            self.seen.lock().unwrap().push((prop.z, detail));
            let base = Vec3::new(prop.x, 0, prop.z);
            if let Some(sp) = ctx.persp.to_screen(base) {
                burst.put_method(Arc::new(Solid { colour: Rgb::white() }));
                burst.put_point(DrawPoint::new(sp.pos, sp.depth, 1));
                burst.draw_point();
            }
        }
    }

    const CAMERA: Vec3<Coord> = Vec3 { x: 32 << TILE_SHIFT, y: TILE_SIZE / 8, z: 32 << TILE_SHIFT };

    fn perspective(torus: Vec2<u32>) -> Perspective {
        Perspective::new(
            CAMERA,
            Angle::ZERO,
            Angle::ZERO,
            Angle::from_degrees(90.0),
            Extent2::new(400, 300),
            torus,
            TILE_SIZE / 8,
        )
    }

    // a line of props straight ahead, one behind, and one destroyed
    fn props() -> PropList {
        let mut props = (1..=20)
            .map(|k| Prop {
                x: CAMERA.x,
                z: CAMERA.z - k * TILE_SIZE,
                ty: 1,
                variant: k as u8,
                yrot: Angle::ZERO,
            })
            .collect::<Vec<_>>();
        props.push(Prop {
            x: CAMERA.x,
            z: CAMERA.z + 3 * TILE_SIZE,
            ty: 1,
            ..Prop::default()
        });
        props.push(Prop {
            x: CAMERA.x + 1,
            z: CAMERA.z - 2 * TILE_SIZE,
            ty: 1,
            ..Prop::default()
        });
        let mut props = PropList::from_unsorted(props);
        let destroyed = props.as_slice().iter().position(|p| p.x == CAMERA.x + 1).unwrap();
        props.destroy(destroyed);
        props
    }

    #[test]
    fn test_max_prop_distance() {
        assert_eq!(max_prop_distance(28), 1 << 20);
        assert_eq!(max_prop_distance(32), 1 << 22);
    }

    #[test]
    fn test_window_wraps_and_saturates() {
        let torus = Vec2::new(64 << TILE_SHIFT, 64 << TILE_SHIFT);
        let w = PropWindow::around(Vec2::new(TILE_SIZE, 32 * TILE_SIZE), 4 * TILE_SIZE, torus);
        assert!(w.xmin > w.xmax);
        assert!(wrapped_contains(63 * TILE_SIZE, w.xmin, w.xmax));
        assert!(wrapped_contains(4 * TILE_SIZE, w.xmin, w.xmax));
        assert!(!wrapped_contains(10 * TILE_SIZE, w.xmin, w.xmax));
        assert_eq!((w.zmin, w.zmax), (28 * TILE_SIZE, 36 * TILE_SIZE));

        let w = PropWindow::around(Vec2::new(TILE_SIZE, TILE_SIZE), 32 * TILE_SIZE, torus);
        assert_eq!((w.xmin, w.xmax), (0, torus.x));
        assert!(wrapped_contains(torus.x - 1, w.xmin, w.xmax));
    }

    #[test]
    fn test_detail_falls_with_distance() {
        let world = World::new(64, 64, 1, 1);
        let persp = perspective(world.torus());
        let style = FloraStyle::new(&DefaultPalette::default(), Season::MIDSUMMER);
        let ctx = PropCtx { persp: &persp, world: &world, style: &style, season: Season::MIDSUMMER };
        let marker = Arc::new(Marker::default());
        let mut renderers = PropRenderers::new();
        renderers.insert(1, marker.clone());

        let window = PropWindow::around(Vec2::new(CAMERA.x, CAMERA.z), max_prop_distance(28), world.torus());
        let mut queue = DrawQueue::new();
        let stats = render_props(&props(), window, 28, &renderers, &ctx, (0, 400), &mut queue);

        // 16 ahead within the window and the one behind
        assert_eq!(stats, PropStats {
            considered: 17,
            culled_distance: 1,
            culled_screen: 1,
            unknown: 0,
            rendered: 15,
        });
        let mut seen = marker.seen.lock().unwrap().clone();
        seen.sort();
        // k tiles away is level 4k
        let expected = (1..=15)
            .rev()
            .map(|k| (CAMERA.z - k * TILE_SIZE, 64 - 4 * k))
            .collect::<Vec<_>>();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_props_outside_columns_are_culled() {
        let world = World::new(64, 64, 1, 1);
        let persp = perspective(world.torus());
        let style = FloraStyle::new(&DefaultPalette::default(), Season::MIDWINTER);
        let ctx = PropCtx { persp: &persp, world: &world, style: &style, season: Season::MIDWINTER };
        let mut renderers = PropRenderers::new();
        renderers.insert(1, Arc::new(Marker::default()));

        let window = PropWindow::around(Vec2::new(CAMERA.x, CAMERA.z), max_prop_distance(28), world.torus());
        let mut queue = DrawQueue::new();
        let stats = render_props(&props(), window, 28, &renderers, &ctx, (0, 100), &mut queue);
        assert_eq!(stats.rendered, 0);
        assert_eq!(stats.culled_screen, 16);
        assert!(queue.is_empty());

        // and nothing is rendered without a renderer
        let stats = render_props(&props(), window, 28, &PropRenderers::new(), &ctx, (0, 400), &mut queue);
        assert_eq!(stats.unknown, 16);
        assert!(queue.is_empty());
    }
}
