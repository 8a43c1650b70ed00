//! Rendering one frame.

use crate::{
    context::RenderContext,
    flora::FloraStyle,
    frame::FrameParams,
    palette::Season,
    perspective::Perspective,
    props::{
        PropCtx,
        PropStats,
        PropWindow,
        max_prop_distance,
        render_props,
    },
    terrain::{
        ScanStats,
        scan_terrain,
        split_slices,
        visible_slices,
    },
};
use draw_queue::{
    Canvas,
    CanvasRegion,
    ExecStats,
};
use world_data::PropWorld;
use torus_math::*;
use std::time::Instant;
use vek::*;


/// Counters from one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    /// Per terrain subrange.
    pub scans: Vec<ScanStats>,
    /// Rings in the merged terrabuff.
    pub rings: usize,
    pub spans: u64,
    pub props: PropStats,
    pub exec: ExecStats,
    pub micros: u64,
}


// sky colour for each row of the screen
fn sky_rows(ctx: &RenderContext, persp: &Perspective, height: u32) -> Vec<Rgb<u8>> {
    let horizon = persp.horizon_y();
    (0..height as i32)
        .map(|y| {
            let t =
                if horizon <= 0 || y >= horizon { Ratio::ONE }
                else { Ratio::of(y as u32, horizon as u32) };
            ctx.palette.sky(t)
        })
        .collect()
}

fn fill_sky(region: &mut CanvasRegion, sky: &[Rgb<u8>]) {
    for x in region.x0()..region.x1() {
        let mut y0 = 0;
        // runs of one colour at a time
        while y0 < sky.len() {
            let mut y1 = y0 + 1;
            while y1 < sky.len() && sky[y1] == sky[y0] {
                y1 += 1;
            }
            region.fill_column(x, y0 as i32, y1 as i32, sky[y0]);
            y0 = y1;
        }
    }
}


/// Render a frame of `scene` onto `canvas`, which must be the frame's screen
/// size.
///
/// Terrain is scanned in parallel over weighted subranges of the view,
/// merged into one terrabuff, and then each worker draws one strip of screen
/// columns: sky, then terrain, then the props which may reach the strip.
pub fn render(
    canvas: &mut Canvas,
    scene: &PropWorld,
    ctx: &mut RenderContext,
    frame: &FrameParams,
) -> FrameStats {
    assert_eq!(canvas.size(), frame.screen, "canvas does not match frame size");
    let start = Instant::now();
    let torus = scene.world.torus();
    let persp = Perspective::for_frame(frame, ctx.fov, torus, ctx.near);
    let season = Season::at(frame.time, ctx.settings.year_length);
    let palette = &*ctx.palette;

    // terrain scan
    let slice_cap = ctx.settings.slice_capacity;
    let (low, high) = visible_slices(&persp, slice_cap);
    let ranges = split_slices(low, high, ctx.pool.workers(), ctx.settings.split_weight);
    let scan = &ctx.scan;
    let scans = ctx.pool.run(
        ctx.terrabuffs.iter_mut().zip(ranges.iter().copied()),
        |_, (tb, range)| scan_terrain(tb, &scene.world, &persp, palette, season, scan, range),
    );
    if let Some((merged, rest)) = ctx.terrabuffs.split_first_mut() {
        for tb in &rest[..ranges.len() - 1] {
            merged.merge(tb);
        }
    }
    trace!(?scans, "scanned terrain");

    // per strip drawing
    let terrabuff = &ctx.terrabuffs[0];
    let sky = sky_rows(ctx, &persp, canvas.height());
    let style = FloraStyle::new(palette, season);
    let prop_ctx = PropCtx {
        persp: &persp,
        world: &scene.world,
        style: &style,
        season,
    };
    let camera = Vec2::new(frame.camera.x, frame.camera.z);
    let grass_shift = ctx.settings.grass_distance_shift;
    let tree_shift = ctx.settings.tree_distance_shift;
    // the second tree layer thins out forests at half the distance
    let lists = [
        (&scene.trees[0], tree_shift),
        (&scene.trees[1], tree_shift.saturating_sub(2)),
        (&scene.grass, grass_shift),
    ];
    let renderers = &ctx.renderers;
    let regions = canvas.regions(ctx.pool.workers());

    let strips = ctx.pool.run(
        regions.into_iter().zip(ctx.queues.iter_mut()),
        |_, (mut region, queue)| {
            fill_sky(&mut region, &sky);
            let terrain = terrabuff.render(&mut region);

            queue.clear();
            let columns = (region.x0(), region.x1());
            let mut props = PropStats::default();
            for &(list, shift) in &lists {
                let window = PropWindow::around(camera, max_prop_distance(shift), torus);
                props += render_props(list, window, shift, renderers, &prop_ctx, columns, queue);
            }
            let exec = queue.execute(&mut region, Vec2::zero());
            (terrain, props, exec)
        },
    );

    let mut stats = FrameStats {
        scans,
        rings: terrabuff.num_rings(),
        ..FrameStats::default()
    };
    for (terrain, props, exec) in strips {
        stats.spans += terrain.spans;
        stats.props += props;
        stats.exec += exec;
    }
    stats.micros = start.elapsed().as_micros() as u64;
    debug!(
        rings = stats.rings,
        spans = stats.spans,
        props = stats.props.rendered,
        drawn = stats.exec.drawn,
        micros = stats.micros,
        "rendered frame",
    );
    stats
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        flora::{Grass, PROP_GRASS},
        palette::DefaultPalette,
        props::PropRenderers,
        settings::Settings,
    };
    use draw_queue::DEPTH_FAR;
    use world_data::*;
    use std::sync::Arc;

    fn scene() -> PropWorld {
        let mut world = World::new(128, 128, 1, 1);
        for z in 0..128 {
            for x in 0..128 {
                world.tile_mut(x, z).ty = terrain_type(TERRAIN_GRASS, 0);
                world.tile_mut(x, z).altitude = 100;
            }
        }
        world.recalculate_all();
        let mut scene = PropWorld::new(world);
        // a tuft of grass two tiles ahead of the camera
        scene.grass.insert(Prop {
            x: 64 << TILE_SHIFT,
            z: 62 << TILE_SHIFT,
            ty: PROP_GRASS,
            variant: 3,
            yrot: Angle::ZERO,
        });
        scene
    }

    fn context(workers: usize) -> RenderContext {
        let settings = Settings {
            workers,
            slice_capacity: 1024,
            scan_capacity: 256,
            view_distance_tiles: 48,
            ..Settings::default()
        };
        let mut renderers = PropRenderers::new();
        renderers.insert(PROP_GRASS, Arc::new(Grass::default()));
        RenderContext::new(settings, renderers, Box::new(DefaultPalette::default())).unwrap()
    }

    fn frame(scene: &PropWorld) -> FrameParams {
        FrameParams::standing(
            &scene.world,
            64 << TILE_SHIFT,
            64 << TILE_SHIFT,
            TILE_SIZE / 4,
            Angle::ZERO,
            Angle::ZERO,
            180.0,
            Extent2::new(160, 90),
        )
    }

    #[test]
    fn test_frame_has_sky_above_and_ground_below() {
        let scene = scene();
        let mut ctx = context(3);
        let frame = frame(&scene);
        let mut canvas = Canvas::new(160, 90);
        let stats = render(&mut canvas, &scene, &mut ctx, &frame);

        assert_eq!(stats.scans.len(), 3);
        assert!(stats.rings > 10);
        assert!(stats.props.rendered >= 1);
        for x in [0, 80, 159] {
            assert_eq!(canvas.depth(x, 0), DEPTH_FAR);
            assert_ne!(canvas.depth(x, 89), DEPTH_FAR);
        }
        // the sky gets paler towards the horizon
        let palette = DefaultPalette::default();
        assert_eq!(canvas.pixel(80, 0), palette.sky_top);
    }

    #[test]
    fn test_worker_count_does_not_change_the_picture_much() {
        let scene = scene();
        let frame = frame(&scene);
        let mut one = Canvas::new(160, 90);
        let mut four = Canvas::new(160, 90);
        render(&mut one, &scene, &mut context(1), &frame);
        render(&mut four, &scene, &mut context(4), &frame);

        let mut differ = 0;
        for y in 0..90 {
            for x in 0..160 {
                let (a, b) = (one.pixel(x, y), four.pixel(x, y));
                if (a.r as i32 - b.r as i32).abs() > 8 || (a.g as i32 - b.g as i32).abs() > 8 {
                    differ += 1;
                }
            }
        }
        assert!(differ < 160 * 90 / 50, "{} pixels differ", differ);
    }

    #[test]
    fn test_rendering_twice_reuses_buffers() {
        let scene = scene();
        let mut ctx = context(2);
        let frame = frame(&scene);
        let mut canvas = Canvas::new(160, 90);
        let first = render(&mut canvas, &scene, &mut ctx, &frame);
        let snapshot = canvas.clone();
        let second = render(&mut canvas, &scene, &mut ctx, &frame);
        assert_eq!(first.rings, second.rings);
        assert_eq!(first.props, second.props);
        for y in 0..90 {
            for x in 0..160 {
                assert_eq!(canvas.pixel(x, y), snapshot.pixel(x, y));
            }
        }
    }
}
