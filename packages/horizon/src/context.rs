//! Long-lived renderer state.

use crate::{
    palette::Palette,
    props::PropRenderers,
    settings::Settings,
    terrabuff::Terrabuff,
    terrain::ScanParams,
    thread_pool::ForkJoinPool,
};
use draw_queue::DrawQueue;
use torus_math::*;
use anyhow::*;


/// Everything the renderer keeps between frames: a terrabuff and a drawing
/// queue per worker, the worker pool, and the palette and prop renderers
/// frames are drawn with.
///
/// Capacities are fixed at construction. Dropping the context releases all
/// of it.
#[derive(Debug)]
pub struct RenderContext {
    pub(crate) settings: Settings,
    pub(crate) fov: Angle,
    pub(crate) near: u32,
    pub(crate) scan: ScanParams,
    pub(crate) pool: ForkJoinPool,
    pub(crate) terrabuffs: Vec<Terrabuff>,
    pub(crate) queues: Vec<DrawQueue>,
    pub(crate) renderers: PropRenderers,
    pub(crate) palette: Box<dyn Palette>,
}

impl RenderContext {
    /// Fails if the settings are invalid.
    pub fn new(
        settings: Settings,
        renderers: PropRenderers,
        palette: Box<dyn Palette>,
    ) -> Result<Self> {
        settings.validate().context("invalid render settings")?;
        let workers = settings.worker_count();
        let near = (settings.near_clip_tiles * TILE_SIZE as f32).max(1.0) as u32;
        debug!(
            workers,
            slices = settings.slice_capacity,
            scans = settings.scan_capacity,
            "creating render context",
        );
        Ok(RenderContext {
            fov: settings.fov(),
            near,
            scan: ScanParams::from_settings(&settings),
            pool: ForkJoinPool::new(workers),
            terrabuffs: (0..workers)
                .map(|_| Terrabuff::new(settings.slice_capacity, settings.scan_capacity))
                .collect(),
            queues: (0..workers)
                .map(|_| DrawQueue::with_max_pages(settings.max_queue_pages))
                .collect(),
            renderers,
            palette,
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    pub fn palette(&self) -> &dyn Palette {
        &*self.palette
    }

    pub fn renderers(&self) -> &PropRenderers {
        &self.renderers
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        debug!(
            pages = self.queues.iter().map(|q| q.num_pages()).sum::<usize>(),
            "destroying render context",
        );
    }
}


#[test]
fn test_context_has_buffers_per_worker() {
    use crate::palette::DefaultPalette;

    let settings = Settings {
        workers: 3,
        ..Settings::default()
    };
    let ctx = RenderContext::new(settings, PropRenderers::new(), Box::new(DefaultPalette::default()))
        .unwrap();
    assert_eq!(ctx.workers(), 3);
    assert_eq!(ctx.terrabuffs.len(), 3);
    assert_eq!(ctx.queues.len(), 3);
    assert_eq!(ctx.near, TILE_SIZE / 8);
    assert!(ctx.terrabuffs.iter().all(|tb| tb.slice_cap() == 4096 && tb.scan_cap() == 512));
}

#[test]
fn test_context_rejects_invalid_settings() {
    use crate::palette::DefaultPalette;

    let settings = Settings {
        scan_capacity: 0,
        ..Settings::default()
    };
    assert!(
        RenderContext::new(settings, PropRenderers::new(), Box::new(DefaultPalette::default()))
            .is_err()
    );
}

#[test]
fn test_context_rejects_fov_that_rounds_out_of_range() {
    use crate::palette::DefaultPalette;

    for fov_degrees in [0.005, 179.999] {
        let settings = Settings {
            fov_degrees,
            ..Settings::default()
        };
        assert!(
            RenderContext::new(settings, PropRenderers::new(), Box::new(DefaultPalette::default()))
                .is_err()
        );
    }
}
