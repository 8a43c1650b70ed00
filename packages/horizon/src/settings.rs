//! Renderer settings, loaded from a JSON file.

use std::{
    path::Path,
    fs::File,
    io::{
        BufReader,
        BufWriter,
    },
};
use torus_math::Angle;
use serde::{Serialize, Deserialize};
use anyhow::*;


pub const SETTINGS_FILE_NAME: &'static str = "settings.json";


/// Renderer settings. Capacities are fixed for the lifetime of a
/// `RenderContext`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub screen_width: u32,
    pub screen_height: u32,
    /// Horizontal field of view in degrees.
    pub fov_degrees: f32,
    /// Render worker count. 0 means one per CPU.
    pub workers: usize,
    /// Terrain slices per full turn. Power of two.
    pub slice_capacity: u32,
    /// Most terrain rings per frame.
    pub scan_capacity: usize,
    /// Distance of the first terrain ring, in tiles.
    pub start_distance_tiles: f32,
    /// Terrain view distance in tiles. Also capped at half the world size.
    pub view_distance_tiles: u32,
    /// How much wider the central terrain subranges are than the edge ones.
    pub split_weight: f32,
    /// Near clipping distance, in tiles.
    pub near_clip_tiles: f32,
    /// Drawing queue page cap per worker.
    pub max_queue_pages: usize,
    /// Right shift applied to squared grass distances before picking a level
    /// of detail. Each increment of 2 doubles the grass view distance.
    pub grass_distance_shift: u32,
    /// Same as `grass_distance_shift`, for trees.
    pub tree_distance_shift: u32,
    /// Blend distant terrain towards the haze colour.
    pub haze: bool,
    /// Time units per full cycle of seasons.
    pub year_length: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            screen_width: 800,
            screen_height: 450,
            fov_degrees: 90.0,
            workers: 0,
            slice_capacity: 4096,
            scan_capacity: 512,
            start_distance_tiles: 0.5,
            view_distance_tiles: 2048,
            split_weight: 1.0,
            near_clip_tiles: 0.125,
            max_queue_pages: draw_queue::DEFAULT_MAX_PAGES,
            grass_distance_shift: 28,
            tree_distance_shift: 32,
            haze: true,
            year_length: 360.0,
        }
    }
}

impl Settings {
    /// Read from a file, falling back to the default if it cannot be read.
    pub fn read(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::try_read(path).unwrap_or_else(|e| {
            info!(path=%path.display(), "using default settings ({:#})", e);
            Settings::default()
        })
    }

    pub fn try_read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let settings: Settings = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), self)?;
        Ok(())
    }

    /// Check that the settings describe a renderer that can be built.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.screen_width > 0 && self.screen_height > 0,
            "screen size must be non-zero",
        );
        ensure!(
            self.screen_width < 1 << 16 && self.screen_height < 1 << 16,
            "screen size too large",
        );
        ensure!(
            self.fov_degrees > 0.0 && self.fov_degrees < 180.0,
            "field of view must be between 0 and 180 degrees, got {}", self.fov_degrees,
        );
        // the binary angle is what the renderer sees
        let fov = self.fov();
        ensure!(
            fov.0 >= 2 && fov.0 < Angle::HALF_TURN.0,
            "field of view {} degrees is too close to 0 or 180", self.fov_degrees,
        );
        ensure!(
            self.slice_capacity.is_power_of_two()
                && self.slice_capacity >= 16
                && self.slice_capacity <= 1 << 16,
            "slice capacity must be a power of two from 16 to 65536, got {}", self.slice_capacity,
        );
        ensure!(self.scan_capacity >= 2, "scan capacity must be at least 2");
        ensure!(
            self.start_distance_tiles > 0.0 && self.near_clip_tiles > 0.0,
            "start distance and near clip must be positive",
        );
        ensure!(self.view_distance_tiles > 0, "view distance must be positive");
        ensure!(self.split_weight >= 0.0, "split weight must not be negative");
        ensure!(self.max_queue_pages > 0, "queue page cap must be positive");
        ensure!(
            self.grass_distance_shift < 50 && self.tree_distance_shift < 50,
            "prop distance shift too large",
        );
        ensure!(self.year_length > 0.0, "year length must be positive");
        Ok(())
    }

    /// Horizontal field of view as a binary angle.
    pub fn fov(&self) -> Angle {
        Angle::from_degrees(self.fov_degrees)
    }

    /// Number of render workers to use.
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }
}


#[test]
fn test_default_settings_are_valid() {
    Settings::default().validate().unwrap();
}

#[test]
fn test_validate_rejects_bad_capacity() {
    let settings = Settings {
        slice_capacity: 1000,
        ..Settings::default()
    };
    assert!(settings.validate().is_err());
}

#[test]
fn test_validate_rejects_degenerate_fov() {
    for fov_degrees in [0.0, 0.005, 179.999, 180.0, 270.0] {
        let settings = Settings {
            fov_degrees,
            ..Settings::default()
        };
        assert!(settings.validate().is_err(), "{}", fov_degrees);
    }
    for fov_degrees in [0.02, 1.0, 179.99] {
        let settings = Settings {
            fov_degrees,
            ..Settings::default()
        };
        settings.validate().unwrap();
        assert!(settings.fov().half().sin() > 0);
    }
}

#[test]
fn test_missing_fields_take_defaults() {
    let settings: Settings = serde_json::from_str(r#"{ "fov_degrees": 60.0 }"#).unwrap();
    assert_eq!(settings.fov_degrees, 60.0);
    assert_eq!(settings.slice_capacity, Settings::default().slice_capacity);
}
