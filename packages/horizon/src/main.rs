#[macro_use]
extern crate tracing;

use horizon::{
    context::RenderContext,
    demo::*,
    frame::FrameParams,
    logging::{
        init_logging,
        LOG_FILE_NAME,
    },
    palette::DefaultPalette,
    render::render,
    settings::{
        Settings,
        SETTINGS_FILE_NAME,
    },
};
use draw_queue::Canvas;
use world_data::World;
use torus_math::*;
use std::{
    env::args,
    error::Error as StdError,
    process::exit,
    str::FromStr,
};
use anyhow::*;
use vek::*;


const CLI_INTRO: &'static str = r#"Horizon terrain renderer.

Renders one frame of a wrapping heightmap world to an image."#;

const CLI_HELP: &'static str = r#"
Examples:

    [this command]
    Render a generated world to horizon.png.

    [this command] --x=100.5 --z=20 --yaw=45 --pitch=-10 --time=90 --out=spring.png
    Render from a given position (in tiles) and direction (in degrees), at a
    given time of year.

    [this command] --seed=7 --size=2048 --save-world=world.bin
    Generate a different world and keep a checkpoint of it.

    [this command] --world=world.bin
    Render a world from a checkpoint.

    [this command] --settings=settings.json --write-settings
    Use the given settings file, writing it out with defaults filled in.

Env var examples:
    RUST_LOG=horizon=trace
    Changes logging levels"#;


fn main() {
    println!("{}", CLI_INTRO);
    let args = args().collect::<Vec<_>>();
    if args.get(1).map(String::as_str) == Some("--help") {
        println!("{}", CLI_HELP);
        return;
    }
    init_logging(LOG_FILE_NAME);
    if let Err(e) = run(&args) {
        error!("{:?}", e);
        exit(1);
    }
}

// value of a --name=value argument
fn arg<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .filter_map(|arg| arg.strip_prefix(name))
        .filter_map(|rest| rest.strip_prefix('='))
        .next()
}

fn parsed_arg<T>(args: &[String], name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    match arg(args, name) {
        Some(s) => s.parse().with_context(|| format!("invalid {}={}", name, s)),
        None => Ok(default),
    }
}

fn run(args: &[String]) -> Result<()> {
    let settings_path = arg(args, "--settings").unwrap_or(SETTINGS_FILE_NAME);
    let settings = Settings::read(settings_path);
    if args.iter().any(|arg| arg == "--write-settings") {
        if let Err(e) = settings.write(settings_path) {
            warn!(path=%settings_path, "unable to write settings: {:#}", e);
        }
    }

    let defaults = DemoParams::default();
    let params = DemoParams {
        size: parsed_arg(args, "--size", defaults.size)?,
        seed: parsed_arg(args, "--seed", defaults.seed)?,
        ..defaults
    };
    ensure!(
        params.size.is_power_of_two() && params.size >= 2 && params.size <= 1 << 15,
        "world size must be a power of two from 2 to 32768",
    );
    let world = match arg(args, "--world") {
        Some(path) => {
            info!(%path, "loading world");
            World::load_file(path).context("loading world checkpoint")?
        }
        None => {
            info!(size = params.size, seed = params.seed, "generating world");
            generate_world(&params)
        }
    };
    if let Some(path) = arg(args, "--save-world") {
        if let Err(e) = world.save_file(path) {
            warn!(%path, "unable to save world checkpoint: {:#}", e);
        }
    }
    let scene = scatter_props(world, &params);

    let mut ctx = RenderContext::new(
        settings.clone(),
        demo_renderers()?,
        Box::new(DefaultPalette::default()),
    )?;

    let torus = scene.world.torus();
    let centre = (scene.world.xmax() / 2) as f32;
    let tiles = |name: &str, default: f32, modulus: u32| -> Result<Coord> {
        let t: f32 = parsed_arg(args, name, default)?;
        Ok(wrap_coord((t as f64 * TILE_SIZE as f64) as i64, modulus))
    };
    let screen = Extent2::new(settings.screen_width, settings.screen_height);
    let frame = FrameParams::standing(
        &scene.world,
        tiles("--x", centre, torus.x)?,
        tiles("--z", centre, torus.y)?,
        (parsed_arg(args, "--eye", 0.1f32)? * TILE_SIZE as f32) as Coord,
        Angle::from_degrees(parsed_arg(args, "--yaw", 0.0)?),
        Angle::from_degrees(parsed_arg(args, "--pitch", 0.0)?),
        parsed_arg(args, "--time", settings.year_length / 2.0)?,
        screen,
    );

    let mut canvas = Canvas::new(screen.w, screen.h);
    let stats = render(&mut canvas, &scene, &mut ctx, &frame);
    info!(
        rings = stats.rings,
        props = stats.props.rendered,
        millis = stats.micros / 1000,
        "rendered frame",
    );

    let out = arg(args, "--out").unwrap_or("horizon.png");
    let image = image::RgbImage::from_fn(screen.w, screen.h, |x, y| {
        let c = canvas.pixel(x, y);
        image::Rgb([c.r, c.g, c.b])
    });
    image.save(out).with_context(|| format!("writing {}", out))?;
    info!(%out, "saved image");
    Ok(())
}
