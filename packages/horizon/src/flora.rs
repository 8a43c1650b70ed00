//! Turtle-graphics renderers for grass and trees.

use crate::{
    palette::{
        FloraKind,
        Palette,
        Season,
    },
    props::{
        PropCtx,
        PropRenderer,
    },
    turtle::Turtle,
};
use draw_queue::{
    Accum,
    Burst,
    DrawMethod,
    Foliage,
    Solid,
};
use world_data::*;
use torus_math::*;
use std::sync::Arc;
use anyhow::*;
use vek::*;


pub const PROP_GRASS: u8 = 1;
pub const PROP_OAK: u8 = 2;
pub const PROP_CHERRY: u8 = 3;


/// Drawing methods for one kind of flora.
#[derive(Debug, Clone)]
pub struct FloraMethods {
    pub stem: Arc<dyn DrawMethod>,
    pub leaves: Arc<dyn DrawMethod>,
}

/// Drawing methods for every kind of flora, coloured for one frame.
///
/// Built once per frame and shared by every burst, so that a burst naming
/// the same method twice in a row stores it once.
#[derive(Debug, Clone)]
pub struct FloraStyle {
    grass: FloraMethods,
    oak: FloraMethods,
    cherry: FloraMethods,
}

impl FloraStyle {
    pub fn new(palette: &dyn Palette, season: Season) -> Self {
        let methods = |kind| {
            let colours = palette.flora(kind, season);
            FloraMethods {
                stem: Arc::new(Solid { colour: colours.stem }) as Arc<dyn DrawMethod>,
                leaves: Arc::new(Foliage {
                    fill: colours.leaf_fill,
                    outline: colours.leaf_outline,
                    outline_width: 1,
                }),
            }
        };
        FloraStyle {
            grass: methods(FloraKind::Grass),
            oak: methods(FloraKind::Oak),
            cherry: methods(FloraKind::Cherry),
        }
    }

    pub fn methods(&self, kind: FloraKind) -> &FloraMethods {
        match kind {
            FloraKind::Grass => &self.grass,
            FloraKind::Oak => &self.oak,
            FloraKind::Cherry => &self.cherry,
        }
    }
}


// small deterministic noise from a prop's variant
#[derive(Debug, Clone)]
struct Jitter(u32);

impl Jitter {
    fn new(variant: u8) -> Self {
        Jitter((variant as u32).wrapping_mul(0x9e3779b9) | 1)
    }

    fn next(&mut self) -> u32 {
        // xorshift32
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        self.0
    }

    /// `a`, give or take an eighth of it.
    fn around(&mut self, a: Angle) -> Angle {
        let spread = a.0 / 4;
        if spread == 0 {
            return a;
        }
        a + Angle((self.next() % spread as u32) as u16) - Angle(spread / 2)
    }
}


/// Tufts of grass blades fanned out around the prop's base.
#[derive(Debug, Clone)]
pub struct Grass {
    /// Blade length, in world units.
    pub height: f32,
    /// Blade width at the root, in world units.
    pub width: f32,
    /// How far blades lean away from vertical.
    pub lean: Angle,
    /// Blades in a tuft at full detail.
    pub max_blades: u32,
}

impl Default for Grass {
    fn default() -> Self {
        Grass {
            height: (TILE_SIZE / 5) as f32,
            width: (TILE_SIZE / 90) as f32,
            lean: Angle::from_degrees(20.0),
            max_blades: 5,
        }
    }
}

impl PropRenderer for Grass {
    fn reach(&self, _: &Prop) -> u32 {
        self.height.ceil() as u32 + 1
    }

    fn render(&self, prop: &Prop, detail: u32, ctx: &PropCtx, burst: &mut Burst) {
        let base = Vec3::new(prop.x, ctx.world.terrain_base_y(prop.x, prop.z), prop.z);
        burst.put_method(Arc::clone(&ctx.style.methods(FloraKind::Grass).stem));

        let blades = 1 + self.max_blades.saturating_sub(1) * detail.min(64) / 64;
        let mut jitter = Jitter::new(prop.variant);
        for b in 0..blades {
            if !burst.has_room(8, 4) {
                break;
            }
            let facing = prop.yrot + Angle((b * (0x10000 / blades)) as u16) + jitter.around(Angle(0x1000));
            let mut turtle = Turtle::new(ctx.persp, base, facing, self.width);
            let len = self.height * (0.6 + (jitter.next() % 5) as f32 * 0.1);
            turtle.pitch(-jitter.around(self.lean));
            turtle.forward(len * 0.6, burst);
            // the tip bends over further
            turtle.pitch(-self.lean);
            turtle.scale_width(0.5);
            turtle.forward(len * 0.4, burst);
        }
    }
}


#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Pass {
    Wood,
    Leaves,
}

/// A tree drawn from a branching program, as produced by expanding an
/// L-system.
///
/// Program symbols:
///
/// - `F`: grow forwards one segment
/// - `f`: move forwards one segment without drawing
/// - `+` / `-`: turn left / right
/// - `^` / `&`: pitch up / down
/// - `[` / `]`: start / end a branch
/// - `L`: a clump of leaves
///
/// Other symbols are ignored. Wood is drawn first and leaves after, all
/// leaves of a tree compositing into a single silhouette.
#[derive(Debug, Clone)]
pub struct Tree {
    pub kind: FloraKind,
    program: Vec<u8>,
    /// Segment length, in world units.
    pub segment: f32,
    /// Turning angle.
    pub angle: Angle,
    /// Trunk width, in world units.
    pub trunk_width: f32,
    /// Factor applied to the width on entering a branch.
    pub taper: f32,
    /// Leaf clump radius, in world units.
    pub leaf_radius: f32,
    /// Whether leaves drop around midwinter.
    pub deciduous: bool,
    // in segments
    longest_path: u32,
}

impl Tree {
    /// Fails if the program's branches are unbalanced.
    pub fn new(
        kind: FloraKind,
        program: &str,
        segment: f32,
        angle: Angle,
        trunk_width: f32,
        leaf_radius: f32,
    ) -> Result<Self> {
        let mut stack = Vec::new();
        let mut len = 0u32;
        let mut longest = 0u32;
        for (i, c) in program.bytes().enumerate() {
            match c {
                b'F' | b'f' => {
                    len += 1;
                    longest = longest.max(len);
                }
                b'[' => stack.push(len),
                b']' => {
                    len = stack.pop()
                        .ok_or_else(|| anyhow!("unopened branch closed at {}", i))?;
                }
                _ => (),
            }
        }
        ensure!(stack.is_empty(), "{} branches left open", stack.len());
        ensure!(segment >= 0.0 && leaf_radius >= 0.0, "negative tree dimensions");

        Ok(Tree {
            kind,
            program: program.as_bytes().to_vec(),
            segment,
            angle,
            trunk_width,
            taper: 0.7,
            leaf_radius,
            deciduous: false,
            longest_path: longest,
        })
    }

    /// Deepest branch nesting drawn at a level of detail.
    pub fn max_depth(detail: u32) -> u32 {
        1 + detail / 12
    }

    fn bare(&self, season: Season) -> bool {
        self.deciduous && season.summer.0 < Ratio::ONE.0 / 8
    }

    fn walk(&self, prop: &Prop, detail: u32, turtle: &mut Turtle, burst: &mut Burst, pass: Pass) {
        let max_depth = Self::max_depth(detail);
        // fewer, bigger clumps further away
        let leaf_radius = self.leaf_radius * (1.0 + (64 - detail.min(64)) as f32 / 48.0);
        let mut jitter = Jitter::new(prop.variant);
        let mut depth = 0;
        // depth at which a branch too deep to draw was entered
        let mut skipping: Option<u32> = None;

        for &op in &self.program {
            if let Some(skip_depth) = skipping {
                match op {
                    b'[' => depth += 1,
                    b']' => {
                        depth -= 1;
                        if depth == skip_depth {
                            skipping = None;
                        }
                    }
                    _ => (),
                }
                continue;
            }
            // room to finish the pass with a flush
            if !burst.has_room(5, 2) {
                break;
            }
            match op {
                b'F' => match pass {
                    Pass::Wood => {
                        turtle.forward(self.segment, burst);
                    }
                    Pass::Leaves => turtle.skip(self.segment),
                },
                b'f' => turtle.skip(self.segment),
                b'+' => turtle.turn(jitter.around(self.angle)),
                b'-' => turtle.turn(-jitter.around(self.angle)),
                b'^' => turtle.pitch(jitter.around(self.angle)),
                b'&' => turtle.pitch(-jitter.around(self.angle)),
                b'[' => {
                    if depth + 1 > max_depth {
                        skipping = Some(depth);
                    } else {
                        turtle.push();
                        turtle.scale_width(self.taper);
                    }
                    depth += 1;
                }
                b']' => {
                    turtle.pop();
                    depth -= 1;
                }
                b'L' => if pass == Pass::Leaves {
                    turtle.dot(leaf_radius, burst);
                },
                _ => (),
            }
        }
    }
}

impl PropRenderer for Tree {
    fn reach(&self, _: &Prop) -> u32 {
        (self.segment * self.longest_path as f32 + self.leaf_radius * 2.0).ceil() as u32 + 1
    }

    fn render(&self, prop: &Prop, detail: u32, ctx: &PropCtx, burst: &mut Burst) {
        let base = Vec3::new(prop.x, ctx.world.terrain_base_y(prop.x, prop.z), prop.z);
        let methods = ctx.style.methods(self.kind);

        burst.put_method(Arc::clone(&methods.stem));
        let mut turtle = Turtle::new(ctx.persp, base, prop.yrot, self.trunk_width);
        self.walk(prop, detail, &mut turtle, burst, Pass::Wood);

        if self.bare(ctx.season) || !burst.has_room(8, 2) {
            return;
        }
        burst.put_method(Arc::clone(&methods.leaves));
        burst.put_accum(Accum::cluster());
        let mut turtle = Turtle::new(ctx.persp, base, prop.yrot, self.trunk_width);
        self.walk(prop, detail, &mut turtle, burst, Pass::Leaves);
        burst.flush();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        palette::DefaultPalette,
        perspective::Perspective,
    };
    use draw_queue::{Canvas, DrawQueue};

    const PROGRAM: &str = "FF[+F[-FL][+FL]FL][-F[^FL][&FL]FL][^F[+FL]L]FL";

    fn perspective(world: &World) -> Perspective {
        Perspective::new(
            Vec3::new(32 << TILE_SHIFT, TILE_SIZE / 2, 32 << TILE_SHIFT),
            Angle::ZERO,
            Angle::ZERO,
            Angle::from_degrees(90.0),
            Extent2::new(400, 300),
            world.torus(),
            TILE_SIZE / 8,
        )
    }

    fn tree() -> Tree {
        Tree::new(
            FloraKind::Oak,
            PROGRAM,
            (TILE_SIZE / 4) as f32,
            Angle::from_degrees(30.0),
            2000.0,
            6000.0,
        ).unwrap()
    }

    // a prop three tiles in front of the camera
    fn prop(ty: u8) -> Prop {
        Prop {
            x: 32 << TILE_SHIFT,
            z: 29 << TILE_SHIFT,
            ty,
            variant: 7,
            yrot: Angle::from_degrees(40.0),
        }
    }

    fn record(renderer: &dyn PropRenderer, ty: u8, detail: u32, season: Season) -> DrawQueue {
        let world = World::new(64, 64, 1, 1);
        let persp = perspective(&world);
        let style = FloraStyle::new(&DefaultPalette::default(), season);
        let ctx = PropCtx { persp: &persp, world: &world, style: &style, season };
        let mut queue = DrawQueue::new();
        let mut burst = queue.start_burst();
        renderer.render(&prop(ty), detail, &ctx, &mut burst);
        burst.end();
        queue
    }

    #[test]
    fn test_unbalanced_programs_are_rejected() {
        for program in ["F[F", "F]F", "[[F]", "]["] {
            assert!(
                Tree::new(FloraKind::Oak, program, 1.0, Angle::ZERO, 1.0, 1.0).is_err(),
                "{}", program,
            );
        }
    }

    #[test]
    fn test_reach_covers_longest_branch() {
        let tree = Tree::new(FloraKind::Oak, "FF[+FF[+F]]F", 100.0, Angle::ZERO, 1.0, 10.0).unwrap();
        let reach = tree.reach(&Prop::default());
        assert!(reach >= 520 && reach < 530, "{}", reach);
    }

    #[test]
    fn test_tree_detail_limits_branching() {
        let tree = tree();
        let near = record(&tree, PROP_OAK, 64, Season::MIDSUMMER);
        let far = record(&tree, PROP_OAK, 1, Season::MIDSUMMER);
        assert!(near.num_instrs() > far.num_instrs());
        assert!(!far.is_empty());
    }

    #[test]
    fn test_deciduous_trees_are_bare_in_winter() {
        let mut tree = tree();
        tree.deciduous = true;
        let summer = record(&tree, PROP_OAK, 64, Season::MIDSUMMER);
        let winter = record(&tree, PROP_OAK, 64, Season::MIDWINTER);
        assert!(winter.num_instrs() < summer.num_instrs());
        tree.deciduous = false;
        let evergreen = record(&tree, PROP_OAK, 64, Season::MIDWINTER);
        assert_eq!(evergreen.num_instrs(), summer.num_instrs());
    }

    #[test]
    fn test_tree_draws_onto_canvas() {
        let mut queue = record(&tree(), PROP_OAK, 64, Season::MIDSUMMER);
        let mut canvas = Canvas::new(400, 300);
        let stats = queue.execute(&mut canvas.region(), Vec2::zero());
        assert!(stats.drawn > 0);
        // the trunk stands in the middle of the screen, below the horizon
        assert_ne!(canvas.depth(200, 175), draw_queue::DEPTH_FAR);
    }

    #[test]
    fn test_huge_program_stays_within_burst() {
        let program = "[+FL]".repeat(5000);
        let tree = Tree::new(FloraKind::Cherry, &program, 100.0, Angle::from_degrees(7.0), 50.0, 80.0).unwrap();
        let queue = record(&tree, PROP_CHERRY, 64, Season::MIDSUMMER);
        assert!(queue.num_instrs() <= draw_queue::BURST_MAX_INSTRS);
    }

    #[test]
    fn test_grass_detail_adds_blades() {
        let grass = Grass::default();
        let near = record(&grass, PROP_GRASS, 64, Season::MIDSUMMER);
        let far = record(&grass, PROP_GRASS, 1, Season::MIDSUMMER);
        assert!(near.num_instrs() > far.num_instrs());
        assert!(!far.is_empty());
    }
}
