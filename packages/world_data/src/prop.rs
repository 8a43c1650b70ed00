//! Props standing on the world, sorted by Z for range queries.

use crate::world::World;
use torus_math::*;


/// Prop type of a prop which is absent, eg. because it was destroyed.
pub const PROP_ABSENT: u8 = 0;


/// A point entity standing on the terrain.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Prop {
    pub x: Coord,
    pub z: Coord,
    /// Prop type, `PROP_ABSENT` if there is no prop.
    pub ty: u8,
    /// Random seed for visual diversity.
    pub variant: u8,
    /// Rotation about the vertical axis.
    pub yrot: Angle,
}

impl Prop {
    pub fn is_present(&self) -> bool {
        self.ty != PROP_ABSENT
    }
}


/// Props of one category, sorted ascending by Z.
#[derive(Debug, Clone, Default)]
pub struct PropList(Vec<Prop>);

impl PropList {
    pub fn new() -> Self {
        PropList(Vec::new())
    }

    /// Construct from props in any order.
    pub fn from_unsorted(mut props: Vec<Prop>) -> Self {
        props.sort_by_key(|p| p.z);
        PropList(props)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Prop] {
        &self.0
    }

    /// Index of the first prop with Z no less than `z`.
    pub fn lower_bound(&self, z: Coord) -> usize {
        self.0.partition_point(|p| p.z < z)
    }

    /// Insert a prop, keeping the order.
    pub fn insert(&mut self, prop: Prop) {
        let i = self.0.partition_point(|p| p.z <= prop.z);
        self.0.insert(i, prop);
    }

    /// Mark the prop at index `i` as absent. Indices of other props are
    /// unaffected.
    pub fn destroy(&mut self, i: usize) {
        self.0[i].ty = PROP_ABSENT;
    }

    /// Present props with Z in the half-open window `[zmin, zmax)`, with
    /// their indices. If `zmin > zmax` the window straddles the seam, and
    /// props from `zmin` up to the end are followed by props from the start
    /// up to `zmax`.
    pub fn window(
        &self,
        zmin: Coord,
        zmax: Coord,
    ) -> impl DoubleEndedIterator<Item=(usize, &Prop)> + '_
    {
        let (a, b) =
            if zmin <= zmax {
                (self.lower_bound(zmin)..self.lower_bound(zmax), 0..0)
            } else {
                (self.lower_bound(zmin)..self.0.len(), 0..self.lower_bound(zmax))
            };
        a.chain(b)
            .map(move |i| (i, &self.0[i]))
            .filter(|&(_, p)| p.is_present())
    }
}


/// The world grid together with every category of prop on it.
#[derive(Debug, Clone)]
pub struct PropWorld {
    pub world: World,
    pub grass: PropList,
    /// Trees, in two layers so that dense forests may be thinned at distance.
    pub trees: [PropList; 2],
}

impl PropWorld {
    /// Wrap a world with no props.
    pub fn new(world: World) -> Self {
        PropWorld {
            world,
            grass: PropList::new(),
            trees: [PropList::new(), PropList::new()],
        }
    }
}


#[cfg(test)]
fn hundred_props() -> PropList {
    // inserted out of order on purpose
    let props = (0..100)
        .rev()
        .map(|i| Prop {
            x: i * 3,
            z: i * 10,
            ty: 1,
            variant: i as u8,
            yrot: Angle::ZERO,
        })
        .collect();
    PropList::from_unsorted(props)
}

#[test]
fn test_window_finds_exact_range() {
    let mut props = hundred_props();
    let forward = props.window(300, 600).map(|(i, _)| i).collect::<Vec<_>>();
    assert_eq!(forward, (30..60).collect::<Vec<_>>());
    let backward = props.window(300, 600).rev().map(|(i, _)| i).collect::<Vec<_>>();
    assert_eq!(backward, (30..60).rev().collect::<Vec<_>>());

    // bounds between entries select the same entries
    let between = props.window(291, 591).map(|(i, _)| i).collect::<Vec<_>>();
    assert_eq!(between, forward);

    props.destroy(45);
    let after = props.window(300, 600).map(|(i, _)| i).collect::<Vec<_>>();
    assert_eq!(after.len(), 29);
    assert!(!after.contains(&45));
    let after_rev = props.window(300, 600).rev().map(|(i, _)| i).collect::<Vec<_>>();
    assert!(after_rev.iter().rev().eq(after.iter()));
}

#[test]
fn test_window_wraps_around_seam() {
    let props = hundred_props();
    let found = props.window(950, 30).map(|(i, _)| i).collect::<Vec<_>>();
    assert_eq!(found, vec![95, 96, 97, 98, 99, 0, 1, 2]);
    assert_eq!(props.window(500, 500).count(), 0);
}

#[test]
fn test_insert_keeps_order() {
    let mut props = hundred_props();
    props.insert(Prop { z: 455, ty: 2, ..Prop::default() });
    props.insert(Prop { z: 0, ty: 2, ..Prop::default() });
    props.insert(Prop { z: 5000, ty: 2, ..Prop::default() });
    assert!(props.as_slice().windows(2).all(|w| w[0].z <= w[1].z));
    assert_eq!(props.len(), 103);
}
