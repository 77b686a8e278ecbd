//! Per-column heightmaps, each storing the Y just above the topmost block matching the
//! predicate of its type.

use std::sync::Arc;
use std::fmt;

use arcstr::ArcStr;

use crate::block::{BlockRegistry, BlockState};
use crate::palette::{PackedArray, PaletteError};
use crate::config::ceil_log2;
use crate::geom::HeightLimit;


/// Number of columns in a heightmap.
const COLUMNS: usize = 256;


/// The purpose of a heightmap type, this decides where it is maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightmapUsage {
    /// Only used during world generation, not maintained by loaded chunks.
    WorldGen,
    /// Maintained by loaded chunks but not sent to clients.
    Live,
    /// Maintained by loaded chunks and sent to clients.
    Client,
}

/// Signature of a heightmap predicate.
pub type HeightmapPredicate = dyn Fn(&dyn BlockRegistry, BlockState) -> bool + Send + Sync;

/// A heightmap type, with its canonical name and its block predicate.
#[derive(Clone)]
pub struct HeightmapType {
    name: ArcStr,
    usage: HeightmapUsage,
    predicate: Arc<HeightmapPredicate>,
}

impl HeightmapType {

    pub fn new<F>(name: ArcStr, usage: HeightmapUsage, predicate: F) -> Self
    where
        F: Fn(&dyn BlockRegistry, BlockState) -> bool + Send + Sync + 'static,
    {
        Self { name, usage, predicate: Arc::new(predicate) }
    }

    /// The canonical name, used as the key in saved and network data.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    #[inline]
    pub fn usage(&self) -> HeightmapUsage {
        self.usage
    }

    /// Return true if chunks keep this heightmap up to date on every block change.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.usage != HeightmapUsage::WorldGen
    }

    #[inline]
    pub fn is_sent_to_client(&self) -> bool {
        self.usage == HeightmapUsage::Client
    }

    /// Test if the given state counts as a block for this heightmap.
    #[inline]
    pub fn test(&self, registry: &dyn BlockRegistry, state: BlockState) -> bool {
        (self.predicate)(registry, state)
    }

}

impl fmt::Debug for HeightmapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeightmapType")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}


/// Index of a heightmap type in its [`HeightmapTypes`] set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeightmapKind(pub usize);

impl HeightmapKind {
    pub const WORLD_SURFACE_WG: Self = Self(0);
    pub const WORLD_SURFACE: Self = Self(1);
    pub const OCEAN_FLOOR_WG: Self = Self(2);
    pub const OCEAN_FLOOR: Self = Self(3);
    pub const MOTION_BLOCKING: Self = Self(4);
    pub const MOTION_BLOCKING_NO_LEAVES: Self = Self(5);
}

/// The set of heightmap types known to a world, each addressed by its kind.
#[derive(Debug, Clone, Default)]
pub struct HeightmapTypes {
    types: Vec<HeightmapType>,
}

impl HeightmapTypes {

    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    /// The vanilla types, their kinds are the constants defined on [`HeightmapKind`].
    pub fn vanilla() -> Self {

        fn is_not_air(registry: &dyn BlockRegistry, state: BlockState) -> bool {
            !registry.is_air(state)
        }

        fn is_motion_blocking(registry: &dyn BlockRegistry, state: BlockState) -> bool {
            registry.blocks_movement(state) || !registry.fluid_state(state).is_empty()
        }

        let mut types = Self::new();
        types.push(HeightmapType::new(arcstr::literal!("WORLD_SURFACE_WG"), HeightmapUsage::WorldGen, is_not_air));
        types.push(HeightmapType::new(arcstr::literal!("WORLD_SURFACE"), HeightmapUsage::Client, is_not_air));
        types.push(HeightmapType::new(arcstr::literal!("OCEAN_FLOOR_WG"), HeightmapUsage::WorldGen, |r, s| r.blocks_movement(s)));
        types.push(HeightmapType::new(arcstr::literal!("OCEAN_FLOOR"), HeightmapUsage::Live, |r, s| r.blocks_movement(s)));
        types.push(HeightmapType::new(arcstr::literal!("MOTION_BLOCKING"), HeightmapUsage::Client, is_motion_blocking));
        types.push(HeightmapType::new(arcstr::literal!("MOTION_BLOCKING_NO_LEAVES"), HeightmapUsage::Live, |r, s| {
            is_motion_blocking(r, s) && !r.is_leaves(s)
        }));
        types

    }

    /// Add a type to this set and return its kind.
    pub fn push(&mut self, ty: HeightmapType) -> HeightmapKind {
        self.types.push(ty);
        HeightmapKind(self.types.len() - 1)
    }

    #[inline]
    pub fn get(&self, kind: HeightmapKind) -> Option<&HeightmapType> {
        self.types.get(kind.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Find a type from its canonical name.
    pub fn find(&self, name: &str) -> Option<HeightmapKind> {
        self.types.iter().position(|ty| ty.name.as_str() == name).map(HeightmapKind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (HeightmapKind, &HeightmapType)> + '_ {
        self.types.iter().enumerate().map(|(index, ty)| (HeightmapKind(index), ty))
    }

}


/// A heightmap storing for each of the 256 columns the Y coordinate above the topmost
/// matching block, or the bottom of the world if there is none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heightmap {
    bottom_y: i32,
    /// Entries are stored relative to the bottom.
    storage: PackedArray,
}

impl Heightmap {

    /// Create a new heightmap with all columns at the bottom.
    pub fn new(limit: HeightLimit) -> Self {
        let bits = ceil_log2(limit.height() + 1) as u8;
        Self { bottom_y: limit.bottom_y(), storage: PackedArray::new(bits, COLUMNS) }
    }

    #[inline]
    fn index(x: i32, z: i32) -> usize {
        ((x & 15) + (z & 15) * 16) as usize
    }

    /// The "no block" sentinel, returned for columns without matching block.
    #[inline]
    pub fn bottom_y(&self) -> i32 {
        self.bottom_y
    }

    /// Get the Y coordinate above the topmost matching block of a column.
    #[inline]
    pub fn get(&self, x: i32, z: i32) -> i32 {
        self.storage.get(Self::index(x, z)) as i32 + self.bottom_y
    }

    #[inline]
    pub fn set(&mut self, x: i32, z: i32, y: i32) {
        debug_assert!(y >= self.bottom_y);
        self.storage.set(Self::index(x, z), (y - self.bottom_y) as u32);
    }

    /// Update a column after the block at the given Y changed. The `matches` argument
    /// tells if the new block matches, and `column` is called to test blocks below when
    /// the topmost one no longer matches. Return true if the column changed.
    pub fn track_update(&mut self, x: i32, y: i32, z: i32, matches: bool, column: impl Fn(i32) -> bool) -> bool {

        let top = self.get(x, z);
        if y <= top - 2 {
            return false;
        }

        if matches {
            if y >= top {
                self.set(x, z, y + 1);
                return true;
            }
        } else if top - 1 == y {
            let new_top = (self.bottom_y..y).rev()
                .find(|&y| column(y))
                .map(|y| y + 1)
                .unwrap_or(self.bottom_y);
            self.set(x, z, new_top);
            return true;
        }

        false

    }

    /// Get the highest entry over all columns.
    pub fn highest(&self) -> i32 {
        (0..COLUMNS).map(|index| self.storage.get(index) as i32).max().unwrap_or(0) + self.bottom_y
    }

    /// The packed words, as saved or sent to clients.
    #[inline]
    pub fn as_longs(&self) -> Vec<i64> {
        self.storage.data().iter().map(|&word| word as i64).collect()
    }

    /// Replace the whole heightmap with the given packed words.
    pub fn set_longs(&mut self, longs: &[i64]) -> Result<(), PaletteError> {
        let data = longs.iter().map(|&word| word as u64).collect();
        self.storage = PackedArray::from_raw(self.storage.bits(), COLUMNS, data)?;
        Ok(())
    }

}
