//! Structure starts and references stored by a chunk.

use std::collections::{HashMap, HashSet};
use std::fmt;

use arcstr::ArcStr;

use crate::geom::ChunkPos;
use crate::nbt::NbtCompound;


/// A structure type, identified by its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructureType(ArcStr);

impl StructureType {

    #[inline]
    pub const fn new(name: ArcStr) -> Self {
        Self(name)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}


/// The start of a structure, stored in the chunk where it begins.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureStart {
    pub structure: StructureType,
    /// The chunk where this structure starts.
    pub pos: ChunkPos,
    /// Number of chunks referencing this start.
    pub references: u32,
    /// Opaque structure pieces, owned by world generation.
    pub data: NbtCompound,
}

impl StructureStart {

    pub fn new(structure: StructureType, pos: ChunkPos) -> Self {
        Self { structure, pos, references: 0, data: NbtCompound::new() }
    }

}


/// Structure starts and references of a chunk, references are chunk positions packed
/// with [`ChunkPos::to_long`].
#[derive(Debug, Clone, Default)]
pub struct StructureStore {
    starts: HashMap<StructureType, StructureStart>,
    references: HashMap<StructureType, HashSet<i64>>,
}

impl StructureStore {

    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn start(&self, structure: &StructureType) -> Option<&StructureStart> {
        self.starts.get(structure)
    }

    pub fn set_start(&mut self, structure: StructureType, start: StructureStart) {
        self.starts.insert(structure, start);
    }

    #[inline]
    pub fn starts(&self) -> &HashMap<StructureType, StructureStart> {
        &self.starts
    }

    pub fn set_starts(&mut self, starts: HashMap<StructureType, StructureStart>) {
        self.starts = starts;
    }

    /// Get the references of a structure type, an empty set is created on first access.
    pub fn references(&mut self, structure: &StructureType) -> &HashSet<i64> {
        self.references.entry(structure.clone()).or_default()
    }

    pub fn add_reference(&mut self, structure: StructureType, reference: i64) {
        self.references.entry(structure).or_default().insert(reference);
    }

    #[inline]
    pub fn all_references(&self) -> &HashMap<StructureType, HashSet<i64>> {
        &self.references
    }

    pub fn set_references(&mut self, references: HashMap<StructureType, HashSet<i64>>) {
        self.references = references;
    }

}
