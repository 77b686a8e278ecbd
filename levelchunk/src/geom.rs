//! Chunk and section coordinates, and the vertical limits of a world.

use std::fmt;

use glam::IVec3;


/// Number of blocks along one horizontal side of a chunk.
pub const CHUNK_WIDTH: usize = 16;
/// Number of blocks along each axis of a section.
pub const SECTION_SIZE: usize = 16;
/// Number of blocks in a section.
pub const SECTION_VOLUME: usize = SECTION_SIZE * SECTION_SIZE * SECTION_SIZE;


/// Position of a chunk column, in chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {

    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Get the chunk containing the given block position, the Y coordinate is ignored.
    #[inline]
    pub fn from_block(pos: IVec3) -> Self {
        Self { x: pos.x >> 4, z: pos.z >> 4 }
    }

    /// Pack this position into a long, X in the low 32 bits and Z in the high ones.
    #[inline]
    pub fn to_long(self) -> i64 {
        (self.x as u32 as i64) | ((self.z as u32 as i64) << 32)
    }

    /// Inverse of [`Self::to_long`].
    #[inline]
    pub fn from_long(packed: i64) -> Self {
        Self { x: packed as i32, z: (packed >> 32) as i32 }
    }

    /// The X block coordinate of the chunk's first column.
    #[inline]
    pub fn start_x(self) -> i32 {
        self.x << 4
    }

    /// The Z block coordinate of the chunk's first column.
    #[inline]
    pub fn start_z(self) -> i32 {
        self.z << 4
    }

    /// Return true if the given block position is in this chunk's column.
    #[inline]
    pub fn contains(self, pos: IVec3) -> bool {
        Self::from_block(pos) == self
    }

}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Position of a chunk section, in section coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkSectionPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkSectionPos {

    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn from_block(pos: IVec3) -> Self {
        Self { x: pos.x >> 4, y: pos.y >> 4, z: pos.z >> 4 }
    }

    #[inline]
    pub fn chunk(self) -> ChunkPos {
        ChunkPos::new(self.x, self.z)
    }

    /// The block position of the section's minimum corner.
    #[inline]
    pub fn min_block(self) -> IVec3 {
        IVec3::new(self.x << 4, self.y << 4, self.z << 4)
    }

}

/// Convert a block coordinate to the coordinate of its section.
#[inline]
pub fn section_coord(block: i32) -> i32 {
    block >> 4
}

/// Pack chunk-local coordinates into the short used by post-processing queues, each
/// coordinate keeps its low 4 bits: `zzzz yyyy xxxx`.
#[inline]
pub fn pack_local(pos: IVec3) -> u16 {
    ((pos.x & 15) | ((pos.y & 15) << 4) | ((pos.z & 15) << 8)) as u16
}

/// Rebuild a block position from a packed local short, the section coordinate and the
/// chunk holding it.
#[inline]
pub fn unpack_local(packed: u16, section_y: i32, chunk: ChunkPos) -> IVec3 {
    let packed = packed as i32;
    IVec3::new(
        (packed & 15) + chunk.start_x(),
        ((packed >> 4) & 15) + (section_y << 4),
        ((packed >> 8) & 15) + chunk.start_z(),
    )
}


/// Vertical extent of a world, both the bottom and the height are multiple of 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightLimit {
    bottom_y: i32,
    height: u32,
}

impl HeightLimit {

    /// Create a new height limit. Panics if the bottom or the height is not aligned to
    /// sections, or if the height is zero.
    pub fn new(bottom_y: i32, height: u32) -> Self {
        assert!(bottom_y % 16 == 0, "bottom y must be a multiple of 16");
        assert!(height != 0 && height % 16 == 0, "height must be a non-zero multiple of 16");
        Self { bottom_y, height }
    }

    #[inline]
    pub fn bottom_y(self) -> i32 {
        self.bottom_y
    }

    #[inline]
    pub fn height(self) -> u32 {
        self.height
    }

    /// Exclusive top Y coordinate.
    #[inline]
    pub fn top_y(self) -> i32 {
        self.bottom_y + self.height as i32
    }

    #[inline]
    pub fn section_count(self) -> usize {
        (self.height / 16) as usize
    }

    #[inline]
    pub fn bottom_section_coord(self) -> i32 {
        section_coord(self.bottom_y)
    }

    /// Exclusive top section coordinate.
    #[inline]
    pub fn top_section_coord(self) -> i32 {
        section_coord(self.top_y() - 1) + 1
    }

    #[inline]
    pub fn is_out_of_height(self, y: i32) -> bool {
        y < self.bottom_y || y >= self.top_y()
    }

    /// Return the index of the section containing the given Y coordinate, if in range.
    #[inline]
    pub fn section_index(self, y: i32) -> Option<usize> {
        self.section_index_from_coord(section_coord(y))
    }

    /// Return the index of a section given its coordinate, if in range.
    #[inline]
    pub fn section_index_from_coord(self, section_y: i32) -> Option<usize> {
        let index = section_y - self.bottom_section_coord();
        if index >= 0 && (index as usize) < self.section_count() {
            Some(index as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn section_coord_from_index(self, index: usize) -> i32 {
        self.bottom_section_coord() + index as i32
    }

}


/// Represent a cube facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Face {
    NegY = 0,
    PosY = 1,
    NegZ = 2,
    PosZ = 3,
    NegX = 4,
    PosX = 5,
}

impl Face {

    /// Array containing all 6 faces.
    pub const ALL: [Self; 6] = [Self::NegY, Self::PosY, Self::NegZ, Self::PosZ, Self::NegX, Self::PosX];

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Face::NegY => Face::PosY,
            Face::PosY => Face::NegY,
            Face::NegZ => Face::PosZ,
            Face::PosZ => Face::NegZ,
            Face::NegX => Face::PosX,
            Face::PosX => Face::NegX,
        }
    }

    /// Get the delta vector for this face.
    #[inline]
    pub fn delta(self) -> IVec3 {
        match self {
            Face::NegY => IVec3::NEG_Y,
            Face::PosY => IVec3::Y,
            Face::NegZ => IVec3::NEG_Z,
            Face::PosZ => IVec3::Z,
            Face::NegX => IVec3::NEG_X,
            Face::PosX => IVec3::X,
        }
    }

}
