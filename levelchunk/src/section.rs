//! A 16x16x16 band of a chunk, storing palette-compressed block states and the
//! counters derived from them.

use std::io::{self, Read, Write};

use glam::IVec3;

use crate::block::{BlockRegistry, BlockState, FluidState};
use crate::palette::{PalettedContainer, PaletteError};
use crate::io::{ReadJavaExt, WriteJavaExt};
use crate::geom::SECTION_VOLUME;


/// Calculate the index in the section's array for the given position, only the low
/// 4 bits of each coordinate are used, layout is `yyyy zzzz xxxx`.
#[inline]
pub fn calc_index(pos: IVec3) -> usize {
    let x = pos.x as u32 & 0b1111;
    let y = pos.y as u32 & 0b1111;
    let z = pos.z as u32 & 0b1111;
    ((y << 8) | (z << 4) | x) as usize
}

/// Inverse of [`calc_index`], returning section-local coordinates.
#[inline]
pub fn calc_local_pos(index: usize) -> IVec3 {
    let index = index as i32;
    IVec3::new(index & 15, (index >> 8) & 15, (index >> 4) & 15)
}


/// A chunk section, it is never absent from the chunk when holding at least one
/// non-air block.
#[derive(Debug, Clone)]
pub struct ChunkSection {
    /// Number of non-air blocks.
    non_air_count: u16,
    /// Number of blocks that receive random ticks.
    random_tick_count: u16,
    /// Number of blocks containing a fluid.
    fluid_count: u16,
    /// The block states.
    states: PalettedContainer,
}

impl ChunkSection {

    /// Create a new section filled with air.
    pub fn new(global_bits: u8) -> Self {
        Self {
            non_air_count: 0,
            random_tick_count: 0,
            fluid_count: 0,
            states: PalettedContainer::new(SECTION_VOLUME, BlockState::AIR, global_bits),
        }
    }

    /// Return true if this section contains only air.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.non_air_count == 0
    }

    #[inline]
    pub fn non_air_count(&self) -> u16 {
        self.non_air_count
    }

    #[inline]
    pub fn has_random_ticks(&self) -> bool {
        self.random_tick_count != 0
    }

    #[inline]
    pub fn has_fluids(&self) -> bool {
        self.fluid_count != 0
    }

    /// Get the block state at the given position, only low 4 bits of each coordinate
    /// are used.
    #[inline]
    pub fn block_state(&self, pos: IVec3) -> Result<BlockState, PaletteError> {
        self.states.get(calc_index(pos))
    }

    #[inline]
    pub fn fluid_state(&self, registry: &dyn BlockRegistry, pos: IVec3) -> Result<FluidState, PaletteError> {
        self.block_state(pos).map(|state| registry.fluid_state(state))
    }

    /// Set the block state at the given position and update counters, the previous
    /// state is returned.
    pub fn set_block_state(&mut self, registry: &dyn BlockRegistry, pos: IVec3, state: BlockState) -> Result<BlockState, PaletteError> {

        let prev = self.states.set(calc_index(pos), state)?;
        if prev == state {
            return Ok(prev);
        }

        self.add_counts(registry, prev, -1);
        self.add_counts(registry, state, 1);
        Ok(prev)

    }

    fn add_counts(&mut self, registry: &dyn BlockRegistry, state: BlockState, delta: i32) {

        #[inline]
        fn apply(count: &mut u16, delta: i32) {
            *count = (*count as i32 + delta) as u16;
        }

        if !registry.is_air(state) {
            apply(&mut self.non_air_count, delta);
            if registry.ticks_randomly(state) {
                apply(&mut self.random_tick_count, delta);
            }
        }

        let fluid = registry.fluid_state(state);
        if !fluid.is_empty() {
            apply(&mut self.fluid_count, delta);
            if registry.fluid_ticks_randomly(fluid) {
                apply(&mut self.random_tick_count, delta);
            }
        }

    }

    /// Recompute all counters from the stored states.
    pub fn recalculate_counts(&mut self, registry: &dyn BlockRegistry) -> Result<(), PaletteError> {

        let mut non_air_count = 0usize;
        let mut random_tick_count = 0usize;
        let mut fluid_count = 0usize;

        self.states.count(|state, count| {
            if !registry.is_air(state) {
                non_air_count += count;
                if registry.ticks_randomly(state) {
                    random_tick_count += count;
                }
            }
            let fluid = registry.fluid_state(state);
            if !fluid.is_empty() {
                fluid_count += count;
                if registry.fluid_ticks_randomly(fluid) {
                    random_tick_count += count;
                }
            }
        })?;

        self.non_air_count = non_air_count as u16;
        self.random_tick_count = random_tick_count as u16;
        self.fluid_count = fluid_count as u16;
        Ok(())

    }

    /// Iterate over every stored state with its section-local position, entries that
    /// cannot be resolved are skipped.
    pub fn iter_states(&self) -> impl Iterator<Item = (IVec3, BlockState)> + '_ {
        (0..SECTION_VOLUME).filter_map(move |index| {
            self.states.get(index).ok().map(|state| (calc_local_pos(index), state))
        })
    }

    /// Write this section in its wire format.
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        writer.write_java_short(self.non_air_count as i16)?;
        self.states.write_to(writer)
    }

    /// Read a section from its wire format, counters are recomputed from the decoded
    /// states and the transmitted count is ignored.
    pub fn read_from(mut reader: impl Read, registry: &dyn BlockRegistry, global_bits: u8) -> Result<Self, PaletteError> {

        let _non_air_count = reader.read_java_short()?;
        let states = PalettedContainer::read_from(reader, SECTION_VOLUME, global_bits)?;

        let mut section = Self {
            non_air_count: 0,
            random_tick_count: 0,
            fluid_count: 0,
            states,
        };

        section.recalculate_counts(registry)?;
        Ok(section)

    }

}


#[cfg(test)]
impl ChunkSection {

    /// Wrap states without validating them, used to simulate corrupted section memory.
    pub(crate) fn from_unchecked_states(states: PalettedContainer) -> Self {
        Self {
            non_air_count: SECTION_VOLUME as u16,
            random_tick_count: 0,
            fluid_count: 0,
            states,
        }
    }

}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::test_util::{TestRegistry, STONE, WATER, LEAVES};

    #[test]
    fn index_layout() {
        assert_eq!(calc_index(IVec3::new(1, 0, 0)), 1);
        assert_eq!(calc_index(IVec3::new(0, 0, 1)), 16);
        assert_eq!(calc_index(IVec3::new(0, 1, 0)), 256);
        assert_eq!(calc_index(IVec3::new(-1, -60, 17)), (4 << 8) | (1 << 4) | 15);
        assert_eq!(calc_local_pos(calc_index(IVec3::new(3, 9, 14))), IVec3::new(3, 9, 14));
    }

    #[test]
    fn counters() {

        let registry = TestRegistry;
        let mut section = ChunkSection::new(4);
        assert!(section.is_empty());

        let pos = IVec3::new(1, 2, 3);
        assert_eq!(section.set_block_state(&registry, pos, STONE).unwrap(), BlockState::AIR);
        assert_eq!(section.non_air_count(), 1);
        assert!(!section.is_empty());

        section.set_block_state(&registry, pos, WATER).unwrap();
        assert_eq!(section.non_air_count(), 1);
        assert!(section.has_fluids());

        section.set_block_state(&registry, IVec3::ZERO, LEAVES).unwrap();
        assert!(section.has_random_ticks());

        section.set_block_state(&registry, pos, BlockState::AIR).unwrap();
        section.set_block_state(&registry, IVec3::ZERO, BlockState::AIR).unwrap();
        assert!(section.is_empty());
        assert!(!section.has_fluids());
        assert!(!section.has_random_ticks());

    }

    #[test]
    fn wire_recomputes_counts() {

        let registry = TestRegistry;
        let mut section = ChunkSection::new(4);
        section.set_block_state(&registry, IVec3::new(0, 0, 0), STONE).unwrap();
        section.set_block_state(&registry, IVec3::new(15, 15, 15), WATER).unwrap();

        let mut buf = Vec::new();
        section.write_to(&mut buf).unwrap();

        // Tamper with the transmitted count, it must not be trusted.
        buf[0] = 0x7F;

        let decoded = ChunkSection::read_from(&buf[..], &registry, 4).unwrap();
        assert_eq!(decoded.non_air_count(), 2);
        assert!(decoded.has_fluids());
        assert_eq!(decoded.block_state(IVec3::new(15, 15, 15)).unwrap(), WATER);

    }

}
