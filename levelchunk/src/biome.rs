//! Biome storage of a chunk, with one biome per cell of 4x4x4 blocks.

use std::io::{self, Read, Write};

use glam::IVec3;

use crate::io::{ReadJavaExt, WriteJavaExt, new_invalid_data_err};
use crate::geom::HeightLimit;


/// A biome id, the meaning of each id is left to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Biome(pub u32);

/// Biomes of a whole chunk, 64 cells per section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiomeArray {
    bottom_cell_y: i32,
    biomes: Vec<Biome>,
}

impl BiomeArray {

    /// Create a biome array filled with a single biome.
    pub fn new(limit: HeightLimit, fill: Biome) -> Self {
        Self {
            bottom_cell_y: limit.bottom_y() >> 2,
            biomes: vec![fill; Self::len_for(limit)],
        }
    }

    /// Create a biome array from raw ids, returning none if the length doesn't match
    /// the height of the world.
    pub fn from_raw(limit: HeightLimit, raw: Vec<u32>) -> Option<Self> {
        (raw.len() == Self::len_for(limit)).then(|| Self {
            bottom_cell_y: limit.bottom_y() >> 2,
            biomes: raw.into_iter().map(Biome).collect(),
        })
    }

    #[inline]
    fn len_for(limit: HeightLimit) -> usize {
        limit.section_count() * 64
    }

    #[inline]
    fn index(&self, pos: IVec3) -> usize {
        let x = (pos.x >> 2) & 3;
        let z = (pos.z >> 2) & 3;
        let max_cell_y = (self.biomes.len() / 16) as i32 - 1;
        let y = ((pos.y >> 2) - self.bottom_cell_y).clamp(0, max_cell_y);
        ((y << 4) | (z << 2) | x) as usize
    }

    /// Get the biome at the given block position, the Y coordinate is clamped to the
    /// height of the world.
    #[inline]
    pub fn get(&self, pos: IVec3) -> Biome {
        self.biomes[self.index(pos)]
    }

    #[inline]
    pub fn set(&mut self, pos: IVec3, biome: Biome) {
        let index = self.index(pos);
        self.biomes[index] = biome;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.biomes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.biomes.is_empty()
    }

    /// Write the biomes as a length-prefixed array of var ints.
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        writer.write_var_int(self.biomes.len() as i32)?;
        for biome in &self.biomes {
            writer.write_var_int(biome.0 as i32)?;
        }
        Ok(())
    }

    /// Read biomes written by [`Self::write_to`], the length must match the height.
    pub fn read_from(mut reader: impl Read, limit: HeightLimit) -> io::Result<Self> {

        let len = reader.read_var_int()?;
        if len < 0 || len as usize != Self::len_for(limit) {
            return Err(new_invalid_data_err("invalid biome array length"));
        }

        let mut raw = Vec::with_capacity(len as usize);
        for _ in 0..len {
            raw.push(reader.read_var_int()? as u32);
        }

        Self::from_raw(limit, raw).ok_or_else(|| new_invalid_data_err("invalid biome array length"))

    }

}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn cells() {

        let limit = HeightLimit::new(-64, 384);
        let mut biomes = BiomeArray::new(limit, Biome(1));
        assert_eq!(biomes.len(), 24 * 64);

        biomes.set(IVec3::new(5, -64, 13), Biome(7));
        assert_eq!(biomes.get(IVec3::new(4, -61, 12)), Biome(7));
        assert_eq!(biomes.get(IVec3::new(4, -200, 12)), Biome(7));
        assert_eq!(biomes.get(IVec3::new(0, -64, 0)), Biome(1));

        biomes.set(IVec3::new(0, 319, 0), Biome(3));
        assert_eq!(biomes.get(IVec3::new(0, 1000, 0)), Biome(3));

        assert!(BiomeArray::from_raw(limit, vec![0; 10]).is_none());

    }

}
