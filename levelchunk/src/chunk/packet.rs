//! Applying and producing the section data of chunk packets.

use std::io::{self, Read};

use bitvec::prelude::*;
use glam::IVec3;
use tracing::{debug, instrument};

use crate::heightmap::Heightmap;
use crate::level::{Event, Level};
use crate::nbt::{Nbt, NbtCompound};
use crate::palette::PaletteError;
use crate::section::ChunkSection;
use crate::biome::BiomeArray;

use super::Chunk;


/// Sections of a chunk encoded for the network.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionsPacket {
    /// One bit per section, set for sections present in the data.
    pub mask: BitVec,
    /// Encoded sections, in ascending order of their bit.
    pub data: Vec<u8>,
    /// Heightmaps sent to clients, keyed by name.
    pub heightmaps: NbtCompound,
}

/// Error while applying a chunk packet, the chunk is left untouched.
#[derive(thiserror::Error, Debug)]
pub enum PacketError {
    #[error("section mask has {actual} bits but the chunk has {expected} sections")]
    MaskLength {
        expected: usize,
        actual: usize,
    },
    #[error("section {index}: {source}")]
    Section {
        index: usize,
        #[source]
        source: PaletteError,
    },
    #[error("heightmap {name}: {source}")]
    Heightmap {
        name: String,
        #[source]
        source: PaletteError,
    },
}


impl Chunk {

    /// Apply the data of a chunk packet. Sections with their bit set in the mask are
    /// replaced by decoding them in ascending order from the reader. With biomes, the
    /// packet is a full resync: all block entities are removed and sections with an
    /// unset bit are emptied. Without, only block entities in replaced sections are
    /// removed. Heightmaps present by name in the NBT are then overwritten.
    /// 
    /// Everything is decoded before the chunk is modified.
    #[instrument(skip_all, fields(chunk = %self.pos))]
    pub fn load_from_packet(&mut self,
        level: &mut Level,
        biomes: Option<BiomeArray>,
        mut reader: impl Read,
        heightmaps: &NbtCompound,
        mask: &BitSlice,
    ) -> Result<(), PacketError> {

        let limit = self.height_limit();
        let section_count = limit.section_count();
        if mask.len() != section_count {
            return Err(PacketError::MaskLength { expected: section_count, actual: mask.len() });
        }

        let registry = std::sync::Arc::clone(self.config.registry());
        let global_bits = self.config.global_bits();

        let mut sections = Vec::with_capacity(mask.count_ones());
        for index in mask.iter_ones() {
            let section = ChunkSection::read_from(&mut reader, &*registry, global_bits)
                .map_err(|source| PacketError::Section { index, source })?;
            sections.push((index, section));
        }

        let mut new_heightmaps = Vec::new();
        for (kind, ty) in self.config.heightmaps().iter() {
            let Some(longs) = heightmaps.get_long_array(ty.name()) else { continue };
            let mut heightmap = Heightmap::new(limit);
            heightmap.set_longs(longs)
                .map_err(|source| PacketError::Heightmap { name: ty.name().to_string(), source })?;
            new_heightmaps.push((kind, heightmap));
        }

        let full = biomes.is_some();
        let removed_positions = self.block_entities.keys()
            .copied()
            .filter(|pos| full || limit.section_index(pos.y).is_some_and(|index| mask[index]))
            .collect::<Vec<IVec3>>();

        for pos in removed_positions {
            self.remove_block_entity(level, pos);
        }

        if let Some(biomes) = biomes {
            self.biomes = biomes;
        }

        let mut new_sections = sections.into_iter().peekable();
        for index in 0..section_count {

            let was_empty = self.is_section_empty(index);

            if new_sections.peek().is_some_and(|&(new_index, _)| new_index == index) {
                if let Some((_, section)) = new_sections.next() {
                    self.sections[index] = Some(section);
                }
            } else if full {
                self.sections[index] = None;
            } else {
                continue;
            }

            let is_empty = self.is_section_empty(index);
            if was_empty != is_empty {
                level.push_event(Event::SectionStatus {
                    chunk: self.pos,
                    section_y: limit.section_coord_from_index(index),
                    empty: is_empty,
                });
            }

        }

        for (kind, heightmap) in new_heightmaps {
            self.heightmaps[kind.0] = Some(heightmap);
        }

        debug!("applied {} sections, full: {full}", mask.count_ones());
        Ok(())

    }

    /// Encode all non-empty sections and heightmaps sent to clients, the counterpart
    /// of [`Self::load_from_packet`].
    pub fn write_sections_packet(&self) -> io::Result<SectionsPacket> {

        let mut mask = bitvec![0; self.sections.len()];
        let mut data = Vec::new();

        for (index, section) in self.sections.iter().enumerate() {
            if let Some(section) = section.as_ref().filter(|s| !s.is_empty()) {
                mask.set(index, true);
                section.write_to(&mut data)?;
            }
        }

        let mut heightmaps = NbtCompound::new();
        for (kind, ty) in self.config.heightmaps().iter() {
            if !ty.is_sent_to_client() {
                continue;
            }
            if let Some(longs) = self.heightmap_longs(kind) {
                heightmaps.insert(ty.name().as_str(), Nbt::LongArray(longs));
            }
        }

        Ok(SectionsPacket { mask, data, heightmaps })

    }

}
