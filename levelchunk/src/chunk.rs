//! A chunk column, storing block states in sections, its heightmaps, block entities,
//! scheduled ticks and structure metadata.

use std::collections::{HashMap, HashSet};
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use glam::IVec3;
use indexmap::IndexMap;
use tracing::{error, warn};

use crate::block::{BlockId, BlockRegistry, BlockState, FluidId, FluidState};
use crate::structure::{StructureStart, StructureStore, StructureType};
use crate::tick::{TickPriority, TickSchedulerSlot};
use crate::game_event::{GameEventDispatcher, GameEventDispatchers};
use crate::heightmap::{Heightmap, HeightmapKind};
use crate::block_entity::BlockEntity;
use crate::geom::{ChunkPos, HeightLimit};
use crate::biome::{Biome, BiomeArray};
use crate::palette::PaletteError;
use crate::section::ChunkSection;
use crate::ticker::TickerHandle;
use crate::level::{Event, Level};
use crate::crash::CrashReport;
use crate::nbt::NbtCompound;
use crate::config::{self, ChunkConfig};

mod entities;
mod packet;
mod process;

pub use entities::DetachedBlockEntity;
pub use packet::{PacketError, SectionsPacket};


/// Flags given when setting a block state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SetBlockFlags(u8);

impl SetBlockFlags {

    pub const NONE: Self = Self(0);
    /// The block is moved, by a piston for example.
    pub const MOVED: Self = Self(1 << 0);
    /// Clients should not re-render the block.
    pub const NO_REDRAW: Self = Self(1 << 1);
    /// Neighbors should not react to this change.
    pub const FORCE_STATE: Self = Self(1 << 2);

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

}

impl BitOr for SetBlockFlags {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SetBlockFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}


/// The lifecycle stage of a chunk, as decided by the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LevelType {
    /// The chunk is loaded but not accessible.
    #[default]
    Inaccessible,
    /// Accessible, but nothing is ticked.
    Border,
    /// Blocks and block entities are ticked.
    Ticking,
    /// Entities are also ticked.
    EntityTicking,
}

/// A callback run once, the first time the chunk is loaded to its world.
pub type LoadCallback = Box<dyn FnOnce(&mut Chunk) + Send>;

/// Everything needed to construct a chunk, given by the loader or the generator.
pub struct ChunkInit {
    pub pos: ChunkPos,
    /// Initial biomes, filled with the default biome if absent.
    pub biomes: Option<BiomeArray>,
    /// Opaque format migration hints, kept for the save.
    pub upgrade_data: NbtCompound,
    pub block_ticks: TickSchedulerSlot<BlockId>,
    pub fluid_ticks: TickSchedulerSlot<FluidId>,
    pub inhabited_time: u64,
    /// Initial sections, all empty if absent. The length should be the number of
    /// sections of the world.
    pub sections: Option<Vec<Option<ChunkSection>>>,
    pub on_load: Option<LoadCallback>,
}

impl ChunkInit {

    /// An empty chunk at the given position, with local tick schedulers.
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            biomes: None,
            upgrade_data: NbtCompound::new(),
            block_ticks: TickSchedulerSlot::default(),
            fluid_ticks: TickSchedulerSlot::default(),
            inhabited_time: 0,
            sections: None,
            on_load: None,
        }
    }

}


/// A chunk column of the world.
pub struct Chunk {
    pos: ChunkPos,
    config: Arc<ChunkConfig>,
    /// One slot per section, absent sections contain only air.
    sections: Vec<Option<ChunkSection>>,
    /// One slot per heightmap kind, only live types are present.
    heightmaps: Vec<Option<Heightmap>>,
    biomes: BiomeArray,
    upgrade_data: NbtCompound,
    block_ticks: TickSchedulerSlot<BlockId>,
    fluid_ticks: TickSchedulerSlot<FluidId>,
    inhabited_time: u64,
    /// Installed block entities.
    block_entities: IndexMap<IVec3, Box<dyn BlockEntity>>,
    /// Saved or received block entities, materialized on first access.
    pending_block_entities: IndexMap<IVec3, NbtCompound>,
    /// Handles of the tickers registered in the world for our block entities.
    block_entity_tickers: HashMap<IVec3, TickerHandle>,
    /// The block entity currently lent to its ticker, if any.
    detached_block_entity: Option<DetachedBlockEntity>,
    /// Serial given to the next installed block entity.
    next_block_entity_serial: u32,
    game_event_dispatchers: GameEventDispatchers,
    structures: StructureStore,
    /// For each section, packed local positions waiting for post-processing.
    post_processing: Vec<Vec<u16>>,
    level_type: LevelType,
    loaded_to_world: bool,
    on_load: Option<LoadCallback>,
    needs_saving: bool,
}

impl Chunk {

    /// Construct a new chunk. If the given sections don't match the number of sections
    /// of the world a warning is logged, the sections that fit are kept and the other
    /// ones are empty.
    pub fn new(config: Arc<ChunkConfig>, init: ChunkInit) -> Self {

        let limit = config.height();
        let section_count = limit.section_count();

        let mut sections = (0..section_count).map(|_| None).collect::<Vec<_>>();
        if let Some(init_sections) = init.sections {
            if init_sections.len() != section_count {
                warn!("could not set chunk {} sections, array length is {} instead of {}", init.pos, init_sections.len(), section_count);
            }
            for (dst, src) in sections.iter_mut().zip(init_sections) {
                *dst = src;
            }
        }

        let heightmaps = config.heightmaps().iter()
            .map(|(_, ty)| ty.is_live().then(|| Heightmap::new(limit)))
            .collect();

        Self {
            pos: init.pos,
            biomes: init.biomes.unwrap_or_else(|| BiomeArray::new(limit, Biome::default())),
            upgrade_data: init.upgrade_data,
            block_ticks: init.block_ticks,
            fluid_ticks: init.fluid_ticks,
            inhabited_time: init.inhabited_time,
            sections,
            heightmaps,
            block_entities: IndexMap::new(),
            pending_block_entities: IndexMap::new(),
            block_entity_tickers: HashMap::new(),
            detached_block_entity: None,
            next_block_entity_serial: 0,
            game_event_dispatchers: GameEventDispatchers::new(),
            structures: StructureStore::new(),
            post_processing: vec![Vec::new(); section_count],
            level_type: LevelType::default(),
            loaded_to_world: false,
            on_load: init.on_load,
            needs_saving: false,
            config,
        }

    }

    #[inline]
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    #[inline]
    pub fn config(&self) -> &Arc<ChunkConfig> {
        &self.config
    }

    #[inline]
    pub fn height_limit(&self) -> HeightLimit {
        self.config.height()
    }

    #[inline]
    fn registry(&self) -> &dyn BlockRegistry {
        &**self.config.registry()
    }

    // =================== //
    //       SECTIONS      //
    // =================== //

    /// All section slots, from the bottom.
    #[inline]
    pub fn sections(&self) -> &[Option<ChunkSection>] {
        &self.sections
    }

    #[inline]
    pub fn section(&self, index: usize) -> Option<&ChunkSection> {
        self.sections.get(index)?.as_ref()
    }

    /// Return true if the section at the given index is absent or contains only air.
    #[inline]
    pub fn is_section_empty(&self, index: usize) -> bool {
        self.section(index).is_none_or(ChunkSection::is_empty)
    }

    /// Get the block state at the given position, air is returned outside of the height
    /// limit and in empty sections. An error with the positional context is returned
    /// if the section data is corrupted.
    pub fn try_block_state(&self, pos: IVec3) -> Result<BlockState, CrashReport> {
        match self.height_limit().section_index(pos.y).and_then(|index| self.section(index)) {
            Some(section) if !section.is_empty() => section.block_state(pos)
                .map_err(|e| CrashReport::new("Getting block state", self.pos, pos, e)),
            _ => Ok(BlockState::AIR),
        }
    }

    /// Get the block state at the given position, see [`Self::try_block_state`].
    /// 
    /// Panics with the crash report if the section data is corrupted.
    pub fn block_state(&self, pos: IVec3) -> BlockState {
        match self.try_block_state(pos) {
            Ok(state) => state,
            Err(report) => {
                error!("{report}");
                panic!("{report}");
            }
        }
    }

    /// Get the fluid state at the given position, derived from the block state.
    pub fn try_fluid_state(&self, pos: IVec3) -> Result<FluidState, CrashReport> {
        match self.height_limit().section_index(pos.y).and_then(|index| self.section(index)) {
            Some(section) if !section.is_empty() => section.fluid_state(self.registry(), pos)
                .map_err(|e| CrashReport::new("Getting fluid state", self.pos, pos, e)),
            _ => Ok(FluidState::EMPTY),
        }
    }

    /// Get the fluid state at the given position, see [`Self::try_fluid_state`].
    /// 
    /// Panics with the crash report if the section data is corrupted.
    pub fn fluid_state(&self, pos: IVec3) -> FluidState {
        match self.try_fluid_state(pos) {
            Ok(state) => state,
            Err(report) => {
                error!("{report}");
                panic!("{report}");
            }
        }
    }

    /// Set the block state at the given position, see [`Self::set_block_state_with`].
    #[inline]
    pub fn set_block_state(&mut self, level: &mut Level, pos: IVec3, state: BlockState, moved: bool) -> Option<BlockState> {
        let flags = if moved { SetBlockFlags::MOVED } else { SetBlockFlags::NONE };
        self.set_block_state_with(level, pos, state, flags)
    }

    /// Set the block state at the given position, returning the previous state if it
    /// changed. Nothing is done if the state is already there, if the position is out
    /// of the height limit, or if the write is rejected by the block hooks.
    /// 
    /// Panics with a crash report if the section data is corrupted.
    pub fn set_block_state_with(&mut self, level: &mut Level, pos: IVec3, state: BlockState, flags: SetBlockFlags) -> Option<BlockState> {

        let limit = self.height_limit();
        let index = limit.section_index(pos.y)?;
        let registry = Arc::clone(self.config.registry());
        let moved = flags.contains(SetBlockFlags::MOVED);

        let global_bits = self.config.global_bits();
        let slot = &mut self.sections[index];
        if slot.is_none() && registry.is_air(state) {
            return None;
        }

        let section = slot.get_or_insert_with(|| ChunkSection::new(global_bits));
        let was_empty = section.is_empty();
        let prev = match section.set_block_state(&*registry, pos, state) {
            Ok(prev) => prev,
            Err(e) => {
                let report = CrashReport::new("Setting block state", self.pos, pos, e);
                error!("{report}");
                panic!("{report}");
            }
        };

        if prev == state {
            return None;
        }

        let is_empty = section.is_empty();

        self.track_heightmaps(&*registry, pos, state);

        if was_empty != is_empty {
            level.push_event(Event::SectionStatus {
                chunk: self.pos,
                section_y: limit.section_coord_from_index(index),
                empty: is_empty,
            });
        }

        let is_client = level.is_client();
        if !is_client {
            registry.on_state_replaced(self, level, pos, prev, state, moved);
        } else if registry.has_block_entity(prev) && registry.block_of(prev) != registry.block_of(state) {
            self.remove_block_entity(level, pos);
        }

        // The hooks may have changed the block again.
        let current = self.section(index).and_then(|section| section.block_state(pos).ok());
        if current.map(|current| registry.block_of(current)) != Some(registry.block_of(state)) {
            return None;
        }

        if !is_client {
            registry.on_block_added(self, level, pos, state, prev, moved);
        }

        if registry.has_block_entity(state) && !self.update_block_entity_state(level, pos, state) {
            if let Some(block_entity) = registry.create_block_entity(pos, state) {
                self.add_block_entity(level, block_entity);
            }
        }

        self.needs_saving = true;
        level.push_event(Event::Block { pos, prev, new: state, flags });
        Some(prev)

    }

    /// Iterate over every light emitting block of the chunk, with its luminance.
    pub fn light_sources(&self) -> impl Iterator<Item = (IVec3, u8)> + '_ {
        let limit = self.height_limit();
        let registry = self.registry();
        let origin = IVec3::new(self.pos.start_x(), 0, self.pos.start_z());
        self.sections.iter().enumerate()
            .filter_map(|(index, section)| section.as_ref().filter(|s| !s.is_empty()).map(|s| (index, s)))
            .flat_map(move |(index, section)| {
                let section_origin = origin + IVec3::new(0, limit.section_coord_from_index(index) << 4, 0);
                section.iter_states().filter_map(move |(local, state)| {
                    let luminance = registry.luminance(state);
                    (luminance != 0).then_some((section_origin + local, luminance))
                })
            })
    }

    // =================== //
    //      HEIGHTMAPS     //
    // =================== //

    /// Update every live heightmap after a block change.
    fn track_heightmaps(&mut self, registry: &dyn BlockRegistry, pos: IVec3, state: BlockState) {

        let limit = self.height_limit();
        let sections = &self.sections;
        let (x, y, z) = (pos.x & 15, pos.y, pos.z & 15);

        for (kind, ty) in self.config.heightmaps().iter() {

            let Some(heightmap) = self.heightmaps[kind.0].as_mut() else { continue };
            let matches = ty.test(registry, state);
            heightmap.track_update(x, y, z, matches, |y| {
                ty.test(registry, column_state(sections, limit, x, y, z))
            });

            if config::strict_heightmap() {
                let expected = scan_column(sections, limit, x, z, |state| ty.test(registry, state));
                if heightmap.get(x, z) != expected {
                    error!("heightmap {} of chunk {} at {x}/{z} is {}, expected {expected}", ty.name(), self.pos, heightmap.get(x, z));
                }
            }

        }

    }

    /// Get a heightmap, only live types are present unless set explicitly.
    #[inline]
    pub fn heightmap(&self, kind: HeightmapKind) -> Option<&Heightmap> {
        self.heightmaps.get(kind.0)?.as_ref()
    }

    /// Sample a heightmap, returning the Y coordinate just above the topmost matching
    /// block of the column, or the bottom of the world if there is none.
    pub fn sample_heightmap(&self, kind: HeightmapKind, x: i32, z: i32) -> i32 {
        match self.heightmap(kind) {
            Some(heightmap) => heightmap.get(x, z),
            None => self.height_limit().bottom_y(),
        }
    }

    /// The packed words of a heightmap, as saved or sent to clients.
    #[inline]
    pub fn heightmap_longs(&self, kind: HeightmapKind) -> Option<Vec<i64>> {
        self.heightmap(kind).map(Heightmap::as_longs)
    }

    /// Replace a heightmap from its packed words, creating it if not present.
    pub fn set_heightmap(&mut self, kind: HeightmapKind, longs: &[i64]) -> Result<(), PaletteError> {
        let limit = self.height_limit();
        let Some(slot) = self.heightmaps.get_mut(kind.0) else {
            return Ok(());
        };
        slot.get_or_insert_with(|| Heightmap::new(limit)).set_longs(longs)
    }

    /// Recompute every live heightmap from the sections.
    pub fn populate_heightmaps(&mut self) {

        let limit = self.height_limit();
        let registry = Arc::clone(self.config.registry());
        let sections = &self.sections;

        for (kind, ty) in self.config.heightmaps().iter() {
            let Some(heightmap) = self.heightmaps[kind.0].as_mut() else { continue };
            for x in 0..16 {
                for z in 0..16 {
                    let top = scan_column(sections, limit, x, z, |state| ty.test(&*registry, state));
                    heightmap.set(x, z, top);
                }
            }
        }

    }

    /// Find the highest point of a heightmap type in this chunk with a full rescan of
    /// all columns, this is slow and not used when setting blocks.
    pub fn find_highest_point_within(&self, kind: HeightmapKind) -> i32 {

        let limit = self.height_limit();
        let Some(ty) = self.config.heightmaps().get(kind) else {
            return limit.bottom_y();
        };

        let registry = self.registry();
        let mut highest = limit.bottom_y();
        for x in 0..16 {
            for z in 0..16 {
                highest = highest.max(scan_column(&self.sections, limit, x, z, |state| ty.test(registry, state)));
            }
        }

        highest

    }

    // =================== //
    //       METADATA      //
    // =================== //

    #[inline]
    pub fn biomes(&self) -> &BiomeArray {
        &self.biomes
    }

    #[inline]
    pub fn upgrade_data(&self) -> &NbtCompound {
        &self.upgrade_data
    }

    #[inline]
    pub fn inhabited_time(&self) -> u64 {
        self.inhabited_time
    }

    #[inline]
    pub fn set_inhabited_time(&mut self, inhabited_time: u64) {
        self.inhabited_time = inhabited_time;
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.needs_saving = true;
    }

    #[inline]
    pub fn set_needs_saving(&mut self, needs_saving: bool) {
        self.needs_saving = needs_saving;
    }

    #[inline]
    pub fn needs_saving(&self) -> bool {
        self.needs_saving
    }

    #[inline]
    pub fn level_type(&self) -> LevelType {
        self.level_type
    }

    #[inline]
    pub fn set_level_type(&mut self, level_type: LevelType) {
        self.level_type = level_type;
    }

    /// Return true if blocks and block entities of this chunk can be ticked.
    #[inline]
    pub fn is_ticking(&self) -> bool {
        self.level_type >= LevelType::Ticking
    }

    #[inline]
    pub fn is_loaded_to_world(&self) -> bool {
        self.loaded_to_world
    }

    #[inline]
    pub fn set_loaded_to_world(&mut self, loaded_to_world: bool) {
        self.loaded_to_world = loaded_to_world;
    }

    /// Run the load callback if not already done. Return true if it was run.
    pub fn load_to_world(&mut self) -> bool {
        match self.on_load.take() {
            Some(callback) => {
                callback(self);
                true
            }
            None => false,
        }
    }

    // =================== //
    //    SCHEDULED TICKS  //
    // =================== //

    #[inline]
    pub fn block_tick_scheduler(&self) -> &TickSchedulerSlot<BlockId> {
        &self.block_ticks
    }

    #[inline]
    pub fn fluid_tick_scheduler(&self) -> &TickSchedulerSlot<FluidId> {
        &self.fluid_ticks
    }

    /// Schedule a block tick in this chunk, locally or in the world scheduler depending
    /// on the state of the chunk scheduler.
    pub fn schedule_block_tick(&mut self, level: &mut Level, pos: IVec3, block: BlockId, delay: u64, priority: TickPriority) -> bool {
        debug_assert!(self.pos.contains(pos), "tick scheduled outside of its chunk");
        let time = level.time();
        self.block_ticks.schedule(level.block_ticks_mut(), pos, block, delay, time, priority)
    }

    /// Schedule a fluid tick, see [`Self::schedule_block_tick`].
    pub fn schedule_fluid_tick(&mut self, level: &mut Level, pos: IVec3, fluid: FluidId, delay: u64, priority: TickPriority) -> bool {
        debug_assert!(self.pos.contains(pos), "tick scheduled outside of its chunk");
        let time = level.time();
        self.fluid_ticks.schedule(level.fluid_ticks_mut(), pos, fluid, delay, time, priority)
    }

    #[inline]
    pub fn is_block_tick_scheduled(&self, level: &Level, pos: IVec3, block: BlockId) -> bool {
        self.block_ticks.is_scheduled(level.block_ticks(), pos, block)
    }

    #[inline]
    pub fn is_fluid_tick_scheduled(&self, level: &Level, pos: IVec3, fluid: FluidId) -> bool {
        self.fluid_ticks.is_scheduled(level.fluid_ticks(), pos, fluid)
    }

    /// Move the ticks of the local schedulers to the world ones, afterward ticks are
    /// directly scheduled in the world. Nothing is done if already promoted.
    pub fn disable_tick_schedulers(&mut self, level: &mut Level) {
        let time = level.time();
        let block = self.block_ticks.promote(level.block_ticks_mut(), time);
        let fluid = self.fluid_ticks.promote(level.fluid_ticks_mut(), time);
        if block || fluid {
            tracing::debug!("chunk {} tick schedulers promoted to world", self.pos);
        }
    }

    /// Take back this chunk's ticks from the world schedulers into local ones, nothing
    /// is done if the schedulers are already local.
    pub fn enable_tick_schedulers(&mut self, level: &mut Level) {
        let time = level.time();
        let block = self.block_ticks.demote(level.block_ticks_mut(), self.pos, time);
        let fluid = self.fluid_ticks.demote(level.fluid_ticks_mut(), self.pos, time);
        if block || fluid {
            tracing::debug!("chunk {} tick schedulers taken back from world", self.pos);
        }
    }

    // =================== //
    //      STRUCTURES     //
    // =================== //

    #[inline]
    pub fn structure_start(&self, structure: &StructureType) -> Option<&StructureStart> {
        self.structures.start(structure)
    }

    pub fn set_structure_start(&mut self, structure: StructureType, start: StructureStart) {
        self.structures.set_start(structure, start);
        self.needs_saving = true;
    }

    #[inline]
    pub fn structure_starts(&self) -> &HashMap<StructureType, StructureStart> {
        self.structures.starts()
    }

    pub fn set_structure_starts(&mut self, starts: HashMap<StructureType, StructureStart>) {
        self.structures.set_starts(starts);
        self.needs_saving = true;
    }

    /// Get the references to a structure type, an empty set is created if missing.
    #[inline]
    pub fn structure_references(&mut self, structure: &StructureType) -> &HashSet<i64> {
        self.structures.references(structure)
    }

    pub fn add_structure_reference(&mut self, structure: StructureType, reference: i64) {
        self.structures.add_reference(structure, reference);
        self.needs_saving = true;
    }

    #[inline]
    pub fn all_structure_references(&self) -> &HashMap<StructureType, HashSet<i64>> {
        self.structures.all_references()
    }

    pub fn set_structure_references(&mut self, references: HashMap<StructureType, HashSet<i64>>) {
        self.structures.set_references(references);
        self.needs_saving = true;
    }

    // =================== //
    //     GAME EVENTS     //
    // =================== //

    /// Get the game event dispatcher of a section, it's created if missing.
    #[inline]
    pub fn game_event_dispatcher(&mut self, section_y: i32) -> &mut GameEventDispatcher {
        self.game_event_dispatchers.get_or_create(section_y)
    }

    #[inline]
    pub fn game_event_dispatchers(&self) -> &GameEventDispatchers {
        &self.game_event_dispatchers
    }

}


/// Get a block state from the sections, air is returned for corrupted entries.
#[inline]
fn column_state(sections: &[Option<ChunkSection>], limit: HeightLimit, x: i32, y: i32, z: i32) -> BlockState {
    limit.section_index(y)
        .and_then(|index| sections[index].as_ref())
        .and_then(|section| section.block_state(IVec3::new(x, y, z)).ok())
        .unwrap_or(BlockState::AIR)
}

/// Scan a column from the top, returning the Y above the first matching block or the
/// bottom of the world.
fn scan_column(sections: &[Option<ChunkSection>], limit: HeightLimit, x: i32, z: i32, matches: impl Fn(BlockState) -> bool) -> i32 {
    for (index, section) in sections.iter().enumerate().rev() {
        let Some(section) = section.as_ref().filter(|s| !s.is_empty()) else { continue };
        let base_y = limit.section_coord_from_index(index) << 4;
        for local_y in (0..16).rev() {
            let pos = IVec3::new(x, local_y, z);
            if section.block_state(pos).is_ok_and(&matches) {
                return base_y + local_y + 1;
            }
        }
    }
    limit.bottom_y()
}
