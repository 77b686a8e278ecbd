//! A world of chunks, it owns the level services shared by its chunks, routes block
//! access to the right chunk and ticks block entities.

use std::collections::HashMap;
use std::sync::Arc;

use glam::IVec3;
use tracing::{debug, instrument, trace, warn};

use crate::block::{BlockState, BlockView};
use crate::block_entity::{BlockEntity, CreationType};
use crate::game_event::{GameEvent, GameEventListener};
use crate::chunk::{Chunk, SetBlockFlags};
use crate::geom::{ChunkPos, ChunkSectionPos};
use crate::config::ChunkConfig;
use crate::level::Level;


/// A world holding chunks and the services they share.
pub struct World {
    level: Level,
    chunks: HashMap<ChunkPos, Chunk>,
}

/// Read-only view of the block states of every chunk of a world.
struct ChunksView<'a> {
    chunks: &'a HashMap<ChunkPos, Chunk>,
}

impl BlockView for ChunksView<'_> {
    fn block_state(&self, pos: IVec3) -> BlockState {
        match self.chunks.get(&ChunkPos::from_block(pos)) {
            Some(chunk) => chunk.block_state(pos),
            None => BlockState::AIR,
        }
    }
}

impl World {

    pub fn new(config: Arc<ChunkConfig>, is_client: bool) -> Self {
        Self {
            level: Level::new(config, is_client),
            chunks: HashMap::new(),
        }
    }

    #[inline]
    pub fn level(&self) -> &Level {
        &self.level
    }

    #[inline]
    pub fn level_mut(&mut self) -> &mut Level {
        &mut self.level
    }

    #[inline]
    pub fn config(&self) -> &Arc<ChunkConfig> {
        self.level.config()
    }

    // =================== //
    //        CHUNKS       //
    // =================== //

    /// Insert a chunk in the world, replacing and returning the previous chunk at the
    /// same position. The chunk's load callback is run, and its block entities start
    /// listening and ticking.
    pub fn insert_chunk(&mut self, mut chunk: Chunk) -> Option<Chunk> {
        let pos = chunk.pos();
        let prev = self.remove_chunk(pos);
        chunk.load_to_world();
        chunk.set_loaded_to_world(true);
        chunk.update_all_block_entities(&mut self.level);
        debug!("inserted chunk {pos}");
        self.chunks.insert(pos, chunk);
        prev
    }

    /// Remove a chunk from the world. Its block entities are removed from ticking and
    /// its scheduled ticks are taken back from the world.
    pub fn remove_chunk(&mut self, pos: ChunkPos) -> Option<Chunk> {
        let mut chunk = self.chunks.remove(&pos)?;
        chunk.remove_all_block_entities(&mut self.level);
        chunk.enable_tick_schedulers(&mut self.level);
        chunk.set_loaded_to_world(false);
        debug!("removed chunk {pos}");
        Some(chunk)
    }

    #[inline]
    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    #[inline]
    pub fn chunk_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        self.chunks.get_mut(&pos)
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    // =================== //
    //        BLOCKS       //
    // =================== //

    /// Get the block state at a position, air is returned in missing chunks.
    pub fn block_state(&self, pos: IVec3) -> BlockState {
        ChunksView { chunks: &self.chunks }.block_state(pos)
    }

    /// Set the block state at a position, nothing is done in missing chunks.
    #[inline]
    pub fn set_block_state(&mut self, pos: IVec3, state: BlockState) -> Option<BlockState> {
        self.set_block_state_with(pos, state, SetBlockFlags::NONE)
    }

    pub fn set_block_state_with(&mut self, pos: IVec3, state: BlockState, flags: SetBlockFlags) -> Option<BlockState> {
        let chunk = self.chunks.get_mut(&ChunkPos::from_block(pos))?;
        chunk.set_block_state_with(&mut self.level, pos, state, flags)
    }

    /// Get the block entity at a position, see [`Chunk::get_block_entity`].
    pub fn get_block_entity(&mut self, pos: IVec3, creation: CreationType) -> Option<&mut (dyn BlockEntity + 'static)> {
        let chunk = self.chunks.get_mut(&ChunkPos::from_block(pos))?;
        chunk.get_block_entity(&mut self.level, pos, creation)
    }

    /// Install a block entity in its chunk, it's dropped if the chunk is missing.
    pub fn add_block_entity(&mut self, block_entity: Box<dyn BlockEntity>) -> bool {
        let pos = block_entity.pos();
        match self.chunks.get_mut(&ChunkPos::from_block(pos)) {
            Some(chunk) => {
                chunk.add_block_entity(&mut self.level, block_entity);
                true
            }
            None => {
                warn!("tried to add a block entity at {pos} in a missing chunk");
                false
            }
        }
    }

    pub fn remove_block_entity(&mut self, pos: IVec3) -> bool {
        match self.chunks.get_mut(&ChunkPos::from_block(pos)) {
            Some(chunk) => chunk.remove_block_entity(&mut self.level, pos),
            None => false,
        }
    }

    /// Run post-processing of a chunk, neighbors are resolved through the whole world.
    pub fn run_post_processing(&mut self, pos: ChunkPos) -> bool {
        let Some(mut chunk) = self.chunks.remove(&pos) else {
            return false;
        };
        chunk.run_post_processing(&mut self.level, &ChunksView { chunks: &self.chunks });
        self.chunks.insert(pos, chunk);
        true
    }

    // =================== //
    //     GAME EVENTS     //
    // =================== //

    /// Find every listener in range of a game event emitted at the given position.
    pub fn emit_game_event(&self, event: &GameEvent, pos: IVec3) -> Vec<GameEventListener> {

        let range = event.range() as i32;
        let min = ChunkSectionPos::from_block(pos - IVec3::splat(range));
        let max = ChunkSectionPos::from_block(pos + IVec3::splat(range));

        let mut listeners = Vec::new();
        for cx in min.x..=max.x {
            for cz in min.z..=max.z {
                let Some(chunk) = self.chunks.get(&ChunkPos::new(cx, cz)) else { continue };
                for section_y in min.y..=max.y {
                    if let Some(dispatcher) = chunk.game_event_dispatchers().get(section_y) {
                        listeners.extend(dispatcher.dispatch(pos));
                    }
                }
            }
        }

        trace!("game event {} at {pos} reached {} listeners", event.id(), listeners.len());
        listeners

    }

    // =================== //
    //       TICKING       //
    // =================== //

    /// Tick the world, block entities are ticked and the time is incremented.
    #[instrument(skip_all)]
    pub fn tick(&mut self) {
        self.tick_block_entities();
        let time = self.level.time();
        self.level.set_time(time + 1);
    }

    /// Tick every registered block entity ticker. Tickers removed during the pass are
    /// skipped and reaped once the pass is done, tickers registered during the pass are
    /// ticked in the same pass.
    #[instrument(skip_all)]
    pub fn tick_block_entities(&mut self) {

        let mut index = 0;
        while index < self.level.tickers().slot_count() {

            let current = index;
            index += 1;

            let Some(active) = self.level.tickers().active_at(current) else { continue };
            let (pos, serial, ticker) = (active.pos, active.serial, active.ticker);
            let ty = active.ty.clone();

            let Some(chunk) = self.chunks.get_mut(&ChunkPos::from_block(pos)) else { continue };
            if !chunk.is_ticking() || !chunk.can_tick_block_entities(&self.level) {
                continue;
            }

            let state = chunk.block_state(pos);
            if !self.level.registry().supports_block_entity(&ty, state) {
                if let Some(active) = self.level.tickers_mut().active_at_mut(current) {
                    if !active.warned_invalid {
                        active.warned_invalid = true;
                        warn!("block entity {ty} @ {pos} state {state:?} invalid for ticking");
                    }
                }
                continue;
            }

            if let Some(active) = self.level.tickers_mut().active_at_mut(current) {
                active.warned_invalid = false;
            }

            let Some(mut block_entity) = chunk.detach_block_entity(pos, serial) else { continue };
            ticker(self, pos, state, &mut *block_entity);

            match self.chunks.get_mut(&ChunkPos::from_block(pos)) {
                Some(chunk) => chunk.reattach_block_entity(block_entity),
                None => block_entity.base_mut().mark_removed(),
            }

        }

        let reaped = self.level.tickers_mut().reap();
        if reaped != 0 {
            trace!("reaped {reaped} block entity tickers");
        }

    }

}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::chunk::{ChunkInit, LevelType};
    use crate::test_util::{self, Chest, Remover, CHEST, CHEST_LISTENER_RANGE, REMOVER, STONE};

    fn world_with_chunk() -> World {
        test_util::init_tracing();
        let mut world = World::new(test_util::config(), false);
        let mut chunk = Chunk::new(Arc::clone(world.config()), ChunkInit::new(ChunkPos::new(0, 0)));
        chunk.set_level_type(LevelType::Ticking);
        world.insert_chunk(chunk);
        world
    }

    fn chest_ticks(world: &mut World, pos: IVec3) -> u32 {
        world.get_block_entity(pos, CreationType::Check).unwrap()
            .downcast_ref::<Chest>().unwrap()
            .ticks
    }

    #[test]
    fn ticks_block_entities() {
        let mut world = world_with_chunk();
        let pos = IVec3::new(1, 2, 3);
        world.set_block_state(pos, CHEST);
        world.tick();
        world.tick();
        assert_eq!(chest_ticks(&mut world, pos), 2);
        assert_eq!(world.level().time(), 2);
    }

    #[test]
    fn no_tick_when_chunk_not_ticking() {
        let mut world = world_with_chunk();
        world.chunk_mut(ChunkPos::new(0, 0)).unwrap().set_level_type(LevelType::Border);
        let pos = IVec3::new(1, 2, 3);
        world.set_block_state(pos, CHEST);
        world.tick();
        assert_eq!(chest_ticks(&mut world, pos), 0);
    }

    #[test]
    fn removal_during_ticking() {

        let mut world = world_with_chunk();
        let remover = IVec3::new(4, 0, 5);
        let victim = IVec3::new(5, 0, 5);

        // The remover is registered first, so it's ticked before the chest it removes.
        world.set_block_state(remover, REMOVER);
        world.set_block_state(victim, CHEST);
        assert_eq!(world.level().tickers().len(), 2);

        world.tick();

        assert_eq!(world.block_state(victim), STONE);
        assert!(world.get_block_entity(victim, CreationType::Check).is_none());
        assert_eq!(world.level().tickers().len(), 1);
        assert_eq!(world.level().tickers().slot_count(), 2);

        world.tick();
        let remover_entity = world.get_block_entity(remover, CreationType::Check).unwrap();
        assert_eq!(remover_entity.downcast_ref::<Remover>().unwrap().ticks, 2);

    }

    #[test]
    fn self_removal_during_tick() {

        let mut world = world_with_chunk();
        let pos = IVec3::new(4, 0, 5);
        world.set_block_state(pos, REMOVER);
        world.get_block_entity(pos, CreationType::Check).unwrap()
            .downcast_mut::<Remover>().unwrap()
            .target = pos;

        world.tick();

        assert_eq!(world.block_state(pos), STONE);
        assert!(world.get_block_entity(pos, CreationType::Check).is_none());
        assert!(world.level().tickers().is_empty());

    }

    #[test]
    fn invalid_state_warns_once_and_skips() {

        let mut world = world_with_chunk();
        let pos = IVec3::new(1, 2, 3);
        world.set_block_state(pos, STONE);
        world.add_block_entity(Box::new(Chest::new(pos, CHEST)));
        assert_eq!(world.level().tickers().len(), 1);

        world.tick();
        world.tick();
        assert!(world.level().tickers().active_at(0).unwrap().warned_invalid);
        assert_eq!(chest_ticks(&mut world, pos), 0);

        world.set_block_state(pos, CHEST);
        world.tick();
        assert!(!world.level().tickers().active_at(0).unwrap().warned_invalid);
        assert_eq!(chest_ticks(&mut world, pos), 1);

    }

    #[test]
    fn game_events_reach_listeners() {

        let mut world = world_with_chunk();
        world.set_block_state(IVec3::new(1, 2, 3), CHEST);
        world.set_block_state(IVec3::new(15, 2, 15), CHEST);

        let event = GameEvent::new(arcstr::literal!("block_place"), CHEST_LISTENER_RANGE);
        let listeners = world.emit_game_event(&event, IVec3::new(0, 2, 0));
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].source, IVec3::new(1, 2, 3));

        world.set_block_state(IVec3::new(1, 2, 3), STONE);
        assert!(world.emit_game_event(&event, IVec3::new(0, 2, 0)).is_empty());

    }

    #[test]
    fn remove_chunk_stops_ticking() {
        let mut world = world_with_chunk();
        world.set_block_state(IVec3::new(1, 2, 3), CHEST);
        assert_eq!(world.level().tickers().len(), 1);
        let chunk = world.remove_chunk(ChunkPos::new(0, 0)).unwrap();
        assert!(!chunk.is_loaded_to_world());
        assert!(world.level().tickers().is_empty());
        world.tick();
    }

    #[test]
    fn reinsert_chunk_does_not_revive_removed() {

        let mut world = world_with_chunk();
        let pos = IVec3::new(1, 2, 3);
        let event = GameEvent::new(arcstr::literal!("block_place"), CHEST_LISTENER_RANGE);
        world.set_block_state(pos, CHEST);

        let chunk = world.remove_chunk(ChunkPos::new(0, 0)).unwrap();
        assert!(chunk.block_entities().all(|block_entity| block_entity.base().is_removed()));
        world.insert_chunk(chunk);

        assert!(world.level().tickers().is_empty());
        assert!(world.emit_game_event(&event, pos).is_empty());

        // The removed chest is evicted on access, nothing is left behind.
        assert!(world.get_block_entity(pos, CreationType::Check).is_none());
        world.tick();
        world.tick();
        assert!(world.level().tickers().is_empty());
        assert_eq!(world.level().tickers().slot_count(), 1);
        assert!(world.chunk(ChunkPos::new(0, 0)).unwrap().game_event_dispatchers().is_empty());

        // A new chest placed afterward ticks and listens again.
        world.set_block_state(pos, STONE);
        world.set_block_state(pos, CHEST);
        world.tick();
        assert_eq!(chest_ticks(&mut world, pos), 1);
        assert_eq!(world.level().tickers().len(), 1);
        assert_eq!(world.emit_game_event(&event, pos).len(), 1);

    }

}
