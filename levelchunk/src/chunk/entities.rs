//! Block entity storage of a chunk: installation, lazy materialization of saved
//! block entities, tickers and game event listeners.

use std::sync::Arc;

use glam::IVec3;
use tracing::{trace, warn};

use crate::block_entity::{self, BlockEntity, BlockEntityType, CreationType, DUMMY_ID};
use crate::level::{BlockEntityEvent, Event, Level};
use crate::nbt::{Nbt, NbtCompound, NbtParseError};
use crate::ticker::ActiveTicker;
use crate::block::BlockState;
use crate::geom::section_coord;

use super::Chunk;


/// Identity of the block entity currently lent to its ticker by the world. Changes
/// made to its position while lent are recorded here and applied when it's returned.
#[derive(Debug, Clone)]
pub struct DetachedBlockEntity {
    pos: IVec3,
    serial: u32,
    ty: BlockEntityType,
    cached_state: BlockState,
    removed: bool,
}

impl DetachedBlockEntity {

    #[inline]
    pub fn pos(&self) -> IVec3 {
        self.pos
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.removed
    }

}


impl Chunk {

    /// Return true if block entities of this chunk can have listeners and tickers.
    #[inline]
    pub fn can_tick_block_entities(&self, level: &Level) -> bool {
        self.loaded_to_world || level.is_client()
    }

    /// Get a block entity that is already installed, without materializing saved ones.
    pub fn block_entity(&self, pos: IVec3) -> Option<&dyn BlockEntity> {
        self.block_entities.get(&pos)
            .map(|block_entity| &**block_entity)
            .filter(|block_entity| !block_entity.base().is_removed())
    }

    /// Mutable variant of [`Self::block_entity`].
    pub fn block_entity_mut(&mut self, pos: IVec3) -> Option<&mut (dyn BlockEntity + 'static)> {
        self.block_entities.get_mut(&pos)
            .map(|block_entity| &mut **block_entity)
            .filter(|block_entity| !block_entity.base().is_removed())
    }

    /// Iterate over installed block entities in installation order, including removed
    /// ones not yet evicted.
    pub fn block_entities(&self) -> impl Iterator<Item = &dyn BlockEntity> + '_ {
        self.block_entities.values().map(|block_entity| &**block_entity)
    }

    #[inline]
    pub fn block_entity_count(&self) -> usize {
        self.block_entities.len()
    }

    /// Return true if a ticker is registered for a block entity at this position.
    #[inline]
    pub fn has_block_entity_ticker(&self, pos: IVec3) -> bool {
        self.block_entity_tickers.contains_key(&pos)
    }

    /// The block entity currently lent to its ticker, if any.
    #[inline]
    pub fn detached_block_entity(&self) -> Option<&DetachedBlockEntity> {
        self.detached_block_entity.as_ref()
    }

    /// Get the block entity at the given position. A removed block entity is evicted,
    /// then a saved block entity is materialized if present, and finally if requested
    /// one is created from the block at this position.
    /// 
    /// The block entity currently lent to its ticker is never returned and never
    /// replaced by this function.
    pub fn get_block_entity(&mut self, level: &mut Level, pos: IVec3, creation: CreationType) -> Option<&mut (dyn BlockEntity + 'static)> {

        if self.detached_at(pos).is_some() {
            return None;
        }

        match self.block_entities.get(&pos).map(|block_entity| block_entity.base().is_removed()) {
            Some(false) => return self.block_entities.get_mut(&pos).map(|block_entity| &mut **block_entity),
            Some(true) => {
                trace!("evicting removed block entity at {pos}");
                self.block_entities.swap_remove(&pos);
                self.game_event_dispatchers.remove_listener(section_coord(pos.y), pos);
                self.remove_ticker(level, pos);
            }
            None => {}
        }

        if let Some(nbt) = self.pending_block_entities.swap_remove(&pos) {
            if self.load_block_entity(level, pos, &nbt) {
                return self.block_entities.get_mut(&pos).map(|block_entity| &mut **block_entity);
            }
        }

        if creation == CreationType::Immediate {
            let state = self.block_state(pos);
            let registry = Arc::clone(self.config.registry());
            if registry.has_block_entity(state) {
                if let Some(block_entity) = registry.create_block_entity(pos, state) {
                    self.add_block_entity(level, block_entity);
                    return self.block_entities.get_mut(&pos).map(|block_entity| &mut **block_entity);
                }
            }
        }

        None

    }

    /// Materialize a saved block entity and install it, returning true on success.
    fn load_block_entity(&mut self, level: &mut Level, pos: IVec3, nbt: &NbtCompound) -> bool {

        let state = self.block_state(pos);
        let registry = Arc::clone(self.config.registry());

        let block_entity = if nbt.get_string("id") == Some(DUMMY_ID) {
            if registry.has_block_entity(state) {
                registry.create_block_entity(pos, state)
            } else {
                warn!("tried to load a dummy block entity at {pos} but found no block entity block {state:?}");
                None
            }
        } else {
            match block_entity::from_nbt(&*registry, pos, state, nbt) {
                Ok(block_entity) => Some(block_entity),
                Err(e) => {
                    warn!("failed to load block entity at {pos}: {e}");
                    None
                }
            }
        };

        match block_entity {
            Some(block_entity) => {
                self.add_block_entity(level, block_entity);
                true
            }
            None => {
                warn!("tried to load a block entity for block {state:?} but failed at location {pos}");
                false
            }
        }

    }

    /// Install a block entity at its position, any previous block entity at this
    /// position is marked removed. Listener and ticker are registered if the chunk
    /// allows block entities to tick.
    pub fn add_block_entity(&mut self, level: &mut Level, mut block_entity: Box<dyn BlockEntity>) {

        let pos = block_entity.pos();
        let serial = self.next_block_entity_serial;
        self.next_block_entity_serial = serial.wrapping_add(1);

        let base = block_entity.base_mut();
        base.set_has_world(true);
        base.cancel_removal();
        base.serial = serial;

        if let Some(detached) = self.detached_at_mut(pos) {
            detached.removed = true;
        }

        if let Some(mut prev) = self.block_entities.insert(pos, block_entity) {
            let prev_base = prev.base_mut();
            prev_base.mark_removed();
            prev_base.set_has_world(false);
        }

        trace!("installed block entity at {pos}, serial {serial}");
        level.push_event(Event::BlockEntity { pos, inner: BlockEntityEvent::Set });

        if self.can_tick_block_entities(level) {
            self.update_game_event_listener(level, pos);
            self.update_ticker(level, pos);
        }

    }

    /// Update the cached state of an existing block entity, including one lent to its
    /// ticker, and refresh its ticker. Return false if there is no block entity.
    pub(crate) fn update_block_entity_state(&mut self, level: &mut Level, pos: IVec3, state: BlockState) -> bool {

        if let Some(detached) = self.detached_at_mut(pos) {
            detached.cached_state = state;
            self.update_ticker(level, pos);
            return true;
        }

        match self.get_block_entity(level, pos, CreationType::Check) {
            Some(block_entity) => {
                block_entity.base_mut().set_cached_state(state);
                self.update_ticker(level, pos);
                true
            }
            None => false,
        }

    }

    /// Remove the block entity at the given position, if the chunk allows block
    /// entities to tick. Its listener and ticker are always torn down. Return true if
    /// a block entity was removed.
    pub fn remove_block_entity(&mut self, level: &mut Level, pos: IVec3) -> bool {

        let mut removed = false;

        if self.can_tick_block_entities(level) {

            if let Some(mut block_entity) = self.block_entities.swap_remove(&pos) {
                let base = block_entity.base_mut();
                base.mark_removed();
                base.set_has_world(false);
                removed = true;
            } else if let Some(detached) = self.detached_at_mut(pos) {
                detached.removed = true;
                removed = true;
            }

            if removed {
                trace!("removed block entity at {pos}");
                level.push_event(Event::BlockEntity { pos, inner: BlockEntityEvent::Remove });
            }

        }

        self.game_event_dispatchers.remove_listener(section_coord(pos.y), pos);
        self.remove_ticker(level, pos);
        removed

    }

    /// Mark every block entity removed and tear down their listeners and tickers, used
    /// when the chunk is unloaded. Removed block entities are kept until the next
    /// access at their position so that they can still be saved.
    pub fn remove_all_block_entities(&mut self, level: &mut Level) {

        for (&pos, block_entity) in self.block_entities.iter_mut() {
            let base = block_entity.base_mut();
            base.mark_removed();
            base.set_has_world(false);
            self.game_event_dispatchers.remove_listener(section_coord(pos.y), pos);
        }

        if let Some(detached) = self.detached_block_entity.as_mut() {
            detached.removed = true;
            self.game_event_dispatchers.remove_listener(section_coord(detached.pos.y), detached.pos);
        }

        for (_, handle) in self.block_entity_tickers.drain() {
            level.tickers_mut().remove(handle);
        }

    }

    /// Register listeners and tickers of all installed block entities, used when the
    /// chunk becomes loaded to its world. Removed block entities are skipped.
    pub fn update_all_block_entities(&mut self, level: &mut Level) {
        let positions = self.block_entities.iter()
            .filter(|(_, block_entity)| !block_entity.base().is_removed())
            .map(|(&pos, _)| pos)
            .collect::<Vec<_>>();
        for pos in positions {
            self.update_game_event_listener(level, pos);
            self.update_ticker(level, pos);
        }
    }

    /// Register or update the game event listener of the block entity at this position,
    /// only on server side.
    pub fn update_game_event_listener(&mut self, level: &Level, pos: IVec3) {

        if level.is_client() {
            return;
        }

        let section_y = section_coord(pos.y);
        let listener = match self.block_entities.get(&pos) {
            Some(block_entity) if !block_entity.base().is_removed() => block_entity.event_listener(),
            _ => None,
        };

        match listener {
            Some(listener) => self.game_event_dispatchers.get_or_create(section_y).add_listener(listener),
            None => { self.game_event_dispatchers.remove_listener(section_y, pos); }
        }

    }

    /// Resolve the ticker of the block entity at the given position from its cached
    /// state. The existing ticker handle is reused if still valid, otherwise a new
    /// ticker is registered. The ticker is removed if the block entity no longer ticks.
    pub fn update_ticker(&mut self, level: &mut Level, pos: IVec3) {

        let identity = match self.block_entities.get(&pos) {
            Some(block_entity) if !block_entity.base().is_removed() => {
                let base = block_entity.base();
                Some((base.ty().clone(), base.cached_state(), base.serial))
            }
            Some(_) => None,
            None => self.detached_at(pos).map(|d| (d.ty.clone(), d.cached_state, d.serial)),
        };

        let Some((ty, state, serial)) = identity else {
            self.remove_ticker(level, pos);
            return;
        };

        let Some(ticker) = self.config.registry().block_entity_ticker(level.is_client(), state, &ty) else {
            self.remove_ticker(level, pos);
            return;
        };

        let active = ActiveTicker::new(pos, serial, ty, ticker);
        if let Some(&handle) = self.block_entity_tickers.get(&pos) {
            if level.tickers_mut().replace(handle, active.clone()) {
                return;
            }
        }

        let handle = level.tickers_mut().register(active);
        self.block_entity_tickers.insert(pos, handle);

    }

    /// Retire the ticker registered at this position, if any.
    fn remove_ticker(&mut self, level: &mut Level, pos: IVec3) {
        if let Some(handle) = self.block_entity_tickers.remove(&pos) {
            level.tickers_mut().remove(handle);
        }
    }

    // =================== //
    //    SAVED ENTITIES   //
    // =================== //

    /// Add the saved NBT of a block entity, it's materialized on first access. The
    /// position is read from the NBT.
    pub fn add_pending_block_entity_nbt(&mut self, nbt: NbtCompound) -> Result<(), NbtParseError> {
        let pos = block_entity::pos_from_nbt(&nbt)?;
        self.pending_block_entities.insert(pos, nbt);
        Ok(())
    }

    #[inline]
    pub fn pending_block_entity_nbt(&self, pos: IVec3) -> Option<&NbtCompound> {
        self.pending_block_entities.get(&pos)
    }

    /// Iterate over positions of saved block entities not yet materialized.
    pub fn pending_block_entity_positions(&self) -> impl Iterator<Item = IVec3> + '_ {
        self.pending_block_entities.keys().copied()
    }

    /// Get the NBT to save for the block entity at this position, either from the
    /// installed block entity or from the saved one not yet materialized, the latter
    /// is marked with `keepPacked`.
    pub fn block_entity_nbt(&self, pos: IVec3) -> Option<NbtCompound> {
        if let Some(block_entity) = self.block_entity(pos) {
            let mut nbt = block_entity.to_nbt();
            nbt.insert("keepPacked", Nbt::Byte(0));
            Some(nbt)
        } else {
            let mut nbt = self.pending_block_entities.get(&pos)?.clone();
            nbt.insert("keepPacked", Nbt::Byte(1));
            Some(nbt)
        }
    }

    // =================== //
    //       TICKING       //
    // =================== //

    #[inline]
    fn detached_at(&self, pos: IVec3) -> Option<&DetachedBlockEntity> {
        self.detached_block_entity.as_ref().filter(|d| d.pos == pos && !d.removed)
    }

    #[inline]
    fn detached_at_mut(&mut self, pos: IVec3) -> Option<&mut DetachedBlockEntity> {
        self.detached_block_entity.as_mut().filter(|d| d.pos == pos && !d.removed)
    }

    /// Take the block entity installed at the given position out of the chunk so that
    /// its ticker can run with the whole world borrowed. It must be given back with
    /// [`Self::reattach_block_entity`].
    pub(crate) fn detach_block_entity(&mut self, pos: IVec3, serial: u32) -> Option<Box<dyn BlockEntity>> {

        debug_assert!(self.detached_block_entity.is_none(), "a block entity is already detached");

        match self.block_entities.get(&pos) {
            Some(block_entity) if block_entity.base().serial == serial && !block_entity.base().is_removed() => {}
            _ => return None,
        }

        let block_entity = self.block_entities.swap_remove(&pos)?;
        let base = block_entity.base();
        self.detached_block_entity = Some(DetachedBlockEntity {
            pos,
            serial,
            ty: base.ty().clone(),
            cached_state: base.cached_state(),
            removed: false,
        });

        Some(block_entity)

    }

    /// Give back the block entity taken by [`Self::detach_block_entity`], it's dropped
    /// if it has been removed or replaced in the meantime.
    pub(crate) fn reattach_block_entity(&mut self, mut block_entity: Box<dyn BlockEntity>) {

        let Some(detached) = self.detached_block_entity.take() else {
            block_entity.base_mut().mark_removed();
            return;
        };

        let base = block_entity.base_mut();
        if detached.removed || self.block_entities.contains_key(&detached.pos) {
            base.mark_removed();
            base.set_has_world(false);
            trace!("dropped block entity at {} removed while ticking", detached.pos);
        } else {
            base.set_cached_state(detached.cached_state);
            self.block_entities.insert(detached.pos, block_entity);
        }

    }

}
