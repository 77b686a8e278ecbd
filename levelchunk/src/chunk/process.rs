//! Deferred post-processing of blocks placed during generation whose final state
//! depends on neighbors that were not generated yet.

use std::sync::Arc;

use glam::IVec3;
use tracing::{instrument, trace};

use crate::block::{BlockState, BlockView};
use crate::block_entity::CreationType;
use crate::geom::{pack_local, unpack_local};
use crate::level::Level;

use super::{Chunk, SetBlockFlags};


/// Block view resolving positions of the chunk being processed from the chunk itself
/// and other positions from the world.
struct PostProcessView<'a> {
    chunk: &'a Chunk,
    outer: &'a dyn BlockView,
}

impl BlockView for PostProcessView<'_> {
    fn block_state(&self, pos: IVec3) -> BlockState {
        if self.chunk.pos.contains(pos) {
            self.chunk.block_state(pos)
        } else {
            self.outer.block_state(pos)
        }
    }
}


impl Chunk {

    /// Queue a position for post-processing, return false if out of the height limit
    /// or already queued.
    pub fn mark_block_for_post_processing(&mut self, pos: IVec3) -> bool {
        let Some(index) = self.height_limit().section_index(pos.y) else {
            return false;
        };
        self.mark_packed_for_post_processing(index, pack_local(pos))
    }

    /// Queue a packed section-local position for post-processing, as stored in saves.
    pub fn mark_packed_for_post_processing(&mut self, index: usize, packed: u16) -> bool {
        let Some(queue) = self.post_processing.get_mut(index) else {
            return false;
        };
        if queue.contains(&packed) {
            false
        } else {
            queue.push(packed);
            true
        }
    }

    /// Positions waiting for post-processing, for each section.
    #[inline]
    pub fn post_processing(&self) -> &[Vec<u16>] {
        &self.post_processing
    }

    /// Resolve every queued position again from its neighbors and write the result
    /// without redraw. All queues are emptied. Tick schedulers are then promoted to
    /// the world and all saved block entities are materialized.
    #[instrument(skip_all, fields(chunk = %self.pos))]
    pub fn run_post_processing(&mut self, level: &mut Level, view: &dyn BlockView) {

        let limit = self.height_limit();
        let registry = Arc::clone(self.config.registry());
        let flags = SetBlockFlags::NO_REDRAW | SetBlockFlags::FORCE_STATE;

        for index in 0..self.post_processing.len() {

            let queue = std::mem::take(&mut self.post_processing[index]);
            if queue.is_empty() {
                continue;
            }

            let section_y = limit.section_coord_from_index(index);
            trace!("post-processing {} blocks in section {section_y}", queue.len());

            for packed in queue {
                let pos = unpack_local(packed, section_y, self.pos);
                let state = self.block_state(pos);
                let new_state = registry.post_process_state(state, &PostProcessView { chunk: self, outer: view }, pos);
                self.set_block_state_with(level, pos, new_state, flags);
            }

        }

        self.disable_tick_schedulers(level);

        let pending = self.pending_block_entities.keys().copied().collect::<Vec<_>>();
        for pos in pending {
            self.get_block_entity(level, pos, CreationType::Check);
        }
        self.pending_block_entities.clear();

    }

}
