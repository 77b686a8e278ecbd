//! World-wide services that chunks talk to: the client flag and time, the block entity
//! tickers, the world tick schedulers and the event queue.

use std::sync::Arc;

use glam::IVec3;

use crate::block::{BlockId, BlockRegistry, BlockState, FluidId};
use crate::tick::WorldTickScheduler;
use crate::ticker::BlockEntityTickers;
use crate::chunk::SetBlockFlags;
use crate::config::ChunkConfig;
use crate::geom::ChunkPos;


/// Services shared by all chunks of a world.
pub struct Level {
    /// Configuration shared with all chunks.
    config: Arc<ChunkConfig>,
    /// True if this level is only a display of a remote authoritative one.
    is_client: bool,
    /// Current world time, in ticks.
    time: u64,
    /// Every block entity ticker of the world.
    tickers: BlockEntityTickers,
    /// World scheduler of block ticks.
    block_ticks: WorldTickScheduler<BlockId>,
    /// World scheduler of fluid ticks.
    fluid_ticks: WorldTickScheduler<FluidId>,
    /// Events queue, disabled by default.
    events: Option<Vec<Event>>,
}

impl Level {

    pub fn new(config: Arc<ChunkConfig>, is_client: bool) -> Self {
        Self {
            config,
            is_client,
            time: 0,
            tickers: BlockEntityTickers::new(),
            block_ticks: WorldTickScheduler::new(),
            fluid_ticks: WorldTickScheduler::new(),
            events: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &Arc<ChunkConfig> {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &Arc<dyn BlockRegistry> {
        self.config.registry()
    }

    #[inline]
    pub fn is_client(&self) -> bool {
        self.is_client
    }

    #[inline]
    pub fn time(&self) -> u64 {
        self.time
    }

    #[inline]
    pub fn set_time(&mut self, time: u64) {
        self.time = time;
    }

    #[inline]
    pub fn tickers(&self) -> &BlockEntityTickers {
        &self.tickers
    }

    #[inline]
    pub fn tickers_mut(&mut self) -> &mut BlockEntityTickers {
        &mut self.tickers
    }

    #[inline]
    pub fn block_ticks(&self) -> &WorldTickScheduler<BlockId> {
        &self.block_ticks
    }

    #[inline]
    pub fn block_ticks_mut(&mut self) -> &mut WorldTickScheduler<BlockId> {
        &mut self.block_ticks
    }

    #[inline]
    pub fn fluid_ticks(&self) -> &WorldTickScheduler<FluidId> {
        &self.fluid_ticks
    }

    #[inline]
    pub fn fluid_ticks_mut(&mut self) -> &mut WorldTickScheduler<FluidId> {
        &mut self.fluid_ticks
    }

    /// Swap the events queue with the given one, the events queue is enabled when some
    /// queue is given.
    #[inline]
    pub fn swap_events(&mut self, events: Option<Vec<Event>>) -> Option<Vec<Event>> {
        std::mem::replace(&mut self.events, events)
    }

    /// Return true if events are queued.
    #[inline]
    pub fn has_events(&self) -> bool {
        self.events.is_some()
    }

    /// Push an event, only if the events queue is enabled.
    #[inline]
    pub fn push_event(&mut self, event: Event) {
        if let Some(events) = &mut self.events {
            events.push(event);
        }
    }

}


/// An event that happened in a chunk, consumed by the owner of the world, the network
/// layer and the lighting engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A block state changed.
    Block {
        pos: IVec3,
        prev: BlockState,
        new: BlockState,
        flags: SetBlockFlags,
    },
    /// A section switched between empty and non-empty, the lighting engine must update
    /// the band's occupancy.
    SectionStatus {
        chunk: ChunkPos,
        section_y: i32,
        empty: bool,
    },
    /// A block entity event.
    BlockEntity {
        pos: IVec3,
        inner: BlockEntityEvent,
    },
}

/// An event with a block entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEntityEvent {
    /// The block entity has been installed at its position.
    Set,
    /// The block entity has been removed.
    Remove,
}
