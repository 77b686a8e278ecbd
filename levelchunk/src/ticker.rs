//! The world-wide list of block entity tickers. Each registered ticker is reached
//! through a [`TickerHandle`] whose strategy can be replaced or retired in place, so
//! that the list is never shrunk while being iterated.

use glam::IVec3;
use tracing::trace;

use crate::block_entity::{BlockEntity, BlockEntityType};
use crate::block::BlockState;
use crate::world::World;


/// Function called each tick for a block entity.
pub type BlockEntityTicker = fn(&mut World, IVec3, BlockState, &mut dyn BlockEntity);


/// A handle to a registered ticker, stale handles never reach a newer occupant of the
/// same slot thanks to the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickerHandle {
    index: u32,
    generation: u32,
}

/// The ticking strategy of one block entity.
#[derive(Debug, Clone)]
pub struct ActiveTicker {
    /// Position of the ticked block entity.
    pub pos: IVec3,
    /// Install serial of the block entity this ticker was resolved for.
    pub serial: u32,
    /// Type of the ticked block entity.
    pub ty: BlockEntityType,
    /// The function to call.
    pub ticker: BlockEntityTicker,
    /// Set once an invalid state has been reported, until the state becomes valid.
    pub warned_invalid: bool,
}

impl ActiveTicker {

    pub fn new(pos: IVec3, serial: u32, ty: BlockEntityType, ticker: BlockEntityTicker) -> Self {
        Self { pos, serial, ty, ticker, warned_invalid: false }
    }

}

/// Current strategy of a ticker slot.
#[derive(Debug, Clone)]
enum TickerInvoker {
    /// The ticker is ticked each tick.
    Active(ActiveTicker),
    /// The ticker has been retired and will be reaped after the current pass.
    Removed,
    /// The slot is free for reuse.
    Vacant,
}

#[derive(Debug, Clone)]
struct TickerSlot {
    generation: u32,
    invoker: TickerInvoker,
}

/// The list of all block entity tickers of a world.
#[derive(Debug, Default)]
pub struct BlockEntityTickers {
    slots: Vec<TickerSlot>,
    /// Indices of vacant slots.
    free: Vec<u32>,
    /// Number of active tickers.
    active_count: usize,
}

impl BlockEntityTickers {

    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new ticker, returning its handle.
    pub fn register(&mut self, ticker: ActiveTicker) -> TickerHandle {

        self.active_count += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(matches!(slot.invoker, TickerInvoker::Vacant));
            slot.invoker = TickerInvoker::Active(ticker);
            return TickerHandle { index, generation: slot.generation };
        }

        let index = u32::try_from(self.slots.len()).expect("too many tickers");
        self.slots.push(TickerSlot { generation: 0, invoker: TickerInvoker::Active(ticker) });
        TickerHandle { index, generation: 0 }

    }

    #[inline]
    fn slot_mut(&mut self, handle: TickerHandle) -> Option<&mut TickerSlot> {
        self.slots.get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }

    /// Replace the strategy of an active ticker in place. Return false if the handle is
    /// stale or if its ticker has been removed.
    pub fn replace(&mut self, handle: TickerHandle, ticker: ActiveTicker) -> bool {
        match self.slot_mut(handle) {
            Some(TickerSlot { invoker: invoker @ TickerInvoker::Active(_), .. }) => {
                *invoker = TickerInvoker::Active(ticker);
                true
            }
            _ => false
        }
    }

    /// Retire a ticker, it will never be ticked again and its slot is reaped after the
    /// current pass. Removing a stale or already removed handle does nothing, false is
    /// returned in that case.
    pub fn remove(&mut self, handle: TickerHandle) -> bool {
        match self.slot_mut(handle) {
            Some(TickerSlot { invoker: invoker @ TickerInvoker::Active(_), .. }) => {
                *invoker = TickerInvoker::Removed;
                self.active_count -= 1;
                true
            }
            _ => false
        }
    }

    /// Get the active ticker of this handle.
    pub fn get(&self, handle: TickerHandle) -> Option<&ActiveTicker> {
        match self.slots.get(handle.index as usize) {
            Some(TickerSlot { generation, invoker: TickerInvoker::Active(ticker) }) if *generation == handle.generation => Some(ticker),
            _ => None
        }
    }

    /// Number of slots, this is the upper bound of indices during a ticking pass.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of active tickers.
    #[inline]
    pub fn len(&self) -> usize {
        self.active_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active_count == 0
    }

    #[inline]
    pub(crate) fn active_at(&self, index: usize) -> Option<&ActiveTicker> {
        match self.slots.get(index) {
            Some(TickerSlot { invoker: TickerInvoker::Active(ticker), .. }) => Some(ticker),
            _ => None
        }
    }

    #[inline]
    pub(crate) fn active_at_mut(&mut self, index: usize) -> Option<&mut ActiveTicker> {
        match self.slots.get_mut(index) {
            Some(TickerSlot { invoker: TickerInvoker::Active(ticker), .. }) => Some(ticker),
            _ => None
        }
    }

    /// Free every removed slot, this must only be called between ticking passes.
    /// Return the number of reaped slots.
    pub fn reap(&mut self) -> usize {

        let mut count = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let TickerInvoker::Removed = slot.invoker {
                slot.invoker = TickerInvoker::Vacant;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                count += 1;
            }
        }

        if count != 0 {
            trace!("reaped {count} block entity tickers");
        }

        count

    }

}
