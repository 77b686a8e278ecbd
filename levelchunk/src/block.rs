//! Block and fluid state handles, and the registry through which the engine queries
//! their capabilities.

use glam::IVec3;

use crate::block_entity::{BlockEntity, BlockEntityType};
use crate::ticker::BlockEntityTicker;
use crate::geom::Face;
use crate::level::Level;
use crate::chunk::Chunk;


/// An opaque handle to a block state, the value is the state's raw id in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockState(pub u32);

impl BlockState {
    /// The canonical air state, returned for every position without a stored block.
    pub const AIR: Self = Self(0);
}

/// An opaque handle to a fluid state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FluidState(pub u32);

impl FluidState {

    /// The empty fluid, derived from every block state that holds no fluid.
    pub const EMPTY: Self = Self(0);

    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

}

/// Identify the block owning a block state, two states of the same block share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Identify the fluid owning a fluid state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FluidId(pub u32);


/// The external block collaborator. Every question the engine asks about a state, and
/// every behavior hook it triggers, goes through this trait.
pub trait BlockRegistry: Send + Sync {

    /// Total number of block states, used to size direct palettes.
    fn state_count(&self) -> u32;

    /// The block owning this state.
    fn block_of(&self, state: BlockState) -> BlockId;

    fn is_air(&self, state: BlockState) -> bool;

    /// The fluid contained in this block state, [`FluidState::EMPTY`] if none.
    fn fluid_state(&self, state: BlockState) -> FluidState;

    /// The fluid owning this fluid state.
    fn fluid_of(&self, fluid: FluidState) -> FluidId;

    fn luminance(&self, _state: BlockState) -> u8 {
        0
    }

    fn ticks_randomly(&self, _state: BlockState) -> bool {
        false
    }

    fn fluid_ticks_randomly(&self, _fluid: FluidState) -> bool {
        false
    }

    fn blocks_movement(&self, state: BlockState) -> bool;

    fn is_leaves(&self, _state: BlockState) -> bool {
        false
    }

    /// Return true if a block entity lives at positions holding this state.
    fn has_block_entity(&self, state: BlockState) -> bool;

    /// Create the default block entity for the given state, only called for states
    /// having a block entity.
    fn create_block_entity(&self, pos: IVec3, state: BlockState) -> Option<Box<dyn BlockEntity>>;

    /// Instantiate a block entity from its type id, as found in saved or received data.
    /// Return none if the id is unknown or if its type does not support the state.
    fn instantiate_block_entity(&self, id: &str, pos: IVec3, state: BlockState) -> Option<Box<dyn BlockEntity>>;

    /// Return true if a block entity of this type may live in the given state.
    fn supports_block_entity(&self, ty: &BlockEntityType, state: BlockState) -> bool;

    /// Resolve the ticking function for a block entity of the given type in that state.
    fn block_entity_ticker(&self, _is_client: bool, _state: BlockState, _ty: &BlockEntityType) -> Option<BlockEntityTicker> {
        None
    }

    /// Called on server chunks when a state is replaced by another one. The default
    /// removes the block entity when the block changes.
    fn on_state_replaced(&self, chunk: &mut Chunk, level: &mut Level, pos: IVec3, old: BlockState, new: BlockState, moved: bool) {
        let _ = moved;
        if self.has_block_entity(old) && self.block_of(old) != self.block_of(new) {
            chunk.remove_block_entity(level, pos);
        }
    }

    /// Called on server chunks after a new state has been written.
    fn on_block_added(&self, _chunk: &mut Chunk, _level: &mut Level, _pos: IVec3, _state: BlockState, _old: BlockState, _moved: bool) {}

    /// Return the state to use given a change of the neighbor on the given face.
    fn state_for_neighbor_update(&self, state: BlockState, _face: Face, _neighbor: BlockState) -> BlockState {
        state
    }

    /// Resolve the final state of a block whose neighbors were not known when it was
    /// placed, by applying neighbor updates from all faces.
    fn post_process_state(&self, state: BlockState, view: &dyn BlockView, pos: IVec3) -> BlockState {
        Face::ALL.into_iter().fold(state, |state, face| {
            let neighbor = view.block_state(pos + face.delta());
            self.state_for_neighbor_update(state, face, neighbor)
        })
    }

}

/// Read-only access to block states, possibly spanning several chunks.
pub trait BlockView {

    fn block_state(&self, pos: IVec3) -> BlockState;

}
