//! Block entities, stateful objects attached to a single block position.

use std::any::Any;
use std::fmt;

use arcstr::ArcStr;
use glam::IVec3;

use crate::nbt::{Nbt, NbtCompound, NbtCompoundParse, NbtParseError};
use crate::block::{BlockRegistry, BlockState};
use crate::game_event::GameEventListener;


/// The id used in saved data to request the default block entity of the block.
pub const DUMMY_ID: &str = "DUMMY";


/// The type of a block entity, identified by its id in saved data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockEntityType(ArcStr);

impl BlockEntityType {

    #[inline]
    pub const fn new(id: ArcStr) -> Self {
        Self(id)
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for BlockEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}


/// How a missing block entity should be handled when requested from a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationType {
    /// Create the default block entity of the block right now.
    Immediate,
    /// Creation is left to the caller, nothing is created.
    Queued,
    /// Only return an existing or pending block entity.
    Check,
}


/// Common data of every block entity.
#[derive(Debug, Clone)]
pub struct BlockEntityBase {
    ty: BlockEntityType,
    /// Immutable position of the block entity.
    pos: IVec3,
    /// The state of the block when it was last installed or updated.
    cached_state: BlockState,
    /// Set when the block entity has been removed from its chunk, it must not be used
    /// or ticked anymore.
    removed: bool,
    /// Set while the block entity is installed in a chunk.
    has_world: bool,
    /// Install serial, assigned by the chunk.
    pub(crate) serial: u32,
}

impl BlockEntityBase {

    pub fn new(ty: BlockEntityType, pos: IVec3, state: BlockState) -> Self {
        Self {
            ty,
            pos,
            cached_state: state,
            removed: false,
            has_world: false,
            serial: 0,
        }
    }

    #[inline]
    pub fn ty(&self) -> &BlockEntityType {
        &self.ty
    }

    #[inline]
    pub fn pos(&self) -> IVec3 {
        self.pos
    }

    #[inline]
    pub fn cached_state(&self) -> BlockState {
        self.cached_state
    }

    #[inline]
    pub fn set_cached_state(&mut self, state: BlockState) {
        self.cached_state = state;
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    #[inline]
    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    #[inline]
    pub fn cancel_removal(&mut self) {
        self.removed = false;
    }

    #[inline]
    pub fn has_world(&self) -> bool {
        self.has_world
    }

    #[inline]
    pub(crate) fn set_has_world(&mut self, has_world: bool) {
        self.has_world = has_world;
    }

    /// Write the id and position tags.
    pub fn write_identity(&self, nbt: &mut NbtCompound) {
        nbt.insert("id", Nbt::String(self.ty.id().to_string()));
        nbt.insert("x", Nbt::Int(self.pos.x));
        nbt.insert("y", Nbt::Int(self.pos.y));
        nbt.insert("z", Nbt::Int(self.pos.z));
    }

}


/// Access to a concrete type behind a trait object.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {

    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

}

/// A block entity, the concrete types are provided by the block registry.
pub trait BlockEntity: AsAny + fmt::Debug + Send {

    fn base(&self) -> &BlockEntityBase;

    fn base_mut(&mut self) -> &mut BlockEntityBase;

    /// Read the type-specific data.
    fn read_nbt(&mut self, _nbt: &NbtCompoundParse<'_>) -> Result<(), NbtParseError> {
        Ok(())
    }

    /// Write the type-specific data, identity tags are written by the caller.
    fn write_nbt(&self, _nbt: &mut NbtCompound) {}

    /// The positional event listener of this block entity, if it listens to events.
    fn event_listener(&self) -> Option<GameEventListener> {
        None
    }

}

impl<'a> dyn BlockEntity + 'a {

    #[inline]
    pub fn downcast_ref<T: BlockEntity + Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    #[inline]
    pub fn downcast_mut<T: BlockEntity + Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    #[inline]
    pub fn pos(&self) -> IVec3 {
        self.base().pos
    }

    /// Save this block entity with its identity tags.
    pub fn to_nbt(&self) -> NbtCompound {
        let mut nbt = NbtCompound::new();
        self.base().write_identity(&mut nbt);
        self.write_nbt(&mut nbt);
        nbt
    }

}


/// Read the position tags of a saved block entity.
pub fn pos_from_nbt(nbt: &NbtCompound) -> Result<IVec3, NbtParseError> {
    let parse = nbt.parse();
    Ok(IVec3::new(parse.get_int("x")?, parse.get_int("y")?, parse.get_int("z")?))
}

/// Instantiate a block entity from saved data, for the given state.
pub fn from_nbt(registry: &dyn BlockRegistry, pos: IVec3, state: BlockState, nbt: &NbtCompound) -> Result<Box<dyn BlockEntity>, BlockEntityLoadError> {

    let parse = nbt.parse();
    let id = parse.get_string("id")?;

    let mut block_entity = registry.instantiate_block_entity(id, pos, state)
        .ok_or_else(|| BlockEntityLoadError::Unsupported { id: id.to_string(), state })?;

    block_entity.read_nbt(&parse)?;
    Ok(block_entity)

}


/// Error when instantiating a block entity from saved data.
#[derive(thiserror::Error, Debug)]
pub enum BlockEntityLoadError {
    #[error("{0}")]
    Parse(#[from] NbtParseError),
    #[error("block entity {id} unknown or unsupported by state {state:?}")]
    Unsupported {
        id: String,
        state: BlockState,
    },
}
