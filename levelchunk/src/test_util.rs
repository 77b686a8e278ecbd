//! A small block registry and block entities used by tests.

use std::sync::Arc;

use glam::IVec3;
use tracing_subscriber::EnvFilter;

use crate::block::{BlockId, BlockRegistry, BlockState, FluidId, FluidState};
use crate::block_entity::{BlockEntity, BlockEntityBase, BlockEntityType};
use crate::nbt::{Nbt, NbtCompound, NbtCompoundParse, NbtParseError};
use crate::game_event::GameEventListener;
use crate::ticker::BlockEntityTicker;
use crate::config::ChunkConfig;
use crate::geom::{Face, HeightLimit};
use crate::world::World;


pub const STONE: BlockState = BlockState(1);
pub const LEAVES: BlockState = BlockState(2);
pub const WATER: BlockState = BlockState(3);
pub const CHEST: BlockState = BlockState(4);
pub const REMOVER: BlockState = BlockState(5);
pub const SIGN: BlockState = BlockState(6);
pub const FENCE: BlockState = BlockState(7);
/// Same block as [`FENCE`], connected to a neighbor fence.
pub const FENCE_CONNECTED: BlockState = BlockState(8);
pub const GLOWSTONE: BlockState = BlockState(9);

pub const CHEST_TYPE: BlockEntityType = BlockEntityType::new(arcstr::literal!("chest"));
pub const REMOVER_TYPE: BlockEntityType = BlockEntityType::new(arcstr::literal!("remover"));
pub const SIGN_TYPE: BlockEntityType = BlockEntityType::new(arcstr::literal!("sign"));

/// Range of the chest's game event listener.
pub const CHEST_LISTENER_RANGE: u32 = 8;


/// Install a tracing subscriber writing to the test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// A world configuration with 24 sections starting at Y = -64.
pub fn config() -> Arc<ChunkConfig> {
    Arc::new(ChunkConfig::vanilla(Arc::new(TestRegistry), HeightLimit::new(-64, 384)))
}


#[derive(Debug, Clone, Copy)]
pub struct TestRegistry;

impl TestRegistry {

    fn block_entity_type(state: BlockState) -> Option<BlockEntityType> {
        match state {
            CHEST => Some(CHEST_TYPE),
            REMOVER => Some(REMOVER_TYPE),
            SIGN => Some(SIGN_TYPE),
            _ => None,
        }
    }

}

impl BlockRegistry for TestRegistry {

    fn state_count(&self) -> u32 {
        16
    }

    fn block_of(&self, state: BlockState) -> BlockId {
        match state {
            FENCE_CONNECTED => BlockId(FENCE.0),
            _ => BlockId(state.0),
        }
    }

    fn is_air(&self, state: BlockState) -> bool {
        state == BlockState::AIR
    }

    fn fluid_state(&self, state: BlockState) -> FluidState {
        match state {
            WATER => FluidState(1),
            _ => FluidState::EMPTY,
        }
    }

    fn fluid_of(&self, fluid: FluidState) -> FluidId {
        FluidId(fluid.0)
    }

    fn luminance(&self, state: BlockState) -> u8 {
        if state == GLOWSTONE { 15 } else { 0 }
    }

    fn ticks_randomly(&self, state: BlockState) -> bool {
        state == LEAVES
    }

    fn blocks_movement(&self, state: BlockState) -> bool {
        !matches!(state, BlockState::AIR | WATER | SIGN)
    }

    fn is_leaves(&self, state: BlockState) -> bool {
        state == LEAVES
    }

    fn has_block_entity(&self, state: BlockState) -> bool {
        Self::block_entity_type(state).is_some()
    }

    fn create_block_entity(&self, pos: IVec3, state: BlockState) -> Option<Box<dyn BlockEntity>> {
        let ty = Self::block_entity_type(state)?;
        self.instantiate_block_entity(ty.id(), pos, state)
    }

    fn instantiate_block_entity(&self, id: &str, pos: IVec3, state: BlockState) -> Option<Box<dyn BlockEntity>> {
        if Self::block_entity_type(state).is_none_or(|ty| ty.id() != id) {
            return None;
        }
        Some(match id {
            "chest" => Box::new(Chest::new(pos, state)),
            "remover" => Box::new(Remover::new(pos, state)),
            "sign" => Box::new(Sign::new(pos, state)),
            _ => return None,
        })
    }

    fn supports_block_entity(&self, ty: &BlockEntityType, state: BlockState) -> bool {
        Self::block_entity_type(state).as_ref() == Some(ty)
    }

    fn block_entity_ticker(&self, is_client: bool, state: BlockState, ty: &BlockEntityType) -> Option<BlockEntityTicker> {
        if !self.supports_block_entity(ty, state) || is_client {
            return None;
        }
        match state {
            CHEST => Some(tick_chest),
            REMOVER => Some(tick_remover),
            _ => None,
        }
    }

    fn state_for_neighbor_update(&self, state: BlockState, _face: Face, neighbor: BlockState) -> BlockState {
        if state == FENCE && self.block_of(neighbor) == BlockId(FENCE.0) {
            FENCE_CONNECTED
        } else {
            state
        }
    }

}


/// A ticking block entity counting its ticks and listening to game events.
#[derive(Debug)]
pub struct Chest {
    base: BlockEntityBase,
    pub ticks: u32,
}

impl Chest {
    pub fn new(pos: IVec3, state: BlockState) -> Self {
        Self { base: BlockEntityBase::new(CHEST_TYPE, pos, state), ticks: 0 }
    }
}

impl BlockEntity for Chest {

    fn base(&self) -> &BlockEntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BlockEntityBase {
        &mut self.base
    }

    fn read_nbt(&mut self, nbt: &NbtCompoundParse<'_>) -> Result<(), NbtParseError> {
        self.ticks = nbt.get_int("Ticks")? as u32;
        Ok(())
    }

    fn write_nbt(&self, nbt: &mut NbtCompound) {
        nbt.insert("Ticks", Nbt::Int(self.ticks as i32));
    }

    fn event_listener(&self) -> Option<GameEventListener> {
        Some(GameEventListener { source: self.base.pos(), range: CHEST_LISTENER_RANGE })
    }

}

fn tick_chest(_world: &mut World, _pos: IVec3, _state: BlockState, block_entity: &mut dyn BlockEntity) {
    if let Some(chest) = block_entity.downcast_mut::<Chest>() {
        chest.ticks += 1;
    }
}


/// A ticking block entity replacing its target block with stone on each tick.
#[derive(Debug)]
pub struct Remover {
    base: BlockEntityBase,
    pub ticks: u32,
    /// Defaults to the next block on the X axis.
    pub target: IVec3,
}

impl Remover {
    pub fn new(pos: IVec3, state: BlockState) -> Self {
        Self { base: BlockEntityBase::new(REMOVER_TYPE, pos, state), ticks: 0, target: pos + IVec3::X }
    }
}

impl BlockEntity for Remover {

    fn base(&self) -> &BlockEntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BlockEntityBase {
        &mut self.base
    }

}

fn tick_remover(world: &mut World, _pos: IVec3, _state: BlockState, block_entity: &mut dyn BlockEntity) {
    if let Some(remover) = block_entity.downcast_mut::<Remover>() {
        remover.ticks += 1;
        world.set_block_state(remover.target, STONE);
    }
}


/// A block entity that neither ticks nor listens.
#[derive(Debug)]
pub struct Sign {
    base: BlockEntityBase,
    pub text: String,
}

impl Sign {
    pub fn new(pos: IVec3, state: BlockState) -> Self {
        Self { base: BlockEntityBase::new(SIGN_TYPE, pos, state), text: String::new() }
    }
}

impl BlockEntity for Sign {

    fn base(&self) -> &BlockEntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BlockEntityBase {
        &mut self.base
    }

    fn read_nbt(&mut self, nbt: &NbtCompoundParse<'_>) -> Result<(), NbtParseError> {
        self.text = nbt.get_string("Text")?.to_string();
        Ok(())
    }

    fn write_nbt(&self, nbt: &mut NbtCompound) {
        nbt.insert("Text", Nbt::String(self.text.clone()));
    }

}

/// Saved data of a block entity.
pub fn block_entity_nbt(id: &str, pos: IVec3) -> NbtCompound {
    let mut nbt = NbtCompound::new();
    nbt.insert("id", Nbt::String(id.to_string()));
    nbt.insert("x", Nbt::Int(pos.x));
    nbt.insert("y", Nbt::Int(pos.y));
    nbt.insert("z", Nbt::Int(pos.z));
    nbt
}
