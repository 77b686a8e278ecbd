//! Chunk storage and block entity lifecycle engine for a voxel world.

pub mod geom;
pub mod io;
pub mod nbt;
pub mod config;

pub mod block;
pub mod biome;
pub mod palette;
pub mod section;
pub mod heightmap;

pub mod block_entity;
pub mod ticker;
pub mod tick;
pub mod game_event;
pub mod structure;

pub mod crash;
pub mod level;
pub mod chunk;
pub mod world;

#[cfg(test)]
mod test_util;
