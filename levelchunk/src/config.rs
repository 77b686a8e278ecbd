//! Per-world chunk configuration, and process-level flags given from environment
//! variables and lazy initialized when needed.

use std::sync::Arc;
use std::env;

use once_cell::race::OnceBool;

use crate::heightmap::HeightmapTypes;
use crate::block::BlockRegistry;
use crate::geom::HeightLimit;


/// Configuration shared by every chunk of a world.
#[derive(Clone)]
pub struct ChunkConfig {
    /// The block registry used to query states capabilities.
    registry: Arc<dyn BlockRegistry>,
    /// Vertical extent of the world.
    height: HeightLimit,
    /// The heightmap types known to the world.
    heightmaps: HeightmapTypes,
    /// Bits per entry of direct palettes, derived from the registry's state count.
    global_bits: u8,
}

impl ChunkConfig {

    pub fn new(registry: Arc<dyn BlockRegistry>, height: HeightLimit, heightmaps: HeightmapTypes) -> Self {
        let global_bits = ceil_log2(registry.state_count()).max(1) as u8;
        Self { registry, height, heightmaps, global_bits }
    }

    /// Build a configuration with the vanilla heightmap types.
    pub fn vanilla(registry: Arc<dyn BlockRegistry>, height: HeightLimit) -> Self {
        Self::new(registry, height, HeightmapTypes::vanilla())
    }

    #[inline]
    pub fn registry(&self) -> &Arc<dyn BlockRegistry> {
        &self.registry
    }

    #[inline]
    pub fn height(&self) -> HeightLimit {
        self.height
    }

    #[inline]
    pub fn heightmaps(&self) -> &HeightmapTypes {
        &self.heightmaps
    }

    #[inline]
    pub fn global_bits(&self) -> u8 {
        self.global_bits
    }

}

/// Smallest number of bits able to store `value` distinct values.
#[inline]
pub fn ceil_log2(value: u32) -> u32 {
    if value <= 1 { 0 } else { u32::BITS - (value - 1).leading_zeros() }
}


/// Return true if every incremental heightmap update should be verified against a full
/// rescan of the column, mismatches are logged as errors.
/// 
/// To enable this check, set `LEVELCHUNK_STRICT_HEIGHTMAP=1`.
pub fn strict_heightmap() -> bool {
    static ENV: OnceBool = OnceBool::new();
    ENV.get_or_init(|| {
        env::var_os("LEVELCHUNK_STRICT_HEIGHTMAP")
            .map(|s| s.as_encoded_bytes() == b"1")
            .unwrap_or(false)
    })
}
