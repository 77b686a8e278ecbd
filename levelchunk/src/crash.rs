//! Structured reports for unexpected faults while accessing chunk data.

use std::fmt;

use glam::IVec3;

use crate::palette::PaletteError;
use crate::geom::ChunkPos;


/// A fatal fault with the full positional context of the access that caused it.
#[derive(thiserror::Error, Debug)]
#[error("{title}\n{details}")]
pub struct CrashReport {
    title: &'static str,
    details: CrashDetails,
    #[source]
    cause: PaletteError,
}

/// Positional context of a [`CrashReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashDetails {
    pub chunk: ChunkPos,
    /// Position relative to the section's origin.
    pub local: IVec3,
    pub world: IVec3,
}

impl CrashReport {

    pub fn new(title: &'static str, chunk: ChunkPos, world: IVec3, cause: PaletteError) -> Self {
        Self {
            title,
            details: CrashDetails { chunk, local: world & 15, world },
            cause,
        }
    }

    #[inline]
    pub fn title(&self) -> &'static str {
        self.title
    }

    #[inline]
    pub fn details(&self) -> CrashDetails {
        self.details
    }

    #[inline]
    pub fn cause(&self) -> &PaletteError {
        &self.cause
    }

}

impl fmt::Display for CrashDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-- Block being got --")?;
        writeln!(f, "Chunk: {}", self.chunk)?;
        writeln!(f, "Local: [{}, {}, {}]", self.local.x, self.local.y, self.local.z)?;
        write!(f, "World: [{}, {}, {}]", self.world.x, self.world.y, self.world.z)
    }
}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn positional_context() {

        let report = CrashReport::new("Getting block state", ChunkPos::new(-1, 2), IVec3::new(-3, -60, 40), PaletteError::MissingEntry(9));
        assert_eq!(report.details().local, IVec3::new(13, 4, 8));

        let message = report.to_string();
        assert!(message.starts_with("Getting block state"));
        assert!(message.contains("Chunk: [-1, 2]"));
        assert!(message.contains("World: [-3, -60, 40]"));

    }

}
