//! Palette-compressed storage of block states, backing chunk sections.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use indexmap::IndexSet;

use crate::io::{ReadJavaExt, WriteJavaExt};
use crate::block::BlockState;


/// Smallest number of bits per entry used by indexed palettes.
const MIN_INDEXED_BITS: u8 = 4;
/// Largest number of bits per entry before switching to direct palette.
const MAX_INDEXED_BITS: u8 = 8;


/// An array of unsigned integers of fixed bit width packed into 64-bit words. An entry
/// never spans two words, the remaining high bits of each word are left zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArray {
    bits: u8,
    len: usize,
    data: Vec<u64>,
}

impl PackedArray {

    /// Create a new zeroed array, bits must be at most 32.
    pub fn new(bits: u8, len: usize) -> Self {
        debug_assert!(bits <= 32);
        Self { bits, len, data: vec![0; Self::words_for(bits, len)] }
    }

    /// Wrap existing words, returning an error if the number of words doesn't match.
    pub fn from_raw(bits: u8, len: usize, data: Vec<u64>) -> Result<Self, PaletteError> {
        if bits > 32 {
            return Err(PaletteError::InvalidBits(bits));
        }
        let expected = Self::words_for(bits, len);
        if data.len() != expected {
            return Err(PaletteError::InvalidDataLength { expected, actual: data.len() });
        }
        Ok(Self { bits, len, data })
    }

    /// Number of words needed to store the given number of entries.
    #[inline]
    pub fn words_for(bits: u8, len: usize) -> usize {
        if bits == 0 {
            0
        } else {
            len.div_ceil(64 / bits as usize)
        }
    }

    #[inline]
    fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, u32) {
        let per_word = 64 / self.bits as usize;
        (index / per_word, ((index % per_word) * self.bits as usize) as u32)
    }

    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        debug_assert!(index < self.len);
        if self.bits == 0 {
            return 0;
        }
        let (word, shift) = self.locate(index);
        ((self.data[word] >> shift) & self.mask()) as u32
    }

    /// Set the entry at the given index, returning the previous one.
    #[inline]
    pub fn set(&mut self, index: usize, value: u32) -> u32 {
        debug_assert!(index < self.len);
        debug_assert!(self.bits == 32 || value < (1 << self.bits), "value too large for bits");
        if self.bits == 0 {
            return 0;
        }
        let (word, shift) = self.locate(index);
        let mask = self.mask();
        let prev = (self.data[word] >> shift) & mask;
        self.data[word] = (self.data[word] & !(mask << shift)) | (((value as u64) & mask) << shift);
        prev as u32
    }

    /// Copy all entries into a new array with a different bit width.
    pub fn repacked(&self, bits: u8) -> Self {
        let mut ret = Self::new(bits, self.len);
        for index in 0..self.len {
            ret.set(index, self.get(index));
        }
        ret
    }

    #[inline]
    pub fn bits(&self) -> u8 {
        self.bits
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn data(&self) -> &[u64] {
        &self.data
    }

}


/// Mapping from stored raw values to block states.
#[derive(Debug, Clone)]
enum Palette {
    /// Raw values are indices into this set of states.
    Indexed(IndexSet<BlockState>),
    /// Raw values are the states ids.
    Direct,
}

/// A fixed-size container of block states that stores a small palette of distinct
/// states and narrow per-entry indices, growing the indices as the palette grows.
#[derive(Debug, Clone)]
pub struct PalettedContainer {
    /// Bits per entry when the palette becomes direct.
    global_bits: u8,
    palette: Palette,
    data: PackedArray,
}

impl PalettedContainer {

    /// Create a container of the given length filled with the given state.
    pub fn new(len: usize, fill: BlockState, global_bits: u8) -> Self {
        let mut states = IndexSet::new();
        states.insert(fill);
        Self {
            global_bits,
            palette: Palette::Indexed(states),
            data: PackedArray::new(MIN_INDEXED_BITS, len),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bits per entry currently used.
    #[inline]
    pub fn bits(&self) -> u8 {
        self.data.bits()
    }

    #[inline]
    fn state_of(&self, raw: u32) -> Result<BlockState, PaletteError> {
        match &self.palette {
            Palette::Indexed(states) => states.get_index(raw as usize)
                .copied()
                .ok_or(PaletteError::MissingEntry(raw)),
            Palette::Direct => Ok(BlockState(raw)),
        }
    }

    /// Get the state at the given index. An error is returned if the stored raw value
    /// has no palette entry, which only happens with corrupted data.
    #[inline]
    pub fn get(&self, index: usize) -> Result<BlockState, PaletteError> {
        self.state_of(self.data.get(index))
    }

    /// Set the state at the given index, returning the previous one.
    pub fn set(&mut self, index: usize, state: BlockState) -> Result<BlockState, PaletteError> {
        let prev = self.get(index)?;
        let raw = self.raw_of(state)?;
        self.data.set(index, raw);
        Ok(prev)
    }

    /// Get the raw value of a state, inserting it in the palette and growing the entries
    /// if needed.
    fn raw_of(&mut self, state: BlockState) -> Result<u32, PaletteError> {

        let Palette::Indexed(states) = &mut self.palette else {
            debug_assert!(self.global_bits == 32 || state.0 < (1 << self.global_bits));
            return Ok(state.0);
        };

        let (index, inserted) = states.insert_full(state);
        if inserted && index >= (1 << self.data.bits()) {
            self.grow()?;
            if let Palette::Direct = self.palette {
                return Ok(state.0);
            }
        }

        Ok(index as u32)

    }

    /// Increase the number of bits per entry by one, switching to the direct palette if
    /// too large for an indexed one.
    fn grow(&mut self) -> Result<(), PaletteError> {

        let bits = self.data.bits() + 1;
        if bits <= MAX_INDEXED_BITS {
            self.data = self.data.repacked(bits);
            return Ok(());
        }

        let mut data = PackedArray::new(self.global_bits, self.data.len());
        for index in 0..data.len() {
            data.set(index, self.get(index)?.0);
        }

        self.palette = Palette::Direct;
        self.data = data;
        Ok(())

    }

    /// Count every state in this container, the callback is called once per distinct
    /// state with its number of occurrences.
    pub fn count(&self, mut func: impl FnMut(BlockState, usize)) -> Result<(), PaletteError> {
        match &self.palette {
            Palette::Indexed(states) => {
                let mut counts = vec![0usize; states.len()];
                for index in 0..self.data.len() {
                    let raw = self.data.get(index);
                    *counts.get_mut(raw as usize).ok_or(PaletteError::MissingEntry(raw))? += 1;
                }
                for (state, count) in states.iter().zip(counts) {
                    if count != 0 {
                        func(*state, count);
                    }
                }
            }
            Palette::Direct => {
                let mut counts = HashMap::<u32, usize>::new();
                for index in 0..self.data.len() {
                    *counts.entry(self.data.get(index)).or_default() += 1;
                }
                for (raw, count) in counts {
                    func(BlockState(raw), count);
                }
            }
        }
        Ok(())
    }

    /// Write this container in its wire format: bits per entry, palette if indexed, then
    /// the number of words followed by the words.
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {

        writer.write_java_byte(self.data.bits() as i8)?;

        if let Palette::Indexed(states) = &self.palette {
            writer.write_var_int(states.len() as i32)?;
            for state in states {
                writer.write_var_int(state.0 as i32)?;
            }
        }

        writer.write_var_int(self.data.data().len() as i32)?;
        for &word in self.data.data() {
            writer.write_java_long(word as i64)?;
        }

        Ok(())

    }

    /// Read a container of the given length from its wire format.
    pub fn read_from(mut reader: impl Read, len: usize, global_bits: u8) -> Result<Self, PaletteError> {

        let wire_bits = reader.read_java_byte()? as u8;
        if wire_bits > 32 {
            return Err(PaletteError::InvalidBits(wire_bits));
        }

        let (palette, bits) = if wire_bits == 0 {
            // Single-valued container, the only entry has no bits.
            let mut states = IndexSet::new();
            states.insert(read_state(&mut reader)?);
            (Palette::Indexed(states), MIN_INDEXED_BITS)
        } else if wire_bits <= MAX_INDEXED_BITS {
            let bits = wire_bits.max(MIN_INDEXED_BITS);
            let palette_len = read_len(&mut reader)?;
            if palette_len == 0 || palette_len > (1 << bits) {
                return Err(PaletteError::InvalidPaletteLength(palette_len));
            }
            let mut states = IndexSet::with_capacity(palette_len);
            for _ in 0..palette_len {
                let state = read_state(&mut reader)?;
                if !states.insert(state) {
                    return Err(PaletteError::DuplicateEntry(state));
                }
            }
            (Palette::Indexed(states), bits)
        } else if wire_bits <= global_bits {
            (Palette::Direct, global_bits)
        } else {
            return Err(PaletteError::InvalidBits(wire_bits));
        };

        let words_len = read_len(&mut reader)?;
        if words_len > PackedArray::words_for(32, len) {
            return Err(PaletteError::InvalidDataLength { expected: PackedArray::words_for(wire_bits, len), actual: words_len });
        }

        let mut words = Vec::with_capacity(words_len);
        for _ in 0..words_len {
            words.push(reader.read_java_long()? as u64);
        }

        let mut data = PackedArray::from_raw(wire_bits, len, words)?;
        if data.bits() != bits {
            data = data.repacked(bits);
        }

        Ok(Self { global_bits, palette, data })

    }

}

fn read_len(reader: &mut impl Read) -> Result<usize, PaletteError> {
    usize::try_from(reader.read_var_int()?).map_err(|_| PaletteError::NegativeLength)
}

fn read_state(reader: &mut impl Read) -> Result<BlockState, PaletteError> {
    u32::try_from(reader.read_var_int()?)
        .map(BlockState)
        .map_err(|_| PaletteError::NegativeLength)
}


/// Errors that may happen with corrupted container data.
#[derive(thiserror::Error, Debug)]
pub enum PaletteError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("missing palette entry for raw value {0}")]
    MissingEntry(u32),
    #[error("invalid bits per entry: {0}")]
    InvalidBits(u8),
    #[error("invalid packed data length, expected {expected} words, got {actual}")]
    InvalidDataLength {
        expected: usize,
        actual: usize,
    },
    #[error("invalid palette length: {0}")]
    InvalidPaletteLength(usize),
    #[error("duplicate palette entry: {0:?}")]
    DuplicateEntry(BlockState),
    #[error("negative length or id")]
    NegativeLength,
}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn packed_no_spanning() {

        let mut array = PackedArray::new(9, 256);
        // 7 entries of 9 bits per word.
        assert_eq!(array.data().len(), 37);

        array.set(6, 511);
        array.set(7, 3);
        assert_eq!(array.data()[0], 511 << 54);
        assert_eq!(array.data()[1], 3);
        assert_eq!(array.get(6), 511);
        assert_eq!(array.set(6, 1), 511);
        assert_eq!(array.get(7), 3);

    }

    #[test]
    fn palette_growth() {

        let mut container = PalettedContainer::new(4096, BlockState::AIR, 12);
        assert_eq!(container.bits(), 4);

        for i in 0..16 {
            container.set(i, BlockState(i as u32)).unwrap();
        }
        assert_eq!(container.bits(), 4);

        container.set(16, BlockState(16)).unwrap();
        assert_eq!(container.bits(), 5);

        for i in 17..300 {
            container.set(i, BlockState(i as u32)).unwrap();
        }
        // More than 256 distinct states, switched to direct.
        assert_eq!(container.bits(), 12);

        for i in 0..300 {
            assert_eq!(container.get(i).unwrap(), BlockState(i as u32));
        }
        assert_eq!(container.get(4095).unwrap(), BlockState::AIR);

    }

    #[test]
    fn wire_single_value() {

        let mut buf = Vec::new();
        buf.write_java_byte(0).unwrap();
        buf.write_var_int(7).unwrap();
        buf.write_var_int(0).unwrap();

        let container = PalettedContainer::read_from(&buf[..], 4096, 8).unwrap();
        assert_eq!(container.get(0).unwrap(), BlockState(7));
        assert_eq!(container.get(4095).unwrap(), BlockState(7));

        let mut total = 0;
        container.count(|state, count| {
            assert_eq!(state, BlockState(7));
            total += count;
        }).unwrap();
        assert_eq!(total, 4096);

    }

    #[test]
    fn wire_corrupted_index() {

        let mut buf = Vec::new();
        buf.write_java_byte(4).unwrap();
        buf.write_var_int(1).unwrap();
        buf.write_var_int(3).unwrap();
        buf.write_var_int(256).unwrap();
        buf.write_java_long(0x5).unwrap();
        for _ in 1..256 {
            buf.write_java_long(0).unwrap();
        }

        let container = PalettedContainer::read_from(&buf[..], 4096, 8).unwrap();
        assert_eq!(container.get(1).unwrap(), BlockState(3));
        assert!(matches!(container.get(0), Err(PaletteError::MissingEntry(5))));

    }

    #[test]
    fn wire_direct_bits() {

        let mut buf = Vec::new();
        buf.write_java_byte(13).unwrap();
        buf.write_var_int(1024).unwrap();
        buf.write_java_long(300).unwrap();
        for _ in 1..1024 {
            buf.write_java_long(0).unwrap();
        }

        // Global ids can't be wider than the registry's.
        assert!(matches!(PalettedContainer::read_from(&buf[..], 4096, 12), Err(PaletteError::InvalidBits(13))));

        let container = PalettedContainer::read_from(&buf[..], 4096, 15).unwrap();
        assert_eq!(container.bits(), 15);
        assert_eq!(container.get(0).unwrap(), BlockState(300));
        assert_eq!(container.get(1).unwrap(), BlockState::AIR);

    }

    #[test]
    fn wire_bad_length() {

        let mut buf = Vec::new();
        buf.write_java_byte(4).unwrap();
        buf.write_var_int(1).unwrap();
        buf.write_var_int(0).unwrap();
        buf.write_var_int(2).unwrap();
        buf.write_java_long(0).unwrap();
        buf.write_java_long(0).unwrap();

        assert!(matches!(PalettedContainer::read_from(&buf[..], 4096, 8), Err(PaletteError::InvalidDataLength { expected: 256, actual: 2 })));

    }

}
