//! This module provides read and write extension traits for the Java types and the
//! variable-length integers found in wire formats.

use byteorder::{ReadBytesExt, WriteBytesExt, BE};
use std::io::{self, Read, Write};


/// Extension trait with wire-specific read methods.
pub trait ReadJavaExt: Read {

    #[inline]
    fn read_java_byte(&mut self) -> io::Result<i8> {
        ReadBytesExt::read_i8(self)
    }

    #[inline]
    fn read_java_short(&mut self) -> io::Result<i16> {
        ReadBytesExt::read_i16::<BE>(self)
    }

    #[inline]
    fn read_java_long(&mut self) -> io::Result<i64> {
        ReadBytesExt::read_i64::<BE>(self)
    }

    /// Read a variable-length integer of at most 5 bytes, 7 bits per byte with the
    /// high bit set on every byte except the last one.
    fn read_var_int(&mut self) -> io::Result<i32> {

        let mut value = 0u32;
        for i in 0..5 {
            let byte = ReadBytesExt::read_u8(self)?;
            value |= ((byte & 0x7F) as u32) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }

        Err(new_invalid_data_err("var int too big"))

    }

}

/// Extension trait with wire-specific write methods.
pub trait WriteJavaExt: Write {

    #[inline]
    fn write_java_byte(&mut self, b: i8) -> io::Result<()> {
        WriteBytesExt::write_i8(self, b)
    }

    #[inline]
    fn write_java_short(&mut self, s: i16) -> io::Result<()> {
        WriteBytesExt::write_i16::<BE>(self, s)
    }

    #[inline]
    fn write_java_long(&mut self, l: i64) -> io::Result<()> {
        WriteBytesExt::write_i64::<BE>(self, l)
    }

    fn write_var_int(&mut self, value: i32) -> io::Result<()> {

        let mut value = value as u32;
        loop {
            if value & !0x7F == 0 {
                return WriteBytesExt::write_u8(self, value as u8);
            }
            WriteBytesExt::write_u8(self, (value & 0x7F) as u8 | 0x80)?;
            value >>= 7;
        }

    }

}

impl<R: Read> ReadJavaExt for R {}
impl<W: Write> WriteJavaExt for W {}


/// Return an I/O error with the invalid data kind and the given message.
#[inline]
pub fn new_invalid_data_err(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn var_int_encoding() {

        let mut buf = Vec::new();
        buf.write_var_int(0).unwrap();
        buf.write_var_int(127).unwrap();
        buf.write_var_int(128).unwrap();
        buf.write_var_int(-1).unwrap();
        assert_eq!(buf, [0x00, 0x7F, 0x80, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);

        let mut reader = &buf[..];
        assert_eq!(reader.read_var_int().unwrap(), 0);
        assert_eq!(reader.read_var_int().unwrap(), 127);
        assert_eq!(reader.read_var_int().unwrap(), 128);
        assert_eq!(reader.read_var_int().unwrap(), -1);
        assert!(reader.is_empty());

    }

    #[test]
    fn var_int_too_long() {
        let mut reader = &[0xFFu8, 0xFF, 0xFF, 0xFF, 0xFF, 0x01][..];
        let err = reader.read_var_int().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

}
