//! NBT tree used for block entity blobs, structure data and packet metadata.

use std::collections::BTreeMap;
use std::fmt;


/// A generic NBT tag.
#[derive(Clone, PartialEq)]
pub enum Nbt {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    /// A list of tags, all of the same type.
    List(Vec<Nbt>),
    Compound(NbtCompound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

/// An abstract NBT compound type that hides the internal implementation of the mapping.
#[derive(Clone, PartialEq, Default)]
pub struct NbtCompound {
    inner: BTreeMap<String, Nbt>,
}


/// Basic methods to interpret a tag as its inner type if possible.
impl Nbt {

    #[inline]
    pub fn as_boolean(&self) -> Option<bool> {
        self.as_byte().map(|b| b != 0)
    }

    #[inline]
    pub fn as_byte(&self) -> Option<i8> {
        match *self {
            Self::Byte(n) => Some(n),
            _ => None
        }
    }

    #[inline]
    pub fn as_short(&self) -> Option<i16> {
        match *self {
            Self::Short(n) => Some(n),
            _ => None
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Self::Int(n) => Some(n),
            _ => None
        }
    }

    #[inline]
    pub fn as_long(&self) -> Option<i64> {
        match *self {
            Self::Long(n) => Some(n),
            _ => None
        }
    }

    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(string) => Some(string.as_str()),
            _ => None
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&[Nbt]> {
        match self {
            Self::List(list) => Some(&list[..]),
            _ => None
        }
    }

    #[inline]
    pub fn as_compound(&self) -> Option<&NbtCompound> {
        match self {
            Self::Compound(comp) => Some(comp),
            _ => None
        }
    }

    #[inline]
    pub fn as_long_array(&self) -> Option<&[i64]> {
        match self {
            Self::LongArray(list) => Some(&list[..]),
            _ => None
        }
    }

    pub fn parse(&self) -> NbtParse<'_> {
        NbtParse { inner: self, path: String::new() }
    }

}

/// Basic methods to create and manage keys in a compound.
impl NbtCompound {

    pub fn new() -> Self {
        Self { inner: BTreeMap::new() }
    }

    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, tag: Nbt) {
        self.inner.insert(key.into(), tag);
    }

    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Nbt> {
        self.inner.remove(key)
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Nbt> {
        self.inner.get(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Nbt)> + '_ {
        self.inner.iter().map(|(key, tag)| (key.as_str(), tag))
    }

    #[inline]
    pub fn get_boolean(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Nbt::as_boolean)
    }

    #[inline]
    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(Nbt::as_int)
    }

    #[inline]
    pub fn get_long(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Nbt::as_long)
    }

    #[inline]
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Nbt::as_string)
    }

    #[inline]
    pub fn get_compound(&self, key: &str) -> Option<&NbtCompound> {
        self.get(key).and_then(Nbt::as_compound)
    }

    #[inline]
    pub fn get_long_array(&self, key: &str) -> Option<&[i64]> {
        self.get(key).and_then(Nbt::as_long_array)
    }

    /// Wrap this compound into a parser that reports the path of missing values.
    pub fn parse(&self) -> NbtCompoundParse<'_> {
        NbtCompoundParse { inner: self, path: String::new() }
    }

}

impl From<NbtCompound> for Nbt {
    fn from(value: NbtCompound) -> Self {
        Nbt::Compound(value)
    }
}

/// Manual debug implement to shrink the potential huge arrays.
impl fmt::Debug for Nbt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(n) => f.debug_tuple("Byte").field(n).finish(),
            Self::Short(n) => f.debug_tuple("Short").field(n).finish(),
            Self::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Self::Long(n) => f.debug_tuple("Long").field(n).finish(),
            Self::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Self::Double(n) => f.debug_tuple("Double").field(n).finish(),
            Self::ByteArray(buf) => {
                f.debug_tuple("ByteArray")
                    .field(&format_args!("({}) {:X?}...", buf.len(), &buf[..buf.len().min(10)]))
                    .finish()
            }
            Self::String(string) => f.debug_tuple("String").field(string).finish(),
            Self::List(list) => f.debug_tuple("List").field(list).finish(),
            Self::Compound(compound) => f.debug_tuple("Compound").field(&compound.inner).finish(),
            Self::IntArray(list) => f.debug_tuple("IntArray").field(&list.len()).finish(),
            Self::LongArray(list) => f.debug_tuple("LongArray").field(&list.len()).finish(),
        }
    }
}

impl fmt::Debug for NbtCompound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.iter()).finish()
    }
}


/// Parsing utility structure for anonymous NBT data.
pub struct NbtParse<'nbt> {
    /// Reference to the parsed NBT data.
    inner: &'nbt Nbt,
    /// Current path being parsed, used to return relevant errors.
    path: String,
}

impl<'nbt> NbtParse<'nbt> {
    
    #[inline]
    fn make_error(self, expected: NbtParseExpected) -> NbtParseError {
        NbtParseError { path: self.path, expected }
    }

    #[inline]
    pub fn as_boolean(self) -> Result<bool, NbtParseError> {
        self.as_byte().map(|b| b != 0)
    }

    #[inline]
    pub fn as_byte(self) -> Result<i8, NbtParseError> {
        self.inner.as_byte().ok_or_else(|| self.make_error(NbtParseExpected::Byte))
    }

    #[inline]
    pub fn as_int(self) -> Result<i32, NbtParseError> {
        self.inner.as_int().ok_or_else(|| self.make_error(NbtParseExpected::Int))
    }

    #[inline]
    pub fn as_long(self) -> Result<i64, NbtParseError> {
        self.inner.as_long().ok_or_else(|| self.make_error(NbtParseExpected::Long))
    }

    #[inline]
    pub fn as_string(self) -> Result<&'nbt str, NbtParseError> {
        self.inner.as_string().ok_or_else(|| self.make_error(NbtParseExpected::String))
    }

    #[inline]
    pub fn as_long_array(self) -> Result<&'nbt [i64], NbtParseError> {
        self.inner.as_long_array().ok_or_else(|| self.make_error(NbtParseExpected::LongArray))
    }

    #[inline]
    pub fn as_compound(self) -> Result<NbtCompoundParse<'nbt>, NbtParseError> {
        match self.inner.as_compound() {
            Some(compound) => Ok(NbtCompoundParse { inner: compound, path: self.path }),
            None => Err(self.make_error(NbtParseExpected::Compound))
        }
    }

}

/// Parsing utility structure for a NBT compound.
pub struct NbtCompoundParse<'nbt> {
    /// Reference to the parsed NBT data.
    inner: &'nbt NbtCompound,
    /// Current path being parsed, used to return relevant errors.
    path: String,
}

impl<'nbt> NbtCompoundParse<'nbt> {

    /// Get a item from its key in this compound.
    pub fn get(&self, key: &str) -> Result<NbtParse<'nbt>, NbtParseError> {
        let path = format!("{}/{key}", self.path);
        match self.inner.get(key) {
            Some(inner) => Ok(NbtParse { inner, path }),
            None => Err(NbtParseError { path, expected: NbtParseExpected::Item })
        }
    }

    #[inline]
    pub fn get_boolean(&self, key: &str) -> Result<bool, NbtParseError> {
        self.get(key).and_then(NbtParse::as_boolean)
    }

    #[inline]
    pub fn get_int(&self, key: &str) -> Result<i32, NbtParseError> {
        self.get(key).and_then(NbtParse::as_int)
    }

    #[inline]
    pub fn get_long(&self, key: &str) -> Result<i64, NbtParseError> {
        self.get(key).and_then(NbtParse::as_long)
    }

    #[inline]
    pub fn get_string(&self, key: &str) -> Result<&'nbt str, NbtParseError> {
        self.get(key).and_then(NbtParse::as_string)
    }

    #[inline]
    pub fn get_long_array(&self, key: &str) -> Result<&'nbt [i64], NbtParseError> {
        self.get(key).and_then(NbtParse::as_long_array)
    }

    #[inline]
    pub fn get_compound(&self, key: &str) -> Result<NbtCompoundParse<'nbt>, NbtParseError> {
        self.get(key).and_then(NbtParse::as_compound)
    }

    #[inline]
    pub fn inner(&self) -> &'nbt NbtCompound {
        self.inner
    }

}


/// A parsing error as returned by [`NbtParse`] and [`NbtCompoundParse`] wrappers.
#[derive(thiserror::Error, Debug)]
#[error("{path}: expected {expected:?}")]
pub struct NbtParseError {
    /// The path to the failed parsing.
    pub path: String,
    pub expected: NbtParseExpected,
}

/// A type of expected value for a [`NbtParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NbtParseExpected {
    /// Expected a compound or list item at this path.
    Item,
    Byte,
    Int,
    Long,
    String,
    LongArray,
    Compound,
}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn nested_compound() {

        let mut inner = NbtCompound::new();
        inner.insert("MOTION_BLOCKING", Nbt::LongArray(vec![1, -2, i64::MAX]));

        let mut root = NbtCompound::new();
        root.insert("x", Nbt::Int(-12));
        root.insert("keepPacked", Nbt::Byte(1));
        root.insert("Heightmaps", Nbt::Compound(inner));

        assert_eq!(root.get_int("x"), Some(-12));
        assert_eq!(root.get_boolean("keepPacked"), Some(true));
        assert_eq!(root.get_long("x"), None);
        assert_eq!(root.get_compound("Heightmaps").unwrap().get_long_array("MOTION_BLOCKING"), Some(&[1, -2, i64::MAX][..]));

        let parse = root.parse();
        let err = parse.get_compound("Heightmaps").unwrap().get_int("MOTION_BLOCKING").unwrap_err();
        assert_eq!(err.path, "/Heightmaps/MOTION_BLOCKING");
        assert_eq!(err.expected, NbtParseExpected::Int);

    }

    #[test]
    fn parse_path() {

        let mut root = NbtCompound::new();
        root.insert("id", Nbt::String("chest".into()));

        let parse = root.parse();
        assert_eq!(parse.get_string("id").unwrap(), "chest");

        let err = parse.get_int("x").unwrap_err();
        assert_eq!(err.path, "/x");
        assert_eq!(err.expected, NbtParseExpected::Item);

        let err = parse.get_int("id").unwrap_err();
        assert_eq!(err.expected, NbtParseExpected::Int);

    }

}
