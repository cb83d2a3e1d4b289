use alloc::{boxed::Box, vec::Vec};
use core::{fmt, str};

/// A named property of a device tree node. Values are stored the way a flattened tree
/// carries them: big-endian cells, NUL-terminated strings, or nothing at all for booleans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: Box<str>,
    pub data: Box<[u8]>,
}

/// Constructors
impl Property {
    pub fn new(name: impl AsRef<str>, data: impl Into<Box<[u8]>>) -> Property {
        Property {
            name: Box::from(name.as_ref()),
            data: data.into(),
        }
    }
    /// A value-less property, e.g. `wakeup-source;`.
    pub fn empty(name: impl AsRef<str>) -> Property {
        Property::new(name, Vec::new())
    }
    pub fn from_u32(name: impl AsRef<str>, value: u32) -> Property {
        Property::new(name, value.to_be_bytes().to_vec())
    }
    pub fn from_string(name: impl AsRef<str>, value: &str) -> Property {
        Property::from_strlist(name, &[value])
    }
    pub fn from_strlist(name: impl AsRef<str>, values: &[&str]) -> Property {
        let mut data = Vec::new();
        for value in values {
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        Property::new(name, data)
    }
}

/// Value accessors
impl Property {
    pub fn value_as_u32(&self) -> Result<u32, PropertyError> {
        let cell: [u8; 4] = self
            .data
            .get(0..4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(PropertyError::InvalidPropFormat)?;
        Ok(u32::from_be_bytes(cell))
    }
    /// The first string of the value. The value must be NUL-terminated within its length.
    pub fn value_as_str(&self) -> Result<&str, PropertyError> {
        let end = self
            .data
            .iter()
            .position(|b| *b == 0)
            .ok_or(PropertyError::InvalidPropFormat)?;
        str::from_utf8(&self.data[..end]).map_err(|_| PropertyError::InvalidPropFormat)
    }
    pub fn value_as_strlist(&self) -> Result<Vec<&str>, PropertyError> {
        let mut res = Vec::new();
        let mut st = 0;
        for (i, b) in self.data.iter().enumerate() {
            if *b == 0 {
                res.push(
                    str::from_utf8(&self.data[st..i])
                        .map_err(|_| PropertyError::InvalidPropFormat)?,
                );
                st = i + 1;
            }
        }
        if st != self.data.len() {
            // add last if not terminated with 0
            res.push(
                str::from_utf8(&self.data[st..]).map_err(|_| PropertyError::InvalidPropFormat)?,
            );
        }
        Ok(res)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyError {
    InvalidPropFormat,
    PropNotFound,
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyError::InvalidPropFormat => f.write_str("invalid property format"),
            PropertyError::PropNotFound => f.write_str("property not found"),
        }
    }
}

impl core::error::Error for PropertyError {}
