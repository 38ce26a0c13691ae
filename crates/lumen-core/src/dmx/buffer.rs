//! DMX512 slot buffer

use std::fmt;
use std::str::FromStr;

use crate::{error::CoreError, Result};

/// Number of slots in a DMX512 universe
pub const DMX_UNIVERSE_SIZE: usize = 512;

/// A variable length (0-512) block of DMX slot values
///
/// The length matters: a buffer only covers the slots it has been given, so
/// a short buffer takes no part in an HTP merge for the slots past its end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DmxBuffer {
    data: Vec<u8>,
}

impl DmxBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer from raw slot values, truncated to 512 slots
    pub fn from_slice(data: &[u8]) -> Self {
        let len = data.len().min(DMX_UNIVERSE_SIZE);
        Self {
            data: data[..len].to_vec(),
        }
    }

    /// Replace the contents with another buffer
    pub fn set(&mut self, other: &DmxBuffer) {
        self.data.clear();
        self.data.extend_from_slice(&other.data);
    }

    /// Drop every slot, leaving a zero length buffer
    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// Merge another buffer into this one, keeping the highest value per slot
    ///
    /// Slots past the end of the shorter buffer are taken from the longer one
    /// unchanged.
    pub fn htp_merge(&mut self, other: &DmxBuffer) {
        for (slot, value) in self.data.iter_mut().zip(&other.data) {
            *slot = (*slot).max(*value);
        }
        if other.data.len() > self.data.len() {
            let start = self.data.len();
            self.data.extend_from_slice(&other.data[start..]);
        }
    }

    /// Value of a slot (0-indexed), if the buffer covers it
    pub fn get(&self, slot: usize) -> Option<u8> {
        self.data.get(slot).copied()
    }

    /// Slot values as a slice
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Number of slots held
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero length buffer
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<&[u8]> for DmxBuffer {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}

impl FromStr for DmxBuffer {
    type Err = CoreError;

    /// Parse a comma separated slot list such as `"1,0,0,10"`
    ///
    /// Empty fields are read as 0, matching how lighting consoles export
    /// sparse channel lists.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::new());
        }

        let mut data = Vec::new();
        for field in s.split(',') {
            let field = field.trim();
            if field.is_empty() {
                data.push(0);
                continue;
            }
            let value = field
                .parse::<u8>()
                .map_err(|e| CoreError::InvalidDmx(format!("'{}': {}", field, e)))?;
            data.push(value);
        }

        if data.len() > DMX_UNIVERSE_SIZE {
            return Err(CoreError::InvalidDmx(format!(
                "{} slots exceeds the universe size of {}",
                data.len(),
                DMX_UNIVERSE_SIZE
            )));
        }
        Ok(Self { data })
    }
}

impl fmt::Display for DmxBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for value in &self.data {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}", value)?;
            first = false;
        }
        Ok(())
    }
}
