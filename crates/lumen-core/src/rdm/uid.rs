//! RDM unique identifiers

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{error::CoreError, Result};

/// Wildcard manufacturer id
const ALL_MANUFACTURERS: u16 = 0xffff;
/// Wildcard device id
const ALL_DEVICES: u32 = 0xffff_ffff;

/// A 48 bit RDM UID: 16 bit manufacturer (ESTA) id, 32 bit device id
///
/// Ordering is manufacturer first, then device, which keeps a [`UidSet`]
/// sorted the way responders are usually listed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Uid {
    manufacturer_id: u16,
    device_id: u32,
}

/// An ordered set of UIDs
pub type UidSet = BTreeSet<Uid>;

impl Uid {
    /// Packed size on the wire
    pub const SIZE: usize = 6;

    /// Create a UID
    pub const fn new(manufacturer_id: u16, device_id: u32) -> Self {
        Self {
            manufacturer_id,
            device_id,
        }
    }

    /// The broadcast UID addressing every device
    pub const fn all_devices() -> Self {
        Self::new(ALL_MANUFACTURERS, ALL_DEVICES)
    }

    /// The vendorcast UID addressing every device from one manufacturer
    pub const fn vendorcast(manufacturer_id: u16) -> Self {
        Self::new(manufacturer_id, ALL_DEVICES)
    }

    /// Manufacturer (ESTA) id
    pub fn manufacturer_id(&self) -> u16 {
        self.manufacturer_id
    }

    /// Device id
    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// True for broadcast and vendorcast addresses
    pub fn is_broadcast(&self) -> bool {
        self.device_id == ALL_DEVICES
    }

    /// Big-endian wire form
    pub fn pack(&self) -> [u8; Self::SIZE] {
        let mut packed = [0u8; Self::SIZE];
        packed[0..2].copy_from_slice(&self.manufacturer_id.to_be_bytes());
        packed[2..6].copy_from_slice(&self.device_id.to_be_bytes());
        packed
    }

    /// Read a UID from its wire form
    pub fn unpack(data: &[u8; Self::SIZE]) -> Self {
        Self::new(
            u16::from_be_bytes([data[0], data[1]]),
            u32::from_be_bytes([data[2], data[3], data[4], data[5]]),
        )
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:08x}", self.manufacturer_id, self.device_id)
    }
}

impl FromStr for Uid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let (manufacturer, device) = s
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidUid(s.to_string()))?;
        if manufacturer.is_empty()
            || manufacturer.len() > 4
            || device.is_empty()
            || device.len() > 8
        {
            return Err(CoreError::InvalidUid(s.to_string()));
        }

        let manufacturer_id = u16::from_str_radix(manufacturer, 16)
            .map_err(|_| CoreError::InvalidUid(s.to_string()))?;
        let device_id =
            u32::from_str_radix(device, 16).map_err(|_| CoreError::InvalidUid(s.to_string()))?;
        Ok(Self::new(manufacturer_id, device_id))
    }
}
