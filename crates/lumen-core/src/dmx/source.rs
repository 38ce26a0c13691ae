//! Timestamped, prioritised DMX data from one input port or client

use std::time::{Duration, Instant};

use super::buffer::DmxBuffer;

/// Lowest source priority
pub const SOURCE_PRIORITY_MIN: u8 = 0;
/// Priority assumed when a source does not supply one
pub const SOURCE_PRIORITY_DEFAULT: u8 = 100;
/// Highest source priority
pub const SOURCE_PRIORITY_MAX: u8 = 200;

/// A snapshot of the data one source last sent
///
/// Sources are replaced wholesale on every update and never mutated in
/// place. A default constructed source has no timestamp and is "unset".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DmxSource {
    data: DmxBuffer,
    timestamp: Option<Instant>,
    priority: u8,
}

impl DmxSource {
    /// How long a source stays live after its last update
    pub const TIMEOUT_INTERVAL: Duration = Duration::from_millis(2500);

    /// Create a source; the priority is clamped to [`SOURCE_PRIORITY_MAX`]
    pub fn new(data: DmxBuffer, timestamp: Instant, priority: u8) -> Self {
        Self {
            data,
            timestamp: Some(timestamp),
            priority: priority.min(SOURCE_PRIORITY_MAX),
        }
    }

    /// True once the source has been given data
    pub fn is_set(&self) -> bool {
        self.timestamp.is_some()
    }

    /// True if the source updated within [`Self::TIMEOUT_INTERVAL`] of `now`
    pub fn is_active(&self, now: Instant) -> bool {
        match self.timestamp {
            Some(timestamp) => timestamp + Self::TIMEOUT_INTERVAL > now,
            None => false,
        }
    }

    /// The slot data
    pub fn data(&self) -> &DmxBuffer {
        &self.data
    }

    /// When the data arrived
    pub fn timestamp(&self) -> Option<Instant> {
        self.timestamp
    }

    /// Source priority (0-200)
    pub fn priority(&self) -> u8 {
        self.priority
    }
}
