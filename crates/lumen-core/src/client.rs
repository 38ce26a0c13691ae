//! Network client capability
//!
//! A client is one connection from a controller application. It can act as a
//! source (pushing DMX into universes) and as a sink (receiving merged
//! output), per universe.

use crate::dmx::{DmxBuffer, DmxSource};
use crate::owner::Owner;

/// A connected client
pub trait Client: Owner {
    /// The data this client last sent for `universe_id`
    fn source_data(&self, universe_id: u32) -> DmxSource;

    /// Deliver merged output for `universe_id`. Returns false if the client
    /// could not accept it.
    fn send_dmx(&self, universe_id: u32, priority: u8, buffer: &DmxBuffer) -> bool;
}
