//! Port capabilities the core relies on
//!
//! Device drivers live outside this crate. A driver exposes its ports by
//! implementing these traits; the universe only ever holds them as
//! `Rc<dyn InputPort>` / `Rc<dyn OutputPort>`. Methods take `&self`, so a
//! port that keeps state uses interior mutability.

use crate::dmx::{DmxBuffer, DmxSource};
use crate::owner::Owner;
use crate::rdm::{DiscoveryCallback, RdmCallback, RdmRequest};

/// A port receiving DMX from the outside world
pub trait InputPort: Owner {
    /// The data the port last received
    fn source_data(&self) -> DmxSource;
}

/// A port sending DMX and RDM to fixtures
pub trait OutputPort: Owner {
    /// Write merged data at `priority`
    fn write_dmx(&self, buffer: &DmxBuffer, priority: u8);

    /// Send an RDM request. The callback runs exactly once.
    fn send_rdm_request(&self, request: RdmRequest, callback: RdmCallback);

    /// Run full discovery. The callback runs exactly once with every UID found.
    fn run_full_discovery(&self, callback: DiscoveryCallback);

    /// Run incremental discovery. The callback runs exactly once.
    fn run_incremental_discovery(&self, callback: DiscoveryCallback);

    /// The universe this port is patched to was renamed
    fn universe_name_changed(&self, _name: &str) {}
}
