//! RDM addressing, requests and fan-out accounting

pub mod command;
pub mod tracker;
pub mod uid;

pub use command::{
    CommandClass, DiscoveryCallback, RdmCallback, RdmFrame, RdmReply, RdmRequest, RdmResponse,
    RdmStatusCode, PID_DISC_MUTE, PID_DISC_UNIQUE_BRANCH, PID_DISC_UN_MUTE,
};
pub use tracker::{AggregationPolicy, CallbackTracker, Completion, TrackerSlot};
pub use uid::{Uid, UidSet};
