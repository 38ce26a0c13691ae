//! Lumen Core - DMX512 merging and RDM routing
//!
//! This crate is the arbitration core of the Lumen lighting daemon:
//! - **Merging**: priority based LTP/HTP merge of input ports and network
//!   clients into one output per universe
//! - **RDM routing**: unicast routing by discovered UID, broadcast fan-out
//!   with exactly-once completion, discovery across every output port
//! - **Brokers**: completions for ports or clients that went away while a
//!   request was in flight are discarded, never run
//!
//! Everything runs on one thread. Completions that are known as soon as a
//! request is made are deferred through an [`Executor`] so they never run
//! on the caller's stack.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use lumen_core::{DmxBuffer, SystemClock, TaskQueue, UniverseContext, UniverseStore};
//!
//! let tasks = TaskQueue::new();
//! let context = UniverseContext::new(Rc::new(SystemClock), Rc::new(tasks.clone()));
//! let mut store = UniverseStore::new(context);
//!
//! let universe = store.get_or_create(1);
//! assert!(universe.set_dmx(&"255,128,0".parse::<DmxBuffer>().unwrap()));
//! assert_eq!(universe.get_dmx().to_string(), "255,128,0");
//! tasks.run_pending();
//! ```
//!
//! ## Modules
//!
//! - [`dmx`] - slot buffers and prioritised sources
//! - [`rdm`] - UIDs, requests, status codes, fan-out tracking
//! - [`universe`] - the merge and routing engine
//! - [`broker`] - owner registries guarding async completions
//! - [`store`] - universe lifecycle and housekeeping
//! - [`config`] - TOML configuration

#![allow(missing_docs)]

pub mod broker;
pub mod callback;
pub mod client;
pub mod clock;
pub mod config;
pub mod dmx;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod owner;
pub mod port;
pub mod rdm;
pub mod store;
pub mod universe;

pub use broker::{Broker, ClientBroker, ClientKind, OwnerKind, PortBroker, PortKind};
pub use callback::{GateGuard, MultiCallback};
pub use client::Client;
pub use clock::{Clock, MockClock, SystemClock};
pub use config::{HousekeepingConfig, LogConfig, LumenConfig, RdmConfig, UniverseSettings};
pub use dmx::{
    DmxBuffer, DmxSource, SOURCE_PRIORITY_DEFAULT, SOURCE_PRIORITY_MAX, SOURCE_PRIORITY_MIN,
};
pub use error::{CoreError, Result};
pub use executor::{Executor, Task, TaskQueue};
pub use metrics::{Counter, ExportMetrics, UniverseMetrics, Variable};
pub use owner::{Owner, OwnerId};
pub use port::{InputPort, OutputPort};
pub use rdm::{DiscoveryCallback, RdmCallback, RdmReply, RdmRequest, RdmStatusCode, Uid, UidSet};
pub use store::{HousekeepingReport, UniverseStore};
pub use universe::{MergeMode, Universe, UniverseContext};
