//! Per-universe diagnostic counters
//!
//! Universes report through an injected [`UniverseMetrics`] sink rather
//! than a process-wide map. [`ExportMetrics`] is the in-memory sink the
//! daemon uses; its [`snapshot`](ExportMetrics::snapshot) is what a status
//! page would render.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Numeric per-universe metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Counter {
    /// Merged frames pushed to dependants
    DmxFrames,
    /// Patched input ports
    InputPorts,
    /// Patched output ports
    OutputPorts,
    /// RDM requests routed
    RdmRequests,
    /// Clients receiving output
    SinkClients,
    /// Clients sending data
    SourceClients,
    /// Responders in the routing table
    UidCount,
}

impl Counter {
    /// Exported name
    pub fn name(self) -> &'static str {
        match self {
            Self::DmxFrames => "universe-dmx-frames",
            Self::InputPorts => "universe-input-ports",
            Self::OutputPorts => "universe-output-ports",
            Self::RdmRequests => "universe-rdm-requests",
            Self::SinkClients => "universe-sink-clients",
            Self::SourceClients => "universe-source-clients",
            Self::UidCount => "universe-uids",
        }
    }
}

/// Textual per-universe metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variable {
    /// Universe name
    Name,
    /// Current merge mode
    MergeMode,
}

impl Variable {
    /// Exported name
    pub fn name(self) -> &'static str {
        match self {
            Self::Name => "universe-name",
            Self::MergeMode => "universe-mode",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sink for universe metrics
pub trait UniverseMetrics {
    /// Add one to a counter
    fn increment(&self, universe: u32, counter: Counter);

    /// Overwrite a counter
    fn set_counter(&self, universe: u32, counter: Counter, value: u64);

    /// Overwrite a text variable
    fn set_variable(&self, universe: u32, variable: Variable, value: &str);

    /// Forget everything recorded for `universe`
    fn remove_universe(&self, universe: u32);
}

/// In-memory metrics store
#[derive(Debug, Default)]
pub struct ExportMetrics {
    counters: RefCell<BTreeMap<(u32, Counter), u64>>,
    variables: RefCell<BTreeMap<(u32, Variable), String>>,
}

impl ExportMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, if it was ever set
    pub fn counter(&self, universe: u32, counter: Counter) -> Option<u64> {
        self.counters.borrow().get(&(universe, counter)).copied()
    }

    /// Current value of a variable, if it was ever set
    pub fn variable(&self, universe: u32, variable: Variable) -> Option<String> {
        self.variables.borrow().get(&(universe, variable)).cloned()
    }

    /// Every metric as `name[universe] -> value`
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for ((universe, counter), value) in self.counters.borrow().iter() {
            out.insert(format!("{}[{}]", counter, universe), value.to_string());
        }
        for ((universe, variable), value) in self.variables.borrow().iter() {
            out.insert(format!("{}[{}]", variable, universe), value.clone());
        }
        out
    }
}

impl UniverseMetrics for ExportMetrics {
    fn increment(&self, universe: u32, counter: Counter) {
        *self
            .counters
            .borrow_mut()
            .entry((universe, counter))
            .or_insert(0) += 1;
    }

    fn set_counter(&self, universe: u32, counter: Counter, value: u64) {
        self.counters.borrow_mut().insert((universe, counter), value);
    }

    fn set_variable(&self, universe: u32, variable: Variable, value: &str) {
        self.variables
            .borrow_mut()
            .insert((universe, variable), value.to_string());
    }

    fn remove_universe(&self, universe: u32) {
        self.counters.borrow_mut().retain(|(u, _), _| *u != universe);
        self.variables.borrow_mut().retain(|(u, _), _| *u != universe);
    }
}
