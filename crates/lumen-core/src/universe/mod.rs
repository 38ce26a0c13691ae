//! Universe - DMX merging and RDM routing for one 512 slot bus
//!
//! A [`Universe`] owns the patched input ports, output ports and clients of
//! one universe id. Whenever an input port or source client reports new
//! data, the universe re-runs the priority merge and, if the output changed,
//! pushes the result to every output port and sink client.
//!
//! # Merging
//!
//! Sources below the highest live priority are ignored. Ties at the highest
//! priority are resolved by the [`MergeMode`]:
//!
//! - **LTP**: the newest source wins; an update older than another tied
//!   source is dropped.
//! - **HTP**: per slot maximum across all tied sources.
//!
//! # Liveness
//!
//! A source that has not updated for [`DmxSource::TIMEOUT_INTERVAL`] stops
//! taking part. Source clients that stop calling
//! [`source_client_data_changed`](Universe::source_client_data_changed)
//! are evicted by [`clean_stale_source_clients`](Universe::clean_stale_source_clients)
//! after two sweeps.
//!
//! [`DmxSource::TIMEOUT_INTERVAL`]: crate::dmx::DmxSource::TIMEOUT_INTERVAL

mod merge;
mod routing;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::broker::PortBroker;
use crate::client::Client;
use crate::clock::Clock;
use crate::dmx::{DmxBuffer, SOURCE_PRIORITY_MIN};
use crate::error::CoreError;
use crate::executor::Executor;
use crate::metrics::{Counter, UniverseMetrics, Variable};
use crate::owner::OwnerId;
use crate::port::{InputPort, OutputPort};

use merge::{merge_sources, MergeOutcome, SourceKey};
use routing::UidTable;

/// How sources tied at the same priority are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Latest takes precedence
    #[default]
    Ltp,
    /// Highest takes precedence
    Htp,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ltp => f.write_str("LTP"),
            Self::Htp => f.write_str("HTP"),
        }
    }
}

impl FromStr for MergeMode {
    type Err = CoreError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ltp" => Ok(Self::Ltp),
            "htp" => Ok(Self::Htp),
            _ => Err(CoreError::InvalidMergeMode(s.to_string())),
        }
    }
}

/// Universe ids waiting to be garbage collected
pub(crate) type CollectionQueue = Rc<RefCell<BTreeSet<u32>>>;

/// Collaborators every universe needs
///
/// Cheap to clone; a store hands one clone to each universe it creates.
#[derive(Clone)]
pub struct UniverseContext {
    clock: Rc<dyn Clock>,
    executor: Rc<dyn Executor>,
    broker: PortBroker,
    metrics: Option<Rc<dyn UniverseMetrics>>,
    collection: CollectionQueue,
}

impl UniverseContext {
    /// A context with a fresh port broker and no metrics
    pub fn new(clock: Rc<dyn Clock>, executor: Rc<dyn Executor>) -> Self {
        Self {
            clock,
            executor,
            broker: PortBroker::new(),
            metrics: None,
            collection: CollectionQueue::default(),
        }
    }

    /// Use an existing port broker
    pub fn with_broker(mut self, broker: PortBroker) -> Self {
        self.broker = broker;
        self
    }

    /// Report metrics to `metrics`
    pub fn with_metrics(mut self, metrics: Rc<dyn UniverseMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The port broker RDM traffic goes through
    pub fn broker(&self) -> &PortBroker {
        &self.broker
    }

    /// The clock universes read
    pub fn clock(&self) -> &Rc<dyn Clock> {
        &self.clock
    }

    /// Universes that went idle since the last collection
    pub fn pending_collection(&self) -> BTreeSet<u32> {
        self.collection.borrow().clone()
    }

    pub(crate) fn collection(&self) -> &CollectionQueue {
        &self.collection
    }
}

impl fmt::Debug for UniverseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniverseContext")
            .field("broker", &self.broker)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

struct SourceClient {
    client: Rc<dyn Client>,
    stale: bool,
}

/// One DMX universe
pub struct Universe {
    id: u32,
    name: String,
    merge_mode: MergeMode,
    buffer: DmxBuffer,
    active_priority: u8,
    input_ports: Vec<Rc<dyn InputPort>>,
    output_ports: Vec<Rc<dyn OutputPort>>,
    source_clients: BTreeMap<OwnerId, SourceClient>,
    sink_clients: BTreeMap<OwnerId, Rc<dyn Client>>,
    routes: UidTable,
    transaction_number: u8,
    last_discovery_time: Option<Instant>,
    discovery_interval: Duration,
    discoveries_in_flight: Rc<Cell<usize>>,
    clock: Rc<dyn Clock>,
    executor: Rc<dyn Executor>,
    broker: PortBroker,
    metrics: Option<Rc<dyn UniverseMetrics>>,
    collection: CollectionQueue,
}

impl Universe {
    /// Create universe `id`, named "Universe {id}", merging LTP
    pub fn new(id: u32, context: &UniverseContext) -> Self {
        let universe = Self {
            id,
            name: format!("Universe {}", id),
            merge_mode: MergeMode::default(),
            buffer: DmxBuffer::new(),
            active_priority: SOURCE_PRIORITY_MIN,
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            source_clients: BTreeMap::new(),
            sink_clients: BTreeMap::new(),
            routes: UidTable::default(),
            transaction_number: 0,
            last_discovery_time: None,
            discovery_interval: Duration::ZERO,
            discoveries_in_flight: Rc::new(Cell::new(0)),
            clock: Rc::clone(&context.clock),
            executor: Rc::clone(&context.executor),
            broker: context.broker.clone(),
            metrics: context.metrics.clone(),
            collection: Rc::clone(&context.collection),
        };

        if let Some(metrics) = &universe.metrics {
            for counter in [
                Counter::DmxFrames,
                Counter::InputPorts,
                Counter::OutputPorts,
                Counter::RdmRequests,
                Counter::SinkClients,
                Counter::SourceClients,
                Counter::UidCount,
            ] {
                metrics.set_counter(id, counter, 0);
            }
            metrics.set_variable(id, Variable::Name, &universe.name);
            metrics.set_variable(id, Variable::MergeMode, &universe.merge_mode.to_string());
        }
        universe
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the universe and tell every output port
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        if let Some(metrics) = &self.metrics {
            metrics.set_variable(self.id, Variable::Name, &self.name);
        }
        for port in &self.output_ports {
            port.universe_name_changed(&self.name);
        }
    }

    pub fn merge_mode(&self) -> MergeMode {
        self.merge_mode
    }

    pub fn set_merge_mode(&mut self, merge_mode: MergeMode) {
        self.merge_mode = merge_mode;
        if let Some(metrics) = &self.metrics {
            metrics.set_variable(self.id, Variable::MergeMode, &merge_mode.to_string());
        }
    }

    /// The current output
    pub fn get_dmx(&self) -> &DmxBuffer {
        &self.buffer
    }

    /// Priority the current output was merged at
    pub fn active_priority(&self) -> u8 {
        self.active_priority
    }

    /// True while anything is patched or connected
    pub fn is_active(&self) -> bool {
        !(self.input_ports.is_empty()
            && self.output_ports.is_empty()
            && self.source_clients.is_empty()
            && self.sink_clients.is_empty())
    }

    /// The next RDM transaction number for requests originating here
    pub fn next_rdm_transaction_number(&mut self) -> u8 {
        let number = self.transaction_number;
        self.transaction_number = self.transaction_number.wrapping_add(1);
        number
    }

    /// Period between automatic incremental discoveries; zero disables them
    pub fn rdm_discovery_interval(&self) -> Duration {
        self.discovery_interval
    }

    pub fn set_rdm_discovery_interval(&mut self, interval: Duration) {
        self.discovery_interval = interval;
    }

    /// When discovery last started, if ever
    pub fn last_discovery_time(&self) -> Option<Instant> {
        self.last_discovery_time
    }

    /// True if periodic discovery is enabled and the interval has elapsed
    pub fn discovery_due(&self, now: Instant) -> bool {
        if self.discovery_interval.is_zero() || self.output_ports.is_empty() {
            return false;
        }
        match self.last_discovery_time {
            Some(last) => now.saturating_duration_since(last) >= self.discovery_interval,
            None => true,
        }
    }

    // Ports

    /// Patch an input port and register it with the port broker. Returns
    /// false if it is already patched.
    pub fn add_input_port(&mut self, port: Rc<dyn InputPort>) -> bool {
        let id = port.unique_id();
        if self.contains_input_port(&id) {
            debug!(universe = self.id, port = %id, "Input port already patched");
            return false;
        }
        self.broker.add_owner(&*port);
        self.input_ports.push(port);
        self.set_counter(Counter::InputPorts, self.input_ports.len());
        info!(universe = self.id, port = %id, "Added input port");
        true
    }

    /// Unpatch an input port. Completions still in flight for it are
    /// discarded. Returns false if it was not patched.
    pub fn remove_input_port(&mut self, id: &OwnerId) -> bool {
        let Some(index) = self.input_ports.iter().position(|p| p.unique_id() == *id) else {
            debug!(universe = self.id, port = %id, "Could not find input port");
            return false;
        };
        self.broker.remove_id(id);
        self.input_ports.remove(index);
        self.set_counter(Counter::InputPorts, self.input_ports.len());
        info!(universe = self.id, port = %id, "Removed input port");
        self.mark_if_idle();
        true
    }

    pub fn contains_input_port(&self, id: &OwnerId) -> bool {
        self.input_ports.iter().any(|p| p.unique_id() == *id)
    }

    pub fn input_ports(&self) -> &[Rc<dyn InputPort>] {
        &self.input_ports
    }

    pub fn input_port_count(&self) -> usize {
        self.input_ports.len()
    }

    /// Patch an output port and register it with the port broker. Returns
    /// false if it is already patched.
    pub fn add_output_port(&mut self, port: Rc<dyn OutputPort>) -> bool {
        let id = port.unique_id();
        if self.contains_output_port(&id) {
            debug!(universe = self.id, port = %id, "Output port already patched");
            return false;
        }
        self.broker.add_owner(&*port);
        self.routes.attach(&id);
        self.output_ports.push(port);
        self.set_counter(Counter::OutputPorts, self.output_ports.len());
        info!(universe = self.id, port = %id, "Added output port");
        true
    }

    /// Unpatch an output port and forget every UID routed through it.
    /// Completions still in flight for it are discarded. Returns false if it
    /// was not patched.
    pub fn remove_output_port(&mut self, id: &OwnerId) -> bool {
        let Some(index) = self.output_ports.iter().position(|p| p.unique_id() == *id) else {
            debug!(universe = self.id, port = %id, "Could not find output port");
            return false;
        };
        self.broker.remove_id(id);
        self.output_ports.remove(index);
        self.routes.detach(id);
        self.set_counter(Counter::OutputPorts, self.output_ports.len());
        self.set_counter(Counter::UidCount, self.routes.len());
        info!(universe = self.id, port = %id, "Removed output port");
        self.mark_if_idle();
        true
    }

    pub fn contains_output_port(&self, id: &OwnerId) -> bool {
        self.output_ports.iter().any(|p| p.unique_id() == *id)
    }

    pub fn output_ports(&self) -> &[Rc<dyn OutputPort>] {
        &self.output_ports
    }

    pub fn output_port_count(&self) -> usize {
        self.output_ports.len()
    }

    // Clients

    /// Add a source client. Returns false if it was already a source.
    ///
    /// Either way the client counts as seen for the current sweep.
    pub fn add_source_client(&mut self, client: Rc<dyn Client>) -> bool {
        let id = client.unique_id();
        if let Some(entry) = self.source_clients.get_mut(&id) {
            entry.stale = false;
            return false;
        }
        self.source_clients
            .insert(id.clone(), SourceClient { client, stale: false });
        self.set_counter(Counter::SourceClients, self.source_clients.len());
        info!(universe = self.id, client = %id, "Added source client");
        true
    }

    /// Remove a source client. Returns false if it was not a source.
    pub fn remove_source_client(&mut self, id: &OwnerId) -> bool {
        if self.source_clients.remove(id).is_none() {
            return false;
        }
        self.set_counter(Counter::SourceClients, self.source_clients.len());
        info!(universe = self.id, client = %id, "Removed source client");
        self.mark_if_idle();
        true
    }

    pub fn contains_source_client(&self, id: &OwnerId) -> bool {
        self.source_clients.contains_key(id)
    }

    pub fn source_client_count(&self) -> usize {
        self.source_clients.len()
    }

    /// Add a sink client. Returns false if it was already a sink.
    pub fn add_sink_client(&mut self, client: Rc<dyn Client>) -> bool {
        let id = client.unique_id();
        if self.sink_clients.contains_key(&id) {
            return false;
        }
        self.sink_clients.insert(id.clone(), client);
        self.set_counter(Counter::SinkClients, self.sink_clients.len());
        info!(universe = self.id, client = %id, "Added sink client");
        true
    }

    /// Remove a sink client. Returns false if it was not a sink.
    pub fn remove_sink_client(&mut self, id: &OwnerId) -> bool {
        if self.sink_clients.remove(id).is_none() {
            return false;
        }
        self.set_counter(Counter::SinkClients, self.sink_clients.len());
        info!(universe = self.id, client = %id, "Removed sink client");
        self.mark_if_idle();
        true
    }

    pub fn contains_sink_client(&self, id: &OwnerId) -> bool {
        self.sink_clients.contains_key(id)
    }

    pub fn sink_client_count(&self) -> usize {
        self.sink_clients.len()
    }

    // DMX

    /// Force the output to `buffer` and push it to dependants
    ///
    /// The next merge overrides it. An empty buffer is ignored.
    pub fn set_dmx(&mut self, buffer: &DmxBuffer) -> bool {
        if buffer.is_empty() {
            info!(universe = self.id, "Trying to SetDMX with a 0 length buffer");
            return true;
        }
        self.buffer.set(buffer);
        self.update_dependants()
    }

    /// An input port has new data. Returns false if the port is not patched
    /// here.
    pub fn port_data_changed(&mut self, id: &OwnerId) -> bool {
        if !self.contains_input_port(id) {
            info!(
                universe = self.id,
                port = %id,
                "Trying to update a port which isn't bound to this universe"
            );
            return false;
        }
        if self.merge_all(&SourceKey::Port(id.clone())) {
            self.update_dependants();
        }
        true
    }

    /// A client has new data for this universe
    ///
    /// Adds the client as a source on first use and marks it seen for the
    /// current sweep.
    pub fn source_client_data_changed(&mut self, client: Rc<dyn Client>) -> bool {
        let id = client.unique_id();
        self.add_source_client(client);
        if self.merge_all(&SourceKey::Client(id)) {
            self.update_dependants();
        }
        true
    }

    /// Mark-and-sweep over source clients
    ///
    /// Clients not seen since the previous sweep are removed; the rest are
    /// marked, to be removed next time unless they send data first.
    pub fn clean_stale_source_clients(&mut self) {
        let stale: Vec<OwnerId> = self
            .source_clients
            .iter()
            .filter(|(_, entry)| entry.stale)
            .map(|(id, _)| id.clone())
            .collect();

        for id in stale {
            info!(universe = self.id, client = %id, "Removing stale source client");
            self.remove_source_client(&id);
        }
        for entry in self.source_clients.values_mut() {
            entry.stale = true;
        }
    }

    fn merge_all(&mut self, changed: &SourceKey) -> bool {
        let now = self.clock.now();
        let mut sources = Vec::with_capacity(self.input_ports.len() + self.source_clients.len());
        for port in &self.input_ports {
            sources.push((SourceKey::Port(port.unique_id()), port.source_data()));
        }
        for (id, entry) in &self.source_clients {
            sources.push((SourceKey::Client(id.clone()), entry.client.source_data(self.id)));
        }

        let result = merge_sources(sources, changed, self.merge_mode, now, &mut self.buffer);
        self.active_priority = result.active_priority;
        if result.outcome == MergeOutcome::NoActiveSources {
            warn!(universe = self.id, "Something changed but we didn't find any active sources");
        }
        result.changed()
    }

    fn update_dependants(&self) -> bool {
        for port in &self.output_ports {
            port.write_dmx(&self.buffer, self.active_priority);
        }
        for client in self.sink_clients.values() {
            client.send_dmx(self.id, self.active_priority, &self.buffer);
        }
        if let Some(metrics) = &self.metrics {
            metrics.increment(self.id, Counter::DmxFrames);
        }
        true
    }

    fn set_counter(&self, counter: Counter, value: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.set_counter(self.id, counter, value as u64);
        }
    }

    fn mark_if_idle(&self) {
        if !self.is_active() {
            debug!(universe = self.id, "Universe idle, queued for collection");
            self.collection.borrow_mut().insert(self.id);
        }
    }
}

impl Drop for Universe {
    fn drop(&mut self) {
        for port in &self.input_ports {
            self.broker.remove_id(&port.unique_id());
        }
        for port in &self.output_ports {
            self.broker.remove_id(&port.unique_id());
        }
        if let Some(metrics) = &self.metrics {
            metrics.remove_universe(self.id);
        }
    }
}

impl fmt::Debug for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Universe")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("merge_mode", &self.merge_mode)
            .field("active_priority", &self.active_priority)
            .field("input_ports", &self.input_ports.len())
            .field("output_ports", &self.output_ports.len())
            .field("source_clients", &self.source_clients.len())
            .field("sink_clients", &self.sink_clients.len())
            .field("uids", &self.routes.len())
            .finish()
    }
}
