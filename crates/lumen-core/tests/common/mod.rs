//! Shared mocks for the integration tests
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use lumen_core::rdm::{DiscoveryCallback, RdmCallback, RdmReply, RdmRequest, RdmStatusCode};
use lumen_core::{
    Client, Clock, DmxBuffer, DmxSource, ExportMetrics, InputPort, MockClock, OutputPort, Owner,
    OwnerId, TaskQueue, Uid, UidSet, Universe, UniverseContext, UniverseStore,
};

pub const TEST_UNIVERSE: u32 = 1;

/// Clock, task queue and metrics wired into a context
pub struct Harness {
    pub clock: Rc<MockClock>,
    pub tasks: TaskQueue,
    pub metrics: Rc<ExportMetrics>,
    pub context: UniverseContext,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Rc::new(MockClock::new());
        let tasks = TaskQueue::new();
        let metrics = Rc::new(ExportMetrics::new());
        let context = UniverseContext::new(clock.clone(), Rc::new(tasks.clone()))
            .with_metrics(metrics.clone());
        Self {
            clock,
            tasks,
            metrics,
            context,
        }
    }

    pub fn universe(&self, id: u32) -> Universe {
        Universe::new(id, &self.context)
    }

    pub fn store(&self) -> UniverseStore {
        UniverseStore::new(self.context.clone())
    }

    /// Move the clock on so the next source is strictly newer
    pub fn tick(&self) {
        self.clock.advance(Duration::from_millis(10));
    }
}

pub fn buffer(data: &str) -> DmxBuffer {
    data.parse().expect("valid DMX test data")
}

/// Input port whose data the test sets directly
pub struct MockInputPort {
    id: OwnerId,
    source: RefCell<DmxSource>,
}

impl MockInputPort {
    pub fn new(id: &str) -> Rc<Self> {
        Rc::new(Self {
            id: OwnerId::from(id),
            source: RefCell::new(DmxSource::default()),
        })
    }

    pub fn id(&self) -> OwnerId {
        self.id.clone()
    }

    /// Receive `data` now at `priority`
    pub fn receive(&self, clock: &MockClock, data: &str, priority: u8) {
        *self.source.borrow_mut() = DmxSource::new(buffer(data), clock.now(), priority);
    }
}

impl Owner for MockInputPort {
    fn unique_id(&self) -> OwnerId {
        self.id.clone()
    }
}

impl InputPort for MockInputPort {
    fn source_data(&self) -> DmxSource {
        self.source.borrow().clone()
    }
}

/// Output port recording writes and holding RDM completions until the test
/// releases them
pub struct MockOutputPort {
    id: OwnerId,
    pub writes: RefCell<Vec<(DmxBuffer, u8)>>,
    pub names: RefCell<Vec<String>>,
    pub requests: RefCell<Vec<RdmRequest>>,
    pending_rdm: RefCell<VecDeque<RdmCallback>>,
    pending_discovery: RefCell<VecDeque<(bool, DiscoveryCallback)>>,
    auto_reply: RefCell<Option<RdmReply>>,
    responders: RefCell<UidSet>,
    pub discovery_runs: Cell<usize>,
}

impl MockOutputPort {
    pub fn new(id: &str) -> Rc<Self> {
        Rc::new(Self {
            id: OwnerId::from(id),
            writes: RefCell::new(Vec::new()),
            names: RefCell::new(Vec::new()),
            requests: RefCell::new(Vec::new()),
            pending_rdm: RefCell::new(VecDeque::new()),
            pending_discovery: RefCell::new(VecDeque::new()),
            auto_reply: RefCell::new(None),
            responders: RefCell::new(UidSet::new()),
            discovery_runs: Cell::new(0),
        })
    }

    pub fn id(&self) -> OwnerId {
        self.id.clone()
    }

    /// Complete every RDM request immediately with `reply`
    pub fn reply_immediately(&self, reply: RdmReply) {
        *self.auto_reply.borrow_mut() = Some(reply);
    }

    /// Responders the next discovery run will find
    pub fn set_responders(&self, uids: &[Uid]) {
        *self.responders.borrow_mut() = uids.iter().copied().collect();
    }

    pub fn last_write(&self) -> Option<(DmxBuffer, u8)> {
        self.writes.borrow().last().cloned()
    }

    pub fn pending_rdm_count(&self) -> usize {
        self.pending_rdm.borrow().len()
    }

    pub fn pending_discovery_count(&self) -> usize {
        self.pending_discovery.borrow().len()
    }

    /// Complete the oldest outstanding RDM request
    pub fn complete_rdm(&self, reply: RdmReply) {
        let callback = self.pending_rdm.borrow_mut().pop_front();
        if let Some(callback) = callback {
            callback(reply);
        }
    }

    /// Complete the oldest outstanding RDM request with just a status
    pub fn complete_rdm_status(&self, status: RdmStatusCode) {
        self.complete_rdm(RdmReply::from_status(status));
    }

    /// Drop the oldest outstanding RDM completion without running it
    pub fn lose_rdm(&self) {
        let callback = self.pending_rdm.borrow_mut().pop_front();
        drop(callback);
    }

    /// Finish the oldest discovery run with the configured responders.
    /// Returns whether the run was a full discovery.
    pub fn complete_discovery(&self) -> Option<bool> {
        let pending = self.pending_discovery.borrow_mut().pop_front();
        let uids = self.responders.borrow().clone();
        pending.map(|(full, callback)| {
            callback(uids);
            full
        })
    }
}

impl Owner for MockOutputPort {
    fn unique_id(&self) -> OwnerId {
        self.id.clone()
    }
}

impl OutputPort for MockOutputPort {
    fn write_dmx(&self, buffer: &DmxBuffer, priority: u8) {
        self.writes.borrow_mut().push((buffer.clone(), priority));
    }

    fn send_rdm_request(&self, request: RdmRequest, callback: RdmCallback) {
        self.requests.borrow_mut().push(request);
        let auto = self.auto_reply.borrow().clone();
        match auto {
            Some(reply) => callback(reply),
            None => self.pending_rdm.borrow_mut().push_back(callback),
        }
    }

    fn run_full_discovery(&self, callback: DiscoveryCallback) {
        self.discovery_runs.set(self.discovery_runs.get() + 1);
        self.pending_discovery.borrow_mut().push_back((true, callback));
    }

    fn run_incremental_discovery(&self, callback: DiscoveryCallback) {
        self.discovery_runs.set(self.discovery_runs.get() + 1);
        self.pending_discovery.borrow_mut().push_back((false, callback));
    }

    fn universe_name_changed(&self, name: &str) {
        self.names.borrow_mut().push(name.to_string());
    }
}

/// Network client with per-universe source data and a record of output
pub struct MockClient {
    id: OwnerId,
    sources: RefCell<BTreeMap<u32, DmxSource>>,
    pub received: RefCell<Vec<(u32, u8, DmxBuffer)>>,
}

impl MockClient {
    pub fn new(id: &str) -> Rc<Self> {
        Rc::new(Self {
            id: OwnerId::from(id),
            sources: RefCell::new(BTreeMap::new()),
            received: RefCell::new(Vec::new()),
        })
    }

    pub fn id(&self) -> OwnerId {
        self.id.clone()
    }

    /// Send `data` for `universe` now at `priority`
    pub fn send(&self, clock: &MockClock, universe: u32, data: &str, priority: u8) {
        self.sources
            .borrow_mut()
            .insert(universe, DmxSource::new(buffer(data), clock.now(), priority));
    }
}

impl Owner for MockClient {
    fn unique_id(&self) -> OwnerId {
        self.id.clone()
    }
}

impl Client for MockClient {
    fn source_data(&self, universe_id: u32) -> DmxSource {
        self.sources
            .borrow()
            .get(&universe_id)
            .cloned()
            .unwrap_or_default()
    }

    fn send_dmx(&self, universe_id: u32, priority: u8, buffer: &DmxBuffer) -> bool {
        self.received
            .borrow_mut()
            .push((universe_id, priority, buffer.clone()));
        true
    }
}

/// An RDM callback that records what it receives
pub fn rdm_recorder() -> (Rc<RefCell<Vec<RdmReply>>>, RdmCallback) {
    let replies = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&replies);
    (replies, Box::new(move |reply| sink.borrow_mut().push(reply)))
}

/// A discovery callback that records what it receives
pub fn discovery_recorder() -> (Rc<RefCell<Vec<UidSet>>>, DiscoveryCallback) {
    let results = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&results);
    (results, Box::new(move |uids| sink.borrow_mut().push(uids)))
}

pub fn uid_set(uids: &[Uid]) -> UidSet {
    uids.iter().copied().collect()
}
