//! RDM routing and discovery for a universe
//!
//! Unicast requests go to the one output port whose last discovery reported
//! the destination UID. Broadcasts are copied to every output port and the
//! per-port completions are folded back together by a
//! [`CallbackTracker`]. Every port call goes through the port broker.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::callback::MultiCallback;
use crate::executor::CallScope;
use crate::metrics::Counter;
use crate::owner::OwnerId;
use crate::port::OutputPort;
use crate::rdm::{
    AggregationPolicy, CallbackTracker, DiscoveryCallback, RdmCallback, RdmReply, RdmRequest,
    RdmStatusCode, TrackerSlot, Uid, UidSet,
};

use super::Universe;

struct Route {
    owner: OwnerId,
    port: Rc<dyn OutputPort>,
}

#[derive(Default)]
struct RoutingState {
    attached: BTreeSet<OwnerId>,
    routes: BTreeMap<Uid, Route>,
}

/// UID to output port routing table
///
/// Shared between a universe and its in-flight discovery completions, so a
/// port that finishes discovery after the call returned can still update it.
/// Only ports currently attached to the universe may own routes.
#[derive(Clone, Default)]
pub(crate) struct UidTable {
    state: Rc<RefCell<RoutingState>>,
}

impl UidTable {
    pub fn attach(&self, port: &OwnerId) {
        self.state.borrow_mut().attached.insert(port.clone());
    }

    /// Detach a port and drop every UID that routed to it
    pub fn detach(&self, port: &OwnerId) {
        let mut state = self.state.borrow_mut();
        state.attached.remove(port);
        state.routes.retain(|_, route| route.owner != *port);
    }

    /// Replace the UIDs owned by `port` with `uids`
    ///
    /// A UID already owned by a different port moves to `port`. Returns
    /// false if the port is no longer attached, in which case nothing
    /// changes.
    pub fn update_port(&self, universe_id: u32, port: &Rc<dyn OutputPort>, uids: &UidSet) -> bool {
        let owner = port.unique_id();
        let mut state = self.state.borrow_mut();
        if !state.attached.contains(&owner) {
            debug!(
                universe = universe_id,
                port = %owner,
                "Discovery finished for a detached port, ignoring"
            );
            return false;
        }

        state
            .routes
            .retain(|uid, route| route.owner != owner || uids.contains(uid));

        for uid in uids {
            match state.routes.get(uid) {
                Some(route) if route.owner == owner => continue,
                Some(route) => {
                    warn!(
                        universe = universe_id,
                        uid = %uid,
                        previous = %route.owner,
                        port = %owner,
                        "UID seen on more than one port"
                    );
                }
                None => {}
            }
            state.routes.insert(
                *uid,
                Route {
                    owner: owner.clone(),
                    port: Rc::clone(port),
                },
            );
        }
        true
    }

    pub fn lookup(&self, uid: &Uid) -> Option<Rc<dyn OutputPort>> {
        self.state
            .borrow()
            .routes
            .get(uid)
            .map(|route| Rc::clone(&route.port))
    }

    pub fn owner_of(&self, uid: &Uid) -> Option<OwnerId> {
        self.state
            .borrow()
            .routes
            .get(uid)
            .map(|route| route.owner.clone())
    }

    pub fn uids(&self) -> UidSet {
        self.state.borrow().routes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().routes.len()
    }
}

impl Universe {
    /// Route an RDM request to the port(s) that should see it
    ///
    /// The callback always runs exactly once and never before this call
    /// returns, even when a port replies from inside its own send:
    ///
    /// - broadcast, no output ports: `WasBroadcast` (`Timeout` for a DUB);
    /// - broadcast: after every port has completed, aggregated;
    /// - unicast to a known UID: whatever the owning port reports;
    /// - unicast to an unknown UID: `UnknownUid`, no port is contacted.
    pub fn send_rdm_request(&self, request: RdmRequest, callback: RdmCallback) {
        debug!(
            universe = self.id,
            destination = %request.destination_uid,
            command_class = ?request.command_class,
            param_id = format_args!("{:#06x}", request.param_id),
            "Got RDM request"
        );
        if let Some(metrics) = &self.metrics {
            metrics.increment(self.id, Counter::RdmRequests);
        }

        let scope = CallScope::new(&self.executor);
        let callback = scope.defer(callback);
        let destination = request.destination_uid;
        if destination.is_broadcast() {
            let policy = AggregationPolicy::for_request(&request);
            if self.output_ports.is_empty() {
                self.complete_later(callback, policy.empty_status());
                return;
            }

            let tracker = CallbackTracker::new(self.output_ports.len(), policy, callback).shared();
            for port in &self.output_ports {
                let slot = TrackerSlot::new(&tracker);
                self.broker
                    .send_rdm_request(port, request.duplicate(), slot.into_callback());
            }
            return;
        }

        match self.routes.lookup(&destination) {
            Some(port) => self.broker.send_rdm_request(&port, request, callback),
            None => {
                warn!(
                    universe = self.id,
                    uid = %destination,
                    "Can't find UID in the output universe map, dropping request"
                );
                self.complete_later(callback, RdmStatusCode::UnknownUid);
            }
        }
    }

    /// Run discovery on every output port and report the merged UID set
    ///
    /// The port list is snapshotted up front; ports added mid-run are not
    /// asked. Each port's result replaces the UIDs it owned before. The
    /// callback receives the whole routing table once every port in the
    /// snapshot has reported (or had its completion discarded), and never
    /// before this call returns.
    pub fn run_rdm_discovery(&mut self, callback: DiscoveryCallback, full: bool) {
        info!(
            universe = self.id,
            kind = if full { "full" } else { "incremental" },
            "RDM discovery triggered"
        );
        self.last_discovery_time = Some(self.clock.now());

        let in_flight = self.discoveries_in_flight.get();
        if in_flight > 0 {
            debug!(universe = self.id, in_flight, "Discovery already running, starting another");
        }

        let scope = CallScope::new(&self.executor);
        let callback = scope.defer(callback);
        let ports = self.output_ports.clone();
        if ports.is_empty() {
            let routes = self.routes.clone();
            self.executor
                .execute(Box::new(move || callback(routes.uids())));
            return;
        }

        self.discoveries_in_flight.set(in_flight + 1);
        let routes = self.routes.clone();
        let counter = Rc::clone(&self.discoveries_in_flight);
        let gate = MultiCallback::new(ports.len(), move || {
            counter.set(counter.get().saturating_sub(1));
            callback(routes.uids());
        });

        for port in &ports {
            let guard = gate.guard();
            let routes = self.routes.clone();
            let metrics = self.metrics.clone();
            let universe_id = self.id;
            let owner = Rc::clone(port);
            self.broker.run_discovery(
                port,
                full,
                Box::new(move |uids| {
                    if routes.update_port(universe_id, &owner, &uids) {
                        if let Some(metrics) = &metrics {
                            let count = routes.len() as u64;
                            metrics.set_counter(universe_id, Counter::UidCount, count);
                        }
                    }
                    guard.signal();
                }),
            );
        }
    }

    /// Every UID currently routable in this universe
    pub fn uids(&self) -> UidSet {
        self.routes.uids()
    }

    /// Number of routable UIDs
    pub fn uid_count(&self) -> usize {
        self.routes.len()
    }

    /// The output port a UID routes to
    pub fn port_for_uid(&self, uid: &Uid) -> Option<OwnerId> {
        self.routes.owner_of(uid)
    }

    fn complete_later(&self, callback: RdmCallback, status: RdmStatusCode) {
        self.executor
            .execute(Box::new(move || callback(RdmReply::from_status(status))));
    }
}
