//! Completion brokers
//!
//! RDM completions arrive asynchronously, long after the request left. By
//! then the port that carried it may have been unpatched, or the client that
//! asked may have disconnected. Every RDM request therefore passes through a
//! [`Broker`], which wraps the completion so it only runs if its owner is
//! still registered. A completion for a deregistered owner is dropped along
//! with its payload and nothing is invoked.
//!
//! The same registry guards two owner kinds:
//!
//! - [`PortBroker`] sits between a universe and its output ports (and between
//!   input ports and the universe they forward into);
//! - [`ClientBroker`] sits between connected clients and universes.
//!
//! Registration must be removed before the owner itself goes away.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::debug;

use crate::owner::{Owner, OwnerId};
use crate::port::OutputPort;
use crate::rdm::{DiscoveryCallback, RdmCallback, RdmRequest};
use crate::universe::Universe;

/// The kind of owner a broker guards
pub trait OwnerKind {
    /// Name used in log output
    const NAME: &'static str;
}

/// Ports (input and output)
#[derive(Debug, Clone, Copy)]
pub struct PortKind;

impl OwnerKind for PortKind {
    const NAME: &'static str = "port";
}

/// Network clients
#[derive(Debug, Clone, Copy)]
pub struct ClientKind;

impl OwnerKind for ClientKind {
    const NAME: &'static str = "client";
}

/// Registry of live owners plus completion interception
///
/// Clones share one registry.
pub struct Broker<K: OwnerKind> {
    registry: Rc<RefCell<BTreeSet<OwnerId>>>,
    _kind: PhantomData<K>,
}

/// Broker guarding port completions
pub type PortBroker = Broker<PortKind>;
/// Broker guarding client completions
pub type ClientBroker = Broker<ClientKind>;

impl<K: OwnerKind> Broker<K> {
    /// An empty broker
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(BTreeSet::new())),
            _kind: PhantomData,
        }
    }

    /// Register an owner. Returns false if it was already registered.
    pub fn add_owner<O: Owner + ?Sized>(&self, owner: &O) -> bool {
        self.registry.borrow_mut().insert(owner.unique_id())
    }

    /// Deregister an owner. Completions still in flight for it are discarded
    /// when they arrive. Returns false if it was not registered.
    pub fn remove_owner<O: Owner + ?Sized>(&self, owner: &O) -> bool {
        self.remove_id(&owner.unique_id())
    }

    /// Deregister by identity
    pub fn remove_id(&self, id: &OwnerId) -> bool {
        self.registry.borrow_mut().remove(id)
    }

    /// True if `id` is registered
    pub fn contains(&self, id: &OwnerId) -> bool {
        self.registry.borrow().contains(id)
    }

    /// Number of registered owners
    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.registry.borrow().is_empty()
    }

    /// Wrap `callback` so it only runs while `owner` is registered
    ///
    /// The registration is checked when the completion arrives, not when it
    /// is wrapped.
    pub fn intercept<T: 'static>(
        &self,
        owner: OwnerId,
        callback: Box<dyn FnOnce(T)>,
    ) -> Box<dyn FnOnce(T)> {
        let registry = Rc::clone(&self.registry);
        Box::new(move |result| {
            let registered = registry.borrow().contains(&owner);
            if registered {
                callback(result);
            } else {
                debug!(kind = K::NAME, owner = %owner, "Owner deregistered, discarding completion");
                drop(result);
                drop(callback);
            }
        })
    }
}

impl<K: OwnerKind> Default for Broker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: OwnerKind> Clone for Broker<K> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
            _kind: PhantomData,
        }
    }
}

impl<K: OwnerKind> fmt::Debug for Broker<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("kind", &K::NAME)
            .field("owners", &self.len())
            .finish()
    }
}

impl Broker<PortKind> {
    /// Send an RDM request out of `port`
    pub fn send_rdm_request(
        &self,
        port: &Rc<dyn OutputPort>,
        request: RdmRequest,
        callback: RdmCallback,
    ) {
        let callback = self.intercept(port.unique_id(), callback);
        port.send_rdm_request(request, callback);
    }

    /// Run full or incremental discovery on `port`
    pub fn run_discovery(
        &self,
        port: &Rc<dyn OutputPort>,
        full: bool,
        callback: DiscoveryCallback,
    ) {
        let callback = self.intercept(port.unique_id(), callback);
        if full {
            port.run_full_discovery(callback);
        } else {
            port.run_incremental_discovery(callback);
        }
    }

    /// Forward a request that arrived on an input port into `universe`
    ///
    /// The reply only reaches `callback` while the input port is registered.
    pub fn forward_rdm_request<O: Owner + ?Sized>(
        &self,
        input_port: &O,
        universe: &Universe,
        request: RdmRequest,
        callback: RdmCallback,
    ) {
        let callback = self.intercept(input_port.unique_id(), callback);
        universe.send_rdm_request(request, callback);
    }
}

impl Broker<ClientKind> {
    /// Send a client's RDM request into `universe`
    pub fn send_rdm_request<O: Owner + ?Sized>(
        &self,
        client: &O,
        universe: &Universe,
        request: RdmRequest,
        callback: RdmCallback,
    ) {
        let callback = self.intercept(client.unique_id(), callback);
        universe.send_rdm_request(request, callback);
    }

    /// Run RDM discovery on `universe` for a client
    pub fn run_rdm_discovery<O: Owner + ?Sized>(
        &self,
        client: &O,
        universe: &mut Universe,
        full: bool,
        callback: DiscoveryCallback,
    ) {
        let callback = self.intercept(client.unique_id(), callback);
        universe.run_rdm_discovery(callback, full);
    }
}
