//! Fan-in of broadcast and discovery completions
//!
//! A broadcast RDM request is copied to every output port of a universe. The
//! [`CallbackTracker`] counts the per-port completions back down and runs the
//! caller's callback exactly once, after the last port has answered. How the
//! per-port statuses reduce to one depends on the request:
//!
//! - an ordinary broadcast reports [`RdmStatusCode::WasBroadcast`] unless some
//!   port reported something else, in which case the last such status wins;
//! - a discovery unique branch ranks `DubResponse > Timeout > anything else`
//!   and concatenates the raw frames from every port, since several
//!   responders colliding on different lines all need to reach the caller.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::command::{RdmCallback, RdmFrame, RdmReply, RdmRequest, RdmStatusCode};

/// How per-port replies reduce to one reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    /// Ordinary broadcast or vendorcast
    Broadcast,
    /// Discovery unique branch probe
    DiscoveryUniqueBranch,
}

impl AggregationPolicy {
    /// The policy a request needs
    pub fn for_request(request: &RdmRequest) -> Self {
        if request.is_dub() {
            Self::DiscoveryUniqueBranch
        } else {
            Self::Broadcast
        }
    }

    /// Status reported when no port contributed one
    ///
    /// A DUB with nobody listening has to read as "no response".
    pub fn empty_status(self) -> RdmStatusCode {
        match self {
            Self::Broadcast => RdmStatusCode::WasBroadcast,
            Self::DiscoveryUniqueBranch => RdmStatusCode::Timeout,
        }
    }

    fn reduce(self, current: Option<RdmStatusCode>, next: RdmStatusCode) -> Option<RdmStatusCode> {
        match self {
            Self::Broadcast => {
                if next == RdmStatusCode::WasBroadcast {
                    current
                } else {
                    Some(next)
                }
            }
            Self::DiscoveryUniqueBranch => match current {
                Some(current) if dub_rank(next) < dub_rank(current) => Some(current),
                _ => Some(next),
            },
        }
    }
}

fn dub_rank(status: RdmStatusCode) -> u8 {
    match status {
        RdmStatusCode::DubResponse => 2,
        RdmStatusCode::Timeout => 1,
        _ => 0,
    }
}

/// A finished fan-out, ready to hand to the caller
pub struct Completion {
    callback: RdmCallback,
    reply: RdmReply,
}

impl Completion {
    /// The aggregated reply
    pub fn reply(&self) -> &RdmReply {
        &self.reply
    }

    /// Hand the reply to the caller's callback
    pub fn run(self) {
        (self.callback)(self.reply);
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").field("reply", &self.reply).finish()
    }
}

/// Counts N asynchronous completions down to one result
///
/// The completion is released exactly once, when `current_count` reaches
/// `expected_count`. Callers run it outside any borrow of the tracker.
pub struct CallbackTracker {
    policy: AggregationPolicy,
    expected_count: usize,
    current_count: usize,
    status: Option<RdmStatusCode>,
    frames: Vec<RdmFrame>,
    completion: Option<RdmCallback>,
}

impl CallbackTracker {
    /// Track `expected_count` completions for `completion`
    pub fn new(expected_count: usize, policy: AggregationPolicy, completion: RdmCallback) -> Self {
        Self {
            policy,
            expected_count,
            current_count: 0,
            status: None,
            frames: Vec::new(),
            completion: Some(completion),
        }
    }

    /// Wrap the tracker for sharing between per-port completions
    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// Fold in one port's reply
    pub fn record(&mut self, reply: RdmReply) -> Option<Completion> {
        if self.completion.is_none() {
            tracing::debug!(status = %reply.status_code, "Reply after fan-out completed, dropping");
            return None;
        }

        self.current_count += 1;
        self.status = self.policy.reduce(self.status, reply.status_code);
        if self.policy == AggregationPolicy::DiscoveryUniqueBranch {
            self.frames.extend(reply.frames);
        }
        self.take_if_complete()
    }

    /// Count a port whose completion was discarded; it contributes nothing
    pub fn record_missing(&mut self) -> Option<Completion> {
        if self.completion.is_none() {
            return None;
        }
        self.current_count += 1;
        self.take_if_complete()
    }

    /// Release the completion if every expected reply is in
    ///
    /// With an expected count of 0 this releases immediately with the
    /// policy's empty status.
    pub fn take_if_complete(&mut self) -> Option<Completion> {
        if self.current_count < self.expected_count {
            return None;
        }
        let callback = self.completion.take()?;
        let status_code = self.status.unwrap_or_else(|| self.policy.empty_status());
        Some(Completion {
            callback,
            reply: RdmReply::with_frames(status_code, std::mem::take(&mut self.frames)),
        })
    }

    /// Aggregation policy in use
    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Replies expected
    pub fn expected_count(&self) -> usize {
        self.expected_count
    }

    /// Replies seen so far
    pub fn current_count(&self) -> usize {
        self.current_count
    }

    /// True once the completion has been released
    pub fn is_complete(&self) -> bool {
        self.completion.is_none()
    }
}

/// One port's share of a shared [`CallbackTracker`]
///
/// Records the port's reply on [`complete`](Self::complete). Dropped unused
/// (its owner went away mid-flight) it records a missing reply instead, so
/// the fan-out still finishes.
pub struct TrackerSlot {
    tracker: Option<Rc<RefCell<CallbackTracker>>>,
}

impl TrackerSlot {
    /// A slot on `tracker`
    pub fn new(tracker: &Rc<RefCell<CallbackTracker>>) -> Self {
        Self {
            tracker: Some(Rc::clone(tracker)),
        }
    }

    /// Record this port's reply
    pub fn complete(mut self, reply: RdmReply) {
        if let Some(tracker) = self.tracker.take() {
            let done = tracker.borrow_mut().record(reply);
            if let Some(completion) = done {
                completion.run();
            }
        }
    }

    /// The slot as a per-port RDM callback
    pub fn into_callback(self) -> RdmCallback {
        Box::new(move |reply| self.complete(reply))
    }
}

impl Drop for TrackerSlot {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            let done = tracker.borrow_mut().record_missing();
            if let Some(completion) = done {
                completion.run();
            }
        }
    }
}
