//! Edge-count scheduler.
//!
//! Engines often wait for "the N-th rising edge of `clk`" from many places at
//! once, while a backend handles one value-change subscription per signal
//! well. The scheduler keeps one [`EdgeTracker`] per signal with an
//! independent counter per edge class and fires each waiter when its class
//! counter reaches the target.
//!
//! The scheduler is pure bookkeeping: it returns which callbacks are due and
//! when the physical subscription should start or stop; the
//! [`Gpi`](crate::Gpi) context does the arming and running.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::callback::CallbackId;
use crate::handle::ObjectHandle;
use crate::value::Edge;

/// Counter and waiters for one edge class of one signal.
#[derive(Default, Debug)]
struct EdgeClass {
    count: u64,
    waiting: BTreeMap<u64, Vec<CallbackId>>,
}

impl EdgeClass {
    fn is_idle(&self) -> bool {
        self.waiting.is_empty()
    }
}

/// Edge bookkeeping for one signal.
#[derive(Debug)]
pub(crate) struct EdgeTracker {
    signal: Rc<ObjectHandle>,
    subscription: Option<CallbackId>,
    classes: [EdgeClass; 3],
    targets: HashMap<CallbackId, (Edge, u64)>,
}

impl EdgeTracker {
    fn new(signal: Rc<ObjectHandle>) -> Self {
        Self {
            signal,
            subscription: None,
            classes: Default::default(),
            targets: HashMap::new(),
        }
    }

    fn is_idle(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Whether adding a waiter requires a new physical subscription.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Tracking {
    /// First waiter on this signal; the caller must subscribe.
    Start,
    /// The signal is already tracked.
    Joined,
}

/// All edge trackers, keyed by the signal's fully-qualified name.
#[derive(Default, Debug)]
pub(crate) struct EdgeScheduler {
    trackers: HashMap<String, EdgeTracker>,
}

impl EdgeScheduler {
    /// Adds a waiter for the `count`-th `edge` from now. A count of zero waits
    /// for the next qualifying edge.
    pub(crate) fn add(
        &mut self,
        signal: &Rc<ObjectHandle>,
        edge: Edge,
        count: u32,
        id: CallbackId,
    ) -> Tracking {
        let key = signal.fullname().to_string();
        let mut tracking = Tracking::Joined;
        let tracker = self.trackers.entry(key).or_insert_with(|| {
            tracking = Tracking::Start;
            EdgeTracker::new(Rc::clone(signal))
        });
        if tracker.subscription.is_none() {
            tracking = Tracking::Start;
        }
        let class = &mut tracker.classes[edge.slot()];
        let target = class.count + u64::from(count.max(1));
        class.waiting.entry(target).or_default().push(id);
        tracker.targets.insert(id, (edge, target));
        tracking
    }

    /// Records the physical subscription created for a signal.
    pub(crate) fn set_subscription(&mut self, signal: &str, subscription: CallbackId) {
        if let Some(tracker) = self.trackers.get_mut(signal) {
            tracker.subscription = Some(subscription);
        }
    }

    /// Removes a waiter. Returns the subscription to cancel if the signal has
    /// no waiters left.
    pub(crate) fn remove(&mut self, signal: &str, id: CallbackId) -> Option<CallbackId> {
        let tracker = self.trackers.get_mut(signal)?;
        if let Some((edge, target)) = tracker.targets.remove(&id) {
            let class = &mut tracker.classes[edge.slot()];
            if let Some(ids) = class.waiting.get_mut(&target) {
                ids.retain(|w| *w != id);
                if ids.is_empty() {
                    class.waiting.remove(&target);
                }
            }
        }
        self.release_if_idle(signal)
    }

    /// Forgets an idle tracker and returns its subscription for cancelling.
    pub(crate) fn release_if_idle(&mut self, signal: &str) -> Option<CallbackId> {
        if self.trackers.get(signal).is_some_and(EdgeTracker::is_idle) {
            self.trackers.remove(signal).and_then(|t| t.subscription)
        } else {
            None
        }
    }

    /// Signal handle tracked under `signal`.
    pub(crate) fn signal(&self, signal: &str) -> Option<Rc<ObjectHandle>> {
        self.trackers.get(signal).map(|t| Rc::clone(&t.signal))
    }

    /// Applies one value change and returns the callbacks that are now due.
    ///
    /// Only classes with waiters advance. Due callbacks are removed from the
    /// tracker; the tracker itself is kept so the caller can check for
    /// idleness after running them.
    pub(crate) fn deliver(&mut self, signal: &str, new_value: &str) -> Vec<CallbackId> {
        let Some(tracker) = self.trackers.get_mut(signal) else {
            return Vec::new();
        };
        let mut due = Vec::new();
        for edge in Edge::implicated_by(new_value) {
            let class = &mut tracker.classes[edge.slot()];
            if class.is_idle() {
                continue;
            }
            class.count += 1;
            if let Some(ids) = class.waiting.remove(&class.count) {
                due.extend(ids);
            }
        }
        for id in &due {
            tracker.targets.remove(id);
        }
        due
    }

    /// Current counter of a class, for diagnostics and tests.
    pub(crate) fn count(&self, signal: &str, edge: Edge) -> Option<u64> {
        self.trackers
            .get(signal)
            .map(|t| t.classes[edge.slot()].count)
    }

    /// Returns `true` if `signal` is being tracked.
    #[cfg(test)]
    pub(crate) fn is_tracking(&self, signal: &str) -> bool {
        self.trackers.contains_key(signal)
    }
}
