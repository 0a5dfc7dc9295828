//! Re-entrancy guard and FIFO for native triggers.
//!
//! Writing a signal from inside a callback can make some simulators fire
//! other callbacks synchronously. Those nested triggers are queued here and
//! run in arrival order after the current one returns, instead of recursing.

use std::collections::VecDeque;

use crate::callback::CallbackId;

/// Tracks whether a trigger is being processed and which are waiting.
#[derive(Default, Debug)]
pub(crate) struct Dispatcher {
    active: bool,
    queue: VecDeque<CallbackId>,
}

impl Dispatcher {
    /// Offers a trigger. Returns `true` if the caller must process it (and then
    /// drain the queue); `false` if it was queued behind the active one.
    pub(crate) fn enter(&mut self, id: CallbackId) -> bool {
        if self.active {
            self.queue.push_back(id);
            false
        } else {
            self.active = true;
            true
        }
    }

    /// Next queued trigger, or `None` after marking the dispatcher idle.
    pub(crate) fn next(&mut self) -> Option<CallbackId> {
        let next = self.queue.pop_front();
        if next.is_none() {
            self.active = false;
        }
        next
    }

    /// Drops queued triggers for a callback that has been removed.
    pub(crate) fn forget(&mut self, id: CallbackId) {
        self.queue.retain(|queued| *queued != id);
    }

    /// Discards everything after a fatal error. Returns how many triggers
    /// were dropped.
    pub(crate) fn abort(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.active = false;
        dropped
    }

    /// Returns `true` while a trigger is being processed.
    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    /// Number of queued triggers.
    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }
}
