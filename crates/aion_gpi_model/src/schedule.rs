//! Native callback registrations and the timed event queue.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use aion_gpi::{CallbackId, NativeCallback};

/// A scheduling region within one time step.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) enum Phase {
    /// Start of a new time step.
    NextTime,
    /// After timed events; values may still be written.
    ReadWrite,
    /// End of the time step; values are stable.
    ReadOnly,
    /// Simulation start.
    Startup,
    /// Simulation end.
    Shutdown,
}

impl Phase {
    /// Whether a registration in this phase stays after it fires.
    fn is_recurring(self) -> bool {
        matches!(self, Phase::NextTime | Phase::ReadWrite | Phase::ReadOnly)
    }
}

/// What a registration waits for.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Trigger {
    /// A timed one-shot at an absolute tick.
    At(u64),
    /// A phase of every (or the first/last) time step.
    Phase(Phase),
    /// Any change of the value of a node.
    Change(usize),
}

#[derive(Debug)]
struct Registration {
    id: CallbackId,
    trigger: Trigger,
}

/// A timed event in the queue, ordered by time then by insertion.
#[derive(Debug)]
struct TimedEvent {
    time: u64,
    seq: u64,
    native: u64,
}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimedEvent {}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}

/// Live registrations, in registration order, plus the timed queue.
///
/// Deregistered timed events stay in the heap and are skipped when popped,
/// until they make up half of it; then the heap is compacted.
#[derive(Debug, Default)]
pub(crate) struct Schedule {
    now: u64,
    next_native: u64,
    seq: u64,
    live: BTreeMap<u64, Registration>,
    queue: BinaryHeap<Reverse<TimedEvent>>,
    dead: usize,
}

impl Schedule {
    pub(crate) fn now(&self) -> u64 {
        self.now
    }

    pub(crate) fn set_now(&mut self, now: u64) {
        self.now = now;
    }

    /// Adds a registration and returns its native identifier.
    pub(crate) fn register(&mut self, trigger: Trigger, id: CallbackId) -> NativeCallback {
        self.next_native += 1;
        let native = self.next_native;
        if let Trigger::At(time) = trigger {
            self.seq += 1;
            self.queue.push(Reverse(TimedEvent {
                time,
                seq: self.seq,
                native,
            }));
        }
        self.live.insert(native, Registration { id, trigger });
        NativeCallback(native)
    }

    /// Removes a registration. Returns `false` if it was not live.
    pub(crate) fn deregister(&mut self, native: NativeCallback) -> bool {
        let Some(reg) = self.live.remove(&native.0) else {
            return false;
        };
        if let Trigger::At(_) = reg.trigger {
            self.dead += 1;
            if self.dead * 2 > self.queue.len() {
                let live = &self.live;
                self.queue.retain(|Reverse(event)| live.contains_key(&event.native));
                self.dead = 0;
            }
        }
        true
    }

    /// Number of entries in the timed queue, dead ones included.
    #[cfg(test)]
    pub(crate) fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Registrations waiting on `trigger`, in registration order.
    pub(crate) fn waiting_on(&self, trigger: Trigger) -> Vec<u64> {
        self.live
            .iter()
            .filter(|(_, r)| r.trigger == trigger)
            .map(|(native, _)| *native)
            .collect()
    }

    /// Returns the callback of a live registration about to fire, dropping
    /// the registration if it is one-shot.
    pub(crate) fn claim(&mut self, native: u64) -> Option<CallbackId> {
        let reg = self.live.get(&native)?;
        let id = reg.id;
        let one_shot = match reg.trigger {
            Trigger::At(_) => true,
            Trigger::Phase(phase) => !phase.is_recurring(),
            Trigger::Change(_) => false,
        };
        if one_shot {
            self.live.remove(&native);
        }
        Some(id)
    }

    /// Time of the earliest live timed event.
    pub(crate) fn next_time(&mut self) -> Option<u64> {
        while let Some(Reverse(event)) = self.queue.peek() {
            if self.live.contains_key(&event.native) {
                return Some(event.time);
            }
            self.queue.pop();
            self.dead = self.dead.saturating_sub(1);
        }
        None
    }

    /// Pops the next live timed event due at or before `time`.
    pub(crate) fn pop_due(&mut self, time: u64) -> Option<u64> {
        while self.next_time()? <= time {
            if let Some(Reverse(event)) = self.queue.pop() {
                return Some(event.native);
            }
        }
        None
    }
}
