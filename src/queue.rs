/// Deterministic event queue.
///
/// A `BinaryHeap` with reversed `Ord` on `Event` acts as a min-heap keyed
/// by `(scheduled_at, id)`. Ids are strictly increasing, so events that
/// share an instant come out in insertion order and two runs with the same
/// schedule pop in the same order. The queue owns the simulation clock and
/// is the only thing that advances it.

use std::collections::{BinaryHeap, HashSet};

use tracing::trace;

use crate::clock::Clock;
use crate::error::{SimError, SimResult};
use crate::event::{Action, Event, EventId};
use crate::time::SimTime;

#[derive(Default)]
pub struct EventQueue {
    /// Min-heap (via reversed Ord on Event).
    heap: BinaryHeap<Event>,
    /// Ids still waiting in the heap and not cancelled.
    pending: HashSet<EventId>,
    /// Cancelled ids whose heap entries have not been skipped yet.
    cancelled: HashSet<EventId>,
    /// Sequence number of the next scheduled event.
    next_seq: u64,
    clock: Clock,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// Schedule `action` at the absolute time `at`.
    ///
    /// Scheduling exactly at the current time is allowed; anything earlier
    /// fails with [`SimError::CausalityViolation`].
    pub fn schedule(&mut self, at: SimTime, action: Action) -> SimResult<EventId> {
        let now = self.clock.now();
        if at < now {
            return Err(SimError::CausalityViolation { requested: at, now });
        }
        let id = EventId::new(self.next_seq);
        self.next_seq += 1;
        self.heap.push(Event::new(id, at, action));
        self.pending.insert(id);
        trace!(event = %id, %at, "scheduled");
        Ok(id)
    }

    /// Cancel a pending event.
    ///
    /// Fails with [`SimError::AlreadyFired`] if the event already ran, was
    /// discarded or was cancelled before.
    pub fn cancel(&mut self, id: EventId) -> SimResult<()> {
        if !self.pending.remove(&id) {
            return Err(SimError::AlreadyFired(id));
        }
        self.cancelled.insert(id);
        trace!(event = %id, "cancelled");
        Ok(())
    }

    /// Whether `id` is still waiting to run.
    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains(&id)
    }

    /// Pop the next event (earliest time, lowest id) and move the clock
    /// to its time. Returns `None` when nothing is pending.
    pub fn pop_next(&mut self) -> Option<Event> {
        self.purge_cancelled_head();
        let event = self.heap.pop()?;
        self.pending.remove(&event.id);
        self.clock.advance_to(event.scheduled_at);
        Some(event)
    }

    /// Time of the next pending event without removing it.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        self.purge_cancelled_head();
        self.heap.peek().map(|e| e.scheduled_at)
    }

    /// Drop every pending event without running it. Returns how many
    /// live (not cancelled) events were discarded.
    pub fn discard_all(&mut self) -> usize {
        let discarded = self.pending.len();
        self.heap.clear();
        self.pending.clear();
        self.cancelled.clear();
        discarded
    }

    /// Move the clock forward without running anything, used when a run
    /// ends at its stop time.
    pub(crate) fn advance_clock_to(&mut self, to: SimTime) {
        if to > self.clock.now() {
            self.clock.advance_to(to);
        }
    }

    /// Number of pending (not cancelled) events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn purge_cancelled_head(&mut self) {
        while let Some(head) = self.heap.peek() {
            if !self.cancelled.remove(&head.id) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("now", &self.clock.now())
            .field("pending", &self.pending.len())
            .field("scheduled", &self.next_seq)
            .finish()
    }
}
