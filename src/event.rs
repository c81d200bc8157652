/// Scheduled events.
///
/// An `Event` pairs a simulated time with a one-shot action. Events are
/// owned by the queue until popped and consumed exactly once by the
/// simulator, which orders them by `(scheduled_at, id)`.

use std::cmp::Ordering;

use crate::error::ActionError;
use crate::simulation::SimContext;
use crate::time::SimTime;

// ── Event ID ──────────────────────────────────────────────────────────

/// Cancel handle and tie-breaker of a scheduled event.
///
/// The queue hands ids out in scheduling order, so events sharing an
/// instant run in `EventId` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Action ────────────────────────────────────────────────────────────

/// The callback an event runs when the simulator reaches it.
///
/// It gets the [`SimContext`] so it can read the clock, schedule
/// follow-ups and fire trace signals. Returning an error halts the run.
pub type Action = Box<dyn for<'a> FnOnce(&mut SimContext<'a>) -> Result<(), ActionError>>;

// ── Event ─────────────────────────────────────────────────────────────

/// A single scheduled event.
pub struct Event {
    /// Insertion sequence number; breaks ties between equal times.
    pub id: EventId,
    /// The simulated time at which the action runs.
    pub scheduled_at: SimTime,
    pub(crate) action: Action,
}

impl Event {
    pub fn new(id: EventId, scheduled_at: SimTime, action: Action) -> Self {
        Event {
            id,
            scheduled_at,
            action,
        }
    }

    /// Consume the event and run its action.
    pub(crate) fn execute(self, ctx: &mut SimContext<'_>) -> Result<(), ActionError> {
        (self.action)(ctx)
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("scheduled_at", &self.scheduled_at)
            .finish_non_exhaustive()
    }
}

/// Ordering: smallest `(scheduled_at, id)` first.
///
/// `BinaryHeap` is a max-heap, so the natural ordering is reversed here.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .scheduled_at
            .cmp(&self.scheduled_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.scheduled_at == other.scheduled_at
    }
}

impl Eq for Event {}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Action {
        Box::new(|_ctx: &mut SimContext<'_>| Ok(()))
    }

    #[test]
    fn test_event_ordering_by_time() {
        let e1 = Event::new(EventId::new(1), SimTime::from_millis(10), noop());
        let e2 = Event::new(EventId::new(0), SimTime::from_millis(20), noop());
        // Earlier time wins regardless of id; reversed ordering puts it "greater".
        assert!(e1 > e2);
    }

    #[test]
    fn test_event_ordering_tiebreak_by_id() {
        let e1 = Event::new(EventId::new(0), SimTime::from_millis(10), noop());
        let e2 = Event::new(EventId::new(1), SimTime::from_millis(10), noop());
        assert!(e1 > e2);
    }

    #[test]
    fn test_event_debug_and_display() {
        let e = Event::new(EventId::new(42), SimTime::from_millis(100), noop());
        assert_eq!(e.id.to_string(), "E#42");
        assert!(format!("{:?}", e).contains("scheduled_at"));
    }
}
