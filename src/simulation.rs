/// Simulation run loop.
///
/// `Simulator` owns one instance of every piece of kernel state (event
/// queue and clock, entity registry, trace hub) and drives them: pop the
/// next event, advance the clock, run the action. Everything is
/// synchronous and single-threaded; an action runs to completion before
/// the next event is looked at.

use std::time::Duration;

use tracing::{debug, info};

use crate::entity::{DevicePath, EntityRegistry, TracePath};
use crate::error::{ActionError, SimError, SimResult};
use crate::event::EventId;
use crate::queue::EventQueue;
use crate::telemetry::TelemetryCollector;
use crate::time::SimTime;
use crate::trace::{SignalPayload, TraceHub};

// ── Simulation Context ───────────────────────────────────────────────

/// Mutable context passed to every event action.
///
/// Borrows the queue and the hub for the duration of one action, so an
/// action can schedule follow-ups and fire traces but cannot reorder
/// anything outside of those APIs.
pub struct SimContext<'a> {
    pub(crate) queue: &'a mut EventQueue,
    pub(crate) hub: &'a mut TraceHub,
    pub(crate) registry: &'a EntityRegistry,
    pub(crate) event: EventId,
}

impl<'a> SimContext<'a> {
    /// Current simulated time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Id of the event whose action is running.
    #[inline]
    pub fn current_event(&self) -> EventId {
        self.event
    }

    /// Schedule an action at an absolute time (not before now).
    pub fn schedule_at<F>(&mut self, at: SimTime, action: F) -> SimResult<EventId>
    where
        F: FnOnce(&mut SimContext<'_>) -> Result<(), ActionError> + 'static,
    {
        self.queue.schedule(at, Box::new(action))
    }

    /// Schedule an action `delay` after now.
    pub fn schedule_after<F>(&mut self, delay: Duration, action: F) -> SimResult<EventId>
    where
        F: FnOnce(&mut SimContext<'_>) -> Result<(), ActionError> + 'static,
    {
        let at = self.now().checked_add(delay).ok_or(SimError::TimeOverflow)?;
        self.schedule_at(at, action)
    }

    /// Cancel a pending event.
    pub fn cancel(&mut self, id: EventId) -> SimResult<()> {
        self.queue.cancel(id)
    }

    /// Fire a trace signal at the current time. Returns the number of
    /// subscribers reached.
    pub fn fire(&mut self, path: &TracePath, payload: &SignalPayload) -> usize {
        let now = self.queue.now();
        self.hub.fire(now, path, payload)
    }

    /// Read access to the entity registry.
    pub fn registry(&self) -> &EntityRegistry {
        self.registry
    }

    /// Number of pending events.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}

// ── Run summary ───────────────────────────────────────────────────────

/// Counters reported when a run or a teardown finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Events whose actions ran during this call.
    pub events_executed: u64,
    /// Pending events dropped without running.
    pub events_discarded: usize,
    /// Trace subscriptions revoked.
    pub subscriptions_released: usize,
    /// Clock value when the call returned.
    pub final_time: SimTime,
}

// ── Simulator ─────────────────────────────────────────────────────────

/// Top-level simulation driver.
#[derive(Debug, Default)]
pub struct Simulator {
    queue: EventQueue,
    registry: EntityRegistry,
    hub: TraceHub,
    events_executed: u64,
}

impl Simulator {
    /// A fresh simulation at time zero with empty registry and hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Total events executed since creation or the last `reset`.
    pub fn events_executed(&self) -> u64 {
        self.events_executed
    }

    /// Number of events waiting to run.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    pub fn trace_hub(&self) -> &TraceHub {
        &self.hub
    }

    pub fn trace_hub_mut(&mut self) -> &mut TraceHub {
        &mut self.hub
    }

    /// Schedule an action at an absolute time.
    pub fn schedule<F>(&mut self, at: SimTime, action: F) -> SimResult<EventId>
    where
        F: FnOnce(&mut SimContext<'_>) -> Result<(), ActionError> + 'static,
    {
        self.queue.schedule(at, Box::new(action))
    }

    /// Schedule an action `delay` after the current time.
    pub fn schedule_after<F>(&mut self, delay: Duration, action: F) -> SimResult<EventId>
    where
        F: FnOnce(&mut SimContext<'_>) -> Result<(), ActionError> + 'static,
    {
        let at = self.now().checked_add(delay).ok_or(SimError::TimeOverflow)?;
        self.schedule(at, action)
    }

    /// Cancel a pending event.
    pub fn cancel(&mut self, id: EventId) -> SimResult<()> {
        self.queue.cancel(id)
    }

    /// Strictly parse and resolve each device path, then arm `collector`
    /// on the resolved devices. Nothing is connected if any path fails.
    pub fn connect_collector(
        &mut self,
        collector: &TelemetryCollector,
        device_paths: &[&str],
    ) -> SimResult<usize> {
        let resolved = device_paths
            .iter()
            .map(|p| self.registry.resolve_path(p).map(|d| d.path))
            .collect::<SimResult<Vec<DevicePath>>>()?;
        Ok(collector.connect_all(&mut self.hub, resolved))
    }

    /// Execute a single event: pop, advance the clock, run the action.
    ///
    /// Returns the id of the executed event, or `None` if nothing is
    /// pending. Unlike [`run`](Self::run) this never tears anything down.
    pub fn step(&mut self) -> SimResult<Option<EventId>> {
        let Some(event) = self.queue.pop_next() else {
            return Ok(None);
        };
        let id = event.id;
        let at = event.scheduled_at;
        self.events_executed += 1;

        let mut ctx = SimContext {
            queue: &mut self.queue,
            hub: &mut self.hub,
            registry: &self.registry,
            event: id,
        };
        event
            .execute(&mut ctx)
            .map_err(|source| SimError::ActionFailed {
                event: id,
                at,
                source,
            })?;
        Ok(Some(id))
    }

    /// Run until the queue is empty or the next event lies past
    /// `stop_time`, then tear down.
    ///
    /// Events scheduled exactly at `stop_time` still run. When a stop time
    /// is given the clock ends on it. Teardown discards the remaining
    /// events without running them and releases every trace subscription.
    ///
    /// An action error is returned immediately as
    /// [`SimError::ActionFailed`]; the simulator is left halted with the
    /// remaining events still queued and nothing torn down.
    pub fn run(&mut self, stop_time: Option<SimTime>) -> SimResult<RunSummary> {
        let start = self.events_executed;
        info!(now = %self.now(), stop = ?stop_time.map(|t| t.to_string()), "run started");

        while let Some(next) = self.queue.peek_time() {
            if stop_time.is_some_and(|stop| next > stop) {
                break;
            }
            self.step()?;
        }
        if let Some(stop) = stop_time {
            self.queue.advance_clock_to(stop);
        }

        let mut summary = self.destroy();
        summary.events_executed = self.events_executed - start;
        info!(
            executed = summary.events_executed,
            discarded = summary.events_discarded,
            released = summary.subscriptions_released,
            now = %summary.final_time,
            "run finished"
        );
        Ok(summary)
    }

    /// Discard every pending event without running it and revoke every
    /// trace subscription. The registry and clock are kept.
    pub fn destroy(&mut self) -> RunSummary {
        let events_discarded = self.queue.discard_all();
        let subscriptions_released = self.hub.clear();
        debug!(events_discarded, subscriptions_released, "simulation torn down");
        RunSummary {
            events_executed: 0,
            events_discarded,
            subscriptions_released,
            final_time: self.queue.now(),
        }
    }

    /// Tear down and start over with a fresh queue, clock, registry and
    /// trace hub.
    pub fn reset(&mut self) {
        self.destroy();
        *self = Simulator::new();
    }
}
