//! Trace hub: typed publish/subscribe between devices and collectors.
//!
//! Producers fire a [`SignalPayload`] on a [`TracePath`]; every
//! subscription connected to exactly that path is called synchronously, in
//! the order the subscriptions were made. Nobody listening is not an error.
//!
//! A sink cannot reach the hub while it is being dispatched to (the hub is
//! exclusively borrowed), so disconnects requested from inside a sink go
//! through [`FireScope::defer_disconnect`] and are applied once the current
//! dispatch has finished.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use crate::entity::{NodeId, TracePath};
use crate::error::{SimError, SimResult};
use crate::time::SimTime;

// ── Payload ───────────────────────────────────────────────────────────

/// Per-frame fields beyond the raw power pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalExtra {
    /// Node that transmitted the frame, when the PHY knows it.
    pub tx_node: Option<NodeId>,
    /// Transmit power the frame was sent with.
    pub tx_power_dbm: Option<f64>,
    pub channel_freq_mhz: Option<u16>,
    pub packet_size: Option<u32>,
}

/// Signal and noise power of one received frame, in watts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalPayload {
    pub signal_power: f64,
    pub noise_power: f64,
    pub extra: SignalExtra,
}

impl SignalPayload {
    pub fn new(signal_power: f64, noise_power: f64) -> Self {
        SignalPayload {
            signal_power,
            noise_power,
            extra: SignalExtra::default(),
        }
    }

    pub fn with_extra(mut self, extra: SignalExtra) -> Self {
        self.extra = extra;
        self
    }
}

// ── Subscriptions ─────────────────────────────────────────────────────

/// Handle returned by [`TraceHub::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S#{}", self.0)
    }
}

/// What a sink sees about the dispatch it is part of.
pub struct FireScope<'a> {
    now: SimTime,
    path: &'a TracePath,
    subscription: SubscriptionId,
    deferred: &'a mut Vec<SubscriptionId>,
}

impl FireScope<'_> {
    /// Simulated time of the firing.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// The path the signal was fired on.
    #[inline]
    pub fn path(&self) -> &TracePath {
        self.path
    }

    /// The subscription currently being called.
    #[inline]
    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Ask for `id` to be disconnected once this dispatch completes.
    ///
    /// The running dispatch is not affected: subscribers later in the
    /// order still receive the current signal.
    pub fn defer_disconnect(&mut self, id: SubscriptionId) {
        self.deferred.push(id);
    }
}

/// Consumer side of a trace subscription.
pub trait TraceSink {
    fn on_signal(&mut self, scope: &mut FireScope<'_>, payload: &SignalPayload);
}

/// Closures are sinks, handy for tests and one-off listeners.
impl<F> TraceSink for F
where
    F: FnMut(&mut FireScope<'_>, &SignalPayload),
{
    fn on_signal(&mut self, scope: &mut FireScope<'_>, payload: &SignalPayload) {
        (self)(scope, payload);
    }
}

struct Subscription {
    path: TracePath,
    sink: Box<dyn TraceSink>,
}

// ── TraceHub ──────────────────────────────────────────────────────────

/// Registry of trace subscriptions for one simulation instance.
#[derive(Default)]
pub struct TraceHub {
    /// Keyed by id; ids grow monotonically so this is registration order.
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    by_path: HashMap<TracePath, Vec<SubscriptionId>>,
    next_id: u64,
}

impl TraceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `sink` to signals fired on exactly `path`.
    pub fn connect(&mut self, path: TracePath, sink: impl TraceSink + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.by_path.entry(path.clone()).or_default().push(id);
        debug!(subscription = %id, %path, "trace connected");
        self.subscriptions.insert(
            id,
            Subscription {
                path,
                sink: Box::new(sink),
            },
        );
        id
    }

    /// Remove a subscription.
    pub fn disconnect(&mut self, id: SubscriptionId) -> SimResult<()> {
        let sub = self
            .subscriptions
            .remove(&id)
            .ok_or(SimError::UnknownSubscription(id))?;
        if let Some(ids) = self.by_path.get_mut(&sub.path) {
            ids.retain(|s| *s != id);
            if ids.is_empty() {
                self.by_path.remove(&sub.path);
            }
        }
        debug!(subscription = %id, path = %sub.path, "trace disconnected");
        Ok(())
    }

    /// Deliver `payload` to every subscription on `path`, in registration
    /// order. Returns how many sinks were called.
    pub fn fire(&mut self, now: SimTime, path: &TracePath, payload: &SignalPayload) -> usize {
        // Iterate a snapshot so deferred disconnects cannot disturb the walk.
        let targets = match self.by_path.get(path) {
            Some(ids) => ids.clone(),
            None => {
                trace!(%path, "fired with no subscribers");
                return 0;
            }
        };

        let mut deferred = Vec::new();
        let mut called = 0;
        for id in targets {
            let Some(sub) = self.subscriptions.get_mut(&id) else {
                continue;
            };
            let mut scope = FireScope {
                now,
                path,
                subscription: id,
                deferred: &mut deferred,
            };
            sub.sink.on_signal(&mut scope, payload);
            called += 1;
        }

        for id in deferred {
            if self.disconnect(id).is_err() {
                debug!(subscription = %id, "deferred disconnect of unknown subscription ignored");
            }
        }
        called
    }

    /// Revoke every subscription. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let n = self.subscriptions.len();
        self.subscriptions.clear();
        self.by_path.clear();
        n
    }

    /// Subscriptions on `path`, in dispatch order.
    pub fn subscribers(&self, path: &TracePath) -> &[SubscriptionId] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_connected(&self, id: SubscriptionId) -> bool {
        self.subscriptions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl std::fmt::Debug for TraceHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceHub")
            .field("subscriptions", &self.subscriptions.len())
            .field("paths", &self.by_path.len())
            .finish()
    }
}
