//! Structured error types for rxtrace.
//!
//! All fallible public APIs return `SimResult<T>`. Local errors (bad path,
//! stale handle) are recoverable by the caller; `CausalityViolation` and
//! `ActionFailed` abort the operation that raised them.

use thiserror::Error;

use crate::entity::NodeId;
use crate::event::EventId;
use crate::time::SimTime;
use crate::trace::SubscriptionId;

/// Error type returned by event actions.
///
/// Boxed so an action can `?` any error, including [`SimError`].
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The top-level error type of the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    // ── Scheduling ────────────────────────────────────────

    /// Attempted to schedule an event before the current clock value.
    #[error("cannot schedule event at {requested} when the clock reads {now}")]
    CausalityViolation { requested: SimTime, now: SimTime },

    /// The handle refers to an event that already ran, was discarded or
    /// was cancelled.
    #[error("event {0} has already fired")]
    AlreadyFired(EventId),

    /// A time value that cannot be represented on the simulated clock.
    #[error("invalid simulation time {0}s")]
    InvalidTime(f64),

    /// Adding a delay overflowed the clock.
    #[error("simulated time overflow")]
    TimeOverflow,

    /// An event action returned an error; the run is halted.
    #[error("event {event} at {at} failed: {source}")]
    ActionFailed {
        event: EventId,
        at: SimTime,
        #[source]
        source: ActionError,
    },

    // ── Entities & paths ──────────────────────────────────

    /// A path string does not follow the `/NodeList/<n>/DeviceList/<d>` grammar.
    #[error("malformed path {path:?}: {reason}")]
    MalformedPath { path: String, reason: &'static str },

    /// A well-formed path names a node or device that is not registered.
    #[error("no entity at {0}")]
    UnresolvedPath(String),

    /// A node id was referenced but is not registered.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    // ── Tracing ───────────────────────────────────────────

    /// The subscription handle is not connected to the hub.
    #[error("subscription {0} is not connected")]
    UnknownSubscription(SubscriptionId),

    /// Signal or noise power is not strictly positive, so the dB values
    /// are undefined.
    #[error("non-positive signal sample (signal={signal_power}W, noise={noise_power}W)")]
    NonPositiveSignal { signal_power: f64, noise_power: f64 },

    // ── Configuration ─────────────────────────────────────

    /// A scenario configuration could not be parsed or is inconsistent.
    #[error("invalid scenario: {0}")]
    InvalidConfig(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Records could not be encoded as JSON.
    #[error("record export failed: {0}")]
    Export(#[from] serde_json::Error),
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;
