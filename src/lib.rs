//! # rxtrace: discrete-event simulation with trace telemetry
//!
//! A single-threaded simulation core for wireless channel studies. Events
//! run in simulated-time order against a logical clock, devices publish PHY
//! signals on hierarchical trace paths, and a telemetry collector turns
//! every sniffed frame into a channel measurement record.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               Simulator                  │ ← run loop, teardown
//! │  ┌────────────┐  ┌───────────────────┐   │
//! │  │ EventQueue │  │  EntityRegistry   │   │ ← nodes, devices, paths
//! │  │  + Clock   │  └───────────────────┘   │
//! │  └────────────┘  ┌───────────────────┐   │
//! │                  │     TraceHub      │   │ ← path → subscribers
//! │                  └─────────┬─────────┘   │
//! └────────────────────────────┼─────────────┘
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │  TelemetryCollector   │ ← MeasurementRecords
//!                  └───────────────────────┘
//! ```
//!
//! [`scenario`] wires a TOML-configured star topology, a log-distance
//! [`channel`] and constant-bit-rate traffic on top of the core.

pub mod channel;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod mobility;
pub mod queue;
pub mod scenario;
pub mod simulation;
pub mod telemetry;
pub mod time;
pub mod trace;

// Re-exports for convenience.
pub use channel::{ChannelParams, LogDistanceChannel};
pub use config::ScenarioConfig;
pub use entity::{DeviceIndex, DevicePath, EntityRegistry, NodeId, TraceName, TracePath};
pub use error::{ActionError, SimError, SimResult};
pub use event::{Event, EventId};
pub use mobility::{ConstantPositions, MobilityModel, Position};
pub use queue::EventQueue;
pub use scenario::{run_scenario, Scenario, ScenarioReport};
pub use simulation::{RunSummary, SimContext, Simulator};
pub use telemetry::{
    summarize_by_receiver, write_records_json, DistanceReference, MeasurementRecord,
    ReceiverSummary, TelemetryCollector,
};
pub use time::SimTime;
pub use trace::{FireScope, SignalExtra, SignalPayload, SubscriptionId, TraceHub, TraceSink};
