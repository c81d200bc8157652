/// Star scenario: nodes at fixed positions, one constant-bit-rate source
/// and a telemetry collector on every receiver.
///
/// Each transmission schedules one receive event per device on every other
/// node, delayed by the propagation time. A receive event fires the
/// monitor-sniff trace of its device with the channel's signal and noise
/// power, which the collector turns into a record.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info};

use crate::channel::LogDistanceChannel;
use crate::config::ScenarioConfig;
use crate::entity::{NodeId, TraceName};
use crate::error::{ActionError, SimError, SimResult};
use crate::mobility::{ConstantPositions, MobilityModel};
use crate::simulation::{RunSummary, SimContext, Simulator};
use crate::telemetry::{MeasurementRecord, TelemetryCollector};
use crate::time::SimTime;

// ── Traffic source ────────────────────────────────────────────────────

struct Source {
    node: NodeId,
    channel: LogDistanceChannel,
    positions: ConstantPositions,
    trace_name: TraceName,
    packet_size: u32,
    tx_power_dbm: f64,
    interval: Duration,
    stop: SimTime,
    frames_sent: Cell<u64>,
}

/// Send one frame, then schedule the next one while the source is on.
fn transmit(ctx: &mut SimContext<'_>, source: Rc<Source>) -> Result<(), ActionError> {
    source.frames_sent.set(source.frames_sent.get() + 1);
    let origin = source
        .positions
        .position(source.node)
        .ok_or(SimError::NodeNotFound(source.node))?;

    for device in ctx.registry().device_paths() {
        if device.node == source.node {
            continue;
        }
        let Some(here) = source.positions.position(device.node) else {
            debug!(%device, "receiver has no position, skipped");
            continue;
        };
        let distance = origin.distance_to(&here);
        let payload = source
            .channel
            .receive(source.node, source.tx_power_dbm, distance, source.packet_size);
        let path = device.trace(source.trace_name.clone());
        ctx.schedule_after(
            source.channel.propagation_delay(distance)?,
            move |ctx: &mut SimContext<'_>| {
                ctx.fire(&path, &payload);
                Ok(())
            },
        )?;
    }

    let next = ctx
        .now()
        .checked_add(source.interval)
        .ok_or(SimError::TimeOverflow)?;
    if next < source.stop {
        ctx.schedule_at(next, move |ctx: &mut SimContext<'_>| transmit(ctx, source))?;
    }
    Ok(())
}

// ── Scenario ──────────────────────────────────────────────────────────

/// What a finished scenario produced.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub summary: RunSummary,
    /// Frames the source sent.
    pub frames_sent: u64,
    pub records: Vec<MeasurementRecord>,
    pub dropped: u64,
    pub position_misses: u64,
}

/// A simulator populated from a [`ScenarioConfig`], ready to run.
#[derive(Debug)]
pub struct Scenario {
    config: ScenarioConfig,
    sim: Simulator,
    collector: TelemetryCollector,
    source: Rc<Source>,
}

impl Scenario {
    /// Register nodes and devices, arm the collector and schedule the first
    /// transmission.
    pub fn build(config: ScenarioConfig) -> SimResult<Self> {
        config.validate()?;
        let mut sim = Simulator::new();
        let mut positions = ConstantPositions::new();

        for spec in &config.nodes {
            let node = sim.registry_mut().create_node();
            for _ in 0..spec.devices {
                sim.registry_mut().attach_device(node)?;
            }
            positions.set(node, spec.position);
            debug!(%node, name = %spec.name, devices = spec.devices, "node placed");
        }

        let trace_name = config.trace_name();
        let collector = TelemetryCollector::with_reference(
            positions.clone(),
            config.telemetry.distance_reference,
        )
        .with_trace_name(trace_name.clone());
        let watched = if config.telemetry.devices.is_empty() {
            let paths = sim.registry().device_paths();
            collector.connect_all(sim.trace_hub_mut(), paths)
        } else {
            let paths: Vec<&str> = config.telemetry.devices.iter().map(String::as_str).collect();
            sim.connect_collector(&collector, &paths)?
        };

        let traffic = &config.traffic;
        let source = Rc::new(Source {
            node: config.source_node(),
            channel: LogDistanceChannel::new(config.channel.clone()),
            positions,
            trace_name,
            packet_size: traffic.packet_size,
            tx_power_dbm: traffic.tx_power_dbm,
            interval: Duration::from_nanos(traffic.interval_nanos()),
            stop: SimTime::from_secs_f64(traffic.stop)?,
            frames_sent: Cell::new(0),
        });
        let first = Rc::clone(&source);
        sim.schedule(
            SimTime::from_secs_f64(traffic.start)?,
            move |ctx: &mut SimContext<'_>| transmit(ctx, first),
        )?;

        info!(
            nodes = config.nodes.len(),
            watched,
            source = %source.node,
            interval = ?source.interval,
            "scenario built"
        );
        Ok(Scenario {
            config,
            sim,
            collector,
            source,
        })
    }

    /// Run to the configured stop time and collect the records.
    ///
    /// The run tears the simulator down, so a second call finds nothing
    /// left to execute.
    pub fn run(&mut self) -> SimResult<ScenarioReport> {
        let stop = SimTime::from_secs_f64(self.config.stop_time)?;
        let summary = self.sim.run(Some(stop))?;
        Ok(ScenarioReport {
            summary,
            frames_sent: self.source.frames_sent.get(),
            records: self.collector.drain(),
            dropped: self.collector.dropped(),
            position_misses: self.collector.position_misses(),
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("node", &self.node)
            .field("interval", &self.interval)
            .field("frames_sent", &self.frames_sent.get())
            .finish()
    }
}

/// Build and run `config` in one go.
pub fn run_scenario(config: ScenarioConfig) -> SimResult<ScenarioReport> {
    Scenario::build(config)?.run()
}
