//! Channel telemetry: turns PHY sniff signals into measurement records.
//!
//! A [`TelemetryCollector`] subscribes to the monitor-sniff trace of each
//! device it is pointed at. Every signal it receives becomes one
//! [`MeasurementRecord`] (SNR, RSSI, noise floor, link distance and transmit
//! power), appended in emission order, which is simulated-time order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entity::{DevicePath, NodeId, TraceName};
use crate::error::{SimError, SimResult};
use crate::mobility::MobilityModel;
use crate::trace::{FireScope, SignalPayload, SubscriptionId, TraceHub, TraceSink};

// ── Records ───────────────────────────────────────────────────────────

/// One channel measurement taken at a receiving node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeasurementRecord {
    /// Simulated time of reception, in seconds.
    pub timestamp: f64,
    /// The receiving node.
    pub node_id: NodeId,
    pub snr_db: f64,
    pub rssi_db: f64,
    pub noise_db: f64,
    /// Distance to the reference node; NaN if a position was unavailable.
    pub distance_m: f64,
    /// NaN when the frame did not carry its transmit power.
    pub tx_power_dbm: f64,
}

/// Decibel levels derived from one signal/noise pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelLevels {
    pub snr_db: f64,
    pub rssi_db: f64,
    pub noise_db: f64,
}

/// Convert a power pair (watts) into dB levels.
///
/// Both powers must be strictly positive, otherwise the logarithms are
/// undefined and [`SimError::NonPositiveSignal`] is returned.
pub fn channel_levels(payload: &SignalPayload) -> SimResult<ChannelLevels> {
    let (s, n) = (payload.signal_power, payload.noise_power);
    // Written as !(x > 0) so NaN is rejected too.
    if !(s > 0.0) || !(n > 0.0) {
        return Err(SimError::NonPositiveSignal {
            signal_power: s,
            noise_power: n,
        });
    }
    Ok(ChannelLevels {
        snr_db: 10.0 * (s / n).log10(),
        rssi_db: 10.0 * s.log10(),
        noise_db: 10.0 * n.log10(),
    })
}

// ── Export ────────────────────────────────────────────────────────────

/// Aggregate of the records taken at one receiver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReceiverSummary {
    pub node_id: NodeId,
    pub records: u64,
    pub mean_snr_db: f64,
    /// NaN if any of the node's records had no distance.
    pub mean_distance_m: f64,
}

/// Group `records` by receiving node, in node order.
pub fn summarize_by_receiver(records: &[MeasurementRecord]) -> Vec<ReceiverSummary> {
    let mut sums: BTreeMap<NodeId, (u64, f64, f64)> = BTreeMap::new();
    for r in records {
        let entry = sums.entry(r.node_id).or_insert((0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += r.snr_db;
        entry.2 += r.distance_m;
    }
    sums.into_iter()
        .map(|(node_id, (n, snr, distance))| ReceiverSummary {
            node_id,
            records: n,
            mean_snr_db: snr / n as f64,
            mean_distance_m: distance / n as f64,
        })
        .collect()
}

/// Write `records` to `writer` as a pretty-printed JSON array.
///
/// NaN fields (unknown distance or transmit power) come out as `null`.
pub fn write_records_json<W: Write>(mut writer: W, records: &[MeasurementRecord]) -> SimResult<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

// ── Collector configuration ───────────────────────────────────────────

/// Which node a record's distance is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceReference {
    /// The node that sent the frame, as reported in the payload.
    #[default]
    Transmitter,
    /// Always the same node, whoever transmitted.
    Fixed(NodeId),
}

/// Collector arming state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// No device subscriptions yet.
    Unarmed,
    /// Subscribed to at least one device.
    Armed,
}

struct CollectorInner {
    records: Vec<MeasurementRecord>,
    mobility: Box<dyn MobilityModel>,
    reference: DistanceReference,
    trace_name: TraceName,
    connected: BTreeMap<DevicePath, SubscriptionId>,
    state: CollectorState,
    dropped: u64,
    position_misses: u64,
}

impl CollectorInner {
    fn record(&mut self, scope: &FireScope<'_>, payload: &SignalPayload) {
        let levels = match channel_levels(payload) {
            Ok(levels) => levels,
            Err(err) => {
                self.dropped += 1;
                warn!(path = %scope.path(), at = %scope.now(), %err, "sample dropped");
                return;
            }
        };

        let node = scope.path().node();
        let distance_m = self.distance(node, payload.extra.tx_node);
        self.records.push(MeasurementRecord {
            timestamp: scope.now().as_secs_f64(),
            node_id: node,
            snr_db: levels.snr_db,
            rssi_db: levels.rssi_db,
            noise_db: levels.noise_db,
            distance_m,
            tx_power_dbm: payload.extra.tx_power_dbm.unwrap_or(f64::NAN),
        });
    }

    fn distance(&mut self, rx: NodeId, tx: Option<NodeId>) -> f64 {
        let reference = match self.reference {
            DistanceReference::Transmitter => tx,
            DistanceReference::Fixed(node) => Some(node),
        };
        let here = self.mobility.position(rx);
        let there = reference.and_then(|r| self.mobility.position(r));
        match (here, there) {
            (Some(a), Some(b)) => a.distance_to(&b),
            _ => {
                self.position_misses += 1;
                f64::NAN
            }
        }
    }
}

// ── TelemetryCollector ────────────────────────────────────────────────

/// Accumulates [`MeasurementRecord`]s from monitor-sniff traces.
///
/// Cloning gives another handle to the same buffer; the hub keeps one
/// clone per subscribed device. The collector is single-threaded.
#[derive(Clone)]
pub struct TelemetryCollector {
    inner: Rc<RefCell<CollectorInner>>,
}

impl TelemetryCollector {
    /// A collector that measures distance to each frame's transmitter.
    pub fn new(mobility: impl MobilityModel + 'static) -> Self {
        Self::with_reference(mobility, DistanceReference::Transmitter)
    }

    pub fn with_reference(
        mobility: impl MobilityModel + 'static,
        reference: DistanceReference,
    ) -> Self {
        TelemetryCollector {
            inner: Rc::new(RefCell::new(CollectorInner {
                records: Vec::new(),
                mobility: Box::new(mobility),
                reference,
                trace_name: TraceName::MONITOR_SNIFF_RX,
                connected: BTreeMap::new(),
                state: CollectorState::Unarmed,
                dropped: 0,
                position_misses: 0,
            })),
        }
    }

    /// Listen on a trace other than `Phy/MonitorSniffRx`.
    pub fn with_trace_name(self, name: TraceName) -> Self {
        self.inner.borrow_mut().trace_name = name;
        self
    }

    /// Subscribe to the collector's trace on every path in `device_paths`
    /// that is not already connected to `hub`.
    ///
    /// The collector becomes [`CollectorState::Armed`] once at least one
    /// device is connected; calling again while armed only adds the
    /// missing paths. Returns the number of newly connected devices.
    pub fn connect_all(
        &self,
        hub: &mut TraceHub,
        device_paths: impl IntoIterator<Item = DevicePath>,
    ) -> usize {
        let trace_name = self.inner.borrow().trace_name.clone();
        let mut added = 0;
        for device in device_paths {
            let live = self
                .inner
                .borrow()
                .connected
                .get(&device)
                .is_some_and(|id| hub.is_connected(*id));
            if live {
                continue;
            }
            let id = hub.connect(device.trace(trace_name.clone()), self.clone());
            self.inner.borrow_mut().connected.insert(device, id);
            added += 1;
        }

        let mut inner = self.inner.borrow_mut();
        if !inner.connected.is_empty() {
            inner.state = CollectorState::Armed;
        }
        info!(
            added,
            devices = inner.connected.len(),
            trace = %trace_name,
            "telemetry collector connected"
        );
        added
    }

    /// Take every accumulated record, leaving the buffer empty.
    pub fn drain(&self) -> Vec<MeasurementRecord> {
        std::mem::take(&mut self.inner.borrow_mut().records)
    }

    /// Copy of the accumulated records; the buffer is kept.
    pub fn peek(&self) -> Vec<MeasurementRecord> {
        self.inner.borrow().records.clone()
    }

    /// Discard accumulated records.
    pub fn clear(&self) {
        self.inner.borrow_mut().records.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().records.is_empty()
    }

    pub fn state(&self) -> CollectorState {
        self.inner.borrow().state
    }

    /// Samples skipped because signal or noise power was not positive.
    pub fn dropped(&self) -> u64 {
        self.inner.borrow().dropped
    }

    /// Records stored with a NaN distance.
    pub fn position_misses(&self) -> u64 {
        self.inner.borrow().position_misses
    }

    /// Devices this collector has subscribed to, in path order.
    pub fn connected_paths(&self) -> Vec<DevicePath> {
        self.inner.borrow().connected.keys().copied().collect()
    }
}

impl TraceSink for TelemetryCollector {
    fn on_signal(&mut self, scope: &mut FireScope<'_>, payload: &SignalPayload) {
        self.inner.borrow_mut().record(scope, payload);
    }
}

impl std::fmt::Debug for TelemetryCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TelemetryCollector")
            .field("state", &inner.state)
            .field("records", &inner.records.len())
            .field("dropped", &inner.dropped)
            .field("devices", &inner.connected.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DeviceIndex;
    use crate::mobility::{ConstantPositions, Position};
    use crate::time::SimTime;
    use crate::trace::SignalExtra;

    const EPS: f64 = 1e-9;

    fn dev(node: u32) -> DevicePath {
        DevicePath::new(NodeId::new(node), DeviceIndex::new(0))
    }

    fn star() -> ConstantPositions {
        ConstantPositions::new()
            .with(NodeId::new(0), Position::ORIGIN)
            .with(NodeId::new(1), Position::new(5.0, 5.0, 0.0))
            .with(NodeId::new(2), Position::new(-5.0, -5.0, 0.0))
    }

    fn from_node(tx: u32, signal: f64, noise: f64) -> SignalPayload {
        SignalPayload::new(signal, noise).with_extra(SignalExtra {
            tx_node: Some(NodeId::new(tx)),
            tx_power_dbm: Some(16.0),
            ..SignalExtra::default()
        })
    }

    fn armed(hub: &mut TraceHub) -> TelemetryCollector {
        let collector = TelemetryCollector::new(star());
        collector.connect_all(hub, [dev(0), dev(1), dev(2)]);
        collector
    }

    #[test]
    fn test_levels_from_power_pair() {
        let l = channel_levels(&SignalPayload::new(100.0, 1.0)).unwrap();
        assert!((l.snr_db - 20.0).abs() < EPS);
        assert!((l.rssi_db - 20.0).abs() < EPS);
        assert!(l.noise_db.abs() < EPS);
    }

    #[test]
    fn test_levels_reject_non_positive() {
        for (s, n) in [(0.0, 1.0), (1.0, 0.0), (-1.0, 1.0), (f64::NAN, 1.0)] {
            assert!(matches!(
                channel_levels(&SignalPayload::new(s, n)),
                Err(SimError::NonPositiveSignal { .. })
            ));
        }
    }

    #[test]
    fn test_record_fields() {
        let mut hub = TraceHub::new();
        let collector = armed(&mut hub);

        let path = dev(0).trace(TraceName::MONITOR_SNIFF_RX);
        hub.fire(SimTime::from_millis(1500), &path, &from_node(1, 100.0, 1.0));

        let records = collector.peek();
        assert_eq!(records.len(), 1);
        let r = records[0];
        assert_eq!(r.timestamp, 1.5);
        assert_eq!(r.node_id, NodeId::new(0));
        assert!((r.snr_db - 20.0).abs() < EPS);
        assert!((r.rssi_db - 20.0).abs() < EPS);
        assert!(r.noise_db.abs() < EPS);
        assert!((r.distance_m - 50f64.sqrt()).abs() < EPS);
        assert_eq!(r.tx_power_dbm, 16.0);
    }

    #[test]
    fn test_zero_signal_is_dropped_and_counted() {
        let mut hub = TraceHub::new();
        let collector = armed(&mut hub);
        let path = dev(2).trace(TraceName::MONITOR_SNIFF_RX);

        hub.fire(SimTime::ZERO, &path, &from_node(1, 0.0, 1.0));
        assert_eq!(collector.dropped(), 1);
        assert!(collector.is_empty());

        hub.fire(SimTime::ZERO, &path, &from_node(1, 1.0, 1.0));
        assert_eq!(collector.dropped(), 1);
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_unregistered_path_leaves_records_unchanged() {
        let mut hub = TraceHub::new();
        let collector = armed(&mut hub);
        let stray = dev(9).trace(TraceName::MONITOR_SNIFF_RX);
        hub.fire(SimTime::ZERO, &stray, &from_node(1, 1.0, 1.0));
        assert_eq!(collector.len(), 0);
        assert_eq!(collector.dropped(), 0);
    }

    #[test]
    fn test_unknown_position_gives_nan_distance() {
        let mut hub = TraceHub::new();
        let collector = TelemetryCollector::new(star());
        collector.connect_all(&mut hub, [dev(7)]);

        hub.fire(
            SimTime::ZERO,
            &dev(7).trace(TraceName::MONITOR_SNIFF_RX),
            &from_node(0, 2.0, 1.0),
        );
        // Missing transmitter in the payload is a miss as well.
        hub.fire(
            SimTime::ZERO,
            &dev(7).trace(TraceName::MONITOR_SNIFF_RX),
            &SignalPayload::new(2.0, 1.0),
        );

        let records = collector.drain();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.distance_m.is_nan()));
        assert!(records[1].tx_power_dbm.is_nan());
        assert_eq!(collector.position_misses(), 2);
    }

    #[test]
    fn test_fixed_reference_distance() {
        let mut hub = TraceHub::new();
        let collector =
            TelemetryCollector::with_reference(star(), DistanceReference::Fixed(NodeId::new(0)));
        collector.connect_all(&mut hub, [dev(2)]);

        // Transmitter is node 1, but distance is measured to node 0.
        hub.fire(
            SimTime::ZERO,
            &dev(2).trace(TraceName::MONITOR_SNIFF_RX),
            &from_node(1, 2.0, 1.0),
        );
        let r = collector.peek()[0];
        assert!((r.distance_m - 50f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_drain_empties_buffer() {
        let mut hub = TraceHub::new();
        let collector = armed(&mut hub);
        for (i, node) in [0, 2, 0].into_iter().enumerate() {
            hub.fire(
                SimTime::from_millis(i as u64),
                &dev(node).trace(TraceName::MONITOR_SNIFF_RX),
                &from_node(1, 4.0, 1.0),
            );
        }

        let drained = collector.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(
            drained.iter().map(|r| r.node_id.raw()).collect::<Vec<_>>(),
            vec![0, 2, 0]
        );
        assert!(collector.peek().is_empty());
        assert!(collector.drain().is_empty());
    }

    #[test]
    fn test_arming_state_machine() {
        let mut hub = TraceHub::new();
        let collector = TelemetryCollector::new(star());
        assert_eq!(collector.state(), CollectorState::Unarmed);

        assert_eq!(collector.connect_all(&mut hub, Vec::<DevicePath>::new()), 0);
        assert_eq!(collector.state(), CollectorState::Unarmed);

        assert_eq!(collector.connect_all(&mut hub, [dev(0), dev(1)]), 2);
        assert_eq!(collector.state(), CollectorState::Armed);

        // Idempotent while armed: only the missing path is added.
        assert_eq!(collector.connect_all(&mut hub, [dev(1), dev(2)]), 1);
        assert_eq!(hub.len(), 3);
        assert_eq!(collector.connected_paths(), vec![dev(0), dev(1), dev(2)]);
    }

    #[test]
    fn test_reconnects_after_hub_teardown() {
        let mut hub = TraceHub::new();
        let collector = armed(&mut hub);
        hub.clear();

        assert_eq!(collector.connect_all(&mut hub, [dev(0)]), 1);
        assert_eq!(collector.state(), CollectorState::Armed);
    }

    #[test]
    fn test_custom_trace_name() {
        let mut hub = TraceHub::new();
        let name = TraceName::new("Phy/PhyRxEnd").unwrap();
        let collector = TelemetryCollector::new(star()).with_trace_name(name.clone());
        collector.connect_all(&mut hub, [dev(0)]);

        hub.fire(SimTime::ZERO, &dev(0).trace(TraceName::MONITOR_SNIFF_RX), &from_node(1, 2.0, 1.0));
        assert!(collector.is_empty());
        hub.fire(SimTime::ZERO, &dev(0).trace(name), &from_node(1, 2.0, 1.0));
        assert_eq!(collector.len(), 1);
    }

    fn record(node: u32, snr_db: f64, distance_m: f64) -> MeasurementRecord {
        MeasurementRecord {
            timestamp: 1.0,
            node_id: NodeId::new(node),
            snr_db,
            rssi_db: -60.0,
            noise_db: -94.0,
            distance_m,
            tx_power_dbm: f64::NAN,
        }
    }

    #[test]
    fn test_summary_per_receiver() {
        let records = [
            record(2, 10.0, 14.0),
            record(0, 30.0, 7.0),
            record(2, 20.0, 14.0),
            record(0, 40.0, 7.0),
            record(0, 35.0, 7.0),
        ];
        let summary = summarize_by_receiver(&records);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].node_id, NodeId::new(0));
        assert_eq!(summary[0].records, 3);
        assert!((summary[0].mean_snr_db - 35.0).abs() < EPS);
        assert!((summary[0].mean_distance_m - 7.0).abs() < EPS);
        assert_eq!(summary[1].records, 2);
        assert!((summary[1].mean_snr_db - 15.0).abs() < EPS);
        assert!(summarize_by_receiver(&[]).is_empty());
    }

    #[test]
    fn test_json_export_writes_nan_as_null() {
        let records = [record(0, 20.0, 7.0), record(2, 10.0, f64::NAN)];
        let mut buf = Vec::new();
        write_records_json(&mut buf, &records).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["node_id"], 0);
        assert_eq!(rows[0]["snr_db"], 20.0);
        assert_eq!(rows[0]["distance_m"], 7.0);
        assert!(rows[0]["tx_power_dbm"].is_null());
        assert_eq!(rows[1]["node_id"], 2);
        assert!(rows[1]["distance_m"].is_null());
    }

    #[test]
    fn test_records_serialize() {
        let mut hub = TraceHub::new();
        let collector = armed(&mut hub);
        hub.fire(SimTime::ZERO, &dev(0).trace(TraceName::MONITOR_SNIFF_RX), &from_node(1, 10.0, 1.0));
        let json = serde_json::to_string(&collector.peek()).unwrap();
        assert!(json.contains("\"node_id\":0"));
        assert!(json.contains("\"snr_db\":10.0"));
    }
}
