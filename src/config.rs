//! Scenario configuration.
//!
//! A [`ScenarioConfig`] is read from TOML. Every section has defaults, so
//! an empty file describes the stock three-node star: an access point at
//! the origin and two stations on its diagonal, with the first station
//! sending constant-bit-rate traffic.
//!
//! ```toml
//! stop-time = 10.0
//!
//! [[nodes]]
//! name = "ap"
//! position = { x = 0.0, y = 0.0, z = 0.0 }
//!
//! [traffic]
//! source = 1
//! start = 1.0
//! stop = 10.0
//! data-rate-bps = 1000000
//! packet-size = 1000
//!
//! [telemetry]
//! distance-reference = "transmitter"   # or { fixed = 0 }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::ChannelParams;
use crate::entity::{DevicePath, NodeId, TraceName};
use crate::error::{SimError, SimResult};
use crate::mobility::Position;
use crate::telemetry::DistanceReference;

fn default_stop_time() -> f64 {
    10.0
}

fn default_nodes() -> Vec<NodeConfig> {
    vec![
        NodeConfig::new("ap", Position::ORIGIN),
        NodeConfig::new("sta1", Position::new(5.0, 5.0, 0.0)),
        NodeConfig::new("sta2", Position::new(-5.0, -5.0, 0.0)),
    ]
}

fn default_devices() -> u32 {
    1
}

fn default_trace_name() -> String {
    TraceName::MONITOR_SNIFF_RX.as_str().to_owned()
}

/// Root of a scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Simulated seconds after which the run stops.
    #[serde(default = "default_stop_time")]
    pub stop_time: f64,
    #[serde(default = "default_nodes")]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub traffic: TrafficConfig,
    #[serde(default)]
    pub channel: ChannelParams,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            stop_time: default_stop_time(),
            nodes: default_nodes(),
            traffic: TrafficConfig::default(),
            channel: ChannelParams::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// One node: a name for logs, a fixed position and its device count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_devices")]
    pub devices: u32,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        NodeConfig {
            name: name.into(),
            position,
            devices: default_devices(),
        }
    }
}

/// On/off constant-bit-rate source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TrafficConfig {
    /// Index of the sending node.
    pub source: u32,
    /// First transmission, seconds.
    pub start: f64,
    /// No transmission starts at or after this instant, seconds.
    pub stop: f64,
    pub data_rate_bps: u64,
    /// Frame size in bytes.
    pub packet_size: u32,
    pub tx_power_dbm: f64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        TrafficConfig {
            source: 1,
            start: 1.0,
            stop: 10.0,
            data_rate_bps: 1_000_000,
            packet_size: 1000,
            tx_power_dbm: 16.0206,
        }
    }
}

impl TrafficConfig {
    /// Gap between two frame starts, in nanoseconds.
    pub fn interval_nanos(&self) -> u64 {
        let bits = u128::from(self.packet_size) * 8;
        let nanos = bits * 1_000_000_000 / u128::from(self.data_rate_bps.max(1));
        u64::try_from(nanos).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TelemetryConfig {
    pub trace_name: String,
    pub distance_reference: DistanceReference,
    /// Device paths to watch. Empty means every registered device.
    pub devices: Vec<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            trace_name: default_trace_name(),
            distance_reference: DistanceReference::default(),
            devices: Vec::new(),
        }
    }
}

impl ScenarioConfig {
    /// Read and validate a TOML scenario file.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = raw.len(), "loaded scenario file");
        Self::from_toml_str(&raw)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(raw: &str) -> SimResult<Self> {
        let config: ScenarioConfig =
            toml::from_str(raw).map_err(|e| SimError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> SimResult<()> {
        fn invalid(msg: impl Into<String>) -> SimResult<()> {
            Err(SimError::InvalidConfig(msg.into()))
        }

        if !(self.stop_time.is_finite() && self.stop_time > 0.0) {
            return invalid(format!("stop-time must be positive, got {}", self.stop_time));
        }
        if self.nodes.is_empty() {
            return invalid("at least one node is required");
        }
        for node in &self.nodes {
            let p = node.position;
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return invalid(format!("node '{}' has a non-finite position", node.name));
            }
        }

        let node_count = self.nodes.len() as u64;
        let t = &self.traffic;
        if u64::from(t.source) >= node_count {
            return invalid(format!("traffic source {} is not a configured node", t.source));
        }
        if self.nodes[t.source as usize].devices == 0 {
            return invalid("traffic source has no device");
        }
        if !(t.start.is_finite() && t.start >= 0.0 && t.stop.is_finite() && t.start < t.stop) {
            return invalid(format!("traffic window [{}, {}) is empty", t.start, t.stop));
        }
        if t.data_rate_bps == 0 || t.packet_size == 0 {
            return invalid("data-rate-bps and packet-size must be positive");
        }
        if !t.tx_power_dbm.is_finite() {
            return invalid("tx-power-dbm must be finite");
        }

        let c = &self.channel;
        if !(c.path_loss_exponent > 0.0 && c.reference_distance_m > 0.0 && c.bandwidth_hz > 0.0) {
            return invalid("channel exponent, reference distance and bandwidth must be positive");
        }

        if TraceName::new(self.telemetry.trace_name.as_str()).is_err() {
            return invalid(format!("bad trace name '{}'", self.telemetry.trace_name));
        }
        for raw in &self.telemetry.devices {
            let path: DevicePath = match raw.parse() {
                Ok(path) => path,
                Err(err) => return invalid(format!("watched device: {err}")),
            };
            let exists = self
                .nodes
                .get(path.node.raw() as usize)
                .is_some_and(|node| path.device.raw() < node.devices);
            if !exists {
                return invalid(format!("watched device {path} is not configured"));
            }
        }
        if let DistanceReference::Fixed(node) = self.telemetry.distance_reference {
            if u64::from(node.raw()) >= node_count {
                return invalid(format!("distance reference {node} is not a configured node"));
            }
        }
        Ok(())
    }

    /// The traffic source as a node id.
    pub fn source_node(&self) -> NodeId {
        NodeId::new(self.traffic.source)
    }

    /// The configured trace name. Falls back to the monitor-sniff trace if
    /// the configuration was never validated.
    pub fn trace_name(&self) -> TraceName {
        TraceName::new(self.telemetry.trace_name.as_str())
            .unwrap_or(TraceName::MONITOR_SNIFF_RX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_star_defaults() {
        let config = ScenarioConfig::from_toml_str("").unwrap();
        assert_eq!(config, ScenarioConfig::default());
        assert_eq!(config.nodes.len(), 3);
        assert_eq!(config.nodes[1].position, Position::new(5.0, 5.0, 0.0));
        assert_eq!(config.traffic.interval_nanos(), 8_000_000);
        assert_eq!(config.trace_name(), TraceName::MONITOR_SNIFF_RX);
    }

    #[test]
    fn test_parse_full_file() {
        let raw = r#"
            stop-time = 2.5

            [[nodes]]
            name = "ap"

            [[nodes]]
            name = "far"
            position = { x = 30.0, y = 40.0, z = 0.0 }
            devices = 2

            [traffic]
            source = 1
            start = 0.5
            stop = 2.0
            data-rate-bps = 64000
            packet-size = 200

            [channel]
            path-loss-exponent = 2.0

            [telemetry]
            distance-reference = { fixed = 0 }
        "#;
        let config = ScenarioConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.stop_time, 2.5);
        assert_eq!(config.nodes[1].devices, 2);
        assert_eq!(config.nodes[0].position, Position::ORIGIN);
        assert_eq!(config.traffic.interval_nanos(), 25_000_000);
        assert_eq!(config.channel.path_loss_exponent, 2.0);
        assert_eq!(config.channel.reference_loss_db, 46.6777);
        assert_eq!(
            config.telemetry.distance_reference,
            DistanceReference::Fixed(NodeId::new(0))
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ScenarioConfig::from_toml_str("stop-tme = 3.0").unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig(_)));
    }

    fn rejected(mutate: impl FnOnce(&mut ScenarioConfig)) -> bool {
        let mut config = ScenarioConfig::default();
        mutate(&mut config);
        matches!(config.validate(), Err(SimError::InvalidConfig(_)))
    }

    #[test]
    fn test_validation_failures() {
        assert!(rejected(|c| c.stop_time = 0.0));
        assert!(rejected(|c| c.nodes.clear()));
        assert!(rejected(|c| c.traffic.source = 7));
        assert!(rejected(|c| c.traffic.start = c.traffic.stop));
        assert!(rejected(|c| c.traffic.data_rate_bps = 0));
        assert!(rejected(|c| c.telemetry.trace_name = "Phy//Rx".into()));
        assert!(rejected(|c| {
            c.telemetry.distance_reference = DistanceReference::Fixed(NodeId::new(3))
        }));
        assert!(rejected(|c| c.nodes[0].position.x = f64::NAN));
        assert!(!rejected(|_| {}));
    }

    #[test]
    fn test_watched_devices_are_checked_up_front() {
        assert!(!rejected(|c| c.telemetry.devices = vec!["/NodeList/2/DeviceList/0".into()]));
        assert!(rejected(|c| c.telemetry.devices = vec!["/NodeList/02/DeviceList/0".into()]));
        assert!(rejected(|c| c.telemetry.devices = vec!["NodeList/1/DeviceList/0".into()]));
        assert!(rejected(|c| c.telemetry.devices = vec!["/NodeList/5/DeviceList/0".into()]));
        assert!(rejected(|c| c.telemetry.devices = vec!["/NodeList/1/DeviceList/1".into()]));

        let err = ScenarioConfig::from_toml_str(
            "[telemetry]\ndevices = [\"/NodeList/x/DeviceList/0\"]",
        )
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig(_)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ScenarioConfig::load("/nonexistent/rxtrace/scenario.toml").unwrap_err();
        assert!(matches!(err, SimError::Io(_)));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = ScenarioConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(ScenarioConfig::from_toml_str(&text).unwrap(), config);
    }
}
