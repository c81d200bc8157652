//! Hierarchical path strings for devices and trace sources.
//!
//! The grammar is strict: `/NodeList/<n>/DeviceList/<d>` for a
//! device, followed by `/<Segment>/...` for a trace source. Indices are
//! plain decimal without sign or leading zeros, so every path has exactly
//! one spelling and `Display` round-trips through `FromStr`.

use std::borrow::Cow;
use std::str::FromStr;

use crate::error::{SimError, SimResult};

use super::id::{DeviceIndex, NodeId};

const NODE_LIST: &str = "NodeList";
const DEVICE_LIST: &str = "DeviceList";

// ── DevicePath ────────────────────────────────────────────────────────

/// Address of one device: `/NodeList/<node>/DeviceList/<index>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevicePath {
    pub node: NodeId,
    pub device: DeviceIndex,
}

impl DevicePath {
    pub fn new(node: NodeId, device: DeviceIndex) -> Self {
        DevicePath { node, device }
    }

    /// The trace source `name` on this device.
    pub fn trace(self, name: TraceName) -> TracePath {
        TracePath { device: self, name }
    }
}

impl std::fmt::Display for DevicePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "/{}/{}/{}/{}",
            NODE_LIST,
            self.node.raw(),
            DEVICE_LIST,
            self.device.raw()
        )
    }
}

impl FromStr for DevicePath {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        let mut segments = split_absolute(s)?;
        let device = parse_device_prefix(s, &mut segments)?;
        if segments.next().is_some() {
            return Err(malformed(s, "unexpected trailing segments"));
        }
        Ok(device)
    }
}

// ── TraceName ─────────────────────────────────────────────────────────

/// Name of a trace source relative to its device, e.g. `Phy/MonitorSniffRx`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraceName(Cow<'static, str>);

impl TraceName {
    /// Frames received by a PHY in monitor mode.
    pub const MONITOR_SNIFF_RX: TraceName = TraceName(Cow::Borrowed("Phy/MonitorSniffRx"));

    /// Validate and wrap a trace name.
    ///
    /// Each `/`-separated segment must be non-empty and consist of ASCII
    /// letters, digits or `_`.
    pub fn new(name: impl Into<String>) -> SimResult<Self> {
        let name = name.into();
        validate_trace_segments(&name, name.split('/'))?;
        Ok(TraceName(Cow::Owned(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TraceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── TracePath ─────────────────────────────────────────────────────────

/// Fully qualified trace source: a device plus a trace name.
///
/// Subscriptions match fired signals by exact equality on this value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TracePath {
    pub device: DevicePath,
    pub name: TraceName,
}

impl TracePath {
    pub fn new(device: DevicePath, name: TraceName) -> Self {
        TracePath { device, name }
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.device.node
    }
}

impl std::fmt::Display for TracePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device, self.name)
    }
}

impl FromStr for TracePath {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        let mut segments = split_absolute(s)?;
        let device = parse_device_prefix(s, &mut segments)?;
        let rest: Vec<&str> = segments.collect();
        if rest.is_empty() {
            return Err(malformed(s, "missing trace name"));
        }
        validate_trace_segments(s, rest.iter().copied())?;
        Ok(TracePath {
            device,
            name: TraceName(Cow::Owned(rest.join("/"))),
        })
    }
}

// ── Parsing helpers ───────────────────────────────────────────────────

fn malformed(path: &str, reason: &'static str) -> SimError {
    SimError::MalformedPath {
        path: path.to_string(),
        reason,
    }
}

fn split_absolute(s: &str) -> SimResult<std::str::Split<'_, char>> {
    match s.strip_prefix('/') {
        Some(rest) => Ok(rest.split('/')),
        None => Err(malformed(s, "path must start with '/'")),
    }
}

fn parse_device_prefix<'a>(
    s: &str,
    segments: &mut impl Iterator<Item = &'a str>,
) -> SimResult<DevicePath> {
    expect_keyword(s, segments.next(), NODE_LIST)?;
    let node = parse_index(s, segments.next(), "expected a node index")?;
    expect_keyword(s, segments.next(), DEVICE_LIST)?;
    let device = parse_index(s, segments.next(), "expected a device index")?;
    Ok(DevicePath::new(NodeId::new(node), DeviceIndex::new(device)))
}

fn expect_keyword(s: &str, segment: Option<&str>, keyword: &str) -> SimResult<()> {
    match segment {
        Some(seg) if seg == keyword => Ok(()),
        _ if keyword == NODE_LIST => Err(malformed(s, "expected 'NodeList'")),
        _ => Err(malformed(s, "expected 'DeviceList'")),
    }
}

fn parse_index(s: &str, segment: Option<&str>, reason: &'static str) -> SimResult<u32> {
    let seg = segment.ok_or_else(|| malformed(s, reason))?;
    if seg.is_empty() || !seg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(s, reason));
    }
    if seg.len() > 1 && seg.starts_with('0') {
        return Err(malformed(s, "index has leading zeros"));
    }
    seg.parse::<u32>()
        .map_err(|_| malformed(s, "index out of range"))
}

fn validate_trace_segments<'a>(
    s: &str,
    segments: impl Iterator<Item = &'a str>,
) -> SimResult<()> {
    for seg in segments {
        if seg.is_empty() {
            return Err(malformed(s, "empty trace segment"));
        }
        if !seg.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(malformed(s, "invalid character in trace segment"));
        }
    }
    Ok(())
}
