//! Node positions for the mobility collaborator.
//!
//! The core never moves nodes itself. It asks a [`MobilityModel`] where a
//! node is when it needs a distance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::NodeId;

/// Cartesian position in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const ORIGIN: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Position { x, y, z }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Position lookup. `None` means the node is unknown to the model.
pub trait MobilityModel {
    fn position(&self, node: NodeId) -> Option<Position>;
}

impl<F> MobilityModel for F
where
    F: Fn(NodeId) -> Option<Position>,
{
    fn position(&self, node: NodeId) -> Option<Position> {
        (self)(node)
    }
}

/// Nodes that never move.
#[derive(Debug, Clone, Default)]
pub struct ConstantPositions {
    positions: BTreeMap<NodeId, Position>,
}

impl ConstantPositions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place (or move) `node`.
    pub fn set(&mut self, node: NodeId, position: Position) {
        self.positions.insert(node, position);
    }

    pub fn with(mut self, node: NodeId, position: Position) -> Self {
        self.set(node, position);
        self
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl MobilityModel for ConstantPositions {
    fn position(&self, node: NodeId) -> Option<Position> {
        self.positions.get(&node).copied()
    }
}
