//! `EntityRegistry` owns the node/device table and resolves paths.

use tracing::debug;

use crate::error::{SimError, SimResult};

use super::id::{DeviceIndex, EntityId, NodeId};
use super::path::DevicePath;

/// What an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Device,
}

/// One registered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// The owning node, for devices.
    pub parent: Option<NodeId>,
}

/// A resolved reference to a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceRef {
    pub entity: EntityId,
    pub path: DevicePath,
}

impl DeviceRef {
    #[inline]
    pub fn node(&self) -> NodeId {
        self.path.node
    }

    #[inline]
    pub fn index(&self) -> DeviceIndex {
        self.path.device
    }
}

#[derive(Debug, Clone)]
struct NodeSlot {
    entity: EntityId,
    devices: Vec<EntityId>,
}

/// Table of simulated nodes and their attached devices.
///
/// Ids are dense and handed out in registration order; entities live
/// until the registry itself is dropped or replaced. One registry belongs
/// to one simulation instance.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
    nodes: Vec<NodeSlot>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new node and return its id.
    pub fn create_node(&mut self) -> NodeId {
        let node = NodeId::new(self.nodes.len() as u32);
        let entity = self.push_entity(EntityKind::Node, None);
        self.nodes.push(NodeSlot {
            entity,
            devices: Vec::new(),
        });
        debug!(%node, %entity, "node created");
        node
    }

    /// Attach a new device to `node`; indices count from 0 per node.
    pub fn attach_device(&mut self, node: NodeId) -> SimResult<DeviceIndex> {
        if node.index() >= self.nodes.len() {
            return Err(SimError::NodeNotFound(node));
        }
        let entity = self.push_entity(EntityKind::Device, Some(node));
        let slot = &mut self.nodes[node.index()];
        let index = DeviceIndex::new(slot.devices.len() as u32);
        slot.devices.push(entity);
        debug!(%node, device = %index, %entity, "device attached");
        Ok(index)
    }

    /// Parse and resolve a `/NodeList/<n>/DeviceList/<d>` string.
    ///
    /// Fails with `MalformedPath` on any grammar deviation and with
    /// `UnresolvedPath` when the node or device does not exist.
    pub fn resolve_path(&self, path: &str) -> SimResult<DeviceRef> {
        let parsed: DevicePath = path.parse()?;
        self.resolve(parsed)
    }

    /// Resolve an already parsed device path.
    pub fn resolve(&self, path: DevicePath) -> SimResult<DeviceRef> {
        let entity = self
            .nodes
            .get(path.node.index())
            .and_then(|slot| slot.devices.get(path.device.raw() as usize))
            .copied()
            .ok_or_else(|| SimError::UnresolvedPath(path.to_string()))?;
        Ok(DeviceRef { entity, path })
    }

    /// Every registered device path, node by node in registration order.
    pub fn device_paths(&self) -> Vec<DevicePath> {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(n, slot)| {
                (0..slot.devices.len()).map(move |d| {
                    DevicePath::new(NodeId::new(n as u32), DeviceIndex::new(d as u32))
                })
            })
            .collect()
    }

    /// Whether `node` is registered.
    pub fn contains_node(&self, node: NodeId) -> bool {
        node.index() < self.nodes.len()
    }

    /// The entity record of a registered node.
    pub fn node_entity(&self, node: NodeId) -> SimResult<Entity> {
        let slot = self
            .nodes
            .get(node.index())
            .ok_or(SimError::NodeNotFound(node))?;
        Ok(self.entities[slot.entity.raw() as usize])
    }

    /// Look up any entity by its registry-wide id.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.raw() as usize)
    }

    /// All entities in registration order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of devices on `node`.
    pub fn device_count(&self, node: NodeId) -> SimResult<usize> {
        self.nodes
            .get(node.index())
            .map(|slot| slot.devices.len())
            .ok_or(SimError::NodeNotFound(node))
    }

    /// Drop every node and device.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.nodes.clear();
    }

    fn push_entity(&mut self, kind: EntityKind, parent: Option<NodeId>) -> EntityId {
        let id = EntityId::new(self.entities.len() as u32);
        self.entities.push(Entity { id, kind, parent });
        id
    }
}
