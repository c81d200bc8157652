//! Registry tests: id assignment, device attachment and path resolution.

use crate::entity::{DeviceIndex, DevicePath, EntityKind, EntityRegistry, NodeId};
use crate::error::SimError;

#[test]
fn test_node_ids_are_dense() {
    let mut reg = EntityRegistry::new();
    let a = reg.create_node();
    let b = reg.create_node();
    let c = reg.create_node();
    assert_eq!((a.raw(), b.raw(), c.raw()), (0, 1, 2));
    assert_eq!(reg.node_count(), 3);
}

#[test]
fn test_device_indices_are_per_node() {
    let mut reg = EntityRegistry::new();
    let n0 = reg.create_node();
    let n1 = reg.create_node();

    assert_eq!(reg.attach_device(n1).unwrap(), DeviceIndex::new(0));
    assert_eq!(reg.attach_device(n0).unwrap(), DeviceIndex::new(0));
    assert_eq!(reg.attach_device(n1).unwrap(), DeviceIndex::new(1));

    assert_eq!(reg.device_count(n0).unwrap(), 1);
    assert_eq!(reg.device_count(n1).unwrap(), 2);
}

#[test]
fn test_attach_to_unknown_node_fails() {
    let mut reg = EntityRegistry::new();
    reg.create_node();
    let err = reg.attach_device(NodeId::new(5)).unwrap_err();
    assert!(matches!(err, SimError::NodeNotFound(n) if n == NodeId::new(5)));
    // The failed attach must not leave a dangling entity behind.
    assert_eq!(reg.entities().len(), 1);
}

#[test]
fn test_resolve_path_after_registration() {
    let mut reg = EntityRegistry::new();
    reg.create_node();
    let n1 = reg.create_node();
    reg.attach_device(n1).unwrap();

    let dev = reg.resolve_path("/NodeList/1/DeviceList/0").unwrap();
    assert_eq!(dev.node(), NodeId::new(1));
    assert_eq!(dev.index(), DeviceIndex::new(0));

    let entity = reg.entity(dev.entity).unwrap();
    assert_eq!(entity.kind, EntityKind::Device);
    assert_eq!(entity.parent, Some(n1));
}

#[test]
fn test_resolve_unknown_node_or_device() {
    let mut reg = EntityRegistry::new();
    reg.create_node();
    let n1 = reg.create_node();
    reg.attach_device(n1).unwrap();

    let err = reg.resolve_path("/NodeList/9/DeviceList/0").unwrap_err();
    assert!(matches!(err, SimError::UnresolvedPath(ref p) if p == "/NodeList/9/DeviceList/0"));

    // Node 0 exists but has no devices.
    let err = reg.resolve_path("/NodeList/0/DeviceList/0").unwrap_err();
    assert!(matches!(err, SimError::UnresolvedPath(_)));

    let err = reg.resolve_path("/NodeList/1/DeviceList/1").unwrap_err();
    assert!(matches!(err, SimError::UnresolvedPath(_)));
}

#[test]
fn test_resolve_malformed_path() {
    let mut reg = EntityRegistry::new();
    let n0 = reg.create_node();
    reg.attach_device(n0).unwrap();

    let err = reg.resolve_path("/NodeList/0/DeviceList/0/").unwrap_err();
    assert!(matches!(err, SimError::MalformedPath { .. }));
    let err = reg.resolve_path("/NodeList/0").unwrap_err();
    assert!(matches!(err, SimError::MalformedPath { .. }));
}

#[test]
fn test_entity_ids_span_nodes_and_devices() {
    let mut reg = EntityRegistry::new();
    let n0 = reg.create_node();
    reg.attach_device(n0).unwrap();
    let n1 = reg.create_node();

    let kinds: Vec<_> = reg.entities().iter().map(|e| (e.id.raw(), e.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            (0, EntityKind::Node),
            (1, EntityKind::Device),
            (2, EntityKind::Node)
        ]
    );
    assert_eq!(reg.node_entity(n1).unwrap().id.raw(), 2);
}

#[test]
fn test_device_paths_enumeration() {
    let mut reg = EntityRegistry::new();
    let n0 = reg.create_node();
    let n1 = reg.create_node();
    reg.attach_device(n0).unwrap();
    reg.attach_device(n1).unwrap();
    reg.attach_device(n1).unwrap();

    let paths: Vec<String> = reg.device_paths().iter().map(DevicePath::to_string).collect();
    assert_eq!(
        paths,
        vec![
            "/NodeList/0/DeviceList/0",
            "/NodeList/1/DeviceList/0",
            "/NodeList/1/DeviceList/1",
        ]
    );
    for p in reg.device_paths() {
        assert!(reg.resolve(p).is_ok());
    }
}

#[test]
fn test_reset_clears_everything() {
    let mut reg = EntityRegistry::new();
    let n0 = reg.create_node();
    reg.attach_device(n0).unwrap();
    reg.reset();
    assert_eq!(reg.node_count(), 0);
    assert!(reg.entities().is_empty());
    assert_eq!(reg.create_node(), NodeId::new(0));
}
