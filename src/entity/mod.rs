//! Simulated nodes, their devices, and the paths that address them.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`NodeId`], [`DeviceIndex`], [`EntityId`] newtypes |
//! | [`path`] | [`DevicePath`], [`TracePath`], [`TraceName`] and their grammar |
//! | [`registry`] | [`EntityRegistry`] |

pub mod id;
pub mod path;
pub mod registry;

pub use id::{DeviceIndex, EntityId, NodeId};
pub use path::{DevicePath, TraceName, TracePath};
pub use registry::{DeviceRef, Entity, EntityKind, EntityRegistry};

#[cfg(test)]
mod tests;
