//! Per-node derived metadata.
//!
//! Metadata is transient and never replicated: it is owned by whichever
//! cache computed it, shared-read by renderer and tool collaborators,
//! and rebuildable from properties plus structure at any time. Entries
//! appear lazily on first write and are wholly superseded on each cache
//! recomputation pass.

use std::cell::RefCell;
use std::collections::HashMap;

use folio_geometry::{BoundingRect, Mat3};

use crate::ids::NodeId;

/// Derived attributes of one node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeMetadata {
    /// Cumulative affine transform into the root's coordinate space.
    pub world_transform: Option<Mat3>,
    /// Inverse of the world transform, cached for hit-testing. `None`
    /// when the world transform is singular.
    pub inverse_world_transform: Option<Mat3>,
    /// World-space bounding rectangle (possibly rotated).
    pub bounding_rectangle: Option<BoundingRect>,
    /// Axis-aligned world-space bounding rectangle.
    pub aligned_bounding_rectangle: Option<BoundingRect>,
}

/// Side-table of node metadata, keyed by node id.
///
/// Interior-mutable so cache visitors can write entries while a
/// read-only traversal borrows the graph. Single-threaded by design.
#[derive(Debug, Default)]
pub struct MetadataTable {
    entries: RefCell<HashMap<NodeId, NodeMetadata>>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a node's metadata; default entry if none exists yet.
    pub fn get(&self, id: &NodeId) -> NodeMetadata {
        self.entries.borrow().get(id).copied().unwrap_or_default()
    }

    /// Mutate (lazily creating) a node's metadata entry.
    pub fn update(&self, id: &NodeId, f: impl FnOnce(&mut NodeMetadata)) {
        let mut entries = self.entries.borrow_mut();
        f(entries.entry(id.clone()).or_default());
    }

    /// World transform with the identity as default. Cache visitors
    /// must never assume inputs are present on a first pass.
    pub fn world_transform(&self, id: &NodeId) -> Mat3 {
        self.get(id).world_transform.unwrap_or_else(Mat3::identity)
    }

    pub fn aligned_bounding_rectangle(&self, id: &NodeId) -> Option<BoundingRect> {
        self.get(id).aligned_bounding_rectangle
    }

    /// Drop every entry. Metadata is a cache; this is always safe.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
