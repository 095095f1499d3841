//! Layout facade and per-kind geometry.
//!
//! `local_bounding_rectangle` / `is_point_inside` dispatch exhaustively
//! on [`NodeKind`]; the [`Layout`] facade wraps a scene graph with
//! typed creation and the grouping conveniences.

use tracing::warn;

use folio_geometry::{BoundingRect, Vec2};
use folio_relay::{DocumentId, RelayTransport};
use folio_scenegraph::{
    LocalSceneGraph, NodeId, NodeRef, ReplicatedSceneGraph, SceneGraph, Synchronizer,
};

use crate::data::{keys, LayoutData, PageData, ShapeStyle};
use crate::kind::{LayoutNode, NodeKind};

fn read_number<G: SceneGraph>(node: &NodeRef<'_, G>, key: &str, default: f64) -> f64 {
    node.property(key)
        .and_then(|value| value.as_f64())
        .unwrap_or(default)
}

/// Local-space bounding rectangle of a drawable node, stroke included.
/// `None` for kinds without intrinsic bounds.
pub fn local_bounding_rectangle<G: SceneGraph>(node: &NodeRef<'_, G>) -> Option<BoundingRect> {
    match node.kind()? {
        NodeKind::Page => {
            let page = PageData::read(node);
            Some(BoundingRect::new(0.0, 0.0, page.width, page.height))
        }
        NodeKind::Rectangle => {
            let width = read_number(node, keys::WIDTH, 1.0);
            let height = read_number(node, keys::HEIGHT, 1.0);
            let half_stroke = ShapeStyle::read(node).stroke_width / 2.0;
            Some(BoundingRect::new(
                -half_stroke,
                -half_stroke,
                width + 2.0 * half_stroke,
                height + 2.0 * half_stroke,
            ))
        }
        NodeKind::Circle => {
            let r = read_number(node, keys::R, 1.0);
            let bounding_radius = r + ShapeStyle::read(node).stroke_width / 2.0;
            Some(BoundingRect::new(
                -bounding_radius,
                -bounding_radius,
                2.0 * bounding_radius,
                2.0 * bounding_radius,
            ))
        }
        NodeKind::Ellipse => {
            let rx = read_number(node, keys::RX, 1.0);
            let ry = read_number(node, keys::RY, 1.0);
            let half_stroke = ShapeStyle::read(node).stroke_width / 2.0;
            Some(BoundingRect::new(
                -(rx + half_stroke),
                -(ry + half_stroke),
                2.0 * (rx + half_stroke),
                2.0 * (ry + half_stroke),
            ))
        }
        NodeKind::Root
        | NodeKind::Binding
        | NodeKind::Transform
        | NodeKind::Group
        | NodeKind::Image => None,
    }
}

/// Local-space hit test for the shape kinds.
pub fn is_point_inside<G: SceneGraph>(node: &NodeRef<'_, G>, point: Vec2) -> bool {
    match node.kind() {
        Some(NodeKind::Rectangle) => {
            let width = read_number(node, keys::WIDTH, 1.0);
            let height = read_number(node, keys::HEIGHT, 1.0);
            let half_stroke = ShapeStyle::read(node).stroke_width / 2.0;
            point.x > -half_stroke
                && point.x < width + half_stroke
                && point.y > -half_stroke
                && point.y < height + half_stroke
        }
        Some(NodeKind::Circle) => {
            let r = read_number(node, keys::R, 1.0);
            let stroke_width = ShapeStyle::read(node).stroke_width;
            point.length() < r + stroke_width / 2.0
        }
        Some(NodeKind::Ellipse) => {
            let rx = read_number(node, keys::RX, 1.0);
            let ry = read_number(node, keys::RY, 1.0);
            (point.x * point.x) / (rx * rx) + (point.y * point.y) / (ry * ry) <= 1.0
        }
        _ => false,
    }
}

/// Typed wrapper over a scene graph: the page-layout document.
pub struct Layout<G: SceneGraph> {
    graph: G,
}

impl Layout<ReplicatedSceneGraph> {
    /// Fresh collaborative document with a synchronizer attached.
    pub fn replicated<T: RelayTransport + 'static>(transport: T) -> Self {
        let mut graph = ReplicatedSceneGraph::new(LayoutData::Root.into_node_data());
        graph.add_system(Box::new(Synchronizer::new(transport)));
        Self { graph }
    }

    /// Join an existing collaborative session by document id.
    pub fn join<T: RelayTransport + 'static>(document_id: DocumentId, transport: T) -> Self {
        let mut graph = ReplicatedSceneGraph::attach(document_id);
        graph.add_system(Box::new(Synchronizer::new(transport)));
        Self { graph }
    }
}

impl Layout<LocalSceneGraph> {
    /// Single-user, offline document.
    pub fn local() -> Self {
        Self {
            graph: LocalSceneGraph::new(LayoutData::Root.into_node_data()),
        }
    }
}

impl<G: SceneGraph> Layout<G> {
    pub fn from_graph(graph: G) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    /// Create a typed node, under the root when no parent is given.
    pub fn create_node(&mut self, data: LayoutData, parent: Option<&NodeId>) -> Option<NodeId> {
        let parent = match parent {
            Some(id) => Some(id.clone()),
            None => self.graph.root_id(),
        };
        self.graph
            .create_node(data.into_node_data(), parent.as_ref())
    }

    pub fn remove_node(&mut self, node: &NodeId) {
        self.graph.remove_node(node);
    }

    pub fn reparent_node(&mut self, node: &NodeId, new_parent: &NodeId) {
        self.graph.reparent_node(node, new_parent);
    }

    pub fn move_node_before(&mut self, node: &NodeId, sibling: &NodeId) {
        self.graph.move_node_before(node, sibling);
    }

    pub fn move_node_after(&mut self, node: &NodeId, sibling: &NodeId) {
        self.graph.move_node_after(node, sibling);
    }

    pub fn kind_of(&self, node: &NodeId) -> Option<NodeKind> {
        self.graph.node(node).and_then(|node| node.kind())
    }

    /// Wrap same-level nodes in a new Group. All nodes must share one
    /// parent; otherwise nothing happens.
    pub fn group_nodes(&mut self, nodes: &[NodeId]) -> Option<NodeId> {
        let mut parent = None;
        for node in nodes {
            let node_parent = self.graph.parent_of(node)?;
            match &parent {
                None => parent = Some(node_parent),
                Some(existing) if *existing != node_parent => {
                    warn!("Cannot group nodes from different levels");
                    return None;
                }
                Some(_) => {}
            }
        }
        let parent = parent?;

        let group = self
            .graph
            .create_node(
                LayoutData::Group(Default::default()).into_node_data(),
                Some(&parent),
            )?;
        for node in nodes {
            self.graph.reparent_node(node, &group);
        }
        Some(group)
    }

    /// Dissolve a Group: hoist its children to its parent (or the
    /// root), then remove it.
    pub fn ungroup_node(&mut self, node: &NodeId) {
        if self.kind_of(node) != Some(NodeKind::Group) {
            return;
        }

        let target = match self.graph.parent_of(node).or_else(|| self.graph.root_id()) {
            Some(target) => target,
            None => return,
        };
        for child in self.graph.children_of(node) {
            self.graph.reparent_node(&child, &target);
        }
        self.graph.remove_node(node);
    }
}
