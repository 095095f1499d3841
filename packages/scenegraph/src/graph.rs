//! Scene graph abstraction.
//!
//! The trait defines node CRUD, reparent/reorder, traversal, ascension,
//! event subscription and pluggable systems. Traversal and ascension
//! are provided methods: implementations only supply structure access
//! and the shared algorithms come for free.

use tracing::warn;

use crate::event::EventListener;
use crate::ids::NodeId;
use crate::metadata::{MetadataTable, NodeMetadata};
use crate::property::{NodeData, PropertyValue};

use folio_relay::{ActorId, DocumentId};

/// Returned by visitor callbacks to prune a traversal.
///
/// In `traverse`, `Stop` skips the node's children (the post-order
/// callback still fires for the node). In `ascend`, `Stop` halts the
/// walk toward the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalControl {
    Continue,
    Stop,
}

/// A pluggable behavior attached to a scene graph.
///
/// `initialize` runs once, synchronously, at registration; `update`
/// runs once per host tick, in registration order.
pub trait SceneGraphSystem<G: SceneGraph> {
    fn initialize(&mut self, graph: &mut G);
    fn update(&mut self, graph: &mut G);
}

/// Pre-order visitor: may prune by returning [`TraversalControl::Stop`].
pub type PreVisitor<'v, G, C> = dyn FnMut(NodeRef<'_, G>, &mut C) -> TraversalControl + 'v;
/// Post-order visitor.
pub type PostVisitor<'v, G, C> = dyn FnMut(NodeRef<'_, G>, &mut C) + 'v;

/// Tree-shaped document with identified nodes, typed properties and
/// change events.
pub trait SceneGraph: Sized {
    /// Id of the distinguished root node. `None` while a replicated
    /// graph attached to a shared document is still empty.
    fn root_id(&self) -> Option<NodeId>;

    /// Replica identity of this process.
    fn actor_id(&self) -> ActorId;

    /// Stable handle of the document, derived from the root node's id.
    fn document_id(&self) -> Option<DocumentId>;

    fn contains(&self, id: &NodeId) -> bool;

    /// The node's active parent, if linked into the tree.
    fn parent_of(&self, id: &NodeId) -> Option<NodeId>;

    /// Child ids in order; insertion order defines traversal order.
    fn children_of(&self, id: &NodeId) -> Vec<NodeId>;

    fn property(&self, id: &NodeId, key: &str) -> Option<PropertyValue>;

    /// Write a property. Returns `false` (and warns) for a missing node
    /// or a structural key; emits `propertyChanged` only when the
    /// stored value actually differed.
    fn set_property(&mut self, id: &NodeId, key: &str, value: PropertyValue) -> bool;

    /// Create a node and link it under `parent` (parentless when
    /// `None`). Returns `None` when the parent does not exist.
    fn create_node(&mut self, data: NodeData, parent: Option<&NodeId>) -> Option<NodeId>;

    /// Unlink a node from its parent. Descendants are not destroyed;
    /// callers cascade removal themselves if desired.
    fn remove_node(&mut self, id: &NodeId);

    fn reparent_node(&mut self, id: &NodeId, new_parent: &NodeId);

    fn move_node_before(&mut self, id: &NodeId, sibling: &NodeId);

    fn move_node_after(&mut self, id: &NodeId, sibling: &NodeId);

    fn subscribe(&mut self, listener: EventListener);

    fn add_system(&mut self, system: Box<dyn SceneGraphSystem<Self>>);

    /// Run all registered systems once, in registration order.
    fn update(&mut self);

    /// The transient, non-replicated metadata side-table.
    fn metadata(&self) -> &MetadataTable;

    // ------------------------------------------------------------------
    // Provided methods
    // ------------------------------------------------------------------

    /// Accessor handle bound to a node id; every read resolves against
    /// the current document state.
    fn node(&self, id: &NodeId) -> Option<NodeRef<'_, Self>> {
        self.contains(id).then(|| NodeRef {
            graph: self,
            id: id.clone(),
        })
    }

    fn root(&self) -> Option<NodeRef<'_, Self>> {
        self.root_id().and_then(|id| self.node(&id))
    }

    /// Whether `ancestor` lies on the parent chain of `node`.
    fn is_ancestor_of(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        let mut current = self.parent_of(node);
        while let Some(id) = current {
            if &id == ancestor {
                return true;
            }
            current = self.parent_of(&id);
        }
        false
    }

    /// Depth-first pre/post-order traversal from `start` (the root when
    /// `None`). The caller-supplied `context` is threaded through every
    /// visit, which is how a single top-down pass accumulates state
    /// without globals.
    fn traverse<C>(
        &self,
        start: Option<&NodeId>,
        context: &mut C,
        pre: &mut PreVisitor<'_, Self, C>,
        post: &mut PostVisitor<'_, Self, C>,
    ) {
        let start_id = match start {
            Some(id) => Some(id.clone()),
            None => self.root_id(),
        };
        let Some(start_id) = start_id.filter(|id| self.contains(id)) else {
            warn!(
                "Scene graph traversal from {} not possible because it does not exist",
                start.map_or_else(|| "rootNode".to_string(), ToString::to_string)
            );
            return;
        };
        visit_down(self, &start_id, context, pre, post);
    }

    /// Walk from `start` toward the root, invoking `pre` at each level
    /// on the way up and `post` on the unwind.
    fn ascend<C>(
        &self,
        start: &NodeId,
        context: &mut C,
        pre: &mut PreVisitor<'_, Self, C>,
        post: &mut PostVisitor<'_, Self, C>,
    ) {
        if !self.contains(start) {
            warn!("Scene graph ascension from node {start} not possible because it does not exist.");
            return;
        }
        visit_up(self, start, context, pre, post);
    }
}

fn visit_down<G: SceneGraph, C>(
    graph: &G,
    id: &NodeId,
    context: &mut C,
    pre: &mut PreVisitor<'_, G, C>,
    post: &mut PostVisitor<'_, G, C>,
) {
    let command = pre(
        NodeRef {
            graph,
            id: id.clone(),
        },
        context,
    );

    if command != TraversalControl::Stop {
        for child in graph.children_of(id) {
            visit_down(graph, &child, context, pre, post);
        }
    }

    post(
        NodeRef {
            graph,
            id: id.clone(),
        },
        context,
    );
}

fn visit_up<G: SceneGraph, C>(
    graph: &G,
    id: &NodeId,
    context: &mut C,
    pre: &mut PreVisitor<'_, G, C>,
    post: &mut PostVisitor<'_, G, C>,
) {
    let command = pre(
        NodeRef {
            graph,
            id: id.clone(),
        },
        context,
    );

    if command != TraversalControl::Stop {
        if let Some(parent) = graph.parent_of(id) {
            visit_up(graph, &parent, context, pre, post);
        }
    }

    post(
        NodeRef {
            graph,
            id: id.clone(),
        },
        context,
    );
}

/// Read accessor bound to a node id.
///
/// Fields are computed views over current document state, not stored
/// snapshots: `parent`, `children` and properties are resolved on every
/// call. Structural links are read-only through this handle; change
/// them through the graph's reparent/move methods.
pub struct NodeRef<'a, G: SceneGraph> {
    graph: &'a G,
    id: NodeId,
}

impl<'a, G: SceneGraph> NodeRef<'a, G> {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn graph(&self) -> &'a G {
        self.graph
    }

    pub fn parent(&self) -> Option<NodeRef<'a, G>> {
        self.graph
            .parent_of(&self.id)
            .and_then(|id| self.graph.node(&id))
    }

    pub fn children(&self) -> Vec<NodeRef<'a, G>> {
        self.graph
            .children_of(&self.id)
            .into_iter()
            .filter_map(|id| self.graph.node(&id))
            .collect()
    }

    pub fn property(&self, key: &str) -> Option<PropertyValue> {
        self.graph.property(&self.id, key)
    }

    /// Snapshot of this node's derived metadata.
    pub fn metadata(&self) -> NodeMetadata {
        self.graph.metadata().get(&self.id)
    }

    /// Mutate this node's metadata entry in the shared side-table.
    pub fn update_metadata(&self, f: impl FnOnce(&mut NodeMetadata)) {
        self.graph.metadata().update(&self.id, f);
    }
}

impl<G: SceneGraph> Clone for NodeRef<'_, G> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph,
            id: self.id.clone(),
        }
    }
}

impl<G: SceneGraph> std::fmt::Debug for NodeRef<'_, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef").field("id", &self.id).finish()
    }
}
