//! Non-replicated scene graph.
//!
//! Identical observable behavior to the replicated variant, backed by a
//! plain in-memory node table with sequential local ids. Used for
//! single-user, offline and test scenarios; it cannot join a shared
//! document. Traversal, ascension and the no-op rules are shared with
//! the replicated variant through the trait's provided methods.

use std::collections::HashMap;

use tracing::{error, warn};

use folio_relay::{ActorId, DocumentId};

use crate::event::{EventListener, SceneGraphEvent};
use crate::graph::{SceneGraph, SceneGraphSystem};
use crate::ids::NodeId;
use crate::metadata::MetadataTable;
use crate::property::{NodeData, PropertyValue};

const LOCAL_ACTOR: &str = "localActor";

#[derive(Debug, Default)]
struct LocalNode {
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
    properties: HashMap<String, PropertyValue>,
}

/// In-memory scene graph with purely local identity generation.
pub struct LocalSceneGraph {
    nodes: HashMap<NodeId, LocalNode>,
    root_id: Option<NodeId>,
    next_id: u64,
    metadata: MetadataTable,
    listeners: Vec<EventListener>,
    systems: Vec<Box<dyn SceneGraphSystem<Self>>>,
}

impl LocalSceneGraph {
    pub fn new(root_data: NodeData) -> Self {
        let mut graph = Self {
            nodes: HashMap::new(),
            root_id: None,
            next_id: 0,
            metadata: MetadataTable::new(),
            listeners: Vec::new(),
            systems: Vec::new(),
        };
        let root_id = graph
            .create_internal(&root_data, None)
            .expect("creating a parentless root cannot fail");
        graph.root_id = Some(root_id);
        graph
    }

    /// A local graph has no synchronization; joining a shared document
    /// is not possible.
    pub fn attach(_document_id: DocumentId) -> Option<Self> {
        error!("Local scene graph cannot synchronize with existing document");
        None
    }

    fn next_node_id(&mut self) -> NodeId {
        let id = NodeId::from(self.next_id.to_string());
        self.next_id += 1;
        id
    }

    fn emit(&self, event: &SceneGraphEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    fn create_internal(&mut self, data: &NodeData, parent: Option<&NodeId>) -> Option<NodeId> {
        if let Some(parent_id) = parent {
            if !self.nodes.contains_key(parent_id) {
                warn!("Trying to add child node to {parent_id} which does not exist.");
                return None;
            }
        }

        let id = self.next_node_id();
        let mut node = LocalNode::default();
        for (key, value) in data.iter() {
            node.properties.insert(key.clone(), value.clone());
        }
        if let Some(parent_id) = parent {
            node.parents.push(parent_id.clone());
        }
        self.nodes.insert(id.clone(), node);

        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(parent_id) {
                parent_node.children.push(id.clone());
            }
        }

        Some(id)
    }

    fn unlink_internal(&mut self, id: &NodeId) -> bool {
        let Some(parents) = self.nodes.get(id).map(|node| node.parents.clone()) else {
            warn!("Trying to remove node {id} which does not exist.");
            return false;
        };

        for parent_id in &parents {
            if let Some(parent_node) = self.nodes.get_mut(parent_id) {
                parent_node.children.retain(|child| child != id);
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parents.clear();
        }
        true
    }

    fn reparent_internal(&mut self, id: &NodeId, new_parent: &NodeId) -> bool {
        if !self.nodes.contains_key(id) || !self.nodes.contains_key(new_parent) {
            warn!("Trying to reparent {id} to {new_parent} but at least one does not exist.");
            return false;
        }

        self.unlink_internal(id);

        if let Some(node) = self.nodes.get_mut(id) {
            node.parents.push(new_parent.clone());
        }
        if let Some(parent_node) = self.nodes.get_mut(new_parent) {
            parent_node.children.push(id.clone());
        }
        true
    }

    fn move_relative_internal(&mut self, id: &NodeId, sibling: &NodeId, after: bool) -> bool {
        if !self.nodes.contains_key(id) || !self.nodes.contains_key(sibling) {
            warn!("Trying to move {id} relative to {sibling} but at least one does not exist.");
            return false;
        }
        let Some(target_parent) = self.parent_of(sibling) else {
            warn!("Trying to move {id} relative to {sibling} which has no parent.");
            return false;
        };

        if self.parent_of(id).as_ref() != Some(&target_parent)
            && !self.reparent_internal(id, &target_parent)
        {
            return false;
        }

        let Some(parent_node) = self.nodes.get_mut(&target_parent) else {
            return false;
        };
        parent_node.children.retain(|child| child != id);
        let Some(sibling_index) = parent_node
            .children
            .iter()
            .position(|child| child == sibling)
        else {
            return false;
        };
        let insert_at = if after { sibling_index + 1 } else { sibling_index };
        parent_node.children.insert(insert_at, id.clone());
        true
    }

    fn move_is_noop(&self, id: &NodeId, sibling: &NodeId) -> bool {
        if id == sibling {
            return true;
        }
        match self.parent_of(sibling) {
            Some(target_parent) => {
                target_parent == *id || self.is_ancestor_of(id, &target_parent)
            }
            None => false,
        }
    }
}

impl SceneGraph for LocalSceneGraph {
    fn root_id(&self) -> Option<NodeId> {
        self.root_id.clone()
    }

    fn actor_id(&self) -> ActorId {
        ActorId::from(LOCAL_ACTOR)
    }

    fn document_id(&self) -> Option<DocumentId> {
        self.root_id.as_ref().map(NodeId::to_document_id)
    }

    fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    fn parent_of(&self, id: &NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parents.first().cloned()
    }

    fn children_of(&self, id: &NodeId) -> Vec<NodeId> {
        self.nodes
            .get(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn property(&self, id: &NodeId, key: &str) -> Option<PropertyValue> {
        self.nodes.get(id)?.properties.get(key).cloned()
    }

    fn set_property(&mut self, id: &NodeId, key: &str, value: PropertyValue) -> bool {
        if key == "parents" || key == "children" {
            warn!(
                "Modifying parent/children properties of node {id} is not allowed, \
                 use appropriate SceneGraph methods instead."
            );
            return false;
        }

        let Some(node) = self.nodes.get_mut(id) else {
            warn!("Trying to set property {key} on node {id} which does not exist.");
            return false;
        };

        let changed = node.properties.get(key) != Some(&value);
        if changed {
            node.properties.insert(key.to_string(), value);
            self.emit(&SceneGraphEvent::PropertyChanged {
                node_id: id.clone(),
                property: key.to_string(),
            });
        }
        true
    }

    fn create_node(&mut self, data: NodeData, parent: Option<&NodeId>) -> Option<NodeId> {
        let created = self.create_internal(&data, parent);
        if let Some(id) = &created {
            self.emit(&SceneGraphEvent::NodeCreated {
                node_id: id.clone(),
                node_ids: None,
            });
        }
        created
    }

    fn remove_node(&mut self, id: &NodeId) {
        if self.unlink_internal(id) {
            self.emit(&SceneGraphEvent::NodeMoved {
                node_id: id.clone(),
            });
        }
    }

    fn reparent_node(&mut self, id: &NodeId, new_parent: &NodeId) {
        if id == new_parent
            || self.parent_of(id).as_ref() == Some(new_parent)
            || self.is_ancestor_of(id, new_parent)
        {
            return;
        }

        if self.reparent_internal(id, new_parent) {
            self.emit(&SceneGraphEvent::NodeMoved {
                node_id: id.clone(),
            });
        }
    }

    fn move_node_before(&mut self, id: &NodeId, sibling: &NodeId) {
        if self.move_is_noop(id, sibling) {
            return;
        }
        if self.move_relative_internal(id, sibling, false) {
            self.emit(&SceneGraphEvent::NodeMoved {
                node_id: id.clone(),
            });
        }
    }

    fn move_node_after(&mut self, id: &NodeId, sibling: &NodeId) {
        if self.move_is_noop(id, sibling) {
            return;
        }
        if self.move_relative_internal(id, sibling, true) {
            self.emit(&SceneGraphEvent::NodeMoved {
                node_id: id.clone(),
            });
        }
    }

    fn subscribe(&mut self, listener: EventListener) {
        self.listeners.push(listener);
    }

    fn add_system(&mut self, mut system: Box<dyn SceneGraphSystem<Self>>) {
        system.initialize(self);
        self.systems.push(system);
    }

    fn update(&mut self) {
        let mut systems = std::mem::take(&mut self.systems);
        for system in &mut systems {
            system.update(self);
        }
        systems.append(&mut self.systems);
        self.systems = systems;
    }

    fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }
}
