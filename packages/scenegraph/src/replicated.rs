//! CRDT-backed scene graph.
//!
//! The document holds two root containers: a `meta` map with the root
//! node id and a `nodes` map of node id to a node map of `parents` and
//! `children` id arrays plus the node's properties. Every mutation runs
//! inside a single write transaction so it composes with merges from
//! remote replicas; a mutation that targets a node a remote merge
//! already removed logs a warning and is dropped, never aborts.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::warn;
use uuid::Uuid;
use yrs::types::{Event, PathSegment};
use yrs::updates::decoder::Decode;
use yrs::{
    Any, Array, ArrayPrelim, ArrayRef, DeepObservable, Doc, Map, MapPrelim, MapRef, Out, ReadTxn,
    StateVector, Transact, TransactionMut, Update,
};

use folio_relay::{ActorId, DocumentId};

use crate::event::{EventListener, SceneGraphEvent};
use crate::graph::{SceneGraph, SceneGraphSystem};
use crate::ids::NodeId;
use crate::metadata::MetadataTable;
use crate::property::{NodeData, PropertyValue};
use crate::sync::SyncError;

const PARENTS: &str = "parents";
const CHILDREN: &str = "children";
const ROOT_NODE_ID: &str = "rootNodeId";

/// Scene graph replicated through a CRDT document.
pub struct ReplicatedSceneGraph {
    doc: Doc,
    nodes: MapRef,
    meta: MapRef,
    actor_id: ActorId,
    document_id: Option<DocumentId>,
    /// Bumped on every effective local mutation and every merge that
    /// changed something; lets the synchronizer tell "advanced" apart
    /// from "already seen".
    version: u64,
    metadata: MetadataTable,
    listeners: Vec<EventListener>,
    systems: Vec<Box<dyn SceneGraphSystem<Self>>>,
}

impl ReplicatedSceneGraph {
    /// Start a fresh document. The root node is created from
    /// `root_data` and its id doubles as the document id.
    pub fn new(root_data: NodeData) -> Self {
        let mut graph = Self::empty();
        let root_id = {
            let mut txn = graph.doc.transact_mut();
            let id = graph
                .create_in(&mut txn, &root_data, None)
                .expect("creating a parentless root cannot fail");
            graph.meta.insert(&mut txn, ROOT_NODE_ID, id.as_str());
            id
        };
        graph.document_id = Some(root_id.to_document_id());
        graph
    }

    /// Join an ongoing replicated session. The local document starts
    /// empty and is populated by synchronization.
    pub fn attach(document_id: DocumentId) -> Self {
        let mut graph = Self::empty();
        graph.document_id = Some(document_id);
        graph
    }

    fn empty() -> Self {
        let actor_id = ActorId::new(Uuid::new_v4().to_string());
        let doc = Doc::with_client_id(client_id_for(&actor_id));
        let nodes = doc.get_or_insert_map("nodes");
        let meta = doc.get_or_insert_map("meta");
        Self {
            doc,
            nodes,
            meta,
            actor_id,
            document_id: None,
            version: 0,
            metadata: MetadataTable::new(),
            listeners: Vec::new(),
            systems: Vec::new(),
        }
    }

    /// Current document version (local mutations + effective merges).
    pub fn version(&self) -> u64 {
        self.version
    }

    /// State vector of the local document, for delta sync.
    pub fn state_vector(&self) -> StateVector {
        self.doc.transact().state_vector()
    }

    /// v1-encoded delta containing everything the holder of `since` is
    /// missing.
    pub fn encode_update_since(&self, since: &StateVector) -> Vec<u8> {
        self.doc.transact().encode_state_as_update_v1(since)
    }

    /// Merge a remote v1 update into the document.
    ///
    /// Returns the ids of every node-table entry the merge created or
    /// changed (the merge "patch"). Undecodable or unappliable payloads
    /// surface as [`SyncError`]; forging a recovery here would risk
    /// document corruption, so the caller decides what to do with the
    /// peer.
    pub fn apply_remote_update(&mut self, update: &[u8]) -> Result<Vec<NodeId>, SyncError> {
        let update = Update::decode_v1(update).map_err(|e| SyncError::Decode(e.to_string()))?;

        let changed: Arc<Mutex<HashSet<NodeId>>> = Arc::new(Mutex::new(HashSet::new()));
        let collector = Arc::clone(&changed);
        let subscription = self.nodes.observe_deep(move |txn, events| {
            let mut ids = collector.lock().expect("change collector poisoned");
            for event in events.iter() {
                // A nested change carries the node id as the first path
                // segment; a change to the node table itself lists the
                // affected keys directly.
                match event.path().front() {
                    Some(PathSegment::Key(key)) => {
                        ids.insert(NodeId::from(key.as_ref()));
                    }
                    _ => {
                        if let Event::Map(map_event) = event {
                            for key in map_event.keys(txn).keys() {
                                ids.insert(NodeId::from(key.as_ref()));
                            }
                        }
                    }
                }
            }
        });

        let result = {
            let mut txn = self.doc.transact_mut();
            txn.apply_update(update)
        };
        drop(subscription);
        result.map_err(|e| SyncError::Apply(e.to_string()))?;

        let ids: Vec<NodeId> = changed
            .lock()
            .expect("change collector poisoned")
            .drain()
            .collect();
        if !ids.is_empty() {
            self.version += 1;
        }
        Ok(ids)
    }

    /// Re-emit a batch of remotely changed nodes as one `nodeCreated`
    /// event carrying the full id list. Remote create and update are
    /// intentionally conflated: downstream caches mark all of them
    /// dirty either way.
    pub fn notify_remote_changes(&self, mut node_ids: Vec<NodeId>) {
        if node_ids.is_empty() {
            return;
        }
        node_ids.sort();
        self.emit(&SceneGraphEvent::NodeCreated {
            node_id: node_ids[0].clone(),
            node_ids: Some(node_ids),
        });
    }

    fn emit(&self, event: &SceneGraphEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    // ------------------------------------------------------------------
    // Change-closure internals. All run inside one write transaction.
    // ------------------------------------------------------------------

    fn node_map<T: ReadTxn>(&self, txn: &T, id: &NodeId) -> Option<MapRef> {
        match self.nodes.get(txn, id.as_str()) {
            Some(Out::YMap(map)) => Some(map),
            _ => None,
        }
    }

    fn links_of<T: ReadTxn>(&self, txn: &T, id: &NodeId, key: &str) -> Option<ArrayRef> {
        self.node_map(txn, id).and_then(|node| link_array(&node, txn, key))
    }

    fn parent_in<T: ReadTxn>(&self, txn: &T, id: &NodeId) -> Option<NodeId> {
        let parents = self.links_of(txn, id, PARENTS)?;
        array_ids(txn, &parents).into_iter().next()
    }

    fn create_in(
        &self,
        txn: &mut TransactionMut,
        data: &NodeData,
        parent: Option<&NodeId>,
    ) -> Option<NodeId> {
        let parent_children = match parent {
            Some(parent_id) => match self.links_of(txn, parent_id, CHILDREN) {
                Some(children) => Some(children),
                None => {
                    warn!("Trying to add child node to {parent_id} which does not exist.");
                    return None;
                }
            },
            None => None,
        };

        let id = NodeId::random();
        let node = self.nodes.insert(txn, id.as_str(), MapPrelim::default());
        let parents = node.insert(txn, PARENTS, ArrayPrelim::default());
        node.insert(txn, CHILDREN, ArrayPrelim::default());
        for (key, value) in data.iter() {
            node.insert(txn, key.as_str(), property_to_any(value));
        }

        if let (Some(parent_id), Some(children)) = (parent, parent_children) {
            parents.push_back(txn, parent_id.as_str());
            children.push_back(txn, id.as_str());
        }

        Some(id)
    }

    fn unlink_in(&self, txn: &mut TransactionMut, id: &NodeId) -> bool {
        let Some(parents) = self.links_of(txn, id, PARENTS) else {
            warn!("Trying to remove node {id} which does not exist.");
            return false;
        };

        for parent_id in array_ids(txn, &parents) {
            if let Some(children) = self.links_of(txn, &parent_id, CHILDREN) {
                let child_ids = array_ids(txn, &children);
                if let Some(index) = child_ids.iter().position(|child| child == id) {
                    children.remove(txn, index as u32);
                }
            }
        }

        let len = parents.len(txn);
        if len > 0 {
            parents.remove_range(txn, 0, len);
        }
        true
    }

    fn reparent_in(&self, txn: &mut TransactionMut, id: &NodeId, new_parent: &NodeId) -> bool {
        if self.node_map(txn, id).is_none() || self.node_map(txn, new_parent).is_none() {
            warn!("Trying to reparent {id} to {new_parent} but at least one does not exist.");
            return false;
        }

        self.unlink_in(txn, id);

        let Some(parents) = self.links_of(txn, id, PARENTS) else {
            return false;
        };
        let Some(children) = self.links_of(txn, new_parent, CHILDREN) else {
            return false;
        };
        parents.push_back(txn, new_parent.as_str());
        children.push_back(txn, id.as_str());
        true
    }

    fn move_relative_in(
        &self,
        txn: &mut TransactionMut,
        id: &NodeId,
        sibling: &NodeId,
        after: bool,
    ) -> bool {
        if self.node_map(txn, id).is_none() || self.node_map(txn, sibling).is_none() {
            warn!("Trying to move {id} relative to {sibling} but at least one does not exist.");
            return false;
        }
        let Some(target_parent) = self.parent_in(txn, sibling) else {
            warn!("Trying to move {id} relative to {sibling} which has no parent.");
            return false;
        };

        if self.parent_in(txn, id).as_ref() != Some(&target_parent)
            && !self.reparent_in(txn, id, &target_parent)
        {
            return false;
        }

        let Some(children) = self.links_of(txn, &target_parent, CHILDREN) else {
            return false;
        };
        let child_ids = array_ids(txn, &children);
        if let Some(index) = child_ids.iter().position(|child| child == id) {
            children.remove(txn, index as u32);
        }
        let child_ids = array_ids(txn, &children);
        let Some(sibling_index) = child_ids.iter().position(|child| child == sibling) else {
            return false;
        };
        let insert_at = if after { sibling_index + 1 } else { sibling_index };
        children.insert(txn, insert_at as u32, id.as_str());
        true
    }

    /// Shared no-op guard for the relative-move operations.
    fn move_is_noop(&self, id: &NodeId, sibling: &NodeId) -> bool {
        if id == sibling {
            return true;
        }
        // Moving next to a sibling inside the node's own subtree would
        // reparent the node under itself.
        match self.parent_of(sibling) {
            Some(target_parent) => {
                target_parent == *id || self.is_ancestor_of(id, &target_parent)
            }
            None => false,
        }
    }
}

impl SceneGraph for ReplicatedSceneGraph {
    fn root_id(&self) -> Option<NodeId> {
        let txn = self.doc.transact();
        match self.meta.get(&txn, ROOT_NODE_ID) {
            Some(Out::Any(Any::String(id))) => Some(NodeId::from(id.as_ref())),
            _ => None,
        }
    }

    fn actor_id(&self) -> ActorId {
        self.actor_id.clone()
    }

    fn document_id(&self) -> Option<DocumentId> {
        self.document_id.clone()
    }

    fn contains(&self, id: &NodeId) -> bool {
        let txn = self.doc.transact();
        self.node_map(&txn, id).is_some()
    }

    fn parent_of(&self, id: &NodeId) -> Option<NodeId> {
        let txn = self.doc.transact();
        self.parent_in(&txn, id)
    }

    fn children_of(&self, id: &NodeId) -> Vec<NodeId> {
        let txn = self.doc.transact();
        match self.links_of(&txn, id, CHILDREN) {
            Some(children) => array_ids(&txn, &children),
            None => Vec::new(),
        }
    }

    fn property(&self, id: &NodeId, key: &str) -> Option<PropertyValue> {
        if key == PARENTS || key == CHILDREN {
            return None;
        }
        let txn = self.doc.transact();
        let node = self.node_map(&txn, id)?;
        match node.get(&txn, key) {
            Some(Out::Any(any)) => any_to_property(&any),
            _ => None,
        }
    }

    fn set_property(&mut self, id: &NodeId, key: &str, value: PropertyValue) -> bool {
        if key == PARENTS || key == CHILDREN {
            warn!(
                "Modifying parent/children properties of node {id} is not allowed, \
                 use appropriate SceneGraph methods instead."
            );
            return false;
        }

        let changed = {
            let mut txn = self.doc.transact_mut();
            let Some(node) = self.node_map(&txn, id) else {
                warn!("Trying to set property {key} on node {id} which does not exist.");
                return false;
            };
            let new_value = property_to_any(&value);
            let unchanged =
                matches!(node.get(&txn, key), Some(Out::Any(current)) if current == new_value);
            if !unchanged {
                node.insert(&mut txn, key, new_value);
            }
            !unchanged
        };

        if changed {
            self.version += 1;
            self.emit(&SceneGraphEvent::PropertyChanged {
                node_id: id.clone(),
                property: key.to_string(),
            });
        }
        true
    }

    fn create_node(&mut self, data: NodeData, parent: Option<&NodeId>) -> Option<NodeId> {
        let created = {
            let mut txn = self.doc.transact_mut();
            self.create_in(&mut txn, &data, parent)
        };

        if let Some(id) = &created {
            self.version += 1;
            self.emit(&SceneGraphEvent::NodeCreated {
                node_id: id.clone(),
                node_ids: None,
            });
        }
        created
    }

    fn remove_node(&mut self, id: &NodeId) {
        let removed = {
            let mut txn = self.doc.transact_mut();
            self.unlink_in(&mut txn, id)
        };

        if removed {
            self.version += 1;
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

        let moved = {
            let mut txn = self.doc.transact_mut();
            self.reparent_in(&mut txn, id, new_parent)
        };

        if moved {
            self.version += 1;
            self.emit(&SceneGraphEvent::NodeMoved {
                node_id: id.clone(),
            });
        }
    }

    fn move_node_before(&mut self, id: &NodeId, sibling: &NodeId) {
        if self.move_is_noop(id, sibling) {
            return;
        }

        let moved = {
            let mut txn = self.doc.transact_mut();
            self.move_relative_in(&mut txn, id, sibling, false)
        };

        if moved {
            self.version += 1;
            self.emit(&SceneGraphEvent::NodeMoved {
                node_id: id.clone(),
            });
        }
    }

    fn move_node_after(&mut self, id: &NodeId, sibling: &NodeId) {
        if self.move_is_noop(id, sibling) {
            return;
        }

        let moved = {
            let mut txn = self.doc.transact_mut();
            self.move_relative_in(&mut txn, id, sibling, true)
        };

        if moved {
            self.version += 1;
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
        // A system may have registered further systems while running.
        systems.append(&mut self.systems);
        self.systems = systems;
    }

    fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }
}

/// Yjs client ids are 53-bit; derive one from the actor uuid.
fn client_id_for(actor: &ActorId) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    actor.as_str().hash(&mut hasher);
    hasher.finish() & ((1 << 53) - 1)
}

fn link_array<T: ReadTxn>(node: &MapRef, txn: &T, key: &str) -> Option<ArrayRef> {
    match node.get(txn, key) {
        Some(Out::YArray(array)) => Some(array),
        _ => None,
    }
}

fn array_ids<T: ReadTxn>(txn: &T, array: &ArrayRef) -> Vec<NodeId> {
    array
        .iter(txn)
        .filter_map(|item| match item {
            Out::Any(Any::String(id)) => Some(NodeId::from(id.as_ref())),
            _ => None,
        })
        .collect()
}

fn property_to_any(value: &PropertyValue) -> Any {
    match value {
        PropertyValue::Bool(b) => Any::Bool(*b),
        PropertyValue::Number(n) => Any::Number(*n),
        PropertyValue::String(s) => Any::String(s.as_str().into()),
        PropertyValue::List(items) => {
            Any::Array(items.iter().map(property_to_any).collect::<Vec<_>>().into())
        }
    }
}

fn any_to_property(any: &Any) -> Option<PropertyValue> {
    match any {
        Any::Bool(b) => Some(PropertyValue::Bool(*b)),
        Any::Number(n) => Some(PropertyValue::Number(*n)),
        Any::BigInt(n) => Some(PropertyValue::Number(*n as f64)),
        Any::String(s) => Some(PropertyValue::String(s.to_string())),
        Any::Array(items) => Some(PropertyValue::List(
            items.iter().filter_map(any_to_property).collect(),
        )),
        _ => None,
    }
}
