//! Scene graph change events.
//!
//! Every mutation API emits exactly one event. Remote merges batch all
//! affected ids into a single `NodeCreated` carrying the full list;
//! downstream caches treat "created" and "changed" identically, so no
//! separate remote-property-changed path exists.

use std::rc::Rc;

use crate::ids::NodeId;

/// Discriminant of [`SceneGraphEvent`], used by cache filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodeCreated,
    NodeMoved,
    PropertyChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneGraphEvent {
    /// A node was created locally, or any number of node records were
    /// created or changed by a remote merge (`node_ids` set).
    NodeCreated {
        node_id: NodeId,
        node_ids: Option<Vec<NodeId>>,
    },

    /// A node was removed, reparented or reordered.
    NodeMoved { node_id: NodeId },

    /// A property write actually changed the stored value.
    PropertyChanged { node_id: NodeId, property: String },
}

impl SceneGraphEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SceneGraphEvent::NodeCreated { .. } => EventKind::NodeCreated,
            SceneGraphEvent::NodeMoved { .. } => EventKind::NodeMoved,
            SceneGraphEvent::PropertyChanged { .. } => EventKind::PropertyChanged,
        }
    }

    /// The primary affected node.
    pub fn node_id(&self) -> &NodeId {
        match self {
            SceneGraphEvent::NodeCreated { node_id, .. }
            | SceneGraphEvent::NodeMoved { node_id }
            | SceneGraphEvent::PropertyChanged { node_id, .. } => node_id,
        }
    }

    /// Every affected node id, batched remote merges included.
    pub fn node_ids(&self) -> Vec<&NodeId> {
        match self {
            SceneGraphEvent::NodeCreated {
                node_id,
                node_ids: Some(ids),
            } => {
                if ids.contains(node_id) {
                    ids.iter().collect()
                } else {
                    std::iter::once(node_id).chain(ids.iter()).collect()
                }
            }
            other => vec![other.node_id()],
        }
    }
}

/// Event subscriber. Listeners run synchronously inside the mutation
/// call stack and must not mutate the graph re-entrantly; they are
/// meant to record ids (e.g. into a dirty set) for the next `update()`.
pub type EventListener = Rc<dyn Fn(&SceneGraphEvent)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_includes_batch() {
        let event = SceneGraphEvent::NodeCreated {
            node_id: NodeId::from("a"),
            node_ids: Some(vec![NodeId::from("a"), NodeId::from("b")]),
        };
        let ids: Vec<&str> = event.node_ids().iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_node_ids_single() {
        let event = SceneGraphEvent::NodeMoved {
            node_id: NodeId::from("a"),
        };
        assert_eq!(event.node_ids().len(), 1);
    }
}
