//! Behavioral tests shared by both scene graph implementations.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{
    EventKind, LocalSceneGraph, NodeData, NodeId, PropertyValue, ReplicatedSceneGraph, SceneGraph,
    SceneGraphEvent, TraversalControl,
};

fn kind(name: &str) -> NodeData {
    NodeData::new().with("kind", name)
}

fn record_events<G: SceneGraph>(graph: &mut G) -> Rc<RefCell<Vec<SceneGraphEvent>>> {
    let events: Rc<RefCell<Vec<SceneGraphEvent>>> = Rc::default();
    let sink = Rc::clone(&events);
    graph.subscribe(Rc::new(move |event| sink.borrow_mut().push(event.clone())));
    events
}

/// Every node reachable from the root satisfies the mutual
/// parent/children invariant.
fn assert_structurally_consistent<G: SceneGraph>(graph: &G) {
    let root = graph.root_id().expect("graph has a root");
    assert_eq!(graph.parent_of(&root), None, "root has no parent");

    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        for child in graph.children_of(&id) {
            assert_eq!(
                graph.parent_of(&child).as_ref(),
                Some(&id),
                "child {child} does not point back at {id}"
            );
            let occurrences = graph
                .children_of(&id)
                .iter()
                .filter(|c| **c == child)
                .count();
            assert_eq!(occurrences, 1, "child {child} linked more than once");
            stack.push(child);
        }
    }
}

fn run_structural_suite<G: SceneGraph>(mut graph: G) {
    let root = graph.root_id().unwrap();
    let a = graph.create_node(kind("a"), Some(&root)).unwrap();
    let b = graph.create_node(kind("b"), Some(&root)).unwrap();
    let c = graph.create_node(kind("c"), Some(&a)).unwrap();
    assert_structurally_consistent(&graph);

    // Reparent c under b.
    graph.reparent_node(&c, &b);
    assert_eq!(graph.parent_of(&c), Some(b.clone()));
    assert!(graph.children_of(&a).is_empty());
    assert_structurally_consistent(&graph);

    // Reorder: move b before a.
    graph.move_node_before(&b, &a);
    assert_eq!(graph.children_of(&root), vec![b.clone(), a.clone()]);
    graph.move_node_after(&b, &a);
    assert_eq!(graph.children_of(&root), vec![a.clone(), b.clone()]);
    assert_structurally_consistent(&graph);

    // Removal unlinks but keeps the record and its descendants.
    graph.remove_node(&b);
    assert_eq!(graph.parent_of(&b), None);
    assert!(!graph.children_of(&root).contains(&b));
    assert!(graph.contains(&b));
    assert_eq!(graph.children_of(&b), vec![c.clone()]);
    assert_structurally_consistent(&graph);
}

fn run_noop_suite<G: SceneGraph>(mut graph: G) {
    let root = graph.root_id().unwrap();
    let a = graph.create_node(kind("a"), Some(&root)).unwrap();
    let b = graph.create_node(kind("b"), Some(&a)).unwrap();

    let events = record_events(&mut graph);
    let before = graph.children_of(&root);

    // Identical endpoints.
    graph.reparent_node(&a, &a);
    graph.move_node_before(&a, &a);
    graph.move_node_after(&b, &b);
    // Reparent to current parent.
    graph.reparent_node(&a, &root);
    // Reparent under own descendant (cycle).
    graph.reparent_node(&a, &b);
    // Move next to a sibling inside the node's own subtree.
    graph.move_node_before(&a, &b);

    assert_eq!(graph.children_of(&root), before);
    assert_eq!(graph.parent_of(&a), Some(root.clone()));
    assert!(
        events.borrow().is_empty(),
        "no-ops must not emit events, got {:?}",
        events.borrow()
    );
}

fn run_property_suite<G: SceneGraph>(mut graph: G) {
    let root = graph.root_id().unwrap();
    let a = graph.create_node(kind("a"), Some(&root)).unwrap();
    let events = record_events(&mut graph);

    assert!(graph.set_property(&a, "width", PropertyValue::Number(10.0)));
    assert_eq!(
        graph.property(&a, "width"),
        Some(PropertyValue::Number(10.0))
    );
    assert_eq!(events.borrow().len(), 1);
    assert_eq!(events.borrow()[0].kind(), EventKind::PropertyChanged);

    // Writing the same value again emits nothing.
    assert!(graph.set_property(&a, "width", PropertyValue::Number(10.0)));
    assert_eq!(events.borrow().len(), 1);

    // Missing node fails rather than panics.
    assert!(!graph.set_property(&NodeId::from("missing"), "width", PropertyValue::Number(1.0)));

    // Structural keys are rejected.
    assert!(!graph.set_property(&a, "children", PropertyValue::Number(1.0)));
    assert!(!graph.set_property(&a, "parents", PropertyValue::Number(1.0)));
    assert_eq!(events.borrow().len(), 1);
}

fn run_traversal_suite<G: SceneGraph>(mut graph: G) {
    let root = graph.root_id().unwrap();
    let a = graph.create_node(kind("a"), Some(&root)).unwrap();
    let b = graph.create_node(kind("b"), Some(&root)).unwrap();
    let c = graph.create_node(kind("c"), Some(&a)).unwrap();

    // Full pre/post order.
    let mut pre_order = Vec::new();
    let mut post_order = Vec::new();
    graph.traverse(
        None,
        &mut (),
        &mut |node, _| {
            pre_order.push(node.id().clone());
            TraversalControl::Continue
        },
        &mut |node, _| post_order.push(node.id().clone()),
    );
    assert_eq!(pre_order, vec![root.clone(), a.clone(), c.clone(), b.clone()]);
    assert_eq!(post_order, vec![c.clone(), a.clone(), b.clone(), root.clone()]);

    // Pruning skips children but still fires post for the node.
    let mut visited = Vec::new();
    let mut posts = Vec::new();
    graph.traverse(
        None,
        &mut (),
        &mut |node, _| {
            visited.push(node.id().clone());
            if node.id() == &a {
                TraversalControl::Stop
            } else {
                TraversalControl::Continue
            }
        },
        &mut |node, _| posts.push(node.id().clone()),
    );
    assert!(!visited.contains(&c));
    assert!(posts.contains(&a));

    // Context threading accumulates across visits.
    let mut count = 0usize;
    graph.traverse(
        Some(&a),
        &mut count,
        &mut |_, count| {
            *count += 1;
            TraversalControl::Continue
        },
        &mut |_, _| {},
    );
    assert_eq!(count, 2); // a and c

    // Ascension walks to the root; Stop halts early.
    let mut chain = Vec::new();
    graph.ascend(
        &c,
        &mut (),
        &mut |node, _| {
            chain.push(node.id().clone());
            TraversalControl::Continue
        },
        &mut |_, _| {},
    );
    assert_eq!(chain, vec![c.clone(), a.clone(), root.clone()]);

    let mut chain = Vec::new();
    graph.ascend(
        &c,
        &mut (),
        &mut |node, _| {
            chain.push(node.id().clone());
            if node.id() == &a {
                TraversalControl::Stop
            } else {
                TraversalControl::Continue
            }
        },
        &mut |_, _| {},
    );
    assert_eq!(chain, vec![c.clone(), a.clone()]);
}

fn run_accessor_suite<G: SceneGraph>(mut graph: G) {
    let root = graph.root_id().unwrap();
    let a = graph.create_node(kind("a").with("width", 5.0), Some(&root)).unwrap();

    let node = graph.node(&a).unwrap();
    assert_eq!(node.id(), &a);
    assert_eq!(node.parent().unwrap().id(), &root);
    assert!(node.children().is_empty());
    assert_eq!(node.property("width"), Some(PropertyValue::Number(5.0)));
    assert_eq!(node.property("kind"), Some(PropertyValue::String("a".into())));

    assert!(graph.node(&NodeId::from("missing")).is_none());
}

fn run_missing_parent_suite<G: SceneGraph>(mut graph: G) {
    let mut events = Vec::new();
    {
        let recorded = record_events(&mut graph);
        let created = graph.create_node(kind("orphan"), Some(&NodeId::from("missing")));
        assert!(created.is_none());
        events.extend(recorded.borrow().iter().cloned());
    }
    assert!(events.is_empty(), "dropped mutations emit no events");

    // Removing a nonexistent node is dropped, not fatal.
    graph.remove_node(&NodeId::from("missing"));
}

mod local {
    use super::*;

    fn new_graph() -> LocalSceneGraph {
        LocalSceneGraph::new(kind("root"))
    }

    #[test]
    fn test_structural_consistency() {
        run_structural_suite(new_graph());
    }

    #[test]
    fn test_noops() {
        run_noop_suite(new_graph());
    }

    #[test]
    fn test_properties() {
        run_property_suite(new_graph());
    }

    #[test]
    fn test_traversal() {
        run_traversal_suite(new_graph());
    }

    #[test]
    fn test_accessor() {
        run_accessor_suite(new_graph());
    }

    #[test]
    fn test_missing_parent() {
        run_missing_parent_suite(new_graph());
    }

    #[test]
    fn test_local_ids_are_sequential() {
        let mut graph = new_graph();
        let root = graph.root_id().unwrap();
        let a = graph.create_node(kind("a"), Some(&root)).unwrap();
        let b = graph.create_node(kind("b"), Some(&root)).unwrap();
        assert_eq!(root.as_str(), "0");
        assert_eq!(a.as_str(), "1");
        assert_eq!(b.as_str(), "2");
    }
}

mod replicated {
    use super::*;

    fn new_graph() -> ReplicatedSceneGraph {
        ReplicatedSceneGraph::new(kind("root"))
    }

    #[test]
    fn test_structural_consistency() {
        run_structural_suite(new_graph());
    }

    #[test]
    fn test_noops() {
        run_noop_suite(new_graph());
    }

    #[test]
    fn test_properties() {
        run_property_suite(new_graph());
    }

    #[test]
    fn test_traversal() {
        run_traversal_suite(new_graph());
    }

    #[test]
    fn test_accessor() {
        run_accessor_suite(new_graph());
    }

    #[test]
    fn test_missing_parent() {
        run_missing_parent_suite(new_graph());
    }

    #[test]
    fn test_document_id_derived_from_root() {
        let graph = new_graph();
        let root = graph.root_id().unwrap();
        assert_eq!(
            graph.document_id().unwrap().as_str(),
            root.as_str()
        );
    }

    #[test]
    fn test_attached_graph_starts_empty() {
        let source = new_graph();
        let attached = ReplicatedSceneGraph::attach(source.document_id().unwrap());
        assert_eq!(attached.root_id(), None);
        assert_eq!(attached.document_id(), source.document_id());
    }

    #[test]
    fn test_list_property_roundtrip() {
        let mut graph = new_graph();
        let root = graph.root_id().unwrap();
        let a = graph.create_node(kind("a"), Some(&root)).unwrap();
        graph.set_property(&a, "strokeDasharray", PropertyValue::from(vec![4.0, 2.0]));
        assert_eq!(
            graph.property(&a, "strokeDasharray"),
            Some(PropertyValue::from(vec![4.0, 2.0]))
        );
    }
}
