//! Replica convergence tests: direct CRDT merges and full synchronizer
//! exchanges through an in-memory relay.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use folio_relay::MemoryRelayNetwork;

use crate::{
    NodeData, PropertyValue, ReplicatedSceneGraph, SceneGraph, SceneGraphEvent, Synchronizer,
    TraversalControl,
};

fn kind(name: &str) -> NodeData {
    NodeData::new().with("kind", name)
}

/// Pre-order snapshot of (id, kind, children ids) for tree comparison.
fn snapshot(graph: &ReplicatedSceneGraph) -> Vec<(String, Option<String>, Vec<String>)> {
    let mut rows = Vec::new();
    graph.traverse(
        None,
        &mut rows,
        &mut |node, rows: &mut Vec<(String, Option<String>, Vec<String>)>| {
            rows.push((
                node.id().as_str().to_string(),
                node.property("kind").and_then(|k| k.as_str().map(String::from)),
                node.children()
                    .iter()
                    .map(|c| c.id().as_str().to_string())
                    .collect(),
            ));
            TraversalControl::Continue
        },
        &mut |_, _| {},
    );
    rows
}

fn assert_structurally_consistent(graph: &ReplicatedSceneGraph) {
    let Some(root) = graph.root_id() else { return };
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        for child in graph.children_of(&id) {
            assert_eq!(graph.parent_of(&child).as_ref(), Some(&id));
            stack.push(child);
        }
    }
}

/// Merge deltas directly in both directions until neither side is
/// missing anything.
fn merge_both_ways(a: &mut ReplicatedSceneGraph, b: &mut ReplicatedSceneGraph) {
    for i in 0..2 {
        eprintln!("round {i} start: a.sv={:?} b.sv={:?}", a.state_vector(), b.state_vector());
        let to_b = a.encode_update_since(&b.state_vector());
        b.apply_remote_update(&to_b).unwrap();
        eprintln!("round {i} after a->b: b.root={:?} a.sv={:?} b.sv={:?}", b.root_id(), a.state_vector(), b.state_vector());
        let to_a = b.encode_update_since(&a.state_vector());
        a.apply_remote_update(&to_a).unwrap();
        eprintln!("round {i} after b->a: b.root={:?} a.sv={:?} b.sv={:?}", b.root_id(), a.state_vector(), b.state_vector());
    }
}

#[test]
fn test_direct_merge_transfers_tree() {
    let mut a = ReplicatedSceneGraph::new(kind("root"));
    let root = a.root_id().unwrap();
    let child = a.create_node(kind("rectangle"), Some(&root)).unwrap();
    a.set_property(&child, "width", PropertyValue::Number(10.0));

    let mut b = ReplicatedSceneGraph::attach(a.document_id().unwrap());
    let update = a.encode_update_since(&b.state_vector());
    let changed = b.apply_remote_update(&update).unwrap();

    assert_eq!(changed.len(), 2, "both node records arrive in the patch");
    assert_eq!(b.root_id(), Some(root));
    assert_eq!(
        b.property(&child, "width"),
        Some(PropertyValue::Number(10.0))
    );
    assert_structurally_consistent(&b);
}

#[test]
fn scratch_pure_yrs() {
    use yrs::updates::decoder::Decode;
    use yrs::{Doc, Map, ReadTxn, Transact, Update};
    let a = Doc::with_client_id(111);
    {
        let m = a.get_or_insert_map("meta");
        let mut txn = a.transact_mut();
        m.insert(&mut txn, "rootNodeId", "hello");
    }
    let b = Doc::with_client_id(222);
    let _ = b.get_or_insert_map("meta");
    let upd = a.transact().encode_state_as_update_v1(&b.transact().state_vector());
    {
        let mut txn = b.transact_mut();
        txn.apply_update(Update::decode_v1(&upd).unwrap()).unwrap();
    }
    eprintln!("b.sv after apply = {:?}", b.transact().state_vector());
    let m = b.get_or_insert_map("meta");
    let txn = b.transact();
    eprintln!("b meta rootNodeId = {:?}", m.get(&txn, "rootNodeId"));
}

#[test]
fn scratch_pure_yrs_bidir() {
    use yrs::updates::decoder::Decode;
    use yrs::{Array, ArrayPrelim, Doc, Map, MapPrelim, ReadTxn, Transact, Update};
    fn build_root(doc: &Doc) {
        let nodes = doc.get_or_insert_map("nodes");
        let meta = doc.get_or_insert_map("meta");
        let mut txn = doc.transact_mut();
        let node = nodes.insert(&mut txn, "nodeA", MapPrelim::default());
        node.insert(&mut txn, "parents", ArrayPrelim::default());
        node.insert(&mut txn, "children", ArrayPrelim::default());
        node.insert(&mut txn, "kind", "root");
        meta.insert(&mut txn, "rootNodeId", "nodeA");
    }
    let a = Doc::with_client_id(982949306216073); // 53-bit like client_id_for
    build_root(&a);
    let b = Doc::with_client_id(3090939897);
    let _ = b.get_or_insert_map("nodes");
    let _ = b.get_or_insert_map("meta");
    fn sv(d: &Doc) -> yrs::StateVector { d.transact().state_vector() }
    fn enc(d: &Doc, since: &yrs::StateVector) -> Vec<u8> { d.transact().encode_state_as_update_v1(since) }
    fn app(d: &Doc, u: &[u8]) { let mut t = d.transact_mut(); t.apply_update(Update::decode_v1(u).unwrap()).unwrap(); }
    for i in 0..2 {
        let to_b = enc(&a, &sv(&b));
        app(&b, &to_b);
        let to_a = enc(&b, &sv(&a));
        app(&a, &to_a);
        eprintln!("bidir round {i}: a.sv={:?} b.sv={:?} to_a.len={}", sv(&a), sv(&b), to_a.len());
    }
    let bm = b.get_or_insert_map("meta");
    let txn = b.transact();
    eprintln!("bidir b meta rootNodeId = {:?}", bm.get(&txn, "rootNodeId"));
}

#[test]
fn scratch_rootonly_single_merge() {
    let mut a = ReplicatedSceneGraph::new(kind("root"));
    let root = a.root_id().unwrap();
    let mut b = ReplicatedSceneGraph::attach(a.document_id().unwrap());
    let update = a.encode_update_since(&b.state_vector());
    let changed = b.apply_remote_update(&update).unwrap();
    eprintln!("changed ids: {:?}", changed);
    eprintln!("b root_id: {:?}", b.root_id());
    eprintln!("a root_id: {:?}", Some(root));
    assert_eq!(b.root_id(), a.root_id());
}

#[test]
fn scratch_rootonly_merge_both_ways() {
    let mut a = ReplicatedSceneGraph::new(kind("root"));
    let mut b = ReplicatedSceneGraph::attach(a.document_id().unwrap());
    merge_both_ways(&mut a, &mut b);
    eprintln!("b root_id: {:?}", b.root_id());
    eprintln!("a root_id: {:?}", a.root_id());
    assert_eq!(b.root_id(), a.root_id());
}

#[test]
fn test_concurrent_edits_converge() {
    let mut a = ReplicatedSceneGraph::new(kind("root"));
    let mut b = ReplicatedSceneGraph::attach(a.document_id().unwrap());
    merge_both_ways(&mut a, &mut b);
    let root = a.root_id().unwrap();

    // Diverge: each replica adds its own child and edits concurrently.
    let from_a = a.create_node(kind("circle"), Some(&root)).unwrap();
    let from_b = b.create_node(kind("page"), Some(&root)).unwrap();
    a.set_property(&from_a, "r", PropertyValue::Number(4.0));
    b.set_property(&from_b, "width", PropertyValue::Number(200.0));

    merge_both_ways(&mut a, &mut b);

    assert_eq!(snapshot(&a), snapshot(&b));
    assert!(a.children_of(&root).contains(&from_a));
    assert!(a.children_of(&root).contains(&from_b));
    assert_structurally_consistent(&a);
    assert_structurally_consistent(&b);
}

#[test]
fn test_apply_remote_update_rejects_garbage() {
    let mut graph = ReplicatedSceneGraph::new(kind("root"));
    let before = graph.version();
    assert!(graph.apply_remote_update(&[0xff, 0x13, 0x37]).is_err());
    assert_eq!(graph.version(), before, "failed merge leaves state alone");
}

/// Drive both replicas until the relay is quiescent.
fn pump(
    a: &mut ReplicatedSceneGraph,
    b: &mut ReplicatedSceneGraph,
    network: &MemoryRelayNetwork,
) {
    for _ in 0..50 {
        a.update();
        b.update();
        if network.pending() == 0 {
            return;
        }
    }
    panic!("synchronizers did not quiesce");
}

fn synced_pair(
    network: &MemoryRelayNetwork,
) -> (ReplicatedSceneGraph, ReplicatedSceneGraph) {
    let mut a = ReplicatedSceneGraph::new(kind("root"));
    let mut b = ReplicatedSceneGraph::attach(a.document_id().unwrap());
    a.add_system(Box::new(
        Synchronizer::new(network.connect()).with_discovery_interval(Duration::from_secs(3600)),
    ));
    b.add_system(Box::new(
        Synchronizer::new(network.connect()).with_discovery_interval(Duration::from_secs(3600)),
    ));
    (a, b)
}

#[test]
fn test_synchronizer_bootstraps_attached_replica() {
    let network = MemoryRelayNetwork::new();
    let (mut a, mut b) = synced_pair(&network);

    let root = a.root_id().unwrap();
    let rect = a.create_node(kind("rectangle"), Some(&root)).unwrap();
    pump(&mut a, &mut b, &network);

    assert_eq!(b.root_id(), Some(root));
    assert!(b.contains(&rect));
    assert_eq!(snapshot(&a), snapshot(&b));
}

#[test]
fn test_synchronizer_converges_bidirectionally() {
    let network = MemoryRelayNetwork::new();
    let (mut a, mut b) = synced_pair(&network);
    pump(&mut a, &mut b, &network);
    let root = a.root_id().unwrap();

    let from_a = a.create_node(kind("circle"), Some(&root)).unwrap();
    let from_b = b.create_node(kind("page"), Some(&root)).unwrap();
    pump(&mut a, &mut b, &network);

    assert_eq!(snapshot(&a), snapshot(&b));
    assert!(b.contains(&from_a));
    assert!(a.contains(&from_b));
    assert_structurally_consistent(&a);
    assert_structurally_consistent(&b);
}

#[test]
fn test_synchronizer_converges_under_reversed_delivery() {
    let network = MemoryRelayNetwork::new();
    network.set_reverse_delivery(true);
    let (mut a, mut b) = synced_pair(&network);
    pump(&mut a, &mut b, &network);
    let root = a.root_id().unwrap();

    for i in 0..4 {
        let node = a.create_node(kind("rectangle"), Some(&root)).unwrap();
        a.set_property(&node, "width", PropertyValue::Number(f64::from(i)));
        b.create_node(kind("circle"), Some(&root)).unwrap();
    }
    pump(&mut a, &mut b, &network);

    assert_eq!(snapshot(&a), snapshot(&b));
}

#[test]
fn test_remote_merge_emits_single_batched_event() {
    let network = MemoryRelayNetwork::new();
    let (mut a, mut b) = synced_pair(&network);
    pump(&mut a, &mut b, &network);
    let root = a.root_id().unwrap();

    let events: Rc<RefCell<Vec<SceneGraphEvent>>> = Rc::default();
    let sink = Rc::clone(&events);
    b.subscribe(Rc::new(move |event| sink.borrow_mut().push(event.clone())));

    let x = a.create_node(kind("rectangle"), Some(&root)).unwrap();
    let y = a.create_node(kind("circle"), Some(&root)).unwrap();
    pump(&mut a, &mut b, &network);

    let recorded = events.borrow();
    let created: Vec<_> = recorded
        .iter()
        .filter_map(|event| match event {
            SceneGraphEvent::NodeCreated {
                node_ids: Some(ids),
                ..
            } => Some(ids.clone()),
            _ => None,
        })
        .collect();
    assert!(!created.is_empty(), "remote merge re-emits nodeCreated");
    let all_ids: Vec<_> = created.into_iter().flatten().collect();
    assert!(all_ids.contains(&x));
    assert!(all_ids.contains(&y));
    // No separate remote-property-changed path exists.
    assert!(recorded
        .iter()
        .all(|event| !matches!(event, SceneGraphEvent::PropertyChanged { .. })));
}

#[test]
fn test_remote_property_update_arrives_as_node_created() {
    let network = MemoryRelayNetwork::new();
    let (mut a, mut b) = synced_pair(&network);
    pump(&mut a, &mut b, &network);
    let root = a.root_id().unwrap();
    let rect = a.create_node(kind("rectangle"), Some(&root)).unwrap();
    pump(&mut a, &mut b, &network);

    let events: Rc<RefCell<Vec<SceneGraphEvent>>> = Rc::default();
    let sink = Rc::clone(&events);
    b.subscribe(Rc::new(move |event| sink.borrow_mut().push(event.clone())));

    a.set_property(&rect, "width", PropertyValue::Number(42.0));
    pump(&mut a, &mut b, &network);

    assert_eq!(b.property(&rect, "width"), Some(PropertyValue::Number(42.0)));
    let recorded = events.borrow();
    assert!(recorded
        .iter()
        .any(|event| matches!(event, SceneGraphEvent::NodeCreated { .. })));
}
