//! End-to-end cache scenarios: seeding, coalescing, upward propagation
//! and the pagination layouts.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use folio_geometry::BoundingRect;
use folio_layout::{BindingMethod, LayoutData, PageData, RectangleData, TransformData};
use folio_relay::MemoryRelayNetwork;
use folio_scenegraph::{
    LocalSceneGraph, NodeId, NodeRef, PropertyValue, ReplicatedSceneGraph, SceneGraph, Synchronizer,
};

use crate::engine::{CacheFilter, CachePolicy, MetadataCache};
use crate::{BoundsCache, TransformCache};

fn assert_rect(rect: BoundingRect, x: f64, y: f64, width: f64, height: f64) {
    let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
    assert!(
        close(rect.x(), x) && close(rect.y(), y) && close(rect.width(), width) && close(rect.height(), height),
        "expected ({x}, {y}, {width}, {height}), got ({}, {}, {}, {})",
        rect.x(),
        rect.y(),
        rect.width(),
        rect.height()
    );
}

fn rect_data(x: f64, y: f64, width: f64, height: f64) -> LayoutData {
    LayoutData::Rectangle(RectangleData::sized(x, y, width, height))
}

/// Local graph with transform and bounds caches registered, in that
/// order.
fn cached_graph() -> LocalSceneGraph {
    let mut graph = LocalSceneGraph::new(LayoutData::Root.into_node_data());
    graph.add_system(Box::new(MetadataCache::new(TransformCache::new())));
    graph.add_system(Box::new(MetadataCache::new(BoundsCache::new())));
    graph
}

#[test]
fn test_rectangle_bounds_scenario() {
    let mut graph = cached_graph();
    let root = graph.root_id().unwrap();
    let a = graph
        .create_node(rect_data(0.0, 0.0, 10.0, 10.0).into_node_data(), Some(&root))
        .unwrap();
    let b = graph
        .create_node(rect_data(20.0, 0.0, 10.0, 10.0).into_node_data(), Some(&root))
        .unwrap();

    graph.update();
    assert_rect(
        graph.metadata().aligned_bounding_rectangle(&root).unwrap(),
        0.0,
        0.0,
        30.0,
        10.0,
    );

    // Growing A to the width B already bounds: A's own rectangle grows,
    // the aggregate stays put.
    graph.set_property(&a, "width", PropertyValue::Number(30.0));
    graph.update();

    assert_rect(
        graph.metadata().aligned_bounding_rectangle(&a).unwrap(),
        0.0,
        0.0,
        30.0,
        10.0,
    );
    assert_rect(
        graph.metadata().aligned_bounding_rectangle(&b).unwrap(),
        20.0,
        0.0,
        10.0,
        10.0,
    );
    assert_rect(
        graph.metadata().aligned_bounding_rectangle(&root).unwrap(),
        0.0,
        0.0,
        30.0,
        10.0,
    );
}

fn page_origin(graph: &LocalSceneGraph, page: &NodeId) -> (f64, f64) {
    let world = graph.metadata().world_transform(page);
    let [.., e, f] = world.abcdef();
    (e, f)
}

#[test]
fn test_book_binding_scenario() {
    let mut graph = cached_graph();
    let root = graph.root_id().unwrap();
    let binding = graph
        .create_node(
            LayoutData::Binding {
                method: BindingMethod::Book,
            }
            .into_node_data(),
            Some(&root),
        )
        .unwrap();
    let pages: Vec<NodeId> = (0..3)
        .map(|_| {
            graph
                .create_node(
                    LayoutData::Page(PageData {
                        width: 100.0,
                        height: 100.0,
                    })
                    .into_node_data(),
                    Some(&binding),
                )
                .unwrap()
        })
        .collect();

    graph.update();

    assert_eq!(page_origin(&graph, &pages[0]), (0.0, 0.0));
    assert_eq!(page_origin(&graph, &pages[1]), (-100.0, 0.0));
    assert_eq!(page_origin(&graph, &pages[2]), (0.0, 120.0));
}

#[test]
fn test_carousel_binding_scenario() {
    let mut graph = cached_graph();
    let root = graph.root_id().unwrap();
    let binding = graph
        .create_node(
            LayoutData::Binding {
                method: BindingMethod::Carousel,
            }
            .into_node_data(),
            Some(&root),
        )
        .unwrap();
    let pages: Vec<NodeId> = (0..3)
        .map(|_| {
            graph
                .create_node(
                    LayoutData::Page(PageData::default()).into_node_data(),
                    Some(&binding),
                )
                .unwrap()
        })
        .collect();

    graph.update();

    assert_eq!(page_origin(&graph, &pages[0]), (0.0, 0.0));
    assert_eq!(page_origin(&graph, &pages[1]), (100.0, 0.0));
    assert_eq!(page_origin(&graph, &pages[2]), (200.0, 0.0));
}

#[test]
fn test_page_recompute_without_binding_context() {
    // A dirty page recomputed on its own (no binding ancestor in the
    // dirty set) must land on the same placement as a full pass.
    let mut graph = cached_graph();
    let root = graph.root_id().unwrap();
    let binding = graph
        .create_node(
            LayoutData::Binding {
                method: BindingMethod::Book,
            }
            .into_node_data(),
            Some(&root),
        )
        .unwrap();
    let pages: Vec<NodeId> = (0..2)
        .map(|_| {
            graph
                .create_node(
                    LayoutData::Page(PageData::default()).into_node_data(),
                    Some(&binding),
                )
                .unwrap()
        })
        .collect();
    graph.update();

    // Dirty only the second page; it must re-place itself from its
    // sibling position even though no binding ancestor recomputes.
    graph.set_property(&pages[1], "width", PropertyValue::Number(80.0));
    graph.update();

    assert_eq!(page_origin(&graph, &pages[1]), (-80.0, 0.0));
}

#[test]
fn test_upward_propagation_through_groups() {
    let mut graph = cached_graph();
    let root = graph.root_id().unwrap();
    let g1 = graph
        .create_node(
            LayoutData::Group(TransformData::default()).into_node_data(),
            Some(&root),
        )
        .unwrap();
    let g2 = graph
        .create_node(
            LayoutData::Group(TransformData::default()).into_node_data(),
            Some(&g1),
        )
        .unwrap();
    let leaf = graph
        .create_node(rect_data(0.0, 0.0, 10.0, 10.0).into_node_data(), Some(&g2))
        .unwrap();
    graph.update();

    graph.set_property(&leaf, "width", PropertyValue::Number(50.0));
    graph.update();

    // Every ancestor up to the root reflects the new geometry after
    // exactly one update.
    for ancestor in [&g2, &g1, &root] {
        assert_rect(
            graph
                .metadata()
                .aligned_bounding_rectangle(ancestor)
                .unwrap(),
            0.0,
            0.0,
            50.0,
            10.0,
        );
    }
}

/// Records every pre-order visit; used to observe traversal behavior.
struct CountingPolicy {
    visits: Rc<RefCell<Vec<NodeId>>>,
}

impl<G: SceneGraph> CachePolicy<G> for CountingPolicy {
    type Context = ();

    fn filter(&self) -> CacheFilter {
        CacheFilter::always()
    }

    fn process_node(&self, node: &NodeRef<'_, G>, _context: &mut Self::Context) {
        self.visits.borrow_mut().push(node.id().clone());
    }

    fn process_node_post(&self, _node: &NodeRef<'_, G>, _context: &mut Self::Context) {}
}

#[test]
fn test_coalescing_recomputes_each_node_once() {
    let mut graph = LocalSceneGraph::new(LayoutData::Root.into_node_data());
    let root = graph.root_id().unwrap();
    let group = graph
        .create_node(
            LayoutData::Group(TransformData::default()).into_node_data(),
            Some(&root),
        )
        .unwrap();
    let leaf = graph
        .create_node(rect_data(0.0, 0.0, 1.0, 1.0).into_node_data(), Some(&group))
        .unwrap();

    let visits: Rc<RefCell<Vec<NodeId>>> = Rc::default();
    graph.add_system(Box::new(MetadataCache::new(CountingPolicy {
        visits: Rc::clone(&visits),
    })));
    visits.borrow_mut().clear();

    // Dirty an ancestor and its descendant in the same cycle.
    graph.set_property(&group, "x", PropertyValue::Number(5.0));
    graph.set_property(&leaf, "width", PropertyValue::Number(2.0));
    graph.update();

    let recorded = visits.borrow();
    let leaf_visits = recorded.iter().filter(|id| **id == leaf).count();
    let group_visits = recorded.iter().filter(|id| **id == group).count();
    assert_eq!(leaf_visits, 1, "descendant revisited or skipped: {recorded:?}");
    assert_eq!(group_visits, 1);
    assert!(!recorded.contains(&root), "clean ancestor must not recompute");
}

#[test]
fn test_noops_leave_caches_clean() {
    let mut graph = LocalSceneGraph::new(LayoutData::Root.into_node_data());
    let root = graph.root_id().unwrap();
    let a = graph
        .create_node(rect_data(0.0, 0.0, 1.0, 1.0).into_node_data(), Some(&root))
        .unwrap();

    let cache = MetadataCache::new(CountingPolicy {
        visits: Rc::default(),
    });
    let dirty: Rc<RefCell<HashSet<NodeId>>> = cache.dirty_handle();
    graph.add_system(Box::new(cache));
    dirty.borrow_mut().clear();

    graph.reparent_node(&a, &root);
    graph.move_node_before(&a, &a);
    graph.set_property(&a, "width", PropertyValue::Number(1.0));

    assert!(dirty.borrow().is_empty(), "no-ops must not mark caches dirty");
}

#[test]
fn test_remote_changes_flow_into_caches() {
    let network = MemoryRelayNetwork::new();

    let mut a = ReplicatedSceneGraph::new(LayoutData::Root.into_node_data());
    a.add_system(Box::new(Synchronizer::new(network.connect())));

    let mut b = ReplicatedSceneGraph::attach(a.document_id().unwrap());
    b.add_system(Box::new(Synchronizer::new(network.connect())));
    b.add_system(Box::new(MetadataCache::new(TransformCache::new())));
    b.add_system(Box::new(MetadataCache::new(BoundsCache::new())));

    let root = a.root_id().unwrap();
    a.create_node(rect_data(0.0, 0.0, 10.0, 10.0).into_node_data(), Some(&root));

    for _ in 0..50 {
        a.update();
        b.update();
        if network.pending() == 0 {
            break;
        }
    }

    // The merge arrived as a batched nodeCreated; the caches picked it
    // up in the same tick's update.
    assert_rect(
        b.metadata().aligned_bounding_rectangle(&root).unwrap(),
        0.0,
        0.0,
        10.0,
        10.0,
    );
}
