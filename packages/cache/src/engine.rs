//! Dirty-tracking recomputation engine.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use tracing::debug;

use folio_scenegraph::{
    EventKind, NodeId, NodeRef, SceneGraph, SceneGraphEvent, SceneGraphSystem, TraversalControl,
};

/// Per-event-kind dirty filter: a constant or a predicate.
#[derive(Clone)]
pub enum EventFilter {
    Constant(bool),
    Predicate(Rc<dyn Fn(&SceneGraphEvent) -> bool>),
}

impl EventFilter {
    pub fn matches(&self, event: &SceneGraphEvent) -> bool {
        match self {
            EventFilter::Constant(value) => *value,
            EventFilter::Predicate(predicate) => predicate(event),
        }
    }
}

impl From<bool> for EventFilter {
    fn from(value: bool) -> Self {
        EventFilter::Constant(value)
    }
}

/// Which of the three event kinds mark a node dirty for a cache.
#[derive(Clone)]
pub struct CacheFilter {
    pub node_created: EventFilter,
    pub node_moved: EventFilter,
    pub property_changed: EventFilter,
}

impl CacheFilter {
    /// Mark dirty on every event kind. The correctness baseline every
    /// cache currently uses; narrower filters are a pure optimization.
    pub fn always() -> Self {
        Self {
            node_created: EventFilter::Constant(true),
            node_moved: EventFilter::Constant(true),
            property_changed: EventFilter::Constant(true),
        }
    }

    fn matches(&self, event: &SceneGraphEvent) -> bool {
        match event.kind() {
            EventKind::NodeCreated => self.node_created.matches(event),
            EventKind::NodeMoved => self.node_moved.matches(event),
            EventKind::PropertyChanged => self.property_changed.matches(event),
        }
    }
}

/// A concrete cache: visitor callbacks plus a dirty filter.
///
/// `process_node` runs pre-order (parent fully visited before its first
/// child), `process_node_post` post-order. Both receive a per-traversal
/// context created fresh for every recomputed subtree. Visitors write
/// results into the graph's metadata table; they must stay total over
/// any reachable node and default missing inputs instead of failing.
pub trait CachePolicy<G: SceneGraph> {
    type Context: Default;

    fn filter(&self) -> CacheFilter;

    fn process_node(&self, node: &NodeRef<'_, G>, context: &mut Self::Context);

    fn process_node_post(&self, node: &NodeRef<'_, G>, context: &mut Self::Context);
}

/// Generic dirty-tracking, coalescing, traversal-driven cache system.
pub struct MetadataCache<P> {
    policy: P,
    dirty: Rc<RefCell<HashSet<NodeId>>>,
}

impl<P> MetadataCache<P> {
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            dirty: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    /// Shared handle onto this cache's dirty set (tests, diagnostics).
    pub fn dirty_handle(&self) -> Rc<RefCell<HashSet<NodeId>>> {
        Rc::clone(&self.dirty)
    }

    fn recompute<G: SceneGraph>(&self, graph: &G, start: Option<&NodeId>)
    where
        P: CachePolicy<G>,
    {
        let mut context = P::Context::default();
        let policy = &self.policy;
        graph.traverse(
            start,
            &mut context,
            &mut |node, context| {
                policy.process_node(&node, context);
                TraversalControl::Continue
            },
            &mut |node, context| policy.process_node_post(&node, context),
        );
    }
}

impl<G: SceneGraph, P: CachePolicy<G>> SceneGraphSystem<G> for MetadataCache<P> {
    fn initialize(&mut self, graph: &mut G) {
        let dirty = Rc::clone(&self.dirty);
        let filter = self.policy.filter();
        graph.subscribe(Rc::new(move |event| {
            if filter.matches(event) {
                let mut dirty = dirty.borrow_mut();
                for id in event.node_ids() {
                    dirty.insert(id.clone());
                }
            }
        }));

        // Seed all metadata with one full pass from the root.
        self.recompute(graph, None);
    }

    fn update(&mut self, graph: &mut G) {
        if self.dirty.borrow().is_empty() {
            return;
        }

        // Coalesce: recomputing from a dirty ancestor already revisits
        // the descendant, in the right relative order.
        let dirty: HashSet<NodeId> = self.dirty.borrow().clone();
        let mut survivors = Vec::new();
        for id in &dirty {
            if !graph.contains(id) {
                continue;
            }
            let mut has_dirty_ancestor = false;
            graph.ascend(
                id,
                &mut has_dirty_ancestor,
                &mut |node, found| {
                    if node.id() != id && dirty.contains(node.id()) {
                        *found = true;
                        return TraversalControl::Stop;
                    }
                    TraversalControl::Continue
                },
                &mut |_, _| {},
            );
            if !has_dirty_ancestor {
                survivors.push(id.clone());
            }
        }
        debug!(
            "Recomputing {} subtree(s) coalesced from {} dirty node(s)",
            survivors.len(),
            dirty.len()
        );

        for id in &survivors {
            self.recompute(graph, Some(id));

            // Keep aggregates correct for every ancestor, not just the
            // immediate parent: apply the post-order visitor on the way
            // up (as the ascent's pre callback, so it fires going up).
            if let Some(parent) = graph.parent_of(id) {
                let mut context = P::Context::default();
                let policy = &self.policy;
                graph.ascend(
                    &parent,
                    &mut context,
                    &mut |node, context| {
                        policy.process_node_post(&node, context);
                        TraversalControl::Continue
                    },
                    &mut |_, _| {},
                );
            }
        }

        self.dirty.borrow_mut().clear();
    }
}
