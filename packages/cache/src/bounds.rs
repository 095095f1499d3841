//! Bounding rectangle cache.
//!
//! Drawable leaves (shapes, pages) get their local bounds transformed
//! by the cached world transform in pre-order; every other node derives
//! its rectangle post-order as the axis-aligned union of its children's
//! rectangles, or a degenerate zero-area rectangle at its own world
//! origin when no child is bounded.

use folio_geometry::BoundingRect;
use folio_layout::{local_bounding_rectangle, LayoutNode, NodeKind};
use folio_scenegraph::{NodeRef, SceneGraph};

use crate::engine::{CacheFilter, CachePolicy};

#[derive(Debug, Default)]
pub struct BoundsCache;

impl BoundsCache {
    pub fn new() -> Self {
        Self
    }
}

fn is_drawable_leaf<G: SceneGraph>(node: &NodeRef<'_, G>) -> bool {
    node.kind().map_or(false, |kind| kind.is_drawable_leaf())
}

impl<G: SceneGraph> CachePolicy<G> for BoundsCache {
    type Context = ();

    fn filter(&self) -> CacheFilter {
        // TODO: narrow down filters for dirty nodes
        CacheFilter::always()
    }

    fn process_node(&self, node: &NodeRef<'_, G>, _context: &mut Self::Context) {
        if !is_drawable_leaf(node) {
            return;
        }
        let Some(local) = local_bounding_rectangle(node) else {
            return;
        };
        let world = node.graph().metadata().world_transform(node.id());
        let bounding = local.transform(&world);
        node.update_metadata(|metadata| {
            metadata.bounding_rectangle = Some(bounding);
            metadata.aligned_bounding_rectangle = Some(bounding.align());
        });
    }

    fn process_node_post(&self, node: &NodeRef<'_, G>, _context: &mut Self::Context) {
        if is_drawable_leaf(node) {
            return;
        }

        let child_bounds: Vec<BoundingRect> = node
            .children()
            .iter()
            .filter_map(|child| child.metadata().aligned_bounding_rectangle)
            .collect();

        let aligned = if child_bounds.is_empty() {
            let world = node.graph().metadata().world_transform(node.id());
            BoundingRect::zero().transform(&world)
        } else {
            BoundingRect::aligned_enclosing(&child_bounds)
        };

        node.update_metadata(|metadata| {
            metadata.bounding_rectangle = Some(aligned);
            metadata.aligned_bounding_rectangle = Some(aligned);
        });
    }
}
