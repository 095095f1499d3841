//! World transform cache.
//!
//! Pre-order policy: every node's world transform is its parent's world
//! transform composed with its own local matrix. Binding containers
//! reset the pagination context; their Page children are placed by the
//! registered strategy for the binding's method. The inverse world
//! transform is cached alongside for hit-testing.

use std::collections::HashMap;

use folio_geometry::Mat3;
use folio_layout::{
    keys, BindingContext, BindingMethod, BookBinding, CarouselBinding, LayoutNode, NodeKind,
    PageData, PageLayoutStrategy, TransformData,
};
use folio_scenegraph::{NodeRef, SceneGraph};

use crate::engine::{CacheFilter, CachePolicy};

/// Traversal context: live pagination state while under a binding.
#[derive(Default)]
pub struct TransformContext {
    binding: Option<BindingContext>,
}

pub struct TransformCache {
    strategies: HashMap<BindingMethod, Box<dyn PageLayoutStrategy>>,
}

impl TransformCache {
    pub fn new() -> Self {
        let mut strategies: HashMap<BindingMethod, Box<dyn PageLayoutStrategy>> = HashMap::new();
        strategies.insert(BindingMethod::Book, Box::new(BookBinding));
        strategies.insert(BindingMethod::Carousel, Box::new(CarouselBinding));
        Self { strategies }
    }

    fn place_page<G: SceneGraph>(
        &self,
        node: &NodeRef<'_, G>,
        page: &PageData,
        context: &mut TransformContext,
    ) -> Mat3 {
        if let Some(binding) = context.binding.as_mut() {
            let local = self.page_transform(page, binding);
            binding.current_page += 1;
            return local;
        }
        // Recomputation started at or below this page, so no binding
        // context is live; reconstruct the placement from the parent
        // binding and the page's sibling position.
        self.reconstruct_page_placement(node, page)
    }

    fn reconstruct_page_placement<G: SceneGraph>(
        &self,
        node: &NodeRef<'_, G>,
        page: &PageData,
    ) -> Mat3 {
        let Some(parent) = node.parent() else {
            return Mat3::identity();
        };
        if parent.kind() != Some(NodeKind::Binding) {
            return Mat3::identity();
        }
        let method = binding_method(&parent);
        let page_number = parent
            .children()
            .iter()
            .filter(|child| child.kind() == Some(NodeKind::Page))
            .position(|child| child.id() == node.id())
            .map_or(1, |index| index as u32 + 1);
        self.page_transform(
            page,
            &BindingContext {
                method,
                current_page: page_number,
            },
        )
    }

    fn page_transform(&self, page: &PageData, context: &BindingContext) -> Mat3 {
        match self.strategies.get(&context.method) {
            Some(strategy) => strategy.page_transform(page, context),
            None => Mat3::identity(),
        }
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new()
    }
}

fn binding_method<G: SceneGraph>(node: &NodeRef<'_, G>) -> BindingMethod {
    node.property(keys::METHOD)
        .and_then(|value| value.as_str().and_then(BindingMethod::parse))
        .unwrap_or_default()
}

fn parent_world_transform<G: SceneGraph>(node: &NodeRef<'_, G>) -> Mat3 {
    match node.parent() {
        Some(parent) => parent.graph().metadata().world_transform(parent.id()),
        None => Mat3::identity(),
    }
}

impl<G: SceneGraph> CachePolicy<G> for TransformCache {
    type Context = TransformContext;

    fn filter(&self) -> CacheFilter {
        // TODO: narrow down filters for dirty nodes
        CacheFilter::always()
    }

    fn process_node(&self, node: &NodeRef<'_, G>, context: &mut Self::Context) {
        let world = match node.kind() {
            Some(NodeKind::Binding) => {
                context.binding = Some(BindingContext::new(binding_method(node)));
                parent_world_transform(node)
            }
            Some(NodeKind::Page) => {
                let page = PageData::read(node);
                let local = self.place_page(node, &page, context);
                parent_world_transform(node).mul(&local)
            }
            Some(kind) if kind.has_transform() => {
                let t = TransformData::read(node);
                // translate ∘ rotate ∘ shear ∘ scale, in that fixed order.
                let local = Mat3::translate(t.x, t.y).mul(
                    &Mat3::rotate(t.rotation)
                        .mul(&Mat3::shear(t.skew_x, t.skew_y).mul(&Mat3::scale(t.scale, t.scale))),
                );
                parent_world_transform(node).mul(&local)
            }
            _ => parent_world_transform(node),
        };

        node.update_metadata(|metadata| {
            metadata.world_transform = Some(world);
            metadata.inverse_world_transform = world.invert();
        });
    }

    fn process_node_post(&self, _node: &NodeRef<'_, G>, _context: &mut Self::Context) {}
}
