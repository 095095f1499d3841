//! Node kinds.
//!
//! The document stores a node's kind as its `kind` property; in code it
//! is a closed sum type. The capability methods preserve the old is-a
//! chain (a Rectangle is also a Shape is also a Transform) without
//! string membership checks.

use folio_scenegraph::{NodeRef, SceneGraph};

/// Every node kind the layout engine knows about. The string forms are
/// the replicated type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Binding,
    Page,
    Transform,
    Group,
    Rectangle,
    Circle,
    Ellipse,
    Image,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Root => "Root",
            NodeKind::Binding => "Binding",
            NodeKind::Page => "Page",
            NodeKind::Transform => "Transform",
            NodeKind::Group => "Group",
            NodeKind::Rectangle => "Rectangle",
            NodeKind::Circle => "Circle",
            NodeKind::Ellipse => "Ellipse",
            NodeKind::Image => "Image",
        }
    }

    pub fn parse(tag: &str) -> Option<NodeKind> {
        match tag {
            "Root" => Some(NodeKind::Root),
            "Binding" => Some(NodeKind::Binding),
            "Page" => Some(NodeKind::Page),
            "Transform" => Some(NodeKind::Transform),
            "Group" => Some(NodeKind::Group),
            "Rectangle" => Some(NodeKind::Rectangle),
            "Circle" => Some(NodeKind::Circle),
            "Ellipse" => Some(NodeKind::Ellipse),
            "Image" => Some(NodeKind::Image),
            _ => None,
        }
    }

    /// Kinds that carry their own local transform (the old `Transform`
    /// branch of the is-a chain).
    pub fn has_transform(&self) -> bool {
        matches!(
            self,
            NodeKind::Transform
                | NodeKind::Group
                | NodeKind::Rectangle
                | NodeKind::Circle
                | NodeKind::Ellipse
                | NodeKind::Image
        )
    }

    /// Shape kinds (stroked/filled drawables).
    pub fn is_shape(&self) -> bool {
        matches!(self, NodeKind::Rectangle | NodeKind::Circle | NodeKind::Ellipse)
    }

    /// Leaf-like drawables with intrinsic local bounds: shapes and
    /// pages. These get pre-order bounds; everything else aggregates
    /// its children post-order.
    pub fn is_drawable_leaf(&self) -> bool {
        self.is_shape() || matches!(self, NodeKind::Page)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind lookup on scene graph accessor handles.
pub trait LayoutNode {
    /// The node's declared kind, if it carries a known tag.
    fn kind(&self) -> Option<NodeKind>;
}

impl<G: SceneGraph> LayoutNode for NodeRef<'_, G> {
    fn kind(&self) -> Option<NodeKind> {
        self.property(crate::data::keys::KIND)
            .and_then(|value| value.as_str().and_then(NodeKind::parse))
    }
}
