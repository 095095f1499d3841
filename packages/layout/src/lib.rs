//! # Folio Layout
//!
//! Typed page-layout vocabulary on top of the scene graph: the closed
//! set of node kinds, per-kind creation payloads and property views,
//! the pagination strategies for binding containers, and a document
//! facade with grouping conveniences.
//!
//! The scene graph stays generic and string-keyed; this crate is where
//! a `kind` tag becomes a [`NodeKind`] and a property bag becomes a
//! [`TransformData`] or [`PageData`] with defaults applied.

mod binding;
mod data;
mod kind;
mod layout;

pub use binding::{
    BindingContext, BindingMethod, BookBinding, CarouselBinding, PageLayoutStrategy, PAGE_ROW_GAP,
};
pub use data::{
    keys, CircleData, EllipseData, ImageData, LayoutData, PageData, RectangleData, ShapeStyle,
    TransformData,
};
pub use kind::{LayoutNode, NodeKind};
pub use layout::{is_point_inside, local_bounding_rectangle, Layout};
