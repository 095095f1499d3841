//! Typed node data.
//!
//! [`LayoutData`] is the creation payload: a per-kind struct that
//! converts into the scene graph's property bag. The `read` methods are
//! the other direction: typed views over a live node, with the same
//! defaults applied, so downstream code never has to assume a property
//! is present.

use serde::{Deserialize, Serialize};

use folio_scenegraph::{NodeData, NodeRef, PropertyValue, SceneGraph};

use crate::kind::NodeKind;

/// Replicated property keys.
pub mod keys {
    pub const KIND: &str = "kind";
    pub const METHOD: &str = "method";
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const SCALE: &str = "scale";
    pub const ROTATION: &str = "rotation";
    pub const SKEW_X: &str = "skewX";
    pub const SKEW_Y: &str = "skewY";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const R: &str = "r";
    pub const RX: &str = "rx";
    pub const RY: &str = "ry";
    pub const URL: &str = "url";
    pub const STROKE: &str = "stroke";
    pub const STROKE_WIDTH: &str = "strokeWidth";
    pub const STROKE_LINECAP: &str = "strokeLinecap";
    pub const STROKE_LINEJOIN: &str = "strokeLinejoin";
    pub const STROKE_MITERLIMIT: &str = "strokeMiterlimit";
    pub const STROKE_DASHARRAY: &str = "strokeDasharray";
    pub const STROKE_DASHOFFSET: &str = "strokeDashoffset";
    pub const FILL: &str = "fill";
    pub const FILL_RULE: &str = "fillRule";
}

fn read_number<G: SceneGraph>(node: &NodeRef<'_, G>, key: &str, default: f64) -> f64 {
    node.property(key)
        .and_then(|value| value.as_f64())
        .unwrap_or(default)
}

fn read_string<G: SceneGraph>(node: &NodeRef<'_, G>, key: &str, default: &str) -> String {
    node.property(key)
        .and_then(|value| value.as_str().map(String::from))
        .unwrap_or_else(|| default.to_string())
}

/// Local transform properties shared by every transform-bearing kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformData {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub rotation: f64,
    pub skew_x: f64,
    pub skew_y: f64,
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            rotation: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
        }
    }
}

impl TransformData {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn read<G: SceneGraph>(node: &NodeRef<'_, G>) -> Self {
        Self {
            x: read_number(node, keys::X, 0.0),
            y: read_number(node, keys::Y, 0.0),
            scale: read_number(node, keys::SCALE, 1.0),
            rotation: read_number(node, keys::ROTATION, 0.0),
            skew_x: read_number(node, keys::SKEW_X, 0.0),
            skew_y: read_number(node, keys::SKEW_Y, 0.0),
        }
    }

    fn write(&self, data: &mut NodeData) {
        data.set(keys::X, self.x);
        data.set(keys::Y, self.y);
        data.set(keys::SCALE, self.scale);
        data.set(keys::ROTATION, self.rotation);
        data.set(keys::SKEW_X, self.skew_x);
        data.set(keys::SKEW_Y, self.skew_y);
    }
}

/// Stroke and fill styling shared by the shape kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub stroke: String,
    pub stroke_width: f64,
    pub stroke_linecap: String,
    pub stroke_linejoin: String,
    pub stroke_miterlimit: f64,
    pub stroke_dasharray: Vec<f64>,
    pub stroke_dashoffset: f64,
    pub fill: String,
    pub fill_rule: String,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke: "#000000".to_string(),
            stroke_width: 0.0,
            stroke_linecap: "butt".to_string(),
            stroke_linejoin: "miter".to_string(),
            stroke_miterlimit: 4.0,
            stroke_dasharray: Vec::new(),
            stroke_dashoffset: 0.0,
            fill: "#000000".to_string(),
            fill_rule: "nonzero".to_string(),
        }
    }
}

impl ShapeStyle {
    pub fn read<G: SceneGraph>(node: &NodeRef<'_, G>) -> Self {
        let dasharray = node
            .property(keys::STROKE_DASHARRAY)
            .and_then(|value| {
                value
                    .as_list()
                    .map(|items| items.iter().filter_map(PropertyValue::as_f64).collect())
            })
            .unwrap_or_default();
        Self {
            stroke: read_string(node, keys::STROKE, "#000000"),
            stroke_width: read_number(node, keys::STROKE_WIDTH, 0.0),
            stroke_linecap: read_string(node, keys::STROKE_LINECAP, "butt"),
            stroke_linejoin: read_string(node, keys::STROKE_LINEJOIN, "miter"),
            stroke_miterlimit: read_number(node, keys::STROKE_MITERLIMIT, 4.0),
            stroke_dasharray: dasharray,
            stroke_dashoffset: read_number(node, keys::STROKE_DASHOFFSET, 0.0),
            fill: read_string(node, keys::FILL, "#000000"),
            fill_rule: read_string(node, keys::FILL_RULE, "nonzero"),
        }
    }

    fn write(&self, data: &mut NodeData) {
        data.set(keys::STROKE, self.stroke.as_str());
        data.set(keys::STROKE_WIDTH, self.stroke_width);
        data.set(keys::STROKE_LINECAP, self.stroke_linecap.as_str());
        data.set(keys::STROKE_LINEJOIN, self.stroke_linejoin.as_str());
        data.set(keys::STROKE_MITERLIMIT, self.stroke_miterlimit);
        data.set(
            keys::STROKE_DASHARRAY,
            PropertyValue::from(self.stroke_dasharray.clone()),
        );
        data.set(keys::STROKE_DASHOFFSET, self.stroke_dashoffset);
        data.set(keys::FILL, self.fill.as_str());
        data.set(keys::FILL_RULE, self.fill_rule.as_str());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    pub width: f64,
    pub height: f64,
}

impl Default for PageData {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
        }
    }
}

impl PageData {
    pub fn read<G: SceneGraph>(node: &NodeRef<'_, G>) -> Self {
        Self {
            width: read_number(node, keys::WIDTH, 100.0),
            height: read_number(node, keys::HEIGHT, 100.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RectangleData {
    pub transform: TransformData,
    pub style: ShapeStyle,
    pub width: f64,
    pub height: f64,
}

impl RectangleData {
    pub fn sized(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            transform: TransformData::at(x, y),
            width,
            height,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircleData {
    pub transform: TransformData,
    pub style: ShapeStyle,
    pub r: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EllipseData {
    pub transform: TransformData,
    pub style: ShapeStyle,
    pub rx: f64,
    pub ry: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub transform: TransformData,
    pub url: String,
}

/// Creation payload for every node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayoutData {
    Root,
    Binding { method: crate::binding::BindingMethod },
    Page(PageData),
    Transform(TransformData),
    Group(TransformData),
    Rectangle(RectangleData),
    Circle(CircleData),
    Ellipse(EllipseData),
    Image(ImageData),
}

impl LayoutData {
    pub fn kind(&self) -> NodeKind {
        match self {
            LayoutData::Root => NodeKind::Root,
            LayoutData::Binding { .. } => NodeKind::Binding,
            LayoutData::Page(_) => NodeKind::Page,
            LayoutData::Transform(_) => NodeKind::Transform,
            LayoutData::Group(_) => NodeKind::Group,
            LayoutData::Rectangle(_) => NodeKind::Rectangle,
            LayoutData::Circle(_) => NodeKind::Circle,
            LayoutData::Ellipse(_) => NodeKind::Ellipse,
            LayoutData::Image(_) => NodeKind::Image,
        }
    }

    pub fn into_node_data(self) -> NodeData {
        let mut data = NodeData::new().with(keys::KIND, self.kind().as_str());
        match self {
            LayoutData::Root => {}
            LayoutData::Binding { method } => data.set(keys::METHOD, method.as_str()),
            LayoutData::Page(page) => {
                data.set(keys::WIDTH, page.width);
                data.set(keys::HEIGHT, page.height);
            }
            LayoutData::Transform(transform) | LayoutData::Group(transform) => {
                transform.write(&mut data);
            }
            LayoutData::Rectangle(rectangle) => {
                rectangle.transform.write(&mut data);
                rectangle.style.write(&mut data);
                data.set(keys::WIDTH, rectangle.width);
                data.set(keys::HEIGHT, rectangle.height);
            }
            LayoutData::Circle(circle) => {
                circle.transform.write(&mut data);
                circle.style.write(&mut data);
                data.set(keys::R, circle.r);
            }
            LayoutData::Ellipse(ellipse) => {
                ellipse.transform.write(&mut data);
                ellipse.style.write(&mut data);
                data.set(keys::RX, ellipse.rx);
                data.set(keys::RY, ellipse.ry);
            }
            LayoutData::Image(image) => {
                image.transform.write(&mut data);
                data.set(keys::URL, image.url.as_str());
            }
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_scenegraph::{LocalSceneGraph, SceneGraph};

    #[test]
    fn test_rectangle_payload_roundtrip() {
        let mut graph = LocalSceneGraph::new(LayoutData::Root.into_node_data());
        let root = graph.root_id().unwrap();
        let id = graph
            .create_node(
                LayoutData::Rectangle(RectangleData::sized(5.0, 6.0, 10.0, 20.0)).into_node_data(),
                Some(&root),
            )
            .unwrap();

        let node = graph.node(&id).unwrap();
        let transform = TransformData::read(&node);
        assert_eq!(transform.x, 5.0);
        assert_eq!(transform.y, 6.0);
        assert_eq!(transform.scale, 1.0);
        assert_eq!(read_number(&node, keys::WIDTH, 0.0), 10.0);
        assert_eq!(read_number(&node, keys::HEIGHT, 0.0), 20.0);

        let style = ShapeStyle::read(&node);
        assert_eq!(style.stroke_width, 0.0);
        assert_eq!(style.fill, "#000000");
    }

    #[test]
    fn test_typed_reads_default_when_absent() {
        let mut graph = LocalSceneGraph::new(LayoutData::Root.into_node_data());
        let root = graph.root_id().unwrap();
        let bare = graph
            .create_node(NodeData::new().with(keys::KIND, "Page"), Some(&root))
            .unwrap();

        let node = graph.node(&bare).unwrap();
        let page = PageData::read(&node);
        assert_eq!(page.width, 100.0);
        assert_eq!(page.height, 100.0);
    }
}
