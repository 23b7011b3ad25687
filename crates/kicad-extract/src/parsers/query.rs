//! Shallow lookups over a parsed [`Node`] tree.
//!
//! Every helper looks at immediate children only. KiCad puts the qualifiers of
//! an element (`at`, `size`, `stroke`, `layer`, ...) directly under the list
//! that owns them, so nothing here searches deeper than one level.

use super::serialize::format_number;
use super::sexpr::Node;
use crate::types::{FillType, Point, Size};
use std::borrow::Cow;

/// An atom borrowed out of the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    Text(&'a str),
    Number(f64),
}

impl<'a> Scalar<'a> {
    fn from_node(node: &'a Node) -> Option<Self> {
        match node {
            Node::Text(s) => Some(Scalar::Text(s)),
            Node::Number(v) => Some(Scalar::Number(*v)),
            Node::List(_) => None,
        }
    }

    /// Text form; numbers are rendered the way the serializer writes them.
    pub fn to_text(self) -> Cow<'a, str> {
        match self {
            Scalar::Text(s) => Cow::Borrowed(s),
            Scalar::Number(v) => Cow::Owned(format_number(v)),
        }
    }

    /// Numeric form; text is accepted when it parses as a number.
    pub fn to_f64(self) -> Option<f64> {
        match self {
            Scalar::Number(v) => Some(v),
            Scalar::Text(s) => s.trim().parse().ok().filter(|v: &f64| v.is_finite()),
        }
    }
}

/// Position read from an `(at x y [rot])`-shaped list.
///
/// `rotation` is `None` when the third element is absent, which callers keep
/// distinct from an explicit `0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub rotation: Option<f64>,
}

impl Coordinate {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn rotation_or_zero(&self) -> f64 {
        self.rotation.unwrap_or(0.0)
    }
}

impl Node {
    /// Get the first atom in a list (the "tag" or "name").
    pub fn tag(&self) -> Option<&str> {
        self.as_list()?.first()?.as_text()
    }

    /// Get all items including tag.
    pub fn items(&self) -> &[Node] {
        self.as_list().unwrap_or(&[])
    }

    /// Get list children (everything after the tag).
    pub fn children(&self) -> &[Node] {
        match self.as_list() {
            Some(items) if !items.is_empty() => &items[1..],
            _ => &[],
        }
    }

    /// First immediate child list whose head is `tag`.
    pub fn find(&self, tag: &str) -> Option<&Node> {
        self.items().iter().find(|c| c.tag() == Some(tag))
    }

    /// All immediate child lists whose head is `tag`, in document order.
    pub fn find_all(&self, tag: &str) -> Vec<&Node> {
        self.items()
            .iter()
            .filter(|c| c.tag() == Some(tag))
            .collect()
    }

    /// Second element of the `(tag value ...)` child.
    pub fn value(&self, tag: &str) -> Option<Scalar<'_>> {
        self.find(tag)?.atom_at(0)
    }

    /// [`Node::value`] coerced to an owned string.
    pub fn text_value(&self, tag: &str) -> Option<String> {
        self.value(tag).map(|v| v.to_text().into_owned())
    }

    /// [`Node::value`] coerced to a float.
    pub fn value_f64(&self, tag: &str) -> Option<f64> {
        self.value(tag)?.to_f64()
    }

    /// Get the nth atom child (0-indexed from children, i.e., after the tag).
    pub fn atom_at(&self, index: usize) -> Option<Scalar<'_>> {
        self.children().get(index).and_then(Scalar::from_node)
    }

    pub fn text_at(&self, index: usize) -> Option<String> {
        self.atom_at(index).map(|v| v.to_text().into_owned())
    }

    /// Get the nth child as f64.
    pub fn f64_at(&self, index: usize) -> Option<f64> {
        self.atom_at(index)?.to_f64()
    }

    /// Whether a bare atom `name` appears among the children.
    pub fn has_atom(&self, name: &str) -> bool {
        self.has_atom_after(0, name)
    }

    /// Like [`Node::has_atom`], ignoring the first `skip` children, which
    /// hold positional values such as a name or a text string.
    pub fn has_atom_after(&self, skip: usize, name: &str) -> bool {
        self.children()
            .iter()
            .skip(skip)
            .any(|c| c.as_text() == Some(name))
    }

    /// Boolean qualifier in either spelling: a bare `name` atom, or a
    /// `(name yes|no)` child. A bare `(name)` list also counts as set.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flag_after(0, name)
    }

    /// [`Node::flag`] for lists whose first `skip` children are positional.
    pub fn flag_after(&self, skip: usize, name: &str) -> Option<bool> {
        if self.has_atom_after(skip, name) {
            return Some(true);
        }
        let node = self.find(name)?;
        match node.atom_at(0) {
            Some(v) => Some(matches!(&*v.to_text(), "yes" | "true")),
            None => Some(true),
        }
    }
}

/// Find the first top-level list, i.e. the document root.
pub fn first_list(nodes: &[Node]) -> Option<&Node> {
    nodes.iter().find(|n| n.is_list())
}

/// Read `(tag x y [rot])` under `node`.
pub fn coordinate(node: &Node, tag: &str) -> Option<Coordinate> {
    let at = node.find(tag)?;
    Some(Coordinate {
        x: at.f64_at(0).unwrap_or(0.0),
        y: at.f64_at(1).unwrap_or(0.0),
        rotation: at.f64_at(2),
    })
}

/// Read `(tag x y)` under `node` as a point.
pub fn point(node: &Node, tag: &str) -> Option<Point> {
    coordinate(node, tag).map(|c| c.point())
}

/// Read `(tag w h)` under `node`.
pub fn size(node: &Node, tag: &str) -> Option<Size> {
    let size = node.find(tag)?;
    let w = size.f64_at(0).unwrap_or(0.0);
    Some(Size::new(w, size.f64_at(1).unwrap_or(w)))
}

/// Vertices of the `(pts (xy x y) ...)` child, in order.
///
/// Non-`xy` entries (e.g. `arc` segments inside outlines) are skipped.
pub fn points(node: &Node) -> Vec<Point> {
    node.find("pts")
        .map(|pts| {
            pts.find_all("xy")
                .iter()
                .map(|xy| Point::new(xy.f64_at(0).unwrap_or(0.0), xy.f64_at(1).unwrap_or(0.0)))
                .collect()
        })
        .unwrap_or_default()
}

/// Stroke width: `(stroke (width w))` first, then the legacy `(width w)`.
pub fn stroke_width(node: &Node) -> Option<f64> {
    node.find("stroke")
        .and_then(|s| s.value_f64("width"))
        .or_else(|| node.value_f64("width"))
}

/// Fill from `(fill (type t))`, `(fill t)` or `(fill yes|no)`.
pub fn fill_type(node: &Node) -> FillType {
    let Some(fill) = node.find("fill") else {
        return FillType::None;
    };
    fill.text_value("type")
        .or_else(|| fill.text_at(0))
        .map(|t| FillType::from_token(&t))
        .unwrap_or_default()
}

/// Font size from `(effects (font (size h w)))`.
pub fn font_size(node: &Node) -> Option<Size> {
    let font = node.find("effects")?.find("font")?;
    size(font, "size")
}

/// Hidden either on the element itself or inside its `effects`.
///
/// `positional` is the number of leading value atoms (e.g. 2 for
/// `(property "Key" "Value" ...)`), so a value spelled `hide` is not
/// mistaken for the flag.
pub fn is_hidden(node: &Node, positional: usize) -> bool {
    node.flag_after(positional, "hide")
        .or_else(|| node.find("effects").and_then(|e| e.flag("hide")))
        .unwrap_or(false)
}

/// Layer name from `(layer "X")`.
pub fn layer_name(node: &Node) -> String {
    node.text_value("layer").unwrap_or_default()
}

/// All atoms of the `(layers ...)` child, unexpanded.
pub fn layer_names(node: &Node) -> Vec<String> {
    node.find("layers")
        .map(|l| {
            l.children()
                .iter()
                .filter_map(|c| Scalar::from_node(c).map(|s| s.to_text().into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::sexpr::parse;

    fn root(text: &str) -> Node {
        parse(text).remove(0)
    }

    #[test]
    fn test_find_and_find_all_keep_document_order() {
        let r = root("(root (net 0 \"\") (x) (net 1 \"GND\") (net 2 \"VCC\"))");
        let nets = r.find_all("net");
        assert_eq!(nets.len(), 3);
        assert_eq!(nets[2].text_at(1).as_deref(), Some("VCC"));
        assert_eq!(r.find("net").and_then(|n| n.f64_at(0)), Some(0.0));
        assert!(r.find("missing").is_none());
    }

    #[test]
    fn test_find_only_looks_at_immediate_children() {
        let r = root("(a (b (c 1)))");
        assert!(r.find("c").is_none());
        assert!(r.find("b").unwrap().find("c").is_some());
    }

    #[test]
    fn test_value_coercion() {
        let r = root("(pad (number 1) (name \"A1\") (ratio \"0.5\"))");
        assert_eq!(r.value("number"), Some(Scalar::Number(1.0)));
        assert_eq!(r.text_value("number").as_deref(), Some("1"));
        assert_eq!(r.text_value("name").as_deref(), Some("A1"));
        assert_eq!(r.value_f64("ratio"), Some(0.5));
        assert_eq!(r.value_f64("name"), None);
    }

    #[test]
    fn test_coordinate_distinguishes_missing_rotation() {
        let r = root("(s (at 1 2) (pos 3 4 0))");
        let at = coordinate(&r, "at").unwrap();
        assert_eq!((at.x, at.y, at.rotation), (1.0, 2.0, None));
        let pos = coordinate(&r, "pos").unwrap();
        assert_eq!(pos.rotation, Some(0.0));
    }

    #[test]
    fn test_size_and_points() {
        let r = root("(s (size 2 3) (pts (xy 0 0) (arc (start 1 1)) (xy 5 6)))");
        assert_eq!(size(&r, "size"), Some(Size::new(2.0, 3.0)));
        assert_eq!(points(&r), vec![Point::new(0.0, 0.0), Point::new(5.0, 6.0)]);
    }

    #[test]
    fn test_stroke_width_priority() {
        assert_eq!(stroke_width(&root("(l (width 0.2) (stroke (width 0.3)))")), Some(0.3));
        assert_eq!(stroke_width(&root("(l (width 0.2))")), Some(0.2));
        assert_eq!(stroke_width(&root("(l)")), None);
    }

    #[test]
    fn test_fill_spellings() {
        assert_eq!(fill_type(&root("(c (fill (type background)))")), FillType::Background);
        assert_eq!(fill_type(&root("(c (fill solid))")), FillType::Solid);
        assert_eq!(fill_type(&root("(c (fill yes))")), FillType::Solid);
        assert_eq!(fill_type(&root("(c (fill none))")), FillType::None);
        assert_eq!(fill_type(&root("(c)")), FillType::None);
    }

    #[test]
    fn test_hidden_spellings() {
        assert!(is_hidden(&root("(t (effects (font (size 1 1)) hide))"), 0));
        assert!(is_hidden(&root("(t (effects (font (size 1 1)) (hide yes)))"), 0));
        assert!(is_hidden(&root("(t hide)"), 0));
        assert!(is_hidden(&root("(t (hide yes))"), 0));
        assert!(!is_hidden(&root("(t (hide no))"), 0));
        assert!(!is_hidden(&root("(t (effects (font (size 1 1))))"), 0));
    }

    #[test]
    fn test_value_spelled_like_flag_is_not_a_flag() {
        let prop = root("(property \"Note\" \"hide\" (at 1 1 0) (effects (font (size 1 1))))");
        assert!(!is_hidden(&prop, 2));
        assert!(is_hidden(&prop, 1));

        let prop = root("(property \"Note\" \"hide\" (at 1 1 0) hide)");
        assert!(is_hidden(&prop, 2));

        let sym = root("(symbol \"power\" (pin_names hide))");
        assert!(!sym.has_atom_after(1, "power"));
        assert_eq!(sym.flag_after(1, "power"), None);
    }

    #[test]
    fn test_font_size() {
        let r = root("(t (effects (font (size 1.27 1.5) (thickness 0.1))))");
        assert_eq!(font_size(&r), Some(Size::new(1.27, 1.5)));
    }

    #[test]
    fn test_layer_names() {
        let r = root("(pad (layers \"*.Cu\" \"*.Mask\") (layer \"F.Cu\"))");
        assert_eq!(layer_names(&r), vec!["*.Cu", "*.Mask"]);
        assert_eq!(layer_name(&r), "F.Cu");
    }
}
