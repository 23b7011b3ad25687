use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Round a float to N decimal places.
pub fn round_f64(v: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (v * factor).round() / factor
}

/// Wrapper that rounds f64 to 6 decimal places on serialization.
fn serialize_f64_rounded<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(round_f64(*v, 6))
}

// ─── Shared primitives ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub x: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Size {
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub w: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub h: f64,
}

impl Size {
    pub fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillType {
    #[default]
    None,
    Solid,
    Outline,
    Background,
    Color,
}

impl FillType {
    pub fn from_token(token: &str) -> Self {
        match token {
            "solid" | "yes" | "true" => FillType::Solid,
            "outline" => FillType::Outline,
            "background" => FillType::Background,
            "color" => FillType::Color,
            _ => FillType::None,
        }
    }
}

/// Circular arc recovered from three points on its circumference.
///
/// Angles are in degrees, measured with `atan2` in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Arc {
    pub start: Point,
    pub mid: Point,
    pub end: Point,
    pub center: Point,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub radius: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub start_angle: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub end_angle: f64,
    pub clockwise: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Line {
        start: Point,
        end: Point,
    },
    Rect {
        start: Point,
        end: Point,
    },
    Circle {
        center: Point,
        #[serde(serialize_with = "serialize_f64_rounded")]
        radius: f64,
    },
    Arc(Arc),
    Polyline {
        points: Vec<Point>,
    },
    Polygon {
        points: Vec<Point>,
    },
}

/// A stroked, optionally filled shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Graphic {
    pub shape: Shape,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub stroke_width: f64,
    pub fill: FillType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub text: String,
    pub at: Point,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub rotation: f64,
    pub font_size: Size,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TitleBlock {
    pub title: String,
    pub date: String,
    pub revision: String,
    pub company: String,
    pub comments: Vec<String>,
}

// ─── Schematic ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schematic {
    pub version: f64,
    pub generator: String,
    pub uuid: String,
    pub paper: String,
    pub title_block: TitleBlock,
    pub lib_symbols: BTreeMap<String, LibSymbol>,
    pub symbols: Vec<SchematicSymbol>,
    pub wires: Vec<Wire>,
    pub buses: Vec<Wire>,
    pub bus_entries: Vec<BusEntry>,
    pub junctions: Vec<Junction>,
    pub labels: Vec<Label>,
    pub no_connects: Vec<NoConnect>,
    pub sheets: Vec<Sheet>,
    pub texts: Vec<Text>,
}

impl Schematic {
    /// Library definition a placement refers to.
    pub fn lib_symbol_for(&self, symbol: &SchematicSymbol) -> Option<&LibSymbol> {
        self.lib_symbols.get(symbol.catalog_key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibSymbol {
    pub name: String,
    pub extends: Option<String>,
    pub power: bool,
    pub in_bom: bool,
    pub on_board: bool,
    pub pin_names_visible: bool,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub pin_name_offset: f64,
    pub pin_numbers_visible: bool,
    pub properties: BTreeMap<String, String>,
    pub units: Vec<LibSymbolUnit>,
}

/// Graphics and pins for one unit/body-style combination.
///
/// `unit == 0` is shared by every unit; `convert == 0` by every body style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibSymbolUnit {
    pub name: String,
    pub unit: u32,
    pub convert: u32,
    pub graphics: Vec<Graphic>,
    pub texts: Vec<Text>,
    pub pins: Vec<LibPin>,
}

impl LibSymbolUnit {
    pub fn applies_to(&self, unit: u32, convert: u32) -> bool {
        (self.unit == 0 || self.unit == unit) && (self.convert == 0 || self.convert == convert)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibPin {
    pub electrical_type: String,
    pub graphic_style: String,
    pub at: Point,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub rotation: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub length: f64,
    pub name: String,
    pub number: String,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mirror {
    X,
    Y,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchematicSymbol {
    pub lib_id: String,
    pub lib_name: Option<String>,
    pub uuid: String,
    pub at: Point,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub rotation: f64,
    pub mirror: Option<Mirror>,
    pub unit: u32,
    pub convert: u32,
    pub in_bom: bool,
    pub on_board: bool,
    pub dnp: bool,
    pub properties: BTreeMap<String, Property>,
    pub pins: Vec<PlacedPin>,
}

impl SchematicSymbol {
    /// Key into [`Schematic::lib_symbols`]; `lib_name` wins when present.
    pub fn catalog_key(&self) -> &str {
        self.lib_name.as_deref().unwrap_or(&self.lib_id)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|p| p.value.as_str())
    }

    pub fn reference(&self) -> Option<&str> {
        self.property("Reference")
    }

    pub fn value(&self) -> Option<&str> {
        self.property("Value")
    }

    pub fn footprint(&self) -> Option<&str> {
        self.property("Footprint")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub value: String,
    pub at: Point,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub rotation: f64,
    pub visible: bool,
    pub font_size: Size,
}

/// A library pin moved into sheet coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedPin {
    pub number: String,
    pub name: String,
    pub electrical_type: String,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wire {
    pub start: Point,
    pub end: Point,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub stroke_width: f64,
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusEntry {
    pub at: Point,
    pub size: Size,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub stroke_width: f64,
    pub uuid: String,
}

impl BusEntry {
    /// The far end of the diagonal.
    pub fn end(&self) -> Point {
        Point::new(self.at.x + self.size.w, self.at.y + self.size.h)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Junction {
    pub at: Point,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub diameter: f64,
    pub uuid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Net,
    Global,
    Hierarchical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    #[serde(rename = "type")]
    pub kind: LabelKind,
    pub text: String,
    pub at: Point,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub rotation: f64,
    pub shape: Option<String>,
    pub font_size: Size,
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoConnect {
    pub at: Point,
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    pub at: Point,
    pub size: Size,
    pub name: String,
    pub file: String,
    pub uuid: String,
    pub pins: Vec<SheetPin>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetPin {
    pub name: String,
    pub direction: String,
    pub at: Point,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub rotation: f64,
    pub uuid: String,
}

// ─── Board ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Board {
    pub version: f64,
    pub generator: String,
    pub paper: String,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub thickness: f64,
    pub title_block: TitleBlock,
    pub layers: Vec<Layer>,
    pub nets: BTreeMap<u32, String>,
    pub footprints: Vec<Footprint>,
    pub tracks: Vec<Track>,
    pub vias: Vec<Via>,
    pub edges: Vec<BoardGraphic>,
    pub graphics: Vec<BoardGraphic>,
    pub texts: Vec<BoardText>,
    pub zones: Vec<Zone>,
}

impl Board {
    pub fn net_name(&self, id: u32) -> Option<&str> {
        self.nets.get(&id).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    #[serde(rename = "F")]
    Front,
    #[serde(rename = "B")]
    Back,
}

impl Side {
    pub fn from_layer(name: &str) -> Self {
        if name.starts_with("B.") {
            Side::Back
        } else {
            Side::Front
        }
    }
}

/// A graphic on a named board layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardGraphic {
    pub layer: String,
    #[serde(flatten)]
    pub graphic: Graphic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardText {
    pub layer: String,
    #[serde(flatten)]
    pub text: Text,
}

// ─── Footprint ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Footprint {
    pub lib_id: String,
    pub uuid: String,
    pub at: Point,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub rotation: f64,
    pub side: Side,
    pub reference: String,
    pub value: String,
    pub properties: BTreeMap<String, String>,
    pub attributes: Vec<String>,
    pub pads: Vec<Pad>,
    pub graphics: Vec<BoardGraphic>,
    pub texts: Vec<FootprintText>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    Reference,
    Value,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FootprintText {
    pub kind: TextKind,
    pub layer: String,
    #[serde(flatten)]
    pub text: Text,
}

// ─── Pad ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PadKind {
    Smd,
    ThruHole,
    NpThruHole,
    Connect,
}

impl PadKind {
    pub fn from_token(token: &str) -> Self {
        match token {
            "thru_hole" => PadKind::ThruHole,
            "np_thru_hole" => PadKind::NpThruHole,
            "connect" => PadKind::Connect,
            _ => PadKind::Smd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PadShape {
    Rect,
    RoundRect,
    Circle,
    Oval,
    Trapezoid,
    ChamferedRect,
    Custom,
}

impl PadShape {
    pub fn from_token(token: &str) -> Self {
        match token {
            "roundrect" => PadShape::RoundRect,
            "circle" => PadShape::Circle,
            "oval" => PadShape::Oval,
            "trapezoid" => PadShape::Trapezoid,
            "chamfrect" | "chamfered_rect" => PadShape::ChamferedRect,
            "custom" => PadShape::Custom,
            _ => PadShape::Rect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pad {
    pub number: String,
    pub kind: PadKind,
    pub shape: PadShape,
    pub position: Point,
    pub size: Size,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub rotation: f64,
    /// Hole diameter; 0 means no hole.
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub drill: f64,
    /// Slot dimensions for `(drill oval w h)`.
    pub drill_size: Option<Size>,
    pub offset: Option<Point>,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub roundrect_ratio: f64,
    pub chamfer_ratio: Option<f64>,
    pub net: u32,
    pub net_name: String,
    pub layers: Vec<String>,
}

// ─── Track / Via ─────────────────────────────────────────────────────

/// Copper track; `shape` is a [`Shape::Line`] or [`Shape::Arc`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub layer: String,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub width: f64,
    pub net: u32,
    pub uuid: String,
    pub shape: Shape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViaKind {
    Through,
    Blind,
    Micro,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Via {
    pub kind: ViaKind,
    pub at: Point,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub size: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub drill: f64,
    pub layers: Vec<String>,
    pub net: u32,
    pub uuid: String,
}

// ─── Zone ────────────────────────────────────────────────────────────

/// One filled region of a zone on one layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    pub net: u32,
    pub net_name: String,
    pub name: Option<String>,
    pub keepout: bool,
    pub layer: String,
    pub polygon: Vec<Point>,
}
