use super::query::{
    coordinate, fill_type, layer_name, layer_names, point, points, size, stroke_width, Scalar,
};
use super::sexpr::Node;
use super::{expect_root, parse_text, parse_title_block, uuid_of};
use crate::error::ExtractError;
use crate::geometry::{arc_from_center, arc_or_line, rect_edges, rotate_and_translate};
use crate::types::*;
use log::{debug, trace};
use std::collections::BTreeMap;

pub const ROOT_TAG: &str = "kicad_pcb";

const DEFAULT_PAPER: &str = "A4";
const DEFAULT_THICKNESS: f64 = 1.6;
const DEFAULT_STROKE_WIDTH: f64 = 0.1;
const DEFAULT_TRACK_WIDTH: f64 = 0.25;
const DEFAULT_ROUNDRECT_RATIO: f64 = 0.25;

/// Layers whose graphics describe the board outline.
const OUTLINE_LAYERS: &[&str] = &["Edge.Cuts"];

/// Build a [`Board`] from the root `(kicad_pcb ...)` list.
pub fn extract(root: &Node) -> Result<Board, ExtractError> {
    expect_root(root, ROOT_TAG)?;

    // Wildcard expansion below needs the layer table.
    let layers = parse_layers(root);
    let nets = parse_nets(root);
    let ctx = Context {
        layers: &layers,
        nets: &nets,
    };

    let mut edges = Vec::new();
    let mut graphics = Vec::new();
    let mut texts = Vec::new();
    let mut tracks = Vec::new();
    let mut vias = Vec::new();
    let mut footprints = Vec::new();
    let mut zones = Vec::new();

    for child in root.children() {
        let Some(tag) = child.tag() else {
            continue;
        };
        match tag {
            "footprint" | "module" => footprints.push(parse_footprint(child, &ctx)),
            "segment" => tracks.extend(parse_segment(child, &ctx)),
            "arc" => tracks.extend(parse_arc_track(child, &ctx)),
            "via" => vias.push(parse_via(child, &ctx)),
            "zone" => zones.extend(parse_zone(child, &ctx)),
            "gr_text" => texts.push(BoardText {
                layer: layer_name(child),
                text: parse_text(child, 0),
            }),
            _ => {
                let Some(kind) = tag.strip_prefix("gr_") else {
                    continue;
                };
                let Some(shape) = parse_shape(child, kind, &Placement::BOARD) else {
                    continue;
                };
                let layer = layer_name(child);
                let target = if OUTLINE_LAYERS.contains(&layer.as_str()) {
                    &mut edges
                } else {
                    &mut graphics
                };
                let graphic = Graphic {
                    shape,
                    stroke_width: stroke_width(child).unwrap_or(DEFAULT_STROKE_WIDTH),
                    fill: fill_type(child),
                };
                push_board_graphic(target, layer, graphic);
            }
        }
    }

    let board = Board {
        version: root.value_f64("version").unwrap_or(0.0),
        generator: root.text_value("generator").unwrap_or_default(),
        paper: root
            .text_value("paper")
            .unwrap_or_else(|| DEFAULT_PAPER.to_string()),
        thickness: root
            .find("general")
            .and_then(|g| g.value_f64("thickness"))
            .unwrap_or(DEFAULT_THICKNESS),
        title_block: parse_title_block(root),
        layers,
        nets,
        footprints,
        tracks,
        vias,
        edges,
        graphics,
        texts,
        zones,
    };

    debug!(
        "board: {} layers, {} nets, {} footprints, {} tracks, {} vias, {} edges, {} zones",
        board.layers.len(),
        board.nets.len(),
        board.footprints.len(),
        board.tracks.len(),
        board.vias.len(),
        board.edges.len(),
        board.zones.len()
    );

    Ok(board)
}

/// Tables every board item may refer to.
struct Context<'a> {
    layers: &'a [Layer],
    nets: &'a BTreeMap<u32, String>,
}

impl Context<'_> {
    /// Net id and name from a `(net 3 "GND")`, `(net 3)` or `(net "GND")` child.
    ///
    /// Names come from the net table; an inline name is only used for ids
    /// the table does not list.
    fn net_of(&self, node: &Node) -> (u32, String) {
        let Some(net) = node.find("net") else {
            return (0, String::new());
        };
        match net.atom_at(0) {
            Some(Scalar::Number(id)) => {
                let id = id as u32;
                let name = self
                    .nets
                    .get(&id)
                    .cloned()
                    .or_else(|| net.text_at(1))
                    .unwrap_or_default();
                (id, name)
            }
            Some(Scalar::Text(name)) => {
                let id = self
                    .nets
                    .iter()
                    .find(|(_, n)| n.as_str() == name)
                    .map(|(id, _)| *id)
                    .unwrap_or(0);
                (id, name.to_string())
            }
            None => (0, String::new()),
        }
    }

    /// Expand layer wildcards against the layer table, keeping first-seen order.
    fn expand_layers(&self, names: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let expanded: Vec<String> = match name.as_str() {
                "*.Cu" => self
                    .layers
                    .iter()
                    .filter(|l| l.name.ends_with(".Cu"))
                    .map(|l| l.name.clone())
                    .collect(),
                "F&B.Cu" => vec!["F.Cu".into(), "B.Cu".into()],
                "*.Mask" => vec!["F.Mask".into(), "B.Mask".into()],
                "*.Paste" => vec!["F.Paste".into(), "B.Paste".into()],
                _ => vec![name.clone()],
            };
            for layer in expanded {
                if !out.contains(&layer) {
                    out.push(layer);
                }
            }
        }
        out
    }
}

// ─── Layers and nets ─────────────────────────────────────────────────

/// Entries look like `(0 "F.Cu" signal)` or `(44 "Edge.Cuts" user "Edge Cuts")`.
fn parse_layers(root: &Node) -> Vec<Layer> {
    let Some(table) = root.find("layers") else {
        return Vec::new();
    };
    table
        .children()
        .iter()
        .filter_map(|entry| {
            let items = entry.as_list()?;
            let id = items.first()?.as_number()?;
            let name = entry.text_at(0)?;
            Some(Layer {
                id: id as i64,
                name,
                kind: entry.text_at(1).unwrap_or_default(),
                user_name: entry.text_at(2),
            })
        })
        .collect()
}

fn parse_nets(root: &Node) -> BTreeMap<u32, String> {
    root.find_all("net")
        .iter()
        .filter_map(|net| {
            let id = net.f64_at(0)? as u32;
            Some((id, net.text_at(1).unwrap_or_default()))
        })
        .collect()
}

// ─── Shapes ──────────────────────────────────────────────────────────

/// Rigid transform from footprint-local to board coordinates.
#[derive(Debug, Clone, Copy)]
struct Placement {
    at: Point,
    rotation: f64,
}

impl Placement {
    const BOARD: Placement = Placement {
        at: Point { x: 0.0, y: 0.0 },
        rotation: 0.0,
    };

    fn apply(&self, local: Point) -> Point {
        rotate_and_translate(local, self.at, self.rotation)
    }

    fn point(&self, node: &Node, tag: &str) -> Option<Point> {
        point(node, tag).map(|p| self.apply(p))
    }
}

/// Shape of a `gr_*`/`fp_*` primitive, where `kind` is the tag minus its prefix.
fn parse_shape(node: &Node, kind: &str, place: &Placement) -> Option<Shape> {
    let shape = match kind {
        "line" => Shape::Line {
            start: place.point(node, "start")?,
            end: place.point(node, "end")?,
        },
        "rect" => {
            let start = point(node, "start")?;
            let end = point(node, "end")?;
            if place.rotation == 0.0 {
                Shape::Rect {
                    start: place.apply(start),
                    end: place.apply(end),
                }
            } else {
                // No longer axis-aligned once rotated.
                let corners = [
                    start,
                    Point::new(end.x, start.y),
                    end,
                    Point::new(start.x, end.y),
                ];
                Shape::Polygon {
                    points: corners.iter().map(|c| place.apply(*c)).collect(),
                }
            }
        }
        "circle" => {
            let center = place
                .point(node, "center")
                .or_else(|| place.point(node, "start"))?;
            let end = place.point(node, "end")?;
            Shape::Circle {
                center,
                radius: center.distance(end),
            }
        }
        "arc" => {
            let start = place.point(node, "start")?;
            let end = place.point(node, "end")?;
            match place.point(node, "mid") {
                Some(mid) => arc_or_line(start, mid, end),
                // Older grammar: start is the centre, end the arc start.
                None => arc_from_center(start, end, node.value_f64("angle").unwrap_or(0.0)),
            }
        }
        "poly" => {
            let pts: Vec<Point> = points(node).into_iter().map(|p| place.apply(p)).collect();
            if pts.is_empty() {
                trace!("skipping polygon without points");
                return None;
            }
            Shape::Polygon { points: pts }
        }
        _ => return None,
    };
    Some(shape)
}

/// Rectangles become their four edges; everything else is pushed as-is.
fn push_board_graphic(target: &mut Vec<BoardGraphic>, layer: String, graphic: Graphic) {
    if let Shape::Rect { start, end } = graphic.shape {
        for edge in rect_edges(start, end) {
            target.push(BoardGraphic {
                layer: layer.clone(),
                graphic: Graphic {
                    shape: edge,
                    stroke_width: graphic.stroke_width,
                    fill: FillType::None,
                },
            });
        }
    } else {
        target.push(BoardGraphic { layer, graphic });
    }
}

// ─── Footprints ──────────────────────────────────────────────────────

fn parse_footprint(node: &Node, ctx: &Context) -> Footprint {
    let coord = coordinate(node, "at");
    let place = Placement {
        at: coord.map(|c| c.point()).unwrap_or_default(),
        rotation: coord.map(|c| c.rotation_or_zero()).unwrap_or(0.0),
    };

    let mut properties = BTreeMap::new();
    let mut attributes = Vec::new();
    let mut pads = Vec::new();
    let mut graphics = Vec::new();
    let mut texts = Vec::new();

    for child in node.children() {
        let Some(tag) = child.tag() else {
            continue;
        };
        match tag {
            "pad" => pads.push(parse_pad(child, &place, ctx)),
            "attr" => attributes.extend(
                child
                    .children()
                    .iter()
                    .filter_map(|a| a.as_text().map(str::to_string)),
            ),
            "property" => {
                let Some(key) = child.text_at(0) else {
                    continue;
                };
                // Only placed properties are drawn.
                if child.find("layer").is_some() {
                    let kind = match key.as_str() {
                        "Reference" => TextKind::Reference,
                        "Value" => TextKind::Value,
                        _ => TextKind::User,
                    };
                    texts.push(parse_fp_text(child, kind, &place));
                }
                properties.insert(key, child.text_at(1).unwrap_or_default());
            }
            "fp_text" => {
                let kind = match child.text_at(0).as_deref() {
                    Some("reference") => TextKind::Reference,
                    Some("value") => TextKind::Value,
                    _ => TextKind::User,
                };
                texts.push(parse_fp_text(child, kind, &place));
            }
            _ => {
                let Some(kind) = tag.strip_prefix("fp_") else {
                    continue;
                };
                if let Some(shape) = parse_shape(child, kind, &place) {
                    graphics.push(BoardGraphic {
                        layer: layer_name(child),
                        graphic: Graphic {
                            shape,
                            stroke_width: stroke_width(child).unwrap_or(DEFAULT_STROKE_WIDTH),
                            fill: fill_type(child),
                        },
                    });
                }
            }
        }
    }

    // Older files only have fp_text for reference and value.
    let text_of = |kind: TextKind| {
        texts
            .iter()
            .find(|t: &&FootprintText| t.kind == kind)
            .map(|t| t.text.text.clone())
    };
    let reference = properties
        .get("Reference")
        .cloned()
        .or_else(|| text_of(TextKind::Reference))
        .unwrap_or_default();
    let value = properties
        .get("Value")
        .cloned()
        .or_else(|| text_of(TextKind::Value))
        .unwrap_or_default();

    Footprint {
        lib_id: node.text_at(0).unwrap_or_default(),
        uuid: uuid_of(node),
        at: place.at,
        rotation: place.rotation,
        side: Side::from_layer(&layer_name(node)),
        reference,
        value,
        properties,
        attributes,
        pads,
        graphics,
        texts,
    }
}

fn parse_fp_text(node: &Node, kind: TextKind, place: &Placement) -> FootprintText {
    let mut text = parse_text(node, 1);
    text.at = place.apply(text.at);
    FootprintText {
        kind,
        layer: layer_name(node),
        text,
    }
}

/// `(pad "1" smd roundrect (at x y [rot]) (size w h) (layers ...) ...)`
fn parse_pad(node: &Node, place: &Placement, ctx: &Context) -> Pad {
    let coord = coordinate(node, "at");
    let local = coord.map(|c| c.point()).unwrap_or_default();
    let drill_node = node.find("drill");

    // `(drill 0.8)` or `(drill oval 1.2 0.8)`, with an optional `(offset x y)`.
    let (drill, drill_size) = match drill_node {
        Some(d) if d.has_atom("oval") => {
            let numbers: Vec<f64> = d.children().iter().filter_map(Node::as_number).collect();
            let w = numbers.first().copied().unwrap_or(0.0);
            let h = numbers.get(1).copied().unwrap_or(w);
            (w, Some(Size::new(w, h)))
        }
        Some(d) => (d.f64_at(0).unwrap_or(0.0), None),
        None => (0.0, None),
    };
    let offset = drill_node
        .and_then(|d| point(d, "offset"))
        .or_else(|| point(node, "offset"));

    let (net, net_name) = ctx.net_of(node);

    Pad {
        number: node.text_at(0).unwrap_or_default(),
        kind: PadKind::from_token(&node.text_at(1).unwrap_or_default()),
        shape: PadShape::from_token(&node.text_at(2).unwrap_or_default()),
        position: place.apply(local),
        size: size(node, "size").unwrap_or_default(),
        rotation: coord.map(|c| c.rotation_or_zero()).unwrap_or(0.0),
        drill,
        drill_size,
        offset,
        roundrect_ratio: node
            .value_f64("roundrect_rratio")
            .unwrap_or(DEFAULT_ROUNDRECT_RATIO),
        chamfer_ratio: node.value_f64("chamfer_ratio"),
        net,
        net_name,
        layers: ctx.expand_layers(&layer_names(node)),
    }
}

// ─── Tracks and vias ─────────────────────────────────────────────────

fn parse_segment(node: &Node, ctx: &Context) -> Option<Track> {
    let start = point(node, "start")?;
    let end = point(node, "end")?;
    Some(track(node, ctx, Shape::Line { start, end }))
}

fn parse_arc_track(node: &Node, ctx: &Context) -> Option<Track> {
    let start = point(node, "start")?;
    let mid = point(node, "mid")?;
    let end = point(node, "end")?;
    Some(track(node, ctx, arc_or_line(start, mid, end)))
}

fn track(node: &Node, ctx: &Context, shape: Shape) -> Track {
    Track {
        layer: layer_name(node),
        width: node.value_f64("width").unwrap_or(DEFAULT_TRACK_WIDTH),
        net: ctx.net_of(node).0,
        uuid: uuid_of(node),
        shape,
    }
}

fn parse_via(node: &Node, ctx: &Context) -> Via {
    let kind = if node.has_atom("blind") {
        ViaKind::Blind
    } else if node.has_atom("micro") {
        ViaKind::Micro
    } else {
        ViaKind::Through
    };
    Via {
        kind,
        at: point(node, "at").unwrap_or_default(),
        size: node.value_f64("size").unwrap_or(0.0),
        drill: node.value_f64("drill").unwrap_or(0.0),
        layers: ctx.expand_layers(&layer_names(node)),
        net: ctx.net_of(node).0,
        uuid: uuid_of(node),
    }
}

// ─── Zones ───────────────────────────────────────────────────────────

/// One [`Zone`] per filled layer, or per declared layer when unfilled.
fn parse_zone(node: &Node, ctx: &Context) -> Vec<Zone> {
    let (net, mut net_name) = ctx.net_of(node);
    if !ctx.nets.contains_key(&net) {
        net_name = node.text_value("net_name").unwrap_or(net_name);
    }
    let name = node.text_value("name");
    let keepout = node.find("keepout").is_some();

    let mut declared = layer_names(node);
    if declared.is_empty() {
        declared.extend(node.text_value("layer"));
    }
    let layers = ctx.expand_layers(&declared);

    let filled = node.find_all("filled_polygon");
    let regions: Vec<(String, Vec<Point>)> = if filled.is_empty() {
        let outline = node.find("polygon").map(points).unwrap_or_default();
        layers.iter().map(|l| (l.clone(), outline.clone())).collect()
    } else {
        filled
            .iter()
            .map(|fp| {
                let layer = fp
                    .text_value("layer")
                    .or_else(|| layers.first().cloned())
                    .unwrap_or_default();
                (layer, points(fp))
            })
            .collect()
    };

    regions
        .into_iter()
        .filter(|(layer, polygon)| {
            let keep = polygon.len() >= 3;
            if !keep {
                trace!("dropping degenerate zone polygon on {layer}");
            }
            keep
        })
        .map(|(layer, polygon)| Zone {
            net,
            net_name: net_name.clone(),
            name: name.clone(),
            keepout,
            layer,
            polygon,
        })
        .collect()
}
