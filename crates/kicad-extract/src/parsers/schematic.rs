use super::query::{
    coordinate, fill_type, font_size, is_hidden, point, points, size, stroke_width,
};
use super::sexpr::Node;
use super::{expect_root, parse_text, parse_title_block, uuid_of, DEFAULT_FONT_SIZE};
use crate::error::ExtractError;
use crate::geometry::{arc_or_line, rotate_and_translate};
use crate::types::*;
use log::{debug, warn};
use std::collections::BTreeMap;

pub const ROOT_TAG: &str = "kicad_sch";

const DEFAULT_PAPER: &str = "A4";
const DEFAULT_PIN_NAME_OFFSET: f64 = 0.508;

/// Build a [`Schematic`] from the root `(kicad_sch ...)` list.
pub fn extract(root: &Node) -> Result<Schematic, ExtractError> {
    expect_root(root, ROOT_TAG)?;

    let lib_symbols = parse_lib_symbols(root);

    // Definitions inside lib_symbols share the `symbol` tag; placements are
    // the ones carrying a lib_id.
    let symbols: Vec<SchematicSymbol> = root
        .find_all("symbol")
        .into_iter()
        .filter(|s| s.find("lib_id").is_some())
        .map(|s| parse_symbol(s, &lib_symbols))
        .collect();

    let mut labels = Vec::new();
    for child in root.children() {
        let kind = match child.tag() {
            Some("label") => LabelKind::Net,
            Some("global_label") => LabelKind::Global,
            Some("hierarchical_label") => LabelKind::Hierarchical,
            _ => continue,
        };
        labels.push(parse_label(child, kind));
    }

    let schematic = Schematic {
        version: root.value_f64("version").unwrap_or(0.0),
        generator: root.text_value("generator").unwrap_or_default(),
        uuid: uuid_of(root),
        paper: root
            .text_value("paper")
            .unwrap_or_else(|| DEFAULT_PAPER.to_string()),
        title_block: parse_title_block(root),
        symbols,
        wires: root.find_all("wire").into_iter().filter_map(parse_wire).collect(),
        buses: root.find_all("bus").into_iter().filter_map(parse_wire).collect(),
        bus_entries: root
            .find_all("bus_entry")
            .into_iter()
            .map(parse_bus_entry)
            .collect(),
        junctions: root
            .find_all("junction")
            .into_iter()
            .map(parse_junction)
            .collect(),
        labels,
        no_connects: root
            .find_all("no_connect")
            .into_iter()
            .map(|n| NoConnect {
                at: point(n, "at").unwrap_or_default(),
                uuid: uuid_of(n),
            })
            .collect(),
        sheets: root.find_all("sheet").into_iter().map(parse_sheet).collect(),
        texts: root
            .find_all("text")
            .into_iter()
            .map(|t| parse_text(t, 0))
            .collect(),
        lib_symbols,
    };

    debug!(
        "schematic: {} lib symbols, {} symbols, {} wires, {} labels, {} sheets",
        schematic.lib_symbols.len(),
        schematic.symbols.len(),
        schematic.wires.len(),
        schematic.labels.len(),
        schematic.sheets.len()
    );

    Ok(schematic)
}

// ─── Library symbols ─────────────────────────────────────────────────

fn parse_lib_symbols(root: &Node) -> BTreeMap<String, LibSymbol> {
    let mut catalog = BTreeMap::new();
    if let Some(lib) = root.find("lib_symbols") {
        for node in lib.find_all("symbol") {
            let symbol = parse_lib_symbol(node);
            catalog.insert(symbol.name.clone(), symbol);
        }
    }
    catalog
}

fn parse_lib_symbol(node: &Node) -> LibSymbol {
    let name = node.text_at(0).unwrap_or_default();
    let pin_names = node.find("pin_names");

    let mut units = Vec::new();
    // Older libraries put graphics straight on the symbol.
    let own = parse_unit(node, name.clone(), 0, 1);
    if !own.graphics.is_empty() || !own.pins.is_empty() || !own.texts.is_empty() {
        units.push(own);
    }
    collect_units(node, &mut units);

    LibSymbol {
        extends: node.text_value("extends"),
        power: node.find("power").is_some() || node.has_atom_after(1, "power"),
        in_bom: node.flag_after(1, "in_bom").unwrap_or(true),
        on_board: node.flag_after(1, "on_board").unwrap_or(true),
        pin_names_visible: !pin_names.is_some_and(|p| is_hidden(p, 0)),
        pin_name_offset: pin_names
            .and_then(|p| p.value_f64("offset"))
            .unwrap_or(DEFAULT_PIN_NAME_OFFSET),
        pin_numbers_visible: !node.find("pin_numbers").is_some_and(|p| is_hidden(p, 0)),
        properties: node
            .find_all("property")
            .iter()
            .filter_map(|p| Some((p.text_at(0)?, p.text_at(1).unwrap_or_default())))
            .collect(),
        units,
        name,
    }
}

/// Walk nested `(symbol "Name_U_C" ...)` lists depth-first.
fn collect_units(node: &Node, units: &mut Vec<LibSymbolUnit>) {
    for sub in node.find_all("symbol") {
        let name = sub.text_at(0).unwrap_or_default();
        let (unit, convert) = unit_suffix(&name).unwrap_or((0, 1));
        units.push(parse_unit(sub, name, unit, convert));
        collect_units(sub, units);
    }
}

/// Split the `_<unit>_<convert>` suffix off a sub-symbol name.
fn unit_suffix(name: &str) -> Option<(u32, u32)> {
    let mut parts = name.rsplitn(3, '_');
    let convert = parts.next()?.parse().ok()?;
    let unit = parts.next()?.parse().ok()?;
    parts.next()?;
    Some((unit, convert))
}

fn parse_unit(node: &Node, name: String, unit: u32, convert: u32) -> LibSymbolUnit {
    let mut graphics = Vec::new();
    let mut texts = Vec::new();
    let mut pins = Vec::new();

    for child in node.children() {
        let shape = match child.tag() {
            Some("polyline") => Shape::Polyline {
                points: points(child),
            },
            Some("rectangle") => Shape::Rect {
                start: point(child, "start").unwrap_or_default(),
                end: point(child, "end").unwrap_or_default(),
            },
            Some("circle") => Shape::Circle {
                center: point(child, "center").unwrap_or_default(),
                radius: child.value_f64("radius").unwrap_or(0.0),
            },
            Some("arc") => {
                let start = point(child, "start").unwrap_or_default();
                let end = point(child, "end").unwrap_or_default();
                match point(child, "mid") {
                    Some(mid) => arc_or_line(start, mid, end),
                    None => Shape::Line { start, end },
                }
            }
            Some("text") => {
                texts.push(parse_text(child, 0));
                continue;
            }
            Some("pin") => {
                pins.push(parse_lib_pin(child));
                continue;
            }
            _ => continue,
        };
        graphics.push(Graphic {
            shape,
            // 0 means "use the default line width"
            stroke_width: stroke_width(child).unwrap_or(0.0),
            fill: fill_type(child),
        });
    }

    LibSymbolUnit {
        name,
        unit,
        convert,
        graphics,
        texts,
        pins,
    }
}

fn parse_lib_pin(node: &Node) -> LibPin {
    let at = coordinate(node, "at");
    LibPin {
        electrical_type: node.text_at(0).unwrap_or_default(),
        graphic_style: node.text_at(1).unwrap_or_default(),
        at: at.map(|c| c.point()).unwrap_or_default(),
        rotation: at.map(|c| c.rotation_or_zero()).unwrap_or(0.0),
        length: node.value_f64("length").unwrap_or(0.0),
        name: node.text_value("name").unwrap_or_default(),
        number: node.text_value("number").unwrap_or_default(),
        hidden: node.flag_after(2, "hide").unwrap_or(false),
    }
}

// ─── Placed symbols ──────────────────────────────────────────────────

fn parse_symbol(node: &Node, catalog: &BTreeMap<String, LibSymbol>) -> SchematicSymbol {
    let coord = coordinate(node, "at");
    let at = coord.map(|c| c.point()).unwrap_or_default();
    let rotation = coord.map(|c| c.rotation_or_zero()).unwrap_or(0.0);
    let mirror = match node.text_value("mirror").as_deref() {
        Some("x") => Some(Mirror::X),
        Some("y") => Some(Mirror::Y),
        _ => None,
    };
    let unit = node.value_f64("unit").map(|u| u as u32).unwrap_or(1);
    let convert = node.value_f64("convert").map(|c| c as u32).unwrap_or(1);

    let mut properties = BTreeMap::new();
    for prop in node.find_all("property") {
        let Some(key) = prop.text_at(0) else {
            continue;
        };
        let prop_at = coordinate(prop, "at");
        properties.insert(
            key,
            Property {
                value: prop.text_at(1).unwrap_or_default(),
                at: prop_at.map(|c| c.point()).unwrap_or(at),
                rotation: prop_at.map(|c| c.rotation_or_zero()).unwrap_or(0.0),
                visible: !is_hidden(prop, 2),
                font_size: font_size(prop)
                    .unwrap_or(Size::new(DEFAULT_FONT_SIZE, DEFAULT_FONT_SIZE)),
            },
        );
    }

    let lib_id = node.text_value("lib_id").unwrap_or_default();
    let lib_name = node.text_value("lib_name");
    let key = lib_name.as_deref().unwrap_or(&lib_id);
    let pins = match catalog.get(key) {
        Some(lib) => place_pins(lib, unit, convert, at, rotation, mirror),
        None => {
            warn!("symbol '{key}' is not in lib_symbols, leaving its pins unresolved");
            Vec::new()
        }
    };

    SchematicSymbol {
        uuid: uuid_of(node),
        at,
        rotation,
        mirror,
        unit,
        convert,
        in_bom: node.flag("in_bom").unwrap_or(true),
        on_board: node.flag("on_board").unwrap_or(true),
        dnp: node.flag("dnp").unwrap_or(false),
        properties,
        pins,
        lib_id,
        lib_name,
    }
}

fn place_pins(
    lib: &LibSymbol,
    unit: u32,
    convert: u32,
    at: Point,
    rotation: f64,
    mirror: Option<Mirror>,
) -> Vec<PlacedPin> {
    lib.units
        .iter()
        .filter(|u| u.applies_to(unit, convert))
        .flat_map(|u| &u.pins)
        .map(|pin| PlacedPin {
            number: pin.number.clone(),
            name: pin.name.clone(),
            electrical_type: pin.electrical_type.clone(),
            position: symbol_to_sheet(pin.at, at, rotation, mirror),
        })
        .collect()
}

/// Map a library (Y-up) point into sheet coordinates.
fn symbol_to_sheet(local: Point, at: Point, rotation: f64, mirror: Option<Mirror>) -> Point {
    let mut p = Point::new(local.x, -local.y);
    match mirror {
        Some(Mirror::X) => p.y = -p.y,
        Some(Mirror::Y) => p.x = -p.x,
        None => {}
    }
    rotate_and_translate(p, at, rotation)
}

// ─── Connectivity items ──────────────────────────────────────────────

/// Only the first and last point are kept.
fn parse_wire(node: &Node) -> Option<Wire> {
    let pts = points(node);
    Some(Wire {
        start: *pts.first()?,
        end: *pts.last()?,
        stroke_width: stroke_width(node).unwrap_or(0.0),
        uuid: uuid_of(node),
    })
}

fn parse_bus_entry(node: &Node) -> BusEntry {
    BusEntry {
        at: point(node, "at").unwrap_or_default(),
        size: size(node, "size").unwrap_or_default(),
        stroke_width: stroke_width(node).unwrap_or(0.0),
        uuid: uuid_of(node),
    }
}

fn parse_junction(node: &Node) -> Junction {
    Junction {
        at: point(node, "at").unwrap_or_default(),
        diameter: node.value_f64("diameter").unwrap_or(0.0),
        uuid: uuid_of(node),
    }
}

fn parse_label(node: &Node, kind: LabelKind) -> Label {
    let at = coordinate(node, "at");
    Label {
        kind,
        text: node.text_at(0).unwrap_or_default(),
        at: at.map(|c| c.point()).unwrap_or_default(),
        rotation: at.map(|c| c.rotation_or_zero()).unwrap_or(0.0),
        shape: node.text_value("shape"),
        font_size: font_size(node).unwrap_or(Size::new(DEFAULT_FONT_SIZE, DEFAULT_FONT_SIZE)),
        uuid: uuid_of(node),
    }
}

// ─── Hierarchical sheets ─────────────────────────────────────────────

/// Value of the first property matching any of `keys`.
fn sheet_property(node: &Node, keys: &[&str]) -> String {
    node.find_all("property")
        .iter()
        .find(|p| {
            p.text_at(0)
                .is_some_and(|name| keys.contains(&name.as_str()))
        })
        .and_then(|p| p.text_at(1))
        .unwrap_or_default()
}

fn parse_sheet(node: &Node) -> Sheet {
    let pins = node
        .find_all("pin")
        .iter()
        .map(|pin| {
            let at = coordinate(pin, "at");
            SheetPin {
                name: pin.text_at(0).unwrap_or_default(),
                direction: pin.text_at(1).unwrap_or_default(),
                at: at.map(|c| c.point()).unwrap_or_default(),
                rotation: at.map(|c| c.rotation_or_zero()).unwrap_or(0.0),
                uuid: uuid_of(pin),
            }
        })
        .collect();

    Sheet {
        at: point(node, "at").unwrap_or_default(),
        size: size(node, "size").unwrap_or_default(),
        name: sheet_property(node, &["Sheetname", "Sheet name"]),
        file: sheet_property(node, &["Sheetfile", "Sheet file"]),
        uuid: uuid_of(node),
        pins,
    }
}
