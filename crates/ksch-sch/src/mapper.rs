//! Bidirectional mapping between S-expression subtrees and typed entities.
//!
//! **Raise** lifts a parsed top-level node into an entity, keeping the node
//! (and its source span) inside the entity for verbatim replay. Extraction is
//! lenient: it accepts every known dialect shape, so a KiCad 7 file and a
//! KiCad 9 file raise into the same model. Sub-fields that the model does not
//! interpret (text effects, stroke/fill of sheets) are carried as raw
//! subtrees instead of being dropped - per-pin UUIDs in particular are lifted
//! explicitly and must never be lost.
//!
//! **Lower** regenerates a canonical node from a dirty entity's fields,
//! through the dialect table selected by the document version. Raising and
//! lowering never touch sibling nodes; each entity's subtree is independent.

use ksch_sexpr::{kv, ListBuilder, Sexpr};
use uuid::Uuid;

use crate::schema::SchemaRules;
use crate::types::{
    DocumentMeta, InstancePath, Junction, Label, LabelKind, LabelShape, NoConnect, PinAssignment,
    Point, Property, Rotation, SchematicSymbol, Sheet, SheetPin, Stroke, StrokeStyle, Text, Wire,
    WireKind,
};

// Property-style query helpers over `(tag value)` child lists.

pub(crate) fn child_list<'a>(items: &'a [Sexpr], tag: &str) -> Option<&'a [Sexpr]> {
    ksch_sexpr::find_child_list(items, tag)
}

pub(crate) fn child_node<'a>(items: &'a [Sexpr], tag: &str) -> Option<&'a Sexpr> {
    items
        .iter()
        .find(|item| item.tag() == Some(tag))
}

pub(crate) fn string_prop(items: &[Sexpr], tag: &str) -> Option<String> {
    child_list(items, tag)?.get(1)?.as_str().map(str::to_string)
}

pub(crate) fn sym_prop(items: &[Sexpr], tag: &str) -> Option<String> {
    child_list(items, tag)?.get(1)?.as_sym().map(str::to_string)
}

/// `(tag "value")` or legacy `(tag value)`.
pub(crate) fn atom_prop(items: &[Sexpr], tag: &str) -> Option<String> {
    child_list(items, tag)?.get(1)?.as_atom().map(str::to_string)
}

pub(crate) fn int_prop(items: &[Sexpr], tag: &str) -> Option<i64> {
    child_list(items, tag)?.get(1)?.as_int()
}

pub(crate) fn float_prop(items: &[Sexpr], tag: &str) -> Option<f64> {
    ksch_sexpr::number_as_f64(child_list(items, tag)?.get(1)?)
}

pub(crate) fn yes_no_prop(items: &[Sexpr], tag: &str) -> Option<bool> {
    match sym_prop(items, tag)?.as_str() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// `(at x y [angle])`.
pub(crate) fn at_prop(items: &[Sexpr]) -> Option<(Point, Option<f64>)> {
    let at = child_list(items, "at")?;
    let x = ksch_sexpr::number_as_f64(at.get(1)?)?;
    let y = ksch_sexpr::number_as_f64(at.get(2)?)?;
    let angle = at.get(3).and_then(ksch_sexpr::number_as_f64);
    Some((Point::new(x, y), angle))
}

/// Document uuid fields are quoted in modern files, bare symbols in legacy.
fn uuid_prop(items: &[Sexpr]) -> Option<String> {
    atom_prop(items, "uuid")
}

fn fresh_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// A top-level element lifted into the typed model.
pub(crate) enum Raised {
    Component(SchematicSymbol),
    Wire(Wire),
    Label(Label),
    Junction(Junction),
    NoConnect(NoConnect),
    Sheet(Sheet),
    Text(Text),
    /// Header fields, `lib_symbols`, `sheet_instances`, and any tag this
    /// engine does not model: preserved whole, never dropped.
    Preserved(Sexpr),
}

/// Lift one top-level node. Unknown tags are preserved verbatim.
pub(crate) fn raise_element(node: Sexpr, _rules: &SchemaRules) -> Raised {
    let tag = node.tag().map(str::to_string);
    match tag.as_deref() {
        Some("symbol") => Raised::Component(raise_component(node)),
        Some("wire") => Raised::Wire(raise_wire(node, WireKind::Wire)),
        Some("bus") => Raised::Wire(raise_wire(node, WireKind::Bus)),
        Some("polyline") => Raised::Wire(raise_wire(node, WireKind::PolyLine)),
        Some("label") => Raised::Label(raise_label(node, LabelKind::Local)),
        Some("global_label") => Raised::Label(raise_label(node, LabelKind::Global)),
        Some("hierarchical_label") => Raised::Label(raise_label(node, LabelKind::Hierarchical)),
        Some("junction") => Raised::Junction(raise_junction(node)),
        Some("no_connect") => Raised::NoConnect(raise_no_connect(node)),
        Some("sheet") => Raised::Sheet(raise_sheet(node)),
        Some("text") => Raised::Text(raise_text(node)),
        _ => Raised::Preserved(node),
    }
}

/// Header metadata from the root's child lists.
pub(crate) fn parse_meta(items: &[Sexpr]) -> DocumentMeta {
    DocumentMeta {
        version: int_prop(items, "version").unwrap_or(0),
        generator: atom_prop(items, "generator").unwrap_or_default(),
        generator_version: atom_prop(items, "generator_version"),
        uuid: uuid_prop(items).unwrap_or_default(),
        paper: string_prop(items, "paper").unwrap_or_default(),
    }
}

fn raise_properties(items: &[Sexpr]) -> Vec<Property> {
    let mut out = Vec::new();
    for prop in items.iter().filter(|n| n.tag() == Some("property")) {
        let Some(fields) = prop.as_list() else { continue };
        let Some(name) = fields.get(1).and_then(Sexpr::as_str) else {
            continue;
        };
        let value = fields
            .get(2)
            .and_then(Sexpr::as_str)
            .unwrap_or_default()
            .to_string();
        out.push(Property {
            name: name.to_string(),
            value,
            at: at_prop(fields).map(|(p, a)| (p, a.unwrap_or(0.0))),
            effects: child_node(fields, "effects").cloned(),
        });
    }
    out
}

/// Lift `(pin "<num>" (uuid "...") [(alternate "...")])` rows.
///
/// Skipping this step reproduces the historical pin-UUID-loss defect: the
/// numbers and their per-instance UUIDs must round-trip.
fn raise_pins(items: &[Sexpr]) -> Vec<PinAssignment> {
    let mut out = Vec::new();
    for pin in items.iter().filter(|n| n.tag() == Some("pin")) {
        let Some(fields) = pin.as_list() else { continue };
        let Some(number) = fields.get(1).and_then(Sexpr::as_atom) else {
            continue;
        };
        out.push(PinAssignment {
            number: number.to_string(),
            uuid: uuid_prop(fields).unwrap_or_else(fresh_uuid),
            alternate: string_prop(fields, "alternate"),
        });
    }
    out
}

fn raise_instances(items: &[Sexpr]) -> Vec<InstancePath> {
    let Some(instances) = child_list(items, "instances") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for project in instances.iter().skip(1) {
        let Some(fields) = project.as_list() else { continue };
        if fields.first().and_then(Sexpr::as_sym) != Some("project") {
            continue;
        }
        let name = fields
            .get(1)
            .and_then(Sexpr::as_atom)
            .unwrap_or_default()
            .to_string();
        for path in fields.iter().skip(2) {
            let Some(path_fields) = path.as_list() else { continue };
            if path_fields.first().and_then(Sexpr::as_sym) != Some("path") {
                continue;
            }
            out.push(InstancePath {
                project: name.clone(),
                path: path_fields
                    .get(1)
                    .and_then(Sexpr::as_atom)
                    .unwrap_or_default()
                    .to_string(),
                reference: string_prop(path_fields, "reference"),
                unit: int_prop(path_fields, "unit"),
                page: string_prop(path_fields, "page"),
            });
        }
    }
    out
}

fn has_autoplaced(items: &[Sexpr]) -> bool {
    // Both `(fields_autoplaced)` and `(fields_autoplaced yes)` count.
    child_list(items, "fields_autoplaced")
        .map(|fields| fields.get(1).and_then(Sexpr::as_sym) != Some("no"))
        .unwrap_or(false)
}

fn raise_component(node: Sexpr) -> SchematicSymbol {
    let items = node.as_list().unwrap_or(&[]);
    let (position, angle) = at_prop(items).unwrap_or((Point::default(), None));
    let rotation = angle
        .and_then(Rotation::from_degrees)
        .unwrap_or(Rotation::R0);

    let symbol = SchematicSymbol {
        uuid: uuid_prop(items).unwrap_or_else(fresh_uuid),
        lib_id: atom_prop(items, "lib_id").unwrap_or_default(),
        position,
        rotation,
        mirror: sym_prop(items, "mirror"),
        unit: int_prop(items, "unit").unwrap_or(1),
        exclude_from_sim: yes_no_prop(items, "exclude_from_sim").unwrap_or(false),
        in_bom: yes_no_prop(items, "in_bom").unwrap_or(true),
        on_board: yes_no_prop(items, "on_board").unwrap_or(true),
        dnp: yes_no_prop(items, "dnp").unwrap_or(false),
        fields_autoplaced: has_autoplaced(items),
        properties: raise_properties(items),
        pins: raise_pins(items),
        instances: raise_instances(items),
        node: Sexpr::list(Vec::new()),
        dirty: false,
    };
    finish_component(symbol, node)
}

fn finish_component(mut symbol: SchematicSymbol, node: Sexpr) -> SchematicSymbol {
    symbol.node = node;
    symbol
}

fn raise_points(items: &[Sexpr]) -> Vec<Point> {
    let Some(pts) = child_list(items, "pts") else {
        return Vec::new();
    };
    pts.iter()
        .skip(1)
        .filter_map(|xy| {
            let fields = xy.as_list()?;
            if fields.first()?.as_sym()? != "xy" {
                return None;
            }
            Some(Point::new(
                ksch_sexpr::number_as_f64(fields.get(1)?)?,
                ksch_sexpr::number_as_f64(fields.get(2)?)?,
            ))
        })
        .collect()
}

fn raise_stroke(items: &[Sexpr]) -> Stroke {
    let Some(stroke) = child_list(items, "stroke") else {
        return Stroke::default();
    };
    Stroke {
        width: float_prop(stroke, "width").unwrap_or(0.0),
        style: sym_prop(stroke, "type")
            .and_then(|t| StrokeStyle::from_token(&t))
            .unwrap_or_default(),
    }
}

fn raise_wire(node: Sexpr, kind: WireKind) -> Wire {
    let items = node.as_list().unwrap_or(&[]);
    let wire = Wire {
        uuid: uuid_prop(items).unwrap_or_else(fresh_uuid),
        kind,
        points: raise_points(items),
        stroke: raise_stroke(items),
        node: Sexpr::list(Vec::new()),
        dirty: false,
    };
    Wire { node, ..wire }
}

fn raise_label(node: Sexpr, kind: LabelKind) -> Label {
    let items = node.as_list().unwrap_or(&[]);
    let (position, angle) = at_prop(items).unwrap_or((Point::default(), None));
    let label = Label {
        uuid: uuid_prop(items).unwrap_or_else(fresh_uuid),
        kind,
        text: items
            .get(1)
            .and_then(Sexpr::as_atom)
            .unwrap_or_default()
            .to_string(),
        position,
        rotation: angle.unwrap_or(0.0),
        shape: sym_prop(items, "shape").and_then(|s| LabelShape::from_token(&s)),
        fields_autoplaced: has_autoplaced(items),
        effects: child_node(items, "effects").cloned(),
        properties: raise_properties(items),
        node: Sexpr::list(Vec::new()),
        dirty: false,
    };
    Label { node, ..label }
}

fn raise_junction(node: Sexpr) -> Junction {
    let items = node.as_list().unwrap_or(&[]);
    let color = child_list(items, "color").and_then(|c| {
        Some((
            ksch_sexpr::number_as_f64(c.get(1)?)?,
            ksch_sexpr::number_as_f64(c.get(2)?)?,
            ksch_sexpr::number_as_f64(c.get(3)?)?,
            ksch_sexpr::number_as_f64(c.get(4)?)?,
        ))
    });
    let junction = Junction {
        uuid: uuid_prop(items).unwrap_or_else(fresh_uuid),
        position: at_prop(items).map(|(p, _)| p).unwrap_or_default(),
        diameter: float_prop(items, "diameter").unwrap_or(0.0),
        color,
        node: Sexpr::list(Vec::new()),
        dirty: false,
    };
    Junction { node, ..junction }
}

fn raise_no_connect(node: Sexpr) -> NoConnect {
    let items = node.as_list().unwrap_or(&[]);
    let nc = NoConnect {
        uuid: uuid_prop(items).unwrap_or_else(fresh_uuid),
        position: at_prop(items).map(|(p, _)| p).unwrap_or_default(),
        node: Sexpr::list(Vec::new()),
        dirty: false,
    };
    NoConnect { node, ..nc }
}

fn raise_text(node: Sexpr) -> Text {
    let items = node.as_list().unwrap_or(&[]);
    let (position, angle) = at_prop(items).unwrap_or((Point::default(), None));
    let text = Text {
        uuid: uuid_prop(items).unwrap_or_else(fresh_uuid),
        text: items
            .get(1)
            .and_then(Sexpr::as_atom)
            .unwrap_or_default()
            .to_string(),
        position,
        rotation: angle.unwrap_or(0.0),
        exclude_from_sim: yes_no_prop(items, "exclude_from_sim").unwrap_or(false),
        effects: child_node(items, "effects").cloned(),
        node: Sexpr::list(Vec::new()),
        dirty: false,
    };
    Text { node, ..text }
}

fn raise_sheet_pins(items: &[Sexpr]) -> Vec<SheetPin> {
    let mut out = Vec::new();
    for pin in items.iter().filter(|n| n.tag() == Some("pin")) {
        let Some(fields) = pin.as_list() else { continue };
        let Some(name) = fields.get(1).and_then(Sexpr::as_str) else {
            continue;
        };
        let (position, angle) = at_prop(fields).unwrap_or((Point::default(), None));
        out.push(SheetPin {
            name: name.to_string(),
            shape: fields
                .get(2)
                .and_then(Sexpr::as_sym)
                .and_then(LabelShape::from_token)
                .unwrap_or_default(),
            position,
            rotation: angle.unwrap_or(0.0),
            uuid: uuid_prop(fields).unwrap_or_else(fresh_uuid),
            effects: child_node(fields, "effects").cloned(),
        });
    }
    out
}

fn raise_sheet(node: Sexpr) -> Sheet {
    let items = node.as_list().unwrap_or(&[]);
    let size = child_list(items, "size")
        .and_then(|s| {
            Some((
                ksch_sexpr::number_as_f64(s.get(1)?)?,
                ksch_sexpr::number_as_f64(s.get(2)?)?,
            ))
        })
        .unwrap_or((0.0, 0.0));
    let sheet = Sheet {
        uuid: uuid_prop(items).unwrap_or_else(fresh_uuid),
        position: at_prop(items).map(|(p, _)| p).unwrap_or_default(),
        size,
        fields_autoplaced: has_autoplaced(items),
        stroke: child_node(items, "stroke").cloned(),
        fill: child_node(items, "fill").cloned(),
        properties: raise_properties(items),
        pins: raise_sheet_pins(items),
        instances: raise_instances(items),
        node: Sexpr::list(Vec::new()),
        dirty: false,
    };
    Sheet { node, ..sheet }
}

// Lowering: canonical node regeneration for dirty entities.

fn at_node(position: Point, angle: Option<f64>) -> Sexpr {
    let mut b = ListBuilder::node("at");
    b.push(Sexpr::float(position.x));
    b.push(Sexpr::float(position.y));
    if let Some(angle) = angle {
        b.push(Sexpr::float(angle));
    }
    b.build()
}

fn uuid_node(uuid: &str) -> Sexpr {
    kv("uuid", Sexpr::string(uuid))
}

fn autoplaced_node(rules: &SchemaRules) -> Sexpr {
    let mut b = ListBuilder::node("fields_autoplaced");
    b.push_if(rules.autoplaced_has_arg, true);
    b.build()
}

/// `(effects (font (size 1.27 1.27)))` for entities created without one.
pub(crate) fn default_effects() -> Sexpr {
    let mut font = ListBuilder::node("font");
    font.push(kv_pair("size", 1.27, 1.27));
    let mut b = ListBuilder::node("effects");
    b.push(font.build());
    b.build()
}

fn kv_pair(tag: &str, a: f64, b: f64) -> Sexpr {
    let mut builder = ListBuilder::node(tag);
    builder.push(Sexpr::float(a));
    builder.push(Sexpr::float(b));
    builder.build()
}

fn lower_property(prop: &Property) -> Sexpr {
    let mut b = ListBuilder::node("property");
    b.push(Sexpr::string(&prop.name));
    b.push(Sexpr::string(&prop.value));
    if let Some((at, angle)) = prop.at {
        b.push(at_node(at, Some(angle)));
    }
    b.push_opt(prop.effects.clone());
    b.build()
}

fn lower_instances(instances: &[InstancePath]) -> Option<Sexpr> {
    if instances.is_empty() {
        return None;
    }
    let mut b = ListBuilder::node("instances");
    for inst in instances {
        let mut project = ListBuilder::node("project");
        project.push(Sexpr::string(&inst.project));
        let mut path = ListBuilder::node("path");
        path.push(Sexpr::string(&inst.path));
        if let Some(reference) = &inst.reference {
            path.push(kv("reference", Sexpr::string(reference)));
        }
        if let Some(unit) = inst.unit {
            path.push(kv("unit", unit));
        }
        if let Some(page) = &inst.page {
            path.push(kv("page", Sexpr::string(page)));
        }
        project.push(path.build());
        b.push(project.build());
    }
    Some(b.build())
}

pub(crate) fn lower_component(symbol: &SchematicSymbol, rules: &SchemaRules) -> Sexpr {
    let mut b = ListBuilder::node("symbol");
    b.push(kv("lib_id", Sexpr::string(&symbol.lib_id)));
    b.push(at_node(symbol.position, Some(symbol.rotation.degrees())));
    if let Some(mirror) = &symbol.mirror {
        b.push(kv("mirror", Sexpr::symbol(mirror.clone())));
    }
    b.push(kv("unit", symbol.unit));
    b.push(kv("exclude_from_sim", symbol.exclude_from_sim));
    b.push(kv("in_bom", symbol.in_bom));
    b.push(kv("on_board", symbol.on_board));
    b.push(kv("dnp", symbol.dnp));
    if symbol.fields_autoplaced {
        b.push(autoplaced_node(rules));
    }
    b.push(uuid_node(&symbol.uuid));
    for prop in &symbol.properties {
        b.push(lower_property(prop));
    }
    for pin in &symbol.pins {
        let mut p = ListBuilder::node("pin");
        p.push(Sexpr::string(&pin.number));
        p.push(uuid_node(&pin.uuid));
        if let Some(alternate) = &pin.alternate {
            p.push(kv("alternate", Sexpr::string(alternate)));
        }
        b.push(p.build());
    }
    b.push_opt(lower_instances(&symbol.instances));
    b.build()
}

fn stroke_node(stroke: Stroke) -> Sexpr {
    let mut b = ListBuilder::node("stroke");
    b.push(kv("width", Sexpr::float(stroke.width)));
    b.push(kv("type", Sexpr::symbol(stroke.style.as_token())));
    b.build()
}

pub(crate) fn lower_wire(wire: &Wire, _rules: &SchemaRules) -> Sexpr {
    let mut pts = ListBuilder::node("pts");
    for point in &wire.points {
        pts.push(kv_pair("xy", point.x, point.y));
    }
    let mut b = ListBuilder::node(wire.kind.tag());
    b.push(pts.build());
    b.push(stroke_node(wire.stroke));
    b.push(uuid_node(&wire.uuid));
    b.build()
}

pub(crate) fn lower_label(label: &Label, rules: &SchemaRules) -> Sexpr {
    let mut b = ListBuilder::node(label.kind.tag());
    b.push(Sexpr::string(&label.text));
    if label.kind != LabelKind::Local {
        let shape = label.shape.unwrap_or_default();
        b.push(kv("shape", Sexpr::symbol(shape.as_token())));
    }
    b.push(at_node(label.position, Some(label.rotation)));
    if label.fields_autoplaced {
        b.push(autoplaced_node(rules));
    }
    b.push(label.effects.clone().unwrap_or_else(default_effects));
    b.push(uuid_node(&label.uuid));
    for prop in &label.properties {
        b.push(lower_property(prop));
    }
    b.build()
}

pub(crate) fn lower_junction(junction: &Junction, _rules: &SchemaRules) -> Sexpr {
    let (r, g, bl, a) = junction.color.unwrap_or((0.0, 0.0, 0.0, 0.0));
    let mut color = ListBuilder::node("color");
    color.push(Sexpr::float(r));
    color.push(Sexpr::float(g));
    color.push(Sexpr::float(bl));
    color.push(Sexpr::float(a));

    let mut b = ListBuilder::node("junction");
    b.push(at_node(junction.position, None));
    b.push(kv("diameter", Sexpr::float(junction.diameter)));
    b.push(color.build());
    b.push(uuid_node(&junction.uuid));
    b.build()
}

pub(crate) fn lower_no_connect(nc: &NoConnect, _rules: &SchemaRules) -> Sexpr {
    let mut b = ListBuilder::node("no_connect");
    b.push(at_node(nc.position, None));
    b.push(uuid_node(&nc.uuid));
    b.build()
}

pub(crate) fn lower_text(text: &Text, _rules: &SchemaRules) -> Sexpr {
    let mut b = ListBuilder::node("text");
    b.push(Sexpr::string(&text.text));
    b.push(kv("exclude_from_sim", text.exclude_from_sim));
    b.push(at_node(text.position, Some(text.rotation)));
    b.push(text.effects.clone().unwrap_or_else(default_effects));
    b.push(uuid_node(&text.uuid));
    b.build()
}

pub(crate) fn lower_sheet(sheet: &Sheet, rules: &SchemaRules) -> Sexpr {
    let mut b = ListBuilder::node("sheet");
    b.push(at_node(sheet.position, None));
    b.push(kv_pair("size", sheet.size.0, sheet.size.1));
    if sheet.fields_autoplaced {
        b.push(autoplaced_node(rules));
    }
    b.push_opt(sheet.stroke.clone());
    b.push_opt(sheet.fill.clone());
    b.push(uuid_node(&sheet.uuid));
    for prop in &sheet.properties {
        b.push(lower_property(prop));
    }
    for pin in &sheet.pins {
        let mut p = ListBuilder::node("pin");
        p.push(Sexpr::string(&pin.name));
        p.push(Sexpr::symbol(pin.shape.as_token()));
        p.push(at_node(pin.position, Some(pin.rotation)));
        p.push(pin.effects.clone().unwrap_or_else(default_effects));
        p.push(uuid_node(&pin.uuid));
        b.push(p.build());
    }
    b.push_opt(lower_instances(&sheet.instances));
    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksch_sexpr::parse;

    const SYMBOL: &str = r#"(symbol
	(lib_id "Device:R")
	(at 127 76.2 90)
	(unit 1)
	(exclude_from_sim no)
	(in_bom yes)
	(on_board yes)
	(dnp no)
	(uuid "e63e39d7-6d9f-4241-b02b-4e0c9325cf15")
	(property "Reference" "R1"
		(at 130.81 75.184 90)
	)
	(property "Value" "10k"
		(at 130.81 77.47 90)
	)
	(pin "1"
		(uuid "df660b58-5cdf-473e-8c0a-859cae977374")
	)
	(pin "2"
		(uuid "ff5e718a-93af-455d-84a2-eecf78f3f816")
	)
	(instances
		(project "demo"
			(path "/6c9d8b07-0b21-4c0b-bb4b-a9f4e7b1f4ba"
				(reference "R1")
				(unit 1)
			)
		)
	)
)"#;

    #[test]
    fn raise_component_extracts_fields() {
        let node = parse(SYMBOL).unwrap();
        let sym = raise_component(node);
        assert_eq!(sym.lib_id, "Device:R");
        assert_eq!(sym.reference(), Some("R1"));
        assert_eq!(sym.value(), Some("10k"));
        assert_eq!(sym.position, Point::new(127.0, 76.2));
        assert_eq!(sym.rotation, Rotation::R90);
        assert_eq!(sym.unit, 1);
        assert!(sym.in_bom);
        assert!(!sym.dirty);
    }

    #[test]
    fn raise_component_lifts_pin_uuids() {
        let node = parse(SYMBOL).unwrap();
        let sym = raise_component(node);
        assert_eq!(sym.pins.len(), 2);
        assert_eq!(
            sym.pin_uuid("1"),
            Some("df660b58-5cdf-473e-8c0a-859cae977374")
        );
        assert_eq!(
            sym.pin_uuid("2"),
            Some("ff5e718a-93af-455d-84a2-eecf78f3f816")
        );
    }

    #[test]
    fn raise_component_extracts_instance_paths() {
        let node = parse(SYMBOL).unwrap();
        let sym = raise_component(node);
        assert_eq!(sym.instances.len(), 1);
        assert_eq!(sym.instances[0].project, "demo");
        assert_eq!(sym.instances[0].reference.as_deref(), Some("R1"));
        assert_eq!(sym.instances[0].unit, Some(1));
    }

    #[test]
    fn lower_component_round_trips_through_raise() {
        let node = parse(SYMBOL).unwrap();
        let sym = raise_component(node);
        let lowered = lower_component(&sym, SchemaRules::current());
        let again = raise_component(lowered);

        assert_eq!(again.lib_id, sym.lib_id);
        assert_eq!(again.position, sym.position);
        assert_eq!(again.rotation, sym.rotation);
        assert_eq!(again.properties, sym.properties);
        assert_eq!(again.pins, sym.pins);
        assert_eq!(again.instances, sym.instances);
    }

    #[test]
    fn raise_wire_and_lower() {
        let node =
            parse("(wire (pts (xy 114.3 73.66) (xy 124.46 73.66)) (stroke (width 0) (type default)) (uuid \"w1\"))")
                .unwrap();
        let wire = raise_wire(node, WireKind::Wire);
        assert_eq!(wire.points.len(), 2);
        assert_eq!(wire.points[1], Point::new(124.46, 73.66));
        assert_eq!(wire.stroke.style, StrokeStyle::Default);

        let lowered = lower_wire(&wire, SchemaRules::current());
        let again = raise_wire(lowered, WireKind::Wire);
        assert_eq!(again.points, wire.points);
        assert_eq!(again.uuid, "w1");
    }

    #[test]
    fn raise_label_kinds() {
        let local = parse("(label \"SIG\" (at 120.65 71.12 0) (effects (font (size 1.27 1.27))) (uuid \"l1\"))").unwrap();
        let label = raise_label(local, LabelKind::Local);
        assert_eq!(label.text, "SIG");
        assert_eq!(label.shape, None);

        let global = parse(
            "(global_label \"VCC\" (shape input) (at 10 20 180) (effects (font (size 1.27 1.27))) (uuid \"g1\"))",
        )
        .unwrap();
        let label = raise_label(global, LabelKind::Global);
        assert_eq!(label.shape, Some(LabelShape::Input));
        assert_eq!(label.rotation, 180.0);
    }

    #[test]
    fn legacy_unquoted_uuid_is_accepted() {
        let node = parse("(junction (at 1 2) (diameter 0) (uuid 9f2b8a61-1c7a-4b6f-9d0e-0cbb6a5c9f21))").unwrap();
        let junction = raise_junction(node);
        assert_eq!(junction.uuid, "9f2b8a61-1c7a-4b6f-9d0e-0cbb6a5c9f21");
    }

    #[test]
    fn raise_sheet_with_pins() {
        let node = parse(
            "(sheet (at 100 50) (size 20 15) (stroke (width 0.1524) (type solid)) (uuid \"s1\") (property \"Sheetname\" \"Sub\") (property \"Sheetfile\" \"sub.kicad_sch\") (pin \"CLK\" input (at 100 55 180) (uuid \"sp1\")))",
        )
        .unwrap();
        let sheet = raise_sheet(node);
        assert_eq!(sheet.name(), Some("Sub"));
        assert_eq!(sheet.filename(), Some("sub.kicad_sch"));
        assert_eq!(sheet.size, (20.0, 15.0));
        assert_eq!(sheet.pins.len(), 1);
        assert_eq!(sheet.pins[0].name, "CLK");
        assert_eq!(sheet.pins[0].shape, LabelShape::Input);
        assert_eq!(sheet.pins[0].rotation, 180.0);
    }

    #[test]
    fn unknown_tags_are_preserved() {
        let node = parse("(bus_entry (at 1 2) (size 2.54 2.54) (uuid \"b1\"))").unwrap();
        match raise_element(node, SchemaRules::current()) {
            Raised::Preserved(p) => assert_eq!(p.tag(), Some("bus_entry")),
            _ => panic!("bus_entry should be preserved, not modeled"),
        }
    }

    #[test]
    fn parse_meta_reads_header() {
        let root = parse("(kicad_sch (version 20250114) (generator \"eeschema\") (generator_version \"9.0\") (uuid \"doc-uuid\") (paper \"A4\"))").unwrap();
        let meta = parse_meta(root.as_list().unwrap());
        assert_eq!(meta.version, 20250114);
        assert_eq!(meta.generator, "eeschema");
        assert_eq!(meta.generator_version.as_deref(), Some("9.0"));
        assert_eq!(meta.uuid, "doc-uuid");
        assert_eq!(meta.paper, "A4");
    }
}
