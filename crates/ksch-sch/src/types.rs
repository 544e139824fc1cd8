//! Typed schematic entities.
//!
//! Every entity is backed by exactly one S-expression node. Entities raised
//! from a parsed document keep that node (and its source span) so an
//! untouched entity round-trips byte-for-byte; entities created through the
//! facade carry a synthetic placeholder that is lowered to a real node at
//! save time. Setters mark both the entity and its node dirty - the save
//! path regenerates exactly the dirty subtrees.

use ksch_sexpr::{Sexpr, Span};
use serde::{Deserialize, Serialize};

use crate::collection::{Criteria, Indexable, IndexSpec, Pattern};

/// 2D position in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// KiCad's standard wiring grid pitch (50 mil).
    pub const GRID: f64 = 1.27;

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Snap both coordinates to the 1.27 mm grid.
    ///
    /// Grid alignment is a caller-level contract: the engine stores whatever
    /// it is given, this helper exists for callers that want the convention.
    pub fn snap_to_grid(self) -> Self {
        Self {
            x: (self.x / Self::GRID).round() * Self::GRID,
            y: (self.y / Self::GRID).round() * Self::GRID,
        }
    }

    pub fn distance(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// Component rotation, restricted to the four orientations KiCad places at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn degrees(self) -> f64 {
        match self {
            Rotation::R0 => 0.0,
            Rotation::R90 => 90.0,
            Rotation::R180 => 180.0,
            Rotation::R270 => 270.0,
        }
    }

    /// Normalize an angle in degrees to one of the four placements.
    pub fn from_degrees(deg: f64) -> Option<Self> {
        let norm = deg.rem_euclid(360.0);
        match norm as i64 {
            0 => Some(Rotation::R0),
            90 => Some(Rotation::R90),
            180 => Some(Rotation::R180),
            270 => Some(Rotation::R270),
            _ => None,
        }
    }

    /// Rotate a symbol-relative offset by this placement (counter-clockwise
    /// rotation matrix).
    pub fn apply(self, offset: Point) -> Point {
        match self {
            Rotation::R0 => offset,
            Rotation::R90 => Point::new(-offset.y, offset.x),
            Rotation::R180 => Point::new(-offset.x, -offset.y),
            Rotation::R270 => Point::new(offset.y, -offset.x),
        }
    }
}

/// Wire stroke line style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrokeStyle {
    #[default]
    Default,
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
}

impl StrokeStyle {
    pub fn as_token(self) -> &'static str {
        match self {
            StrokeStyle::Default => "default",
            StrokeStyle::Solid => "solid",
            StrokeStyle::Dash => "dash",
            StrokeStyle::Dot => "dot",
            StrokeStyle::DashDot => "dash_dot",
            StrokeStyle::DashDotDot => "dash_dot_dot",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "default" => Some(StrokeStyle::Default),
            "solid" => Some(StrokeStyle::Solid),
            "dash" => Some(StrokeStyle::Dash),
            "dot" => Some(StrokeStyle::Dot),
            "dash_dot" => Some(StrokeStyle::DashDot),
            "dash_dot_dot" => Some(StrokeStyle::DashDotDot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stroke {
    pub width: f64,
    pub style: StrokeStyle,
}

/// One `(property "Name" "Value" ...)` row of a symbol or sheet.
///
/// Order matters: KiCad writes properties in insertion order, so the owning
/// entity stores them as an ordered sequence, not a map.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: String,
    /// `(at x y angle)`, when the property carries its own placement
    pub at: Option<(Point, f64)>,
    /// Raw `(effects ...)` subtree, preserved as parsed
    pub effects: Option<Sexpr>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            at: None,
            effects: None,
        }
    }
}

/// A placed symbol's pin: its number and the per-instance UUID KiCad
/// assigns in the schematic (distinct from the library pin definition).
///
/// These UUIDs must survive a load/save cycle unchanged - dropping them is
/// the classic defect this engine exists to avoid.
#[derive(Debug, Clone, PartialEq)]
pub struct PinAssignment {
    pub number: String,
    pub uuid: String,
    /// `(alternate "...")` body selection, when present
    pub alternate: Option<String>,
}

/// `(instances (project ... (path ...)))` row of a symbol or sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstancePath {
    pub project: String,
    pub path: String,
    pub reference: Option<String>,
    pub unit: Option<i64>,
    pub page: Option<String>,
}

/// A placed schematic symbol (a component instance).
#[derive(Debug, Clone)]
pub struct SchematicSymbol {
    pub(crate) uuid: String,
    pub(crate) lib_id: String,
    pub(crate) position: Point,
    pub(crate) rotation: Rotation,
    pub(crate) mirror: Option<String>,
    pub(crate) unit: i64,
    pub(crate) exclude_from_sim: bool,
    pub(crate) in_bom: bool,
    pub(crate) on_board: bool,
    pub(crate) dnp: bool,
    pub(crate) fields_autoplaced: bool,
    pub(crate) properties: Vec<Property>,
    pub(crate) pins: Vec<PinAssignment>,
    pub(crate) instances: Vec<InstancePath>,
    pub(crate) node: Sexpr,
    pub(crate) dirty: bool,
}

impl SchematicSymbol {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn lib_id(&self) -> &str {
        &self.lib_id
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn unit(&self) -> i64 {
        self.unit
    }

    pub fn reference(&self) -> Option<&str> {
        self.property("Reference")
    }

    pub fn value(&self) -> Option<&str> {
        self.property("Value")
    }

    /// The Footprint property, `None` when absent or empty.
    pub fn footprint(&self) -> Option<&str> {
        self.property("Footprint").filter(|v| !v.is_empty())
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// All properties, in file order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Per-instance pin assignments `{number, uuid}`, in file order.
    pub fn pins(&self) -> &[PinAssignment] {
        &self.pins
    }

    /// Look up the schematic-instance UUID for a pin number.
    pub fn pin_uuid(&self, number: &str) -> Option<&str> {
        self.pins
            .iter()
            .find(|p| p.number == number)
            .map(|p| p.uuid.as_str())
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
        self.mark_dirty();
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
        self.mark_dirty();
    }

    pub fn set_reference(&mut self, reference: &str) {
        self.set_property("Reference", reference);
    }

    pub fn set_value(&mut self, value: &str) {
        self.set_property("Value", value);
    }

    pub fn set_footprint(&mut self, footprint: &str) {
        self.set_property("Footprint", footprint);
    }

    /// Set or append a property, preserving the order of existing rows.
    pub fn set_property(&mut self, name: &str, value: &str) {
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(prop) => prop.value = value.to_string(),
            None => self.properties.push(Property::new(name, value)),
        }
        self.mark_dirty();
    }

    pub fn remove_property(&mut self, name: &str) -> bool {
        let before = self.properties.len();
        self.properties.retain(|p| p.name != name);
        let removed = self.properties.len() != before;
        if removed {
            self.mark_dirty();
        }
        removed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
        self.node.mark_dirty();
    }
}

/// What a wire-shaped element is: an electrical wire, a bus, or a purely
/// graphical polyline. All three share the same grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireKind {
    #[default]
    Wire,
    Bus,
    PolyLine,
}

impl WireKind {
    pub fn tag(self) -> &'static str {
        match self {
            WireKind::Wire => "wire",
            WireKind::Bus => "bus",
            WireKind::PolyLine => "polyline",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Wire {
    pub(crate) uuid: String,
    pub(crate) kind: WireKind,
    pub(crate) points: Vec<Point>,
    pub(crate) stroke: Stroke,
    pub(crate) node: Sexpr,
    pub(crate) dirty: bool,
}

impl Wire {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn kind(&self) -> WireKind {
        self.kind
    }

    /// Vertices of the wire, at least two.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn stroke(&self) -> Stroke {
        self.stroke
    }

    pub fn set_points(&mut self, points: Vec<Point>) {
        debug_assert!(points.len() >= 2, "a wire needs at least two points");
        self.points = points;
        self.mark_dirty();
    }

    pub fn set_stroke(&mut self, stroke: Stroke) {
        self.stroke = stroke;
        self.mark_dirty();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
        self.node.mark_dirty();
    }
}

/// Label flavor; KiCad uses a different tag per flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Local,
    Global,
    Hierarchical,
}

impl LabelKind {
    pub fn tag(self) -> &'static str {
        match self {
            LabelKind::Local => "label",
            LabelKind::Global => "global_label",
            LabelKind::Hierarchical => "hierarchical_label",
        }
    }
}

/// Connector shape for global/hierarchical labels and sheet pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelShape {
    #[default]
    Input,
    Output,
    Bidirectional,
    TriState,
    Passive,
}

impl LabelShape {
    pub fn as_token(self) -> &'static str {
        match self {
            LabelShape::Input => "input",
            LabelShape::Output => "output",
            LabelShape::Bidirectional => "bidirectional",
            LabelShape::TriState => "tri_state",
            LabelShape::Passive => "passive",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "input" => Some(LabelShape::Input),
            "output" => Some(LabelShape::Output),
            "bidirectional" => Some(LabelShape::Bidirectional),
            "tri_state" => Some(LabelShape::TriState),
            "passive" => Some(LabelShape::Passive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Label {
    pub(crate) uuid: String,
    pub(crate) kind: LabelKind,
    pub(crate) text: String,
    pub(crate) position: Point,
    pub(crate) rotation: f64,
    pub(crate) shape: Option<LabelShape>,
    pub(crate) fields_autoplaced: bool,
    pub(crate) effects: Option<Sexpr>,
    pub(crate) properties: Vec<Property>,
    pub(crate) node: Sexpr,
    pub(crate) dirty: bool,
}

impl Label {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn kind(&self) -> LabelKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn shape(&self) -> Option<LabelShape> {
        self.shape
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.mark_dirty();
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
        self.mark_dirty();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
        self.node.mark_dirty();
    }
}

#[derive(Debug, Clone)]
pub struct Junction {
    pub(crate) uuid: String,
    pub(crate) position: Point,
    /// 0 means "use the default diameter"
    pub(crate) diameter: f64,
    pub(crate) color: Option<(f64, f64, f64, f64)>,
    pub(crate) node: Sexpr,
    pub(crate) dirty: bool,
}

impl Junction {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
        self.mark_dirty();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
        self.node.mark_dirty();
    }
}

#[derive(Debug, Clone)]
pub struct NoConnect {
    pub(crate) uuid: String,
    pub(crate) position: Point,
    pub(crate) node: Sexpr,
    pub(crate) dirty: bool,
}

impl NoConnect {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
        self.node.mark_dirty();
    }
}

/// Free text placed on the sheet.
#[derive(Debug, Clone)]
pub struct Text {
    pub(crate) uuid: String,
    pub(crate) text: String,
    pub(crate) position: Point,
    pub(crate) rotation: f64,
    pub(crate) exclude_from_sim: bool,
    pub(crate) effects: Option<Sexpr>,
    pub(crate) node: Sexpr,
    pub(crate) dirty: bool,
}

impl Text {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.mark_dirty();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
        self.node.mark_dirty();
    }
}

/// Connection point on a hierarchical sheet's border.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetPin {
    pub name: String,
    pub shape: LabelShape,
    pub position: Point,
    /// Rotation encodes which side of the sheet the pin sits on
    /// (0 = right, 90 = top, 180 = left, 270 = bottom).
    pub rotation: f64,
    pub uuid: String,
    pub effects: Option<Sexpr>,
}

/// A hierarchical sub-sheet reference.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub(crate) uuid: String,
    pub(crate) position: Point,
    pub(crate) size: (f64, f64),
    pub(crate) fields_autoplaced: bool,
    pub(crate) stroke: Option<Sexpr>,
    pub(crate) fill: Option<Sexpr>,
    pub(crate) properties: Vec<Property>,
    pub(crate) pins: Vec<SheetPin>,
    pub(crate) instances: Vec<InstancePath>,
    pub(crate) node: Sexpr,
    pub(crate) dirty: bool,
}

impl Sheet {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The `Sheetname` property.
    pub fn name(&self) -> Option<&str> {
        self.property("Sheetname")
    }

    /// The `Sheetfile` property.
    pub fn filename(&self) -> Option<&str> {
        self.property("Sheetfile")
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn size(&self) -> (f64, f64) {
        self.size
    }

    pub fn pins(&self) -> &[SheetPin] {
        &self.pins
    }

    /// Hierarchical instance paths (parent uuid chain) for this sheet.
    pub fn instances(&self) -> &[InstancePath] {
        &self.instances
    }

    pub fn add_pin(&mut self, pin: SheetPin) {
        self.pins.push(pin);
        self.mark_dirty();
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
        self.mark_dirty();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
        self.node.mark_dirty();
    }
}

/// Document-level header metadata.
#[derive(Debug, Clone, Default)]
pub struct DocumentMeta {
    pub version: i64,
    pub generator: String,
    pub generator_version: Option<String>,
    pub uuid: String,
    pub paper: String,
}

pub(crate) fn placeholder_node() -> Sexpr {
    let mut node = Sexpr::with_span(ksch_sexpr::SexprKind::List(Vec::new()), Span::synthetic());
    node.dirty = true;
    node
}

// Index declarations. The uuid index is the removal path for every kind;
// components additionally index the reference designator (unique) and the
// library id (non-unique).

impl Indexable for SchematicSymbol {
    const DEFAULT_INDEX: &'static str = "reference";

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn index_specs() -> &'static [IndexSpec<Self>] {
        &[
            IndexSpec {
                name: "uuid",
                key_fn: |c| Some(c.uuid.clone()),
                unique: true,
            },
            IndexSpec {
                name: "reference",
                key_fn: |c| c.reference().map(str::to_string),
                unique: true,
            },
            IndexSpec {
                name: "lib_id",
                key_fn: |c| Some(c.lib_id.clone()),
                unique: false,
            },
        ]
    }
}

macro_rules! uuid_indexed {
    ($ty:ty) => {
        impl Indexable for $ty {
            const DEFAULT_INDEX: &'static str = "uuid";

            fn uuid(&self) -> &str {
                &self.uuid
            }

            fn index_specs() -> &'static [IndexSpec<Self>] {
                &[IndexSpec {
                    name: "uuid",
                    key_fn: |item| Some(item.uuid.clone()),
                    unique: true,
                }]
            }
        }
    };
}

uuid_indexed!(Wire);
uuid_indexed!(Label);
uuid_indexed!(Junction);
uuid_indexed!(NoConnect);
uuid_indexed!(Sheet);
uuid_indexed!(Text);

/// Typed, AND-combined filter over components.
///
/// String fields containing `*` glob-match, everything else matches exactly.
/// An exact reference or lib_id criterion is served from the corresponding
/// index instead of a linear scan.
#[derive(Default)]
pub struct ComponentCriteria {
    pub lib_id: Option<Pattern>,
    pub reference: Option<Pattern>,
    pub value: Option<Pattern>,
    pub footprint: Option<Pattern>,
}

impl ComponentCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lib_id(mut self, pattern: &str) -> Self {
        self.lib_id = Some(Pattern::new(pattern));
        self
    }

    pub fn reference(mut self, pattern: &str) -> Self {
        self.reference = Some(Pattern::new(pattern));
        self
    }

    pub fn value(mut self, pattern: &str) -> Self {
        self.value = Some(Pattern::new(pattern));
        self
    }

    pub fn footprint(mut self, pattern: &str) -> Self {
        self.footprint = Some(Pattern::new(pattern));
        self
    }
}

impl Criteria<SchematicSymbol> for ComponentCriteria {
    fn matches(&self, item: &SchematicSymbol) -> bool {
        let field = |value: Option<&str>, pattern: &Option<Pattern>| match pattern {
            Some(p) => value.is_some_and(|v| p.matches(v)),
            None => true,
        };
        field(Some(item.lib_id()), &self.lib_id)
            && field(item.reference(), &self.reference)
            && field(item.value(), &self.value)
            && field(item.footprint(), &self.footprint)
    }

    fn index_hint(&self) -> Option<(&'static str, &str)> {
        if let Some(key) = self.reference.as_ref().and_then(Pattern::as_exact) {
            return Some(("reference", key));
        }
        if let Some(key) = self.lib_id.as_ref().and_then(Pattern::as_exact) {
            return Some(("lib_id", key));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_matrix_matches_kicad_placements() {
        let offset = Point::new(0.0, 3.81);
        assert_eq!(Rotation::R0.apply(offset), Point::new(0.0, 3.81));
        assert_eq!(Rotation::R90.apply(offset), Point::new(-3.81, 0.0));
        assert_eq!(Rotation::R180.apply(offset), Point::new(-0.0, -3.81));
        assert_eq!(Rotation::R270.apply(offset), Point::new(3.81, -0.0));
    }

    #[test]
    fn rotation_from_degrees_normalizes() {
        assert_eq!(Rotation::from_degrees(450.0), Some(Rotation::R90));
        assert_eq!(Rotation::from_degrees(-90.0), Some(Rotation::R270));
        assert_eq!(Rotation::from_degrees(45.0), None);
    }

    #[test]
    fn grid_snap() {
        let p = Point::new(100.1, 99.5).snap_to_grid();
        assert!((p.x - 100.33).abs() < 1e-9);
        assert!((p.y - 99.06).abs() < 1e-9);
    }

    #[test]
    fn property_order_is_preserved_on_update() {
        let mut sym = SchematicSymbol {
            uuid: "u".into(),
            lib_id: "Device:R".into(),
            position: Point::default(),
            rotation: Rotation::R0,
            mirror: None,
            unit: 1,
            exclude_from_sim: false,
            in_bom: true,
            on_board: true,
            dnp: false,
            fields_autoplaced: true,
            properties: vec![
                Property::new("Reference", "R1"),
                Property::new("Value", "10k"),
            ],
            pins: Vec::new(),
            instances: Vec::new(),
            node: placeholder_node(),
            dirty: false,
        };
        sym.set_reference("R2");
        assert_eq!(sym.properties[0].name, "Reference");
        assert_eq!(sym.properties[0].value, "R2");
        assert_eq!(sym.properties[1].name, "Value");
        assert!(sym.is_dirty());
    }
}
