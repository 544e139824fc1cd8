//! The `Schematic` facade: document lifecycle, CRUD, and emission.
//!
//! A `Schematic` owns the original source text, one indexed collection per
//! entity kind, and an ordered *manifest* of the document's top-level
//! elements. The manifest remembers, for every element, the whitespace gap
//! that preceded it in the original file - that is what lets an untouched
//! document save byte-for-byte while edited elements are re-rendered
//! canonically in place. Elements added after load are slotted into KiCad's
//! fixed group order (header, lib_symbols, symbols, wires, junctions,
//! labels, no_connects, texts, sheets, sheet_instances).

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use ksch_sexpr::emitter::{emit_document, EmitSlot};
use ksch_sexpr::formatter::{self, FormatRules};
use ksch_sexpr::{kv, ListBuilder, Sexpr, Span};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::collection::IndexedCollection;
use crate::connectivity::{self, Net};
use crate::distill::{distill_schematic, Distilled, DistillConfig};
use crate::error::Error;
use crate::library::{LibraryError, ResolvedSymbol, SymbolProvider};
use crate::mapper::{self, Raised};
use crate::routing;
use crate::schema::SchemaRules;
use crate::types::{
    DocumentMeta, InstancePath, Junction, Label, LabelKind, LabelShape, NoConnect, PinAssignment,
    placeholder_node, Point, Property, Rotation, SchematicSymbol, Sheet, Stroke, Text, Wire,
    WireKind,
};

/// Document lifecycle state.
///
/// `load` resets to `Loaded`, any mutating call moves to `Modified`, a
/// successful `save` moves to `Saved` and clears every dirty flag. Documents
/// created in memory start `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    New,
    Loaded,
    Modified,
    Saved,
}

/// What one manifest slot points at.
#[derive(Debug, Clone)]
enum SlotTarget {
    Component(String),
    Wire(String),
    Label(String),
    Junction(String),
    NoConnect(String),
    Sheet(String),
    Text(String),
    /// Index into the preserved-nodes table (header fields, lib_symbols,
    /// sheet_instances, unmodeled tags).
    Preserved(usize),
}

#[derive(Debug, Clone)]
struct Slot {
    /// Whitespace before this element in the original source.
    gap: Option<Span>,
    target: SlotTarget,
}

pub struct Schematic {
    source: String,
    path: Option<PathBuf>,
    meta: DocumentMeta,
    head: Span,
    tail: Span,
    manifest: Vec<Slot>,
    components: IndexedCollection<SchematicSymbol>,
    wires: IndexedCollection<Wire>,
    labels: IndexedCollection<Label>,
    junctions: IndexedCollection<Junction>,
    no_connects: IndexedCollection<NoConnect>,
    sheets: IndexedCollection<Sheet>,
    texts: IndexedCollection<Text>,
    preserved: Vec<Sexpr>,
    provider: Option<Box<dyn SymbolProvider>>,
    state: DocumentState,
    schema: &'static SchemaRules,
    rules: &'static FormatRules,
}

impl std::fmt::Debug for Schematic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schematic")
            .field("source", &self.source)
            .field("path", &self.path)
            .field("meta", &self.meta)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("manifest", &self.manifest)
            .field("components", &self.components)
            .field("wires", &self.wires)
            .field("labels", &self.labels)
            .field("junctions", &self.junctions)
            .field("no_connects", &self.no_connects)
            .field("sheets", &self.sheets)
            .field("texts", &self.texts)
            .field("preserved", &self.preserved)
            .field("provider", &self.provider.is_some())
            .field("state", &self.state)
            .field("schema", &self.schema)
            .field("rules", &self.rules)
            .finish()
    }
}

impl Schematic {
    /// Read and parse a `.kicad_sch` file.
    ///
    /// Any parse failure aborts the load; no partial document is returned.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        log::debug!("loading schematic from {}", path.display());
        let source = std::fs::read_to_string(path)?;
        let mut doc = Self::from_text_inner(source)?;
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    /// Parse a schematic from in-memory text.
    pub fn from_text(text: impl Into<String>) -> Result<Self, Error> {
        Self::from_text_inner(text.into())
    }

    fn from_text_inner(source: String) -> Result<Self, Error> {
        let root = ksch_sexpr::parse_document(&source)?;
        let items = root.as_list().ok_or(Error::InvalidDocument)?;
        if items.first().and_then(Sexpr::as_sym) != Some("kicad_sch") {
            return Err(Error::InvalidDocument);
        }

        let meta = mapper::parse_meta(items);
        let schema = SchemaRules::for_version(meta.version);
        let head = Span::new(root.span.start, items[0].span.end);

        let mut doc = Schematic {
            source: String::new(),
            path: None,
            meta,
            head,
            tail: Span::new(head.end, head.end),
            manifest: Vec::new(),
            components: IndexedCollection::new(),
            wires: IndexedCollection::new(),
            labels: IndexedCollection::new(),
            junctions: IndexedCollection::new(),
            no_connects: IndexedCollection::new(),
            sheets: IndexedCollection::new(),
            texts: IndexedCollection::new(),
            preserved: Vec::new(),
            provider: None,
            state: DocumentState::Loaded,
            schema,
            rules: FormatRules::kicad_default(),
        };

        let mut cursor = head.end;
        let children: Vec<Sexpr> = match root.kind {
            ksch_sexpr::SexprKind::List(children) => children,
            _ => return Err(Error::InvalidDocument),
        };
        for child in children.into_iter().skip(1) {
            let gap = Span::new(cursor, child.span.start);
            cursor = child.span.end;
            let target = match mapper::raise_element(child, schema) {
                Raised::Component(c) => {
                    let uuid = c.uuid().to_string();
                    doc.components.add(c);
                    SlotTarget::Component(uuid)
                }
                Raised::Wire(w) => {
                    let uuid = w.uuid().to_string();
                    doc.wires.add(w);
                    SlotTarget::Wire(uuid)
                }
                Raised::Label(l) => {
                    let uuid = l.uuid().to_string();
                    doc.labels.add(l);
                    SlotTarget::Label(uuid)
                }
                Raised::Junction(j) => {
                    let uuid = j.uuid().to_string();
                    doc.junctions.add(j);
                    SlotTarget::Junction(uuid)
                }
                Raised::NoConnect(n) => {
                    let uuid = n.uuid().to_string();
                    doc.no_connects.add(n);
                    SlotTarget::NoConnect(uuid)
                }
                Raised::Sheet(s) => {
                    let uuid = s.uuid().to_string();
                    doc.sheets.add(s);
                    SlotTarget::Sheet(uuid)
                }
                Raised::Text(t) => {
                    let uuid = t.uuid().to_string();
                    doc.texts.add(t);
                    SlotTarget::Text(uuid)
                }
                Raised::Preserved(node) => {
                    doc.preserved.push(node);
                    SlotTarget::Preserved(doc.preserved.len() - 1)
                }
            };
            doc.manifest.push(Slot {
                gap: Some(gap),
                target,
            });
        }

        doc.tail = Span::new(cursor, source.len());
        doc.source = source;
        log::debug!(
            "raised {} components, {} wires, {} labels, {} junctions, {} sheets",
            doc.components.len(),
            doc.wires.len(),
            doc.labels.len(),
            doc.junctions.len(),
            doc.sheets.len()
        );
        Ok(doc)
    }

    /// Create a blank in-memory schematic with a canonical header.
    pub fn create(title: &str) -> Self {
        let meta = DocumentMeta {
            version: SchemaRules::CURRENT_VERSION,
            generator: "ksch".to_string(),
            generator_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            uuid: Uuid::new_v4().to_string(),
            paper: "A4".to_string(),
        };

        let mut doc = Schematic {
            source: String::new(),
            path: None,
            meta: meta.clone(),
            head: Span::synthetic(),
            tail: Span::synthetic(),
            manifest: Vec::new(),
            components: IndexedCollection::new(),
            wires: IndexedCollection::new(),
            labels: IndexedCollection::new(),
            junctions: IndexedCollection::new(),
            no_connects: IndexedCollection::new(),
            sheets: IndexedCollection::new(),
            texts: IndexedCollection::new(),
            preserved: Vec::new(),
            provider: None,
            state: DocumentState::New,
            schema: SchemaRules::current(),
            rules: FormatRules::kicad_default(),
        };

        doc.push_preserved(kv("version", meta.version));
        doc.push_preserved(kv("generator", Sexpr::string(&meta.generator)));
        if let Some(gv) = &meta.generator_version {
            doc.push_preserved(kv("generator_version", Sexpr::string(gv)));
        }
        doc.push_preserved(kv("uuid", Sexpr::string(&meta.uuid)));
        doc.push_preserved(kv("paper", Sexpr::string(&meta.paper)));
        if !title.is_empty() {
            let mut tb = ListBuilder::node("title_block");
            tb.push(kv("title", Sexpr::string(title)));
            doc.push_preserved(tb.build());
        }
        doc.push_preserved(Sexpr::list(vec![Sexpr::symbol("lib_symbols")]));

        let mut path = ListBuilder::node("path");
        path.push(Sexpr::string("/"));
        path.push(kv("page", Sexpr::string("1")));
        let mut instances = ListBuilder::node("sheet_instances");
        instances.push(path.build());
        doc.push_preserved(instances.build());

        doc
    }

    fn push_preserved(&mut self, node: Sexpr) {
        self.preserved.push(node);
        self.manifest.push(Slot {
            gap: None,
            target: SlotTarget::Preserved(self.preserved.len() - 1),
        });
    }

    /// Discard in-memory state and re-read the backing file.
    pub fn reload(&mut self) -> Result<(), Error> {
        let path = self.path.clone().ok_or(Error::NoPath)?;
        let provider = self.provider.take();
        let mut fresh = Self::load(&path)?;
        fresh.provider = provider;
        *self = fresh;
        Ok(())
    }

    // Accessors

    pub fn state(&self) -> DocumentState {
        self.state
    }

    pub fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Inject the symbol library service (an explicit dependency, not a
    /// global: construct, hand it over, swap or drop it at will).
    pub fn set_symbol_provider(&mut self, provider: Box<dyn SymbolProvider>) {
        self.provider = Some(provider);
    }

    pub fn symbol_provider(&self) -> Option<&dyn SymbolProvider> {
        self.provider.as_deref()
    }

    /// Read-only iteration surface for collaborators (ERC, BOM export, ...).
    pub fn components(&self) -> &IndexedCollection<SchematicSymbol> {
        &self.components
    }

    pub fn wires(&self) -> &IndexedCollection<Wire> {
        &self.wires
    }

    pub fn labels(&self) -> &IndexedCollection<Label> {
        &self.labels
    }

    pub fn junctions(&self) -> &IndexedCollection<Junction> {
        &self.junctions
    }

    pub fn no_connects(&self) -> &IndexedCollection<NoConnect> {
        &self.no_connects
    }

    pub fn sheets(&self) -> &IndexedCollection<Sheet> {
        &self.sheets
    }

    pub fn texts(&self) -> &IndexedCollection<Text> {
        &self.texts
    }

    /// Indexed query surface (`get`, `filter`, `batch_mode`). Mutations must
    /// go through the facade methods so the manifest stays coherent.
    pub fn components_mut(&mut self) -> &mut IndexedCollection<SchematicSymbol> {
        &mut self.components
    }

    pub fn wires_mut(&mut self) -> &mut IndexedCollection<Wire> {
        &mut self.wires
    }

    pub fn labels_mut(&mut self) -> &mut IndexedCollection<Label> {
        &mut self.labels
    }

    // Emission

    /// Render the document to text without touching any state.
    ///
    /// Clean subtrees come back byte-for-byte; dirty and new subtrees are
    /// rendered canonically in their manifest position.
    pub fn render(&self) -> String {
        let components: HashMap<&str, &SchematicSymbol> =
            self.components.iter().map(|c| (c.uuid(), c)).collect();
        let wires: HashMap<&str, &Wire> = self.wires.iter().map(|w| (w.uuid(), w)).collect();
        let labels: HashMap<&str, &Label> = self.labels.iter().map(|l| (l.uuid(), l)).collect();
        let junctions: HashMap<&str, &Junction> =
            self.junctions.iter().map(|j| (j.uuid(), j)).collect();
        let no_connects: HashMap<&str, &NoConnect> =
            self.no_connects.iter().map(|n| (n.uuid(), n)).collect();
        let sheets: HashMap<&str, &Sheet> = self.sheets.iter().map(|s| (s.uuid(), s)).collect();
        let texts: HashMap<&str, &Text> = self.texts.iter().map(|t| (t.uuid(), t)).collect();

        // Regenerate dirty entities; borrow clean nodes.
        enum NodeRef<'a> {
            Borrowed(&'a Sexpr),
            Owned(Sexpr),
        }
        let mut nodes: Vec<Option<(Option<Span>, NodeRef)>> = Vec::with_capacity(self.manifest.len());
        for slot in &self.manifest {
            let node_ref = match &slot.target {
                SlotTarget::Component(uuid) => components.get(uuid.as_str()).map(|c| {
                    if c.dirty || c.node.needs_render() {
                        NodeRef::Owned(mapper::lower_component(c, self.schema))
                    } else {
                        NodeRef::Borrowed(&c.node)
                    }
                }),
                SlotTarget::Wire(uuid) => wires.get(uuid.as_str()).map(|w| {
                    if w.dirty || w.node.needs_render() {
                        NodeRef::Owned(mapper::lower_wire(w, self.schema))
                    } else {
                        NodeRef::Borrowed(&w.node)
                    }
                }),
                SlotTarget::Label(uuid) => labels.get(uuid.as_str()).map(|l| {
                    if l.dirty || l.node.needs_render() {
                        NodeRef::Owned(mapper::lower_label(l, self.schema))
                    } else {
                        NodeRef::Borrowed(&l.node)
                    }
                }),
                SlotTarget::Junction(uuid) => junctions.get(uuid.as_str()).map(|j| {
                    if j.dirty || j.node.needs_render() {
                        NodeRef::Owned(mapper::lower_junction(j, self.schema))
                    } else {
                        NodeRef::Borrowed(&j.node)
                    }
                }),
                SlotTarget::NoConnect(uuid) => no_connects.get(uuid.as_str()).map(|n| {
                    if n.dirty || n.node.needs_render() {
                        NodeRef::Owned(mapper::lower_no_connect(n, self.schema))
                    } else {
                        NodeRef::Borrowed(&n.node)
                    }
                }),
                SlotTarget::Sheet(uuid) => sheets.get(uuid.as_str()).map(|s| {
                    if s.dirty || s.node.needs_render() {
                        NodeRef::Owned(mapper::lower_sheet(s, self.schema))
                    } else {
                        NodeRef::Borrowed(&s.node)
                    }
                }),
                SlotTarget::Text(uuid) => texts.get(uuid.as_str()).map(|t| {
                    if t.dirty || t.node.needs_render() {
                        NodeRef::Owned(mapper::lower_text(t, self.schema))
                    } else {
                        NodeRef::Borrowed(&t.node)
                    }
                }),
                SlotTarget::Preserved(idx) => self.preserved.get(*idx).map(NodeRef::Borrowed),
            };
            match node_ref {
                Some(node_ref) => nodes.push(Some((slot.gap, node_ref))),
                None => {
                    log::warn!("manifest slot without a backing entity; skipping");
                    nodes.push(None);
                }
            }
        }

        let mut emit_slots: Vec<EmitSlot> = Vec::with_capacity(nodes.len());
        for entry in &nodes {
            let Some((gap, node_ref)) = entry else { continue };
            let node: &Sexpr = match node_ref {
                NodeRef::Borrowed(node) => node,
                NodeRef::Owned(node) => node,
            };
            emit_slots.push(EmitSlot {
                leading_gap: *gap,
                node,
            });
        }

        if self.source.is_empty() {
            let mut out = String::from("(kicad_sch");
            for slot in &emit_slots {
                out.push_str("\n\t");
                out.push_str(&formatter::format_node(slot.node, 1, self.rules));
            }
            out.push_str("\n)\n");
            out
        } else {
            emit_document(&self.source, self.head, &emit_slots, self.tail, self.rules)
        }
    }

    /// Write to the document's backing path (temp file + atomic rename).
    pub fn save(&mut self) -> Result<(), Error> {
        let path = self.path.clone().ok_or(Error::NoPath)?;
        self.save_as(path)
    }

    /// Write to `path` atomically and reset every dirty flag.
    ///
    /// The output is written to a temporary file in the target directory and
    /// renamed over the destination, so a failed save never leaves a
    /// half-written schematic behind.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let text = self.render();

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = match dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };
        tmp.write_all(text.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        log::debug!("saved {} bytes to {}", text.len(), path.display());

        // Re-raise from the emitted text: all spans now point into the new
        // source and every dirty flag is gone.
        let provider = self.provider.take();
        let mut fresh = Self::from_text_inner(text)?;
        fresh.path = Some(path.to_path_buf());
        fresh.provider = provider;
        fresh.state = DocumentState::Saved;
        *self = fresh;
        Ok(())
    }

    // Mutation

    fn touch(&mut self) {
        self.state = DocumentState::Modified;
    }

    /// Rank in KiCad's fixed top-level group order.
    fn slot_rank(&self, target: &SlotTarget) -> u8 {
        match target {
            SlotTarget::Preserved(idx) => match self.preserved.get(*idx).and_then(Sexpr::tag) {
                Some(
                    "version" | "generator" | "generator_version" | "uuid" | "paper"
                    | "title_block",
                ) => 0,
                Some("lib_symbols") => 1,
                Some("sheet_instances" | "symbol_instances" | "embedded_fonts") => 9,
                _ => 7,
            },
            SlotTarget::Component(_) => 2,
            SlotTarget::Wire(_) => 3,
            SlotTarget::Junction(_) => 4,
            SlotTarget::Label(_) => 5,
            SlotTarget::NoConnect(_) => 6,
            SlotTarget::Text(_) => 7,
            SlotTarget::Sheet(_) => 8,
        }
    }

    /// Insert a new element at the end of its group.
    fn insert_slot(&mut self, target: SlotTarget) {
        let rank = self.slot_rank(&target);
        let position = self
            .manifest
            .iter()
            .rposition(|slot| self.slot_rank(&slot.target) <= rank)
            .map(|p| p + 1)
            .unwrap_or(0);
        self.manifest.insert(
            position,
            Slot {
                gap: None,
                target,
            },
        );
    }

    fn remove_slot(&mut self, uuid: &str) {
        self.manifest.retain(|slot| {
            !matches!(
                &slot.target,
                SlotTarget::Component(u)
                | SlotTarget::Wire(u)
                | SlotTarget::Label(u)
                | SlotTarget::Junction(u)
                | SlotTarget::NoConnect(u)
                | SlotTarget::Sheet(u)
                | SlotTarget::Text(u) if u == uuid
            )
        });
    }

    fn resolve_symbol(&self, lib_id: &str) -> Result<ResolvedSymbol, LibraryError> {
        let provider = self.provider.as_deref().ok_or(LibraryError::NoProvider)?;
        provider.resolve(lib_id)
    }

    /// Next free reference for a designator prefix (`R` -> `R1`, `R2`, ...).
    pub fn next_reference(&self, prefix: &str) -> String {
        let mut max = 0u32;
        for component in self.components.iter() {
            if let Some(reference) = component.reference() {
                if let Some(digits) = reference.strip_prefix(prefix) {
                    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                        if let Ok(n) = digits.parse::<u32>() {
                            max = max.max(n);
                        }
                    }
                }
            }
        }
        format!("{prefix}{}", max + 1)
    }

    /// Place a component from the symbol library.
    ///
    /// Resolution happens before any mutation: a [`LibraryError`] leaves
    /// every collection untouched. Pass `None` as reference to auto-number
    /// from the library's designator prefix.
    pub fn add_component(
        &mut self,
        lib_id: &str,
        reference: Option<&str>,
        value: &str,
        position: Point,
        rotation: Rotation,
    ) -> Result<&SchematicSymbol, Error> {
        let resolved = self.resolve_symbol(lib_id)?;
        let reference = match reference {
            Some(r) => r.to_string(),
            None => self.next_reference(&resolved.reference_prefix),
        };
        let uuid = Uuid::new_v4().to_string();

        let mut properties = vec![
            Property {
                name: "Reference".to_string(),
                value: reference.clone(),
                at: Some((Point::new(position.x + 2.54, position.y - 1.27), 0.0)),
                effects: None,
            },
            Property {
                name: "Value".to_string(),
                value: value.to_string(),
                at: Some((Point::new(position.x + 2.54, position.y + 1.27), 0.0)),
                effects: None,
            },
            Property {
                name: "Footprint".to_string(),
                value: resolved.default_footprint.clone().unwrap_or_default(),
                at: Some((position, 0.0)),
                effects: Some(hidden_effects()),
            },
            Property {
                name: "Datasheet".to_string(),
                value: String::new(),
                at: Some((position, 0.0)),
                effects: Some(hidden_effects()),
            },
        ];
        if let Some(description) = &resolved.description {
            properties.push(Property {
                name: "Description".to_string(),
                value: description.clone(),
                at: Some((position, 0.0)),
                effects: Some(hidden_effects()),
            });
        }

        let pins = resolved
            .pins
            .iter()
            .map(|pin| PinAssignment {
                number: pin.number.clone(),
                uuid: Uuid::new_v4().to_string(),
                alternate: None,
            })
            .collect();

        let project = self
            .path
            .as_deref()
            .and_then(Path::file_stem)
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        let instances = vec![InstancePath {
            project,
            path: format!("/{}", self.meta.uuid),
            reference: Some(reference.clone()),
            unit: Some(1),
            page: None,
        }];

        let symbol = SchematicSymbol {
            uuid: uuid.clone(),
            lib_id: lib_id.to_string(),
            position,
            rotation,
            mirror: None,
            unit: 1,
            exclude_from_sim: false,
            in_bom: true,
            on_board: true,
            dnp: false,
            fields_autoplaced: true,
            properties,
            pins,
            instances,
            node: placeholder_node(),
            dirty: true,
        };

        self.insert_slot(SlotTarget::Component(uuid));
        self.touch();
        log::debug!("added component {reference} ({lib_id})");
        Ok(self.components.add(symbol))
    }

    /// Remove a component by reference. Returns `false` when absent.
    pub fn remove_component(&mut self, reference: &str) -> Result<bool, Error> {
        let Some(uuid) = self
            .components
            .get(reference)?
            .map(|c| c.uuid().to_string())
        else {
            return Ok(false);
        };
        self.components.remove_by_uuid(&uuid)?;
        self.remove_slot(&uuid);
        self.touch();
        Ok(true)
    }

    /// Edit a component in place; dirty-tracking and indexes stay coherent.
    pub fn update_component<R>(
        &mut self,
        reference: &str,
        f: impl FnOnce(&mut SchematicSymbol) -> R,
    ) -> Result<Option<R>, Error> {
        let result = self.components.modify(reference, f)?;
        if result.is_some() {
            self.touch();
        }
        Ok(result)
    }

    pub fn add_wire(&mut self, points: Vec<Point>) -> Result<&Wire, Error> {
        self.add_wire_with(points, WireKind::Wire, Stroke::default())
    }

    pub fn add_wire_with(
        &mut self,
        points: Vec<Point>,
        kind: WireKind,
        stroke: Stroke,
    ) -> Result<&Wire, Error> {
        if points.len() < 2 {
            return Err(Error::InvalidWire);
        }
        let uuid = Uuid::new_v4().to_string();
        let wire = Wire {
            uuid: uuid.clone(),
            kind,
            points,
            stroke,
            node: placeholder_node(),
            dirty: true,
        };
        self.insert_slot(SlotTarget::Wire(uuid));
        self.touch();
        Ok(self.wires.add(wire))
    }

    pub fn remove_wire(&mut self, uuid: &str) -> Result<bool, Error> {
        let removed = self.wires.remove_by_uuid(uuid)?.is_some();
        if removed {
            self.remove_slot(uuid);
            self.touch();
        }
        Ok(removed)
    }

    pub fn add_label(
        &mut self,
        kind: LabelKind,
        text: &str,
        position: Point,
        rotation: f64,
    ) -> Result<&Label, Error> {
        let uuid = Uuid::new_v4().to_string();
        let label = Label {
            uuid: uuid.clone(),
            kind,
            text: text.to_string(),
            position,
            rotation,
            shape: (kind != LabelKind::Local).then_some(LabelShape::Input),
            fields_autoplaced: kind != LabelKind::Local,
            effects: None,
            properties: Vec::new(),
            node: placeholder_node(),
            dirty: true,
        };
        self.insert_slot(SlotTarget::Label(uuid));
        self.touch();
        Ok(self.labels.add(label))
    }

    pub fn remove_label(&mut self, uuid: &str) -> Result<bool, Error> {
        let removed = self.labels.remove_by_uuid(uuid)?.is_some();
        if removed {
            self.remove_slot(uuid);
            self.touch();
        }
        Ok(removed)
    }

    pub fn add_junction(&mut self, position: Point) -> Result<&Junction, Error> {
        let uuid = Uuid::new_v4().to_string();
        let junction = Junction {
            uuid: uuid.clone(),
            position,
            diameter: 0.0,
            color: None,
            node: placeholder_node(),
            dirty: true,
        };
        self.insert_slot(SlotTarget::Junction(uuid));
        self.touch();
        Ok(self.junctions.add(junction))
    }

    pub fn add_no_connect(&mut self, position: Point) -> Result<&NoConnect, Error> {
        let uuid = Uuid::new_v4().to_string();
        let nc = NoConnect {
            uuid: uuid.clone(),
            position,
            node: placeholder_node(),
            dirty: true,
        };
        self.insert_slot(SlotTarget::NoConnect(uuid));
        self.touch();
        Ok(self.no_connects.add(nc))
    }

    pub fn add_text(&mut self, text: &str, position: Point) -> Result<&Text, Error> {
        let uuid = Uuid::new_v4().to_string();
        let entity = Text {
            uuid: uuid.clone(),
            text: text.to_string(),
            position,
            rotation: 0.0,
            exclude_from_sim: false,
            effects: None,
            node: placeholder_node(),
            dirty: true,
        };
        self.insert_slot(SlotTarget::Text(uuid));
        self.touch();
        Ok(self.texts.add(entity))
    }

    pub fn add_sheet(
        &mut self,
        name: &str,
        filename: &str,
        position: Point,
        size: (f64, f64),
    ) -> Result<&Sheet, Error> {
        let uuid = Uuid::new_v4().to_string();
        let sheet = Sheet {
            uuid: uuid.clone(),
            position,
            size,
            fields_autoplaced: true,
            stroke: None,
            fill: None,
            properties: vec![
                Property::new("Sheetname", name),
                Property::new("Sheetfile", filename),
            ],
            pins: Vec::new(),
            instances: vec![InstancePath {
                project: String::new(),
                path: format!("/{}/{uuid}", self.meta.uuid),
                reference: None,
                unit: None,
                page: None,
            }],
            node: placeholder_node(),
            dirty: true,
        };
        self.insert_slot(SlotTarget::Sheet(uuid));
        self.touch();
        Ok(self.sheets.add(sheet))
    }

    /// Absolute position of a component pin: placement + rotated library
    /// offset.
    pub fn pin_position(&mut self, reference: &str, pin: &str) -> Result<Point, Error> {
        let (lib_id, position, rotation) = {
            let component = self
                .components
                .get(reference)?
                .ok_or_else(|| Error::UnknownReference(reference.to_string()))?;
            (
                component.lib_id().to_string(),
                component.position(),
                component.rotation(),
            )
        };
        let resolved = self.resolve_symbol(&lib_id)?;
        let pin_def = resolved.pin(pin).ok_or_else(|| Error::UnknownPin {
            reference: reference.to_string(),
            pin: pin.to_string(),
        })?;
        Ok(position + rotation.apply(pin_def.offset))
    }

    /// Wire two pins together along an orthogonal route.
    ///
    /// Returns the UUIDs of the created wires (one for an aligned route, two
    /// for an L).
    pub fn connect_pins(
        &mut self,
        ref_a: &str,
        pin_a: &str,
        ref_b: &str,
        pin_b: &str,
    ) -> Result<Vec<String>, Error> {
        let start = self.pin_position(ref_a, pin_a)?;
        let end = self.pin_position(ref_b, pin_b)?;
        let route = routing::route_orthogonal(start, end);

        let mut uuids = Vec::with_capacity(route.segments.len());
        for (from, to) in route.segments {
            let wire = self.add_wire(vec![from, to])?;
            uuids.push(wire.uuid().to_string());
        }
        log::debug!(
            "connected {ref_a}.{pin_a} to {ref_b}.{pin_b} with {} wire(s)",
            uuids.len()
        );
        Ok(uuids)
    }

    /// Run component mutations with index rebuilds coalesced to one.
    pub fn batch_components<R>(
        &mut self,
        f: impl FnOnce(&mut IndexedCollection<SchematicSymbol>) -> R,
    ) -> Result<R, Error> {
        let result = self.components.batch_mode(f)?;
        self.touch();
        Ok(result)
    }

    /// Derived nets (computed on demand, never stored).
    pub fn netlist(&self) -> Vec<Net> {
        connectivity::derive_nets(self)
    }

    /// Run caller-supplied validators; issues are collected, never raised.
    pub fn validate(
        &self,
        validators: &[&dyn crate::validation::Validator],
    ) -> Vec<crate::validation::ValidationIssue> {
        crate::validation::run_validators(self, validators)
    }

    /// Produce the compact summary representation.
    pub fn distill(&self, config: &DistillConfig) -> Distilled {
        distill_schematic(self, config)
    }
}

fn hidden_effects() -> Sexpr {
    let mut font = ListBuilder::node("font");
    {
        let mut size = ListBuilder::node("size");
        size.push(Sexpr::float(1.27));
        size.push(Sexpr::float(1.27));
        font.push(size.build());
    }
    let mut b = ListBuilder::node("effects");
    b.push(font.build());
    b.push(kv("hide", true));
    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::StaticSymbolProvider;

    fn provider() -> Box<StaticSymbolProvider> {
        let mut p = StaticSymbolProvider::new();
        p.insert_two_pin("Device:R", "R");
        p.insert_two_pin("Device:C", "C");
        Box::new(p)
    }

    fn blank_with_provider() -> Schematic {
        let mut sch = Schematic::create("test");
        sch.set_symbol_provider(provider());
        sch
    }

    #[test]
    fn create_renders_a_parsable_document() {
        let sch = Schematic::create("demo");
        let text = sch.render();
        assert!(text.starts_with("(kicad_sch\n\t(version 20250114)"));
        let reparsed = Schematic::from_text(text).unwrap();
        assert_eq!(reparsed.meta().paper, "A4");
        assert_eq!(reparsed.meta().version, SchemaRules::CURRENT_VERSION);
    }

    #[test]
    fn state_machine_transitions() {
        let mut sch = blank_with_provider();
        assert_eq!(sch.state(), DocumentState::New);

        sch.add_component("Device:R", Some("R1"), "10k", Point::new(127.0, 76.2), Rotation::R0)
            .unwrap();
        assert_eq!(sch.state(), DocumentState::Modified);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.kicad_sch");
        sch.save_as(&path).unwrap();
        assert_eq!(sch.state(), DocumentState::Saved);

        sch.update_component("R1", |c| c.set_value("22k")).unwrap();
        assert_eq!(sch.state(), DocumentState::Modified);

        sch.reload().unwrap();
        assert_eq!(sch.state(), DocumentState::Loaded);
        let value = sch
            .components_mut()
            .get("R1")
            .unwrap()
            .map(|c| c.value().unwrap().to_string());
        assert_eq!(value.as_deref(), Some("10k"));
    }

    #[test]
    fn add_component_requires_a_provider() {
        let mut sch = Schematic::create("demo");
        let err = sch
            .add_component("Device:R", Some("R1"), "10k", Point::default(), Rotation::R0)
            .unwrap_err();
        assert!(matches!(err, Error::Library(LibraryError::NoProvider)));
        assert_eq!(sch.components().len(), 0);
        assert_eq!(sch.state(), DocumentState::New);
    }

    #[test]
    fn library_failure_mutates_nothing() {
        let mut sch = blank_with_provider();
        let manifest_len = sch.manifest.len();
        let err = sch
            .add_component("Device:Q", Some("Q1"), "BC547", Point::default(), Rotation::R0)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Library(LibraryError::SymbolNotFound { .. })
        ));
        assert_eq!(sch.components().len(), 0);
        assert_eq!(sch.manifest.len(), manifest_len);
    }

    #[test]
    fn auto_numbering_uses_the_prefix() {
        let mut sch = blank_with_provider();
        sch.add_component("Device:R", None, "1k", Point::new(10.0, 10.0), Rotation::R0)
            .unwrap();
        sch.add_component("Device:R", None, "2k", Point::new(20.0, 10.0), Rotation::R0)
            .unwrap();
        sch.add_component("Device:C", None, "100n", Point::new(30.0, 10.0), Rotation::R0)
            .unwrap();

        let refs: Vec<String> = sch
            .components()
            .iter()
            .filter_map(|c| c.reference().map(str::to_string))
            .collect();
        assert_eq!(refs, vec!["R1", "R2", "C1"]);
    }

    #[test]
    fn new_elements_land_in_group_order() {
        let mut sch = blank_with_provider();
        // Insert out of group order on purpose.
        sch.add_junction(Point::new(5.0, 5.0)).unwrap();
        sch.add_component("Device:R", Some("R1"), "10k", Point::new(10.0, 10.0), Rotation::R0)
            .unwrap();
        sch.add_wire(vec![Point::new(0.0, 0.0), Point::new(2.54, 0.0)])
            .unwrap();

        let text = sch.render();
        let symbol_at = text.find("(symbol").unwrap();
        let wire_at = text.find("(wire").unwrap();
        let junction_at = text.find("(junction").unwrap();
        let instances_at = text.find("(sheet_instances").unwrap();
        assert!(symbol_at < wire_at);
        assert!(wire_at < junction_at);
        assert!(junction_at < instances_at);
    }

    #[test]
    fn connect_pins_routes_orthogonally() {
        let mut sch = blank_with_provider();
        sch.add_component("Device:R", Some("R1"), "10k", Point::new(100.0, 100.0), Rotation::R0)
            .unwrap();
        sch.add_component("Device:R", Some("R2"), "10k", Point::new(120.0, 110.0), Rotation::R0)
            .unwrap();

        // R1.2 sits at (100, 96.19); R2.1 at (120, 113.81): L-route, 2 wires.
        let uuids = sch.connect_pins("R1", "2", "R2", "1").unwrap();
        assert_eq!(uuids.len(), 2);
        assert_eq!(sch.wires().len(), 2);

        for wire in sch.wires().iter() {
            let [a, b] = wire.points() else {
                panic!("expected two-point wires")
            };
            assert!(a.x == b.x || a.y == b.y, "wire must be orthogonal");
        }
    }

    #[test]
    fn pin_position_accounts_for_rotation() {
        let mut sch = blank_with_provider();
        sch.add_component("Device:R", Some("R1"), "10k", Point::new(100.0, 100.0), Rotation::R90)
            .unwrap();
        let p1 = sch.pin_position("R1", "1").unwrap();
        let p2 = sch.pin_position("R1", "2").unwrap();
        assert!((p1.x - 96.19).abs() < 1e-9 && (p1.y - 100.0).abs() < 1e-9);
        assert!((p2.x - 103.81).abs() < 1e-9 && (p2.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_pin_is_reported() {
        let mut sch = blank_with_provider();
        sch.add_component("Device:R", Some("R1"), "10k", Point::default(), Rotation::R0)
            .unwrap();
        let err = sch.pin_position("R1", "7").unwrap_err();
        assert!(matches!(err, Error::UnknownPin { .. }));
        let err = sch.pin_position("R9", "1").unwrap_err();
        assert!(matches!(err, Error::UnknownReference(_)));
    }

    #[test]
    fn save_and_reload_round_trips_entities() {
        let mut sch = blank_with_provider();
        sch.add_component("Device:R", Some("R1"), "10k", Point::new(127.0, 76.2), Rotation::R0)
            .unwrap();
        sch.add_label(LabelKind::Local, "OUT", Point::new(127.0, 70.0), 0.0)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.kicad_sch");
        sch.save_as(&path).unwrap();

        let mut again = Schematic::load(&path).unwrap();
        assert_eq!(again.state(), DocumentState::Loaded);
        assert_eq!(again.components().len(), 1);
        assert_eq!(again.labels().len(), 1);
        let component = again.components_mut().get("R1").unwrap().unwrap();
        assert_eq!(component.value(), Some("10k"));
        assert_eq!(component.pins().len(), 2);
    }

    #[test]
    fn second_save_of_untouched_document_is_byte_identical() {
        let mut sch = blank_with_provider();
        sch.add_component("Device:R", Some("R1"), "10k", Point::new(127.0, 76.2), Rotation::R0)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.kicad_sch");
        sch.save_as(&path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        let path_b = dir.path().join("b.kicad_sch");
        let mut reloaded = Schematic::load(&path).unwrap();
        reloaded.save_as(&path_b).unwrap();
        let second = std::fs::read_to_string(&path_b).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn netlist_groups_connected_pins() {
        let mut sch = blank_with_provider();
        sch.add_component("Device:R", Some("R1"), "10k", Point::new(100.0, 100.0), Rotation::R0)
            .unwrap();
        sch.add_component("Device:R", Some("R2"), "10k", Point::new(100.0, 120.0), Rotation::R0)
            .unwrap();
        // R1.1 (100, 103.81) down to R2.2 (100, 116.19): one straight wire.
        sch.connect_pins("R1", "1", "R2", "2").unwrap();
        sch.add_label(LabelKind::Local, "MID", Point::new(100.0, 103.81), 0.0)
            .unwrap();

        let nets = sch.netlist();
        let mid = nets.iter().find(|n| n.name == "MID").expect("labeled net");
        assert_eq!(mid.pins.len(), 2);
        assert_eq!(mid.pins[0].to_string(), "R1.1");
        assert_eq!(mid.pins[1].to_string(), "R2.2");
    }
}
