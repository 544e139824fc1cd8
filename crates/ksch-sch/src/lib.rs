//! Format-preserving KiCad schematic document engine.
//!
//! Parses `.kicad_sch` S-expression text into a typed, indexed, mutable
//! object model and re-emits it such that untouched subtrees reproduce their
//! original bytes exactly while modified subtrees come out in KiCad's own
//! canonical formatting.
//!
//! The pieces, leaf to root:
//!
//! - [`ksch_sexpr`] (separate crate) - span-tracked node tree, parser,
//!   canonical formatter, splice emitter
//! - [`types`] - entities (components, wires, labels, junctions, sheets, ...)
//!   backed 1:1 by their source nodes
//! - [`mapper`] - raise (node to entity) and lower (entity to canonical node)
//! - [`collection`] - insertion-ordered stores with lazily rebuilt indexes,
//!   batch mode, and rebuild-time uniqueness enforcement
//! - [`schematic`] - the `Schematic` facade: load/save, CRUD, pin routing
//! - [`connectivity`] / [`routing`] / [`distill`] - derived nets, Manhattan
//!   routing, compact summaries
//! - [`validation`] - the hook surface for external checkers; the engine
//!   itself never validates semantics
//!
//! # Example
//!
//! ```no_run
//! use ksch_sch::{Schematic, Point, Rotation};
//! use ksch_sch::library::StaticSymbolProvider;
//!
//! # fn main() -> Result<(), ksch_sch::Error> {
//! let mut provider = StaticSymbolProvider::new();
//! provider.insert_two_pin("Device:R", "R");
//!
//! let mut sch = Schematic::load("amp.kicad_sch")?;
//! sch.set_symbol_provider(Box::new(provider));
//! sch.add_component("Device:R", None, "10k", Point::new(127.0, 76.2), Rotation::R0)?;
//! sch.save()?;
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod connectivity;
pub mod distill;
pub mod error;
pub mod library;
pub mod mapper;
pub mod routing;
pub mod schema;
pub mod schematic;
pub mod types;
pub mod validation;

pub use collection::{Criteria, Indexable, IndexSpec, IndexedCollection, Pattern};
pub use connectivity::{Net, PinRef};
pub use distill::{DistillConfig, Distilled};
pub use error::{ConflictError, Error};
pub use library::{LibraryError, ResolvedPin, ResolvedSymbol, SymbolProvider};
pub use schema::SchemaRules;
pub use schematic::{DocumentState, Schematic};
pub use types::{
    ComponentCriteria, DocumentMeta, Junction, Label, LabelKind, LabelShape, NoConnect,
    PinAssignment, Point, Property, Rotation, SchematicSymbol, Sheet, SheetPin, Stroke,
    StrokeStyle, Text, Wire, WireKind,
};
pub use validation::{Severity, ValidationIssue, Validator};
