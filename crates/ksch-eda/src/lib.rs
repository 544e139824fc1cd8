//! KiCad symbol library access for the schematic engine.
//!
//! Reads `.kicad_sym` libraries into symbol definitions the engine can
//! consume (pin offsets, reference prefixes, default footprints), resolves
//! `extends` inheritance between symbols, discovers the installed library
//! directories, and caches parsed libraries behind the engine's
//! `SymbolProvider` interface with an explicit construct/invalidate/rebuild
//! lifecycle.

pub mod cache;
pub mod discovery;
pub mod kicad;

pub use cache::SymbolCache;
pub use discovery::discover_symbol_dirs;
pub use kicad::library::KicadSymbolLibrary;
pub use kicad::symbol::{KicadPin, KicadSymbol};
