//! Symbol library provider interface.
//!
//! The engine consumes symbol geometry (pin offsets, reference prefixes,
//! default footprints) but does not own any library: a [`SymbolProvider`] is
//! injected into the facade as an explicit service with a lifecycle the
//! caller controls. The filesystem-backed implementation lives in the
//! `ksch-eda` crate; [`StaticSymbolProvider`] covers tests and generated
//! schematics that never touch disk.

use std::collections::HashMap;

use thiserror::Error;

use crate::types::Point;

/// Pin electrical classes from the KiCad symbol grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElectricalType {
    Input,
    Output,
    Bidirectional,
    TriState,
    #[default]
    Passive,
    Free,
    Unspecified,
    PowerIn,
    PowerOut,
    OpenCollector,
    OpenEmitter,
    NoConnect,
}

impl ElectricalType {
    pub fn as_token(self) -> &'static str {
        match self {
            ElectricalType::Input => "input",
            ElectricalType::Output => "output",
            ElectricalType::Bidirectional => "bidirectional",
            ElectricalType::TriState => "tri_state",
            ElectricalType::Passive => "passive",
            ElectricalType::Free => "free",
            ElectricalType::Unspecified => "unspecified",
            ElectricalType::PowerIn => "power_in",
            ElectricalType::PowerOut => "power_out",
            ElectricalType::OpenCollector => "open_collector",
            ElectricalType::OpenEmitter => "open_emitter",
            ElectricalType::NoConnect => "no_connect",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "input" => Some(ElectricalType::Input),
            "output" => Some(ElectricalType::Output),
            "bidirectional" => Some(ElectricalType::Bidirectional),
            "tri_state" => Some(ElectricalType::TriState),
            "passive" => Some(ElectricalType::Passive),
            "free" => Some(ElectricalType::Free),
            "unspecified" => Some(ElectricalType::Unspecified),
            "power_in" => Some(ElectricalType::PowerIn),
            "power_out" => Some(ElectricalType::PowerOut),
            "open_collector" => Some(ElectricalType::OpenCollector),
            "open_emitter" => Some(ElectricalType::OpenEmitter),
            "no_connect" => Some(ElectricalType::NoConnect),
            _ => None,
        }
    }
}

/// One pin of a resolved library symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPin {
    pub number: String,
    pub name: String,
    /// Offset from the symbol anchor, in mm, unrotated.
    pub offset: Point,
    pub electrical_type: ElectricalType,
}

/// Everything the engine needs to know about a library symbol.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSymbol {
    pub lib_id: String,
    /// Reference designator prefix (`R`, `C`, `U`, ...).
    pub reference_prefix: String,
    pub default_footprint: Option<String>,
    pub description: Option<String>,
    pub pins: Vec<ResolvedPin>,
}

impl ResolvedSymbol {
    pub fn pin(&self, number: &str) -> Option<&ResolvedPin> {
        self.pins.iter().find(|p| p.number == number)
    }
}

/// Failures surfaced by a symbol provider.
///
/// `add_component` propagates these without mutating any collection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LibraryError {
    #[error("symbol '{lib_id}' not found in any configured library")]
    SymbolNotFound { lib_id: String },

    #[error("no symbol provider configured")]
    NoProvider,

    #[error("library '{library}' could not be read: {reason}")]
    Unreadable { library: String, reason: String },
}

/// Source of symbol geometry and metadata, injected into the facade.
pub trait SymbolProvider {
    fn resolve(&self, lib_id: &str) -> Result<ResolvedSymbol, LibraryError>;
}

/// In-memory provider for tests and programmatic schematic generation.
#[derive(Debug, Default)]
pub struct StaticSymbolProvider {
    symbols: HashMap<String, ResolvedSymbol>,
}

impl StaticSymbolProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: ResolvedSymbol) -> &mut Self {
        self.symbols.insert(symbol.lib_id.clone(), symbol);
        self
    }

    /// Register a vertical two-pin device (resistor-style geometry: pin 1 at
    /// +3.81 mm, pin 2 at -3.81 mm from the anchor).
    pub fn insert_two_pin(&mut self, lib_id: &str, reference_prefix: &str) -> &mut Self {
        self.insert(ResolvedSymbol {
            lib_id: lib_id.to_string(),
            reference_prefix: reference_prefix.to_string(),
            default_footprint: None,
            description: None,
            pins: vec![
                ResolvedPin {
                    number: "1".to_string(),
                    name: "~".to_string(),
                    offset: Point::new(0.0, 3.81),
                    electrical_type: ElectricalType::Passive,
                },
                ResolvedPin {
                    number: "2".to_string(),
                    name: "~".to_string(),
                    offset: Point::new(0.0, -3.81),
                    electrical_type: ElectricalType::Passive,
                },
            ],
        })
    }
}

impl SymbolProvider for StaticSymbolProvider {
    fn resolve(&self, lib_id: &str) -> Result<ResolvedSymbol, LibraryError> {
        self.symbols
            .get(lib_id)
            .cloned()
            .ok_or_else(|| LibraryError::SymbolNotFound {
                lib_id: lib_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_resolves_registered_symbols() {
        let mut provider = StaticSymbolProvider::new();
        provider.insert_two_pin("Device:R", "R");

        let symbol = provider.resolve("Device:R").unwrap();
        assert_eq!(symbol.reference_prefix, "R");
        assert_eq!(symbol.pins.len(), 2);
        assert_eq!(symbol.pin("1").unwrap().offset, Point::new(0.0, 3.81));

        let err = provider.resolve("Device:C").unwrap_err();
        assert_eq!(
            err,
            LibraryError::SymbolNotFound {
                lib_id: "Device:C".to_string()
            }
        );
    }
}
