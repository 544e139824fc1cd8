//! Whole-library (`.kicad_sym`) parsing and `extends` resolution.

use anyhow::{anyhow, Result};
use ksch_sexpr::{parse_document, Sexpr};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::symbol::{parse_symbol, KicadSymbol};

/// A parsed KiCad symbol library: the contents of one `.kicad_sym` file.
pub struct KicadSymbolLibrary {
    symbols: Vec<KicadSymbol>,
}

impl KicadSymbolLibrary {
    /// Parse a library from text.
    pub fn from_string(content: &str) -> Result<Self> {
        let root = parse_document(content)?;
        let items = root
            .as_list()
            .filter(|items| items.first().and_then(Sexpr::as_sym) == Some("kicad_symbol_lib"))
            .ok_or_else(|| anyhow!("not a kicad_symbol_lib document"))?;

        let mut symbols = Vec::new();
        for node in items.iter().skip(1) {
            let Some(fields) = node.as_list() else { continue };
            if fields.first().and_then(Sexpr::as_sym) != Some("symbol") {
                continue;
            }
            match parse_symbol(fields) {
                Ok(symbol) => symbols.push(symbol),
                Err(err) => {
                    // One malformed entry must not take down the library.
                    log::warn!("failed to parse symbol entry: {err}");
                }
            }
        }

        resolve_extends(&mut symbols);
        Ok(Self { symbols })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        log::debug!("parsing symbol library {}", path.display());
        Self::from_string(&content)
    }

    pub fn symbols(&self) -> &[KicadSymbol] {
        &self.symbols
    }

    pub fn get_symbol(&self, name: &str) -> Option<&KicadSymbol> {
        self.symbols.iter().find(|s| s.name() == name)
    }

    pub fn symbol_names(&self) -> Vec<&str> {
        self.symbols.iter().map(|s| s.name()).collect()
    }
}

/// Resolve `extends` references by cloning the parent and overlaying the
/// child's explicit fields.
fn resolve_extends(symbols: &mut [KicadSymbol]) {
    let by_name: HashMap<String, usize> = symbols
        .iter()
        .enumerate()
        .map(|(idx, s)| (s.name().to_string(), idx))
        .collect();

    let to_resolve: Vec<(usize, String)> = symbols
        .iter()
        .enumerate()
        .filter_map(|(idx, s)| s.extends().map(|parent| (idx, parent.to_string())))
        .collect();

    for (child_idx, parent_name) in to_resolve {
        let Some(&parent_idx) = by_name.get(&parent_name) else {
            log::warn!(
                "symbol '{}' extends unknown parent '{parent_name}'",
                symbols[child_idx].name()
            );
            continue;
        };

        let mut merged = symbols[parent_idx].clone();
        let child = &symbols[child_idx];

        merged.name = child.name.clone();
        merged.extends = child.extends.clone();
        if !child.footprint.is_empty() {
            merged.footprint = child.footprint.clone();
        }
        if !child.pins.is_empty() {
            merged.pins = child.pins.clone();
        }
        if child.description.is_some() {
            merged.description = child.description.clone();
        }
        for (key, value) in &child.properties {
            merged.properties.insert(key.clone(), value.clone());
        }

        symbols[child_idx] = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIB: &str = r#"(kicad_symbol_lib
	(version 20241209)
	(generator "kicad_symbol_editor")
	(symbol "R"
		(in_bom yes)
		(property "Reference" "R" (at 2.032 0 90))
		(property "Value" "R" (at 0 0 90))
		(property "Description" "Resistor" (at 0 0 0))
		(symbol "R_1_1"
			(pin passive line (at 0 3.81 270) (length 1.27) (name "~") (number "1"))
			(pin passive line (at 0 -3.81 90) (length 1.27) (name "~") (number "2"))
		)
	)
	(symbol "R_Small"
		(extends "R")
		(property "Reference" "R" (at 0.762 0.508 90))
	)
)"#;

    #[test]
    fn parses_all_symbols() {
        let lib = KicadSymbolLibrary::from_string(LIB).unwrap();
        assert_eq!(lib.symbol_names(), vec!["R", "R_Small"]);
    }

    #[test]
    fn extends_inherits_pins_from_parent() {
        let lib = KicadSymbolLibrary::from_string(LIB).unwrap();
        let small = lib.get_symbol("R_Small").unwrap();
        assert_eq!(small.pins().len(), 2);
        assert_eq!(small.pins()[0].number(), "1");
        // Description inherited from the parent.
        assert_eq!(small.resolve("Device").description.as_deref(), Some("Resistor"));
    }

    #[test]
    fn rejects_non_library_documents() {
        assert!(KicadSymbolLibrary::from_string("(kicad_sch (version 1))").is_err());
    }
}
