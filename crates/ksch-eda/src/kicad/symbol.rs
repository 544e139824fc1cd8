//! Single-symbol extraction from a `.kicad_sym` library entry.

use anyhow::{anyhow, Result};
use ksch_sexpr::Sexpr;
use ksch_sch::library::{ElectricalType, ResolvedPin, ResolvedSymbol};
use ksch_sch::Point;
use std::collections::HashMap;

/// A symbol definition as stored in a library file.
///
/// Pins live in the nested unit sub-symbols (`R_0_1`, `R_1_1`, ...); parsing
/// flattens them into one list. `extends` references are left unresolved
/// here and resolved at the library level.
#[derive(Debug, Default, Clone)]
pub struct KicadSymbol {
    pub(crate) name: String,
    pub(crate) reference: String,
    pub(crate) value: String,
    pub(crate) footprint: String,
    pub(crate) description: Option<String>,
    pub(crate) extends: Option<String>,
    pub(crate) in_bom: bool,
    pub(crate) pins: Vec<KicadPin>,
    pub(crate) properties: HashMap<String, String>,
}

#[derive(Debug, Default, Clone)]
pub struct KicadPin {
    pub(crate) name: String,
    pub(crate) number: String,
    pub(crate) electrical_type: Option<String>,
    pub(crate) graphical_style: Option<String>,
    /// `(at x y orientation)` of the pin's connection point, symbol-relative.
    pub(crate) at: Option<(f64, f64, f64)>,
    pub(crate) length: Option<f64>,
    pub(crate) hidden: bool,
}

impl KicadSymbol {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extends(&self) -> Option<&str> {
        self.extends.as_deref()
    }

    pub fn pins(&self) -> &[KicadPin] {
        &self.pins
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Project into the engine's provider-facing shape.
    pub fn resolve(&self, lib_nickname: &str) -> ResolvedSymbol {
        ResolvedSymbol {
            lib_id: format!("{lib_nickname}:{}", self.name),
            reference_prefix: self.reference.clone(),
            default_footprint: (!self.footprint.is_empty()).then(|| self.footprint.clone()),
            description: self.description.clone(),
            pins: self
                .pins
                .iter()
                .map(|pin| ResolvedPin {
                    number: pin.number.clone(),
                    name: pin.name.clone(),
                    offset: pin
                        .at
                        .map(|(x, y, _)| Point::new(x, y))
                        .unwrap_or_default(),
                    electrical_type: pin
                        .electrical_type
                        .as_deref()
                        .and_then(ElectricalType::from_token)
                        .unwrap_or_default(),
                })
                .collect(),
        }
    }
}

impl KicadPin {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }
}

fn string_field(items: &[Sexpr], tag: &str) -> Option<String> {
    ksch_sexpr::find_child_list(items, tag)?
        .get(1)?
        .as_str()
        .map(str::to_string)
}

fn yes_no_field(items: &[Sexpr], tag: &str) -> Option<bool> {
    match ksch_sexpr::find_child_list(items, tag)?.get(1)?.as_sym()? {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// Parse one `(symbol "NAME" ...)` library entry.
pub fn parse_symbol(items: &[Sexpr]) -> Result<KicadSymbol> {
    let name = items
        .get(1)
        .and_then(Sexpr::as_str)
        .ok_or_else(|| anyhow!("symbol entry has no name"))?
        .to_string();

    let mut symbol = KicadSymbol {
        name,
        in_bom: yes_no_field(items, "in_bom").unwrap_or(true),
        extends: string_field(items, "extends"),
        ..Default::default()
    };

    for node in items.iter().skip(2) {
        let Some(fields) = node.as_list() else { continue };
        match fields.first().and_then(Sexpr::as_sym) {
            Some("property") => {
                let Some(key) = fields.get(1).and_then(Sexpr::as_str) else {
                    continue;
                };
                let value = fields
                    .get(2)
                    .and_then(Sexpr::as_str)
                    .unwrap_or_default()
                    .to_string();
                match key {
                    "Reference" => symbol.reference = value.clone(),
                    "Value" => symbol.value = value.clone(),
                    "Footprint" => symbol.footprint = value.clone(),
                    "Description" => symbol.description = Some(value.clone()),
                    _ => {}
                }
                symbol.properties.insert(key.to_string(), value);
            }
            // Unit sub-symbols (`R_0_1`, `R_1_1`, ...) hold the pins.
            Some("symbol") => {
                for pin_node in fields.iter().skip(2) {
                    let Some(pin_fields) = pin_node.as_list() else {
                        continue;
                    };
                    if pin_fields.first().and_then(Sexpr::as_sym) == Some("pin") {
                        symbol.pins.push(parse_pin(pin_fields));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(symbol)
}

fn parse_pin(fields: &[Sexpr]) -> KicadPin {
    let mut pin = KicadPin {
        electrical_type: fields.get(1).and_then(Sexpr::as_sym).map(str::to_string),
        graphical_style: fields.get(2).and_then(Sexpr::as_sym).map(str::to_string),
        ..Default::default()
    };

    for node in fields.iter().skip(3) {
        let Some(sub) = node.as_list() else { continue };
        match sub.first().and_then(Sexpr::as_sym) {
            Some("at") => {
                pin.at = Some((
                    sub.get(1).and_then(ksch_sexpr::number_as_f64).unwrap_or(0.0),
                    sub.get(2).and_then(ksch_sexpr::number_as_f64).unwrap_or(0.0),
                    sub.get(3).and_then(ksch_sexpr::number_as_f64).unwrap_or(0.0),
                ));
            }
            Some("length") => {
                pin.length = sub.get(1).and_then(ksch_sexpr::number_as_f64);
            }
            Some("name") => {
                if let Some(name) = sub.get(1).and_then(Sexpr::as_str) {
                    pin.name = name.to_string();
                }
            }
            Some("number") => {
                if let Some(number) = sub.get(1).and_then(Sexpr::as_str) {
                    pin.number = number.to_string();
                }
            }
            Some("hide") => {
                pin.hidden = sub.get(1).and_then(Sexpr::as_sym) != Some("no");
            }
            _ => {}
        }
    }

    pin
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksch_sexpr::parse;

    const RESISTOR: &str = r#"(symbol "R"
	(pin_numbers (hide yes))
	(pin_names (offset 0))
	(exclude_from_sim no)
	(in_bom yes)
	(on_board yes)
	(property "Reference" "R" (at 2.032 0 90))
	(property "Value" "R" (at 0 0 90))
	(property "Footprint" "" (at -1.778 0 90))
	(property "Datasheet" "~" (at 0 0 0))
	(property "Description" "Resistor" (at 0 0 0))
	(symbol "R_0_1"
		(rectangle (start -1.016 -2.54) (end 1.016 2.54))
	)
	(symbol "R_1_1"
		(pin passive line (at 0 3.81 270) (length 1.27) (name "~" (effects (font (size 1.27 1.27)))) (number "1" (effects (font (size 1.27 1.27)))))
		(pin passive line (at 0 -3.81 90) (length 1.27) (name "~" (effects (font (size 1.27 1.27)))) (number "2" (effects (font (size 1.27 1.27)))))
	)
)"#;

    #[test]
    fn parses_symbol_fields_and_pins() {
        let node = parse(RESISTOR).unwrap();
        let symbol = parse_symbol(node.as_list().unwrap()).unwrap();
        assert_eq!(symbol.name(), "R");
        assert_eq!(symbol.reference, "R");
        assert_eq!(symbol.description.as_deref(), Some("Resistor"));
        assert!(symbol.in_bom);
        assert_eq!(symbol.pins.len(), 2);
        assert_eq!(symbol.pins[0].number(), "1");
        assert_eq!(symbol.pins[0].at, Some((0.0, 3.81, 270.0)));
        assert_eq!(symbol.pins[0].electrical_type.as_deref(), Some("passive"));
    }

    #[test]
    fn resolves_into_provider_shape() {
        let node = parse(RESISTOR).unwrap();
        let symbol = parse_symbol(node.as_list().unwrap()).unwrap();
        let resolved = symbol.resolve("Device");
        assert_eq!(resolved.lib_id, "Device:R");
        assert_eq!(resolved.reference_prefix, "R");
        assert_eq!(resolved.default_footprint, None);
        assert_eq!(resolved.pin("1").unwrap().offset, Point::new(0.0, 3.81));
        assert_eq!(resolved.pin("2").unwrap().offset, Point::new(0.0, -3.81));
    }

    #[test]
    fn extends_reference_is_captured() {
        let node = parse(r#"(symbol "R_Small" (extends "R") (property "Reference" "R" (at 0 0 0)))"#).unwrap();
        let symbol = parse_symbol(node.as_list().unwrap()).unwrap();
        assert_eq!(symbol.extends(), Some("R"));
    }
}
