//! Schematic distillation: a compact, serializable summary of a design.
//!
//! Produces the component list, the derived nets, and proximity edges
//! (pairs of parts within a configurable radius) - a representation small
//! enough to hand to a language model or diff in a review. Read-only over
//! the public iteration API; the document is never touched.

use serde::Serialize;

use crate::connectivity;
use crate::schematic::Schematic;
use crate::types::Point;

/// Knobs for the distillation pass.
#[derive(Debug, Clone)]
pub struct DistillConfig {
    /// Radius in mm for nearby-part scoring.
    pub proximity_radius_mm: f64,
    /// Include sheet pins as net endpoints (hierarchical designs).
    pub hierarchical: bool,
}

impl Default for DistillConfig {
    fn default() -> Self {
        Self {
            proximity_radius_mm: 20.0,
            hierarchical: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DistilledPin {
    pub number: String,
    /// Net name when the pin is connected, `None` when floating.
    pub net: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistilledComponent {
    pub reference: String,
    pub lib_id: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footprint: Option<String>,
    pub position: Point,
    pub pins: Vec<DistilledPin>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistilledNet {
    pub name: String,
    /// `"R1.2"`-style pin endpoints.
    pub pins: Vec<String>,
}

/// Two parts within the proximity radius of each other.
#[derive(Debug, Clone, Serialize)]
pub struct ProximityEdge {
    pub a: String,
    pub b: String,
    pub distance_mm: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Distilled {
    pub generator: String,
    pub components: Vec<DistilledComponent>,
    pub nets: Vec<DistilledNet>,
    pub proximity: Vec<ProximityEdge>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sheet_pins: Vec<String>,
}

/// Distill a schematic into its summary form.
pub fn distill_schematic(schematic: &Schematic, config: &DistillConfig) -> Distilled {
    let nets = connectivity::derive_nets(schematic);

    let mut components: Vec<DistilledComponent> = schematic
        .components()
        .iter()
        .filter_map(|component| {
            let reference = component.reference()?.to_string();
            let pins = component
                .pins()
                .iter()
                .map(|pin| DistilledPin {
                    number: pin.number.clone(),
                    net: nets
                        .iter()
                        .find(|net| {
                            net.pins
                                .iter()
                                .any(|p| p.reference == reference && p.number == pin.number)
                        })
                        .map(|net| net.name.clone()),
                })
                .collect();
            Some(DistilledComponent {
                reference,
                lib_id: component.lib_id().to_string(),
                value: component.value().unwrap_or_default().to_string(),
                footprint: component.footprint().map(str::to_string),
                position: component.position(),
                pins,
            })
        })
        .collect();
    components.sort_by(|a, b| a.reference.cmp(&b.reference));

    let mut proximity = Vec::new();
    for (i, a) in components.iter().enumerate() {
        for b in components.iter().skip(i + 1) {
            let distance = a.position.distance(b.position);
            if distance <= config.proximity_radius_mm {
                proximity.push(ProximityEdge {
                    a: a.reference.clone(),
                    b: b.reference.clone(),
                    distance_mm: (distance * 100.0).round() / 100.0,
                });
            }
        }
    }

    let sheet_pins = if config.hierarchical {
        schematic
            .sheets()
            .iter()
            .flat_map(|sheet| {
                let name = sheet.name().unwrap_or("?").to_string();
                sheet
                    .pins()
                    .iter()
                    .map(move |pin| format!("{name}.{}", pin.name))
                    .collect::<Vec<_>>()
            })
            .collect()
    } else {
        Vec::new()
    };

    Distilled {
        generator: schematic.meta().generator.clone(),
        components,
        nets: nets
            .into_iter()
            .map(|net| DistilledNet {
                name: net.name,
                pins: net.pins.iter().map(|p| p.to_string()).collect(),
            })
            .collect(),
        proximity,
        sheet_pins,
    }
}
