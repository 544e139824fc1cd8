//! Distill a KiCad schematic into LLM-friendly JSON.
//!
//! Usage: `cargo run --example distill -- path/to/schematic.kicad_sch [radius_mm]`

use ksch_sch::{DistillConfig, Schematic};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: distill <schematic.kicad_sch> [radius_mm]")?;
    let radius = match args.next() {
        Some(raw) => raw.parse::<f64>()?,
        None => 20.0,
    };

    let sch = Schematic::load(&path)?;
    let config = DistillConfig {
        proximity_radius_mm: radius,
        hierarchical: true,
    };
    let distilled = sch.distill(&config);
    println!("{}", serde_json::to_string_pretty(&distilled)?);
    Ok(())
}
