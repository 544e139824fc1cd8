//! `.kicad_sym` parsing.

pub mod library;
pub mod symbol;
