//! Validation hook surface.
//!
//! The engine itself never runs semantic validation - pin-conflict matrices,
//! net-drive checks and the like belong to external validators (an ERC
//! module, a BOM auditor). Those collaborators implement [`Validator`] and
//! the facade runs them on demand, collecting issues without ever raising.

use crate::schematic::Schematic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A single finding from a validator. Data, not an error type: issues are
/// returned for caller inspection, never thrown.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
    /// UUIDs (or references) of the entities involved.
    pub entity_refs: Vec<String>,
}

impl ValidationIssue {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            entity_refs: Vec::new(),
        }
    }

    pub fn with_refs(mut self, refs: impl IntoIterator<Item = String>) -> Self {
        self.entity_refs.extend(refs);
        self
    }
}

/// A read-only check over a schematic, supplied by the caller.
pub trait Validator {
    fn name(&self) -> &str;

    fn check(&self, schematic: &Schematic) -> Vec<ValidationIssue>;
}

/// Run every validator and collect their findings, most severe first.
pub fn run_validators(
    schematic: &Schematic,
    validators: &[&dyn Validator],
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for validator in validators {
        let found = validator.check(schematic);
        log::debug!("validator '{}' reported {} issues", validator.name(), found.len());
        issues.extend(found);
    }
    issues.sort_by(|a, b| b.severity.cmp(&a.severity));
    issues
}
