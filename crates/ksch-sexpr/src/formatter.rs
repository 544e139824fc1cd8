//! Canonical (KiCad-style) rendering of S-expression trees.
//!
//! The renderer is driven by a [`FormatRules`] table rather than per-tag
//! branching: the table says which sibling runs may share a line, where they
//! wrap, and how numbers are printed. This keeps the empirically-derived
//! KiCad conventions in one place where fixture tests can validate them.
//!
//! Layout rules, matching KiCad's own writer for `.kicad_sch` files:
//! - a list whose elements are all atoms renders on one line: `(at 127 76.2 0)`
//! - a list with sub-lists puts its head atoms on the first line and each
//!   sub-list on its own indented line, closing paren on its own line
//! - consecutive sibling lists whose tag is in the grouped set (`xy`) share a
//!   line until the wrap column
//! - indentation is one tab per nesting level

use crate::{Sexpr, SexprKind};

/// Table of canonical layout decisions for one family of KiCad files.
#[derive(Debug, Clone)]
pub struct FormatRules {
    /// Sibling lists with these head tags are packed onto shared lines.
    pub grouped_tags: &'static [&'static str],
    /// Column limit for packed sibling runs.
    pub group_wrap_column: usize,
}

static KICAD_SCH_RULES: FormatRules = FormatRules {
    grouped_tags: &["xy"],
    group_wrap_column: 99,
};

impl FormatRules {
    /// Rules matching KiCad's schematic writer (KiCad 8/9 `.kicad_sch`).
    pub fn kicad_default() -> &'static FormatRules {
        &KICAD_SCH_RULES
    }

    fn is_grouped(&self, node: &Sexpr) -> bool {
        node.tag().is_some_and(|t| self.grouped_tags.contains(&t))
    }
}

/// Render a node at the given nesting depth.
///
/// The first line carries no indentation (the caller supplies the separator);
/// continuation lines are indented `depth + 1` tabs and the closing paren
/// `depth` tabs.
pub fn format_node(node: &Sexpr, depth: usize, rules: &FormatRules) -> String {
    let mut out = String::new();
    write_node(node, depth, rules, &mut out);
    out
}

/// Render a whole document tree, with the trailing newline KiCad emits.
pub fn format_document(root: &Sexpr, rules: &FormatRules) -> String {
    let mut out = format_node(root, 0, rules);
    out.push('\n');
    out
}

fn write_node(node: &Sexpr, depth: usize, rules: &FormatRules, out: &mut String) {
    let items = match node.as_list() {
        Some(items) => items,
        None => {
            out.push_str(&atom_text(node));
            return;
        }
    };

    if items.iter().all(|item| !item.is_list()) {
        write_inline(node, out);
        return;
    }

    // Head line: opening paren plus the run of leading atoms.
    out.push('(');
    let mut idx = 0;
    while idx < items.len() && !items[idx].is_list() {
        if idx > 0 {
            out.push(' ');
        }
        out.push_str(&atom_text(&items[idx]));
        idx += 1;
    }

    let mut column = 0usize;
    let mut prev_grouped_tag: Option<&str> = None;
    while idx < items.len() {
        let child = &items[idx];
        let grouped = rules.is_grouped(child);

        // Packed runs: `(xy 1 2) (xy 3 4)` share a line until the wrap column.
        if grouped
            && prev_grouped_tag == child.tag()
            && column + inline_len(child) + 1 < rules.group_wrap_column
        {
            out.push(' ');
            let before = out.len();
            write_inline(child, out);
            column += out.len() - before + 1;
        } else {
            out.push('\n');
            push_indent(out, depth + 1);
            let before = out.len();
            write_node(child, depth + 1, rules, out);
            column = depth + 1 + (out.len() - before);
        }

        prev_grouped_tag = if grouped { child.tag() } else { None };
        idx += 1;
    }

    out.push('\n');
    push_indent(out, depth);
    out.push(')');
}

fn write_inline(node: &Sexpr, out: &mut String) {
    match node.as_list() {
        Some(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_inline(item, out);
            }
            out.push(')');
        }
        None => out.push_str(&atom_text(node)),
    }
}

fn inline_len(node: &Sexpr) -> usize {
    let mut s = String::new();
    write_inline(node, &mut s);
    s.len()
}

fn atom_text(node: &Sexpr) -> String {
    match &node.kind {
        SexprKind::Symbol(s) => s.clone(),
        SexprKind::String(s) => quote_string(s),
        SexprKind::Int(n) => match node.raw_atom.as_deref() {
            Some(raw) => raw.to_string(),
            None => n.to_string(),
        },
        SexprKind::F64(f) => match node.raw_atom.as_deref() {
            Some(raw) => raw.to_string(),
            None => format_float(*f),
        },
        SexprKind::List(_) => unreachable!("atom_text called on a list"),
    }
}

/// Print a float the way KiCad does: no exponent, no trailing zeros, whole
/// numbers without a decimal point.
pub fn format_float(f: f64) -> String {
    if f == f.trunc() && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        trim_float(format!("{f:.6}"))
    }
}

/// Quote a string value, escaping special characters.
pub fn quote_string(value: &str) -> String {
    let escaped = escape_string(value);
    let mut quoted = String::with_capacity(escaped.len() + 2);
    quoted.push('"');
    quoted.push_str(&escaped);
    quoted.push('"');
    quoted
}

pub fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ => result.push(ch),
        }
    }
    result
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn trim_float(mut s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s.is_empty() { "0".to_string() } else { s }
}
