//! Format-preserving document emission.
//!
//! The emitter splices a document back together from three kinds of material:
//! verbatim byte ranges of the original source (clean nodes and the
//! whitespace between them), canonical renderings of dirty or synthetic
//! nodes, and synthesized separators where no original gap exists. This is
//! the same single-forward-pass span-splice approach used for string patching
//! in the parser crate's ancestry, generalized to whole-subtree replacement.

use crate::formatter::{self, FormatRules};
use crate::{Sexpr, Span};

/// One top-level element scheduled for emission.
///
/// `leading_gap` is the span of source whitespace that preceded the node in
/// the original file; `None` means the node was inserted after load and gets
/// the canonical `\n\t` separator.
#[derive(Debug)]
pub struct EmitSlot<'a> {
    pub leading_gap: Option<Span>,
    pub node: &'a Sexpr,
}

/// Canonical separator between top-level elements of a `kicad_sch` document.
pub const CANONICAL_SEPARATOR: &str = "\n\t";

/// Re-emit a document from its source text and an ordered slot list.
///
/// `head` is the byte range of the document opener (through the root tag);
/// `tail` the range from the end of the last original element to the end of
/// the file. Clean nodes replay their exact bytes; dirty and synthetic nodes
/// are rendered through `rules` at nesting depth 1. Whitespace conventions
/// survive verbatim/regenerated boundaries because each slot keeps its own
/// original gap even when its node is re-rendered.
pub fn emit_document(
    source: &str,
    head: Span,
    slots: &[EmitSlot<'_>],
    tail: Span,
    rules: &FormatRules,
) -> String {
    let mut out = String::with_capacity(source.len());
    out.push_str(&source[head.start..head.end]);

    for slot in slots {
        match slot.leading_gap {
            Some(gap) => out.push_str(&source[gap.start..gap.end]),
            None => out.push_str(CANONICAL_SEPARATOR),
        }
        if slot.node.needs_render() {
            out.push_str(&formatter::format_node(slot.node, 1, rules));
        } else {
            out.push_str(&source[slot.node.span.start..slot.node.span.end]);
        }
    }

    out.push_str(&source[tail.start..tail.end]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_document;

    const DOC: &str = "(kicad_sch\n\t(version 20250114)\n\t(generator \"eeschema\")\n\t(junction\n\t\t(at 124.46 73.66)\n\t\t(diameter 0)\n\t\t(uuid \"j1\")\n\t)\n)\n";

    fn split_doc(source: &str) -> (Span, Vec<(Option<Span>, Sexpr)>, Span) {
        let root = parse_document(source).unwrap();
        let items = root.as_list().unwrap();
        let tag = &items[0];
        let head = Span::new(root.span.start, tag.span.end);
        let mut slots = Vec::new();
        let mut cursor = tag.span.end;
        for child in &items[1..] {
            slots.push((Some(Span::new(cursor, child.span.start)), child.clone()));
            cursor = child.span.end;
        }
        let tail = Span::new(cursor, source.len());
        (head, slots, tail)
    }

    #[test]
    fn untouched_document_replays_byte_identical() {
        let (head, owned, tail) = split_doc(DOC);
        let slots: Vec<EmitSlot> = owned
            .iter()
            .map(|(gap, node)| EmitSlot {
                leading_gap: *gap,
                node,
            })
            .collect();
        let out = emit_document(DOC, head, &slots, tail, FormatRules::kicad_default());
        assert_eq!(out, DOC);
    }

    #[test]
    fn dirty_node_is_rerendered_in_place() {
        let (head, mut owned, tail) = split_doc(DOC);
        // Mutate the junction's diameter and mark it dirty.
        {
            let node = &mut owned[2].1;
            node.mark_dirty();
            let diameter = node
                .as_list_mut()
                .unwrap()
                .iter_mut()
                .find(|c| c.tag() == Some("diameter"))
                .unwrap();
            diameter.as_list_mut().unwrap()[1] = crate::Sexpr::float(1.016);
        }
        let slots: Vec<EmitSlot> = owned
            .iter()
            .map(|(gap, node)| EmitSlot {
                leading_gap: *gap,
                node,
            })
            .collect();
        let out = emit_document(DOC, head, &slots, tail, FormatRules::kicad_default());
        assert!(out.contains("(diameter 1.016)"));
        // Clean siblings stay verbatim.
        assert!(out.contains("(version 20250114)"));
        assert!(out.ends_with(")\n"));
    }

    #[test]
    fn inserted_node_gets_canonical_separator() {
        let (head, owned, tail) = split_doc(DOC);
        let new_node = parse_document("(no_connect (at 10.16 10.16) (uuid \"n1\"))").unwrap();
        let mut synthetic = new_node.clone();
        synthetic.span = Span::synthetic();
        let mut slots: Vec<EmitSlot> = owned
            .iter()
            .map(|(gap, node)| EmitSlot {
                leading_gap: *gap,
                node,
            })
            .collect();
        slots.push(EmitSlot {
            leading_gap: None,
            node: &synthetic,
        });
        let out = emit_document(DOC, head, &slots, tail, FormatRules::kicad_default());
        assert!(out.contains("\n\t(no_connect\n\t\t(at 10.16 10.16)\n\t\t(uuid \"n1\")\n\t)\n)\n"));
    }

    #[test]
    fn removed_node_leaves_no_residue() {
        let (head, owned, tail) = split_doc(DOC);
        let slots: Vec<EmitSlot> = owned
            .iter()
            .take(2)
            .map(|(gap, node)| EmitSlot {
                leading_gap: *gap,
                node,
            })
            .collect();
        let out = emit_document(DOC, head, &slots, tail, FormatRules::kicad_default());
        assert!(!out.contains("junction"));
        assert_eq!(
            out,
            "(kicad_sch\n\t(version 20250114)\n\t(generator \"eeschema\")\n)\n"
        );
    }
}
