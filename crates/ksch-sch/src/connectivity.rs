//! Derived net extraction.
//!
//! Nets are not stored in the document - they are computed on demand from
//! wire endpoints, junctions, label anchors and resolved pin positions, by
//! union-find over grid-quantized connection sites. A label or pin landing
//! exactly on a wire endpoint shares that endpoint's site; mid-segment
//! attachments (T-junctions) are resolved geometrically.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;

use crate::schematic::Schematic;
use crate::types::Point;

/// A component pin participating in a net.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRef {
    pub reference: String,
    pub number: String,
}

impl std::fmt::Display for PinRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.reference, self.number)
    }
}

/// One derived net: a connected group of pins, wires and labels.
#[derive(Debug, Clone)]
pub struct Net {
    /// Label text when the group carries one, else a generated `N$k` name.
    pub name: String,
    pub pins: Vec<PinRef>,
    /// UUIDs of member wires.
    pub wires: Vec<String>,
    /// Texts of member labels.
    pub labels: Vec<String>,
}

/// Connection sites are quantized to 0.01 mm so float jitter from rotation
/// math cannot split a net.
fn site_key(p: Point) -> (i64, i64) {
    ((p.x * 100.0).round() as i64, (p.y * 100.0).round() as i64)
}

type Segment = ((i64, i64), (i64, i64));

fn on_segment(point: (i64, i64), seg: &Segment) -> bool {
    let ((ax, ay), (bx, by)) = *seg;
    let (px, py) = point;
    if ax == bx {
        px == ax && py >= ay.min(by) && py <= ay.max(by)
    } else if ay == by {
        py == ay && px >= ax.min(bx) && px <= ax.max(bx)
    } else {
        // Diagonal wires do not participate in T-junction resolution.
        false
    }
}

#[derive(Default)]
struct SiteGraph {
    ids: HashMap<(i64, i64), usize>,
    edges: Vec<(usize, usize)>,
    segments: Vec<(Segment, usize)>,
}

impl SiteGraph {
    fn site(&mut self, p: Point) -> usize {
        let next = self.ids.len();
        *self.ids.entry(site_key(p)).or_insert(next)
    }

    /// Register a non-wire point: identical coordinates share the existing
    /// site; a fresh site landing mid-segment is edged onto that segment.
    fn attach(&mut self, p: Point) -> usize {
        let key = site_key(p);
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.site(p);
        if let Some(seg_site) = self
            .segments
            .iter()
            .find(|(seg, _)| on_segment(key, seg))
            .map(|(_, site)| *site)
        {
            self.edges.push((id, seg_site));
        }
        id
    }
}

/// Compute all nets of a schematic.
///
/// Pin positions need the facade's symbol provider; when none is configured
/// (or a lib_id fails to resolve) nets are still derived from wires, labels
/// and junctions, just without pin membership.
pub fn derive_nets(schematic: &Schematic) -> Vec<Net> {
    let mut graph = SiteGraph::default();

    // Wire vertices first: endpoints become sites, consecutive vertices edges.
    let mut wire_sites: Vec<(String, usize)> = Vec::new();
    for wire in schematic.wires().iter() {
        let mut first_site = None;
        for pair in wire.points().windows(2) {
            let a = graph.site(pair[0]);
            let b = graph.site(pair[1]);
            graph.edges.push((a, b));
            graph
                .segments
                .push(((site_key(pair[0]), site_key(pair[1])), a));
            first_site.get_or_insert(a);
        }
        if let Some(site) = first_site {
            wire_sites.push((wire.uuid().to_string(), site));
        }
    }

    for junction in schematic.junctions().iter() {
        graph.attach(junction.position());
    }

    let mut label_sites: Vec<(String, usize)> = Vec::new();
    for label in schematic.labels().iter() {
        let id = graph.attach(label.position());
        label_sites.push((label.text().to_string(), id));
    }

    let mut pin_sites: Vec<(PinRef, usize)> = Vec::new();
    if let Some(provider) = schematic.symbol_provider() {
        for component in schematic.components().iter() {
            let Some(reference) = component.reference() else {
                continue;
            };
            let resolved = match provider.resolve(component.lib_id()) {
                Ok(resolved) => resolved,
                Err(err) => {
                    log::debug!("skipping pins of {reference}: {err}");
                    continue;
                }
            };
            for pin in &resolved.pins {
                let absolute = component.position() + component.rotation().apply(pin.offset);
                let id = graph.attach(absolute);
                pin_sites.push((
                    PinRef {
                        reference: reference.to_string(),
                        number: pin.number.clone(),
                    },
                    id,
                ));
            }
        }
    }

    // Union everything and group members by root site.
    let mut uf: UnionFind<usize> = UnionFind::new(graph.ids.len());
    for &(a, b) in &graph.edges {
        uf.union(a, b);
    }

    let mut groups: HashMap<usize, Net> = HashMap::new();
    for (text, id) in label_sites {
        groups.entry(uf.find(id)).or_insert_with(empty_net).labels.push(text);
    }
    for (pin, id) in pin_sites {
        groups.entry(uf.find(id)).or_insert_with(empty_net).pins.push(pin);
    }
    for (uuid, id) in wire_sites {
        groups.entry(uf.find(id)).or_insert_with(empty_net).wires.push(uuid);
    }

    let mut nets: Vec<Net> = groups
        .into_values()
        .filter(|net| !net.wires.is_empty() || !net.labels.is_empty() || net.pins.len() >= 2)
        .collect();

    // Deterministic order before numbering the anonymous groups.
    nets.sort_by(|a, b| {
        (a.labels.first(), a.wires.first(), a.pins.first().map(|p| (&p.reference, &p.number)))
            .cmp(&(b.labels.first(), b.wires.first(), b.pins.first().map(|p| (&p.reference, &p.number))))
    });

    let mut counter = 0usize;
    for net in &mut nets {
        net.name = match net.labels.iter().min() {
            Some(label) => label.clone(),
            None => {
                counter += 1;
                format!("N${counter}")
            }
        };
        net.pins
            .sort_by(|a, b| (&a.reference, &a.number).cmp(&(&b.reference, &b.number)));
        net.wires.sort();
        net.labels.sort();
    }
    nets.sort_by(|a, b| a.name.cmp(&b.name));
    nets
}

fn empty_net() -> Net {
    Net {
        name: String::new(),
        pins: Vec::new(),
        wires: Vec::new(),
        labels: Vec::new(),
    }
}
