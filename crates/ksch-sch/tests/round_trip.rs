//! Round-trip fidelity: untouched bytes replay exactly, edited subtrees
//! re-render canonically without disturbing their neighbors.

use ksch_sch::{DocumentState, Schematic};

fn fixture_path(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("fixture readable")
}

#[test]
fn no_op_save_is_byte_identical() {
    for name in ["blank.kicad_sch", "single_resistor.kicad_sch", "rc_filter.kicad_sch"] {
        let original = fixture(name);
        let mut sch = Schematic::load(fixture_path(name)).expect("fixture loads");
        assert_eq!(sch.state(), DocumentState::Loaded);

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join(name);
        sch.save_as(&out).unwrap();
        assert_eq!(sch.state(), DocumentState::Saved);

        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written, original, "byte-level round trip failed for {name}");
    }
}

#[test]
fn render_without_save_is_byte_identical() {
    let original = fixture("rc_filter.kicad_sch");
    let sch = Schematic::from_text(original.clone()).unwrap();
    assert_eq!(sch.render(), original);
}

#[test]
fn reparse_after_save_is_structurally_equal() {
    let mut first = Schematic::load(fixture_path("rc_filter.kicad_sch")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("copy.kicad_sch");
    first.save_as(&out).unwrap();
    let second = Schematic::load(&out).unwrap();

    assert_eq!(first.components().len(), second.components().len());
    assert_eq!(first.wires().len(), second.wires().len());
    assert_eq!(first.labels().len(), second.labels().len());
    assert_eq!(first.junctions().len(), second.junctions().len());
    assert_eq!(first.no_connects().len(), second.no_connects().len());
    assert_eq!(first.sheets().len(), second.sheets().len());
    assert_eq!(first.texts().len(), second.texts().len());

    for (a, b) in first.wires().iter().zip(second.wires().iter()) {
        assert_eq!(a.uuid(), b.uuid());
        assert_eq!(a.points(), b.points());
    }
    for (a, b) in first.labels().iter().zip(second.labels().iter()) {
        assert_eq!(a.text(), b.text());
        assert_eq!(a.kind(), b.kind());
        assert_eq!(a.position(), b.position());
    }
    for (a, b) in first.sheets().iter().zip(second.sheets().iter()) {
        assert_eq!(a.name(), b.name());
        assert_eq!(a.filename(), b.filename());
        assert_eq!(a.pins().len(), b.pins().len());
    }
}

#[test]
fn pin_uuids_survive_a_load_save_cycle() {
    let mut sch = Schematic::load(fixture_path("single_resistor.kicad_sch")).unwrap();

    let resistor = sch.components_mut().get("R1").unwrap().expect("R1 present");
    assert_eq!(
        resistor.pin_uuid("1"),
        Some("df660b58-5cdf-473e-8c0a-859cae977374")
    );
    assert_eq!(
        resistor.pin_uuid("2"),
        Some("ff5e718a-93af-455d-84a2-eecf78f3f816")
    );

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("resistor.kicad_sch");
    sch.save_as(&out).unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains("df660b58-5cdf-473e-8c0a-859cae977374"));
    assert!(written.contains("ff5e718a-93af-455d-84a2-eecf78f3f816"));

    // And the reparsed model still maps number -> uuid, in file order.
    let mut again = Schematic::load(&out).unwrap();
    let resistor = again.components_mut().get("R1").unwrap().unwrap();
    assert_eq!(resistor.pins().len(), 2);
    assert_eq!(resistor.pins()[0].number, "2");
    assert_eq!(
        resistor.pin_uuid("1"),
        Some("df660b58-5cdf-473e-8c0a-859cae977374")
    );
}

#[test]
fn editing_one_component_leaves_siblings_verbatim() {
    let original = fixture("single_resistor.kicad_sch");
    let mut sch = Schematic::from_text(original.clone()).unwrap();

    sch.update_component("R1", |c| c.set_value("22k")).unwrap();
    assert_eq!(sch.state(), DocumentState::Modified);
    let rendered = sch.render();

    // The edited symbol re-renders canonically with the new value.
    assert!(rendered.contains("(property \"Value\" \"22k\""));
    assert!(!rendered.contains("\"10k\""));

    // The untouched lib_symbols block replays byte-for-byte.
    let lib_start = original.find("\t(lib_symbols").unwrap();
    let lib_end = original.find("\t(symbol\n").unwrap();
    let lib_block = &original[lib_start..lib_end];
    assert!(rendered.contains(lib_block));

    // Pin uuids survive the canonical re-render too.
    assert!(rendered.contains("df660b58-5cdf-473e-8c0a-859cae977374"));
    assert!(rendered.contains("ff5e718a-93af-455d-84a2-eecf78f3f816"));

    // And the result still parses into the same structure.
    let mut reparsed = Schematic::from_text(rendered).unwrap();
    let resistor = reparsed.components_mut().get("R1").unwrap().unwrap();
    assert_eq!(resistor.value(), Some("22k"));
}

#[test]
fn parse_failure_aborts_with_location() {
    let mut broken = fixture("blank.kicad_sch");
    broken.truncate(broken.len() - 3); // drop the closing paren
    let err = Schematic::from_text(broken).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("unclosed list"), "got: {message}");
}
