use wavyte_presets::CompositionDocument;

#[test]
fn json_fixture_validates() {
    let s = include_str!("data/document.json");
    let doc: CompositionDocument = serde_json::from_str(s).unwrap();
    doc.validate().unwrap();
    assert_eq!(doc.children_data[0].children_data.len(), 2);
    assert_eq!(doc.children_data[0].children_data[1].effects.len(), 1);
}

#[test]
fn json_fixture_with_empty_id_is_rejected() {
    let s = include_str!("data/document.json").replace("\"title\"", "\"\"");
    let doc: CompositionDocument = serde_json::from_str(&s).unwrap();
    assert!(doc.validate().is_err());
}
