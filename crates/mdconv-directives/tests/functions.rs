//! Builtin function table.

use mdconv_directives::{
    CORE_MODULE, FunctionContext, FunctionError, FunctionTable, LINEAGE_MODULE, ONTOLOGY_MODULE,
};
use mdconv_lineage::LineageConfig;
use mdconv_model::{Diagnostics, Document};
use serde_json::{Value, json};

fn call(name: &str, import: Option<&str>, args: &[Value]) -> Result<Value, FunctionError> {
    let table = FunctionTable::with_builtins();
    let function = table.lookup(name, import).unwrap();
    let document = Document::new();
    let lineage = LineageConfig::default();
    let mut diagnostics = Diagnostics::silenced();
    let mut context = FunctionContext {
        document: &document,
        record: None,
        calling: None,
        lineage: &lineage,
        diagnostics: &mut diagnostics,
    };
    function(&mut context, args)
}

#[test]
fn core_functions_need_no_import() {
    let table = FunctionTable::with_builtins();
    assert!(table.lookup("join", None).is_some());
    assert!(table.lookup("ontology_annotation", None).is_none());
    assert!(table.lookup("ontology_annotation", Some(ONTOLOGY_MODULE)).is_some());
    assert!(table.lookup("subject_sample_factors", Some(ONTOLOGY_MODULE)).is_none());
    assert_eq!(table.module_of("lineage"), Some(LINEAGE_MODULE));
    assert_eq!(table.module_of("record"), Some(CORE_MODULE));
    assert!(table.has_module(ONTOLOGY_MODULE));
    assert!(!table.has_module("os"));
}

#[test]
fn join_flattens_lists_and_drops_nulls() {
    let joined = call(
        "join",
        None,
        &[json!("; "), json!(["a", "b"]), Value::Null, json!(3)],
    )
    .unwrap();
    assert_eq!(joined, json!("a; b; 3"));
}

#[test]
fn split_trims_parts() {
    assert_eq!(
        call("split", None, &[json!("a, b ,c"), json!(",")]).unwrap(),
        json!(["a", "b", "c"])
    );
    assert!(matches!(
        call("split", None, &[json!("abc"), json!("")]),
        Err(FunctionError::InvalidArgument { index: 1, .. })
    ));
}

#[test]
fn to_number_accepts_integers_and_floats() {
    assert_eq!(call("to_number", None, &[json!(" 12 ")]).unwrap(), json!(12));
    assert_eq!(call("to_number", None, &[json!("2.5")]).unwrap(), json!(2.5));
    assert!(call("to_number", None, &[json!("twelve")]).is_err());
}

#[test]
fn object_pairs_keys_with_values() {
    assert_eq!(
        call(
            "object",
            None,
            &[json!("sources"), json!([]), json!("samples"), json!(["s1"])]
        )
        .unwrap(),
        json!({"sources": [], "samples": ["s1"]})
    );
    assert!(matches!(
        call("object", None, &[json!("sources")]),
        Err(FunctionError::Arity { found: 1, .. })
    ));
}

#[test]
fn parse_ontology_annotation_keeps_colons_in_the_accession() {
    let parsed = call(
        "parse_ontology_annotation",
        Some(ONTOLOGY_MODULE),
        &[json!("UO:UO:0000021:gram")],
    )
    .unwrap();
    assert_eq!(
        parsed,
        json!({"annotationValue": "gram", "termSource": "UO", "termAccession": "UO:0000021"})
    );

    let bare = call("parse_ontology_annotation", Some(ONTOLOGY_MODULE), &[json!("liver")]).unwrap();
    assert_eq!(
        bare,
        json!({"annotationValue": "liver", "termSource": "", "termAccession": ""})
    );
}

#[test]
fn arity_is_checked() {
    let error = call("upper", None, &[]).unwrap_err();
    assert_eq!(error.to_string(), "expected 1 argument(s), got 0");
}
