//! Tests for lineage resolution, factors and subject-sample-factor rows.

use mdconv_lineage::{
    DATA_FILES_STEP, LineageConfig, LineageError, LineageResolver, StepKind, extract_factors,
    load_factor_definitions, subject_sample_factors,
};
use mdconv_model::{Diagnostics, Document};
use serde_json::json;

fn study_document() -> Document {
    Document::from_value(json!({
        "protocol": {
            "mouse_tissue_collection": {"type": "collection"},
            "naive": {"type": "treatment"},
            "polar_extraction": {"type": "sample_prep"},
            "protein_extraction": {"type": "sample_prep"},
            "freezer": {"type": "storage", "description": "-80C"}
        },
        "entity": {
            "mouse1": {"type": "subject", "protocol.id": ["naive"], "species": "Mus musculus"},
            "tissue1": {
                "type": "sample",
                "parentID": "mouse1",
                "protocol.id": ["mouse_tissue_collection"],
                "tissue_type": "liver"
            },
            "tissue1-polar": {
                "type": "sample",
                "parentID": "tissue1",
                "protocol.id": ["polar_extraction", "freezer"],
                "raw_data": ["a.raw", "b.raw"]
            },
            "tissue1-protein": {
                "type": "sample",
                "parentID": "tissue1",
                "protocol.id": ["protein_extraction"]
            },
            "mouse2": {"type": "subject", "protocol.id": ["naive"]},
            "tissue2": {"type": "sample", "parentID": "mouse2", "tissue_type": "heart"}
        },
        "factor": {
            "Treatment": {"field": "protocol.id", "allowed_values": ["naive", "syngenic"]},
            "Tissue": {"field": "tissue_type", "allowed_values": ["liver", "heart"]},
            "Diet": {"field": "diet", "allowed_values": ["fasted"]}
        },
        "measurement": {
            "m1": {"entity.id": "tissue1-polar"},
            "m2": {"entity.id": "tissue2"}
        }
    }))
    .unwrap()
}

#[test]
fn ancestors_are_ordered_root_first() {
    let document = study_document();
    let config = LineageConfig::default();
    let resolver = LineageResolver::new(&document, &config);

    let lineage = resolver.resolve("tissue1-polar").unwrap();

    let ids: Vec<&str> = lineage.ancestors.iter().map(|record| record.id).collect();
    assert_eq!(ids, vec!["mouse1", "tissue1"]);
    assert_eq!(lineage.subject(&config).unwrap().id, "mouse1");
}

#[test]
fn siblings_match_the_configured_predicate() {
    let document = study_document();
    let config = LineageConfig::default();
    let resolver = LineageResolver::new(&document, &config);

    let lineage = resolver.resolve("tissue1-polar").unwrap();

    let siblings: Vec<&str> = lineage.siblings.iter().map(|record| record.id).collect();
    assert_eq!(siblings, vec!["tissue1-protein"]);

    let config = LineageConfig::default().with_sibling_predicate("protocol.id", "nothing");
    let resolver = LineageResolver::new(&document, &config);
    assert!(resolver.resolve("tissue1-polar").unwrap().siblings.is_empty());
}

#[test]
fn storage_protocol_appends_data_files_step() {
    let document = study_document();
    let config = LineageConfig::default();
    let resolver = LineageResolver::new(&document, &config);

    let steps = resolver.resolve("tissue1-polar").unwrap().steps();
    let last = steps.last().unwrap();

    assert_eq!(last.kind, StepKind::DataFiles);
    assert_eq!(last.id(), DATA_FILES_STEP);
    assert_eq!(last.record.id, "freezer");
}

#[test]
fn unknown_sample_is_a_named_error() {
    let document = study_document();
    let config = LineageConfig::default();
    let resolver = LineageResolver::new(&document, &config);

    let error = resolver.resolve("nope").unwrap_err();
    assert!(matches!(error, LineageError::UnknownEntity { ref id, .. } if id == "nope"));
}

#[test]
fn unresolved_parent_is_reported() {
    let document = Document::from_value(json!({
        "entity": {"s1": {"type": "sample", "parentID": "ghost"}}
    }))
    .unwrap();
    let config = LineageConfig::default();
    let resolver = LineageResolver::new(&document, &config);

    let error = resolver.resolve("s1").unwrap_err();
    assert!(matches!(
        error,
        LineageError::UnresolvedParent { ref id, ref parent, .. } if id == "s1" && parent == "ghost"
    ));
}

#[test]
fn cyclic_parent_chain_is_detected() {
    let document = Document::from_value(json!({
        "entity": {
            "a": {"type": "sample", "parentID": "b"},
            "b": {"type": "sample", "parentID": "c"},
            "c": {"type": "sample", "parentID": "a"}
        }
    }))
    .unwrap();
    let config = LineageConfig::default();
    let resolver = LineageResolver::new(&document, &config);

    let error = resolver.resolve("a").unwrap_err();
    match error {
        LineageError::CyclicLineage { sample, chain } => {
            assert_eq!(sample, "a");
            assert_eq!(chain, "a -> b -> c -> a");
        }
        other => panic!("expected cyclic lineage, got {other}"),
    }
}

#[test]
fn factors_keep_first_value_and_filter_lists() {
    let document = study_document();
    let config = LineageConfig::default();
    let resolver = LineageResolver::new(&document, &config);
    let definitions = load_factor_definitions(&document, &config).unwrap();

    let lineage = resolver.resolve("tissue1-polar").unwrap();
    let factors = extract_factors(&lineage, &definitions);

    assert_eq!(factors.get("Treatment"), Some(&json!(["naive"])));
    assert_eq!(factors.get("Tissue"), Some(&json!("liver")));
    assert!(!factors.contains_key("Diet"));
}

#[test]
fn invalid_factor_definition_is_rejected() {
    let document = Document::from_value(json!({
        "factor": {"Treatment": {"allowed_values": ["naive"]}}
    }))
    .unwrap();
    let error = load_factor_definitions(&document, &LineageConfig::default()).unwrap_err();
    assert!(matches!(error, LineageError::InvalidFactor { ref field, .. } if field == "field"));
}

#[test]
fn terminal_samples_follow_measurements() {
    let document = study_document();
    let config = LineageConfig::default();
    let resolver = LineageResolver::new(&document, &config);

    assert_eq!(
        resolver.terminal_samples().unwrap(),
        vec!["tissue1-polar", "tissue2"]
    );
}

#[test]
fn terminal_samples_fall_back_to_leaves() {
    let document = Document::from_value(json!({
        "entity": {
            "m": {"type": "subject"},
            "t": {"type": "sample", "parentID": "m"},
            "t-a": {"type": "sample", "parentID": "t"},
            "t-b": {"type": "sample", "parentID": "t"}
        }
    }))
    .unwrap();
    let config = LineageConfig::default();
    let resolver = LineageResolver::new(&document, &config);

    assert_eq!(resolver.terminal_samples().unwrap(), vec!["t-a", "t-b"]);
}

#[test]
fn subject_sample_factor_rows_and_warnings() {
    let document = study_document();
    let config = LineageConfig::default();
    let resolver = LineageResolver::new(&document, &config);
    let mut diagnostics = Diagnostics::silenced();

    let rows = subject_sample_factors(&resolver, &mut diagnostics).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["Subject ID"], json!("mouse1"));
    assert_eq!(rows[0]["Sample ID"], json!("tissue1-polar"));
    assert_eq!(
        rows[0]["Factors"],
        json!({"Treatment": "naive", "Tissue": "liver"})
    );
    let additional = &rows[0]["Additional sample data"];
    assert_eq!(additional["RAW_FILE_NAME"], json!("a.raw,b.raw"));
    assert_eq!(additional["lineage0_id"], json!("mouse1"));
    assert_eq!(additional["lineage1_tissue_type"], json!("liver"));
    assert_eq!(additional["lineage2_id"], json!("tissue1-protein"));
    assert_eq!(additional["lineage3_id"], json!("data_files"));
    assert_eq!(additional["lineage3_protocol.id"], json!("freezer"));
    assert!(additional.get("lineage1_parentID").is_none());

    // Diet is never observed; both samples carry Treatment and Tissue.
    let messages: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
    assert_eq!(messages.len(), 1, "{messages:?}");
    assert!(messages[0].contains("never observed"));
    assert!(messages[0].contains("Diet"));
}

#[test]
fn sample_missing_an_observed_factor_is_warned() {
    let document = Document::from_value(json!({
        "entity": {
            "m1": {"type": "subject", "diet": "fasted"},
            "s1": {"type": "sample", "parentID": "m1"},
            "m2": {"type": "subject"},
            "s2": {"type": "sample", "parentID": "m2"}
        },
        "factor": {"Diet": {"field": "diet", "allowed_values": ["fasted"]}}
    }))
    .unwrap();
    let config = LineageConfig::default();
    let resolver = LineageResolver::new(&document, &config);
    let mut diagnostics = Diagnostics::silenced();

    subject_sample_factors(&resolver, &mut diagnostics).unwrap();

    let warnings: Vec<_> = diagnostics.iter().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].record.as_deref(), Some("s2"));
    assert!(warnings[0].message.contains("Diet"));
}
