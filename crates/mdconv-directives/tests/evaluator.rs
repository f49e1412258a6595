//! Evaluation behaviour of str, matrix and section directives.

use mdconv_directives::{
    Capabilities, Conversion, DirectiveError, Evaluator, Registry, ResolveError,
};
use mdconv_model::{Diagnostics, Document};
use serde_json::{Value, json};

fn convert(directives: Value, document: Value) -> Result<Conversion, DirectiveError> {
    let registry = Registry::from_value(&directives)?;
    let document = Document::from_value(document).unwrap();
    let capabilities = Capabilities::default();
    Evaluator::with_diagnostics(&registry, &document, &capabilities, Diagnostics::silenced())?
        .run()
}

fn output(conversion: &Conversion, name: &str) -> Option<Value> {
    conversion
        .outputs
        .iter()
        .find(|output| output.key.name == name)
        .map(|output| output.value.clone())
}

fn entities() -> Value {
    json!({
        "entity": {
            "s1": {"type": "sample", "parentID": "m1", "weight": 10},
            "s2": {"type": "sample", "parentID": "m1", "weight": 30},
            "s3": {"type": "sample", "parentID": "m2", "weight": 20},
            "m1": {"type": "subject"},
            "m2": {"type": "subject"}
        },
        "factor": {
            "Treatment": {"field": "protocol.id", "allowed_values": ["naive"]},
            "Diet": {"field": "diet", "allowed_values": ["fasted"]},
            "Tissue": {"field": "tissue", "allowed_values": ["liver"]}
        }
    })
}

#[test]
fn measurement_id_is_selected_by_test() {
    let conversion = convert(
        json!({
            "MS": {
                "ID": {
                    "value_type": "str",
                    "table": "measurement",
                    "test": "type=measurement",
                    "fields": ["id"]
                }
            }
        }),
        json!({
            "measurement": {
                "ICMS1": {
                    "id": "ICMS1",
                    "parentID": "Chromatography_MS_measurement",
                    "type": "measurement"
                }
            }
        }),
    )
    .unwrap();

    assert_eq!(output(&conversion, "ID"), Some(json!("ICMS1")));
    assert!(conversion.diagnostics.is_empty());
}

#[test]
fn for_each_concatenates_factor_ids_in_order() {
    let conversion = convert(
        json!({
            "STUDY": {
                "factors": {
                    "value_type": "str",
                    "table": "factor",
                    "for_each": "True",
                    "fields": ["id"],
                    "delimiter": ""
                }
            }
        }),
        entities(),
    )
    .unwrap();

    assert_eq!(
        output(&conversion, "factors"),
        Some(json!("TreatmentDietTissue"))
    );
}

#[test]
fn for_each_sorts_before_joining() {
    let conversion = convert(
        json!({
            "STUDY": {
                "samples": {
                    "value_type": "str",
                    "table": "entity",
                    "test": "type=sample",
                    "for_each": true,
                    "fields": ["id"],
                    "delimiter": ",",
                    "sort_by": "weight",
                    "sort_order": "Descending"
                }
            }
        }),
        entities(),
    )
    .unwrap();

    assert_eq!(output(&conversion, "samples"), Some(json!("s2,s3,s1")));
}

#[test]
fn override_wins_over_fields() {
    let conversion = convert(
        json!({
            "STUDY": {
                "name": {
                    "value_type": "str",
                    "override": "fixed",
                    "table": "entity",
                    "fields": ["id"]
                }
            }
        }),
        entities(),
    )
    .unwrap();

    assert_eq!(output(&conversion, "name"), Some(json!("fixed")));
}

#[test]
fn missing_token_is_skipped_when_not_required() {
    let conversion = convert(
        json!({
            "STUDY": {
                "label": {
                    "value_type": "str",
                    "table": "entity",
                    "fields": ["\"x-\"", "missing", "id"],
                    "required": "false"
                }
            }
        }),
        entities(),
    )
    .unwrap();

    assert_eq!(output(&conversion, "label"), Some(json!("x-s1")));
    let warnings: Vec<_> = conversion.diagnostics.iter().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].record.as_deref(), Some("s1"));
    assert!(warnings[0].message.contains("missing"));
}

#[test]
fn missing_token_is_fatal_when_required() {
    let error = convert(
        json!({
            "STUDY": {
                "label": {
                    "value_type": "str",
                    "table": "entity",
                    "fields": ["\"x-\"", "missing"]
                }
            }
        }),
        entities(),
    )
    .unwrap_err();

    match error {
        DirectiveError::Resolve { directive, source } => {
            assert_eq!(directive.name, "label");
            assert_eq!(directive.table, "STUDY");
            assert!(matches!(
                source,
                ResolveError::MissingField { ref field, .. } if field == "missing"
            ));
        }
        other => panic!("expected a resolve error, got {other}"),
    }
}

#[test]
fn selection_miss_is_omitted_or_defaulted() {
    let directives = |default: Option<&str>| {
        let mut attributes = json!({
            "value_type": "str",
            "table": "entity",
            "record_id": "ghost",
            "fields": ["id"],
            "required": "no"
        });
        if let Some(default) = default {
            attributes["default"] = json!(default);
        }
        json!({"STUDY": {"ghost": attributes}})
    };

    let omitted = convert(directives(None), entities()).unwrap();
    assert!(output(&omitted, "ghost").is_none());
    assert_eq!(omitted.diagnostics.len(), 1);

    let defaulted = convert(directives(Some("n/a")), entities()).unwrap();
    assert_eq!(output(&defaulted, "ghost"), Some(json!("n/a")));
    assert!(defaulted.diagnostics.is_empty());
}

#[test]
fn required_selection_miss_is_fatal() {
    let error = convert(
        json!({
            "STUDY": {
                "ghost": {
                    "value_type": "str",
                    "table": "entity",
                    "test": "type=plant",
                    "fields": ["id"]
                }
            }
        }),
        entities(),
    )
    .unwrap_err();

    assert!(matches!(error, DirectiveError::NoMatchingRecords { .. }));
    assert!(error.to_string().contains("type=plant"));
}

#[test]
fn nested_str_builds_prefixed_header_values() {
    let conversion = convert(
        json!({
            "ISA": {
                "sample_ref()": {
                    "value_type": "str",
                    "fields": ["\"#sample/\"", "^.id"]
                },
                "samples": {
                    "value_type": "matrix",
                    "table": "entity",
                    "test": "type=sample",
                    "headers": ["\"@id\"=sample_ref()", "\"name\"=id"]
                }
            }
        }),
        entities(),
    )
    .unwrap();

    assert_eq!(conversion.outputs.len(), 1);
    assert_eq!(
        output(&conversion, "samples"),
        Some(json!([
            {"@id": "#sample/s1", "name": "s1"},
            {"@id": "#sample/s2", "name": "s2"},
            {"@id": "#sample/s3", "name": "s3"}
        ]))
    );
}

#[test]
fn nested_matrix_filters_on_calling_record() {
    let conversion = convert(
        json!({
            "ISA": {
                "children()": {
                    "value_type": "matrix",
                    "table": "entity",
                    "test": "parentID=^.id",
                    "headers": ["\"@id\"=id"]
                },
                "subjects": {
                    "value_type": "matrix",
                    "table": "entity",
                    "test": "type=subject",
                    "headers": ["\"name\"=id", "\"derivesTo\"=children()"]
                }
            }
        }),
        entities(),
    )
    .unwrap();

    assert_eq!(
        output(&conversion, "subjects"),
        Some(json!([
            {"name": "m1", "derivesTo": [{"@id": "s1"}, {"@id": "s2"}]},
            {"name": "m2", "derivesTo": [{"@id": "s3"}]}
        ]))
    );
}

#[test]
fn cyclic_nested_directives_are_fatal() {
    let error = convert(
        json!({
            "T": {
                "a()": {"value_type": "str", "fields": ["b()"]},
                "b()": {"value_type": "str", "fields": ["a()"], "required": false},
                "top": {"value_type": "str", "fields": ["a()"], "required": false}
            }
        }),
        entities(),
    )
    .unwrap_err();

    match error {
        DirectiveError::CyclicDirective { chain } => {
            assert_eq!(chain, "T.a() -> T.b() -> T.a()");
        }
        other => panic!("expected a cyclic directive error, got {other}"),
    }
}

#[test]
fn matrix_collate_merges_groups_and_warns_once_per_key() {
    let conversion = convert(
        json!({
            "MS": {
                "rows": {
                    "value_type": "matrix",
                    "table": "measurement",
                    "collate": "sample",
                    "headers": ["\"Sample\"=sample", "\"intensity\"=intensity"]
                }
            }
        }),
        json!({
            "measurement": {
                "r1": {"sample": "s1", "intensity": 1},
                "r2": {"sample": "s1", "intensity": 2},
                "r3": {"sample": "s2", "intensity": 3},
                "r4": {"sample": "s1", "intensity": 4}
            }
        }),
    )
    .unwrap();

    assert_eq!(
        output(&conversion, "rows"),
        Some(json!([
            {"Sample": "s1", "intensity": 4},
            {"Sample": "s2", "intensity": 3}
        ]))
    );
    let warnings: Vec<_> = conversion.diagnostics.iter().collect();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].message.contains("intensity"));
}

#[test]
fn fields_to_headers_overwrites_headers_and_honours_exclusions() {
    let conversion = convert(
        json!({
            "MS": {
                "rows": {
                    "value_type": "matrix",
                    "table": "measurement",
                    "headers": ["\"unit\"=\"ppm\""],
                    "fields_to_headers": "true",
                    "exclusion_headers": ["id"]
                }
            }
        }),
        json!({
            "measurement": {
                "r1": {"unit": "mM", "value": 1.5}
            }
        }),
    )
    .unwrap();

    assert_eq!(
        output(&conversion, "rows"),
        Some(json!([{"unit": "mM", "value": 1.5}]))
    );
    let warnings: Vec<_> = conversion.diagnostics.iter().collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("unit"));
}

#[test]
fn optional_headers_and_values_to_str() {
    let conversion = convert(
        json!({
            "MS": {
                "rows": {
                    "value_type": "matrix",
                    "table": "measurement",
                    "headers": ["\"id\"=id", "\"value\"=value"],
                    "optional_headers": ["note"],
                    "values_to_str": true,
                    "sort_by": ["value"]
                }
            }
        }),
        json!({
            "measurement": {
                "r1": {"value": 10},
                "r2": {"value": 9, "note": "low"}
            }
        }),
    )
    .unwrap();

    assert_eq!(
        output(&conversion, "rows"),
        Some(json!([
            {"id": "r2", "value": "9", "note": "low"},
            {"id": "r1", "value": "10"}
        ]))
    );
}

#[test]
fn matrix_row_without_sort_key_is_an_error() {
    let error = convert(
        json!({
            "MS": {
                "rows": {
                    "value_type": "matrix",
                    "table": "measurement",
                    "headers": ["\"id\"=id"],
                    "optional_headers": ["note"],
                    "sort_by": "note",
                    "sort_order": "Descending"
                }
            }
        }),
        json!({
            "measurement": {
                "r1": {"value": 10},
                "r2": {"value": 9, "note": "low"}
            }
        }),
    )
    .unwrap_err();

    match error {
        DirectiveError::SortKeyMissing { item, key, .. } => {
            assert_eq!(item, "row 0");
            assert_eq!(key, "note");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn duplicate_header_keys_warn_and_last_wins() {
    let conversion = convert(
        json!({
            "MS": {
                "rows": {
                    "value_type": "matrix",
                    "table": "measurement",
                    "headers": ["\"v\"=first", "\"v\"=second"]
                }
            }
        }),
        json!({"measurement": {"r1": {"first": 1, "second": 2}}}),
    )
    .unwrap();

    assert_eq!(output(&conversion, "rows"), Some(json!([{"v": 2}])));
    let warnings: Vec<_> = conversion.diagnostics.iter().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].directive.as_deref(), Some("rows"));
}

#[test]
fn non_string_header_key_is_cast_with_warning() {
    let conversion = convert(
        json!({
            "MS": {
                "rows": {
                    "value_type": "matrix",
                    "table": "measurement",
                    "headers": ["position=value"]
                }
            }
        }),
        json!({"measurement": {"r1": {"position": 3, "value": "x"}}}),
    )
    .unwrap();

    assert_eq!(output(&conversion, "rows"), Some(json!([{"3": "x"}])));
    let warnings: Vec<_> = conversion.diagnostics.iter().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].record.as_deref(), Some("r1"));
    assert_eq!(warnings[0].source_table.as_deref(), Some("measurement"));
}

#[test]
fn section_execute_calls_imported_function() {
    let conversion = convert(
        json!({
            "unit": {
                "annotation": {
                    "value_type": "section",
                    "table": "protocol",
                    "record_id": "p1",
                    "execute": "ontology_annotation(unit, \"UO\", accession)",
                    "import": "ontology"
                }
            }
        }),
        json!({"protocol": {"p1": {"unit": "gram", "accession": "UO:0000021"}}}),
    )
    .unwrap();

    assert_eq!(
        output(&conversion, "annotation"),
        Some(json!({
            "annotationValue": "gram",
            "termSource": "UO",
            "termAccession": "UO:0000021"
        }))
    );
}

#[test]
fn function_outside_imported_modules_is_rejected() {
    let error = convert(
        json!({
            "unit": {
                "annotation": {
                    "value_type": "section",
                    "execute": "ontology_annotation(\"g\", \"UO\", \"x\")"
                }
            }
        }),
        entities(),
    )
    .unwrap_err();

    assert!(matches!(
        error,
        DirectiveError::UnknownFunction { ref function, .. } if function == "ontology_annotation"
    ));
    assert!(error.to_string().contains("import"));
}

#[test]
fn unknown_import_module_is_rejected() {
    let error = convert(
        json!({
            "T": {"x": {"value_type": "section", "code": "list", "import": "shell"}}
        }),
        entities(),
    )
    .unwrap_err();

    assert!(matches!(error, DirectiveError::UnknownModule { ref module, .. } if module == "shell"));
}

#[test]
fn str_code_must_return_a_string_even_when_optional() {
    let error = convert(
        json!({
            "T": {"x": {"value_type": "str", "code": "list", "required": false}}
        }),
        entities(),
    )
    .unwrap_err();

    assert!(matches!(error, DirectiveError::TypeMismatch { .. }));
}

#[test]
fn subject_sample_factors_through_the_lineage_module() {
    let conversion = convert(
        json!({
            "SUBJECT_SAMPLE_FACTORS": {
                "rows": {
                    "value_type": "matrix",
                    "code": "subject_sample_factors",
                    "import": "lineage"
                }
            }
        }),
        json!({
            "entity": {
                "m1": {"type": "subject", "diet": "fasted"},
                "s1": {"type": "sample", "parentID": "m1"}
            },
            "factor": {"Diet": {"field": "diet", "allowed_values": ["fasted"]}}
        }),
    )
    .unwrap();

    let rows = output(&conversion, "rows").unwrap();
    assert_eq!(rows[0]["Subject ID"], json!("m1"));
    assert_eq!(rows[0]["Sample ID"], json!("s1"));
    assert_eq!(rows[0]["Factors"], json!({"Diet": "fasted"}));
}

#[test]
fn lineage_errors_are_fatal_even_when_optional() {
    let error = convert(
        json!({
            "T": {
                "subject": {
                    "value_type": "str",
                    "execute": "subject_id(\"ghost\")",
                    "import": "lineage",
                    "required": false
                }
            }
        }),
        entities(),
    )
    .unwrap_err();

    assert!(matches!(error, DirectiveError::FunctionFailed { .. }));
    assert!(error.is_always_fatal());
}

fn label_with_failing_suffix(required: &str) -> Value {
    json!({
        "STUDY": {
            "suffix()": {
                "value_type": "str",
                "table": "entity",
                "record_id": "does-not-exist",
                "required": "False",
                "fields": ["id"]
            },
            "label": {
                "value_type": "str",
                "required": required,
                "fields": ["\"prefix-\"", "suffix()"]
            }
        }
    })
}

#[test]
fn failed_nested_call_omits_the_whole_str() {
    let conversion = convert(label_with_failing_suffix("False"), entities()).unwrap();

    assert_eq!(output(&conversion, "label"), None);
    let warnings: Vec<_> = conversion.diagnostics.iter().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].directive.as_deref(), Some("label"));
    assert!(warnings[0].message.contains("does-not-exist"));
}

#[test]
fn failed_nested_call_is_fatal_for_a_required_str() {
    let error = convert(label_with_failing_suffix("True"), entities()).unwrap_err();

    assert!(matches!(
        error,
        DirectiveError::RecordNotFound { ref record, .. } if record == "does-not-exist"
    ));
}

#[test]
fn nested_default_stands_in_for_a_selection_miss() {
    let mut directives = label_with_failing_suffix("True");
    directives["STUDY"]["suffix()"]["default"] = json!("none");

    let conversion = convert(directives, entities()).unwrap();

    assert_eq!(output(&conversion, "label"), Some(json!("prefix-none")));
    assert!(conversion.diagnostics.is_empty());
}

#[test]
fn section_for_each_collects_one_value_per_record() {
    let conversion = convert(
        json!({
            "SAMPLES": {
                "names": {
                    "value_type": "section",
                    "table": "entity",
                    "test": "type=sample",
                    "for_each": "True",
                    "execute": "upper(id)"
                }
            }
        }),
        entities(),
    )
    .unwrap();

    assert_eq!(output(&conversion, "names"), Some(json!(["S1", "S2", "S3"])));
}

#[test]
fn section_without_for_each_uses_the_first_match() {
    let conversion = convert(
        json!({
            "SUBJECT": {
                "first": {
                    "value_type": "section",
                    "table": "entity",
                    "test": "type=subject",
                    "execute": "identity(id)"
                }
            }
        }),
        entities(),
    )
    .unwrap();

    assert_eq!(output(&conversion, "first"), Some(json!("m1")));
}

#[test]
fn optional_builtin_failure_is_warned_and_omitted() {
    let conversion = convert(
        json!({
            "T": {
                "amount": {
                    "value_type": "section",
                    "table": "entity",
                    "record_id": "s1",
                    "execute": "to_number(type)",
                    "required": "False"
                }
            }
        }),
        entities(),
    )
    .unwrap();

    assert_eq!(output(&conversion, "amount"), None);
    assert_eq!(conversion.diagnostics.warning_count(), 1);
    let warning = conversion.diagnostics.iter().next().unwrap();
    assert_eq!(warning.directive.as_deref(), Some("amount"));
    assert!(warning.message.contains("not a number"));
}

#[test]
fn calling_attribute_without_a_caller_is_an_error() {
    let error = convert(
        json!({
            "STUDY": {
                "parent": {"value_type": "str", "table": "entity", "fields": ["^.id"]}
            }
        }),
        entities(),
    )
    .unwrap_err();

    assert!(matches!(
        error,
        DirectiveError::Resolve {
            source: ResolveError::NoCallingRecord { .. },
            ..
        }
    ));
}

#[test]
fn non_string_object_key_is_cast_with_warning() {
    let conversion = convert(
        json!({
            "T": {
                "by_weight": {
                    "value_type": "section",
                    "table": "entity",
                    "record_id": "s1",
                    "execute": "object(weight, \"x\")"
                }
            }
        }),
        entities(),
    )
    .unwrap();

    assert_eq!(output(&conversion, "by_weight"), Some(json!({"10": "x"})));
    assert_eq!(conversion.diagnostics.warning_count(), 1);
    let warning = conversion.diagnostics.iter().next().unwrap();
    assert_eq!(warning.record.as_deref(), Some("s1"));
    assert_eq!(warning.source_table.as_deref(), Some("entity"));
    assert!(warning.message.contains("cast to the string \"10\""));
}
