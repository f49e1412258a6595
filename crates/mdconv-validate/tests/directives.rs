//! Tests for directive document validation.

use mdconv_validate::{SchemaError, validate_against_schema, validate_directive_document};
use serde_json::json;

fn directive_issue(error: SchemaError) -> (String, String, Option<String>) {
    match error {
        SchemaError::Directive(issue) => (issue.table, issue.directive, issue.field),
        other => panic!("expected a directive issue, got {other}"),
    }
}

#[test]
fn boolean_like_strings_are_normalized() {
    let raw = json!({
        "PROJECT": {
            "PROJECT_TITLE": {
                "value_type": "str",
                "table": "project",
                "fields": ["title"],
                "required": "False",
                "for_each": "True",
                "sort_order": "Descending",
                "sort_by": "id"
            }
        }
    });

    let normalized = validate_directive_document(&raw).unwrap();
    let directive = &normalized["PROJECT"]["PROJECT_TITLE"];

    assert_eq!(directive["required"], json!(false));
    assert_eq!(directive["for_each"], json!(true));
    assert_eq!(directive["sort_order"], json!("descending"));
    assert_eq!(directive["sort_by"], json!(["id"]));
}

#[test]
fn unknown_bool_spelling_names_the_field() {
    let raw = json!({"T": {"d": {"value_type": "str", "override": "x", "required": "perhaps"}}});
    let (table, name, field) = directive_issue(validate_directive_document(&raw).unwrap_err());
    assert_eq!(
        (table.as_str(), name.as_str(), field.as_deref()),
        ("T", "d", Some("required"))
    );
}

#[test]
fn attribute_not_allowed_for_kind() {
    let raw = json!({"T": {"d": {"value_type": "section", "code": "identity", "headers": ["a=b"]}}});
    let (_, _, field) = directive_issue(validate_directive_document(&raw).unwrap_err());
    assert_eq!(field.as_deref(), Some("headers"));
}

#[test]
fn header_without_equals_is_rejected() {
    let raw = json!({"T": {"m": {
        "value_type": "matrix",
        "table": "entity",
        "headers": ["\"name\"=id", "broken"]
    }}});
    let error = validate_directive_document(&raw).unwrap_err();
    let message = error.to_string();
    let (_, name, field) = directive_issue(error);
    assert_eq!(name, "m");
    assert_eq!(field.as_deref(), Some("headers"));
    assert!(message.contains("conversion directive \"m\" in table \"T\""));
}

#[test]
fn test_filter_requires_equals() {
    let raw = json!({"T": {"d": {"value_type": "str", "table": "entity", "test": "type", "fields": ["id"]}}});
    let (_, _, field) = directive_issue(validate_directive_document(&raw).unwrap_err());
    assert_eq!(field.as_deref(), Some("test"));
}

#[test]
fn code_and_execute_are_exclusive() {
    let raw = json!({"T": {"s": {"value_type": "section", "code": "identity", "execute": "identity(\"x\")"}}});
    let (_, _, field) = directive_issue(validate_directive_document(&raw).unwrap_err());
    assert_eq!(field.as_deref(), Some("execute"));
}

#[test]
fn str_needs_a_computation() {
    let raw = json!({"T": {"d": {"value_type": "str", "table": "entity"}}});
    let (_, _, field) = directive_issue(validate_directive_document(&raw).unwrap_err());
    assert_eq!(field.as_deref(), Some("fields"));
}

#[test]
fn missing_value_type_is_reported() {
    let raw = json!({"T": {"d": {"fields": ["id"]}}});
    let (_, _, field) = directive_issue(validate_directive_document(&raw).unwrap_err());
    assert_eq!(field.as_deref(), Some("value_type"));
}

#[test]
fn section_with_siblings_is_rejected() {
    let raw = json!({"investigation": {
        "root": {"value_type": "section", "code": "identity"},
        "title": {"value_type": "str", "override": "x"}
    }});
    let error = validate_directive_document(&raw).unwrap_err();
    assert!(matches!(
        error,
        SchemaError::MixedSection { ref table, ref section, ref others }
            if table == "investigation" && section == "root" && others == "title"
    ));
}

#[test]
fn section_may_share_table_with_nested_directives() {
    let raw = json!({"investigation": {
        "root": {"value_type": "section", "execute": "identity(helper())"},
        "helper()": {"value_type": "str", "override": "x"}
    }});
    assert!(validate_directive_document(&raw).is_ok());
}

#[test]
fn generic_schema_validation_reports_paths() {
    let schema = json!({
        "type": "object",
        "required": ["PROJECT"],
        "properties": {"PROJECT": {"type": "object"}}
    });
    let violations = validate_against_schema(&json!({"PROJECT": []}), &schema).unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].instance_path, "/PROJECT");

    let violations = validate_against_schema(&json!({"PROJECT": {}}), &schema).unwrap();
    assert!(violations.is_empty());
}
