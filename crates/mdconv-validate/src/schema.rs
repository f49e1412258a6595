//! JSON Schemas describing the attributes of each directive kind.
//!
//! Cross-attribute rules (mutually exclusive computations, required
//! combinations) are checked in code so their messages can name the field.

use serde_json::{Value, json};

use crate::directives::ValueKind;

const COMMON_ATTRIBUTES: &[&str] = &["value_type", "required", "default"];

const STR_ATTRIBUTES: &[&str] = &[
    "table",
    "test",
    "record_id",
    "for_each",
    "sort_by",
    "sort_order",
    "code",
    "execute",
    "import",
    "override",
    "fields",
    "delimiter",
];

const MATRIX_ATTRIBUTES: &[&str] = &[
    "table",
    "test",
    "code",
    "import",
    "headers",
    "collate",
    "fields_to_headers",
    "exclusion_headers",
    "optional_headers",
    "values_to_str",
    "sort_by",
    "sort_order",
];

const SECTION_ATTRIBUTES: &[&str] = &[
    "table",
    "test",
    "record_id",
    "for_each",
    "code",
    "execute",
    "import",
];

/// Attributes a directive of `kind` may carry.
pub fn allowed_attributes(kind: ValueKind) -> impl Iterator<Item = &'static str> {
    let specific = match kind {
        ValueKind::Str => STR_ATTRIBUTES,
        ValueKind::Matrix => MATRIX_ATTRIBUTES,
        ValueKind::Section => SECTION_ATTRIBUTES,
    };
    COMMON_ATTRIBUTES.iter().chain(specific.iter()).copied()
}

fn attribute_schema(attribute: &str) -> Value {
    match attribute {
        "value_type" => json!({"enum": ["str", "matrix", "section"]}),
        "required" | "for_each" | "fields_to_headers" | "values_to_str" => {
            json!({"type": "boolean"})
        }
        "default" => json!({}),
        "table" | "collate" => json!({"type": "string", "minLength": 1}),
        "record_id" | "override" | "delimiter" => json!({"type": "string"}),
        "import" => json!({"type": "string", "pattern": "^[A-Za-z_][A-Za-z0-9_]*$"}),
        "test" => json!({
            "type": "string",
            "pattern": "^[^=]+=.*$"
        }),
        "code" => json!({
            "type": "string",
            "pattern": "^[A-Za-z_][A-Za-z0-9_]*$"
        }),
        "execute" => json!({
            "type": "string",
            "pattern": "^\\s*[A-Za-z_][A-Za-z0-9_]*\\s*\\(.*\\)\\s*$"
        }),
        "sort_order" => json!({"enum": ["ascending", "descending"]}),
        "sort_by" | "fields" => json!({
            "type": "array",
            "items": {"type": "string", "minLength": 1},
            "minItems": 1
        }),
        "headers" => json!({
            "type": "array",
            "items": {"type": "string", "pattern": "="},
            "minItems": 1
        }),
        "exclusion_headers" | "optional_headers" => json!({
            "type": "array",
            "items": {"type": "string"}
        }),
        _ => json!(false),
    }
}

/// The JSON Schema for one directive of `kind`.
pub fn directive_schema(kind: ValueKind) -> Value {
    let mut properties = serde_json::Map::new();
    for attribute in allowed_attributes(kind) {
        properties.insert(attribute.to_string(), attribute_schema(attribute));
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": ["value_type"],
        "additionalProperties": false
    })
}
