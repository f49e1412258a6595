//! Normalization and validation of raw conversion directive documents.
//!
//! A directive document maps conversion table → directive name → attributes.
//! Validation runs in three passes per directive: boolean-like strings are
//! normalized, the attributes are checked against the JSON Schema for the
//! directive's `value_type`, and cross-attribute rules are applied. The first
//! problem found halts validation.

use std::fmt;

use jsonschema::Validator;
use mdconv_model::parse_bool_like;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DirectiveIssue, SchemaError};
use crate::schema::{allowed_attributes, directive_schema};

/// Suffix marking a directive as nested (only callable from another directive).
pub const NESTED_MARKER: &str = "()";

const BOOL_ATTRIBUTES: &[&str] = &["required", "for_each", "fields_to_headers", "values_to_str"];

/// Returns true if `name` declares a nested directive.
pub fn is_nested_name(name: &str) -> bool {
    name.len() > NESTED_MARKER.len() && name.ends_with(NESTED_MARKER)
}

/// The three directive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Str,
    Matrix,
    Section,
}

impl ValueKind {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "str" => Some(Self::Str),
            "matrix" => Some(Self::Matrix),
            "section" => Some(Self::Section),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Matrix => "matrix",
            Self::Section => "section",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct KindValidators {
    str_kind: Validator,
    matrix: Validator,
    section: Validator,
}

impl KindValidators {
    fn new() -> Result<Self, SchemaError> {
        let build = |kind| {
            jsonschema::validator_for(&directive_schema(kind))
                .map_err(|error| SchemaError::InvalidSchema(error.to_string()))
        };
        Ok(Self {
            str_kind: build(ValueKind::Str)?,
            matrix: build(ValueKind::Matrix)?,
            section: build(ValueKind::Section)?,
        })
    }

    fn get(&self, kind: ValueKind) -> &Validator {
        match kind {
            ValueKind::Str => &self.str_kind,
            ValueKind::Matrix => &self.matrix,
            ValueKind::Section => &self.section,
        }
    }
}

/// Validate a raw directive document and return its normalized form.
///
/// # Errors
///
/// Returns the first [`SchemaError`] found; directive problems name the
/// conversion table, directive and attribute.
pub fn validate_directive_document(raw: &Value) -> Result<Value, SchemaError> {
    let Value::Object(tables) = raw else {
        return Err(SchemaError::NotAnObject);
    };
    let validators = KindValidators::new()?;
    let mut normalized = Map::new();
    let mut directive_count = 0usize;
    for (table, directives) in tables {
        let Value::Object(directives) = directives else {
            return Err(SchemaError::InvalidTable {
                table: table.clone(),
            });
        };
        let mut validated = Map::new();
        for (name, attributes) in directives {
            let Value::Object(attributes) = attributes else {
                return Err(issue(
                    table,
                    name,
                    None,
                    "directive attributes must be a JSON object",
                ));
            };
            let attributes = normalize_attributes(table, name, attributes.clone())?;
            let kind = value_kind(table, name, &attributes)?;
            check_known_attributes(table, name, kind, &attributes)?;
            let instance = Value::Object(attributes.clone());
            if let Some(error) = validators.get(kind).iter_errors(&instance).next() {
                let path = error.instance_path.to_string();
                let field = path.trim_start_matches('/').split('/').next().unwrap_or("");
                let field = (!field.is_empty()).then_some(field);
                return Err(issue(table, name, field, error.to_string()));
            }
            check_cross_attributes(table, name, kind, &attributes)?;
            validated.insert(name.clone(), Value::Object(attributes));
            directive_count += 1;
        }
        check_section_exclusivity(table, &validated)?;
        normalized.insert(table.clone(), Value::Object(validated));
    }
    debug!(
        table_count = normalized.len(),
        directive_count, "validated conversion directives"
    );
    Ok(Value::Object(normalized))
}

fn issue(table: &str, name: &str, field: Option<&str>, message: impl Into<String>) -> SchemaError {
    SchemaError::Directive(DirectiveIssue::new(table, name, field, message))
}

fn normalize_attributes(
    table: &str,
    name: &str,
    mut attributes: Map<String, Value>,
) -> Result<Map<String, Value>, SchemaError> {
    for attribute in BOOL_ATTRIBUTES {
        let Some(Value::String(text)) = attributes.get(*attribute) else {
            continue;
        };
        let Some(flag) = parse_bool_like(text) else {
            return Err(issue(
                table,
                name,
                Some(*attribute),
                format!("\"{text}\" is not a boolean-like value (expected true or false)"),
            ));
        };
        attributes.insert((*attribute).to_string(), Value::Bool(flag));
    }
    if let Some(Value::String(order)) = attributes.get("sort_order") {
        let order = order.trim().to_ascii_lowercase();
        attributes.insert("sort_order".to_string(), Value::String(order));
    }
    if let Some(Value::String(key)) = attributes.get("sort_by") {
        let keys = key
            .split(',')
            .map(|part| Value::String(part.trim().to_string()))
            .collect();
        attributes.insert("sort_by".to_string(), Value::Array(keys));
    }
    Ok(attributes)
}

fn value_kind(
    table: &str,
    name: &str,
    attributes: &Map<String, Value>,
) -> Result<ValueKind, SchemaError> {
    match attributes.get("value_type") {
        None => Err(issue(
            table,
            name,
            Some("value_type"),
            "missing required attribute",
        )),
        Some(Value::String(text)) => ValueKind::parse(text).ok_or_else(|| {
            issue(
                table,
                name,
                Some("value_type"),
                format!("unknown value type \"{text}\" (expected str, matrix or section)"),
            )
        }),
        Some(other) => Err(issue(
            table,
            name,
            Some("value_type"),
            format!("expected a string, found {other}"),
        )),
    }
}

fn check_known_attributes(
    table: &str,
    name: &str,
    kind: ValueKind,
    attributes: &Map<String, Value>,
) -> Result<(), SchemaError> {
    for key in attributes.keys() {
        if !allowed_attributes(kind).any(|allowed| allowed == key.as_str()) {
            return Err(issue(
                table,
                name,
                Some(key.as_str()),
                format!("attribute is not allowed for {kind} directives"),
            ));
        }
    }
    Ok(())
}

fn check_cross_attributes(
    table: &str,
    name: &str,
    kind: ValueKind,
    attributes: &Map<String, Value>,
) -> Result<(), SchemaError> {
    let has = |key: &str| attributes.contains_key(key);
    let enabled = |key: &str| matches!(attributes.get(key), Some(Value::Bool(true)));

    if has("code") && has("execute") {
        return Err(issue(
            table,
            name,
            Some("execute"),
            "\"code\" and \"execute\" are mutually exclusive",
        ));
    }
    if has("import") && !has("code") && !has("execute") {
        return Err(issue(
            table,
            name,
            Some("import"),
            "\"import\" is only meaningful together with \"code\" or \"execute\"",
        ));
    }
    for selector in ["record_id", "test"] {
        if has(selector) && !has("table") {
            return Err(issue(
                table,
                name,
                Some(selector),
                format!("\"{selector}\" requires \"table\""),
            ));
        }
    }
    if enabled("for_each") && !has("table") {
        return Err(issue(
            table,
            name,
            Some("for_each"),
            "\"for_each\" requires \"table\"",
        ));
    }
    match kind {
        ValueKind::Str => {
            if !["override", "code", "execute", "fields"]
                .iter()
                .any(|key| has(key))
            {
                return Err(issue(
                    table,
                    name,
                    Some("fields"),
                    "a str directive needs one of \"override\", \"code\", \"execute\" or \"fields\"",
                ));
            }
        }
        ValueKind::Matrix => {
            if !has("code") {
                if !has("table") {
                    return Err(issue(
                        table,
                        name,
                        Some("table"),
                        "a matrix directive without \"code\" needs a source \"table\"",
                    ));
                }
                if !has("headers") && !enabled("fields_to_headers") {
                    return Err(issue(
                        table,
                        name,
                        Some("headers"),
                        "a matrix directive needs \"headers\" or \"fields_to_headers\"",
                    ));
                }
            }
        }
        ValueKind::Section => {
            if !has("code") && !has("execute") {
                return Err(issue(
                    table,
                    name,
                    Some("execute"),
                    "a section directive needs \"code\" or \"execute\"",
                ));
            }
        }
    }
    Ok(())
}

fn check_section_exclusivity(
    table: &str,
    directives: &Map<String, Value>,
) -> Result<(), SchemaError> {
    let top_level: Vec<(&String, &Value)> = directives
        .iter()
        .filter(|(name, _)| !is_nested_name(name))
        .collect();
    let section = top_level
        .iter()
        .find(|(_, attributes)| attributes.get("value_type") == Some(&Value::from("section")));
    if let Some((section, _)) = section
        && top_level.len() > 1
    {
        let others: Vec<&str> = top_level
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| *name != section.as_str())
            .collect();
        return Err(SchemaError::MixedSection {
            table: table.to_string(),
            section: (*section).clone(),
            others: others.join(", "),
        });
    }
    Ok(())
}
