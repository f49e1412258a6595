//! Resolution of single tokens against the current and calling records.

use std::borrow::Cow;

use mdconv_model::{RecordRef, scalar_text, value_matches};
use serde_json::Value;

use crate::error::ResolveError;
use crate::token::{NestedRef, TestExpr, TestValue, Token};

/// Records visible while a directive evaluates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    /// Record selected by the directive itself.
    pub record: Option<RecordRef<'a>>,
    /// Record of the directive that called this nested directive.
    pub calling: Option<RecordRef<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new(record: Option<RecordRef<'a>>, calling: Option<RecordRef<'a>>) -> Self {
        Self { record, calling }
    }
}

/// Outcome of resolving one token.
#[derive(Debug)]
pub enum Resolved<'a, 't> {
    Value(Cow<'a, Value>),
    /// A nested directive call, left to the evaluator.
    Nested(&'t NestedRef),
}

fn calling_attribute<'a>(attribute: &str, scope: Scope<'a>) -> Result<&'a Value, ResolveError> {
    let calling = scope.calling.ok_or_else(|| ResolveError::NoCallingRecord {
        attribute: attribute.to_string(),
    })?;
    calling
        .get(attribute)
        .ok_or_else(|| ResolveError::MissingCallingAttribute {
            record: calling.id.to_string(),
            source_table: calling.table.to_string(),
            attribute: attribute.to_string(),
        })
}

/// Resolve `token` in `scope`.
///
/// Literals resolve to themselves and never touch a record; fields read the
/// current record; `^.attr` reads the calling record.
pub fn resolve_token<'a, 't>(
    token: &'t Token,
    scope: Scope<'a>,
) -> Result<Resolved<'a, 't>, ResolveError> {
    match token {
        Token::Literal(text) => Ok(Resolved::Value(Cow::Owned(Value::String(text.clone())))),
        Token::CallingAttribute(attribute) => {
            calling_attribute(attribute, scope).map(|value| Resolved::Value(Cow::Borrowed(value)))
        }
        Token::Nested(reference) => Ok(Resolved::Nested(reference)),
        Token::Field(field) => {
            let record = scope.record.ok_or_else(|| ResolveError::NoCurrentRecord {
                field: field.clone(),
            })?;
            record
                .get(field)
                .map(|value| Resolved::Value(Cow::Borrowed(value)))
                .ok_or_else(|| ResolveError::MissingField {
                    record: record.id.to_string(),
                    source_table: record.table.to_string(),
                    field: field.clone(),
                })
        }
    }
}

/// Whether `record` passes `test`.
///
/// A record without the tested field never matches. List fields match when
/// any element does, and so do list-valued calling attributes.
pub fn test_matches(
    test: &TestExpr,
    record: &RecordRef<'_>,
    calling: Option<RecordRef<'_>>,
) -> Result<bool, ResolveError> {
    let Some(actual) = record.get(&test.field) else {
        return Ok(false);
    };
    match &test.value {
        TestValue::Literal(expected) => Ok(value_matches(actual, expected)),
        TestValue::CallingAttribute(attribute) => {
            let scope = Scope::new(None, calling);
            let expected = calling_attribute(attribute, scope)?;
            Ok(match expected {
                Value::Array(items) => items
                    .iter()
                    .any(|item| value_matches(actual, &scalar_text(item))),
                other => value_matches(actual, &scalar_text(other)),
            })
        }
    }
}
