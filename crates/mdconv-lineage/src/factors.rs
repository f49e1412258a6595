//! Factor definitions and their extraction along a lineage.

use indexmap::IndexMap;
use mdconv_model::{Document, scalar_text};
use serde_json::Value;

use crate::config::LineageConfig;
use crate::error::LineageError;
use crate::resolver::Lineage;

const FIELD_ATTRIBUTE: &str = "field";
const ALLOWED_ATTRIBUTE: &str = "allowed_values";

/// A controlled-vocabulary factor read from the factor table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorDefinition {
    /// Factor name (the factor record id).
    pub name: String,
    /// Field the factor constrains; dotted paths reach into nested mappings.
    pub field: String,
    pub allowed_values: Vec<String>,
}

impl FactorDefinition {
    fn allows(&self, value: &Value) -> bool {
        let text = scalar_text(value);
        self.allowed_values.iter().any(|allowed| *allowed == text)
    }

    /// The part of `value` this factor accepts, if any.
    ///
    /// Scalars are accepted whole; lists are filtered down to their allowed
    /// elements and accepted when something remains.
    fn accept(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Null | Value::Object(_) => None,
            Value::Array(items) => {
                let subset: Vec<Value> = items
                    .iter()
                    .filter(|item| self.allows(item))
                    .cloned()
                    .collect();
                (!subset.is_empty()).then_some(Value::Array(subset))
            }
            scalar => self.allows(scalar).then(|| scalar.clone()),
        }
    }
}

/// Factor name → first value found along a lineage.
pub type FactorValues = IndexMap<String, Value>;

/// Read every factor definition from the factor table.
///
/// # Errors
///
/// Fails on a factor record without a string `field` or without
/// `allowed_values`.
pub fn load_factor_definitions(
    document: &Document,
    config: &LineageConfig,
) -> Result<Vec<FactorDefinition>, LineageError> {
    let invalid = |factor: &str, field: &str, message: &str| LineageError::InvalidFactor {
        factor: factor.to_string(),
        table: config.factor_table.clone(),
        field: field.to_string(),
        message: message.to_string(),
    };
    let mut definitions = Vec::new();
    for record in document.records(&config.factor_table) {
        let field = match record.get(FIELD_ATTRIBUTE) {
            Some(Value::String(field)) if !field.is_empty() => field.clone(),
            Some(_) => {
                return Err(invalid(
                    record.id,
                    FIELD_ATTRIBUTE,
                    "must be a non-empty string",
                ));
            }
            None => return Err(invalid(record.id, FIELD_ATTRIBUTE, "is missing")),
        };
        let allowed_values = match record.get(ALLOWED_ATTRIBUTE) {
            Some(Value::Array(items)) => items.iter().map(scalar_text).collect(),
            Some(Value::String(single)) => vec![single.clone()],
            Some(_) => {
                return Err(invalid(
                    record.id,
                    ALLOWED_ATTRIBUTE,
                    "must be a list of values",
                ));
            }
            None => return Err(invalid(record.id, ALLOWED_ATTRIBUTE, "is missing")),
        };
        definitions.push(FactorDefinition {
            name: record.id.to_string(),
            field,
            allowed_values,
        });
    }
    Ok(definitions)
}

/// Collect factor values along `lineage`.
///
/// Ancestors are scanned root first, then the sample itself; the first
/// accepted value per factor is kept and never overwritten.
pub fn extract_factors(lineage: &Lineage<'_>, definitions: &[FactorDefinition]) -> FactorValues {
    let mut found = FactorValues::new();
    let records = lineage
        .ancestors
        .iter()
        .chain(std::iter::once(&lineage.sample));
    for record in records {
        for definition in definitions {
            if found.contains_key(&definition.name) {
                continue;
            }
            let Some(value) = record.get(&definition.field) else {
                continue;
            };
            if let Some(accepted) = definition.accept(value) {
                found.insert(definition.name.clone(), accepted);
            }
        }
    }
    found
}
