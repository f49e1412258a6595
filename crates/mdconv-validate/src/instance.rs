//! Generic JSON Schema validation of converted documents.

use serde_json::Value;

use crate::error::{SchemaError, SchemaViolation};

/// Validate `instance` against the JSON Schema `schema`.
///
/// Returns every violation found; an empty list means the instance is valid.
///
/// # Errors
///
/// Returns [`SchemaError::InvalidSchema`] if `schema` is not a usable schema.
pub fn validate_against_schema(
    instance: &Value,
    schema: &Value,
) -> Result<Vec<SchemaViolation>, SchemaError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|error| SchemaError::InvalidSchema(error.to_string()))?;
    Ok(validator
        .iter_errors(instance)
        .map(|error| SchemaViolation {
            instance_path: error.instance_path.to_string(),
            message: error.to_string(),
        })
        .collect())
}
