//! Validation for conversion directive documents and JSON outputs.
//!
//! - **directives**: normalization and shape checks of directive documents
//! - **schema**: the JSON Schemas for each directive `value_type`
//! - **instance**: generic "validate JSON against a JSON Schema" wrapper

pub mod directives;
pub mod error;
pub mod instance;
pub mod schema;

pub use directives::{NESTED_MARKER, ValueKind, is_nested_name, validate_directive_document};
pub use error::{DirectiveIssue, SchemaError, SchemaViolation};
pub use instance::validate_against_schema;
