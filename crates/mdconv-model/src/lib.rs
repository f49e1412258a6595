//! Internal record document model for directive-driven conversion.
//!
//! - **document**: ordered table → record-id → record mapping read from JSON
//! - **value**: rendering, matching and ordering of JSON field values
//! - **diagnostic**: non-fatal conversion issues and their collector

pub mod diagnostic;
pub mod document;
pub mod error;
pub mod value;

pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use document::{Document, Record, RecordRef, Table, lookup_field};
pub use error::{ModelError, Result};
pub use value::{compare_values, parse_bool_like, scalar_text, value_matches, value_to_text};
