use std::fmt;

use thiserror::Error;

/// One problem with one directive, located by table, name and attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveIssue {
    pub table: String,
    pub directive: String,
    pub field: Option<String>,
    pub message: String,
}

impl DirectiveIssue {
    pub fn new(
        table: impl Into<String>,
        directive: impl Into<String>,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            directive: directive.into(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for DirectiveIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conversion directive \"{}\" in table \"{}\"",
            self.directive, self.table
        )?;
        if let Some(field) = &self.field {
            write!(f, ", field \"{field}\"")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A JSON Schema violation inside a validated instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON pointer into the instance (empty for the root).
    pub instance_path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("conversion directives must be a JSON object mapping table names to directives")]
    NotAnObject,
    #[error("conversion table \"{table}\" must map directive names to attribute objects")]
    InvalidTable { table: String },
    #[error("{0}")]
    Directive(DirectiveIssue),
    #[error(
        "conversion table \"{table}\" holds section directive \"{section}\" alongside other \
         directives ({others}); a section directive must be alone in its table"
    )]
    MixedSection {
        table: String,
        section: String,
        others: String,
    },
    #[error("invalid JSON schema: {0}")]
    InvalidSchema(String),
}
