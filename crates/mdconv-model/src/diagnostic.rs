use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A non-fatal issue raised while converting.
///
/// Carries enough location detail (directive, table, record, field) for a
/// user to find the problem in the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Conversion table of the directive that raised the issue.
    pub conversion_table: Option<String>,
    /// Directive name.
    pub directive: Option<String>,
    /// Record id involved, if any.
    pub record: Option<String>,
    /// Input table the record came from.
    pub source_table: Option<String>,
    /// Field or attribute involved.
    pub field: Option<String>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            conversion_table: None,
            directive: None,
            record: None,
            source_table: None,
            field: None,
        }
    }

    #[must_use]
    pub fn with_directive(mut self, table: impl Into<String>, name: impl Into<String>) -> Self {
        self.conversion_table = Some(table.into());
        self.directive = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_record(mut self, source_table: impl Into<String>, id: impl Into<String>) -> Self {
        self.source_table = Some(source_table.into());
        self.record = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(table), Some(name)) = (&self.conversion_table, &self.directive) {
            write!(f, "conversion \"{name}\" in table \"{table}\": ")?;
        }
        if let (Some(source), Some(record)) = (&self.source_table, &self.record) {
            write!(f, "record \"{record}\" in table \"{source}\": ")?;
        }
        if let Some(field) = &self.field {
            write!(f, "field \"{field}\": ")?;
        }
        f.write_str(&self.message)
    }
}

/// Collector for diagnostics raised during one conversion run.
///
/// Each pushed diagnostic is logged immediately unless the collector is
/// silenced; it is kept either way so callers can report totals.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    silent: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn silenced() -> Self {
        Self {
            items: Vec::new(),
            silent: true,
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if !self.silent {
            warn!(
                directive = diagnostic.directive.as_deref().unwrap_or("-"),
                record = diagnostic.record.as_deref().unwrap_or("-"),
                "{diagnostic}"
            );
        }
        self.items.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.severity == Severity::Warning)
            .count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
