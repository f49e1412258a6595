use std::fmt;

use mdconv_validate::{DirectiveIssue, SchemaError};
use thiserror::Error;

use crate::functions::FunctionError;
use crate::token::TokenError;

/// Table and name of one conversion directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirectiveKey {
    pub table: String,
    pub name: String,
}

impl DirectiveKey {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DirectiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conversion \"{}\" in table \"{}\"", self.name, self.table)
    }
}

/// Failure to resolve a single token against the current scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("\"^.{attribute}\" needs a calling record; only nested directives have one")]
    NoCallingRecord { attribute: String },
    #[error("calling record \"{record}\" in table \"{source_table}\" has no attribute \"{attribute}\"")]
    MissingCallingAttribute {
        record: String,
        source_table: String,
        attribute: String,
    },
    #[error("record \"{record}\" in table \"{source_table}\" has no field \"{field}\"")]
    MissingField {
        record: String,
        source_table: String,
        field: String,
    },
    #[error("field \"{field}\" cannot be read without a selected record (the directive has no table)")]
    NoCurrentRecord { field: String },
}

impl ResolveError {
    /// `(source_table, record)` this error points at.
    pub fn record(&self) -> Option<(&str, &str)> {
        match self {
            Self::MissingCallingAttribute {
                record,
                source_table,
                ..
            }
            | Self::MissingField {
                record,
                source_table,
                ..
            } => Some((source_table, record)),
            Self::NoCallingRecord { .. } | Self::NoCurrentRecord { .. } => None,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::NoCallingRecord { attribute }
            | Self::MissingCallingAttribute { attribute, .. } => attribute,
            Self::MissingField { field, .. } | Self::NoCurrentRecord { field } => field,
        }
    }
}

#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("conversion directives are not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("{0}")]
    Syntax(DirectiveIssue),
    #[error("{directive}: {source}")]
    Resolve {
        directive: DirectiveKey,
        #[source]
        source: ResolveError,
    },
    #[error("{directive}: input table \"{source_table}\" does not exist")]
    TableNotFound {
        directive: DirectiveKey,
        source_table: String,
    },
    #[error("{directive}: input table \"{source_table}\" has no records")]
    EmptyTable {
        directive: DirectiveKey,
        source_table: String,
    },
    #[error("{directive}: record \"{record}\" not found in table \"{source_table}\"")]
    RecordNotFound {
        directive: DirectiveKey,
        source_table: String,
        record: String,
    },
    #[error("{directive}: no record in table \"{source_table}\" matches test \"{test}\"")]
    NoMatchingRecords {
        directive: DirectiveKey,
        source_table: String,
        test: String,
    },
    #[error("{directive}: nested directive \"{reference}\" is not defined")]
    UnknownDirective {
        directive: DirectiveKey,
        reference: String,
    },
    #[error(
        "{directive}: nested directive \"{reference}\" is defined in several tables ({tables}); \
         qualify it as table.name()"
    )]
    AmbiguousDirective {
        directive: DirectiveKey,
        reference: String,
        tables: String,
    },
    #[error("cyclic nested directives: {chain}")]
    CyclicDirective { chain: String },
    #[error("{directive}: function \"{function}\" is not available{hint}")]
    UnknownFunction {
        directive: DirectiveKey,
        function: String,
        hint: String,
    },
    #[error("{directive}: import \"{module}\" names no known function module")]
    UnknownModule {
        directive: DirectiveKey,
        module: String,
    },
    #[error("{directive}: function \"{function}\" failed: {source}")]
    FunctionFailed {
        directive: DirectiveKey,
        function: String,
        #[source]
        source: FunctionError,
    },
    #[error("{directive}: expected {expected}, got {found}")]
    TypeMismatch {
        directive: DirectiveKey,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{directive}: {item} has no sort key \"{key}\"")]
    SortKeyMissing {
        directive: DirectiveKey,
        item: String,
        key: String,
    },
}

impl DirectiveError {
    pub(crate) fn syntax(key: &DirectiveKey, field: &str, error: &TokenError) -> Self {
        Self::Syntax(DirectiveIssue::new(
            &key.table,
            &key.name,
            Some(field),
            error.to_string(),
        ))
    }

    /// Errors that abort the run whatever the directive's `required` flag says.
    pub fn is_always_fatal(&self) -> bool {
        match self {
            Self::InvalidJson(_)
            | Self::Schema(_)
            | Self::Syntax(_)
            | Self::UnknownDirective { .. }
            | Self::AmbiguousDirective { .. }
            | Self::CyclicDirective { .. }
            | Self::UnknownFunction { .. }
            | Self::UnknownModule { .. }
            | Self::TypeMismatch { .. } => true,
            Self::FunctionFailed { source, .. } => matches!(source, FunctionError::Lineage(_)),
            Self::Resolve { .. }
            | Self::TableNotFound { .. }
            | Self::EmptyTable { .. }
            | Self::RecordNotFound { .. }
            | Self::NoMatchingRecords { .. }
            | Self::SortKeyMissing { .. } => false,
        }
    }

    /// Selection found no record; a directive `default` stands in for these.
    pub fn is_selection_miss(&self) -> bool {
        matches!(
            self,
            Self::TableNotFound { .. }
                | Self::EmptyTable { .. }
                | Self::RecordNotFound { .. }
                | Self::NoMatchingRecords { .. }
        )
    }

    pub fn directive(&self) -> Option<&DirectiveKey> {
        match self {
            Self::Resolve { directive, .. }
            | Self::TableNotFound { directive, .. }
            | Self::EmptyTable { directive, .. }
            | Self::RecordNotFound { directive, .. }
            | Self::NoMatchingRecords { directive, .. }
            | Self::UnknownDirective { directive, .. }
            | Self::AmbiguousDirective { directive, .. }
            | Self::UnknownFunction { directive, .. }
            | Self::UnknownModule { directive, .. }
            | Self::FunctionFailed { directive, .. }
            | Self::TypeMismatch { directive, .. }
            | Self::SortKeyMissing { directive, .. } => Some(directive),
            Self::InvalidJson(_)
            | Self::Schema(_)
            | Self::Syntax(_)
            | Self::CyclicDirective { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectiveError>;
