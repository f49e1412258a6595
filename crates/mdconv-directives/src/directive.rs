//! Typed conversion directives.

use mdconv_validate::{DirectiveIssue, ValueKind, is_nested_name};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DirectiveError, DirectiveKey, Result};
use crate::token::{CallExpr, HeaderPair, TestExpr, Token};

const DEFAULT_DELIMITER: &str = "";

/// How input records are chosen for a `str` or `section` directive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Input table; without one there is no current record.
    pub table: Option<String>,
    pub test: Option<TestExpr>,
    pub record_id: Option<String>,
    pub for_each: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub keys: Vec<String>,
    pub descending: bool,
}

/// A call into the function table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Computation {
    /// `code`: a zero-argument function whose result is used directly.
    Code { function: String },
    /// `execute`: a function applied to resolved arguments.
    Execute(CallExpr),
}

impl Computation {
    pub fn function(&self) -> &str {
        match self {
            Self::Code { function } => function,
            Self::Execute(call) => &call.function,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrDirective {
    pub selection: Selection,
    pub override_value: Option<String>,
    pub computation: Option<Computation>,
    pub fields: Vec<Token>,
    pub delimiter: String,
    pub sort: Option<SortSpec>,
}

/// Matrix built from the records of one input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMatrix {
    pub table: String,
    pub test: Option<TestExpr>,
    pub headers: Vec<HeaderPair>,
    pub collate: Option<String>,
    pub fields_to_headers: bool,
    pub exclusion_headers: Vec<String>,
    pub optional_headers: Vec<String>,
    pub values_to_str: bool,
    pub sort: Option<SortSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixDirective {
    Code { function: String },
    Records(RecordMatrix),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDirective {
    pub selection: Selection,
    pub computation: Computation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveKind {
    Str(StrDirective),
    Matrix(MatrixDirective),
    Section(SectionDirective),
}

/// One validated, parsed conversion directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: DirectiveKey,
    pub required: bool,
    /// Stands in for an omitted value or a selection miss.
    pub default: Option<Value>,
    /// Function module made visible to `code`/`execute`.
    pub import: Option<String>,
    pub kind: DirectiveKind,
}

impl Directive {
    pub fn value_kind(&self) -> ValueKind {
        match self.kind {
            DirectiveKind::Str(_) => ValueKind::Str,
            DirectiveKind::Matrix(_) => ValueKind::Matrix,
            DirectiveKind::Section(_) => ValueKind::Section,
        }
    }

    /// Nested directives only run when another directive calls them.
    pub fn is_nested(&self) -> bool {
        is_nested_name(&self.key.name)
    }

    pub fn computation(&self) -> Option<&Computation> {
        match &self.kind {
            DirectiveKind::Str(directive) => directive.computation.as_ref(),
            DirectiveKind::Section(directive) => Some(&directive.computation),
            DirectiveKind::Matrix(_) => None,
        }
    }

    /// Name of the function this directive calls, if any.
    pub fn function(&self) -> Option<&str> {
        match &self.kind {
            DirectiveKind::Matrix(MatrixDirective::Code { function }) => Some(function),
            _ => self.computation().map(Computation::function),
        }
    }

    /// Every token the directive may resolve at evaluation time.
    pub fn tokens(&self) -> Vec<&Token> {
        let mut tokens: Vec<&Token> = Vec::new();
        match &self.kind {
            DirectiveKind::Str(directive) => tokens.extend(directive.fields.iter()),
            DirectiveKind::Matrix(MatrixDirective::Records(matrix)) => {
                for header in &matrix.headers {
                    tokens.push(&header.key);
                    tokens.push(&header.value);
                }
            }
            DirectiveKind::Matrix(MatrixDirective::Code { .. }) | DirectiveKind::Section(_) => {}
        }
        if let Some(Computation::Execute(call)) = self.computation() {
            tokens.extend(call.args.iter());
        }
        tokens
    }

    /// Parse one directive already checked by the directive validator.
    pub fn from_validated(key: DirectiveKey, attributes: &Value) -> Result<Self> {
        let raw = RawDirective::deserialize(attributes).map_err(|error| {
            DirectiveError::Syntax(DirectiveIssue::new(
                &key.table,
                &key.name,
                None,
                error.to_string(),
            ))
        })?;
        let kind = match ValueKind::parse(&raw.value_type) {
            Some(ValueKind::Str) => DirectiveKind::Str(raw.str_directive(&key)?),
            Some(ValueKind::Matrix) => DirectiveKind::Matrix(raw.matrix_directive(&key)?),
            Some(ValueKind::Section) => DirectiveKind::Section(raw.section_directive(&key)?),
            None => {
                return Err(DirectiveError::Syntax(DirectiveIssue::new(
                    &key.table,
                    &key.name,
                    Some("value_type"),
                    format!("unknown value type \"{}\"", raw.value_type),
                )));
            }
        };
        Ok(Self {
            required: raw.required,
            default: raw.default.clone(),
            import: raw.import.clone(),
            key,
            kind,
        })
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawDirective {
    value_type: String,
    #[serde(default = "default_true")]
    required: bool,
    #[serde(default)]
    default: Option<Value>,
    table: Option<String>,
    test: Option<String>,
    record_id: Option<String>,
    #[serde(default)]
    for_each: bool,
    sort_by: Option<Vec<String>>,
    sort_order: Option<String>,
    code: Option<String>,
    execute: Option<String>,
    import: Option<String>,
    #[serde(rename = "override")]
    override_value: Option<String>,
    #[serde(default)]
    fields: Vec<String>,
    delimiter: Option<String>,
    #[serde(default)]
    headers: Vec<String>,
    collate: Option<String>,
    #[serde(default)]
    fields_to_headers: bool,
    #[serde(default)]
    exclusion_headers: Vec<String>,
    #[serde(default)]
    optional_headers: Vec<String>,
    #[serde(default)]
    values_to_str: bool,
}

impl RawDirective {
    fn test(&self, key: &DirectiveKey) -> Result<Option<TestExpr>> {
        self.test
            .as_deref()
            .map(|text| {
                TestExpr::parse(text).map_err(|error| DirectiveError::syntax(key, "test", &error))
            })
            .transpose()
    }

    fn selection(&self, key: &DirectiveKey) -> Result<Selection> {
        Ok(Selection {
            table: self.table.clone(),
            test: self.test(key)?,
            record_id: self.record_id.clone(),
            for_each: self.for_each,
        })
    }

    fn sort(&self) -> Option<SortSpec> {
        self.sort_by.as_ref().map(|keys| SortSpec {
            keys: keys.clone(),
            descending: self.sort_order.as_deref() == Some("descending"),
        })
    }

    fn computation(&self, key: &DirectiveKey) -> Result<Option<Computation>> {
        if let Some(function) = &self.code {
            return Ok(Some(Computation::Code {
                function: function.clone(),
            }));
        }
        self.execute
            .as_deref()
            .map(|text| {
                CallExpr::parse(text)
                    .map(Computation::Execute)
                    .map_err(|error| DirectiveError::syntax(key, "execute", &error))
            })
            .transpose()
    }

    fn str_directive(&self, key: &DirectiveKey) -> Result<StrDirective> {
        let fields = self
            .fields
            .iter()
            .map(|text| {
                Token::parse(text).map_err(|error| DirectiveError::syntax(key, "fields", &error))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(StrDirective {
            selection: self.selection(key)?,
            override_value: self.override_value.clone(),
            computation: self.computation(key)?,
            fields,
            delimiter: self
                .delimiter
                .clone()
                .unwrap_or_else(|| DEFAULT_DELIMITER.to_string()),
            sort: self.sort(),
        })
    }

    fn matrix_directive(&self, key: &DirectiveKey) -> Result<MatrixDirective> {
        if let Some(function) = &self.code {
            return Ok(MatrixDirective::Code {
                function: function.clone(),
            });
        }
        let Some(table) = &self.table else {
            return Err(DirectiveError::Syntax(DirectiveIssue::new(
                &key.table,
                &key.name,
                Some("table"),
                "a matrix directive without code needs an input table",
            )));
        };
        let headers = self
            .headers
            .iter()
            .map(|text| {
                HeaderPair::parse(text)
                    .map_err(|error| DirectiveError::syntax(key, "headers", &error))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(MatrixDirective::Records(RecordMatrix {
            table: table.clone(),
            test: self.test(key)?,
            headers,
            collate: self.collate.clone(),
            fields_to_headers: self.fields_to_headers,
            exclusion_headers: self.exclusion_headers.clone(),
            optional_headers: self.optional_headers.clone(),
            values_to_str: self.values_to_str,
            sort: self.sort(),
        }))
    }

    fn section_directive(&self, key: &DirectiveKey) -> Result<SectionDirective> {
        let Some(computation) = self.computation(key)? else {
            return Err(DirectiveError::Syntax(DirectiveIssue::new(
                &key.table,
                &key.name,
                None,
                "a section directive needs code or execute",
            )));
        };
        Ok(SectionDirective {
            selection: self.selection(key)?,
            computation,
        })
    }
}
