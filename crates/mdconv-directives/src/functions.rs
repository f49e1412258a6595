//! Closed table of builtin functions callable through `code` and `execute`.
//!
//! Functions live in modules. Functions of the `core` module are always
//! visible; any other module must be named by the directive's `import`.

use indexmap::IndexMap;
use mdconv_lineage::{
    LineageConfig, LineageError, LineageResolver, extract_factors, load_factor_definitions,
    subject_sample_factors,
};
use mdconv_model::{Diagnostic, Diagnostics, Document, RecordRef, scalar_text, value_to_text};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::evaluator::kind_name;

pub const CORE_MODULE: &str = "core";
pub const ONTOLOGY_MODULE: &str = "ontology";
pub const LINEAGE_MODULE: &str = "lineage";

#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("expected {expected} argument(s), got {found}")]
    Arity { expected: &'static str, found: usize },
    #[error("argument {index}: {message}")]
    InvalidArgument { index: usize, message: String },
    #[error(transparent)]
    Lineage(#[from] LineageError),
}

/// Everything a builtin may read while it runs.
pub struct FunctionContext<'a> {
    pub document: &'a Document,
    /// Record selected by the calling directive.
    pub record: Option<RecordRef<'a>>,
    /// Record of the directive that invoked a nested directive.
    pub calling: Option<RecordRef<'a>>,
    pub lineage: &'a LineageConfig,
    pub diagnostics: &'a mut Diagnostics,
}

pub type BuiltinFn = fn(&mut FunctionContext<'_>, &[Value]) -> Result<Value, FunctionError>;

#[derive(Debug, Clone, Copy)]
struct Registered {
    module: &'static str,
    function: BuiltinFn,
}

/// Function name → implementation, grouped by module.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: IndexMap<&'static str, Registered>,
}

impl FunctionTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table with the `core`, `ontology` and `lineage` modules.
    pub fn with_builtins() -> Self {
        let mut table = Self::empty();
        table.register(CORE_MODULE, "identity", identity);
        table.register(CORE_MODULE, "concat", concat);
        table.register(CORE_MODULE, "join", join);
        table.register(CORE_MODULE, "split", split);
        table.register(CORE_MODULE, "lower", lower);
        table.register(CORE_MODULE, "upper", upper);
        table.register(CORE_MODULE, "to_number", to_number);
        table.register(CORE_MODULE, "list", list);
        table.register(CORE_MODULE, "object", object);
        table.register(CORE_MODULE, "record", current_record);
        table.register(ONTOLOGY_MODULE, "ontology_annotation", ontology_annotation);
        table.register(
            ONTOLOGY_MODULE,
            "parse_ontology_annotation",
            parse_ontology_annotation,
        );
        table.register(LINEAGE_MODULE, "subject_sample_factors", lineage_ssf);
        table.register(LINEAGE_MODULE, "lineage", lineage_ids);
        table.register(LINEAGE_MODULE, "factors", sample_factors);
        table.register(LINEAGE_MODULE, "subject_id", subject_id);
        table
    }

    pub fn register(&mut self, module: &'static str, name: &'static str, function: BuiltinFn) {
        self.functions.insert(name, Registered { module, function });
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.functions.values().any(|entry| entry.module == module)
    }

    /// Module a function belongs to, whether or not it is visible.
    pub fn module_of(&self, name: &str) -> Option<&'static str> {
        self.functions.get(name).map(|entry| entry.module)
    }

    /// Look up `name` as seen from a directive importing `import`.
    pub fn lookup(&self, name: &str, import: Option<&str>) -> Option<BuiltinFn> {
        let entry = self.functions.get(name)?;
        (entry.module == CORE_MODULE || Some(entry.module) == import).then_some(entry.function)
    }

    pub fn names(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.functions
            .iter()
            .map(|(name, entry)| (entry.module, *name))
    }
}

/// Capabilities handed to the evaluator: the function table and the lineage
/// conventions its lineage functions follow.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub functions: FunctionTable,
    pub lineage: LineageConfig,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            functions: FunctionTable::with_builtins(),
            lineage: LineageConfig::default(),
        }
    }
}

fn exactly(args: &[Value], count: usize, expected: &'static str) -> Result<(), FunctionError> {
    if args.len() == count {
        Ok(())
    } else {
        Err(FunctionError::Arity {
            expected,
            found: args.len(),
        })
    }
}

fn text_argument(args: &[Value], index: usize) -> Result<String, FunctionError> {
    match args.get(index) {
        Some(Value::Null) | None => Err(FunctionError::InvalidArgument {
            index,
            message: "expected a value, got nothing".to_string(),
        }),
        Some(Value::Object(_)) => Err(FunctionError::InvalidArgument {
            index,
            message: "expected text, got an object".to_string(),
        }),
        Some(value) => Ok(value_to_text(value, ",")),
    }
}

fn identity(_: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    exactly(args, 1, "1")?;
    Ok(args[0].clone())
}

fn concat(_: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    let text: String = args.iter().map(|arg| value_to_text(arg, "")).collect();
    Ok(Value::String(text))
}

fn join(_: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    let Some((delimiter, values)) = args.split_first() else {
        return Err(FunctionError::Arity {
            expected: "at least 1",
            found: 0,
        });
    };
    let delimiter = scalar_text(delimiter);
    let mut parts = Vec::new();
    for value in values {
        match value {
            Value::Null => {}
            Value::Array(items) => parts.extend(items.iter().map(scalar_text)),
            other => parts.push(scalar_text(other)),
        }
    }
    Ok(Value::String(parts.join(&delimiter)))
}

fn split(_: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    exactly(args, 2, "2")?;
    let text = text_argument(args, 0)?;
    let delimiter = scalar_text(&args[1]);
    if delimiter.is_empty() {
        return Err(FunctionError::InvalidArgument {
            index: 1,
            message: "delimiter must not be empty".to_string(),
        });
    }
    Ok(Value::Array(
        text.split(delimiter.as_str())
            .map(|part| Value::String(part.trim().to_string()))
            .collect(),
    ))
}

fn lower(_: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    exactly(args, 1, "1")?;
    Ok(Value::String(text_argument(args, 0)?.to_lowercase()))
}

fn upper(_: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    exactly(args, 1, "1")?;
    Ok(Value::String(text_argument(args, 0)?.to_uppercase()))
}

fn to_number(_: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    exactly(args, 1, "1")?;
    if let Value::Number(number) = &args[0] {
        return Ok(Value::Number(number.clone()));
    }
    let text = text_argument(args, 0)?;
    let trimmed = text.trim();
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Ok(Value::Number(integer.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| FunctionError::InvalidArgument {
            index: 0,
            message: format!("\"{text}\" is not a number"),
        })
}

fn list(_: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::Array(args.to_vec()))
}

/// Build an object from alternating key and value arguments.
///
/// Keys that are not strings are cast to their text with a warning.
fn object(context: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    if args.len() % 2 != 0 {
        return Err(FunctionError::Arity {
            expected: "an even number of",
            found: args.len(),
        });
    }
    let mut object = Map::new();
    for (pair_index, pair) in args.chunks_exact(2).enumerate() {
        let key = scalar_text(&pair[0]);
        if key.is_empty() {
            return Err(FunctionError::InvalidArgument {
                index: pair_index * 2,
                message: "object keys must not be empty".to_string(),
            });
        }
        if !pair[0].is_string() {
            let mut diagnostic = Diagnostic::warning(format!(
                "object key from argument {} is {}, cast to the string \"{key}\"",
                pair_index * 2,
                kind_name(&pair[0])
            ));
            if let Some(record) = context.record {
                diagnostic = diagnostic.with_record(record.table, record.id);
            }
            context.diagnostics.push(diagnostic);
        }
        object.insert(key, pair[1].clone());
    }
    Ok(Value::Object(object))
}

/// The selected record as an object.
fn current_record(
    context: &mut FunctionContext<'_>,
    args: &[Value],
) -> Result<Value, FunctionError> {
    exactly(args, 0, "0")?;
    Ok(context
        .record
        .map_or(Value::Null, |record| Value::Object(record.fields.clone())))
}

fn annotation(value: String, source: String, accession: String) -> Value {
    let mut object = Map::new();
    object.insert("annotationValue".to_string(), Value::String(value));
    object.insert("termSource".to_string(), Value::String(source));
    object.insert("termAccession".to_string(), Value::String(accession));
    Value::Object(object)
}

fn ontology_annotation(
    _: &mut FunctionContext<'_>,
    args: &[Value],
) -> Result<Value, FunctionError> {
    exactly(args, 3, "3")?;
    let optional = |value: &Value| match value {
        Value::Null => String::new(),
        other => value_to_text(other, ","),
    };
    Ok(annotation(
        text_argument(args, 0)?,
        optional(&args[1]),
        optional(&args[2]),
    ))
}

/// Parse `source:accession:value` into an ontology annotation.
///
/// The source ends at the first colon and the value starts after the last, so
/// accessions such as `UO:0000021` survive. Text with fewer than two colons is
/// a bare annotation value.
fn parse_ontology_annotation(
    _: &mut FunctionContext<'_>,
    args: &[Value],
) -> Result<Value, FunctionError> {
    exactly(args, 1, "1")?;
    let text = text_argument(args, 0)?;
    let parsed = text.split_once(':').and_then(|(source, rest)| {
        rest.rsplit_once(':')
            .map(|(accession, value)| (source, accession, value))
    });
    Ok(match parsed {
        Some((source, accession, value)) => annotation(
            value.trim().to_string(),
            source.trim().to_string(),
            accession.trim().to_string(),
        ),
        None => annotation(text.trim().to_string(), String::new(), String::new()),
    })
}

fn lineage_ssf(context: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    exactly(args, 0, "0")?;
    let resolver = LineageResolver::new(context.document, context.lineage);
    let rows = subject_sample_factors(&resolver, context.diagnostics)?;
    Ok(Value::Array(rows))
}

fn lineage_ids(context: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    exactly(args, 1, "1")?;
    let sample = text_argument(args, 0)?;
    let resolver = LineageResolver::new(context.document, context.lineage);
    let lineage = resolver.resolve(&sample)?;
    Ok(Value::Array(
        lineage
            .steps()
            .iter()
            .map(|step| Value::String(step.id().to_string()))
            .collect(),
    ))
}

fn sample_factors(
    context: &mut FunctionContext<'_>,
    args: &[Value],
) -> Result<Value, FunctionError> {
    exactly(args, 1, "1")?;
    let sample = text_argument(args, 0)?;
    let resolver = LineageResolver::new(context.document, context.lineage);
    let definitions = load_factor_definitions(context.document, context.lineage)?;
    let lineage = resolver.resolve(&sample)?;
    let factors = extract_factors(&lineage, &definitions);
    Ok(Value::Object(factors.into_iter().collect()))
}

fn subject_id(context: &mut FunctionContext<'_>, args: &[Value]) -> Result<Value, FunctionError> {
    exactly(args, 1, "1")?;
    let sample = text_argument(args, 0)?;
    let resolver = LineageResolver::new(context.document, context.lineage);
    let lineage = resolver.resolve(&sample)?;
    Ok(lineage
        .subject(context.lineage)
        .map_or(Value::Null, |subject| Value::String(subject.id.to_string())))
}
