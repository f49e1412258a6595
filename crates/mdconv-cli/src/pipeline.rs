//! One conversion run: evaluate directives, assemble, validate and write.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mdconv_directives::{Capabilities, Evaluator, Registry, directive_counts};
use mdconv_model::{Diagnostic, Diagnostics, Document};
use mdconv_output::{MwtabWriter, TargetFormat, assemble, write_json};
use mdconv_validate::{SchemaViolation, validate_against_schema};
use serde_json::Value;
use tracing::{info, info_span};

use crate::input::read_json;

/// Where a run writes and how it reports.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub format: TargetFormat,
    /// JSON output path; for mwTab the base path both files derive from.
    pub output: PathBuf,
    pub output_schema: Option<PathBuf>,
    /// Collect warnings without logging them.
    pub silent: bool,
}

#[derive(Debug)]
pub struct RunResult {
    pub format: TargetFormat,
    pub outputs: Vec<PathBuf>,
    pub record_count: usize,
    /// Directive count per conversion table.
    pub directive_counts: BTreeMap<String, usize>,
    pub diagnostics: Vec<Diagnostic>,
    pub schema_violations: Vec<SchemaViolation>,
}

impl RunResult {
    pub fn has_errors(&self) -> bool {
        !self.schema_violations.is_empty()
    }
}

/// The evaluated and assembled output tree of one run.
#[derive(Debug)]
pub struct Converted {
    pub tree: Value,
    pub diagnostics: Diagnostics,
    pub directive_counts: BTreeMap<String, usize>,
}

/// Evaluate `directives` over `document` and assemble the tree for `format`.
pub fn convert(
    document: &Document,
    directives: &Value,
    format: TargetFormat,
    diagnostics: Diagnostics,
) -> Result<Converted> {
    let registry = Registry::from_value(directives).context("load conversion directives")?;
    let capabilities = Capabilities::default();
    let evaluator = Evaluator::with_diagnostics(&registry, document, &capabilities, diagnostics)
        .context("prepare conversion")?;
    let conversion = evaluator.run().context("convert")?;
    let tree = assemble(&conversion.outputs, &format.layout());
    Ok(Converted {
        tree,
        diagnostics: conversion.diagnostics,
        directive_counts: directive_counts(&registry),
    })
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Run a whole conversion and write its outputs.
///
/// Load warnings (such as replaced records) are reported through the same
/// diagnostics as conversion warnings.
pub fn run(
    document: &Document,
    directives: &Value,
    load_warnings: Vec<Diagnostic>,
    options: &RunOptions,
) -> Result<RunResult> {
    let span = info_span!("run", format = %options.format);
    let _guard = span.enter();

    let mut diagnostics = if options.silent {
        Diagnostics::silenced()
    } else {
        Diagnostics::new()
    };
    for warning in load_warnings {
        diagnostics.push(warning);
    }
    let converted = convert(document, directives, options.format, diagnostics)?;

    let schema_violations = match &options.output_schema {
        Some(path) => {
            let schema = read_json(path).context("load output schema")?;
            validate_against_schema(&converted.tree, &schema)
                .with_context(|| format!("validate output against {}", path.display()))?
        }
        None => Vec::new(),
    };

    let outputs = match options.format {
        TargetFormat::Mwtab(kind) => {
            let sections = converted
                .tree
                .as_object()
                .context("mwTab output is not a JSON object")?;
            let writer = MwtabWriter::new(kind);
            writer.validate(sections).context("check mwTab structure")?;
            let json_path = with_suffix(&options.output, ".json");
            let text_path = with_suffix(&options.output, ".txt");
            write_json(&json_path, &converted.tree)
                .with_context(|| format!("write {}", json_path.display()))?;
            writer
                .write(&text_path, sections)
                .with_context(|| format!("write {}", text_path.display()))?;
            vec![json_path, text_path]
        }
        TargetFormat::Generic | TargetFormat::Isa => {
            write_json(&options.output, &converted.tree)
                .with_context(|| format!("write {}", options.output.display()))?;
            vec![options.output.clone()]
        }
    };
    info!(
        outputs = outputs.len(),
        warnings = converted.diagnostics.warning_count(),
        "conversion finished"
    );

    Ok(RunResult {
        format: options.format,
        outputs,
        record_count: document.record_count(),
        directive_counts: converted.directive_counts,
        diagnostics: converted.diagnostics.into_vec(),
        schema_violations,
    })
}
