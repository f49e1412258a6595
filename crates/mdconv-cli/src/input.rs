//! Reading input documents and directive documents from disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use mdconv_directives::update_directives;
use mdconv_model::{Diagnostic, Document};
use mdconv_output::TargetFormat;
use serde_json::Value;
use tracing::{debug, info};

pub fn read_json(path: &Path) -> Result<Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse JSON in {}", path.display()))
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("list {}", dir.display()))?
            .path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load the input document from a JSON file, or from every `*.json` file of
/// a directory merged in file-name order.
///
/// Records replaced by a later file are reported as warnings.
pub fn load_document(path: &Path) -> Result<(Document, Vec<Diagnostic>)> {
    if !path.is_dir() {
        let value = read_json(path)?;
        let document = Document::from_value(value)
            .with_context(|| format!("load input document {}", path.display()))?;
        return Ok((document, Vec::new()));
    }

    let files = json_files(path)?;
    if files.is_empty() {
        bail!("no JSON files found in {}", path.display());
    }
    let mut document = Document::new();
    let mut warnings = Vec::new();
    for file in &files {
        let value = read_json(file)?;
        let part = Document::from_value(value)
            .with_context(|| format!("load input document {}", file.display()))?;
        for (table, id) in document.merge(part) {
            warnings.push(
                Diagnostic::warning(format!(
                    "replaced by the record of the same id in {}",
                    file.display()
                ))
                .with_record(table, id),
            );
        }
        debug!(file = %file.display(), "merged input file");
    }
    info!(
        files = files.len(),
        records = document.record_count(),
        "merged input directory"
    );
    Ok((document, warnings))
}

/// How the built-in directives of a format are adjusted from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveSource {
    Builtin,
    /// Deep-merge this document over the built-in directives.
    Update(PathBuf),
    /// Use this document instead of the built-in directives.
    Override(PathBuf),
}

impl DirectiveSource {
    pub fn from_flags(update: Option<PathBuf>, replace: Option<PathBuf>) -> Self {
        match (update, replace) {
            (_, Some(path)) => Self::Override(path),
            (Some(path), None) => Self::Update(path),
            (None, None) => Self::Builtin,
        }
    }
}

/// The directive document for `format` after applying `source`.
pub fn format_directives(format: TargetFormat, source: &DirectiveSource) -> Result<Value> {
    if let DirectiveSource::Override(path) = source {
        return read_json(path).context("load override directives");
    }
    let builtin = format
        .default_directives()
        .with_context(|| format!("load built-in {format} directives"))?
        .with_context(|| format!("{format} has no built-in directives"))?;
    match source {
        DirectiveSource::Update(path) => {
            let update = read_json(path).context("load update directives")?;
            Ok(update_directives(&builtin, &update))
        }
        DirectiveSource::Builtin | DirectiveSource::Override(_) => Ok(builtin),
    }
}
