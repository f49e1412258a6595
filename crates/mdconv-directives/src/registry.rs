//! Validated directive set with nested-directive lookup.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use mdconv_model::Diagnostic;
use mdconv_validate::validate_directive_document;
use serde_json::{Map, Value};
use tracing::debug;

use crate::directive::{Directive, DirectiveKind, MatrixDirective};
use crate::error::{DirectiveError, DirectiveKey, Result};
use crate::token::{NestedRef, Token};

/// All directives of one conversion, in document order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    directives: IndexMap<DirectiveKey, Directive>,
    warnings: Vec<Diagnostic>,
}

impl Registry {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(text).map_err(DirectiveError::InvalidJson)?;
        Self::from_value(&raw)
    }

    /// Validate, normalize and parse a directive document.
    ///
    /// # Errors
    ///
    /// Fails on the first shape error, unparsable expression or nested
    /// reference that resolves to no directive (or to several).
    pub fn from_value(raw: &Value) -> Result<Self> {
        let normalized = validate_directive_document(raw)?;
        let mut registry = Self::default();
        if let Value::Object(tables) = &normalized {
            for (table, directives) in tables {
                let Value::Object(directives) = directives else {
                    continue;
                };
                for (name, attributes) in directives {
                    let key = DirectiveKey::new(table, name);
                    let directive = Directive::from_validated(key.clone(), attributes)?;
                    registry.directives.insert(key, directive);
                }
            }
        }
        registry.check_nested_references()?;
        registry.collect_header_warnings();
        debug!(
            directive_count = registry.directives.len(),
            top_level = registry.top_level().count(),
            "loaded conversion directives"
        );
        Ok(registry)
    }

    fn check_nested_references(&self) -> Result<()> {
        for directive in self.directives.values() {
            for token in directive.tokens() {
                if let Token::Nested(reference) = token {
                    self.resolve_nested(&directive.key, reference)?;
                }
            }
        }
        Ok(())
    }

    fn collect_header_warnings(&mut self) {
        let mut warnings = Vec::new();
        for directive in self.directives.values() {
            let DirectiveKind::Matrix(MatrixDirective::Records(matrix)) = &directive.kind else {
                continue;
            };
            let mut counts: IndexMap<&str, usize> = IndexMap::new();
            for header in &matrix.headers {
                if let Token::Literal(key) = &header.key {
                    *counts.entry(key.as_str()).or_default() += 1;
                }
            }
            let duplicates: Vec<&str> = counts
                .into_iter()
                .filter(|(_, count)| *count > 1)
                .map(|(key, _)| key)
                .collect();
            if !duplicates.is_empty() {
                warnings.push(
                    Diagnostic::warning(format!(
                        "duplicate output keys in headers, the last occurrence wins: {}",
                        duplicates.join(", ")
                    ))
                    .with_directive(&directive.key.table, &directive.key.name),
                );
            }
        }
        self.warnings = warnings;
    }

    pub fn get(&self, table: &str, name: &str) -> Option<&Directive> {
        self.directives.get(&DirectiveKey::new(table, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.directives.values()
    }

    /// Directives that produce output on their own (not nested helpers).
    pub fn top_level(&self) -> impl Iterator<Item = &Directive> {
        self.directives
            .values()
            .filter(|directive| !directive.is_nested())
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Warnings found while loading, such as duplicate header keys.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Find the directive a nested reference points at.
    ///
    /// An unqualified name is looked up in the caller's table first, then in
    /// any other table where it is unique.
    pub fn resolve_nested(
        &self,
        caller: &DirectiveKey,
        reference: &NestedRef,
    ) -> Result<&Directive> {
        let unknown = || DirectiveError::UnknownDirective {
            directive: caller.clone(),
            reference: reference.to_string(),
        };
        if let Some(table) = &reference.table {
            return self.get(table, &reference.name).ok_or_else(unknown);
        }
        if let Some(directive) = self.get(&caller.table, &reference.name) {
            return Ok(directive);
        }
        let candidates: Vec<&Directive> = self
            .directives
            .values()
            .filter(|directive| directive.key.name == reference.name)
            .collect();
        match candidates.as_slice() {
            [] => Err(unknown()),
            [directive] => Ok(directive),
            several => Err(DirectiveError::AmbiguousDirective {
                directive: caller.clone(),
                reference: reference.to_string(),
                tables: several
                    .iter()
                    .map(|directive| directive.key.table.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Apply `update` on top of `base`, attribute by attribute.
///
/// Tables and directives missing from `base` are added; attributes present in
/// both are replaced by the update.
pub fn update_directives(base: &Value, update: &Value) -> Value {
    let (Value::Object(base_tables), Value::Object(update_tables)) = (base, update) else {
        return update.clone();
    };
    let mut merged: Map<String, Value> = base_tables.clone();
    for (table, directives) in update_tables {
        let Value::Object(update_directives) = directives else {
            merged.insert(table.clone(), directives.clone());
            continue;
        };
        let target = merged
            .entry(table.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(target_directives) = target else {
            *target = directives.clone();
            continue;
        };
        for (name, attributes) in update_directives {
            match (target_directives.get_mut(name), attributes) {
                (Some(Value::Object(existing)), Value::Object(changes)) => {
                    for (attribute, value) in changes {
                        existing.insert(attribute.clone(), value.clone());
                    }
                }
                _ => {
                    target_directives.insert(name.clone(), attributes.clone());
                }
            }
        }
    }
    Value::Object(merged)
}

/// Count directives per conversion table, for summaries.
pub fn directive_counts(registry: &Registry) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for directive in registry.iter() {
        *counts.entry(directive.key.table.clone()).or_insert(0) += 1;
    }
    counts
}
