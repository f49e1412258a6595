//! Directive evaluation.
//!
//! One evaluation function per value type. Nested directives are evaluated
//! recursively with the caller's current record as their calling record; the
//! `(table, name)` keys currently being evaluated guard against cycles.

use std::cmp::Ordering;

use indexmap::{IndexMap, IndexSet};
use mdconv_model::{
    Diagnostic, Diagnostics, Document, RecordRef, compare_values, value_to_text,
};
use mdconv_validate::ValueKind;
use serde_json::{Map, Value};
use tracing::{debug, info, info_span};

use crate::directive::{
    Computation, Directive, DirectiveKind, MatrixDirective, RecordMatrix, SectionDirective,
    Selection, SortSpec, StrDirective,
};
use crate::error::{DirectiveError, DirectiveKey, ResolveError, Result};
use crate::functions::{Capabilities, FunctionContext, FunctionTable};
use crate::registry::Registry;
use crate::resolve::{Resolved, Scope, resolve_token, test_matches};
use crate::token::{NestedRef, TestExpr, Token};

/// Value produced by one top-level directive.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveOutput {
    pub key: DirectiveKey,
    pub kind: ValueKind,
    pub value: Value,
}

/// Everything a full evaluation run produced.
#[derive(Debug)]
pub struct Conversion {
    /// Outputs in directive order; omitted values are absent.
    pub outputs: Vec<DirectiveOutput>,
    pub diagnostics: Diagnostics,
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn check_function(directive: &Directive, functions: &FunctionTable) -> Result<()> {
    if let Some(module) = &directive.import
        && !functions.has_module(module)
    {
        return Err(DirectiveError::UnknownModule {
            directive: directive.key.clone(),
            module: module.clone(),
        });
    }
    let Some(function) = directive.function() else {
        return Ok(());
    };
    if functions
        .lookup(function, directive.import.as_deref())
        .is_some()
    {
        return Ok(());
    }
    let hint = match functions.module_of(function) {
        Some(module) => format!(" (it lives in module \"{module}\"; add \"import\": \"{module}\")"),
        None => String::new(),
    };
    Err(DirectiveError::UnknownFunction {
        directive: directive.key.clone(),
        function: function.to_string(),
        hint,
    })
}

fn compare_sort_keys(left: &[&Value], right: &[&Value]) -> Ordering {
    left.iter()
        .zip(right)
        .map(|(left, right)| compare_values(left, right))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Interprets a [`Registry`] against one input [`Document`].
pub struct Evaluator<'a> {
    registry: &'a Registry,
    document: &'a Document,
    capabilities: &'a Capabilities,
    in_flight: Vec<&'a DirectiveKey>,
    diagnostics: Diagnostics,
}

impl<'a> Evaluator<'a> {
    /// # Errors
    ///
    /// Fails when a directive names a function or import module the
    /// function table does not provide.
    pub fn new(
        registry: &'a Registry,
        document: &'a Document,
        capabilities: &'a Capabilities,
    ) -> Result<Self> {
        Self::with_diagnostics(registry, document, capabilities, Diagnostics::new())
    }

    /// Like [`Self::new`], pushing warnings into `diagnostics`.
    ///
    /// # Errors
    ///
    /// Fails when a directive names a function or import module the
    /// function table does not provide.
    pub fn with_diagnostics(
        registry: &'a Registry,
        document: &'a Document,
        capabilities: &'a Capabilities,
        mut diagnostics: Diagnostics,
    ) -> Result<Self> {
        for directive in registry.iter() {
            check_function(directive, &capabilities.functions)?;
        }
        for warning in registry.warnings() {
            diagnostics.push(warning.clone());
        }
        Ok(Self {
            registry,
            document,
            capabilities,
            in_flight: Vec::new(),
            diagnostics,
        })
    }

    /// Evaluate every top-level directive in registry order.
    pub fn run(mut self) -> Result<Conversion> {
        let registry = self.registry;
        let span = info_span!("evaluate", directives = registry.len());
        let _guard = span.enter();
        let mut outputs = Vec::new();
        for directive in registry.top_level() {
            match self.evaluate_directive(directive, None)? {
                Some(value) => outputs.push(DirectiveOutput {
                    key: directive.key.clone(),
                    kind: directive.value_kind(),
                    value,
                }),
                None => debug!(directive = %directive.key, "no value produced"),
            }
        }
        info!(
            outputs = outputs.len(),
            warnings = self.diagnostics.warning_count(),
            "evaluated conversion directives"
        );
        Ok(Conversion {
            outputs,
            diagnostics: self.diagnostics,
        })
    }

    /// Evaluate a single directive without a calling record.
    pub fn evaluate(&mut self, table: &str, name: &str) -> Result<Option<Value>> {
        let registry = self.registry;
        let directive =
            registry
                .get(table, name)
                .ok_or_else(|| DirectiveError::UnknownDirective {
                    directive: DirectiveKey::new(table, name),
                    reference: name.to_string(),
                })?;
        self.evaluate_directive(directive, None)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    fn evaluate_directive(
        &mut self,
        directive: &'a Directive,
        calling: Option<RecordRef<'a>>,
    ) -> Result<Option<Value>> {
        let result = self.evaluate_unsettled(directive, calling);
        self.settle(directive, result)
    }

    /// Evaluate a directive without applying `required` or `default`.
    fn evaluate_unsettled(
        &mut self,
        directive: &'a Directive,
        calling: Option<RecordRef<'a>>,
    ) -> Result<Option<Value>> {
        if let Some(start) = self.in_flight.iter().position(|key| **key == directive.key) {
            let chain: Vec<String> = self.in_flight[start..]
                .iter()
                .chain(std::iter::once(&&directive.key))
                .map(|key| format!("{}.{}", key.table, key.name))
                .collect();
            return Err(DirectiveError::CyclicDirective {
                chain: chain.join(" -> "),
            });
        }
        self.in_flight.push(&directive.key);
        let result = match &directive.kind {
            DirectiveKind::Str(spec) => self.eval_str(directive, spec, calling),
            DirectiveKind::Matrix(spec) => self.eval_matrix(directive, spec, calling),
            DirectiveKind::Section(spec) => self.eval_section(directive, spec, calling),
        };
        self.in_flight.pop();
        result
    }

    /// Apply `required` and `default` to an evaluation outcome.
    fn settle(
        &mut self,
        directive: &Directive,
        result: Result<Option<Value>>,
    ) -> Result<Option<Value>> {
        match result {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => {
                if directive.default.is_some() {
                    debug!(directive = %directive.key, "value omitted, using default");
                }
                Ok(directive.default.clone())
            }
            Err(error) if error.is_always_fatal() => Err(error),
            Err(error) if error.is_selection_miss() && directive.default.is_some() => {
                debug!(directive = %directive.key, %error, "selection missed, using default");
                Ok(directive.default.clone())
            }
            Err(error) if directive.required => Err(error),
            Err(error) => {
                self.warn_error(directive, &error);
                Ok(directive.default.clone())
            }
        }
    }

    fn warn_error(&mut self, directive: &Directive, error: &DirectiveError) {
        let message = error.to_string();
        let prefix = format!("{}: ", directive.key);
        let message = message.strip_prefix(&prefix).unwrap_or(&message).to_string();
        let mut diagnostic = Diagnostic::warning(format!("value omitted: {message}"))
            .with_directive(&directive.key.table, &directive.key.name);
        if let DirectiveError::Resolve { source, .. } = error
            && let Some((table, record)) = source.record()
        {
            diagnostic = diagnostic.with_record(table, record);
        }
        self.diagnostics.push(diagnostic);
    }

    fn warn_resolve(&mut self, directive: &Directive, error: &ResolveError, action: &str) {
        let mut diagnostic = Diagnostic::warning(format!("{error}; {action}"))
            .with_directive(&directive.key.table, &directive.key.name);
        if let Some((table, record)) = error.record() {
            diagnostic = diagnostic.with_record(table, record);
        }
        self.diagnostics.push(diagnostic);
    }

    fn warn(&mut self, directive: &Directive, record: Option<RecordRef<'_>>, message: String) {
        let mut diagnostic =
            Diagnostic::warning(message).with_directive(&directive.key.table, &directive.key.name);
        if let Some(record) = record {
            diagnostic = diagnostic.with_record(record.table, record.id);
        }
        self.diagnostics.push(diagnostic);
    }

    fn resolve_error(directive: &Directive, source: ResolveError) -> DirectiveError {
        DirectiveError::Resolve {
            directive: directive.key.clone(),
            source,
        }
    }

    fn call_nested(
        &mut self,
        caller: &'a Directive,
        reference: &NestedRef,
        record: Option<RecordRef<'a>>,
    ) -> Result<Option<Value>> {
        let registry = self.registry;
        let target = registry.resolve_nested(&caller.key, reference)?;
        self.evaluate_directive(target, record)
    }

    /// Like [`Self::call_nested`], but a failure is returned to the caller
    /// instead of being warned about and omitted.
    ///
    /// The target's `default` still covers omissions and selection misses.
    fn call_nested_raw(
        &mut self,
        caller: &'a Directive,
        reference: &NestedRef,
        record: Option<RecordRef<'a>>,
    ) -> Result<Option<Value>> {
        let registry = self.registry;
        let target = registry.resolve_nested(&caller.key, reference)?;
        match self.evaluate_unsettled(target, record) {
            Ok(None) => Ok(target.default.clone()),
            Err(error) if error.is_selection_miss() && target.default.is_some() => {
                debug!(directive = %target.key, %error, "selection missed, using default");
                Ok(target.default.clone())
            }
            other => other,
        }
    }

    /// Resolve one token for a matrix header or call argument.
    ///
    /// Resolution failures are fatal for required directives; otherwise they
    /// are warned about and the token yields nothing.
    fn resolve_value(
        &mut self,
        directive: &'a Directive,
        token: &'a Token,
        scope: Scope<'a>,
    ) -> Result<Option<Value>> {
        match resolve_token(token, scope) {
            Ok(Resolved::Value(value)) => Ok(Some(value.into_owned())),
            Ok(Resolved::Nested(reference)) => {
                match self.call_nested(directive, reference, scope.record) {
                    Ok(value) => Ok(value),
                    Err(error) if error.is_always_fatal() || directive.required => Err(error),
                    Err(error) => {
                        self.warn(
                            directive,
                            scope.record,
                            format!("nested directive \"{reference}\" failed and is skipped: {error}"),
                        );
                        Ok(None)
                    }
                }
            }
            Err(source) if directive.required => Err(Self::resolve_error(directive, source)),
            Err(source) => {
                self.warn_resolve(directive, &source, "skipped");
                Ok(None)
            }
        }
    }

    fn select_records(
        &self,
        directive: &Directive,
        table: &str,
        test: Option<&TestExpr>,
        record_id: Option<&str>,
        calling: Option<RecordRef<'a>>,
    ) -> Result<Vec<RecordRef<'a>>> {
        let document = self.document;
        if document.table(table).is_none() {
            return Err(DirectiveError::TableNotFound {
                directive: directive.key.clone(),
                source_table: table.to_string(),
            });
        }
        let candidates = match record_id {
            Some(id) => {
                let record =
                    document
                        .record(table, id)
                        .ok_or_else(|| DirectiveError::RecordNotFound {
                            directive: directive.key.clone(),
                            source_table: table.to_string(),
                            record: id.to_string(),
                        })?;
                vec![record]
            }
            None => document.records(table),
        };
        if candidates.is_empty() {
            return Err(DirectiveError::EmptyTable {
                directive: directive.key.clone(),
                source_table: table.to_string(),
            });
        }
        let Some(test) = test else {
            return Ok(candidates);
        };
        let mut matched = Vec::new();
        for record in candidates {
            if test_matches(test, &record, calling)
                .map_err(|source| Self::resolve_error(directive, source))?
            {
                matched.push(record);
            }
        }
        if matched.is_empty() {
            return Err(DirectiveError::NoMatchingRecords {
                directive: directive.key.clone(),
                source_table: table.to_string(),
                test: test.to_string(),
            });
        }
        debug!(
            directive = %directive.key,
            table,
            matched = matched.len(),
            "selected records"
        );
        Ok(matched)
    }

    /// Scopes a `str` or `section` directive evaluates in.
    fn select_scopes(
        &self,
        directive: &Directive,
        selection: &Selection,
        calling: Option<RecordRef<'a>>,
    ) -> Result<Vec<Scope<'a>>> {
        let Some(table) = &selection.table else {
            return Ok(vec![Scope::new(None, calling)]);
        };
        let records = self.select_records(
            directive,
            table,
            selection.test.as_ref(),
            selection.record_id.as_deref(),
            calling,
        )?;
        let take = if selection.for_each { records.len() } else { 1 };
        Ok(records
            .into_iter()
            .take(take)
            .map(|record| Scope::new(Some(record), calling))
            .collect())
    }

    fn sort_scopes(
        directive: &Directive,
        scopes: Vec<Scope<'a>>,
        sort: &SortSpec,
    ) -> Result<Vec<Scope<'a>>> {
        let mut keyed = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let mut keys = Vec::with_capacity(sort.keys.len());
            if let Some(record) = scope.record {
                for key in &sort.keys {
                    let value = record.get(key).ok_or_else(|| DirectiveError::SortKeyMissing {
                        directive: directive.key.clone(),
                        item: format!("record \"{}\" in table \"{}\"", record.id, record.table),
                        key: key.clone(),
                    })?;
                    keys.push(value);
                }
            }
            keyed.push((keys, scope));
        }
        keyed.sort_by(|(left, _), (right, _)| {
            let ordering = compare_sort_keys(left, right);
            if sort.descending { ordering.reverse() } else { ordering }
        });
        Ok(keyed.into_iter().map(|(_, scope)| scope).collect())
    }

    fn call_function(
        &mut self,
        directive: &Directive,
        function: &str,
        args: &[Value],
        scope: Scope<'a>,
    ) -> Result<Value> {
        let capabilities = self.capabilities;
        let implementation = capabilities
            .functions
            .lookup(function, directive.import.as_deref())
            .ok_or_else(|| DirectiveError::UnknownFunction {
                directive: directive.key.clone(),
                function: function.to_string(),
                hint: String::new(),
            })?;
        let mut context = FunctionContext {
            document: self.document,
            record: scope.record,
            calling: scope.calling,
            lineage: &capabilities.lineage,
            diagnostics: &mut self.diagnostics,
        };
        debug!(directive = %directive.key, function, args = args.len(), "calling builtin");
        implementation(&mut context, args).map_err(|source| DirectiveError::FunctionFailed {
            directive: directive.key.clone(),
            function: function.to_string(),
            source,
        })
    }

    fn invoke(
        &mut self,
        directive: &'a Directive,
        computation: &'a Computation,
        scope: Scope<'a>,
    ) -> Result<Value> {
        match computation {
            Computation::Code { function } => self.call_function(directive, function, &[], scope),
            Computation::Execute(call) => {
                let mut args = Vec::with_capacity(call.args.len());
                for arg in &call.args {
                    args.push(self.resolve_value(directive, arg, scope)?.unwrap_or(Value::Null));
                }
                self.call_function(directive, &call.function, &args, scope)
            }
        }
    }

    fn eval_str(
        &mut self,
        directive: &'a Directive,
        spec: &'a StrDirective,
        calling: Option<RecordRef<'a>>,
    ) -> Result<Option<Value>> {
        if let Some(text) = &spec.override_value {
            return Ok(Some(Value::String(text.clone())));
        }
        let mut scopes = self.select_scopes(directive, &spec.selection, calling)?;
        if let Some(sort) = &spec.sort
            && scopes.len() > 1
        {
            scopes = Self::sort_scopes(directive, scopes, sort)?;
        }
        let mut parts = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let text = match &spec.computation {
                Some(computation) => match self.invoke(directive, computation, scope)? {
                    Value::String(text) => text,
                    other => {
                        return Err(DirectiveError::TypeMismatch {
                            directive: directive.key.clone(),
                            expected: "a string",
                            found: kind_name(&other),
                        });
                    }
                },
                None => self.render_fields(directive, spec, scope)?,
            };
            parts.push(text);
        }
        Ok(Some(Value::String(parts.join(&spec.delimiter))))
    }

    /// Concatenate the field tokens of a `str` directive for one record.
    ///
    /// A missing field skips only its own token when the directive is not
    /// required. A failing nested call fails the whole value, so the
    /// directive's own `required` decides between an error and an omission.
    fn render_fields(
        &mut self,
        directive: &'a Directive,
        spec: &'a StrDirective,
        scope: Scope<'a>,
    ) -> Result<String> {
        let mut text = String::new();
        for token in &spec.fields {
            match resolve_token(token, scope) {
                Ok(Resolved::Value(value)) => {
                    text.push_str(&value_to_text(&value, &spec.delimiter));
                }
                Ok(Resolved::Nested(reference)) => {
                    match self.call_nested_raw(directive, reference, scope.record)? {
                        Some(Value::String(nested)) => text.push_str(&nested),
                        Some(other) => {
                            self.warn(
                                directive,
                                scope.record,
                                format!(
                                    "nested directive \"{reference}\" returned {}, rendered as text",
                                    kind_name(&other)
                                ),
                            );
                            text.push_str(&value_to_text(&other, &spec.delimiter));
                        }
                        None => {}
                    }
                }
                Err(source) if directive.required => {
                    return Err(Self::resolve_error(directive, source));
                }
                Err(source) => self.warn_resolve(directive, &source, "token skipped"),
            }
        }
        Ok(text)
    }

    fn eval_matrix(
        &mut self,
        directive: &'a Directive,
        spec: &'a MatrixDirective,
        calling: Option<RecordRef<'a>>,
    ) -> Result<Option<Value>> {
        let matrix = match spec {
            MatrixDirective::Code { function } => {
                let value =
                    self.call_function(directive, function, &[], Scope::new(None, calling))?;
                return match value {
                    Value::Array(rows) if rows.iter().all(Value::is_object) => {
                        Ok(Some(Value::Array(rows)))
                    }
                    other => Err(DirectiveError::TypeMismatch {
                        directive: directive.key.clone(),
                        expected: "a list of objects",
                        found: kind_name(&other),
                    }),
                };
            }
            MatrixDirective::Records(matrix) => matrix,
        };
        let records =
            self.select_records(directive, &matrix.table, matrix.test.as_ref(), None, calling)?;

        let mut rows: Vec<Map<String, Value>> = Vec::with_capacity(records.len());
        let mut groups: IndexMap<String, usize> = IndexMap::new();
        let mut collisions: IndexSet<(String, String)> = IndexSet::new();
        for record in records {
            let row = self.matrix_row(directive, matrix, record, calling)?;
            let Some(collate) = &matrix.collate else {
                rows.push(row);
                continue;
            };
            let group = match record.get(collate) {
                Some(value) => value_to_text(value, ","),
                None => {
                    let source = ResolveError::MissingField {
                        record: record.id.to_string(),
                        source_table: record.table.to_string(),
                        field: collate.clone(),
                    };
                    if directive.required {
                        return Err(Self::resolve_error(directive, source));
                    }
                    self.warn_resolve(directive, &source, "record not collated");
                    continue;
                }
            };
            let Some(&index) = groups.get(&group) else {
                groups.insert(group, rows.len());
                rows.push(row);
                continue;
            };
            let merged = &mut rows[index];
            let mut colliding = Vec::new();
            for (key, value) in row {
                if merged.get(&key).is_some_and(|existing| *existing != value)
                    && collisions.insert((group.clone(), key.clone()))
                {
                    colliding.push(key.clone());
                }
                merged.insert(key, value);
            }
            for key in colliding {
                self.warn(
                    directive,
                    Some(record),
                    format!(
                        "collated group \"{group}\": key \"{key}\" has differing values, the later record wins"
                    ),
                );
            }
        }

        if let Some(sort) = &matrix.sort
            && rows.len() > 1
        {
            rows = Self::sort_rows(directive, rows, sort)?;
        }
        Ok(Some(Value::Array(rows.into_iter().map(Value::Object).collect())))
    }

    fn matrix_row(
        &mut self,
        directive: &'a Directive,
        matrix: &'a RecordMatrix,
        record: RecordRef<'a>,
        calling: Option<RecordRef<'a>>,
    ) -> Result<Map<String, Value>> {
        let scope = Scope::new(Some(record), calling);
        let mut row = Map::new();
        for header in &matrix.headers {
            let Some(key) = self.resolve_value(directive, &header.key, scope)? else {
                continue;
            };
            let Some(value) = self.resolve_value(directive, &header.value, scope)? else {
                continue;
            };
            let key = match key {
                Value::String(key) => key,
                other => {
                    let key = value_to_text(&other, ",");
                    self.warn(
                        directive,
                        Some(record),
                        format!(
                            "header key from \"{}\" is {}, cast to the string \"{key}\"",
                            header.key,
                            kind_name(&other)
                        ),
                    );
                    key
                }
            };
            row.insert(key, value);
        }

        if matrix.fields_to_headers {
            let mut overwritten = Vec::new();
            for (field, value) in record.fields {
                if matrix.exclusion_headers.iter().any(|excluded| excluded == field) {
                    continue;
                }
                if row.get(field).is_some_and(|existing| existing != value) {
                    overwritten.push(field.as_str());
                }
                row.insert(field.clone(), value.clone());
            }
            if !overwritten.is_empty() {
                self.warn(
                    directive,
                    Some(record),
                    format!(
                        "record attributes overwrite header values: {}",
                        overwritten.join(", ")
                    ),
                );
            }
        }

        let mut overwritten = Vec::new();
        for field in &matrix.optional_headers {
            let Some(value) = record.get(field) else {
                continue;
            };
            if row.get(field).is_some_and(|existing| existing != value) {
                overwritten.push(field.as_str());
            }
            row.insert(field.clone(), value.clone());
        }
        if !overwritten.is_empty() {
            self.warn(
                directive,
                Some(record),
                format!(
                    "optional headers overwrite header values: {}",
                    overwritten.join(", ")
                ),
            );
        }

        if matrix.values_to_str {
            for value in row.values_mut() {
                if !value.is_string() {
                    *value = Value::String(value_to_text(value, ","));
                }
            }
        }
        Ok(row)
    }

    fn sort_rows(
        directive: &Directive,
        rows: Vec<Map<String, Value>>,
        sort: &SortSpec,
    ) -> Result<Vec<Map<String, Value>>> {
        for (index, row) in rows.iter().enumerate() {
            if let Some(key) = sort.keys.iter().find(|key| !row.contains_key(key.as_str())) {
                return Err(DirectiveError::SortKeyMissing {
                    directive: directive.key.clone(),
                    item: format!("row {index}"),
                    key: key.clone(),
                });
            }
        }
        let mut rows = rows;
        rows.sort_by(|left, right| {
            let left: Vec<&Value> = sort.keys.iter().filter_map(|key| left.get(key)).collect();
            let right: Vec<&Value> = sort.keys.iter().filter_map(|key| right.get(key)).collect();
            let ordering = compare_sort_keys(&left, &right);
            if sort.descending { ordering.reverse() } else { ordering }
        });
        Ok(rows)
    }

    fn eval_section(
        &mut self,
        directive: &'a Directive,
        spec: &'a SectionDirective,
        calling: Option<RecordRef<'a>>,
    ) -> Result<Option<Value>> {
        let scopes = self.select_scopes(directive, &spec.selection, calling)?;
        if spec.selection.for_each {
            let mut values = Vec::with_capacity(scopes.len());
            for scope in scopes {
                values.push(self.invoke(directive, &spec.computation, scope)?);
            }
            return Ok(Some(Value::Array(values)));
        }
        match scopes.into_iter().next() {
            Some(scope) => self.invoke(directive, &spec.computation, scope).map(Some),
            None => Ok(None),
        }
    }
}
