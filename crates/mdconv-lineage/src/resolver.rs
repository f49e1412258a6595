//! Parent-pointer walk from a sample entity to its root subject.

use indexmap::IndexSet;
use mdconv_model::{Document, RecordRef, scalar_text};
use serde_json::Value;
use tracing::debug;

use crate::config::LineageConfig;
use crate::error::LineageError;

/// Id given to the synthetic step appended for storage protocols.
pub const DATA_FILES_STEP: &str = "data_files";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Ancestor,
    Sibling,
    DataFiles,
}

/// One step of a lineage with the record it reads attributes from.
#[derive(Debug, Clone, Copy)]
pub struct LineageStep<'a> {
    pub kind: StepKind,
    pub record: RecordRef<'a>,
}

impl LineageStep<'_> {
    /// Step id; the storage step is always `data_files`.
    pub fn id(&self) -> &str {
        match self.kind {
            StepKind::DataFiles => DATA_FILES_STEP,
            StepKind::Ancestor | StepKind::Sibling => self.record.id,
        }
    }
}

/// The resolved lineage of one terminal sample.
#[derive(Debug, Clone)]
pub struct Lineage<'a> {
    pub sample: RecordRef<'a>,
    /// Ancestors ordered root first; the sample itself is not included.
    pub ancestors: Vec<RecordRef<'a>>,
    pub siblings: Vec<RecordRef<'a>>,
    /// Storage protocol that produced the `data_files` step, if any.
    pub storage: Option<RecordRef<'a>>,
}

impl<'a> Lineage<'a> {
    /// Ancestors, then siblings, then the storage step.
    pub fn steps(&self) -> Vec<LineageStep<'a>> {
        let ancestors = self.ancestors.iter().map(|record| LineageStep {
            kind: StepKind::Ancestor,
            record: *record,
        });
        let siblings = self.siblings.iter().map(|record| LineageStep {
            kind: StepKind::Sibling,
            record: *record,
        });
        let storage = self.storage.map(|record| LineageStep {
            kind: StepKind::DataFiles,
            record,
        });
        ancestors.chain(siblings).chain(storage).collect()
    }

    /// Nearest ancestor typed as a subject.
    pub fn subject(&self, config: &LineageConfig) -> Option<RecordRef<'a>> {
        self.ancestors
            .iter()
            .rev()
            .find(|record| is_type(record, config, &config.subject_type))
            .copied()
    }
}

fn is_type(record: &RecordRef<'_>, config: &LineageConfig, expected: &str) -> bool {
    record
        .get(&config.type_field)
        .is_some_and(|value| scalar_text(value) == expected)
}

fn parent_id(record: &RecordRef<'_>, config: &LineageConfig) -> Option<String> {
    match record.get(&config.parent_field)? {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        value => Some(scalar_text(value)),
    }
}

fn value_contains(value: &Value, token: &str) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|item| value_contains(item, token)),
        Value::Null | Value::Object(_) => false,
        other => scalar_text(other).contains(token),
    }
}

fn value_texts(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(scalar_text).collect(),
        Value::Null => Vec::new(),
        other => vec![scalar_text(other)],
    }
}

/// Resolves lineages against a read-only document.
#[derive(Debug, Clone, Copy)]
pub struct LineageResolver<'a> {
    document: &'a Document,
    config: &'a LineageConfig,
}

impl<'a> LineageResolver<'a> {
    pub fn new(document: &'a Document, config: &'a LineageConfig) -> Self {
        Self { document, config }
    }

    pub fn config(&self) -> &'a LineageConfig {
        self.config
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// Resolve the lineage of `sample_id`.
    ///
    /// # Errors
    ///
    /// Fails when the sample or one of its parents does not exist, or when the
    /// parent chain loops back on itself.
    pub fn resolve(&self, sample_id: &str) -> Result<Lineage<'a>, LineageError> {
        let table = &self.config.entity_table;
        let sample =
            self.document
                .record(table, sample_id)
                .ok_or_else(|| LineageError::UnknownEntity {
                    id: sample_id.to_string(),
                    table: table.clone(),
                })?;

        let mut visited: IndexSet<&str> = IndexSet::new();
        visited.insert(sample.id);
        let mut ancestors = Vec::new();
        let mut current = sample;
        while let Some(parent) = parent_id(&current, self.config) {
            if visited.contains(parent.as_str()) {
                let mut chain: Vec<&str> = visited.iter().copied().collect();
                chain.push(&parent);
                return Err(LineageError::CyclicLineage {
                    sample: sample_id.to_string(),
                    chain: chain.join(" -> "),
                });
            }
            let record = self.document.record(table, &parent).ok_or_else(|| {
                LineageError::UnresolvedParent {
                    id: current.id.to_string(),
                    parent: parent.clone(),
                    table: table.clone(),
                }
            })?;
            visited.insert(record.id);
            ancestors.push(record);
            current = record;
        }
        ancestors.reverse();

        let siblings = self.siblings(&sample);
        let storage = self.storage_protocol(&sample);
        debug!(
            sample = sample_id,
            depth = ancestors.len(),
            siblings = siblings.len(),
            storage = storage.is_some(),
            "resolved lineage"
        );
        Ok(Lineage {
            sample,
            ancestors,
            siblings,
            storage,
        })
    }

    fn siblings(&self, sample: &RecordRef<'a>) -> Vec<RecordRef<'a>> {
        let Some(parent) = parent_id(sample, self.config) else {
            return Vec::new();
        };
        self.document
            .records(&self.config.entity_table)
            .into_iter()
            .filter(|record| record.id != sample.id)
            .filter(|record| parent_id(record, self.config).as_deref() == Some(parent.as_str()))
            .filter(|record| {
                record
                    .get(&self.config.sibling_field)
                    .is_some_and(|value| value_contains(value, &self.config.sibling_token))
            })
            .collect()
    }

    fn storage_protocol(&self, sample: &RecordRef<'a>) -> Option<RecordRef<'a>> {
        let protocols = sample.get(&self.config.protocol_field)?;
        value_texts(protocols).into_iter().find_map(|protocol_id| {
            self.document
                .record(&self.config.protocol_table, &protocol_id)
                .filter(|protocol| is_type(protocol, self.config, &self.config.storage_type))
        })
    }

    /// Sample ids that end a lineage.
    ///
    /// Samples referenced by measurements come first, in measurement order.
    /// Without any such reference every sample entity that has no child
    /// entity is terminal.
    ///
    /// # Errors
    ///
    /// Fails when a measurement references an entity that does not exist.
    pub fn terminal_samples(&self) -> Result<Vec<&'a str>, LineageError> {
        let entity_table = &self.config.entity_table;
        let mut terminals: IndexSet<&'a str> = IndexSet::new();
        for measurement in self.document.records(&self.config.measurement_table) {
            let Some(value) = measurement.get(&self.config.measurement_entity_field) else {
                continue;
            };
            for id in value_texts(value) {
                let entity = self.document.record(entity_table, &id).ok_or_else(|| {
                    LineageError::UnknownEntity {
                        id: id.clone(),
                        table: entity_table.clone(),
                    }
                })?;
                if is_type(&entity, self.config, &self.config.sample_type) {
                    terminals.insert(entity.id);
                }
            }
        }
        if !terminals.is_empty() {
            return Ok(terminals.into_iter().collect());
        }

        let entities = self.document.records(entity_table);
        let parents: IndexSet<String> = entities
            .iter()
            .filter_map(|record| parent_id(record, self.config))
            .collect();
        Ok(entities
            .iter()
            .filter(|record| is_type(record, self.config, &self.config.sample_type))
            .filter(|record| !parents.contains(record.id))
            .map(|record| record.id)
            .collect())
    }
}
