//! Ordered table-of-records document.
//!
//! The document keeps the insertion order of tables and records as they
//! appear in the source JSON, so "first record in table" is stable across runs.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{ModelError, Result};

/// A single record: an ordered mapping from field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Records of one table keyed by record id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    records: IndexMap<String, Record>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    /// Insert a record, returning the previous record stored under the same id.
    pub fn insert(&mut self, id: impl Into<String>, record: Record) -> Option<Record> {
        self.records.insert(id.into(), record)
    }

    pub fn first(&self) -> Option<(&str, &Record)> {
        self.records
            .first()
            .map(|(id, record)| (id.as_str(), record))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.records.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

/// A borrowed record together with where it came from.
#[derive(Debug, Clone, Copy)]
pub struct RecordRef<'a> {
    pub table: &'a str,
    pub id: &'a str,
    pub fields: &'a Record,
}

impl<'a> RecordRef<'a> {
    pub fn new(table: &'a str, id: &'a str, fields: &'a Record) -> Self {
        Self { table, id, fields }
    }

    /// Look up a field by name, see [`lookup_field`].
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        lookup_field(self.fields, field)
    }
}

/// Resolve `field` on `record`.
///
/// A literal key always wins; otherwise a dotted name walks nested mappings
/// (`"source.name"` reads `record["source"]["name"]`).
pub fn lookup_field<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(field) {
        return Some(value);
    }
    if !field.contains('.') {
        return None;
    }
    let mut parts = field.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// The whole input: table name → table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    tables: IndexMap<String, Table>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Build a document from parsed JSON.
    ///
    /// Records lacking an `id` field get one from their key; a record whose
    /// `id` disagrees with its key is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(raw_tables) = value else {
            return Err(ModelError::NotAnObject);
        };
        let mut document = Document::new();
        for (table_name, raw_table) in raw_tables {
            let Value::Object(raw_records) = raw_table else {
                return Err(ModelError::InvalidTable { table: table_name });
            };
            let mut table = Table::new();
            for (id, raw_record) in raw_records {
                let Value::Object(mut record) = raw_record else {
                    return Err(ModelError::InvalidRecord {
                        table: table_name,
                        id,
                    });
                };
                match record.get("id") {
                    None => {
                        record.insert("id".to_string(), Value::String(id.clone()));
                    }
                    Some(Value::String(found)) if found == &id => {}
                    Some(found) => {
                        return Err(ModelError::MismatchedId {
                            table: table_name,
                            id,
                            found: found.to_string(),
                        });
                    }
                }
                table.insert(id, record);
            }
            document.tables.insert(table_name, table);
        }
        Ok(document)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_mut(&mut self, name: &str) -> &mut Table {
        self.tables.entry(name.to_string()).or_default()
    }

    pub fn record(&self, table: &str, id: &str) -> Option<RecordRef<'_>> {
        let (table_name, records) = self.tables.get_key_value(table)?;
        let (id, fields) = records.records.get_key_value(id)?;
        Some(RecordRef::new(table_name, id, fields))
    }

    /// All records of `table` in document order; empty when the table is absent.
    pub fn records<'a>(&'a self, table: &str) -> Vec<RecordRef<'a>> {
        match self.tables.get_key_value(table) {
            Some((table_name, records)) => records
                .iter()
                .map(|(id, fields)| RecordRef::new(table_name, id, fields))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn record_count(&self) -> usize {
        self.tables.values().map(Table::len).sum()
    }

    /// Merge another document into this one, table by table.
    ///
    /// Returns `(table, id)` for every record that replaced an existing one.
    pub fn merge(&mut self, other: Document) -> Vec<(String, String)> {
        let mut replaced = Vec::new();
        for (table_name, table) in other.tables {
            let target = self.tables.entry(table_name.clone()).or_default();
            for (id, record) in table.records {
                if target.insert(id.clone(), record).is_some() {
                    replaced.push((table_name.clone(), id));
                }
            }
        }
        replaced
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.tables.serialize(serializer)
    }
}
