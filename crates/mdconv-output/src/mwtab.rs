//! mwTab text writer.
//!
//! The assembled tree is checked for the sections an mwTab submission needs
//! before any text is produced, so a rejected tree never leaves a partial file.

use std::fs;
use std::path::Path;

use mdconv_model::value_to_text;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{OutputError, Result};
use crate::format::MwtabKind;

const HEADER_SECTION: &str = "METABOLOMICS WORKBENCH";
const SSF_SECTION: &str = "SUBJECT_SAMPLE_FACTORS";
/// Header keys rendered on the `#METABOLOMICS WORKBENCH` line itself.
const HEADER_IDS: &[&str] = &["STUDY_ID", "ANALYSIS_ID", "PROJECT_ID"];
const HEADER_KEY_WIDTH: usize = 20;
const KEY_WIDTH: usize = 32;
const END_MARKER: &str = "#END";

const SSF_SUBJECT: &str = "Subject ID";
const SSF_SAMPLE: &str = "Sample ID";
const SSF_FACTORS: &str = "Factors";
const SSF_ADDITIONAL: &str = "Additional sample data";

/// One mwTab section: its tree key, `#` header and line prefix.
#[derive(Debug, Clone, Copy)]
pub struct MwtabSection {
    pub name: &'static str,
    pub header: &'static str,
    pub prefix: &'static str,
    pub required: bool,
    only: Option<MwtabKind>,
}

impl MwtabSection {
    const fn new(name: &'static str, header: &'static str, prefix: &'static str) -> Self {
        Self {
            name,
            header,
            prefix,
            required: true,
            only: None,
        }
    }

    const fn only(mut self, kind: MwtabKind) -> Self {
        self.only = Some(kind);
        self
    }

    const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn applies_to(&self, kind: MwtabKind) -> bool {
        self.only.is_none_or(|only| only == kind)
    }
}

/// Every mwTab section in file order.
pub const MWTAB_SECTIONS: &[MwtabSection] = &[
    MwtabSection::new(HEADER_SECTION, HEADER_SECTION, ""),
    MwtabSection::new("PROJECT", "PROJECT", "PR:"),
    MwtabSection::new("STUDY", "STUDY", "ST:"),
    MwtabSection::new("SUBJECT", "SUBJECT", "SU:"),
    MwtabSection::new(SSF_SECTION, SSF_SECTION, ""),
    MwtabSection::new("COLLECTION", "COLLECTION", "CO:"),
    MwtabSection::new("TREATMENT", "TREATMENT", "TR:"),
    MwtabSection::new("SAMPLEPREP", "SAMPLEPREP", "SP:"),
    MwtabSection::new("CHROMATOGRAPHY", "CHROMATOGRAPHY", "CH:").only(MwtabKind::Ms),
    MwtabSection::new("ANALYSIS", "ANALYSIS", "AN:"),
    MwtabSection::new("MS", "MS", "MS:").only(MwtabKind::Ms),
    MwtabSection::new("NM", "NMR", "NM:").only(MwtabKind::Nmr),
    MwtabSection::new("MS_METABOLITE_DATA", "MS_METABOLITE_DATA", "")
        .only(MwtabKind::Ms)
        .optional(),
    MwtabSection::new("NMR_BINNED_DATA", "NMR_BINNED_DATA", "")
        .only(MwtabKind::Nmr)
        .optional(),
];

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// Single-line text for one value.
fn cell(value: &Value, delimiter: &str) -> String {
    value_to_text(value, delimiter).replace(['\t', '\r', '\n'], " ")
}

/// Writes the tab-delimited mwTab rendition of an assembled tree.
#[derive(Debug, Clone, Copy)]
pub struct MwtabWriter {
    kind: MwtabKind,
}

impl MwtabWriter {
    pub fn new(kind: MwtabKind) -> Self {
        Self { kind }
    }

    fn sections(&self) -> impl Iterator<Item = &'static MwtabSection> + '_ {
        MWTAB_SECTIONS
            .iter()
            .filter(|section| section.applies_to(self.kind))
    }

    /// Check that `tree` has the shape an mwTab file needs.
    ///
    /// # Errors
    ///
    /// Fails on a missing required section, a section that belongs to no
    /// mwTab layout for this analysis type, or a section of the wrong shape.
    pub fn validate(&self, tree: &Map<String, Value>) -> Result<()> {
        for name in tree.keys() {
            if !self.sections().any(|section| section.name == name.as_str()) {
                return Err(OutputError::UnknownSection {
                    section: name.clone(),
                });
            }
        }
        for section in self.sections() {
            let Some(value) = tree.get(section.name) else {
                if section.required {
                    return Err(OutputError::MissingSection {
                        section: section.name.to_string(),
                    });
                }
                continue;
            };
            match section.name {
                SSF_SECTION | "MS_METABOLITE_DATA" | "NMR_BINNED_DATA" => {
                    check_rows(section.name, value)?;
                }
                _ => {
                    if !value.is_object() {
                        return Err(OutputError::NotAMapping {
                            section: section.name.to_string(),
                            found: kind_name(value),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Render `tree` as mwTab text.
    pub fn render(&self, tree: &Map<String, Value>) -> Result<String> {
        self.validate(tree)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .flexible(true)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        for section in self.sections() {
            let Some(value) = tree.get(section.name) else {
                continue;
            };
            match (section.name, value) {
                (HEADER_SECTION, Value::Object(fields)) => write_header(&mut writer, fields)?,
                (SSF_SECTION, Value::Array(rows)) => write_ssf(&mut writer, rows)?,
                (_, Value::Array(rows)) => write_data_block(&mut writer, section, rows)?,
                (_, Value::Object(fields)) => write_key_values(&mut writer, section, fields)?,
                _ => {}
            }
        }
        writer.write_record([END_MARKER])?;

        let bytes = writer
            .into_inner()
            .map_err(|error| csv::Error::from(error.into_error()))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        debug!(kind = self.kind.as_str(), bytes = text.len(), "rendered mwTab");
        Ok(text)
    }

    pub fn write(&self, path: &Path, tree: &Map<String, Value>) -> Result<()> {
        let text = self.render(tree)?;
        fs::write(path, text).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn check_rows(section: &str, value: &Value) -> Result<()> {
    let Value::Array(rows) = value else {
        return Err(OutputError::NotARowList {
            section: section.to_string(),
        });
    };
    for (index, row) in rows.iter().enumerate() {
        let Value::Object(fields) = row else {
            return Err(OutputError::NotARowList {
                section: section.to_string(),
            });
        };
        if section == SSF_SECTION && !fields.contains_key(SSF_SAMPLE) {
            return Err(OutputError::MissingRowKey {
                section: section.to_string(),
                index,
                key: SSF_SAMPLE,
            });
        }
    }
    Ok(())
}

type TabWriter = csv::Writer<Vec<u8>>;

fn write_header(writer: &mut TabWriter, fields: &Map<String, Value>) -> Result<()> {
    let mut line = format!("#{HEADER_SECTION}");
    for key in HEADER_IDS {
        if let Some(value) = fields.get(*key) {
            line.push_str(&format!(" {key}:{}", cell(value, ",")));
        }
    }
    writer.write_record([line.as_str()])?;
    for (key, value) in fields {
        if HEADER_IDS.contains(&key.as_str()) {
            continue;
        }
        let key = format!("{key:<HEADER_KEY_WIDTH$}");
        writer.write_record([key.as_str(), cell(value, ",").as_str()])?;
    }
    Ok(())
}

/// Multi-line values repeat their key on each line.
fn write_key_values(
    writer: &mut TabWriter,
    section: &MwtabSection,
    fields: &Map<String, Value>,
) -> Result<()> {
    writer.write_record([format!("#{}", section.header)])?;
    for (key, value) in fields {
        let key = format!("{:<KEY_WIDTH$}", format!("{}{key}", section.prefix));
        let text = value_to_text(value, ", ");
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            let line = line.replace(['\t', '\r'], " ");
            writer.write_record([key.as_str(), line.trim_end()])?;
        }
    }
    Ok(())
}

fn write_ssf(writer: &mut TabWriter, rows: &[Value]) -> Result<()> {
    let label = format!("{:<KEY_WIDTH$}", format!("#{SSF_SECTION}:"));
    writer.write_record([
        label.as_str(),
        "SUBJECT(optional)[tab]SAMPLE[tab]FACTORS(NAME:VALUE pairs separated by |)[tab]Additional sample data",
    ])?;
    let key = format!("{SSF_SECTION:<KEY_WIDTH$}");
    for row in rows.iter().filter_map(Value::as_object) {
        let subject = row
            .get(SSF_SUBJECT)
            .map(|value| cell(value, ","))
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "-".to_string());
        let sample = row.get(SSF_SAMPLE).map(|value| cell(value, ",")).unwrap_or_default();
        let factors = pairs(row.get(SSF_FACTORS), ":", " | ");
        let additional = pairs(row.get(SSF_ADDITIONAL), "=", "; ");
        let mut record = vec![key.clone(), subject, sample, factors];
        if !additional.is_empty() {
            record.push(additional);
        }
        writer.write_record(&record)?;
    }
    Ok(())
}

fn pairs(value: Option<&Value>, separator: &str, delimiter: &str) -> String {
    match value {
        Some(Value::Object(fields)) => fields
            .iter()
            .map(|(key, value)| format!("{key}{separator}{}", cell(value, ",")))
            .collect::<Vec<_>>()
            .join(delimiter),
        Some(other) => cell(other, ","),
        None => String::new(),
    }
}

/// Tabular data blocks: a header row of column names, then one row each.
fn write_data_block(writer: &mut TabWriter, section: &MwtabSection, rows: &[Value]) -> Result<()> {
    writer.write_record([format!("#{}", section.header)])?;
    let mut columns: Vec<&str> = Vec::new();
    for row in rows.iter().filter_map(Value::as_object) {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }
    writer.write_record(&columns)?;
    for row in rows.iter().filter_map(Value::as_object) {
        let record: Vec<String> = columns
            .iter()
            .map(|column| row.get(*column).map(|value| cell(value, ",")).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }
    Ok(())
}
