//! Target formats and the layout each imposes on the assembled tree.

use std::fmt;

use mdconv_directives::update_directives;
use serde_json::Value;

use crate::embedded;
use crate::error::{OutputError, Result};
use crate::mwtab::MWTAB_SECTIONS;

/// Analysis flavour of an mwTab submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MwtabKind {
    Ms,
    Nmr,
}

impl MwtabKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ms => "ms",
            Self::Nmr => "nmr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// User-supplied directives, no fixed layout.
    Generic,
    Mwtab(MwtabKind),
    Isa,
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => f.write_str("generic"),
            Self::Mwtab(kind) => write!(f, "mwtab-{}", kind.as_str()),
            Self::Isa => f.write_str("isa"),
        }
    }
}

const MWTAB_HEADER_KEYS: &[&str] = &[
    "STUDY_ID",
    "ANALYSIS_ID",
    "PROJECT_ID",
    "VERSION",
    "CREATED_ON",
];

const MWTAB_PROJECT_KEYS: &[&str] = &["PROJECT_TITLE", "PROJECT_TYPE", "PROJECT_SUMMARY"];
const MWTAB_STUDY_KEYS: &[&str] = &["STUDY_TITLE", "STUDY_SUMMARY"];
const MWTAB_SUBJECT_KEYS: &[&str] = &["SUBJECT_TYPE", "SUBJECT_SPECIES", "TAXONOMY_ID"];

const ISA_INVESTIGATION_KEYS: &[&str] = &[
    "identifier",
    "title",
    "description",
    "submissionDate",
    "publicReleaseDate",
];

fn parse_embedded(name: &'static str, text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|source| OutputError::EmbeddedDirectives { name, source })
}

impl TargetFormat {
    /// The built-in directive document for this format, if it has one.
    pub fn default_directives(self) -> Result<Option<Value>> {
        let directives = match self {
            Self::Generic => return Ok(None),
            Self::Mwtab(kind) => {
                let base = parse_embedded("mwtab", embedded::MWTAB_BASE)?;
                let variant = match kind {
                    MwtabKind::Ms => parse_embedded("mwtab_ms", embedded::MWTAB_MS)?,
                    MwtabKind::Nmr => parse_embedded("mwtab_nmr", embedded::MWTAB_NMR)?,
                };
                update_directives(&base, &variant)
            }
            Self::Isa => parse_embedded("isa", embedded::ISA)?,
        };
        Ok(Some(directives))
    }

    pub fn layout(self) -> Layout {
        match self {
            Self::Generic => Layout::default(),
            Self::Mwtab(kind) => Layout {
                root: None,
                section_order: MWTAB_SECTIONS
                    .iter()
                    .filter(|section| section.applies_to(kind))
                    .map(|section| section.name)
                    .collect(),
                key_order: vec![
                    ("METABOLOMICS WORKBENCH", MWTAB_HEADER_KEYS),
                    ("PROJECT", MWTAB_PROJECT_KEYS),
                    ("STUDY", MWTAB_STUDY_KEYS),
                    ("SUBJECT", MWTAB_SUBJECT_KEYS),
                ],
            },
            Self::Isa => Layout {
                root: Some("investigation"),
                section_order: vec!["investigation"],
                key_order: vec![("investigation", ISA_INVESTIGATION_KEYS)],
            },
        }
    }
}

/// Ordering rules applied while assembling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    /// Section whose contents become the document root; other sections are
    /// placed inside it.
    pub root: Option<&'static str>,
    /// Leading sections; the rest follow in evaluation order.
    pub section_order: Vec<&'static str>,
    /// Leading keys per section; the rest follow in evaluation order.
    pub key_order: Vec<(&'static str, &'static [&'static str])>,
}

impl Layout {
    pub fn leading_keys(&self, section: &str) -> &'static [&'static str] {
        self.key_order
            .iter()
            .find(|(name, _)| *name == section)
            .map(|(_, keys)| *keys)
            .unwrap_or_default()
    }
}
