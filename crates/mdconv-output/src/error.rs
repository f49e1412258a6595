use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("required mwTab section \"{section}\" is missing")]
    MissingSection { section: String },
    #[error("mwTab section \"{section}\" must be a mapping of keys to values, found {found}")]
    NotAMapping {
        section: String,
        found: &'static str,
    },
    #[error("mwTab section \"{section}\" must be a list of row mappings")]
    NotARowList { section: String },
    #[error("row {index} of mwTab section \"{section}\" has no \"{key}\"")]
    MissingRowKey {
        section: String,
        index: usize,
        key: &'static str,
    },
    #[error("\"{section}\" is not an mwTab section")]
    UnknownSection { section: String },
    #[error("embedded directive document \"{name}\" is invalid")]
    EmbeddedDirectives {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, OutputError>;
