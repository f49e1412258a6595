use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("input document must be a JSON object mapping table names to tables")]
    NotAnObject,
    #[error("table \"{table}\" must be a JSON object mapping record ids to records")]
    InvalidTable { table: String },
    #[error("record \"{id}\" in table \"{table}\" must be a JSON object")]
    InvalidRecord { table: String, id: String },
    #[error("record \"{id}\" in table \"{table}\" has an \"id\" field ({found}) that differs from its key")]
    MismatchedId {
        table: String,
        id: String,
        found: String,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;
