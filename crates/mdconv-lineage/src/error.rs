use thiserror::Error;

#[derive(Debug, Error)]
pub enum LineageError {
    #[error("entity \"{id}\" was not found in table \"{table}\"")]
    UnknownEntity { id: String, table: String },
    #[error(
        "record \"{id}\" in table \"{table}\" names parent \"{parent}\" which does not exist"
    )]
    UnresolvedParent {
        id: String,
        parent: String,
        table: String,
    },
    #[error("cyclic lineage for sample \"{sample}\": {chain}")]
    CyclicLineage { sample: String, chain: String },
    #[error("factor \"{factor}\" in table \"{table}\": field \"{field}\": {message}")]
    InvalidFactor {
        factor: String,
        table: String,
        field: String,
        message: String,
    },
}
