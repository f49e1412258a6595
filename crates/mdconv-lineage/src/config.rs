/// Table and field names the lineage resolver reads.
///
/// Defaults follow the internal document conventions: entities live in
/// `entity` with a `type` of `subject` or `sample` and point at their parent
/// through `parentID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageConfig {
    pub entity_table: String,
    pub protocol_table: String,
    pub factor_table: String,
    pub measurement_table: String,
    /// Field on measurement records naming the measured entity.
    pub measurement_entity_field: String,
    pub parent_field: String,
    pub type_field: String,
    pub subject_type: String,
    pub sample_type: String,
    /// Field on entity records listing the protocols applied to them.
    pub protocol_field: String,
    /// Protocol `type` that triggers the `data_files` pseudo-step.
    pub storage_type: String,
    /// Field tested when matching siblings.
    pub sibling_field: String,
    /// Token the sibling field must contain.
    pub sibling_token: String,
    /// Sample field carrying raw data file names.
    pub raw_data_field: String,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            entity_table: "entity".to_string(),
            protocol_table: "protocol".to_string(),
            factor_table: "factor".to_string(),
            measurement_table: "measurement".to_string(),
            measurement_entity_field: "entity.id".to_string(),
            parent_field: "parentID".to_string(),
            type_field: "type".to_string(),
            subject_type: "subject".to_string(),
            sample_type: "sample".to_string(),
            protocol_field: "protocol.id".to_string(),
            storage_type: "storage".to_string(),
            sibling_field: "protocol.id".to_string(),
            sibling_token: "protein_extraction".to_string(),
            raw_data_field: "raw_data".to_string(),
        }
    }
}

impl LineageConfig {
    /// Use a different sibling predicate.
    #[must_use]
    pub fn with_sibling_predicate(
        mut self,
        field: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        self.sibling_field = field.into();
        self.sibling_token = token.into();
        self
    }
}
