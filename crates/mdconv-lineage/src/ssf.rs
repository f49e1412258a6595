//! Subject-sample-factor rows.

use indexmap::IndexSet;
use mdconv_model::{Diagnostic, Diagnostics, value_to_text};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::LineageError;
use crate::factors::{FactorValues, extract_factors, load_factor_definitions};
use crate::resolver::{Lineage, LineageResolver, StepKind};

const SUBJECT_KEY: &str = "Subject ID";
const SAMPLE_KEY: &str = "Sample ID";
const FACTORS_KEY: &str = "Factors";
const ADDITIONAL_KEY: &str = "Additional sample data";
const RAW_FILE_KEY: &str = "RAW_FILE_NAME";

/// Build one subject-sample-factor row per terminal sample.
///
/// Warns once about factors that are defined but never observed, and once per
/// sample lacking any factor observed elsewhere.
///
/// # Errors
///
/// Fails on any lineage integrity error or invalid factor definition.
pub fn subject_sample_factors(
    resolver: &LineageResolver<'_>,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Value>, LineageError> {
    let config = resolver.config();
    let definitions = load_factor_definitions(resolver.document(), config)?;
    let samples = resolver.terminal_samples()?;

    let mut rows = Vec::with_capacity(samples.len());
    let mut found_per_sample: Vec<(&str, FactorValues)> = Vec::with_capacity(samples.len());
    for sample_id in samples {
        let lineage = resolver.resolve(sample_id)?;
        let factors = extract_factors(&lineage, &definitions);
        let subject_id = match lineage.subject(config) {
            Some(subject) => subject.id.to_string(),
            None => {
                diagnostics.push(
                    Diagnostic::warning(format!(
                        "no ancestor of type \"{}\" found; using the lineage root as subject",
                        config.subject_type
                    ))
                    .with_record(&config.entity_table, sample_id),
                );
                lineage
                    .ancestors
                    .first()
                    .map_or(sample_id, |root| root.id)
                    .to_string()
            }
        };

        let mut row = Map::new();
        row.insert(SUBJECT_KEY.to_string(), Value::String(subject_id));
        row.insert(SAMPLE_KEY.to_string(), Value::String(sample_id.to_string()));
        let factor_map: Map<String, Value> = factors
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value_to_text(value, ","))))
            .collect();
        row.insert(FACTORS_KEY.to_string(), Value::Object(factor_map));
        row.insert(
            ADDITIONAL_KEY.to_string(),
            Value::Object(additional_sample_data(&lineage, resolver)),
        );
        rows.push(Value::Object(row));
        found_per_sample.push((sample_id, factors));
    }

    let observed: IndexSet<&str> = found_per_sample
        .iter()
        .flat_map(|(_, factors)| factors.keys().map(String::as_str))
        .collect();
    let never_observed: Vec<&str> = definitions
        .iter()
        .map(|definition| definition.name.as_str())
        .filter(|name| !observed.contains(name))
        .collect();
    if !never_observed.is_empty() {
        diagnostics.push(
            Diagnostic::warning(format!(
                "factors defined in table \"{}\" but never observed in any sample lineage: {}",
                config.factor_table,
                never_observed.join(", ")
            )),
        );
    }
    for (sample_id, factors) in &found_per_sample {
        let missing: Vec<&str> = observed
            .iter()
            .copied()
            .filter(|name| !factors.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            diagnostics.push(
                Diagnostic::warning(format!(
                    "sample lineage is missing factors: {}",
                    missing.join(", ")
                ))
                .with_record(&config.entity_table, *sample_id),
            );
        }
    }
    info!(
        sample_count = rows.len(),
        factor_count = definitions.len(),
        "built subject-sample-factor rows"
    );
    Ok(rows)
}

fn additional_sample_data(
    lineage: &Lineage<'_>,
    resolver: &LineageResolver<'_>,
) -> Map<String, Value> {
    let config = resolver.config();
    let mut data = Map::new();
    if let Some(raw) = lineage.sample.get(&config.raw_data_field) {
        data.insert(
            RAW_FILE_KEY.to_string(),
            Value::String(value_to_text(raw, ",")),
        );
    }
    for (index, step) in lineage.steps().iter().enumerate() {
        data.insert(
            format!("lineage{index}_id"),
            Value::String(step.id().to_string()),
        );
        if step.kind == StepKind::DataFiles {
            data.insert(
                format!("lineage{index}_{}", config.protocol_field),
                Value::String(step.record.id.to_string()),
            );
        }
        for (field, value) in step.record.fields {
            if field == "id" || *field == config.parent_field {
                continue;
            }
            data.insert(
                format!("lineage{index}_{field}"),
                Value::String(value_to_text(value, ",")),
            );
        }
    }
    data
}
