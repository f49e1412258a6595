//! Lineage resolution for sample entities.
//!
//! - **resolver**: parent-pointer walk, sibling matching and the storage step
//! - **factors**: factor definitions and first-found extraction along a lineage
//! - **ssf**: subject-sample-factor rows built from lineages and factors

pub mod config;
pub mod error;
pub mod factors;
pub mod resolver;
pub mod ssf;

pub use config::LineageConfig;
pub use error::LineageError;
pub use factors::{FactorDefinition, FactorValues, extract_factors, load_factor_definitions};
pub use resolver::{DATA_FILES_STEP, Lineage, LineageResolver, LineageStep, StepKind};
pub use ssf::subject_sample_factors;
