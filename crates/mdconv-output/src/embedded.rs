//! Built-in directive documents, embedded at compile time.
//!
//! The mwTab variants are partial documents merged over the shared mwTab base.

// =============================================================================
// mwTab
// =============================================================================

/// Sections shared by every mwTab analysis type.
pub const MWTAB_BASE: &str = include_str!("../data/directives/mwtab.json");

/// Mass spectrometry sections.
pub const MWTAB_MS: &str = include_str!("../data/directives/mwtab_ms.json");

/// NMR sections.
pub const MWTAB_NMR: &str = include_str!("../data/directives/mwtab_nmr.json");

// =============================================================================
// ISA-JSON
// =============================================================================

pub const ISA: &str = include_str!("../data/directives/isa.json");
