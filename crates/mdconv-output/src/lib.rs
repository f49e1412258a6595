//! Output assembly and serialization.
//!
//! - **assemble**: merges directive outputs into an ordered tree
//! - **format**: target formats, their layouts and built-in directives
//! - **json**: pretty JSON writer
//! - **mwtab**: tab-delimited mwTab writer with structural checks

mod assemble;
pub mod embedded;
mod error;
mod format;
mod json;
mod mwtab;

pub use assemble::assemble;
pub use error::{OutputError, Result};
pub use format::{Layout, MwtabKind, TargetFormat};
pub use json::{to_json_string, write_json};
pub use mwtab::{MWTAB_SECTIONS, MwtabSection, MwtabWriter};
