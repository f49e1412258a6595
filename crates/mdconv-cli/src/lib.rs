//! Library side of the `mdconv` command.

pub mod input;
pub mod logging;
pub mod pipeline;
