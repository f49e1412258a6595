//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use mdconv_output::{MwtabKind, TargetFormat};

#[derive(Parser)]
#[command(
    name = "mdconv",
    version,
    about = "Convert metadata documents to mwTab and ISA-JSON",
    long_about = "Convert a table/record JSON document into a submission format.\n\n\
                  Conversion directives describe every output value; the mwtab and isa\n\
                  commands ship with built-in directives that can be updated or replaced."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Do not print conversion warnings (they are still counted).
    #[arg(long, global = true)]
    pub silent: bool,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert with a user-supplied directive document.
    Generic(GenericArgs),

    /// Convert to mwTab; writes <OUTPUT_BASE>.json and <OUTPUT_BASE>.txt.
    Mwtab(MwtabArgs),

    /// Convert to ISA-JSON.
    Isa(IsaArgs),

    /// Print a built-in directive document.
    Directives {
        #[arg(value_enum)]
        format: BuiltinFormatArg,
    },
}

#[derive(Args)]
pub struct GenericArgs {
    /// Input JSON file, or a directory of JSON files to merge.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Conversion directive document.
    #[arg(value_name = "DIRECTIVES")]
    pub directives: PathBuf,

    /// Validate the output against this JSON Schema.
    #[arg(long = "output-schema", value_name = "PATH")]
    pub output_schema: Option<PathBuf>,
}

/// Ways to adjust the built-in directives.
#[derive(Args)]
pub struct DirectiveFlags {
    /// Merge this directive document over the built-in directives.
    #[arg(long, value_name = "PATH", conflicts_with = "replace")]
    pub update: Option<PathBuf>,

    /// Use this directive document instead of the built-in directives.
    #[arg(long = "override", id = "replace", value_name = "PATH")]
    pub replace: Option<PathBuf>,
}

#[derive(Args)]
pub struct MwtabArgs {
    #[arg(value_enum, value_name = "KIND")]
    pub kind: MwtabKindArg,

    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[arg(value_name = "OUTPUT_BASE")]
    pub output: PathBuf,

    #[command(flatten)]
    pub directives: DirectiveFlags,
}

#[derive(Args)]
pub struct IsaArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    #[command(flatten)]
    pub directives: DirectiveFlags,

    #[arg(long = "output-schema", value_name = "PATH")]
    pub output_schema: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MwtabKindArg {
    Ms,
    Nmr,
}

impl From<MwtabKindArg> for MwtabKind {
    fn from(kind: MwtabKindArg) -> Self {
        match kind {
            MwtabKindArg::Ms => Self::Ms,
            MwtabKindArg::Nmr => Self::Nmr,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum BuiltinFormatArg {
    MwtabMs,
    MwtabNmr,
    Isa,
}

impl From<BuiltinFormatArg> for TargetFormat {
    fn from(format: BuiltinFormatArg) -> Self {
        match format {
            BuiltinFormatArg::MwtabMs => Self::Mwtab(MwtabKind::Ms),
            BuiltinFormatArg::MwtabNmr => Self::Mwtab(MwtabKind::Nmr),
            BuiltinFormatArg::Isa => Self::Isa,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
