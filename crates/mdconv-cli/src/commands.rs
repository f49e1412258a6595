use anyhow::{Context, Result};
use mdconv_cli::input::{DirectiveSource, format_directives, load_document, read_json};
use mdconv_cli::pipeline::{RunOptions, RunResult, run};
use mdconv_output::{TargetFormat, to_json_string};
use tracing::info;

use crate::cli::{BuiltinFormatArg, DirectiveFlags, GenericArgs, IsaArgs, MwtabArgs};

fn directive_source(flags: &DirectiveFlags) -> DirectiveSource {
    DirectiveSource::from_flags(flags.update.clone(), flags.replace.clone())
}

pub fn run_generic(args: &GenericArgs, silent: bool) -> Result<RunResult> {
    let (document, warnings) = load_document(&args.input)?;
    let directives = read_json(&args.directives).context("load conversion directives")?;
    info!(input = %args.input.display(), "converting with user directives");
    run(
        &document,
        &directives,
        warnings,
        &RunOptions {
            format: TargetFormat::Generic,
            output: args.output.clone(),
            output_schema: args.output_schema.clone(),
            silent,
        },
    )
}

pub fn run_mwtab(args: &MwtabArgs, silent: bool) -> Result<RunResult> {
    let format = TargetFormat::Mwtab(args.kind.into());
    let (document, warnings) = load_document(&args.input)?;
    let directives = format_directives(format, &directive_source(&args.directives))?;
    run(
        &document,
        &directives,
        warnings,
        &RunOptions {
            format,
            output: args.output.clone(),
            output_schema: None,
            silent,
        },
    )
}

pub fn run_isa(args: &IsaArgs, silent: bool) -> Result<RunResult> {
    let format = TargetFormat::Isa;
    let (document, warnings) = load_document(&args.input)?;
    let directives = format_directives(format, &directive_source(&args.directives))?;
    run(
        &document,
        &directives,
        warnings,
        &RunOptions {
            format,
            output: args.output.clone(),
            output_schema: args.output_schema.clone(),
            silent,
        },
    )
}

pub fn print_directives(format: BuiltinFormatArg) -> Result<()> {
    let directives = format_directives(format.into(), &DirectiveSource::Builtin)?;
    print!("{}", to_json_string(&directives)?);
    Ok(())
}
