mod app;

use anyhow::Context;
use clap::Parser;
use spvgroup::{TransformConfig, Transformer};

use crate::app::Cli;

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .context("failed to set Ctrl+C handler")?;

    let cli = Cli::parse();

    // --verbose enables debug, --quiet errors only; RUST_LOG overrides
    env_logger::Builder::new()
        .filter_module("spvgroup", cli.log_level())
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let transformer = Transformer::new(TransformConfig::default());
    let report = transformer
        .process_file(&cli.input, &cli.output)
        .with_context(|| {
            format!(
                "failed to transform {} into {}",
                cli.input.display(),
                cli.output.display()
            )
        })?;

    if !cli.quiet {
        eprintln!(
            "{} -> {}: {} ({:.2?})",
            cli.input.display(),
            cli.output.display(),
            report.summary(),
            report.total_time
        );
    }
    Ok(())
}
