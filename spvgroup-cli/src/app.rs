use std::path::PathBuf;

use clap::Parser;

/// Default input file, as written by `spirv-dis`.
pub const DEFAULT_INPUT: &str = "before.comp.spvasm";

/// Default output file, as read back by `spirv-as`.
pub const DEFAULT_OUTPUT: &str = "after.comp.spvasm";

/// spvgroup - rewrite shared-memory broadcast and reduction idioms into subgroup operations
#[derive(Debug, Parser)]
#[command(name = "spvgroup", version, about, long_about = None)]
pub struct Cli {
    /// SPIR-V assembly to read.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Where to write the rewritten assembly.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Enable verbose (debug-level) logging output, including program listings.
    #[arg(short, long, overrides_with_all = ["quiet", "no_verbose"])]
    pub verbose: bool,

    /// Disable verbose logging.
    #[arg(long = "no-verbose", overrides_with = "verbose")]
    pub no_verbose: bool,

    /// Only log errors.
    #[arg(short, long, overrides_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Log level for the `spvgroup` crate.
    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else if self.quiet {
            log::LevelFilter::Error
        } else {
            log::LevelFilter::Info
        }
    }
}
