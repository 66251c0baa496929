// src/cli/mod.rs
//! CLI definitions for apk-repack
//!
//! Command implementations live in the `commands` module. Running with no
//! subcommand is the same as `run`.

use apk_repack::pipeline::Stage;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod overrides;

pub use overrides::OverrideArgs;

#[derive(Parser)]
#[command(name = "apk-repack")]
#[command(version)]
#[command(about = "Repackage a split APK against a replacement server", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding inputs, artifacts and downloaded tools
    #[arg(short = 'C', long, global = true, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline, resuming after the last finished artifact
    Run(RunArgs),

    /// Show which stages have produced their artifacts
    Status,

    /// Delete the artifacts of a stage and every later stage
    Reset {
        /// Stage name, e.g. `decompiled` or `rebuilt`
        stage: Stage,
    },

    /// Copy pristine snapshots back over the working tree
    Restore {
        /// Resource relative to the decompiled tree (all if omitted)
        resource: Option<PathBuf>,
    },

    /// Resolve every external tool and print its invocation
    Resolve,
}

#[derive(Args, Default)]
pub struct RunArgs {
    /// Directory with the split APK parts
    #[arg(long, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Suffix appended to the package name
    #[arg(long)]
    pub package_suffix: Option<String>,

    /// SVG used for the icon and title screen
    #[arg(long, value_name = "FILE")]
    pub icon: Option<PathBuf>,

    /// Skip the icon and title screen stage
    #[arg(long)]
    pub no_restyle: bool,
}
