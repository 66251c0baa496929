// src/commands/mod.rs
//! Command handlers for the apk-repack CLI

mod pipeline;
mod restore;

pub use pipeline::{cmd_reset, cmd_resolve, cmd_run, cmd_status};
pub use restore::cmd_restore;

use crate::cli::OverrideArgs;
use anyhow::{Context, Result};
use apk_repack::config::RepackConfig;
use std::path::Path;
use tracing::debug;

/// Build the run configuration: defaults, then the file, then flags/env
pub fn load_config(
    config_file: Option<&Path>,
    work_dir: Option<&Path>,
    overrides: &OverrideArgs,
) -> Result<RepackConfig> {
    let mut config = match config_file {
        Some(path) => RepackConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => RepackConfig::new(),
    };

    if let Some(dir) = work_dir {
        config.work_dir = dir.to_path_buf();
    }
    overrides.apply(&mut config);

    debug!("Configuration: {:?}", config);
    Ok(config)
}
