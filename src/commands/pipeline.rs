// src/commands/pipeline.rs

//! Pipeline commands: run, status, reset and resolve

use crate::cli::RunArgs;
use anyhow::Result;
use apk_repack::config::RepackConfig;
use apk_repack::pipeline::{FsProbe, Pipeline, Stage, WorkLayout, resume_point, stage_status};
use tracing::info;

/// Run the pipeline to completion
pub fn cmd_run(mut config: RepackConfig, args: RunArgs) -> Result<()> {
    if let Some(input_dir) = args.input_dir {
        config.input_dir = input_dir;
    }
    if let Some(suffix) = args.package_suffix {
        config.package_suffix = suffix;
    }
    if let Some(icon) = args.icon {
        config.icon = icon;
    }
    if args.no_restyle {
        config.restyle = false;
    }

    let mut pipeline = Pipeline::new(config)?;
    let summary = pipeline.run()?;

    if !summary.skipped.is_empty() {
        let names: Vec<&str> = summary.skipped.iter().map(|s| s.name()).collect();
        println!("Reused artifacts from: {}", names.join(", "));
    }
    println!("Modified APK: {}", pipeline.layout().signed_apk().display());
    Ok(())
}

/// Print each stage and whether its artifact exists
pub fn cmd_status(config: &RepackConfig) -> Result<()> {
    let layout = WorkLayout::new(&config.work_dir);
    println!("Work directory: {}", layout.root().display());
    println!();

    for status in stage_status(&layout, &FsProbe) {
        let state = match status.complete {
            Some(true) => "done",
            Some(false) => "pending",
            None => "always",
        };
        let artifact = status
            .checkpoint
            .artifact()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("  {:<18} {:<8} {}", status.stage.name(), state, artifact);
    }

    println!();
    match resume_point(&layout, &FsProbe) {
        Some(stage) => println!("Next run resumes at: {}", stage),
        None => println!("All artifacts present."),
    }
    Ok(())
}

/// Delete artifacts from `stage` onward
pub fn cmd_reset(config: RepackConfig, stage: Stage) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    let removed = pipeline.reset_from(stage)?;

    if removed.is_empty() {
        println!("Nothing to remove from {} onward.", stage);
    }
    for path in &removed {
        println!("Removed {}", path.display());
    }
    Ok(())
}

/// Resolve every tool and print where it came from
pub fn cmd_resolve(config: RepackConfig) -> Result<()> {
    let mut pipeline = Pipeline::new(config)?;
    for (kind, handle) in pipeline.resolve_all()? {
        match handle {
            Some(handle) => println!("{:<12} [{}] {}", kind.name(), handle.provenance, handle.command),
            None => println!("{:<12} not available", kind.name()),
        }
    }
    info!("Tool resolution complete");
    Ok(())
}
