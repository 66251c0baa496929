// src/commands/restore.rs

//! Restore command - put pristine snapshots back into the working tree
//!
//! Snapshots are kept after restoring, so the next run patches the restored
//! files again from the same baseline.

use anyhow::Result;
use apk_repack::config::RepackConfig;
use apk_repack::pipeline::WorkLayout;
use std::path::Path;

/// Restore one resource, or every snapshotted resource when `None`
pub fn cmd_restore(config: &RepackConfig, resource: Option<&Path>) -> Result<()> {
    let overlay = WorkLayout::new(&config.work_dir).overlay();

    match resource {
        Some(resource) => {
            if overlay.restore(resource)? {
                println!("Restored {}", resource.display());
            } else {
                println!("{} has no snapshot; it is already pristine.", resource.display());
            }
        }
        None => {
            let restored = overlay.restore_all()?;
            println!("Restored {} resources.", restored);
        }
    }
    Ok(())
}
