// src/tools/mod.rs

//! External tool plumbing
//!
//! - `resolver`: override → installed binary → released artifact precedence
//! - `release`: release index queries and idempotent downloads
//! - `runner`: exit-status-checked shell invocations

mod release;
mod resolver;
mod runner;

pub use release::{GITHUB_API, GithubReleases, Release, ReleaseAsset, ReleaseSource, fetch_latest};
pub use resolver::{Provenance, ToolHandle, ToolKind, ToolResolver, ToolSpec, ToolStrategy};
pub use runner::{CommandRunner, ShellRunner, quote, quote_path};
