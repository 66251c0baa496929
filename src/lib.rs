// src/lib.rs

//! APK repackaging patch engine
//!
//! Takes a split APK, merges and decompiles it, rewrites it to talk to a
//! replacement server, then rebuilds and signs the result.
//!
//! # Architecture
//!
//! - Overlay: every touched resource gets a pristine snapshot before its
//!   first write; patches are always computed from that snapshot
//! - Patchers: ordered text and byte substitution rules, with fixed-width
//!   fields checked before anything is written
//! - Rewriter: one call-site rule applied across every fragment under a glob
//! - Tools: override, installed binary, then released artifact
//! - Pipeline: stages checkpointed by their output files, so a failed run
//!   resumes where it stopped

pub mod config;
mod error;
pub mod overlay;
pub mod patch;
pub mod pipeline;
pub mod rewrite;
pub mod tools;

pub use config::RepackConfig;
pub use error::{Error, Result};
pub use overlay::Overlay;
pub use patch::{BinaryPatcher, ByteRule, PatchOutcome, TextPatcher, TextRule};
pub use pipeline::{Pipeline, Stage};
pub use rewrite::{RewriteReport, StructuralRewriter};
pub use tools::{ToolHandle, ToolKind, ToolResolver};
