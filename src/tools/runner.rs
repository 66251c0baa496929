// src/tools/runner.rs

//! External command execution
//!
//! Tools are invoked as shell command strings, because overrides are
//! arbitrary prefixes such as `java -Xmx2g -jar apktool.jar`. Output is
//! passed through to the terminal; only the exit status is inspected.

use crate::error::{Error, Result};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Runs one command line to completion
pub trait CommandRunner {
    /// Run `command`, failing with [`Error::ExternalTool`] on a non-zero exit
    fn run(&mut self, command: &str) -> Result<()>;
}

/// Runs commands through `sh -c` in a fixed directory
#[derive(Debug, Clone)]
pub struct ShellRunner {
    work_dir: PathBuf,
}

impl ShellRunner {
    /// Create a runner whose commands execute in `work_dir`
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&mut self, command: &str) -> Result<()> {
        info!("Executing command: {}", command);

        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.work_dir)
            .status()
            .map_err(|e| Error::IoError(format!("Failed to spawn `{}`: {e}", command)))?;

        if !status.success() {
            return Err(Error::ExternalTool {
                command: command.to_string(),
                code: status.code(),
            });
        }

        Ok(())
    }
}

/// Quote a single shell word when it contains anything unusual
pub fn quote(word: &str) -> Cow<'_, str> {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
    if plain {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}

/// Quote a path as a shell word
pub fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy()).into_owned()
}
