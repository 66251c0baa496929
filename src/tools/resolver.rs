// src/tools/resolver.rs

//! Tool resolution by strategy precedence
//!
//! Each tool carries an ordered list of strategies. The first strategy that
//! yields an invocation wins; the result is cached for the rest of the run
//! and never persisted.

use super::release::{ReleaseSource, fetch_latest};
use super::runner::quote_path;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// External tools the pipeline drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    /// Split-APK merger
    ApkEditor,
    /// Decoder/rebuilder
    Apktool,
    /// Image composition, optional
    ImageMagick,
    /// APK signer
    Signer,
}

impl ToolKind {
    /// All tools in resolution order
    pub fn all() -> &'static [ToolKind] {
        &[Self::ApkEditor, Self::Apktool, Self::ImageMagick, Self::Signer]
    }

    /// Short name used in logs and the CLI
    pub fn name(&self) -> &'static str {
        match self {
            Self::ApkEditor => "apkeditor",
            Self::Apktool => "apktool",
            Self::ImageMagick => "imagemagick",
            Self::Signer => "signer",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where a resolved invocation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Explicit configuration override
    Override,
    /// Binary found on the search path
    Installed,
    /// Released artifact fetched (or found cached) in the work directory
    Downloaded,
    /// Built-in default command line
    Builtin,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Override => write!(f, "override"),
            Self::Installed => write!(f, "installed"),
            Self::Downloaded => write!(f, "downloaded"),
            Self::Builtin => write!(f, "builtin"),
        }
    }
}

/// A resolved tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolHandle {
    /// Which tool this is
    pub kind: ToolKind,
    /// Command prefix; arguments are appended after a space
    pub command: String,
    /// How the command was found
    pub provenance: Provenance,
}

impl ToolHandle {
    /// Full command line with `args` appended
    pub fn invocation(&self, args: &str) -> String {
        if args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, args)
        }
    }
}

/// One way of locating a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStrategy {
    /// Use this command as-is
    Override(String),
    /// First of these binary names found on the search path
    Installed(Vec<String>),
    /// Latest release asset of `project` ending in `suffix`, run with Java
    Release { project: String, suffix: String },
    /// Fixed default command
    Builtin(String),
}

/// Resolution recipe for one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Tool being described
    pub kind: ToolKind,
    /// Strategies in precedence order
    pub strategies: Vec<ToolStrategy>,
    /// Whether failing to resolve is fatal
    pub required: bool,
}

type PathLookup = Box<dyn Fn(&str) -> bool>;

/// Resolves and caches tool invocations for one run
pub struct ToolResolver {
    specs: HashMap<ToolKind, ToolSpec>,
    java_command: String,
    download_dir: PathBuf,
    releases: Box<dyn ReleaseSource>,
    path_lookup: PathLookup,
    cache: HashMap<ToolKind, Option<ToolHandle>>,
}

impl ToolResolver {
    /// Create a resolver that searches `PATH` with `which`
    pub fn new(
        specs: Vec<ToolSpec>,
        java_command: impl Into<String>,
        download_dir: impl AsRef<Path>,
        releases: Box<dyn ReleaseSource>,
    ) -> Self {
        Self {
            specs: specs.into_iter().map(|spec| (spec.kind, spec)).collect(),
            java_command: java_command.into(),
            download_dir: download_dir.as_ref().to_path_buf(),
            releases,
            path_lookup: Box::new(|name: &str| which::which(name).is_ok()),
            cache: HashMap::new(),
        }
    }

    /// Replace the search-path lookup
    pub fn with_path_lookup(mut self, lookup: impl Fn(&str) -> bool + 'static) -> Self {
        self.path_lookup = Box::new(lookup);
        self
    }

    /// Resolve a tool, `None` when an optional tool is unavailable
    pub fn resolve(&mut self, kind: ToolKind) -> Result<Option<ToolHandle>> {
        if let Some(cached) = self.cache.get(&kind) {
            return Ok(cached.clone());
        }

        let spec = self
            .specs
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::Resolution(format!("No resolution strategy configured for {}", kind)))?;

        let mut resolved = None;
        for strategy in &spec.strategies {
            if let Some(handle) = self.try_strategy(kind, strategy)? {
                resolved = Some(handle);
                break;
            }
        }

        match &resolved {
            Some(handle) => info!(
                "Resolved {} ({}): {}",
                kind, handle.provenance, handle.command
            ),
            None if spec.required => {
                return Err(Error::Resolution(format!(
                    "{} could not be located by any strategy",
                    kind
                )));
            }
            None => info!("{} not found, continuing without it", kind),
        }

        self.cache.insert(kind, resolved.clone());
        Ok(resolved)
    }

    /// Resolve a tool that must be present
    pub fn require(&mut self, kind: ToolKind) -> Result<ToolHandle> {
        self.resolve(kind)?
            .ok_or_else(|| Error::Resolution(format!("{} is not available", kind)))
    }

    fn try_strategy(&self, kind: ToolKind, strategy: &ToolStrategy) -> Result<Option<ToolHandle>> {
        let handle = |command: String, provenance| ToolHandle {
            kind,
            command,
            provenance,
        };

        match strategy {
            ToolStrategy::Override(command) if !command.trim().is_empty() => {
                Ok(Some(handle(command.clone(), Provenance::Override)))
            }
            ToolStrategy::Override(_) => Ok(None),
            ToolStrategy::Installed(names) => {
                for name in names {
                    if (self.path_lookup)(name) {
                        return Ok(Some(handle(name.clone(), Provenance::Installed)));
                    }
                    debug!("{} not on search path", name);
                }
                Ok(None)
            }
            ToolStrategy::Release { project, suffix } => {
                let jar = fetch_latest(self.releases.as_ref(), project, suffix, &self.download_dir)?;
                let command = format!("{} -jar {}", self.java_command, quote_path(&jar));
                Ok(Some(handle(command, Provenance::Downloaded)))
            }
            ToolStrategy::Builtin(command) => Ok(Some(handle(command.clone(), Provenance::Builtin))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::release::{Release, ReleaseAsset};
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingSource {
        queries: Rc<Cell<usize>>,
    }

    impl ReleaseSource for CountingSource {
        fn latest_release(&self, _project: &str) -> Result<Release> {
            self.queries.set(self.queries.get() + 1);
            Ok(Release {
                tag_name: None,
                assets: vec![ReleaseAsset {
                    name: "apktool_2.9.3.jar".to_string(),
                    browser_download_url: "https://example.invalid/apktool.jar".to_string(),
                }],
            })
        }

        fn download(&self, _url: &str, dest: &Path) -> Result<()> {
            std::fs::write(dest, b"jar")?;
            Ok(())
        }
    }

    fn apktool_spec(override_command: Option<&str>) -> ToolSpec {
        let mut strategies = Vec::new();
        if let Some(command) = override_command {
            strategies.push(ToolStrategy::Override(command.to_string()));
        }
        strategies.push(ToolStrategy::Installed(vec!["apktool".to_string()]));
        strategies.push(ToolStrategy::Release {
            project: "iBotPeaches/Apktool".to_string(),
            suffix: ".jar".to_string(),
        });
        ToolSpec {
            kind: ToolKind::Apktool,
            strategies,
            required: true,
        }
    }

    fn make_resolver(
        specs: Vec<ToolSpec>,
        dir: &Path,
        installed: &'static [&'static str],
    ) -> (ToolResolver, Rc<Cell<usize>>) {
        let queries = Rc::new(Cell::new(0));
        let source = CountingSource {
            queries: Rc::clone(&queries),
        };
        let resolver = ToolResolver::new(specs, "java", dir, Box::new(source))
            .with_path_lookup(move |name| installed.iter().any(|n| *n == name));
        (resolver, queries)
    }

    #[test]
    fn test_override_wins() {
        let temp = tempfile::tempdir().unwrap();
        let (mut resolver, queries) =
            make_resolver(vec![apktool_spec(Some("java -jar /opt/apktool.jar"))], temp.path(), &["apktool"]);

        let handle = resolver.require(ToolKind::Apktool).unwrap();
        assert_eq!(handle.command, "java -jar /opt/apktool.jar");
        assert_eq!(handle.provenance, Provenance::Override);
        assert_eq!(queries.get(), 0);
    }

    #[test]
    fn test_empty_override_is_absent() {
        let temp = tempfile::tempdir().unwrap();
        let (mut resolver, _) = make_resolver(vec![apktool_spec(Some(""))], temp.path(), &["apktool"]);
        assert_eq!(
            resolver.require(ToolKind::Apktool).unwrap().provenance,
            Provenance::Installed
        );
    }

    #[test]
    fn test_release_fallback_and_cache() {
        let temp = tempfile::tempdir().unwrap();
        let (mut resolver, queries) = make_resolver(vec![apktool_spec(None)], temp.path(), &[]);

        let handle = resolver.require(ToolKind::Apktool).unwrap();
        assert_eq!(handle.provenance, Provenance::Downloaded);
        assert_eq!(
            handle.command,
            format!("java -jar {}", temp.path().join("apktool_2.9.3.jar").display())
        );

        resolver.require(ToolKind::Apktool).unwrap();
        assert_eq!(queries.get(), 1);
    }

    #[test]
    fn test_optional_tool_missing() {
        let temp = tempfile::tempdir().unwrap();
        let spec = ToolSpec {
            kind: ToolKind::ImageMagick,
            strategies: vec![ToolStrategy::Installed(vec![
                "magick".to_string(),
                "convert".to_string(),
            ])],
            required: false,
        };
        let (mut resolver, _) = make_resolver(vec![spec.clone()], temp.path(), &[]);
        assert_eq!(resolver.resolve(ToolKind::ImageMagick).unwrap(), None);
        assert!(matches!(
            resolver.require(ToolKind::ImageMagick),
            Err(Error::Resolution(_))
        ));

        let (mut resolver, _) = make_resolver(vec![spec], temp.path(), &["convert"]);
        assert_eq!(
            resolver.require(ToolKind::ImageMagick).unwrap().command,
            "convert"
        );
    }

    #[test]
    fn test_required_tool_missing() {
        let temp = tempfile::tempdir().unwrap();
        let spec = ToolSpec {
            kind: ToolKind::ApkEditor,
            strategies: vec![ToolStrategy::Installed(vec!["APKEditor".to_string()])],
            required: true,
        };
        let (mut resolver, _) = make_resolver(vec![spec], temp.path(), &[]);
        assert!(matches!(
            resolver.resolve(ToolKind::ApkEditor),
            Err(Error::Resolution(_))
        ));
        assert!(resolver.resolve(ToolKind::Signer).is_err());
    }

    #[test]
    fn test_invocation() {
        let handle = ToolHandle {
            kind: ToolKind::Apktool,
            command: "apktool".to_string(),
            provenance: Provenance::Installed,
        };
        assert_eq!(handle.invocation("build decompiled"), "apktool build decompiled");
        assert_eq!(handle.invocation(""), "apktool");
    }
}
