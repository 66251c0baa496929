// src/config.rs

//! Repackaging configuration
//!
//! One explicit struct handed to the pipeline. Values come from built-in
//! defaults, an optional TOML file, then environment/CLI overrides applied
//! by the binary. Nothing below reads the environment on its own.

use crate::error::{Error, Result};
use crate::tools::{ToolKind, ToolSpec, ToolStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Endpoint written into the manifest and native libraries by default
pub const DEFAULT_REPLACEMENT_URL: &str = "http://127.0.0.1:13839/i-am-so-happy/assets/";

/// Per-tool command overrides; `None` or empty means "discover"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolOverrides {
    pub apkeditor: Option<String>,
    pub apktool: Option<String>,
    pub imagemagick: Option<String>,
    pub signing: Option<String>,
}

/// Keystore used by the built-in signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    /// Keystore file, relative to the work directory
    pub path: PathBuf,
    pub alias: String,
    pub password: String,
    /// Distinguished name for a generated key
    pub dname: String,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("keystore.jks"),
            alias: "charwasp".to_string(),
            password: "000000".to_string(),
            dname: "CN=unknown, OU=unknown, O=unknown, L=unknown, ST=unknown, C=unknown"
                .to_string(),
        }
    }
}

/// Injected signature-verification bypass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BypassConfig {
    /// Pre-built fragment directory, relative to the work directory
    pub unit_dir: PathBuf,
    /// File inside the unit whose presence marks it as injected
    pub marker: PathBuf,
    /// Class descriptor of the replacement implementation
    pub class: String,
}

impl Default for BypassConfig {
    fn default() -> Self {
        Self {
            unit_dir: PathBuf::from("sig-killer"),
            marker: PathBuf::from("io/github/charwasp/bypass.smali"),
            class: "Lio/github/charwasp/bypass;".to_string(),
        }
    }
}

/// Full configuration for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepackConfig {
    /// Directory holding inputs, artifacts and downloaded tools
    pub work_dir: PathBuf,
    /// Split APK parts to merge, relative to the work directory
    pub input_dir: PathBuf,
    /// Java launcher for downloaded `.jar` tools
    pub java_command: String,
    pub tools: ToolOverrides,
    /// New value of the manifest's `packageUrl`; must match the old length
    pub replacement_url: String,
    pub bypass: BypassConfig,
    /// Appended to the original package name
    pub package_suffix: String,
    /// SVG used for the icon and title screen
    pub icon: PathBuf,
    /// Run the optional restyle stage when ImageMagick is available
    pub restyle: bool,
    pub keystore: KeystoreConfig,
}

impl Default for RepackConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            input_dir: PathBuf::from("apk"),
            java_command: "java".to_string(),
            tools: ToolOverrides::default(),
            replacement_url: DEFAULT_REPLACEMENT_URL.to_string(),
            bypass: BypassConfig::default(),
            package_suffix: ".charwasp".to_string(),
            icon: PathBuf::from("icon.svg"),
            restyle: true,
            keystore: KeystoreConfig::default(),
        }
    }
}

impl RepackConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TOML config file; missing keys keep their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parse TOML config text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set the work directory
    pub fn with_work_dir(mut self, work_dir: impl AsRef<Path>) -> Self {
        self.work_dir = work_dir.as_ref().to_path_buf();
        self
    }

    /// Resolve a configured path against the work directory
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }

    /// Signing command used when no override is configured
    pub fn builtin_signing_command(&self) -> String {
        format!(
            "apksigner sign --verbose --ks {} --ks-key-alias {} --ks-pass pass:{} --key-pass pass:{}",
            crate::tools::quote_path(&self.resolve(&self.keystore.path)),
            crate::tools::quote(&self.keystore.alias),
            crate::tools::quote(&self.keystore.password),
            crate::tools::quote(&self.keystore.password),
        )
    }

    /// Keystore generation command for the built-in signer
    pub fn keystore_command(&self) -> String {
        format!(
            "keytool -genkey -v -keystore {} -alias {} -keyalg RSA -keysize 2048 -validity 10000 -storepass {} -keypass {} -dname {}",
            crate::tools::quote_path(&self.resolve(&self.keystore.path)),
            crate::tools::quote(&self.keystore.alias),
            crate::tools::quote(&self.keystore.password),
            crate::tools::quote(&self.keystore.password),
            crate::tools::quote(&self.keystore.dname),
        )
    }

    /// Resolution strategies for every tool, in precedence order
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        fn overridden(value: &Option<String>) -> Option<ToolStrategy> {
            value
                .as_ref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| ToolStrategy::Override(v.clone()))
        }
        fn installed(names: &[&str]) -> ToolStrategy {
            ToolStrategy::Installed(names.iter().map(|n| n.to_string()).collect())
        }
        fn release(project: &str) -> ToolStrategy {
            ToolStrategy::Release {
                project: project.to_string(),
                suffix: ".jar".to_string(),
            }
        }

        let spec = |kind, first: Option<ToolStrategy>, rest: Vec<ToolStrategy>, required| {
            ToolSpec {
                kind,
                strategies: first.into_iter().chain(rest).collect(),
                required,
            }
        };

        vec![
            spec(
                ToolKind::ApkEditor,
                overridden(&self.tools.apkeditor),
                vec![installed(&["APKEditor"]), release("REAndroid/APKEditor")],
                true,
            ),
            spec(
                ToolKind::Apktool,
                overridden(&self.tools.apktool),
                vec![installed(&["apktool"]), release("iBotPeaches/Apktool")],
                true,
            ),
            spec(
                ToolKind::ImageMagick,
                overridden(&self.tools.imagemagick),
                vec![installed(&["magick", "convert"])],
                false,
            ),
            spec(
                ToolKind::Signer,
                overridden(&self.tools.signing),
                vec![ToolStrategy::Builtin(self.builtin_signing_command())],
                true,
            ),
        ]
    }
}
