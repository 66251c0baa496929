// src/cli/overrides.rs
//! Tool and endpoint overrides, settable by flag or environment

use apk_repack::config::RepackConfig;
use clap::Args;

#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    /// Java launcher for downloaded .jar tools
    #[arg(long, global = true, env = "JAVA_COMMAND")]
    pub java_command: Option<String>,

    /// Command prefix for APKEditor
    #[arg(long, global = true, env = "APKEDITOR_COMMAND")]
    pub apkeditor_command: Option<String>,

    /// Command prefix for apktool
    #[arg(long, global = true, env = "APKTOOL_COMMAND")]
    pub apktool_command: Option<String>,

    /// Command prefix for ImageMagick
    #[arg(long, global = true, env = "IMAGEMAGICK_COMMAND")]
    pub imagemagick_command: Option<String>,

    /// Signing command; receives the APK path as its last argument
    #[arg(long, global = true, env = "SIGNING_COMMAND")]
    pub signing_command: Option<String>,

    /// Endpoint written into the asset manifest and native libraries
    #[arg(long, global = true, env = "REPLACEMENT_SERVER_URL")]
    pub replacement_url: Option<String>,
}

/// Empty values, e.g. `APKTOOL_COMMAND=`, count as unset
fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

impl OverrideArgs {
    /// Layer these overrides on top of `config`
    pub fn apply(&self, config: &mut RepackConfig) {
        if let Some(java) = present(&self.java_command) {
            config.java_command = java;
        }
        if let Some(url) = present(&self.replacement_url) {
            config.replacement_url = url;
        }

        let tools = &mut config.tools;
        for (slot, value) in [
            (&mut tools.apkeditor, &self.apkeditor_command),
            (&mut tools.apktool, &self.apktool_command),
            (&mut tools.imagemagick, &self.imagemagick_command),
            (&mut tools.signing, &self.signing_command),
        ] {
            if let Some(command) = present(value) {
                *slot = Some(command);
            }
        }
    }
}
