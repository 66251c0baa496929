// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use apk_repack::config::RepackConfig;
use apk_repack::tools::{CommandRunner, Release, ReleaseSource, ToolResolver};
use apk_repack::{Error, Result};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

pub const OLD_URL: &str = "http://old.example/x";
pub const NEW_URL: &str = "http://new.example/y";
pub const PACKAGE: &str = "com.game.app";

pub const SIGNERS_CALL: &str = "invoke-virtual {v0, v1}, Landroid/content/pm/SigningInfo;->getApkContentsSigners()[Landroid/content/pm/Signature;";

/// Write a minimal decompiled application under `root`.
///
/// Contains an asset manifest, one native library carrying the endpoint,
/// one unrelated library, two smali classes (one calling the signer query)
/// and the package metadata files.
pub fn write_decompiled_tree(root: &Path) {
    let write = |relative: &str, content: &[u8]| {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    };

    write(
        "assets/project.manifest",
        format!(r#"{{"packageUrl":"{OLD_URL}","remoteVersionUrl":"{OLD_URL}version"}}"#).as_bytes(),
    );

    let mut lib = b"\x7fELF\x01\x01\x01\x00".to_vec();
    lib.extend_from_slice(OLD_URL.as_bytes());
    lib.extend_from_slice(b"\x00\x14\x00\x00");
    write("lib/armeabi-v7a/libgame.so", &lib);
    write("lib/armeabi-v7a/libc++_shared.so", b"\x7fELF\x01\x01\x01\x00nothing");

    write(
        "smali/com/game/Verifier.smali",
        format!(
            ".class public Lcom/game/Verifier;\n.method check()V\n    {SIGNERS_CALL}\n    move-result-object v2\n.end method\n"
        )
        .as_bytes(),
    );
    write(
        "smali/com/game/Main.smali",
        b".class public Lcom/game/Main;\n.method onCreate()V\n    return-void\n.end method\n",
    );

    write(
        "AndroidManifest.xml",
        format!(
            r#"<?xml version="1.0" encoding="utf-8" standalone="no"?><manifest xmlns:android="http://schemas.android.com/apk/res/android" package="{PACKAGE}"><application android:label="Game"/></manifest>"#
        )
        .as_bytes(),
    );
    write(
        "apktool.yml",
        b"version: 2.9.3\napkFileName: merged.apk\nrenameManifestPackage: null\n",
    );
}

/// Write the pre-built bypass unit expected at the default location
pub fn write_bypass_unit(work_dir: &Path) {
    let config = RepackConfig::default();
    let marker = work_dir.join(&config.bypass.unit_dir).join(&config.bypass.marker);
    fs::create_dir_all(marker.parent().unwrap()).unwrap();
    fs::write(
        marker,
        ".class public Lio/github/charwasp/bypass;\n.super Ljava/lang/Object;\n",
    )
    .unwrap();
}

/// Release index that is never reachable
pub struct OfflineReleases;

impl ReleaseSource for OfflineReleases {
    fn latest_release(&self, project: &str) -> Result<Release> {
        Err(Error::Resolution(format!("offline: {}", project)))
    }

    fn download(&self, url: &str, _dest: &Path) -> Result<()> {
        Err(Error::Resolution(format!("offline: {}", url)))
    }
}

/// Resolver for `config` with nothing installed and no network
pub fn offline_resolver(config: &RepackConfig) -> ToolResolver {
    ToolResolver::new(
        config.tool_specs(),
        config.java_command.clone(),
        &config.work_dir,
        Box::new(OfflineReleases),
    )
    .with_path_lookup(|_| false)
}

/// Config whose tools are all explicit overrides handled by [`FakeTools`]
pub fn fake_tool_config(work_dir: &Path) -> RepackConfig {
    let mut config = RepackConfig::new().with_work_dir(work_dir);
    config.replacement_url = NEW_URL.to_string();
    config.package_suffix = ".mod".to_string();
    config.tools.apkeditor = Some("fake-apkeditor".to_string());
    config.tools.apktool = Some("fake-apktool".to_string());
    config.tools.signing = Some("fake-sign".to_string());
    config
}

/// Stands in for APKEditor, apktool and the signer.
///
/// Records every command line and produces the output each real tool would.
pub struct FakeTools {
    pub log: Rc<RefCell<Vec<String>>>,
    /// Fail any command containing this word
    pub fail_on: Option<&'static str>,
}

impl FakeTools {
    pub fn new() -> (Self, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                log: Rc::clone(&log),
                fail_on: None,
            },
            log,
        )
    }

    pub fn failing_on(word: &'static str) -> (Self, Rc<RefCell<Vec<String>>>) {
        let (mut tools, log) = Self::new();
        tools.fail_on = Some(word);
        (tools, log)
    }
}

impl CommandRunner for FakeTools {
    fn run(&mut self, command: &str) -> Result<()> {
        self.log.borrow_mut().push(command.to_string());
        if let Some(word) = self.fail_on
            && command.contains(word)
        {
            return Err(Error::ExternalTool {
                command: command.to_string(),
                code: Some(1),
            });
        }

        let words: Vec<&str> = command.split_whitespace().collect();
        let output = match words.iter().position(|w| *w == "-o") {
            Some(i) => words[i + 1],
            None => words[words.len() - 1],
        };

        match words.get(1).copied() {
            Some("merge") | Some("build") => fs::write(output, b"PK\x03\x04")?,
            Some("decode") => write_decompiled_tree(Path::new(output)),
            _ => {}
        }
        Ok(())
    }
}
