// src/tools/release.rs

//! Release index queries and artifact downloads
//!
//! When a tool is neither overridden nor installed, the latest released
//! artifact of its upstream project is fetched into the work directory.
//! The fetch is idempotent: an existing file with the asset's name counts
//! as already downloaded and is never overwritten.

use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default release index
pub const GITHUB_API: &str = "https://api.github.com";

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// One downloadable file of a release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    /// File name of the asset
    pub name: String,
    /// Direct download URL
    pub browser_download_url: String,
}

/// A published release
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Release tag, informational only
    #[serde(default)]
    pub tag_name: Option<String>,
    /// Attached files
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// First asset whose name ends with `suffix`
    pub fn asset_with_suffix(&self, suffix: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name.ends_with(suffix))
    }
}

/// Source of release metadata and asset bytes
pub trait ReleaseSource {
    /// Latest release of `project` (an `owner/name` slug)
    fn latest_release(&self, project: &str) -> Result<Release>;

    /// Download `url` to `dest`
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// GitHub releases over HTTPS
pub struct GithubReleases {
    client: Client,
    api_base: String,
}

impl GithubReleases {
    /// Client for the public GitHub API
    pub fn new() -> Result<Self> {
        Self::with_api_base(GITHUB_API)
    }

    /// Client for a GitHub-compatible API at `api_base`
    pub fn with_api_base(api_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("apk-repack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Resolution(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

impl ReleaseSource for GithubReleases {
    fn latest_release(&self, project: &str) -> Result<Release> {
        let url = format!("{}/repos/{}/releases/latest", self.api_base, project);
        info!("Querying latest release of {}", project);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .map_err(|e| Error::Resolution(format!("Failed to fetch {}: {e}", url)))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::Resolution(format!(
                "Failed to fetch latest release from {}: HTTP {}",
                project,
                response.status()
            )));
        }

        response.json().map_err(|e| {
            Error::Resolution(format!("Failed to parse release index for {}: {e}", project))
        })
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Resolution(format!("Failed to download {}: {e}", url)))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::Resolution(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let display_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_string());
        let progress = create_progress_bar(response.content_length(), &display_name);

        let temp_path = download_temp_path(dest);
        let result = stream_to_file(&mut response, &temp_path, &progress, url).and_then(|()| {
            fs::rename(&temp_path, dest).map_err(|e| {
                Error::IoError(format!(
                    "Failed to move {} to {}: {e}",
                    temp_path.display(),
                    dest.display()
                ))
            })
        });
        progress.finish_and_clear();

        if result.is_err()
            && temp_path.exists()
            && let Err(e) = fs::remove_file(&temp_path)
        {
            debug!("Failed to remove {}: {e}", temp_path.display());
        }
        result
    }
}

/// Partial download of `dest`, e.g. `apktool_2.9.3.jar.tmp`
fn download_temp_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn stream_to_file(
    response: &mut impl Read,
    path: &Path,
    progress: &ProgressBar,
    url: &str,
) -> Result<()> {
    let mut file = File::create(path)
        .map_err(|e| Error::IoError(format!("Failed to create file {}: {e}", path.display())))?;

    let mut buffer = [0u8; STREAM_BUFFER_SIZE];
    loop {
        let read = response
            .read(&mut buffer)
            .map_err(|e| Error::Resolution(format!("Failed to read {}: {e}", url)))?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;
        progress.inc(read as u64);
    }
    file.sync_all()?;
    Ok(())
}

fn create_progress_bar(total: Option<u64>, name: &str) -> ProgressBar {
    let pb = match total {
        Some(size) => {
            let pb = ProgressBar::new(size);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec}) {msg}")
            {
                pb.set_style(style);
            }
            pb
        }
    };
    pb.set_message(name.to_string());
    pb
}

/// Make the latest `suffix` asset of `project` available in `dest_dir`
///
/// Returns the local path. An existing file of the asset's name is reused
/// without any request for the asset itself.
pub fn fetch_latest(
    source: &dyn ReleaseSource,
    project: &str,
    suffix: &str,
    dest_dir: &Path,
) -> Result<PathBuf> {
    let release = source.latest_release(project)?;
    let asset = release.asset_with_suffix(suffix).ok_or_else(|| {
        Error::Resolution(format!(
            "No asset ending in {} in the latest release of {}",
            suffix, project
        ))
    })?;

    let name = Path::new(&asset.name)
        .file_name()
        .ok_or_else(|| Error::Resolution(format!("Unusable asset name {:?}", asset.name)))?;
    let dest = dest_dir.join(name);

    if dest.exists() {
        info!("{} already exists, skipping download.", asset.name);
        return Ok(dest);
    }

    info!("Downloading {} from {}...", asset.name, asset.browser_download_url);
    source.download(&asset.browser_download_url, &dest)?;
    debug!("Saved {}", dest.display());
    Ok(dest)
}
