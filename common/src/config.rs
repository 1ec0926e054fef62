//! Configuration parsing – reads `jennov-offloader.toml` and the
//! separate secrets file holding the device credentials.
//!
//! ```toml
//! download_directory = "./downloads"
//! log_level = "info"
//! log_format = "full"
//! file_extension = "mp4"
//! timeout_secs = 600
//!
//! [cameras.marysville1]
//! id = "cam01"
//! ip_address = "192.168.1.50"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::camera::{CameraDescriptor, CameraRegistry, ConfigError};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the local download tree; one sub-directory per camera id.
    pub download_dir: PathBuf,
    /// Default log filter when neither `RUST_LOG` nor `-v` is given.
    pub log_level: String,
    pub log_format: LogFormat,
    /// Extension of downloaded files, without the dot.
    pub file_extension: String,
    /// Whole-request timeout for device HTTP calls (seconds).
    pub timeout_secs: u64,
    pub cameras: CameraRegistry,
}

impl Config {
    /// Default config path, relative to the working directory.
    pub fn default_path() -> &'static str {
        "jennov-offloader.toml"
    }
}

/// Layout of log lines on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Timestamp, level, target and message.
    #[default]
    Full,
    /// Single short line per event.
    Compact,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigFile {
    download_directory: PathBuf,
    log_level: String,
    log_format: LogFormat,
    file_extension: String,
    timeout_secs: u64,
    cameras: BTreeMap<String, CameraSection>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            download_directory: PathBuf::from("./downloads"),
            log_level: "info".into(),
            log_format: LogFormat::default(),
            file_extension: "mp4".into(),
            timeout_secs: 600,
            cameras: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CameraSection {
    id: String,
    ip_address: String,
}

/// Read and validate the config file at `path`.
pub fn load(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config: {}", path.display()))?;

    let config = parse_config(&text)
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    info!(
        "Loaded config from {} ({} camera(s))",
        path.display(),
        config.cameras.len()
    );
    Ok(config)
}

/// Parse config text and build the camera registry.
pub fn parse_config(text: &str) -> Result<Config> {
    let file: ConfigFile = toml::from_str(text).context("Cannot parse TOML")?;

    let cameras = CameraRegistry::new(file.cameras.into_iter().map(|(name, section)| {
        CameraDescriptor {
            name,
            id: section.id,
            address: section.ip_address,
        }
    }))?;

    Ok(Config {
        download_dir: file.download_directory,
        log_level: file.log_level,
        log_format: file.log_format,
        file_extension: file.file_extension.trim_start_matches('.').to_string(),
        timeout_secs: file.timeout_secs,
        cameras,
    })
}

// ── credentials ──────────────────────────────────────────────────────────

/// Device credentials, shared by every camera.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub userid: String,
    #[serde(default)]
    pub passwd_hash: String,
}

impl Credentials {
    /// Default secrets path, relative to the working directory.
    pub fn default_path() -> &'static str {
        "jennov-offloader-secrets.toml"
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("userid", &self.userid)
            .field("passwd_hash", &"<redacted>")
            .finish()
    }
}

/// Read the secrets file.  `username` / `password` may be present but
/// the device protocol only uses `userid` and `passwd_hash`.
pub fn load_credentials(path: &Path) -> Result<Credentials> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read secrets: {}", path.display()))?;
    parse_credentials(&text).with_context(|| format!("Invalid secrets: {}", path.display()))
}

pub fn parse_credentials(text: &str) -> Result<Credentials> {
    let creds: Credentials = toml::from_str(text).context("Cannot parse TOML")?;
    if creds.userid.trim().is_empty() {
        return Err(ConfigError::MissingCredential("userid").into());
    }
    if creds.passwd_hash.trim().is_empty() {
        return Err(ConfigError::MissingCredential("passwd_hash").into());
    }
    Ok(creds)
}

// ─── tests ───────────────────────────────────────────────────────────────
