use anyhow::{Context, Result, bail};
use reqwest::Client;
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTP client settings (optional `[http]` section).
///
/// The range reader never imposes timeouts itself; bounded latency is a
/// property of the client built here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds, covering the body of an open stream.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Connection establishment timeout in seconds.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Overrides the default `rangezip/<version>` user agent.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl HttpConfig {
    /// Build the client used for probes and range requests.
    ///
    /// Redirects and proxies are disabled.
    pub fn build_client(&self) -> Result<Client> {
        let user_agent = self
            .user_agent
            .clone()
            .unwrap_or_else(|| concat!("rangezip/", env!("CARGO_PKG_VERSION")).to_string());
        let mut builder = Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::none())
            .no_proxy();
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        builder.build().context("failed to build HTTP client")
    }
}

/// Snapshot bootstrap settings (optional `[bootstrap]` section).
///
/// Both `target` and `source` must be set for a bootstrap to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// File that must exist locally; fetched when missing.
    #[serde(default)]
    pub target: Option<PathBuf>,
    /// URL of the ZIP snapshot containing it.
    #[serde(default)]
    pub source: Option<String>,
    /// Basename of the archive entry to extract. Defaults to the target's file name.
    #[serde(default)]
    pub entry: Option<String>,
}

/// Configuration loaded from `~/.config/rangezip/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

/// Existing `rangezip/config.toml` in the XDG config directories, if any.
pub fn find_default_config() -> Result<Option<PathBuf>> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rangezip")?;
    Ok(xdg_dirs.find_config_file("config.toml"))
}

/// Load configuration.
///
/// An explicit `path` must exist. Without one, the XDG default is used when
/// present and built-in defaults otherwise.
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            path.to_path_buf()
        }
        None => match find_default_config()? {
            Some(path) => path,
            None => {
                tracing::debug!("no config file found, using defaults");
                return Ok(AppConfig::default());
            }
        },
    };

    load_from(&path)
}

pub fn load_from(path: &Path) -> Result<AppConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&data)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(cfg)
}
