//! Fetch a missing file out of a remote ZIP snapshot.
//!
//! Given a target path and the URL of an archive that contains it, the file
//! is streamed out of the archive over range requests into
//! `<target>.incomplete` and renamed into place once complete. An existing
//! target is never touched.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use tokio::fs;
use tracing::{info, warn};

use crate::archive::{ArchiveReader, with_archive};
use crate::config::BootstrapConfig;
use crate::io::HttpRangeReader;

/// What a bootstrap run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `target` or `source` is not configured.
    NotConfigured,
    /// The target already exists; nothing was downloaded.
    AlreadyPresent(PathBuf),
    /// The entry was extracted and moved into place.
    Installed {
        path: PathBuf,
        entry: String,
        bytes: u64,
        range_requests: u64,
        transferred_bytes: u64,
    },
}

/// A fully specified bootstrap job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub target: PathBuf,
    pub source: String,
    /// Basename to look for inside the archive.
    pub entry: String,
}

impl Plan {
    /// Build a plan from config, or `None` when `target` or `source` is unset.
    pub fn from_config(cfg: &BootstrapConfig) -> Result<Option<Self>> {
        let (Some(target), Some(source)) = (&cfg.target, &cfg.source) else {
            return Ok(None);
        };

        let target = std::path::absolute(target)
            .with_context(|| format!("failed to resolve {}", target.display()))?;
        let entry = match &cfg.entry {
            Some(entry) => entry.clone(),
            None => target
                .file_name()
                .and_then(|s| s.to_str())
                .map(str::to_owned)
                .ok_or_else(|| anyhow!("target {} has no file name", target.display()))?,
        };

        Ok(Some(Self {
            target,
            source: source.clone(),
            entry,
        }))
    }

    /// Where the entry is written before the final rename.
    pub fn partial_path(&self) -> PathBuf {
        let mut name = OsString::from(self.target.as_os_str());
        name.push(".incomplete");
        PathBuf::from(name)
    }
}

/// Run the bootstrap described by `cfg`.
pub async fn run(cfg: &BootstrapConfig, client: Client) -> Result<Outcome> {
    match Plan::from_config(cfg)? {
        Some(plan) => execute(&plan, client).await,
        None => Ok(Outcome::NotConfigured),
    }
}

/// Execute a resolved plan.
pub async fn execute(plan: &Plan, client: Client) -> Result<Outcome> {
    if fs::try_exists(&plan.target).await? {
        info!("{} already present, nothing to do", plan.target.display());
        return Ok(Outcome::AlreadyPresent(plan.target.clone()));
    }

    if let Some(parent) = plan.target.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    info!("{} not present", plan.target.display());
    info!("downloading snapshot from {}", plan.source);

    let reader = HttpRangeReader::with_client(client, plan.source.clone())
        .await
        .with_context(|| format!("failed to open {}", plan.source))?;

    let partial = plan.partial_path();
    let extracted = extract_entry(reader, plan.entry.clone(), partial.clone()).await;
    let (entry, bytes, mut reader) = match extracted {
        Ok(done) => done,
        Err(err) => {
            if let Err(cleanup) = fs::remove_file(&partial).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove {}: {}", partial.display(), cleanup);
                }
            }
            return Err(err);
        }
    };
    reader.close();

    fs::rename(&partial, &plan.target)
        .await
        .with_context(|| format!("failed to move {} into place", partial.display()))?;

    info!(
        "installed {} ({} bytes from {})",
        plan.target.display(),
        bytes,
        entry
    );

    Ok(Outcome::Installed {
        path: plan.target.clone(),
        entry,
        bytes,
        range_requests: reader.range_requests(),
        transferred_bytes: reader.transferred_bytes(),
    })
}

async fn extract_entry(
    reader: HttpRangeReader,
    basename: String,
    partial: PathBuf,
) -> Result<(String, u64, HttpRangeReader)> {
    let ((name, bytes), reader) = with_archive(reader, move |archive| {
        let name = archive
            .find_by_basename(&basename)
            .ok_or_else(|| anyhow!("snapshot does not contain {basename}"))?;
        let bytes = write_entry(archive, &name, &partial)?;
        Ok((name, bytes))
    })
    .await?;
    Ok((name, bytes, reader))
}

fn write_entry<R: std::io::Read + std::io::Seek>(
    archive: &mut ArchiveReader<R>,
    name: &str,
    path: &Path,
) -> Result<u64> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let bytes = archive.extract_to(name, &mut file)?;
    file.sync_all()?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_plans_are_skipped() {
        let cfg = BootstrapConfig {
            target: Some(PathBuf::from("/tmp/consensus.db")),
            source: None,
            entry: None,
        };
        assert!(Plan::from_config(&cfg).unwrap().is_none());
        assert!(Plan::from_config(&BootstrapConfig::default()).unwrap().is_none());
    }

    #[test]
    fn entry_defaults_to_target_basename() {
        let cfg = BootstrapConfig {
            target: Some(PathBuf::from("/var/lib/node/consensus.db")),
            source: Some("https://example.com/snapshot.zip".to_string()),
            entry: None,
        };
        let plan = Plan::from_config(&cfg).unwrap().unwrap();
        assert_eq!(plan.entry, "consensus.db");
        assert_eq!(
            plan.partial_path(),
            PathBuf::from("/var/lib/node/consensus.db.incomplete")
        );
    }

    #[test]
    fn relative_target_is_made_absolute() {
        let cfg = BootstrapConfig {
            target: Some(PathBuf::from("data/state.db")),
            source: Some("https://example.com/snapshot.zip".to_string()),
            entry: Some("state-v2.db".to_string()),
        };
        let plan = Plan::from_config(&cfg).unwrap().unwrap();
        assert!(plan.target.is_absolute());
        assert!(plan.target.ends_with("data/state.db"));
        assert_eq!(plan.entry, "state-v2.db");
    }
}
