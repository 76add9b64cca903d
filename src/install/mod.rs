//! Locating, and optionally installing, the usql binary.
//!
//! In safe mode the locator only looks for an existing binary and never
//! touches the network. With unsafe install enabled it downloads the pinned
//! release for the host platform, unpacks it and copies the binary into the
//! install directory. The first successful resolution is cached for the rest
//! of the process; concurrent first calls share a single attempt.

mod archive;
mod fetch;

pub use archive::{extract_archive, find_binary, is_usql_binary, MAX_SEARCH_DEPTH};
pub use fetch::{HttpFetcher, ReleaseFetcher};

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{GateError, Result};
use crate::platform::{ArchiveFormat, PlatformDescriptor};

/// Name of the executable searched for on `PATH`.
const BINARY_NAME: &str = if cfg!(windows) { "usql.exe" } else { "usql" };

/// How a binary path was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Found in a directory on the executable search path.
    SystemPath,
    /// Found at the configured (or default) path.
    ConfiguredPath,
    /// Left at the install path by an earlier unsafe install.
    PreviouslyInstalled,
    /// Downloaded and installed by this process.
    Installed,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemPath => write!(f, "system PATH"),
            Self::ConfiguredPath => write!(f, "configured path"),
            Self::PreviouslyInstalled => write!(f, "previous install"),
            Self::Installed => write!(f, "fresh install"),
        }
    }
}

/// A usable usql binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLocation {
    pub path: PathBuf,
    pub provenance: Provenance,
}

/// Settings controlling how the binary is located.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Allow downloading usql when it is not already present.
    pub unsafe_install: bool,
    /// Explicit binary path. In safe mode this is the fallback after `PATH`;
    /// in unsafe mode it is the install target.
    pub usql_path: Option<PathBuf>,
    /// Directory the binary is installed into when `usql_path` is unset.
    pub install_dir: PathBuf,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            unsafe_install: false,
            usql_path: None,
            install_dir: PathBuf::from("."),
        }
    }
}

/// Resolves the usql binary once per process.
pub struct BinaryLocator {
    config: LocatorConfig,
    search_path: Option<OsString>,
    host_os: String,
    host_arch: String,
    fetcher: Arc<dyn ReleaseFetcher>,
    cache: OnceCell<BinaryLocation>,
}

impl BinaryLocator {
    /// Creates a locator for the running host, searching the process `PATH`.
    pub fn new(config: LocatorConfig, fetcher: Arc<dyn ReleaseFetcher>) -> Self {
        Self {
            config,
            search_path: std::env::var_os("PATH"),
            host_os: std::env::consts::OS.to_string(),
            host_arch: std::env::consts::ARCH.to_string(),
            fetcher,
            cache: OnceCell::new(),
        }
    }

    /// Replaces the executable search path (`None` disables the search).
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Overrides the host platform names used to pick a release asset.
    pub fn with_host(mut self, os: impl Into<String>, arch: impl Into<String>) -> Self {
        self.host_os = os.into();
        self.host_arch = arch.into();
        self
    }

    /// Returns the cached location, if resolution already succeeded.
    pub fn cached(&self) -> Option<&BinaryLocation> {
        self.cache.get()
    }

    /// Returns the usql binary, locating or installing it on first use.
    ///
    /// Failures are not cached, so a later call retries after the cause is
    /// fixed.
    pub async fn resolve(&self) -> Result<&BinaryLocation> {
        self.cache.get_or_try_init(|| self.locate()).await
    }

    async fn locate(&self) -> Result<BinaryLocation> {
        let location = if self.config.unsafe_install {
            self.locate_or_install().await?
        } else {
            self.locate_existing()?
        };

        info!(
            "Using usql at {} ({})",
            location.path.display(),
            location.provenance
        );
        Ok(location)
    }

    /// Safe mode: `PATH` first, then the configured path. No network access.
    fn locate_existing(&self) -> Result<BinaryLocation> {
        if let Some(path) = self.search_system_path() {
            return Ok(BinaryLocation {
                path,
                provenance: Provenance::SystemPath,
            });
        }

        let configured = self
            .config
            .usql_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(BINARY_NAME));

        if configured.is_file() {
            return Ok(BinaryLocation {
                path: absolute(configured),
                provenance: Provenance::ConfiguredPath,
            });
        }

        Err(GateError::BinaryNotFound(configured))
    }

    fn search_system_path(&self) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        std::env::split_paths(search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(BINARY_NAME))
            .find(|candidate| is_executable(candidate))
            .map(absolute)
    }

    fn install_path(&self, platform: Option<&PlatformDescriptor>) -> PathBuf {
        self.config.usql_path.clone().unwrap_or_else(|| {
            let name = platform.map_or(BINARY_NAME, PlatformDescriptor::binary_name);
            self.config.install_dir.join(name)
        })
    }

    /// Unsafe mode: reuse an earlier install, otherwise download one.
    async fn locate_or_install(&self) -> Result<BinaryLocation> {
        let existing = self.install_path(None);
        if existing.is_file() {
            return Ok(BinaryLocation {
                path: absolute(existing),
                provenance: Provenance::PreviouslyInstalled,
            });
        }

        let platform = PlatformDescriptor::from_names(&self.host_os, &self.host_arch)?;
        let asset = platform.release_asset()?;
        let target = self.install_path(Some(&platform));

        info!("Downloading usql for {} from {}", platform, asset.url);
        let bytes = self.fetcher.fetch(&asset.url).await?;
        info!("Downloaded {} bytes, extracting...", bytes.len());

        let job = InstallJob {
            bytes,
            format: asset.format,
            binary_name: platform.binary_name(),
            staging: Staging::new(&self.config.install_dir, asset.format),
            target: target.clone(),
        };

        // Cleanup runs on the blocking thread, so it still happens if this
        // future is dropped mid-install.
        tokio::task::spawn_blocking(move || job.run_and_clean_up())
            .await
            .map_err(|e| GateError::install(format!("Install task failed: {}", e)))??;

        info!("usql installed at {}", target.display());
        Ok(BinaryLocation {
            path: absolute(target),
            provenance: Provenance::Installed,
        })
    }
}

/// Temporary archive file and scratch directory for one install attempt.
#[derive(Debug, Clone)]
struct Staging {
    archive: PathBuf,
    scratch: PathBuf,
}

impl Staging {
    fn new(install_dir: &Path, format: ArchiveFormat) -> Self {
        let pid = std::process::id();
        Self {
            archive: install_dir.join(format!(".usql-download-{pid}.{}", format.extension())),
            scratch: install_dir.join(format!(".usql-extract-{pid}")),
        }
    }

    /// Best-effort removal; failures are logged and otherwise ignored.
    fn cleanup(&self) {
        if self.archive.exists() {
            if let Err(e) = fs::remove_file(&self.archive) {
                warn!("Failed to remove {}: {}", self.archive.display(), e);
            }
        }
        if self.scratch.exists() {
            if let Err(e) = fs::remove_dir_all(&self.scratch) {
                warn!("Failed to remove {}: {}", self.scratch.display(), e);
            }
        }
    }
}

/// Blocking half of an install: write, extract, locate, place.
struct InstallJob {
    bytes: Vec<u8>,
    format: ArchiveFormat,
    binary_name: &'static str,
    staging: Staging,
    target: PathBuf,
}

impl InstallJob {
    fn run_and_clean_up(self) -> Result<()> {
        let staging = self.staging.clone();
        let result = self.run();
        staging.cleanup();
        result
    }

    fn run(self) -> Result<()> {
        if let Some(parent) = self.staging.archive.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GateError::install(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(&self.staging.archive, &self.bytes).map_err(|e| {
            GateError::install(format!(
                "Failed to write {}: {}",
                self.staging.archive.display(),
                e
            ))
        })?;

        fs::create_dir_all(&self.staging.scratch).map_err(|e| {
            GateError::extraction(format!(
                "Failed to create {}: {}",
                self.staging.scratch.display(),
                e
            ))
        })?;
        extract_archive(&self.staging.archive, self.format, &self.staging.scratch)?;

        let found = find_binary(&self.staging.scratch, self.binary_name)?;
        debug!("Found usql in archive at {}", found.display());

        if let Some(parent) = self.target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                GateError::install(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        place_binary(&found, &self.target)
    }
}

/// Copies `found` next to `target`, marks it executable and renames it into
/// place. `target` never holds a partial binary; the partial copy is removed
/// on failure.
fn place_binary(found: &Path, target: &Path) -> Result<()> {
    let partial = partial_path(target);

    let placed = fs::copy(found, &partial)
        .map_err(|e| {
            GateError::install(format!(
                "Failed to copy usql to {}: {}",
                partial.display(),
                e
            ))
        })
        .and_then(|_| make_executable(&partial))
        .and_then(|()| {
            fs::rename(&partial, target).map_err(|e| {
                GateError::install(format!(
                    "Failed to move usql to {}: {}",
                    target.display(),
                    e
                ))
            })
        });

    if placed.is_err() && partial.exists() {
        if let Err(e) = fs::remove_file(&partial) {
            warn!("Failed to remove {}: {}", partial.display(), e);
        }
    }
    placed
}

fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| BINARY_NAME.to_string());
    target.with_file_name(format!(".{name}.partial-{}", std::process::id()))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| {
        GateError::install(format!(
            "Failed to mark {} executable: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}
