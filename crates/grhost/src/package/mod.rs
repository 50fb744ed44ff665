//! Discovery, mounting and version selection of runtime packages

mod mounter;
mod version;

pub use mounter::{ImageMounter, MountHandle, SystemImageMounter};
pub use version::{RuntimeVersion, read_embedded_version, version_from_file_name};

use grhost_core::{HostError, PackageConfig};
use regex::Regex;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A loaded runtime package
#[derive(Debug, Clone, PartialEq)]
pub struct Mount {
    /// Private directory the image is attached at
    pub path: PathBuf,
    /// Package image the mount came from
    pub package: PathBuf,
    pub handle: MountHandle,
    pub version: RuntimeVersion,
}

impl Mount {
    pub fn host_binary(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

pub struct RuntimePackageProvider {
    config: PackageConfig,
    mounter: Arc<dyn ImageMounter>,
    mounts: BTreeMap<PathBuf, Mount>,
    default: Option<Mount>,
}

impl RuntimePackageProvider {
    pub fn new(config: PackageConfig, mounter: Arc<dyn ImageMounter>) -> Self {
        Self {
            config,
            mounter,
            mounts: BTreeMap::new(),
            default: None,
        }
    }

    pub fn with_system_mounter(config: PackageConfig) -> Self {
        Self::new(config, Arc::new(SystemImageMounter))
    }

    pub fn mounts(&self) -> impl Iterator<Item = &Mount> {
        self.mounts.values()
    }

    pub fn default_runtime(&self) -> Option<&Mount> {
        self.default.as_ref()
    }

    /// Mount every package image found in the packages directory.
    ///
    /// Returns the number of newly mounted packages. A package that fails to
    /// mount is logged and skipped.
    pub async fn load(&mut self) -> Result<usize, HostError> {
        let packages = self.discover().await?;
        let mut loaded = 0;

        for package in packages {
            let Some(stem) = package.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let target = self.config.mount_root.join(&stem);
            if self.mounts.contains_key(&target) {
                debug!(package = %package.display(), "Package already mounted");
                continue;
            }

            match self.mount_package(&package, &target, &stem).await {
                Ok(mount) => {
                    info!(
                        package = %package.display(),
                        path = %mount.path.display(),
                        version = %mount.version,
                        "Runtime package mounted"
                    );
                    self.mounts.insert(target, mount);
                    loaded += 1;
                }
                Err(e) => warn!(
                    package = %package.display(),
                    error = %e,
                    "Skipping runtime package"
                ),
            }
        }

        Ok(loaded)
    }

    async fn discover(&self) -> Result<Vec<PathBuf>, HostError> {
        let dir = &self.config.packages_dir;
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            HostError::package_error(format!("cannot scan {}: {e}", dir.display()))
        })?;

        let mut packages = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(self.config.extension.as_str()));
            if matches && entry.file_type().await?.is_file() {
                packages.push(path);
            }
        }
        packages.sort();
        Ok(packages)
    }

    async fn mount_package(
        &self,
        package: &Path,
        target: &Path,
        stem: &str,
    ) -> Result<Mount, HostError> {
        remove_dir_if_present(target).await?;
        tokio::fs::create_dir_all(target).await?;

        let handle = match self.mounter.attach(package, target).await {
            Ok(handle) => handle,
            Err(e) => {
                let _ = remove_dir_if_present(target).await;
                return Err(e);
            }
        };

        let version = self.resolve_version(target, stem).await;
        Ok(Mount {
            path: target.to_path_buf(),
            package: package.to_path_buf(),
            handle,
            version,
        })
    }

    async fn resolve_version(&self, target: &Path, stem: &str) -> RuntimeVersion {
        let binary = target.join(&self.config.host_binary);
        let embedded = match tokio::fs::read(&binary).await {
            Ok(image) => read_embedded_version(&image),
            Err(e) => {
                debug!(binary = %binary.display(), error = %e, "Host binary unreadable");
                None
            }
        };

        let raw = embedded
            .or_else(|| version_from_file_name(stem))
            .unwrap_or_else(|| stem.to_string());
        RuntimeVersion::parse(&raw)
    }

    /// Detach and delete every mount
    pub async fn unload(&mut self) {
        let mounts = std::mem::take(&mut self.mounts);
        self.default = None;
        for mount in mounts.into_values() {
            self.release(&mount).await;
        }
    }

    /// Detach and delete the mount at `path`. Returns false when nothing is mounted there.
    pub async fn unload_one(&mut self, path: &Path) -> bool {
        let Some(mount) = self.mounts.remove(path) else {
            return false;
        };
        if self.default.as_ref().is_some_and(|d| d.path == mount.path) {
            self.default = None;
        }
        self.release(&mount).await;
        true
    }

    async fn release(&self, mount: &Mount) {
        if let Err(e) = self.mounter.detach(&mount.handle, &mount.path).await {
            warn!(path = %mount.path.display(), error = %e, "Failed to detach runtime package");
        }
        if let Err(e) = remove_dir_if_present(&mount.path).await {
            warn!(path = %mount.path.display(), error = %e, "Failed to remove mount directory");
        }
        info!(path = %mount.path.display(), "Runtime package unloaded");
    }

    /// Highest mounted version whose version string matches `pattern`
    pub fn find_target_runtime(&self, pattern: &str) -> Result<Option<Mount>, HostError> {
        let pattern = Regex::new(pattern).map_err(|e| {
            HostError::configuration_error(format!("invalid runtime pattern: {e}"))
        })?;

        Ok(self
            .mounts
            .values()
            .filter(|mount| pattern.is_match(mount.version.as_str()))
            .max_by(|a, b| a.version.cmp(&b.version))
            .cloned())
    }

    /// Pick the newest patch of the oldest mounted major.minor line.
    ///
    /// Packages without a parsable version are only considered when nothing
    /// else is mounted.
    pub fn set_default_runtime(&mut self) -> Option<Mount> {
        let mut ascending: Vec<&Mount> = self.mounts.values().collect();
        ascending.sort_by(|a, b| a.version.cmp(&b.version));

        let mut chosen: Option<&Mount> = None;
        for mount in ascending.iter().copied().filter(|m| m.version.major_minor().is_some()) {
            match chosen {
                Some(current) if current.version.major_minor() != mount.version.major_minor() => {
                    break;
                }
                _ => chosen = Some(mount),
            }
        }
        let chosen = chosen.or_else(|| ascending.last().copied()).cloned();

        match &chosen {
            Some(mount) => info!(version = %mount.version, path = %mount.path.display(), "Default runtime selected"),
            None => warn!("No runtime package mounted"),
        }
        self.default = chosen.clone();
        chosen
    }
}

async fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
