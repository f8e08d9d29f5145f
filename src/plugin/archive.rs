//! Plugin Archive Inspection
//!
//! Lists the plugin archives under a root directory, parses each archive's
//! manifest into a [`PluginDescriptor`] and detects duplicate short names.
//!
//! An archive is either a directory directly under the root containing
//! `plugin.yaml` (plus an optional `resources/` directory), or a standalone
//! `*.yaml`/`*.yml` manifest file. Anything else under the root is ignored.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::{debug, trace};
use parking_lot::Mutex;

use crate::error::{ResolverError, ResolverResult};
use crate::loader::{ArchiveClassLoader, PluginLoader};
use super::compatibility::VersionCompatibilityChecker;
use super::descriptor::{PluginDescriptor, PluginManifest, MANIFEST_FILE};

/// Identifier of an archive in logs and failure entries: its file name
pub fn archive_id(archive: &Path) -> String {
    archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive.display().to_string())
}

fn is_manifest_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Parses plugin archives into descriptors
#[derive(Debug, Clone, Default)]
pub struct PluginArchiveInspector {
    checker: VersionCompatibilityChecker,
}

impl PluginArchiveInspector {
    pub fn new(checker: VersionCompatibilityChecker) -> Self {
        Self { checker }
    }

    /// List candidate archives under `root`, sorted by file name
    pub fn list_archives(&self, root: &Path) -> ResolverResult<Vec<PathBuf>> {
        if !root.exists() {
            return Err(ResolverError::configuration(format!(
                "Plugin directory does not exist: {}",
                root.display()
            )));
        }

        if !root.is_dir() {
            return Err(ResolverError::configuration(format!(
                "Plugin path is not a directory: {}",
                root.display()
            )));
        }

        let entries = fs::read_dir(root).map_err(|e| ResolverError::Io {
            message: format!("Failed to read directory {}: {}", root.display(), e),
        })?;

        let mut archives = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ResolverError::Io {
                    message: format!("Failed to read directory entry: {}", e),
                })?
                .path();

            if path.is_dir() {
                if path.join(MANIFEST_FILE).is_file() {
                    archives.push(path);
                } else {
                    trace!("Ignoring directory without manifest: {}", path.display());
                }
            } else if is_manifest_file(&path) {
                archives.push(path);
            }
        }

        archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        debug!("Listed {} plugin archives under {}", archives.len(), root.display());
        Ok(archives)
    }

    /// Parse and validate one archive
    pub fn inspect(&self, archive: &Path) -> ResolverResult<PluginDescriptor> {
        let id = archive_id(archive);
        let (manifest_path, archive_dir) = if archive.is_dir() {
            (archive.join(MANIFEST_FILE), Some(archive))
        } else {
            (archive.to_path_buf(), None)
        };

        let content = fs::read_to_string(&manifest_path)
            .map_err(|e| ResolverError::inspection_failed(&id, format!("unreadable manifest: {}", e)))?;

        let manifest: PluginManifest = serde_yaml::from_str(&content)
            .map_err(|e| ResolverError::inspection_failed(&id, format!("malformed manifest: {}", e)))?;

        self.validate(&id, &manifest)?;

        let loader: Arc<dyn PluginLoader> = match archive_dir {
            Some(dir) => Arc::new(ArchiveClassLoader::for_archive_dir(
                manifest.short_name.clone(),
                manifest.classes.clone(),
                dir,
            )),
            None => Arc::new(ArchiveClassLoader::new(
                manifest.short_name.clone(),
                manifest.classes.clone(),
                None,
            )),
        };

        debug!("Inspected {} as {} {}", id, manifest.short_name, manifest.version);
        Ok(PluginDescriptor::from_manifest(&manifest, archive, loader))
    }

    fn validate(&self, id: &str, manifest: &PluginManifest) -> ResolverResult<()> {
        if manifest.short_name.trim().is_empty() {
            return Err(ResolverError::inspection_failed(id, "short name cannot be empty"));
        }

        if !is_valid_version(&manifest.version) {
            return Err(ResolverError::inspection_failed(
                id,
                format!("invalid version format: {}", manifest.version),
            ));
        }

        if let Some(api_version) = manifest.api_version {
            self.checker.check_api_version(&manifest.short_name, api_version)?;
        }

        Ok(())
    }
}

/// `major.minor[.patch]`, all numeric
fn is_valid_version(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    (2..=3).contains(&parts.len()) && parts.iter().all(|part| part.parse::<u32>().is_ok())
}

/// First-wins duplicate detection keyed by listing index.
///
/// Inspections may finish in any order; the archive listed first always keeps
/// the short name, even when a later-listed archive claimed it first.
#[derive(Debug, Default)]
pub struct DuplicateTracker {
    claims: Mutex<HashMap<String, (usize, String)>>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `short_name` for the archive at listing position `index`.
    ///
    /// Returns the duplicate error for whichever archive lost the claim, if any.
    pub fn claim(&self, index: usize, short_name: &str, archive: &str) -> Option<ResolverError> {
        let mut claims = self.claims.lock();
        match claims.get(short_name) {
            None => {
                claims.insert(short_name.to_string(), (index, archive.to_string()));
                None
            }
            Some((held, kept)) if *held <= index => {
                Some(ResolverError::duplicate_archive(short_name, archive, kept))
            }
            Some((_, displaced)) => {
                let error = ResolverError::duplicate_archive(short_name, displaced, archive);
                claims.insert(short_name.to_string(), (index, archive.to_string()));
                Some(error)
            }
        }
    }

    /// Listing index currently holding `short_name`
    pub fn winner(&self, short_name: &str) -> Option<usize> {
        self.claims.lock().get(short_name).map(|(index, _)| *index)
    }
}

/// Collects descriptors from concurrent inspection tasks
#[derive(Debug, Default)]
pub struct InspectionBatch {
    tracker: DuplicateTracker,
    inspected: Mutex<BTreeMap<usize, Arc<PluginDescriptor>>>,
}

impl InspectionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inspected plugin; returns the duplicate skip entry, if any
    pub fn record(&self, index: usize, descriptor: PluginDescriptor) -> Option<ResolverError> {
        let skip = self.tracker.claim(index, descriptor.short_name(), &archive_id(descriptor.archive()));
        self.inspected.lock().insert(index, Arc::new(descriptor));
        skip
    }

    /// Winning descriptors in listing order
    pub fn finish(&self) -> Vec<Arc<PluginDescriptor>> {
        self.inspected
            .lock()
            .iter()
            .filter(|(index, plugin)| self.tracker.winner(plugin.short_name()) == Some(**index))
            .map(|(_, plugin)| Arc::clone(plugin))
            .collect()
    }
}
