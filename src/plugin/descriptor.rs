//! Plugin Descriptors
//!
//! Plugin metadata parsed from an archive manifest, the mutable activation
//! flags the dependency resolver updates, and the failure log entries.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use serde::{Deserialize, Serialize};

use crate::error::ResolverError;
use crate::loader::{ClassSpec, PluginLoader};

/// Manifest file name inside a plugin archive directory
pub const MANIFEST_FILE: &str = "plugin.yaml";

/// A dependency on another plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub short_name: String,
    pub version_constraint: String,
}

impl Dependency {
    pub fn new<N: Into<String>, V: Into<String>>(short_name: N, version_constraint: V) -> Self {
        Self { short_name: short_name.into(), version_constraint: version_constraint.into() }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.short_name, self.version_constraint)
    }
}

/// Dependency entry as written in `plugin.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDependency {
    pub name: String,

    #[serde(default = "any_version")]
    pub version: String,

    #[serde(default)]
    pub optional: bool,
}

fn any_version() -> String {
    "*".to_string()
}

fn enabled_by_default() -> bool {
    true
}

/// Parsed `plugin.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub short_name: String,
    pub version: String,

    /// Manifest API version (YYYYMMDD); defaults to the build's version
    #[serde(default)]
    pub api_version: Option<u32>,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    #[serde(default)]
    pub dependencies: Vec<ManifestDependency>,

    #[serde(default)]
    pub classes: Vec<ClassSpec>,
}

/// An inspected plugin
///
/// Created by the archive inspector, never removed from the registry, only
/// deactivated. A plugin with a cycle dependency is never active.
#[derive(Debug)]
pub struct PluginDescriptor {
    short_name: String,
    version: String,
    archive: PathBuf,
    dependencies: Vec<Dependency>,
    optional_dependencies: Vec<Dependency>,
    enabled: bool,
    active: AtomicBool,
    has_cycle_dependency: AtomicBool,
    loader: Arc<dyn PluginLoader>,
}

impl PluginDescriptor {
    /// Create an enabled descriptor with no dependencies
    pub fn new<N, V, P>(short_name: N, version: V, archive: P, loader: Arc<dyn PluginLoader>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            short_name: short_name.into(),
            version: version.into(),
            archive: archive.into(),
            dependencies: Vec::new(),
            optional_dependencies: Vec::new(),
            enabled: true,
            active: AtomicBool::new(true),
            has_cycle_dependency: AtomicBool::new(false),
            loader,
        }
    }

    /// Build a descriptor from a parsed manifest
    pub fn from_manifest(manifest: &PluginManifest, archive: &Path, loader: Arc<dyn PluginLoader>) -> Self {
        let mut descriptor = Self::new(
            manifest.short_name.clone(),
            manifest.version.clone(),
            archive,
            loader,
        )
        .with_enabled(manifest.enabled);

        for dep in &manifest.dependencies {
            descriptor = if dep.optional {
                descriptor.with_optional_dependency(dep.name.clone(), dep.version.clone())
            } else {
                descriptor.with_dependency(dep.name.clone(), dep.version.clone())
            };
        }

        descriptor
    }

    pub fn with_dependency<N: Into<String>, V: Into<String>>(mut self, short_name: N, constraint: V) -> Self {
        self.dependencies.push(Dependency::new(short_name, constraint));
        self
    }

    pub fn with_optional_dependency<N: Into<String>, V: Into<String>>(mut self, short_name: N, constraint: V) -> Self {
        self.optional_dependencies.push(Dependency::new(short_name, constraint));
        self
    }

    /// Set the manifest "enabled" flag; a disabled plugin starts inactive
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self.active = AtomicBool::new(enabled);
        self
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn optional_dependencies(&self) -> &[Dependency] {
        &self.optional_dependencies
    }

    /// Required dependencies followed by optional ones
    pub fn all_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().chain(self.optional_dependencies.iter())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn has_cycle_dependency(&self) -> bool {
        self.has_cycle_dependency.load(Ordering::SeqCst)
    }

    /// Quarantine the plugin as a member of a dependency cycle
    pub fn mark_cycle_dependency(&self) {
        self.has_cycle_dependency.store(true, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// The plugin's own loader
    pub fn loader(&self) -> &Arc<dyn PluginLoader> {
        &self.loader
    }

    /// Serializable view for reports
    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            short_name: self.short_name.clone(),
            version: self.version.clone(),
            archive: self.archive.clone(),
            active: self.is_active(),
            has_cycle_dependency: self.has_cycle_dependency(),
            dependencies: self.dependencies.iter().map(ToString::to_string).collect(),
            optional_dependencies: self.optional_dependencies.iter().map(ToString::to_string).collect(),
        }
    }
}

impl fmt::Display for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name)
    }
}

/// Report view of a plugin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSummary {
    pub short_name: String,
    pub version: String,
    pub archive: PathBuf,
    pub active: bool,
    pub has_cycle_dependency: bool,
    pub dependencies: Vec<String>,
    pub optional_dependencies: Vec<String>,
}

/// A plugin permanently excluded by inspection or cycle detection
#[derive(Debug, Clone, PartialEq)]
pub struct FailedPlugin {
    /// Short name, or the archive file name when no short name is known
    pub name: String,
    pub cause: ResolverError,
}

impl FailedPlugin {
    pub fn new<S: Into<String>>(name: S, cause: ResolverError) -> Self {
        Self { name: name.into(), cause }
    }
}

impl fmt::Display for FailedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.cause)
    }
}
