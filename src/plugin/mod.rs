//! Plugin Model
//!
//! Plugin descriptors, archive inspection, API compatibility, the shared
//! registry and dependency resolution.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::path::Path;
//! use plugin_resolver::plugin::{PluginArchiveInspector, PluginRegistry, DependencyGraphResolver};
//!
//! let inspector = PluginArchiveInspector::default();
//! let registry = PluginRegistry::new();
//! let mut plugins = Vec::new();
//! for archive in inspector.list_archives(Path::new("plugins"))? {
//!     plugins.push(std::sync::Arc::new(inspector.inspect(&archive)?));
//! }
//! registry.set_plugins(plugins);
//! let active = DependencyGraphResolver::default().resolve(&registry, true)?;
//! # Ok::<(), plugin_resolver::error::ResolverError>(())
//! ```

pub mod archive;
pub mod compatibility;
pub mod descriptor;
pub mod registry;
pub mod resolver;

#[cfg(test)]
pub mod tests;

pub use archive::{archive_id, DuplicateTracker, InspectionBatch, PluginArchiveInspector};
pub use compatibility::VersionCompatibilityChecker;
pub use descriptor::{Dependency, FailedPlugin, PluginDescriptor, PluginManifest, PluginSummary, MANIFEST_FILE};
pub use registry::PluginRegistry;
pub use resolver::DependencyGraphResolver;
