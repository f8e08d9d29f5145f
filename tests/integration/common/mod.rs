//! Shared fixtures for integration tests
//!
//! Builds plugin directories on disk: directory archives with `plugin.yaml`,
//! optional `resources/` content and extension index files.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use plugin_resolver::config::ResolverSettings;
use plugin_resolver::extension::EXTENSION_INDEX_RESOURCE;
use plugin_resolver::loader::archive_loader::RESOURCES_DIR;
use plugin_resolver::plugin::MANIFEST_FILE;
use plugin_resolver::PluginManager;

/// A temporary plugin root
pub struct PluginDir {
    root: TempDir,
}

impl PluginDir {
    pub fn new() -> Self {
        Self { root: tempfile::tempdir().unwrap() }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Directory archive `dir` with the given manifest
    pub fn plugin(&self, dir: &str, manifest: &str) -> PathBuf {
        let path = self.root.path().join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(MANIFEST_FILE), manifest).unwrap();
        path
    }

    /// Standalone manifest file archive
    pub fn standalone(&self, file: &str, manifest: &str) -> PathBuf {
        let path = self.root.path().join(file);
        fs::write(&path, manifest).unwrap();
        path
    }

    /// Resource inside a directory archive
    pub fn resource(&self, dir: &str, name: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(dir).join(RESOURCES_DIR).join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Extension index of a directory archive
    pub fn index(&self, dir: &str, entries: serde_json::Value) -> PathBuf {
        self.resource(dir, EXTENSION_INDEX_RESOURCE, &entries.to_string())
    }

    pub fn settings(&self) -> ResolverSettings {
        ResolverSettings {
            plugin_dir: self.path().to_path_buf(),
            worker_threads: 4,
            ..ResolverSettings::default()
        }
    }

    /// Manager over this directory, already initialized
    pub fn initialized(&self) -> Arc<PluginManager> {
        initialize(self.settings())
    }
}

pub fn initialize(settings: ResolverSettings) -> Arc<PluginManager> {
    let manager = Arc::new(PluginManager::new(settings).unwrap());
    manager.initialize(manager.default_init_strategy(), None).unwrap();
    manager
}

pub fn names(plugins: &[Arc<plugin_resolver::plugin::PluginDescriptor>]) -> Vec<String> {
    plugins.iter().map(|p| p.short_name().to_string()).collect()
}

/// The `api` plugin declaring the extension points used across tests
pub const API_MANIFEST: &str = r#"
short_name: api
version: "1.0"
classes:
  - name: api.Step
    constructible: false
  - name: api.Publisher
    constructible: false
"#;

/// The `steps` plugin: two typed steps, a field-held step and a broken one
pub const STEPS_MANIFEST: &str = r#"
short_name: steps
version: "2.3.1"
dependencies:
  - name: api
    version: ">=1.0"
classes:
  - name: steps.Echo
    supertypes: [api.Step]
  - name: steps.Sleep
    supertypes: [steps.AbstractStep]
  - name: steps.AbstractStep
    supertypes: [api.Step]
    constructible: false
  - name: steps.Holder
  - name: steps.Broken
    supertypes: [api.Step]
    initializer_fails: true
"#;

pub fn steps_index() -> serde_json::Value {
    serde_json::json!([
        {"element": {"kind": "type", "name": "steps.Echo"}, "ordinal": 1.0, "properties": {"function": "echo"}},
        {"element": {"kind": "field", "declaring_type": "steps.Holder", "name": "SLEEP", "element_type": "steps.Sleep"},
         "ordinal": 10.0, "properties": {"function": "sleep"}},
        {"element": {"kind": "type", "name": "steps.AbstractStep"}, "optional": true},
        {"element": {"kind": "type", "name": "steps.Broken"}, "optional": true, "ordinal": 50.0},
        {"element": {"kind": "type", "name": "steps.Missing"}, "optional": true}
    ])
}

/// Directory with `api` and `steps` plugins
pub fn workflow_dir() -> PluginDir {
    let dir = PluginDir::new();
    dir.plugin("api", API_MANIFEST);
    dir.plugin("steps", STEPS_MANIFEST);
    dir.index("steps", steps_index());
    dir
}
