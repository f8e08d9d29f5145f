//! Archive Class Loader
//!
//! The plugin-local loader backing an on-disk plugin archive. Classes come from
//! the manifest's class table, resources from the archive's `resources/`
//! directory.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use log::trace;
use parking_lot::{Mutex, RwLock};

use crate::error::{ResolverError, ResolverResult};
use crate::extension::index::{AnnotatedElement, ExtensionIndexEntry, ExtensionInstance};
use super::{ClassDef, ClassRef, ClassSpec, PluginLoader, ResourceUrl};

/// Directory inside a plugin archive holding its resources
pub const RESOURCES_DIR: &str = "resources";

/// Loader for a single plugin archive
#[derive(Debug)]
pub struct ArchiveClassLoader {
    plugin: String,
    resource_root: Option<PathBuf>,
    classes: HashMap<String, ClassSpec>,
    defined: RwLock<HashMap<String, ClassRef>>,
    initialized: Mutex<HashSet<String>>,
    define_calls: AtomicUsize,
}

impl ArchiveClassLoader {
    /// Create a loader; `resource_root` is `None` for archives without resources
    pub fn new<S: Into<String>>(plugin: S, classes: Vec<ClassSpec>, resource_root: Option<PathBuf>) -> Self {
        Self {
            plugin: plugin.into(),
            resource_root,
            classes: classes.into_iter().map(|spec| (spec.name.clone(), spec)).collect(),
            defined: RwLock::new(HashMap::new()),
            initialized: Mutex::new(HashSet::new()),
            define_calls: AtomicUsize::new(0),
        }
    }

    /// Loader for an archive directory, using its `resources/` subdirectory
    pub fn for_archive_dir<S: Into<String>>(plugin: S, classes: Vec<ClassSpec>, archive_dir: &Path) -> Self {
        let resources = archive_dir.join(RESOURCES_DIR);
        let root = if resources.is_dir() { Some(resources) } else { None };
        Self::new(plugin, classes, root)
    }

    /// Whether the manifest declares the class
    pub fn declares(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Number of successful or failed `define_class` calls for declared classes
    pub fn define_calls(&self) -> usize {
        self.define_calls.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.initialized.lock().contains(name)
    }

    fn resource_path(&self, name: &str) -> Option<PathBuf> {
        let root = self.resource_root.as_ref()?;
        let relative = Path::new(name.trim_start_matches('/'));

        // Resource names never escape the archive
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return None;
        }

        let path = root.join(relative);
        if path.is_file() { Some(path) } else { None }
    }
}

impl PluginLoader for ArchiveClassLoader {
    fn plugin(&self) -> &str {
        &self.plugin
    }

    fn find_loaded_class(&self, name: &str) -> Option<ClassRef> {
        self.defined.read().get(name).cloned()
    }

    fn define_class(&self, name: &str) -> ResolverResult<ClassRef> {
        let spec = self.classes.get(name)
            .ok_or_else(|| ResolverError::class_not_found(name))?;

        self.define_calls.fetch_add(1, Ordering::SeqCst);

        let mut defined = self.defined.write();
        if defined.contains_key(name) {
            return Err(ResolverError::duplicate_class_definition(name, self.plugin.as_str()));
        }

        trace!("Defining {} in {}", name, self.plugin);
        let class = Arc::new(ClassDef::new(spec.clone(), self.plugin.clone()));
        defined.insert(name.to_string(), Arc::clone(&class));
        Ok(class)
    }

    fn find_resources(&self, name: &str) -> Vec<ResourceUrl> {
        self.resource_path(name)
            .map(|path| vec![ResourceUrl::new(self.plugin.clone(), path)])
            .unwrap_or_default()
    }

    fn initialize_class(&self, class: &ClassRef) -> ResolverResult<()> {
        if class.initializer_fails() {
            return Err(ResolverError::class_initialization_failed(
                class.name(),
                "static initializer failed",
            ));
        }

        self.initialized.lock().insert(class.name().to_string());
        Ok(())
    }

    fn instantiate(
        &self,
        entry: &ExtensionIndexEntry,
        declaring: &ClassRef,
        element_type: &ClassRef,
    ) -> ResolverResult<ExtensionInstance> {
        self.initialize_class(declaring)
            .map_err(|e| ResolverError::instantiation_failed(entry.element.to_string(), e.to_string()))?;

        if let AnnotatedElement::Type { .. } = entry.element {
            if !declaring.is_constructible() {
                return Err(ResolverError::instantiation_failed(
                    entry.element.to_string(),
                    "type is abstract or has no usable constructor",
                ));
            }
        }

        Ok(ExtensionInstance::new(
            Arc::clone(element_type),
            entry.element.clone(),
            entry.properties.clone(),
        ))
    }
}
