//! Delegating Class Loader
//!
//! Resolves class names across the active plugins' own loaders, in dependency
//! order, and remembers both the outcome and the supplying plugin.
//!
//! Resolution outcomes live in a single concurrent map keyed by class name. A
//! name's slot is a [`OnceLock`], so concurrent first lookups of the same name
//! run one search; the others block on the slot and read the winner's result.
//! Attribution is derived from the same map, so the two can never disagree.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, OnceLock};
use dashmap::DashMap;
use log::{debug, trace, warn};
use parking_lot::RwLock;
use regex::Regex;

use crate::error::{ResolverError, ResolverResult};
use crate::extension::index::{ExtensionIndexEntry, ExtensionInstance};
use crate::plugin::descriptor::PluginDescriptor;
use crate::plugin::registry::PluginRegistry;
use super::{ClassRef, PluginLoader, ResourceUrl};

/// Class resolution as seen by the extension finder
pub trait ClassResolver: Send + Sync {
    /// Resolve a class by fully qualified name
    fn resolve_class(&self, name: &str) -> ResolverResult<ClassRef>;

    /// Whether `class` is `type_name` or (transitively) one of its subtypes
    fn is_assignable(&self, class: &ClassRef, type_name: &str) -> bool;

    /// Force static initialization of a class
    fn initialize_class(&self, class: &ClassRef) -> ResolverResult<()>;

    /// Produce a live instance for an index entry
    fn instantiate(&self, entry: &ExtensionIndexEntry) -> ResolverResult<ExtensionInstance>;

    /// Every resource with this name across all active plugins
    fn resolve_all_resources(&self, name: &str) -> Vec<ResourceUrl>;

    /// Whether the active plugin list is published; resource listings are empty until then
    fn is_ready(&self) -> bool;
}

/// Cached outcome of resolving one class name
#[derive(Debug, Clone)]
enum Resolution {
    Found { class: ClassRef, plugin: String },
    Missing,
}

/// Class loader delegating to every active plugin
#[derive(Debug)]
pub struct DelegatingClassLoader {
    registry: Arc<PluginRegistry>,
    generated: RwLock<HashMap<String, ClassRef>>,
    ignored: Vec<Regex>,
    fast_lookup: bool,
    cache: DashMap<String, Arc<OnceLock<Resolution>>>,
}

impl DelegatingClassLoader {
    /// Loader over the registry's published active list, fast lookup enabled
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            generated: RwLock::new(HashMap::new()),
            ignored: Vec::new(),
            fast_lookup: true,
            cache: DashMap::new(),
        }
    }

    /// Names matching any of these patterns never resolve through plugins
    pub fn with_ignored_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> ResolverResult<Self> {
        self.ignored = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    ResolverError::configuration(format!("Invalid ignored class pattern '{}': {}", p.as_ref(), e))
                })
            })
            .collect::<ResolverResult<Vec<_>>>()?;
        Ok(self)
    }

    /// Choose between check-then-define and plain `load_class` per plugin
    pub fn with_fast_lookup(mut self, fast_lookup: bool) -> Self {
        self.fast_lookup = fast_lookup;
        self
    }

    /// Register a generated class; it shadows plugin lookups until unregistered
    pub fn register_generated<S: Into<String>>(&self, name: S, class: ClassRef) {
        let name = name.into();
        trace!("Registering generated class {}", name);
        self.generated.write().insert(name, class);
    }

    /// Remove a generated class, returning it if it was registered
    pub fn unregister_generated(&self, name: &str) -> Option<ClassRef> {
        self.generated.write().remove(name)
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignored.iter().any(|pattern| pattern.is_match(name))
    }

    fn active(&self) -> ResolverResult<&[Arc<PluginDescriptor>]> {
        self.registry
            .active_plugins()
            .ok_or_else(|| ResolverError::plugins_not_ready("active plugin list has not been published"))
    }

    /// Loader of an active plugin
    pub fn loader_for(&self, plugin: &str) -> Option<Arc<dyn PluginLoader>> {
        self.registry
            .active_plugins()?
            .iter()
            .find(|p| p.short_name() == plugin)
            .map(|p| Arc::clone(p.loader()))
    }

    fn search(&self, name: &str, active: &[Arc<PluginDescriptor>]) -> Resolution {
        for plugin in active {
            let loader = plugin.loader();
            let found = if self.fast_lookup {
                match loader.find_loaded_class(name) {
                    Some(class) => Ok(class),
                    None => loader.define_class(name),
                }
            } else {
                loader.load_class(name)
            };

            match found {
                Ok(class) => {
                    debug!("Resolved {} from plugin {}", name, plugin.short_name());
                    return Resolution::Found { class, plugin: plugin.short_name().to_string() };
                }
                Err(e) if e.is_class_not_found() => {}
                Err(e) => warn!("Plugin {} failed to load {}: {}", plugin.short_name(), name, e),
            }
        }

        debug!("No active plugin supplies {}", name);
        Resolution::Missing
    }

    /// Resolve a class by name.
    ///
    /// Misses are cached permanently; later lookups report `cached: true`.
    pub fn resolve_class(&self, name: &str) -> ResolverResult<ClassRef> {
        if let Some(class) = self.generated.read().get(name) {
            return Ok(Arc::clone(class));
        }

        if self.is_ignored(name) {
            trace!("Ignoring lookup of {}", name);
            return Err(ResolverError::class_not_found(name));
        }

        let active = self.active()?;

        // Clone the slot out so the shard lock is not held while searching
        let slot = Arc::clone(
            self.cache
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .value(),
        );

        let mut searched = false;
        let resolution = slot.get_or_init(|| {
            searched = true;
            self.search(name, active)
        });

        match resolution {
            Resolution::Found { class, .. } => Ok(Arc::clone(class)),
            Resolution::Missing if searched => Err(ResolverError::class_not_found(name)),
            Resolution::Missing => Err(ResolverError::cached_miss(name)),
        }
    }

    /// First resource with this name in dependency order
    pub fn resolve_resource(&self, name: &str) -> Option<ResourceUrl> {
        self.registry
            .active_plugins()?
            .iter()
            .find_map(|p| p.loader().find_resource(name))
    }

    /// Every resource with this name across all active plugins
    pub fn resolve_all_resources(&self, name: &str) -> Vec<ResourceUrl> {
        match self.registry.active_plugins() {
            Some(active) => active
                .iter()
                .flat_map(|p| p.loader().find_resources(name))
                .collect(),
            None => {
                debug!("Resource lookup for {} before plugins are ready", name);
                Vec::new()
            }
        }
    }

    /// Snapshot of class name to supplying plugin
    pub fn attribution(&self) -> BTreeMap<String, String> {
        self.cache
            .iter()
            .filter_map(|entry| match entry.value().get() {
                Some(Resolution::Found { plugin, .. }) => Some((entry.key().clone(), plugin.clone())),
                _ => None,
            })
            .collect()
    }

    /// Plugin that supplied a resolved class
    pub fn plugin_for_class(&self, name: &str) -> Option<String> {
        let slot = self.cache.get(name)?;
        match slot.value().get() {
            Some(Resolution::Found { plugin, .. }) => Some(plugin.clone()),
            _ => None,
        }
    }

    /// Whether a name has a settled cache entry, positive or negative
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.get(name).map(|slot| slot.value().get().is_some()).unwrap_or(false)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

impl ClassResolver for DelegatingClassLoader {
    fn is_ready(&self) -> bool {
        self.registry.is_published()
    }

    fn resolve_class(&self, name: &str) -> ResolverResult<ClassRef> {
        DelegatingClassLoader::resolve_class(self, name)
    }

    fn is_assignable(&self, class: &ClassRef, type_name: &str) -> bool {
        let mut seen = HashSet::new();
        let mut pending = VecDeque::from([Arc::clone(class)]);

        while let Some(current) = pending.pop_front() {
            if current.name() == type_name {
                return true;
            }
            if !seen.insert(current.name().to_string()) {
                continue;
            }

            for supertype in current.supertypes() {
                if supertype == type_name {
                    return true;
                }
                // Supertypes outside every plugin (platform types) end the walk
                if let Ok(parent) = DelegatingClassLoader::resolve_class(self, supertype) {
                    pending.push_back(parent);
                }
            }
        }
        false
    }

    fn initialize_class(&self, class: &ClassRef) -> ResolverResult<()> {
        let loader = self.loader_for(class.plugin()).ok_or_else(|| {
            ResolverError::class_initialization_failed(
                class.name(),
                format!("plugin {} is not active", class.plugin()),
            )
        })?;
        loader.initialize_class(class)
    }

    fn instantiate(&self, entry: &ExtensionIndexEntry) -> ResolverResult<ExtensionInstance> {
        let element = entry.element.to_string();
        let declaring = DelegatingClassLoader::resolve_class(self, entry.element.declaring_type())
            .map_err(|e| ResolverError::instantiation_failed(&element, e.to_string()))?;
        let element_type = DelegatingClassLoader::resolve_class(self, entry.element.element_type())
            .map_err(|e| ResolverError::instantiation_failed(&element, e.to_string()))?;

        let loader = self.loader_for(declaring.plugin()).ok_or_else(|| {
            ResolverError::instantiation_failed(&element, format!("plugin {} is not active", declaring.plugin()))
        })?;
        loader.instantiate(entry, &declaring, &element_type)
    }

    fn resolve_all_resources(&self, name: &str) -> Vec<ResourceUrl> {
        DelegatingClassLoader::resolve_all_resources(self, name)
    }
}
