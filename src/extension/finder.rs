//! Annotation Index Extension Finder
//!
//! Discovers extensions from the precomputed annotation index instead of
//! scanning classes. The index is loaded once, through the first resolver the
//! finder is used with, and that resolver stays bound to the finder.

use std::sync::{Arc, OnceLock};
use log::{debug, log, Level};

use crate::error::{ResolverError, ResolverResult};
use crate::loader::ClassResolver;
use super::index::{ExtensionIndex, ExtensionIndexEntry, ExtensionInstance, EXTENSION_INDEX_RESOURCE};

/// An instantiated extension plus its index metadata
#[derive(Debug, Clone)]
pub struct ExtensionComponent<T> {
    instance: T,
    ordinal: f64,
    optional: bool,
    class_name: String,
}

impl<T> ExtensionComponent<T> {
    pub fn new<S: Into<String>>(instance: T, ordinal: f64, optional: bool, class_name: S) -> Self {
        Self { instance, ordinal, optional, class_name: class_name.into() }
    }

    pub fn instance(&self) -> &T {
        &self.instance
    }

    pub fn into_instance(self) -> T {
        self.instance
    }

    pub fn ordinal(&self) -> f64 {
        self.ordinal
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Name of the instance's class, the key for plugin attribution
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Replace the instance, keeping the metadata
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ExtensionComponent<U> {
        ExtensionComponent {
            instance: f(self.instance),
            ordinal: self.ordinal,
            optional: self.optional,
            class_name: self.class_name,
        }
    }
}

/// Failures of optional entries are expected
fn failure_level(entry: &ExtensionIndexEntry) -> Level {
    if entry.optional { Level::Debug } else { Level::Warn }
}

struct BoundIndex {
    index: ExtensionIndex,
    resolver: Arc<dyn ClassResolver>,
}

/// Extension finder over the annotation index
#[derive(Default)]
pub struct AnnotationIndexExtensionFinder {
    bound: OnceLock<BoundIndex>,
}

impl std::fmt::Debug for AnnotationIndexExtensionFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationIndexExtensionFinder")
            .field("entries", &self.bound.get().map(|b| b.index.len()))
            .finish()
    }
}

impl AnnotationIndexExtensionFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finder with an already loaded index bound to `resolver`
    pub fn with_index(index: ExtensionIndex, resolver: Arc<dyn ClassResolver>) -> Self {
        let finder = Self::new();
        let _ = finder.bound.set(BoundIndex { index, resolver });
        finder
    }

    pub fn is_loaded(&self) -> bool {
        self.bound.get().is_some()
    }

    /// Number of index entries, once loaded
    pub fn index_len(&self) -> Option<usize> {
        self.bound.get().map(|b| b.index.len())
    }

    /// Load the index through `resolver` on first use.
    ///
    /// Nothing is cached until the resolver's plugins are published, so an early
    /// lookup cannot pin an empty index.
    fn bind(&self, resolver: &Arc<dyn ClassResolver>) -> ResolverResult<&BoundIndex> {
        if let Some(bound) = self.bound.get() {
            return Ok(bound);
        }
        if !resolver.is_ready() {
            return Err(ResolverError::plugins_not_ready(
                "cannot load the extension index before the active plugin list is published",
            ));
        }

        Ok(self.bound.get_or_init(|| {
            let resources = resolver.resolve_all_resources(EXTENSION_INDEX_RESOURCE);
            let index = ExtensionIndex::load(&resources);
            debug!("Loaded extension index: {} entries from {} resources", index.len(), resources.len());
            BoundIndex { index, resolver: Arc::clone(resolver) }
        }))
    }

    /// Force static initialization of every indexed element's declaring type.
    ///
    /// Returns the number of entries initialized; failures are logged and skipped.
    pub fn scout(&self, type_name: &str, resolver: &Arc<dyn ClassResolver>) -> ResolverResult<usize> {
        let bound = self.bind(resolver)?;
        let resolver = &bound.resolver;
        let mut initialized = 0;

        for entry in bound.index.entries() {
            let result = resolver
                .resolve_class(entry.element.declaring_type())
                .and_then(|class| resolver.initialize_class(&class));

            match result {
                Ok(()) => initialized += 1,
                Err(e) => log!(
                    failure_level(entry),
                    "Failed to scout {} while looking for {}: {}",
                    entry.element, type_name, e
                ),
            }
        }

        debug!("Scouted {} of {} index entries for {}", initialized, bound.index.len(), type_name);
        Ok(initialized)
    }

    /// Instantiate every indexed element assignable to `type_name`.
    ///
    /// Components come back highest ordinal first; entries that fail are skipped.
    pub fn find(
        &self,
        type_name: &str,
        resolver: &Arc<dyn ClassResolver>,
    ) -> ResolverResult<Vec<ExtensionComponent<ExtensionInstance>>> {
        let bound = self.bind(resolver)?;
        Ok(Self::find_in(bound, type_name))
    }

    /// [`find`](Self::find) against the resolver that loaded the index.
    ///
    /// Fails with `IndexUnavailable` until a resolver-bound call has loaded it.
    pub fn find_loaded(&self, type_name: &str) -> ResolverResult<Vec<ExtensionComponent<ExtensionInstance>>> {
        let bound = self.bound.get().ok_or_else(|| {
            ResolverError::index_unavailable(format!(
                "no resolver has loaded the extension index yet (looking for {})",
                type_name
            ))
        })?;
        Ok(Self::find_in(bound, type_name))
    }

    fn find_in(bound: &BoundIndex, type_name: &str) -> Vec<ExtensionComponent<ExtensionInstance>> {
        let resolver = &bound.resolver;
        let mut components = Vec::new();

        for entry in bound.index.entries() {
            let element_type = match resolver.resolve_class(entry.element.element_type()) {
                Ok(class) => class,
                Err(e) => {
                    log!(failure_level(entry), "Skipping {}: {}", entry.element, e);
                    continue;
                }
            };

            if !resolver.is_assignable(&element_type, type_name) {
                continue;
            }

            match resolver.instantiate(entry) {
                Ok(instance) => {
                    let class_name = instance.class_name().to_string();
                    components.push(ExtensionComponent::new(instance, entry.ordinal, entry.optional, class_name));
                }
                Err(e) => log!(failure_level(entry), "Failed to load {}: {}", entry.element, e),
            }
        }

        components.sort_by(|a, b| b.ordinal.total_cmp(&a.ordinal));
        debug!("Found {} extensions of {}", components.len(), type_name);
        components
    }
}
