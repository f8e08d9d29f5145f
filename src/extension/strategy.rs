//! Extension Strategy
//!
//! The facade callers use to discover extensions: scout the index, find the
//! assignable entries, then drop what the configured filters reject. Every
//! lookup runs against an explicitly supplied [`Host`].

use std::collections::BTreeMap;
use std::sync::Arc;
use log::{debug, warn};

use crate::error::{ResolverError, ResolverResult};
use crate::host::Host;
use crate::loader::{ClassResolver, DelegatingClassLoader};
use crate::pipeline::Milestone;
use super::filter::FilterChain;
use super::finder::{AnnotationIndexExtensionFinder, ExtensionComponent};
use super::index::ExtensionInstance;

/// Group name for classes no plugin is attributed with
pub const CORE_PLUGIN: &str = "core";

/// A typed view of extension instances of one requested type
pub trait ExtensionPoint: Sized {
    /// Fully qualified name of the requested type
    const TYPE_NAME: &'static str;

    /// Convert a live instance, failing if it is not usable as this type
    fn from_instance(instance: &ExtensionInstance) -> ResolverResult<Self>;
}

/// Scout, find and filter extensions across the active plugins
pub struct ExtensionStrategy {
    loader: Arc<DelegatingClassLoader>,
    finder: AnnotationIndexExtensionFinder,
    filters: FilterChain,
}

impl ExtensionStrategy {
    pub fn new(loader: Arc<DelegatingClassLoader>, filters: FilterChain) -> Self {
        Self {
            loader,
            finder: AnnotationIndexExtensionFinder::new(),
            filters,
        }
    }

    pub fn finder(&self) -> &AnnotationIndexExtensionFinder {
        &self.finder
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Components of `type_name`, highest ordinal first.
    ///
    /// Fails with `HostUnavailable` without a host and with `PluginsNotReady`
    /// while the host has not resolved its plugins.
    pub fn find_components(
        &self,
        type_name: &str,
        host: Option<&dyn Host>,
    ) -> ResolverResult<Vec<ExtensionComponent<ExtensionInstance>>> {
        let host = host.ok_or_else(|| {
            ResolverError::host_unavailable(format!("cannot look up extensions of {} without a host", type_name))
        })?;

        let reached = host.init_level().map_or(false, |level| level >= Milestone::PluginsResolved);
        if !reached {
            return Err(ResolverError::plugins_not_ready(format!(
                "host is at {} while looking up {}",
                host.init_level().map_or_else(|| "no milestone".to_string(), |l| l.to_string()),
                type_name
            )));
        }

        let resolver: Arc<dyn ClassResolver> = self.loader.clone();
        self.finder.scout(type_name, &resolver)?;
        let found = self.finder.find(type_name, &resolver)?;
        let kept = self.filters.apply(type_name, found);
        debug!("{} extensions of {} after filtering", kept.len(), type_name);
        Ok(kept)
    }

    /// Instances of `type_name`, highest ordinal first
    pub fn find_instances(&self, type_name: &str, host: Option<&dyn Host>) -> ResolverResult<Vec<ExtensionInstance>> {
        Ok(self
            .find_components(type_name, host)?
            .into_iter()
            .map(ExtensionComponent::into_instance)
            .collect())
    }

    /// Components converted to `T`; instances that do not convert are skipped
    pub fn find_typed<T: ExtensionPoint>(&self, host: Option<&dyn Host>) -> ResolverResult<Vec<ExtensionComponent<T>>> {
        let mut typed = Vec::new();
        for component in self.find_components(T::TYPE_NAME, host)? {
            match T::from_instance(component.instance()) {
                Ok(value) => typed.push(component.map(|_| value)),
                Err(e) => warn!("Skipping {} for {}: {}", component.class_name(), T::TYPE_NAME, e),
            }
        }
        Ok(typed)
    }
}

impl std::fmt::Debug for ExtensionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionStrategy")
            .field("finder", &self.finder)
            .field("filters", &self.filters)
            .finish()
    }
}

/// Group components by the plugin their class is attributed to.
///
/// Order within a group is preserved; unattributed classes land in [`CORE_PLUGIN`].
pub fn group_by_plugin<T>(
    components: Vec<ExtensionComponent<T>>,
    attribution: &BTreeMap<String, String>,
) -> BTreeMap<String, Vec<ExtensionComponent<T>>> {
    let mut groups: BTreeMap<String, Vec<ExtensionComponent<T>>> = BTreeMap::new();
    for component in components {
        let plugin = attribution
            .get(component.class_name())
            .cloned()
            .unwrap_or_else(|| CORE_PLUGIN.to_string());
        groups.entry(plugin).or_default().push(component);
    }
    groups
}
