//! Host Capability Surface
//!
//! What extension lookups need from the process hosting the plugins. Hosts are
//! passed to the components that need them; nothing looks one up globally.

use std::sync::Arc;
use dashmap::DashMap;
use log::debug;

use crate::error::ResolverResult;
use crate::extension::{ExtensionComponent, ExtensionInstance};
use crate::manager::PluginManager;
use crate::pipeline::Milestone;
use crate::plugin::PluginDescriptor;

/// Shared list of components found for one extension type
pub type ExtensionList = Arc<Vec<ExtensionComponent<ExtensionInstance>>>;

/// Capabilities a host offers to extension discovery
pub trait Host: Send + Sync {
    /// Last milestone the host's initialization attained
    fn init_level(&self) -> Option<Milestone>;

    fn plugin_manager(&self) -> &PluginManager;

    /// Components of an extension type, highest ordinal first
    fn extension_list(&self, type_name: &str) -> ResolverResult<ExtensionList>;

    /// Descriptor of the plugin a resolved class came from
    fn descriptor_by_class(&self, class_name: &str) -> Option<Arc<PluginDescriptor>>;

    /// Short name of the plugin a resolved class came from
    fn plugin_by_class(&self, class_name: &str) -> Option<String>;
}

/// In-process host over a plugin manager; extension lists are computed once per type
pub struct LocalHost {
    manager: Arc<PluginManager>,
    extension_lists: DashMap<String, ExtensionList>,
}

impl LocalHost {
    pub fn new(manager: Arc<PluginManager>) -> Self {
        Self { manager, extension_lists: DashMap::new() }
    }

    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    /// Number of extension types with a cached list
    pub fn cached_types(&self) -> usize {
        self.extension_lists.len()
    }
}

impl Host for LocalHost {
    fn init_level(&self) -> Option<Milestone> {
        self.manager.init_level().get()
    }

    fn plugin_manager(&self) -> &PluginManager {
        &self.manager
    }

    fn extension_list(&self, type_name: &str) -> ResolverResult<ExtensionList> {
        if let Some(list) = self.extension_lists.get(type_name) {
            return Ok(Arc::clone(list.value()));
        }

        let found = Arc::new(self.manager.strategy().find_components(type_name, Some(self))?);
        debug!("Caching {} extensions of {}", found.len(), type_name);
        let list = self
            .extension_lists
            .entry(type_name.to_string())
            .or_insert(found);
        Ok(Arc::clone(list.value()))
    }

    fn descriptor_by_class(&self, class_name: &str) -> Option<Arc<PluginDescriptor>> {
        self.plugin_by_class(class_name)
            .and_then(|plugin| self.manager.plugin(&plugin))
    }

    fn plugin_by_class(&self, class_name: &str) -> Option<String> {
        self.manager.class_loader().plugin_for_class(class_name)
    }
}

impl std::fmt::Debug for LocalHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalHost")
            .field("cached_types", &self.extension_lists.len())
            .finish()
    }
}
