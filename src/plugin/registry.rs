//! Plugin Registry
//!
//! Shared plugin state: the working plugin list, the failure and skip logs,
//! and the publish-once active plugin list read by the class loader.

use std::sync::{Arc, OnceLock};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::error::ResolverError;
use super::descriptor::{FailedPlugin, PluginDescriptor};

/// Registry for inspected plugins
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// Inspected, non-duplicate plugins in working order
    plugins: RwLock<Vec<Arc<PluginDescriptor>>>,

    /// Permanently excluded plugins
    failed: Mutex<Vec<FailedPlugin>>,

    /// Archives skipped as duplicates
    skipped: Mutex<Vec<ResolverError>>,

    /// Active plugins in dependency order, published once
    active: OnceLock<Vec<Arc<PluginDescriptor>>>,
}

impl PluginRegistry {
    /// Create a new plugin registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working plugin list
    pub fn set_plugins(&self, plugins: Vec<Arc<PluginDescriptor>>) {
        *self.plugins.write() = plugins;
    }

    /// Snapshot of the working plugin list
    pub fn plugins(&self) -> Vec<Arc<PluginDescriptor>> {
        self.plugins.read().clone()
    }

    /// Get a plugin by short name
    pub fn plugin(&self, short_name: &str) -> Option<Arc<PluginDescriptor>> {
        self.plugins.read()
            .iter()
            .find(|p| p.short_name() == short_name)
            .cloned()
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.read().len()
    }

    /// Append to the failure log
    pub fn record_failure(&self, failure: FailedPlugin) {
        warn!("Plugin {} failed: {}", failure.name, failure.cause);
        self.failed.lock().push(failure);
    }

    pub fn failed_plugins(&self) -> Vec<FailedPlugin> {
        self.failed.lock().clone()
    }

    /// Append to the duplicate-skip log
    pub fn record_skip(&self, skip: ResolverError) {
        info!("{}", skip);
        self.skipped.lock().push(skip);
    }

    pub fn skipped_archives(&self) -> Vec<ResolverError> {
        self.skipped.lock().clone()
    }

    /// Publish the active plugin list. Only the first publication takes effect.
    pub fn publish_active(&self, active: Vec<Arc<PluginDescriptor>>) -> bool {
        let count = active.len();
        match self.active.set(active) {
            Ok(()) => {
                debug!("Published {} active plugins", count);
                true
            }
            Err(_) => {
                warn!("Active plugin list already published; ignoring republication");
                false
            }
        }
    }

    /// Active plugins in dependency order, `None` until published
    pub fn active_plugins(&self) -> Option<&[Arc<PluginDescriptor>]> {
        self.active.get().map(Vec::as_slice)
    }

    pub fn is_published(&self) -> bool {
        self.active.get().is_some()
    }

    /// Deactivate every plugin and publish an empty active list
    pub fn stop(&self) {
        warn!("Deactivating all plugins");
        for plugin in self.plugins.read().iter() {
            plugin.deactivate();
        }
        if let Some(active) = self.active.get() {
            for plugin in active {
                plugin.deactivate();
            }
        } else {
            let _ = self.active.set(Vec::new());
        }
    }
}
