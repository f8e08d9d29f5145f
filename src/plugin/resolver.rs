//! Dependency Graph Resolver
//!
//! Orders the inspected plugins so that dependencies come before dependents,
//! quarantines every plugin that sits on a dependency cycle and publishes the
//! resulting active plugin list.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use log::{debug, error, info, warn};

use crate::error::{ResolverError, ResolverResult};
use crate::graph::CycleDetector;
use crate::pipeline::reactor::panic_message;
use super::compatibility::VersionCompatibilityChecker;
use super::descriptor::{FailedPlugin, PluginDescriptor};
use super::registry::PluginRegistry;

/// Resolves the plugin dependency graph held in a registry
#[derive(Debug, Clone, Default)]
pub struct DependencyGraphResolver {
    checker: VersionCompatibilityChecker,
}

impl DependencyGraphResolver {
    pub fn new(checker: VersionCompatibilityChecker) -> Self {
        Self { checker }
    }

    /// Resolve using each plugin's declared required and optional dependencies.
    ///
    /// With `check_cycles` off, inspection order is published unchanged.
    pub fn resolve(&self, registry: &PluginRegistry, check_cycles: bool) -> ResolverResult<Vec<Arc<PluginDescriptor>>> {
        let plugins = registry.plugins();
        self.checker.report_dependency_problems(&plugins);

        if !check_cycles {
            info!("Cycle checking disabled; using inspection order");
            return Ok(Self::publish(registry, &plugins));
        }

        let dependencies: HashMap<String, Vec<String>> = plugins
            .iter()
            .map(|p| {
                let names = p.all_dependencies().map(|d| d.short_name.clone()).collect();
                (p.short_name().to_string(), names)
            })
            .collect();

        self.resolve_with(registry, |name: &str| {
            Ok::<_, Infallible>(dependencies.get(name).cloned().unwrap_or_default())
        })
    }

    /// Resolve with an injected edge provider mapping a short name to the
    /// short names it depends on. A provider error is fatal: every plugin is
    /// deactivated and `CycleCheckFailed` is returned.
    pub fn resolve_with<F, E>(&self, registry: &PluginRegistry, mut edges: F) -> ResolverResult<Vec<Arc<PluginDescriptor>>>
    where
        F: FnMut(&str) -> Result<Vec<String>, E>,
        E: fmt::Display,
    {
        let plugins = registry.plugins();
        let by_name: HashMap<&str, &Arc<PluginDescriptor>> =
            plugins.iter().map(|p| (p.short_name(), p)).collect();
        let names: Vec<String> = plugins.iter().map(|p| p.short_name().to_string()).collect();

        // A panicking detector is as fatal as a failing one
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            CycleDetector::new(|name: &String| edges(name.as_str())).run(&names)
        }));
        let analysis = match outcome {
            Ok(Ok(analysis)) => analysis,
            Ok(Err(e)) => return Err(Self::stop_all(registry, e.to_string())),
            Err(payload) => return Err(Self::stop_all(registry, panic_message(payload))),
        };

        let mut quarantined = Vec::new();
        for cycle in &analysis.cycles {
            let root = cycle[0].clone();
            let mut path = cycle.clone();
            path.push(root.clone());
            warn!("Dependency cycle detected: {}", path.join(" -> "));

            for member in cycle {
                if let Some(plugin) = by_name.get(member.as_str()) {
                    plugin.mark_cycle_dependency();
                    registry.record_failure(FailedPlugin::new(
                        member.clone(),
                        ResolverError::cycle_detected(root.clone(), path.clone()),
                    ));
                    quarantined.push(Arc::clone(plugin));
                }
            }
        }

        let mut ordered: Vec<Arc<PluginDescriptor>> = analysis
            .sorted
            .iter()
            .filter_map(|name| by_name.get(name.as_str()).map(|p| Arc::clone(p)))
            .collect();
        let active = Self::publish(registry, &ordered);

        ordered.extend(quarantined);
        registry.set_plugins(ordered);

        Ok(active)
    }

    fn stop_all(registry: &PluginRegistry, message: String) -> ResolverError {
        error!("Cycle detection failed, stopping all plugins: {}", message);
        registry.stop();
        ResolverError::cycle_check_failed(message)
    }

    fn publish(registry: &PluginRegistry, ordered: &[Arc<PluginDescriptor>]) -> Vec<Arc<PluginDescriptor>> {
        let active: Vec<Arc<PluginDescriptor>> = ordered
            .iter()
            .filter(|p| p.is_active())
            .cloned()
            .collect();

        debug!(
            "Active plugin order: {}",
            active.iter().map(|p| p.short_name()).collect::<Vec<_>>().join(", ")
        );
        registry.publish_active(active.clone());
        active
    }
}
