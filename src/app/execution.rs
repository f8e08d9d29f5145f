//! Resolver execution and report assembly

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::config::ResolverSettings;
use crate::extension::{group_by_plugin, ExtensionComponent};
use crate::host::{Host, LocalHost};
use crate::manager::PluginManager;
use crate::pipeline::{LoggingObserver, Milestone, ReactorReport};
use crate::plugin::{FailedPlugin, PluginSummary};

/// One failure as reported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEntry {
    pub name: String,
    pub cause: String,
}

impl From<&FailedPlugin> for FailureEntry {
    fn from(failed: &FailedPlugin) -> Self {
        Self { name: failed.name.clone(), cause: failed.cause.to_string() }
    }
}

/// A discovered extension as reported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionSummary {
    pub class_name: String,
    pub element: String,
    pub ordinal: f64,
    pub optional: bool,
}

/// Everything one resolver run produced
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub plugin_dir: PathBuf,
    pub init_level: Option<Milestone>,
    pub check_cycles: bool,

    /// Active plugins in dependency order
    pub active: Vec<PluginSummary>,

    /// Inspected plugins that are not active
    pub inactive: Vec<PluginSummary>,
    pub failed: Vec<FailureEntry>,
    pub skipped_archives: Vec<String>,
    pub skipped_tasks: Vec<String>,
    pub task_failures: Vec<FailureEntry>,

    /// Extension type -> owning plugin -> components, highest ordinal first
    pub extensions: BTreeMap<String, BTreeMap<String, Vec<ExtensionSummary>>>,

    /// Class name -> plugin short name
    pub attribution: BTreeMap<String, String>,
}

/// Load the plugin directory, discover the requested extension types and report
pub fn run_resolver(settings: ResolverSettings, extension_types: &[String]) -> Result<ResolutionReport> {
    let manager = Arc::new(PluginManager::new(settings)?);
    info!("Resolving plugins in {}", manager.plugin_dir().display());

    let reactor_report = manager
        .initialize(manager.default_init_strategy(), Some(&LoggingObserver))
        .context("Plugin initialization failed")?;

    let host = LocalHost::new(Arc::clone(&manager));
    let mut extensions = BTreeMap::new();
    for type_name in extension_types {
        let list = host.extension_list(type_name)
            .with_context(|| format!("Failed to discover extensions of {}", type_name))?;
        if list.is_empty() {
            warn!("No extensions of {} found", type_name);
        }

        let summaries: Vec<ExtensionComponent<ExtensionSummary>> = list
            .iter()
            .map(|component| {
                let summary = ExtensionSummary {
                    class_name: component.class_name().to_string(),
                    element: component.instance().element().to_string(),
                    ordinal: component.ordinal(),
                    optional: component.is_optional(),
                };
                ExtensionComponent::new(summary, component.ordinal(), component.is_optional(), component.class_name())
            })
            .collect();

        // Attribution is complete once the components' classes are resolved
        let grouped = group_by_plugin(summaries, &manager.attribution())
            .into_iter()
            .map(|(plugin, components)| {
                (plugin, components.into_iter().map(ExtensionComponent::into_instance).collect())
            })
            .collect();
        extensions.insert(type_name.clone(), grouped);
    }

    Ok(build_report(&host, reactor_report, extensions))
}

fn build_report(
    host: &LocalHost,
    reactor_report: ReactorReport,
    extensions: BTreeMap<String, BTreeMap<String, Vec<ExtensionSummary>>>,
) -> ResolutionReport {
    let manager = host.plugin_manager();
    let (active, inactive): (Vec<PluginSummary>, Vec<PluginSummary>) = manager
        .plugins()
        .iter()
        .map(|p| p.summary())
        .partition(|summary| summary.active);

    // Registry order is the resolved order, so partitioning keeps it
    ResolutionReport {
        plugin_dir: manager.plugin_dir().to_path_buf(),
        init_level: host.init_level(),
        check_cycles: manager.settings().check_cycles,
        active,
        inactive,
        failed: manager.failed_plugins().iter().map(FailureEntry::from).collect(),
        skipped_archives: manager.skipped_archives().iter().map(ToString::to_string).collect(),
        skipped_tasks: reactor_report.skipped,
        task_failures: reactor_report
            .failures
            .iter()
            .map(|(task, e)| FailureEntry { name: task.clone(), cause: e.to_string() })
            .collect(),
        extensions,
        attribution: manager.attribution(),
    }
}
