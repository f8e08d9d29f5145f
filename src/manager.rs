//! Plugin Manager
//!
//! Owns the shared plugin state and wires archive listing, inspection and
//! dependency resolution into the initialization task graph.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use log::{debug, info};
use parking_lot::Mutex;

use crate::config::ResolverSettings;
use crate::error::{ResolverError, ResolverResult};
use crate::extension::{DenyListFilter, ExtensionStrategy, FilterChain};
use crate::loader::DelegatingClassLoader;
use crate::pipeline::{
    DefaultInitStrategy, InitLevel, InitStrategy, Milestone, MilestoneObserver, Reactor, ReactorReport, Task,
    TaskGraphBuilder,
};
use crate::plugin::archive::{archive_id, InspectionBatch, PluginArchiveInspector};
use crate::plugin::{DependencyGraphResolver, FailedPlugin, PluginDescriptor, PluginRegistry};

pub const LISTING_TASK: &str = "Listing up plugins";
pub const PREPARING_TASK: &str = "Preparing plugins";
pub const INSPECTING_TASK_PREFIX: &str = "Inspecting plugin ";
pub const CYCLE_CHECK_TASK: &str = "Checking cyclic dependencies";
pub const ORDERING_TASK: &str = "Ordering plugins";

/// Loads a plugin directory and serves class and extension lookups over it
pub struct PluginManager {
    settings: ResolverSettings,
    registry: Arc<PluginRegistry>,
    class_loader: Arc<DelegatingClassLoader>,
    strategy: ExtensionStrategy,
    inspector: PluginArchiveInspector,
    resolver: DependencyGraphResolver,
    init_level: Arc<InitLevel>,
    started: AtomicBool,
}

impl PluginManager {
    pub fn new(settings: ResolverSettings) -> ResolverResult<Self> {
        let registry = Arc::new(PluginRegistry::new());
        let class_loader = Arc::new(
            DelegatingClassLoader::new(Arc::clone(&registry))
                .with_ignored_patterns(settings.ignored_class_patterns.as_slice())?
                .with_fast_lookup(settings.fast_lookup),
        );

        let mut filters = FilterChain::new();
        if !settings.denied_extensions.is_empty() {
            filters.add(DenyListFilter::from_map(&settings.denied_extensions));
        }
        let strategy = ExtensionStrategy::new(Arc::clone(&class_loader), filters);

        Ok(Self {
            settings,
            registry,
            class_loader,
            strategy,
            inspector: PluginArchiveInspector::default(),
            resolver: DependencyGraphResolver::default(),
            init_level: Arc::new(InitLevel::new()),
            started: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.settings.plugin_dir
    }

    /// Init strategy that skips the configured task prefixes
    pub fn default_init_strategy(&self) -> Arc<dyn InitStrategy> {
        Arc::new(DefaultInitStrategy::new().with_skip_prefixes(self.settings.skip_tasks.clone()))
    }

    /// Build the plugin loading task graph.
    ///
    /// Listing attains `PluginsListed`. Preparing adds one non-fatal
    /// inspection task per archive plus the fatal resolution task.
    pub fn diagram_plugins(&self, init_strategy: Arc<dyn InitStrategy>) -> TaskGraphBuilder {
        let archives: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
        let mut builder = TaskGraphBuilder::new();

        let listed = Arc::clone(&archives);
        let root = self.settings.plugin_dir.clone();
        builder.attains(Milestone::PluginsListed).add(LISTING_TASK, move |_| {
            let found = init_strategy.list_plugin_archives(&root)?;
            info!("Found {} plugin archives in {}", found.len(), root.display());
            *listed.lock() = found;
            Ok(())
        });

        let inspector = self.inspector.clone();
        let resolver = self.resolver.clone();
        let registry = Arc::clone(&self.registry);
        let check_cycles = self.settings.check_cycles;
        builder
            .requires(Milestone::PluginsListed)
            .attains(Milestone::PluginsInspected)
            .add(PREPARING_TASK, move |context| {
                let batch = Arc::new(InspectionBatch::new());
                let archives = std::mem::take(&mut *archives.lock());

                for (index, archive) in archives.into_iter().enumerate() {
                    context.add(Self::inspection_task(
                        index,
                        archive,
                        inspector.clone(),
                        Arc::clone(&batch),
                        Arc::clone(&registry),
                    ));
                }
                context.add(Self::resolution_task(batch, resolver, registry, check_cycles));
                Ok(())
            });

        builder
    }

    fn inspection_task(
        index: usize,
        archive: PathBuf,
        inspector: PluginArchiveInspector,
        batch: Arc<InspectionBatch>,
        registry: Arc<PluginRegistry>,
    ) -> Task {
        let id = archive_id(&archive);
        Task::new(format!("{}{}", INSPECTING_TASK_PREFIX, id), move |_| {
            match inspector.inspect(&archive) {
                Ok(descriptor) => {
                    debug!("Inspected {} as {}", id, descriptor);
                    if let Some(skip) = batch.record(index, descriptor) {
                        registry.record_skip(skip);
                    }
                }
                Err(e) => registry.record_failure(FailedPlugin::new(id, e)),
            }
            Ok(())
        })
        .requires(Milestone::PluginsListed)
        .attains(Milestone::PluginsInspected)
        .not_fatal()
    }

    fn resolution_task(
        batch: Arc<InspectionBatch>,
        resolver: DependencyGraphResolver,
        registry: Arc<PluginRegistry>,
        check_cycles: bool,
    ) -> Task {
        let name = if check_cycles { CYCLE_CHECK_TASK } else { ORDERING_TASK };
        Task::new(name, move |_| {
            registry.set_plugins(batch.finish());
            let active = resolver.resolve(&registry, check_cycles)?;
            info!("{} of {} plugins active", active.len(), registry.plugin_count());
            Ok(())
        })
        .requires(Milestone::PluginsInspected)
        .attains(Milestone::PluginsResolved)
    }

    /// Run the plugin loading pipeline to completion
    pub fn initialize(
        &self,
        init_strategy: Arc<dyn InitStrategy>,
        observer: Option<&dyn MilestoneObserver>,
    ) -> ResolverResult<ReactorReport> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ResolverError::configuration("plugin manager already initialized"));
        }

        let builder = self.diagram_plugins(Arc::clone(&init_strategy));
        let reactor = Reactor::new(self.settings.worker_threads)?;

        let mut observers: Vec<&dyn MilestoneObserver> = vec![self.init_level.as_ref() as &dyn MilestoneObserver];
        observers.extend(observer);
        reactor.run(builder, init_strategy.as_ref(), &observers)
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Every inspected plugin: the resolved order, then quarantined ones
    pub fn plugins(&self) -> Vec<Arc<PluginDescriptor>> {
        self.registry.plugins()
    }

    /// Active plugins in dependency order; empty until resolution publishes them
    pub fn active_plugins(&self) -> &[Arc<PluginDescriptor>] {
        self.registry.active_plugins().unwrap_or(&[])
    }

    pub fn failed_plugins(&self) -> Vec<FailedPlugin> {
        self.registry.failed_plugins()
    }

    /// Duplicate archives skipped during inspection
    pub fn skipped_archives(&self) -> Vec<ResolverError> {
        self.registry.skipped_archives()
    }

    /// Class name -> short name of the plugin it was resolved from
    pub fn attribution(&self) -> BTreeMap<String, String> {
        self.class_loader.attribution()
    }

    pub fn plugin(&self, short_name: &str) -> Option<Arc<PluginDescriptor>> {
        self.registry.plugin(short_name)
    }

    pub fn class_loader(&self) -> &Arc<DelegatingClassLoader> {
        &self.class_loader
    }

    pub fn strategy(&self) -> &ExtensionStrategy {
        &self.strategy
    }

    pub fn init_level(&self) -> &Arc<InitLevel> {
        &self.init_level
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugin_dir", &self.settings.plugin_dir)
            .field("init_level", &self.init_level.get())
            .field("plugins", &self.registry.plugin_count())
            .finish()
    }
}
