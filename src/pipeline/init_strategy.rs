//! Initialization Strategy
//!
//! Caller hooks into the pipeline: how plugin archives are listed and which
//! tasks are skipped.

use std::path::{Path, PathBuf};
use log::debug;

use crate::error::ResolverResult;
use crate::plugin::archive::PluginArchiveInspector;
use super::task::Task;

/// Hooks consulted while building and running the task graph
pub trait InitStrategy: Send + Sync {
    /// Archives to inspect under the plugin root
    fn list_plugin_archives(&self, root: &Path) -> ResolverResult<Vec<PathBuf>>;

    /// Veto execution of a task; a skipped task counts as done
    fn skip_init_task(&self, _task: &Task) -> bool {
        false
    }
}

/// Lists archives with the archive inspector and skips tasks by name prefix
#[derive(Debug, Clone, Default)]
pub struct DefaultInitStrategy {
    inspector: PluginArchiveInspector,
    skip_prefixes: Vec<String>,
}

impl DefaultInitStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip every task whose name starts with one of `prefixes`
    pub fn with_skip_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.skip_prefixes = prefixes;
        self
    }
}

impl InitStrategy for DefaultInitStrategy {
    fn list_plugin_archives(&self, root: &Path) -> ResolverResult<Vec<PathBuf>> {
        self.inspector.list_archives(root)
    }

    fn skip_init_task(&self, task: &Task) -> bool {
        let skip = self.skip_prefixes.iter().any(|prefix| task.name().starts_with(prefix.as_str()));
        if skip {
            debug!("Skipping task by configuration: {}", task.name());
        }
        skip
    }
}
