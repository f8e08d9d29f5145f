//! Failure isolation
//!
//! Bad archives, dependency cycles and missing classes are recorded and
//! contained; only listing and resolution failures end initialization.

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{names, workflow_dir, PluginDir, API_MANIFEST};
use plugin_resolver::config::ResolverSettings;
use plugin_resolver::error::ResolverResult;
use plugin_resolver::loader::{ClassDef, ClassSpec};
use plugin_resolver::manager::LISTING_TASK;
use plugin_resolver::pipeline::{InitStrategy, Milestone};
use plugin_resolver::plugin::PluginArchiveInspector;
use plugin_resolver::{PluginManager, ResolverError};

#[test]
fn test_bad_archives_fail_alone() {
    let dir = PluginDir::new();
    dir.plugin("api", API_MANIFEST);
    dir.standalone("malformed.yaml", "short_name: [unterminated");
    dir.standalone("badversion.yaml", "short_name: badversion\nversion: '1.x'\n");
    dir.standalone("future.yaml", "short_name: future\nversion: '1.0'\napi_version: 20990101\n");
    dir.standalone("blank.yml", "short_name: ' '\nversion: '1.0'\n");

    let manager = dir.initialized();

    assert_eq!(names(manager.active_plugins()), vec!["api"]);
    assert_eq!(manager.init_level().get(), Some(Milestone::Completed));

    let mut failed: Vec<String> = manager.failed_plugins().iter().map(|f| f.name.clone()).collect();
    failed.sort();
    assert_eq!(failed, vec!["badversion.yaml", "blank.yml", "future.yaml", "malformed.yaml"]);
    assert!(manager
        .failed_plugins()
        .iter()
        .all(|f| matches!(f.cause, ResolverError::InspectionFailed { .. })));
}

#[test]
fn test_missing_plugin_dir_fails_listing() {
    let dir = PluginDir::new();
    let settings = ResolverSettings {
        plugin_dir: dir.path().join("nowhere"),
        ..dir.settings()
    };
    let manager = PluginManager::new(settings).unwrap();

    let err = manager.initialize(manager.default_init_strategy(), None).unwrap_err();
    assert!(matches!(err, ResolverError::TaskFailed { ref task, .. } if task == LISTING_TASK));
    assert!(!manager.init_level().has_reached(Milestone::PluginsListed));
    assert!(manager.plugins().is_empty());
}

#[test]
fn test_cycle_members_quarantined_bystanders_load() {
    let dir = PluginDir::new();
    dir.standalone("a.yaml", "short_name: a\nversion: '1.0'\ndependencies:\n  - name: b\n");
    dir.standalone("b.yaml", "short_name: b\nversion: '1.0'\ndependencies:\n  - name: a\n");
    dir.standalone("c.yaml", "short_name: c\nversion: '1.0'\n");
    dir.plugin("api", API_MANIFEST);

    let manager = dir.initialized();

    assert_eq!(names(manager.active_plugins()), vec!["api", "c"]);
    for member in ["a", "b"] {
        let plugin = manager.plugin(member).unwrap();
        assert!(plugin.has_cycle_dependency());
        assert!(!plugin.is_active());
    }

    let failed = manager.failed_plugins();
    assert_eq!(failed.len(), 2);
    assert!(failed
        .iter()
        .all(|f| matches!(&f.cause, ResolverError::CycleDetected { cycle, .. } if cycle.len() == 3)));

    // Quarantined plugins follow the resolved order
    let mut tail = names(&manager.plugins()).split_off(2);
    tail.sort();
    assert_eq!(tail, vec!["a", "b"]);
}

#[test]
fn test_optional_dependency_cycle_is_quarantined() {
    let dir = PluginDir::new();
    dir.standalone("a.yaml", "short_name: a\nversion: '1.0'\ndependencies:\n  - name: b\n");
    dir.standalone(
        "b.yaml",
        "short_name: b\nversion: '1.0'\ndependencies:\n  - name: a\n    optional: true\n",
    );

    let manager = dir.initialized();
    assert!(manager.active_plugins().is_empty());
    assert_eq!(manager.failed_plugins().len(), 2);
}

#[test]
fn test_class_misses_are_cached() {
    let dir = workflow_dir();
    let manager = dir.initialized();
    let loader = manager.class_loader();

    let first = loader.resolve_class("org.nowhere.Gone").unwrap_err();
    assert_eq!(first, ResolverError::ClassNotFound { name: "org.nowhere.Gone".to_string(), cached: false });

    let second = loader.resolve_class("org.nowhere.Gone").unwrap_err();
    assert_eq!(second, ResolverError::ClassNotFound { name: "org.nowhere.Gone".to_string(), cached: true });

    assert!(loader.is_cached("org.nowhere.Gone"));
    assert!(!manager.attribution().contains_key("org.nowhere.Gone"));
}

#[test]
fn test_ignored_class_patterns() {
    let dir = PluginDir::new();
    dir.plugin("templates", r#"
short_name: templates
version: "1.0"
classes:
  - name: SimpleTemplateScript7
  - name: templates.Engine
"#);

    let manager = dir.initialized();
    let loader = manager.class_loader();

    assert!(loader.resolve_class("SimpleTemplateScript7").unwrap_err().is_class_not_found());
    assert!(!loader.is_cached("SimpleTemplateScript7"));
    assert!(loader.resolve_class("templates.Engine").is_ok());

    let strict = common::initialize(ResolverSettings {
        ignored_class_patterns: vec!["^templates\\.".to_string()],
        ..dir.settings()
    });
    assert!(strict.class_loader().resolve_class("templates.Engine").is_err());
    assert!(strict.class_loader().resolve_class("SimpleTemplateScript7").is_ok());
}

#[test]
fn test_generated_classes_shadow_until_unregistered() {
    let dir = workflow_dir();
    let manager = dir.initialized();
    let loader = manager.class_loader();

    let generated = Arc::new(ClassDef::new(ClassSpec::new("Script1", &[]), "generated"));
    loader.register_generated("Script1", Arc::clone(&generated));
    assert!(Arc::ptr_eq(&loader.resolve_class("Script1").unwrap(), &generated));
    assert!(!manager.attribution().contains_key("Script1"));

    assert!(loader.unregister_generated("Script1").is_some());
    assert!(loader.resolve_class("Script1").unwrap_err().is_class_not_found());
    assert!(loader.unregister_generated("Script1").is_none());
}

/// Lists the real archives plus one that does not exist
struct PhantomArchiveStrategy {
    inspector: PluginArchiveInspector,
}

impl InitStrategy for PhantomArchiveStrategy {
    fn list_plugin_archives(&self, root: &Path) -> ResolverResult<Vec<PathBuf>> {
        let mut archives = self.inspector.list_archives(root)?;
        archives.push(root.join("phantom.yaml"));
        Ok(archives)
    }
}

#[test]
fn test_custom_strategy_with_unreadable_archive() {
    let dir = PluginDir::new();
    dir.plugin("api", API_MANIFEST);

    let manager = PluginManager::new(dir.settings()).unwrap();
    let strategy = Arc::new(PhantomArchiveStrategy { inspector: PluginArchiveInspector::default() });
    let report = manager.initialize(strategy, None).unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(names(manager.active_plugins()), vec!["api"]);

    let failed = manager.failed_plugins();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "phantom.yaml");
    assert!(failed[0].cause.to_string().contains("unreadable manifest"));
}

/// Listing that always fails
struct BrokenListing;

impl InitStrategy for BrokenListing {
    fn list_plugin_archives(&self, _root: &Path) -> ResolverResult<Vec<PathBuf>> {
        Err(ResolverError::Io { message: "permission denied".to_string() })
    }
}

#[test]
fn test_listing_failure_is_fatal() {
    let dir = workflow_dir();
    let manager = PluginManager::new(dir.settings()).unwrap();

    let err = manager.initialize(Arc::new(BrokenListing), None).unwrap_err();
    assert!(err.to_string().contains("permission denied"));
    assert!(manager.registry().active_plugins().is_none());
    assert!(manager.class_loader().resolve_class("steps.Echo").is_err());
}
