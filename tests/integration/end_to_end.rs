//! End-to-end plugin loading
//!
//! Runs the full pipeline over plugin directories on disk and checks the
//! resulting order, class attribution, resources and reports.

mod common;

use std::sync::Arc;
use std::thread;

use common::{names, workflow_dir, PluginDir, API_MANIFEST};
use plugin_resolver::app::run_resolver;
use plugin_resolver::config::ResolverSettings;
use plugin_resolver::manager::INSPECTING_TASK_PREFIX;
use plugin_resolver::pipeline::{ChannelObserver, Milestone};
use plugin_resolver::{PluginManager, ResolverError};

#[test]
fn test_dependencies_load_before_dependents() {
    let dir = PluginDir::new();
    // Listed first, but depends on everything else
    dir.plugin("00-app", r#"
short_name: app
version: "3.0"
dependencies:
  - name: steps
  - name: api
"#);
    dir.plugin("api", API_MANIFEST);
    dir.plugin("steps", "short_name: steps\nversion: '2.0'\ndependencies:\n  - name: api\n");

    let manager = Arc::new(PluginManager::new(dir.settings()).unwrap());
    let (observer, milestones) = ChannelObserver::new();
    let report = manager
        .initialize(manager.default_init_strategy(), Some(&observer))
        .unwrap();

    assert_eq!(names(manager.active_plugins()), vec!["api", "steps", "app"]);
    assert_eq!(milestones.try_iter().collect::<Vec<_>>(), Milestone::ALL.to_vec());
    assert_eq!(report.attained, Milestone::ALL.to_vec());
    assert!(report.failures.is_empty());
    assert!(manager.failed_plugins().is_empty());
}

#[test]
fn test_optional_dependency_orders_but_is_not_required() {
    let dir = PluginDir::new();
    dir.plugin("00-reports", r#"
short_name: reports
version: "1.0"
dependencies:
  - name: charts
    optional: true
  - name: absent
    optional: true
"#);
    dir.plugin("charts", "short_name: charts\nversion: '1.0'\n");

    let manager = dir.initialized();
    assert_eq!(names(manager.active_plugins()), vec!["charts", "reports"]);
}

#[test]
fn test_disabled_plugin_is_listed_but_inactive() {
    let dir = PluginDir::new();
    dir.plugin("api", API_MANIFEST);
    dir.standalone("legacy.yaml", "short_name: legacy\nversion: '0.9'\nenabled: false\n");

    let manager = dir.initialized();
    assert_eq!(names(manager.active_plugins()), vec!["api"]);
    assert_eq!(manager.plugins().len(), 2);

    let legacy = manager.plugin("legacy").unwrap();
    assert!(!legacy.is_active());
    assert!(!legacy.has_cycle_dependency());
}

#[test]
fn test_duplicate_archive_keeps_first_listed() {
    let dir = PluginDir::new();
    dir.plugin("a-tools", "short_name: tools\nversion: '1.0'\n");
    dir.plugin("b-tools", "short_name: tools\nversion: '2.0'\n");

    let manager = dir.initialized();

    assert_eq!(manager.plugins().len(), 1);
    assert_eq!(manager.plugin("tools").unwrap().version(), "1.0");

    let skipped = manager.skipped_archives();
    assert_eq!(skipped.len(), 1);
    assert!(matches!(
        &skipped[0],
        ResolverError::DuplicateArchive { archive, kept, .. } if archive == "b-tools" && kept == "a-tools"
    ));
    assert!(manager.failed_plugins().is_empty());
}

#[test]
fn test_class_resolution_is_attributed_and_idempotent() {
    let dir = workflow_dir();
    let manager = dir.initialized();
    let loader = manager.class_loader();

    let echo = loader.resolve_class("steps.Echo").unwrap();
    assert_eq!(echo.plugin(), "steps");
    assert!(Arc::ptr_eq(&echo, &loader.resolve_class("steps.Echo").unwrap()));

    let step = loader.resolve_class("api.Step").unwrap();
    assert_eq!(step.plugin(), "api");

    let attribution = manager.attribution();
    assert_eq!(attribution.get("steps.Echo").map(String::as_str), Some("steps"));
    assert_eq!(attribution.get("api.Step").map(String::as_str), Some("api"));
    assert_eq!(loader.plugin_for_class("steps.Echo").as_deref(), Some("steps"));
}

#[test]
fn test_concurrent_first_lookups_agree() {
    let dir = workflow_dir();
    let manager = dir.initialized();

    let classes: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.class_loader().resolve_class("steps.Sleep").unwrap())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert!(classes.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(manager.attribution().get("steps.Sleep").map(String::as_str), Some("steps"));
}

#[test]
fn test_resources_single_and_all() {
    let dir = workflow_dir();
    dir.resource("api", "help/index.html", "<p>api</p>");
    dir.resource("steps", "help/index.html", "<p>steps</p>");
    dir.resource("steps", "help/steps.html", "<p>only steps</p>");

    let manager = dir.initialized();
    let loader = manager.class_loader();

    let first = loader.resolve_resource("help/index.html").unwrap();
    assert_eq!(first.plugin(), "api");
    assert_eq!(first.read_to_string().unwrap(), "<p>api</p>");

    let all: Vec<String> = loader
        .resolve_all_resources("help/index.html")
        .iter()
        .map(|url| url.plugin().to_string())
        .collect();
    assert_eq!(all, vec!["api", "steps"]);

    assert_eq!(loader.resolve_resource("help/steps.html").unwrap().plugin(), "steps");
    assert!(loader.resolve_resource("../plugin.yaml").is_none());
    assert!(loader.resolve_all_resources("help/none.html").is_empty());
}

#[test]
fn test_configured_task_skip() {
    let dir = PluginDir::new();
    dir.plugin("api", API_MANIFEST);
    dir.standalone("legacy.yaml", "short_name: legacy\nversion: '1.0'\n");

    let manager = Arc::new(
        PluginManager::new(ResolverSettings {
            skip_tasks: vec![format!("{}legacy", INSPECTING_TASK_PREFIX)],
            ..dir.settings()
        })
        .unwrap(),
    );
    let report = manager.initialize(manager.default_init_strategy(), None).unwrap();

    assert_eq!(report.skipped, vec![format!("{}legacy.yaml", INSPECTING_TASK_PREFIX)]);
    assert_eq!(names(manager.active_plugins()), vec!["api"]);
    assert!(manager.plugin("legacy").is_none());
    assert_eq!(manager.init_level().get(), Some(Milestone::Completed));
}

#[test]
fn test_cycle_tolerated_without_cycle_check() {
    let dir = PluginDir::new();
    dir.standalone("a.yaml", "short_name: a\nversion: '1.0'\ndependencies:\n  - name: b\n");
    dir.standalone("b.yaml", "short_name: b\nversion: '1.0'\ndependencies:\n  - name: a\n");

    let manager = common::initialize(ResolverSettings { check_cycles: false, ..dir.settings() });

    assert_eq!(names(manager.active_plugins()), vec!["a", "b"]);
    assert!(manager.failed_plugins().is_empty());
    assert!(!manager.plugin("a").unwrap().has_cycle_dependency());
}

#[test]
fn test_run_resolver_report() {
    let dir = workflow_dir();
    dir.standalone("zz-broken.yaml", "short_name: broken\nversion: not-a-version\n");

    let report = run_resolver(dir.settings(), &["api.Step".to_string()]).unwrap();

    let active: Vec<&str> = report.active.iter().map(|p| p.short_name.as_str()).collect();
    assert_eq!(active, vec!["api", "steps"]);
    assert!(report.inactive.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "zz-broken.yaml");
    assert!(report.failed[0].cause.contains("invalid version format"));

    let steps = &report.extensions["api.Step"]["steps"];
    let classes: Vec<&str> = steps.iter().map(|e| e.class_name.as_str()).collect();
    assert_eq!(classes, vec!["steps.Sleep", "steps.Echo"]);
    assert_eq!(steps[0].element, "steps.Holder.SLEEP");

    assert_eq!(report.attribution.get("steps.Echo").map(String::as_str), Some("steps"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["init_level"], "completed");
    assert_eq!(json["extensions"]["api.Step"]["steps"][1]["ordinal"], 1.0);
}
