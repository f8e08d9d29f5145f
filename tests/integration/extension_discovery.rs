//! Extension discovery through a host
//!
//! Index files from every active plugin are merged; lookups scout, find and
//! filter, and the host caches one list per extension type.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{workflow_dir, PluginDir};
use plugin_resolver::config::ResolverSettings;
use plugin_resolver::error::ResolverResult;
use plugin_resolver::extension::{group_by_plugin, ExtensionInstance, ExtensionPoint, CORE_PLUGIN};
use plugin_resolver::manager::CYCLE_CHECK_TASK;
use plugin_resolver::pipeline::Milestone;
use plugin_resolver::{Host, LocalHost, PluginManager, ResolverError};

const PUBLISHERS_MANIFEST: &str = r#"
short_name: publishers
version: "1.2"
dependencies:
  - name: api
classes:
  - name: publishers.Mail
    supertypes: [api.Publisher]
  - name: publishers.Factory
"#;

fn publishers_dir() -> PluginDir {
    let dir = workflow_dir();
    dir.plugin("publishers", PUBLISHERS_MANIFEST);
    dir.index(
        "publishers",
        serde_json::json!([
            {"element": {"kind": "method", "declaring_type": "publishers.Factory", "name": "mail",
                         "return_type": "publishers.Mail"},
             "ordinal": 5.0, "properties": {"function": "mail", "secure": true}}
        ]),
    );
    dir
}

fn classes(host: &LocalHost, type_name: &str) -> Vec<String> {
    host.extension_list(type_name)
        .unwrap()
        .iter()
        .map(|c| c.class_name().to_string())
        .collect()
}

#[test]
fn test_extension_list_orders_by_ordinal() {
    let dir = workflow_dir();
    let host = LocalHost::new(dir.initialized());

    let list = host.extension_list("api.Step").unwrap();
    let found: Vec<(&str, f64)> = list.iter().map(|c| (c.class_name(), c.ordinal())).collect();
    assert_eq!(found, vec![("steps.Sleep", 10.0), ("steps.Echo", 1.0)]);

    let sleep = list[0].instance();
    assert_eq!(sleep.element().to_string(), "steps.Holder.SLEEP");
    assert_eq!(sleep.property_str("function"), Some("sleep"));
    assert_eq!(sleep.class().plugin(), "steps");
}

#[test]
fn test_failing_and_abstract_entries_are_skipped() {
    let dir = workflow_dir();
    let manager = dir.initialized();
    let host = LocalHost::new(Arc::clone(&manager));

    let found = classes(&host, "api.Step");
    assert!(!found.contains(&"steps.Broken".to_string()));
    assert!(!found.contains(&"steps.AbstractStep".to_string()));

    // The broken class resolved, only its initialization failed
    assert!(manager.class_loader().is_cached("steps.Broken"));
    assert!(manager.class_loader().resolve_class("steps.Missing").unwrap_err().is_class_not_found());
}

#[test]
fn test_indexes_merge_across_plugins() {
    let dir = publishers_dir();
    let host = LocalHost::new(dir.initialized());

    assert_eq!(classes(&host, "api.Publisher"), vec!["publishers.Mail"]);
    assert_eq!(classes(&host, "api.Step"), vec!["steps.Sleep", "steps.Echo"]);

    let publishers = host.extension_list("api.Publisher").unwrap();
    let mail = publishers[0].instance();
    assert_eq!(mail.element().to_string(), "publishers.Factory.mail()");
    assert_eq!(mail.property_bool("secure"), Some(true));
    assert!(host.extension_list("api.Nothing").unwrap().is_empty());
}

#[test]
fn test_extension_lists_are_cached_per_type() {
    let dir = workflow_dir();
    let host = LocalHost::new(dir.initialized());

    let first = host.extension_list("api.Step").unwrap();
    let second = host.extension_list("api.Step").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(host.cached_types(), 1);

    host.extension_list("api.Publisher").unwrap();
    assert_eq!(host.cached_types(), 2);
}

#[test]
fn test_host_attributes_classes() {
    let dir = publishers_dir();
    let host = LocalHost::new(dir.initialized());
    host.extension_list("api.Publisher").unwrap();

    assert_eq!(host.plugin_by_class("publishers.Mail").as_deref(), Some("publishers"));
    let descriptor = host.descriptor_by_class("publishers.Mail").unwrap();
    assert_eq!(descriptor.version(), "1.2");

    assert!(host.plugin_by_class("java.lang.String").is_none());
    assert!(host.descriptor_by_class("java.lang.String").is_none());
}

#[test]
fn test_denied_extensions_are_filtered() {
    let dir = workflow_dir();
    let manager = common::initialize(ResolverSettings {
        denied_extensions: HashMap::from([("api.Step".to_string(), vec!["steps.Echo".to_string()])]),
        ..dir.settings()
    });
    let host = LocalHost::new(Arc::clone(&manager));

    assert_eq!(classes(&host, "api.Step"), vec!["steps.Sleep"]);
    // Filtering drops the component, not the class
    assert!(manager.class_loader().resolve_class("steps.Echo").is_ok());
}

#[test]
fn test_lookup_requires_host() {
    let dir = workflow_dir();
    let manager = dir.initialized();

    let err = manager.strategy().find_components("api.Step", None).unwrap_err();
    assert!(matches!(err, ResolverError::HostUnavailable { .. }));
}

#[test]
fn test_lookup_before_initialization() {
    let dir = workflow_dir();
    let manager = Arc::new(PluginManager::new(dir.settings()).unwrap());
    let host = LocalHost::new(Arc::clone(&manager));

    let err = host.extension_list("api.Step").unwrap_err();
    assert!(matches!(err, ResolverError::PluginsNotReady { .. }));
    assert_eq!(host.cached_types(), 0);

    let err = manager.class_loader().resolve_class("steps.Echo").unwrap_err();
    assert!(matches!(err, ResolverError::PluginsNotReady { .. }));

    manager.initialize(manager.default_init_strategy(), None).unwrap();
    assert_eq!(host.extension_list("api.Step").unwrap().len(), 2);
}

#[test]
fn test_lookup_when_resolution_was_skipped() {
    let dir = workflow_dir();
    let manager = common::initialize(ResolverSettings {
        skip_tasks: vec![CYCLE_CHECK_TASK.to_string()],
        ..dir.settings()
    });
    let host = LocalHost::new(Arc::clone(&manager));

    assert!(manager.init_level().has_reached(Milestone::PluginsResolved));
    assert!(manager.registry().active_plugins().is_none());

    let err = host.extension_list("api.Step").unwrap_err();
    assert!(matches!(err, ResolverError::PluginsNotReady { .. }));
    assert!(!manager.strategy().finder().is_loaded());
    assert_eq!(host.cached_types(), 0);
}

#[derive(Debug, PartialEq)]
struct Step {
    function: String,
}

impl ExtensionPoint for Step {
    const TYPE_NAME: &'static str = "api.Step";

    fn from_instance(instance: &ExtensionInstance) -> ResolverResult<Self> {
        let function = instance.property_str("function").ok_or_else(|| {
            ResolverError::extension_type_mismatch(instance.class_name(), Self::TYPE_NAME, "no function name")
        })?;
        Ok(Step { function: function.to_string() })
    }
}

#[test]
fn test_typed_lookup() {
    let dir = workflow_dir();
    let manager = dir.initialized();
    let host = LocalHost::new(Arc::clone(&manager));

    let steps = manager.strategy().find_typed::<Step>(Some(&host)).unwrap();
    let functions: Vec<&str> = steps.iter().map(|c| c.instance().function.as_str()).collect();
    assert_eq!(functions, vec!["sleep", "echo"]);
}

#[test]
fn test_typed_lookup_skips_unconvertible() {
    let dir = PluginDir::new();
    dir.plugin("api", common::API_MANIFEST);
    dir.plugin("steps", common::STEPS_MANIFEST);
    dir.index(
        "steps",
        serde_json::json!([
            {"element": {"kind": "type", "name": "steps.Echo"}, "properties": {"function": "echo"}},
            {"element": {"kind": "field", "declaring_type": "steps.Holder", "name": "SLEEP",
                         "element_type": "steps.Sleep"}}
        ]),
    );
    let manager = dir.initialized();
    let host = LocalHost::new(Arc::clone(&manager));

    let steps = manager.strategy().find_typed::<Step>(Some(&host)).unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].class_name(), "steps.Echo");
}

#[test]
fn test_grouping_by_plugin() {
    let dir = publishers_dir();
    let manager = dir.initialized();
    let host = LocalHost::new(Arc::clone(&manager));

    let mut components: Vec<_> = host.extension_list("api.Step").unwrap().iter().cloned().collect();
    components.extend(host.extension_list("api.Publisher").unwrap().iter().cloned());

    let groups = group_by_plugin(components, &manager.attribution());
    assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["publishers", "steps"]);
    assert_eq!(groups["steps"].len(), 2);
    assert!(!groups.contains_key(CORE_PLUGIN));
}
