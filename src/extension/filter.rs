//! Extension Filters
//!
//! Allow/deny decisions applied to found components, keyed by the requested
//! extension type. Rejected components are dropped from the result only.

use std::collections::{HashMap, HashSet};
use std::fmt;
use log::debug;

use super::finder::ExtensionComponent;
use super::index::ExtensionInstance;

/// Decides whether a found component may be returned for a requested type
pub trait ExtensionFilter: Send + Sync {
    fn allows(&self, type_name: &str, component: &ExtensionComponent<ExtensionInstance>) -> bool;
}

/// Rejects configured class names per requested type
#[derive(Debug, Clone, Default)]
pub struct DenyListFilter {
    denied: HashMap<String, HashSet<String>>,
}

impl DenyListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a `type -> class names` map
    pub fn from_map(denied: &HashMap<String, Vec<String>>) -> Self {
        Self {
            denied: denied
                .iter()
                .map(|(type_name, classes)| (type_name.clone(), classes.iter().cloned().collect()))
                .collect(),
        }
    }

    pub fn deny<T: Into<String>, C: Into<String>>(mut self, type_name: T, class_name: C) -> Self {
        self.denied.entry(type_name.into()).or_default().insert(class_name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.denied.is_empty()
    }
}

impl ExtensionFilter for DenyListFilter {
    fn allows(&self, type_name: &str, component: &ExtensionComponent<ExtensionInstance>) -> bool {
        self.denied
            .get(type_name)
            .map_or(true, |classes| !classes.contains(component.class_name()))
    }
}

type Predicate = Box<dyn Fn(&ExtensionComponent<ExtensionInstance>) -> bool + Send + Sync>;

/// Applies a predicate to components found for one requested type
pub struct PredicateFilter {
    type_name: String,
    predicate: Predicate,
}

impl PredicateFilter {
    pub fn new<S, F>(type_name: S, predicate: F) -> Self
    where
        S: Into<String>,
        F: Fn(&ExtensionComponent<ExtensionInstance>) -> bool + Send + Sync + 'static,
    {
        Self { type_name: type_name.into(), predicate: Box::new(predicate) }
    }
}

impl fmt::Debug for PredicateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateFilter").field("type_name", &self.type_name).finish()
    }
}

impl ExtensionFilter for PredicateFilter {
    fn allows(&self, type_name: &str, component: &ExtensionComponent<ExtensionInstance>) -> bool {
        type_name != self.type_name || (self.predicate)(component)
    }
}

/// Every filter must allow a component
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn ExtensionFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F: ExtensionFilter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn add<F: ExtensionFilter + 'static>(&mut self, filter: F) {
        self.filters.push(Box::new(filter));
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Drop the components any filter rejects
    pub fn apply(
        &self,
        type_name: &str,
        components: Vec<ExtensionComponent<ExtensionInstance>>,
    ) -> Vec<ExtensionComponent<ExtensionInstance>> {
        components
            .into_iter()
            .filter(|component| {
                let allowed = self.allows(type_name, component);
                if !allowed {
                    debug!("Filtered out {} for {}", component.class_name(), type_name);
                }
                allowed
            })
            .collect()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain").field("filters", &self.filters.len()).finish()
    }
}

impl ExtensionFilter for FilterChain {
    fn allows(&self, type_name: &str, component: &ExtensionComponent<ExtensionInstance>) -> bool {
        self.filters.iter().all(|filter| filter.allows(type_name, component))
    }
}
