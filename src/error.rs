//! Resolver Error Types
//!
//! Error taxonomy for archive inspection, dependency resolution, class
//! resolution, extension discovery and the initialization pipeline.

use thiserror::Error;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, ResolverError>;

/// Error types for resolver operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolverError {
    /// Two archives share a short name; the later one is skipped
    #[error("Duplicate plugin '{short_name}': {archive} ignored because {kept} is already loaded")]
    DuplicateArchive { short_name: String, archive: String, kept: String },

    /// Archive unreadable or its manifest malformed
    #[error("Failed to inspect plugin archive {archive}: {message}")]
    InspectionFailed { archive: String, message: String },

    /// Plugin is part of a dependency cycle
    #[error("Cycle detected in plugin dependencies (root={root}): {}", cycle.join(" -> "))]
    CycleDetected { root: String, cycle: Vec<String> },

    /// The cycle detector itself failed
    #[error("Cycle check failed: {message}")]
    CycleCheckFailed { message: String },

    /// No active plugin supplies the class
    #[error("Class not found: {name}{}", if *cached { " (cached miss)" } else { "" })]
    ClassNotFound { name: String, cached: bool },

    /// A loader was asked to define a class it already defined
    #[error("Duplicate class definition: {name} in plugin {plugin}")]
    DuplicateClassDefinition { name: String, plugin: String },

    /// Forced static initialization failed
    #[error("Failed to initialize class {name}: {message}")]
    ClassInitializationFailed { name: String, message: String },

    /// An annotated element could not be instantiated
    #[error("Failed to instantiate {element}: {message}")]
    InstantiationFailed { element: String, message: String },

    /// An extension instance could not be converted to the requested type
    #[error("Extension {class_name} is not usable as {type_name}: {message}")]
    ExtensionTypeMismatch { class_name: String, type_name: String, message: String },

    /// The extension index has not been loaded for a resolver-less lookup
    #[error("Extension index unavailable: {message}")]
    IndexUnavailable { message: String },

    /// An operation needing host capabilities ran without a host
    #[error("Host unavailable: {message}")]
    HostUnavailable { message: String },

    /// Class resolution attempted before the active plugin list was published
    #[error("Plugins not ready: {message}")]
    PluginsNotReady { message: String },

    /// A pipeline task failed
    #[error("Task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },

    /// No runnable task remains but some tasks never ran
    #[error("Initialization stalled: {message}")]
    ReactorStalled { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// IO error
    #[error("IO error: {message}")]
    Io { message: String },
}

impl ResolverError {
    /// Create a duplicate archive error
    pub fn duplicate_archive(short_name: &str, archive: &str, kept: &str) -> Self {
        Self::DuplicateArchive {
            short_name: short_name.to_string(),
            archive: archive.to_string(),
            kept: kept.to_string(),
        }
    }

    /// Create an inspection error
    pub fn inspection_failed<A: Into<String>, M: Into<String>>(archive: A, message: M) -> Self {
        Self::InspectionFailed { archive: archive.into(), message: message.into() }
    }

    /// Create a cycle error
    pub fn cycle_detected<S: Into<String>>(root: S, cycle: Vec<String>) -> Self {
        Self::CycleDetected { root: root.into(), cycle }
    }

    /// Create a cycle check failure
    pub fn cycle_check_failed<S: Into<String>>(message: S) -> Self {
        Self::CycleCheckFailed { message: message.into() }
    }

    /// Create a class not found error
    pub fn class_not_found<S: Into<String>>(name: S) -> Self {
        Self::ClassNotFound { name: name.into(), cached: false }
    }

    /// Create a class not found error served from the negative cache
    pub fn cached_miss<S: Into<String>>(name: S) -> Self {
        Self::ClassNotFound { name: name.into(), cached: true }
    }

    /// Create a duplicate class definition error
    pub fn duplicate_class_definition<N: Into<String>, P: Into<String>>(name: N, plugin: P) -> Self {
        Self::DuplicateClassDefinition { name: name.into(), plugin: plugin.into() }
    }

    /// Create a class initialization error
    pub fn class_initialization_failed<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Self::ClassInitializationFailed { name: name.into(), message: message.into() }
    }

    /// Create an instantiation error
    pub fn instantiation_failed<E: Into<String>, M: Into<String>>(element: E, message: M) -> Self {
        Self::InstantiationFailed { element: element.into(), message: message.into() }
    }

    /// Create an extension type mismatch error
    pub fn extension_type_mismatch<C, T, M>(class_name: C, type_name: T, message: M) -> Self
    where
        C: Into<String>,
        T: Into<String>,
        M: Into<String>,
    {
        Self::ExtensionTypeMismatch {
            class_name: class_name.into(),
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create an index unavailable error
    pub fn index_unavailable<S: Into<String>>(message: S) -> Self {
        Self::IndexUnavailable { message: message.into() }
    }

    /// Create a host unavailable error
    pub fn host_unavailable<S: Into<String>>(message: S) -> Self {
        Self::HostUnavailable { message: message.into() }
    }

    /// Create a plugins not ready error
    pub fn plugins_not_ready<S: Into<String>>(message: S) -> Self {
        Self::PluginsNotReady { message: message.into() }
    }

    /// Create a task failure
    pub fn task_failed<T: Into<String>, M: Into<String>>(task: T, message: M) -> Self {
        Self::TaskFailed { task: task.into(), message: message.into() }
    }

    /// Create a stalled reactor error
    pub fn reactor_stalled<S: Into<String>>(message: S) -> Self {
        Self::ReactorStalled { message: message.into() }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Whether this error aborts the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, ResolverError::CycleCheckFailed { .. })
    }

    /// Whether this error is isolated to a single archive or index entry
    pub fn is_per_item(&self) -> bool {
        matches!(self,
            ResolverError::DuplicateArchive { .. } |
            ResolverError::InspectionFailed { .. } |
            ResolverError::CycleDetected { .. } |
            ResolverError::ClassInitializationFailed { .. } |
            ResolverError::InstantiationFailed { .. } |
            ResolverError::ExtensionTypeMismatch { .. }
        )
    }

    /// Whether this is a class resolution miss
    pub fn is_class_not_found(&self) -> bool {
        matches!(self, ResolverError::ClassNotFound { .. })
    }
}

impl From<std::io::Error> for ResolverError {
    fn from(err: std::io::Error) -> Self {
        ResolverError::Io { message: err.to_string() }
    }
}

impl From<serde_yaml::Error> for ResolverError {
    fn from(err: serde_yaml::Error) -> Self {
        ResolverError::configuration(format!("YAML error: {}", err))
    }
}

impl From<serde_json::Error> for ResolverError {
    fn from(err: serde_json::Error) -> Self {
        ResolverError::configuration(format!("JSON error: {}", err))
    }
}
