//! Class Loading
//!
//! Plugin-local loaders and the delegating loader that sees every active plugin.
//!
//! A "class" here is a named type definition contributed by a plugin archive:
//! its name, the supertypes it can be assigned to and a few behavioural flags.
//! Each plugin owns one [`PluginLoader`]; the [`DelegatingClassLoader`] resolves
//! names across all active plugins and remembers which plugin supplied each class.

pub mod archive_loader;
pub mod delegating;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::{Deserialize, Serialize};

use crate::error::{ResolverError, ResolverResult};
use crate::extension::index::{ExtensionIndexEntry, ExtensionInstance};

pub use archive_loader::ArchiveClassLoader;
pub use delegating::{ClassResolver, DelegatingClassLoader};

/// Shared handle to a defined class. Identity is pointer identity.
pub type ClassRef = Arc<ClassDef>;

/// Class declaration as written in a plugin manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    /// Fully qualified class name
    pub name: String,

    /// Names of types this class is assignable to (direct supertypes only)
    #[serde(default)]
    pub supertypes: Vec<String>,

    /// Static initialization of this class fails
    #[serde(default)]
    pub initializer_fails: bool,

    /// Whether instances can be constructed (false for abstract types)
    #[serde(default = "default_constructible")]
    pub constructible: bool,
}

fn default_constructible() -> bool {
    true
}

impl ClassSpec {
    /// Create a constructible class with the given supertypes
    pub fn new<S: Into<String>>(name: S, supertypes: &[&str]) -> Self {
        Self {
            name: name.into(),
            supertypes: supertypes.iter().map(|s| s.to_string()).collect(),
            initializer_fails: false,
            constructible: true,
        }
    }

    /// Mark static initialization as failing
    pub fn with_failing_initializer(mut self) -> Self {
        self.initializer_fails = true;
        self
    }

    /// Mark the class as not constructible
    pub fn abstract_type(mut self) -> Self {
        self.constructible = false;
        self
    }
}

/// A class defined by a plugin loader
#[derive(Debug)]
pub struct ClassDef {
    spec: ClassSpec,
    plugin: String,
}

impl ClassDef {
    /// Define a class from its spec on behalf of a plugin
    pub fn new<S: Into<String>>(spec: ClassSpec, plugin: S) -> Self {
        Self { spec, plugin: plugin.into() }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn supertypes(&self) -> &[String] {
        &self.spec.supertypes
    }

    /// Short name of the plugin whose loader defined this class
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn initializer_fails(&self) -> bool {
        self.spec.initializer_fails
    }

    pub fn is_constructible(&self) -> bool {
        self.spec.constructible
    }
}

impl fmt::Display for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec.name)
    }
}

/// Location of a resource inside a plugin archive
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceUrl {
    plugin: String,
    path: PathBuf,
}

impl ResourceUrl {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(plugin: S, path: P) -> Self {
        Self { plugin: plugin.into(), path: path.into() }
    }

    /// Plugin that contains the resource
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the resource as UTF-8 text
    pub fn read_to_string(&self) -> ResolverResult<String> {
        std::fs::read_to_string(&self.path).map_err(|e| ResolverError::Io {
            message: format!("Failed to read resource {}: {}", self, e),
        })
    }
}

impl fmt::Display for ResourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.plugin, self.path.display())
    }
}

/// The loader owned by a single plugin
///
/// `define_class` must fail with `DuplicateClassDefinition` when asked to define
/// a name it already defined; callers that cannot rule that out should check
/// `find_loaded_class` first.
pub trait PluginLoader: Send + Sync + fmt::Debug {
    /// Short name of the owning plugin
    fn plugin(&self) -> &str;

    /// Return the class if this loader already defined it, without defining it
    fn find_loaded_class(&self, name: &str) -> Option<ClassRef>;

    /// Define a class from this plugin's own contents
    fn define_class(&self, name: &str) -> ResolverResult<ClassRef>;

    /// Find an already defined class or define it
    fn load_class(&self, name: &str) -> ResolverResult<ClassRef> {
        match self.find_loaded_class(name) {
            Some(class) => Ok(class),
            None => self.define_class(name),
        }
    }

    /// First resource with the given name
    fn find_resource(&self, name: &str) -> Option<ResourceUrl> {
        self.find_resources(name).into_iter().next()
    }

    /// All resources with the given name
    fn find_resources(&self, name: &str) -> Vec<ResourceUrl>;

    /// Run static initialization of a class defined by this loader
    fn initialize_class(&self, class: &ClassRef) -> ResolverResult<()>;

    /// Produce a live instance for an index entry whose declaring type this loader defined
    fn instantiate(
        &self,
        entry: &ExtensionIndexEntry,
        declaring: &ClassRef,
        element_type: &ClassRef,
    ) -> ResolverResult<ExtensionInstance>;
}
