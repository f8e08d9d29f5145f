//! Extension Index
//!
//! Precomputed index of annotated elements. Each plugin archive may ship the
//! JSON resource [`EXTENSION_INDEX_RESOURCE`], a list of [`ExtensionIndexEntry`]
//! produced by an offline indexing step. The finder only ever consumes this
//! index; nothing is discovered by scanning class contents.

use std::fmt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::loader::{ClassRef, ResourceUrl};

/// Resource name of the per-plugin extension index
pub const EXTENSION_INDEX_RESOURCE: &str = "META-INF/annotations/extensions.json";

/// The element that carries the extension annotation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnotatedElement {
    /// An annotated class; instances are constructed from it
    Type { name: String },

    /// An annotated static field holding the instance
    Field {
        declaring_type: String,
        name: String,
        element_type: String,
    },

    /// An annotated static factory method returning the instance
    Method {
        declaring_type: String,
        name: String,
        return_type: String,
    },
}

impl AnnotatedElement {
    /// Type whose static initialization the element depends on
    pub fn declaring_type(&self) -> &str {
        match self {
            AnnotatedElement::Type { name } => name,
            AnnotatedElement::Field { declaring_type, .. } => declaring_type,
            AnnotatedElement::Method { declaring_type, .. } => declaring_type,
        }
    }

    /// Declared type of the value the element yields
    pub fn element_type(&self) -> &str {
        match self {
            AnnotatedElement::Type { name } => name,
            AnnotatedElement::Field { element_type, .. } => element_type,
            AnnotatedElement::Method { return_type, .. } => return_type,
        }
    }
}

impl fmt::Display for AnnotatedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotatedElement::Type { name } => write!(f, "{}", name),
            AnnotatedElement::Field { declaring_type, name, .. } => {
                write!(f, "{}.{}", declaring_type, name)
            }
            AnnotatedElement::Method { declaring_type, name, .. } => {
                write!(f, "{}.{}()", declaring_type, name)
            }
        }
    }
}

/// One annotated element in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionIndexEntry {
    pub element: AnnotatedElement,

    /// Failures for optional entries are expected and logged quietly
    #[serde(default)]
    pub optional: bool,

    /// Ordering hint carried through to the component
    #[serde(default)]
    pub ordinal: f64,

    /// Annotation/instance attributes recorded by the indexer
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl ExtensionIndexEntry {
    /// Entry for an annotated class
    pub fn for_type<S: Into<String>>(name: S) -> Self {
        Self {
            element: AnnotatedElement::Type { name: name.into() },
            optional: false,
            ordinal: 0.0,
            properties: Map::new(),
        }
    }

    /// Entry for an annotated static field
    pub fn for_field<D, N, T>(declaring_type: D, name: N, element_type: T) -> Self
    where
        D: Into<String>,
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            element: AnnotatedElement::Field {
                declaring_type: declaring_type.into(),
                name: name.into(),
                element_type: element_type.into(),
            },
            optional: false,
            ordinal: 0.0,
            properties: Map::new(),
        }
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_ordinal(mut self, ordinal: f64) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn with_property<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// A live instance produced from an index entry
#[derive(Debug, Clone)]
pub struct ExtensionInstance {
    class: ClassRef,
    element: AnnotatedElement,
    properties: Map<String, Value>,
}

impl ExtensionInstance {
    pub fn new(class: ClassRef, element: AnnotatedElement, properties: Map<String, Value>) -> Self {
        Self { class, element, properties }
    }

    /// Runtime class of the instance
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn element(&self) -> &AnnotatedElement {
        &self.element
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn property_bool(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(Value::as_bool)
    }
}

/// The loaded, immutable index
#[derive(Debug, Clone, Default)]
pub struct ExtensionIndex {
    entries: Vec<ExtensionIndexEntry>,
}

impl ExtensionIndex {
    pub fn from_entries(entries: Vec<ExtensionIndexEntry>) -> Self {
        Self { entries }
    }

    /// Read and concatenate index resources; unreadable or malformed files are skipped
    pub fn load(resources: &[ResourceUrl]) -> Self {
        let mut entries = Vec::new();

        for resource in resources {
            let parsed = resource
                .read_to_string()
                .and_then(|content| {
                    serde_json::from_str::<Vec<ExtensionIndexEntry>>(&content).map_err(Into::into)
                });

            match parsed {
                Ok(mut items) => {
                    debug!("Loaded {} index entries from {}", items.len(), resource);
                    entries.append(&mut items);
                }
                Err(e) => warn!("Skipping extension index {}: {}", resource, e),
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[ExtensionIndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
