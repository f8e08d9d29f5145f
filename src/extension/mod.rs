//! Extension Discovery
//!
//! Index-driven discovery of extension components: the precomputed annotation
//! index, the finder that scouts and instantiates entries, allow/deny filters
//! and the strategy facade that callers use.

pub mod filter;
pub mod finder;
pub mod index;
pub mod strategy;

pub use filter::{DenyListFilter, ExtensionFilter, FilterChain, PredicateFilter};
pub use finder::{AnnotationIndexExtensionFinder, ExtensionComponent};
pub use index::{AnnotatedElement, ExtensionIndex, ExtensionIndexEntry, ExtensionInstance, EXTENSION_INDEX_RESOURCE};
pub use strategy::{group_by_plugin, ExtensionPoint, ExtensionStrategy, CORE_PLUGIN};
