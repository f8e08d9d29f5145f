//! Application orchestration module

pub mod execution;
pub mod initialization;

pub use execution::{run_resolver, ExtensionSummary, FailureEntry, ResolutionReport};
pub use initialization::{configure_logging, load_configuration, resolver_settings};
