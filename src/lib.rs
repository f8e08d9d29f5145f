//! Plugin Resolver
//!
//! Loads a directory of plugin archives, orders them by dependency while
//! quarantining cycles, resolves classes across the active plugins with
//! per-class plugin attribution and discovers extensions from a precomputed
//! annotation index.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod extension;
pub mod graph;
pub mod host;
pub mod loader;
pub mod logging;
pub mod manager;
pub mod pipeline;
pub mod plugin;

pub use error::{ResolverError, ResolverResult};
pub use host::{Host, LocalHost};
pub use manager::PluginManager;
