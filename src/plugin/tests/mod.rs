//! Plugin System Tests
//!
//! Mock loaders shared by unit tests across the crate, plus cross-module
//! tests of inspection and resolution.
