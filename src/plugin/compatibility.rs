//! Version Compatibility Checker
//!
//! Validates manifest API versions and plugin dependency version constraints.

use std::cmp::Ordering;
use std::collections::HashMap;
use log::warn;

use crate::error::{ResolverError, ResolverResult};
use super::descriptor::PluginDescriptor;

// Build-generated manifest API version
include!(concat!(env!("OUT_DIR"), "/manifest_api.rs"));

/// Manifest API version this build understands (YYYYMMDD)
pub fn api_version() -> u32 {
    BASE_API_VERSION
}

/// Checker for plugin version compatibility
#[derive(Debug, Clone)]
pub struct VersionCompatibilityChecker {
    /// Current API version
    api_version: u32,
}

impl VersionCompatibilityChecker {
    pub fn new(api_version: u32) -> Self {
        Self { api_version }
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Same major version (year) is compatible
    pub fn is_api_compatible(&self, plugin_api_version: u32) -> bool {
        Self::major_version(self.api_version) == Self::major_version(plugin_api_version)
    }

    /// Major version (year) of a YYYYMMDD API version
    pub fn major_version(api_version: u32) -> u32 {
        api_version / 10000
    }

    /// Reject a manifest built against a different API major version
    pub fn check_api_version(&self, short_name: &str, plugin_api_version: u32) -> ResolverResult<()> {
        if !self.is_api_compatible(plugin_api_version) {
            return Err(ResolverError::inspection_failed(
                short_name,
                format!(
                    "requires API version {} but current version is {}",
                    plugin_api_version, self.api_version
                ),
            ));
        }
        Ok(())
    }

    /// Check if a version satisfies a constraint (`*`, `^x.y`, `~x.y`, `>=x.y` or exact)
    pub fn version_matches(&self, requirement: &str, version: &str) -> bool {
        let requirement = requirement.trim();

        if requirement.is_empty() || requirement == "*" {
            return true;
        }

        if let Some(req) = requirement.strip_prefix(">=") {
            let (req, ver) = (parse_version(req.trim()), parse_version(version));
            return !req.is_empty() && !ver.is_empty() && compare(&ver, &req) != Ordering::Less;
        }

        if let Some(req) = requirement.strip_prefix('^') {
            return matches_prefix(req, version, 1);
        }

        if let Some(req) = requirement.strip_prefix('~') {
            return matches_prefix(req, version, 2);
        }

        let (req, ver) = (parse_version(requirement), parse_version(version));
        if req.is_empty() || ver.is_empty() {
            return requirement == version;
        }
        compare(&ver, &req) == Ordering::Equal
    }

    /// Warn about required dependencies that are missing or fail their constraint.
    ///
    /// Purely diagnostic: dangling dependencies never affect resolution. Returns
    /// the number of problems found.
    pub fn report_dependency_problems(&self, plugins: &[std::sync::Arc<PluginDescriptor>]) -> usize {
        let available: HashMap<&str, &PluginDescriptor> = plugins
            .iter()
            .map(|p| (p.short_name(), p.as_ref()))
            .collect();

        let mut problems = 0;
        for plugin in plugins {
            for dep in plugin.dependencies() {
                match available.get(dep.short_name.as_str()) {
                    Some(found) if !self.version_matches(&dep.version_constraint, found.version()) => {
                        warn!(
                            "Plugin '{}' requires {} version {} but found version {}",
                            plugin.short_name(), dep.short_name, dep.version_constraint, found.version()
                        );
                        problems += 1;
                    }
                    Some(_) => {}
                    None => {
                        warn!(
                            "Plugin '{}' requires dependency '{}' which is not available",
                            plugin.short_name(), dep.short_name
                        );
                        problems += 1;
                    }
                }
            }
        }
        problems
    }
}

impl Default for VersionCompatibilityChecker {
    fn default() -> Self {
        Self::new(api_version())
    }
}

/// Numeric components of a dotted version; non-numeric parts end the parse
fn parse_version(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map_while(|s| s.parse().ok())
        .collect()
}

/// Missing trailing components compare as zero
fn compare(v1: &[u32], v2: &[u32]) -> Ordering {
    for i in 0..v1.len().max(v2.len()) {
        let ordering = v1.get(i).copied().unwrap_or(0).cmp(&v2.get(i).copied().unwrap_or(0));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// `version >= requirement` with the first `fixed` components equal
fn matches_prefix(requirement: &str, version: &str, fixed: usize) -> bool {
    let req = parse_version(requirement);
    let ver = parse_version(version);

    if req.len() < fixed || ver.len() < fixed {
        return false;
    }
    if req[..fixed] != ver[..fixed] {
        return false;
    }
    compare(&ver, &req) != Ordering::Less
}
