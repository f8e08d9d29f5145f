//! Initialization Milestones

use std::fmt;
use serde::Serialize;

/// Ordered points in plugin initialization that tasks require or attain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Started,
    PluginsListed,
    PluginsInspected,
    PluginsResolved,
    Completed,
}

impl Milestone {
    /// Every milestone, in order
    pub const ALL: [Milestone; 5] = [
        Milestone::Started,
        Milestone::PluginsListed,
        Milestone::PluginsInspected,
        Milestone::PluginsResolved,
        Milestone::Completed,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Milestone::Started => "Started initialization",
            Milestone::PluginsListed => "Listed all plugins",
            Milestone::PluginsInspected => "Inspected all plugins",
            Milestone::PluginsResolved => "Resolved plugin dependencies",
            Milestone::Completed => "Completed initialization",
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
