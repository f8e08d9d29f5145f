//! Milestone Observers
//!
//! Diagnostic hooks notified as each milestone is attained.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::info;
use parking_lot::RwLock;

use super::milestone::Milestone;

/// Notified once per milestone, in milestone order
pub trait MilestoneObserver: Send + Sync {
    fn on_attained(&self, milestone: Milestone);
}

/// Logs every milestone at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl MilestoneObserver for LoggingObserver {
    fn on_attained(&self, milestone: Milestone) {
        info!("Milestone attained: {}", milestone);
    }
}

/// Forwards milestones over a crossbeam channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: Sender<Milestone>,
}

impl ChannelObserver {
    /// Observer plus the receiving end of its channel
    pub fn new() -> (Self, Receiver<Milestone>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl MilestoneObserver for ChannelObserver {
    fn on_attained(&self, milestone: Milestone) {
        // A dropped receiver only means nobody is listening
        let _ = self.sender.send(milestone);
    }
}

/// Tracks the highest milestone attained so far
#[derive(Debug)]
pub struct InitLevel {
    level: RwLock<Option<Milestone>>,
}

impl InitLevel {
    pub fn new() -> Self {
        Self { level: RwLock::new(None) }
    }

    /// Highest attained milestone, `None` before the run starts
    pub fn get(&self) -> Option<Milestone> {
        *self.level.read()
    }

    pub fn has_reached(&self, milestone: Milestone) -> bool {
        self.get().map_or(false, |level| level >= milestone)
    }
}

impl Default for InitLevel {
    fn default() -> Self {
        Self::new()
    }
}

impl MilestoneObserver for InitLevel {
    fn on_attained(&self, milestone: Milestone) {
        let mut level = self.level.write();
        if level.map_or(true, |current| milestone > current) {
            *level = Some(milestone);
        }
    }
}
