//! Initialization Pipeline
//!
//! Milestone-ordered task graph and the reactor that runs it.
//!
//! Tasks declare the milestones they require and the milestones they attain.
//! The [`Reactor`] runs ready tasks concurrently, lets tasks add follow-up
//! tasks, isolates non-fatal failures and reports milestones to observers.

pub mod identity;
pub mod init_strategy;
pub mod milestone;
pub mod observer;
pub mod reactor;
pub mod task;

pub use identity::{act_as, ActingGuard, Identity};
pub use init_strategy::{DefaultInitStrategy, InitStrategy};
pub use milestone::Milestone;
pub use observer::{ChannelObserver, InitLevel, LoggingObserver, MilestoneObserver};
pub use reactor::{Reactor, ReactorReport};
pub use task::{Task, TaskContext, TaskGraphBuilder};
