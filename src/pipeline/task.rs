//! Tasks and the Task Graph Builder
//!
//! A task is a named action with the milestones it requires before it may run
//! and the milestones it helps attain. Tasks are fatal unless marked otherwise.

use std::collections::BTreeSet;
use std::fmt;
use parking_lot::Mutex;

use crate::error::ResolverResult;
use super::milestone::Milestone;

/// Action run by a task; it may add follow-up tasks through the context
pub type TaskAction = Box<dyn FnOnce(&TaskContext) -> ResolverResult<()> + Send>;

/// A unit of initialization work
pub struct Task {
    name: String,
    requires: BTreeSet<Milestone>,
    attains: BTreeSet<Milestone>,
    fatal: bool,
    action: TaskAction,
}

impl Task {
    /// Create a fatal task with no requirements
    pub fn new<S, F>(name: S, action: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(&TaskContext) -> ResolverResult<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            requires: BTreeSet::new(),
            attains: BTreeSet::new(),
            fatal: true,
            action: Box::new(action),
        }
    }

    pub fn requires(mut self, milestone: Milestone) -> Self {
        self.requires.insert(milestone);
        self
    }

    pub fn attains(mut self, milestone: Milestone) -> Self {
        self.attains.insert(milestone);
        self
    }

    /// Failures are logged and the run continues
    pub fn not_fatal(mut self) -> Self {
        self.fatal = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> &BTreeSet<Milestone> {
        &self.requires
    }

    pub fn attained(&self) -> &BTreeSet<Milestone> {
        &self.attains
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// Whether every required milestone is in `attained`
    pub fn is_ready(&self, attained: &BTreeSet<Milestone>) -> bool {
        self.requires.is_subset(attained)
    }

    pub(crate) fn into_action(self) -> TaskAction {
        self.action
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("attains", &self.attains)
            .field("fatal", &self.fatal)
            .finish()
    }
}

/// Passed to a running task; collects the tasks it adds
#[derive(Debug, Default)]
pub struct TaskContext {
    added: Mutex<Vec<Task>>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule another task in this run
    pub fn add(&self, task: Task) {
        self.added.lock().push(task);
    }

    pub(crate) fn take_added(&self) -> Vec<Task> {
        std::mem::take(&mut *self.added.lock())
    }
}

/// Builds a task graph with chained requirements:
/// `builder.requires(a).attains(b).not_fatal().add(name, action)`.
///
/// Settings made before `add` apply to that task only.
#[derive(Debug)]
pub struct TaskGraphBuilder {
    tasks: Vec<Task>,
    requires: BTreeSet<Milestone>,
    attains: BTreeSet<Milestone>,
    fatal: bool,
}

impl Default for TaskGraphBuilder {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            requires: BTreeSet::new(),
            attains: BTreeSet::new(),
            fatal: true,
        }
    }
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requires(&mut self, milestone: Milestone) -> &mut Self {
        self.requires.insert(milestone);
        self
    }

    pub fn attains(&mut self, milestone: Milestone) -> &mut Self {
        self.attains.insert(milestone);
        self
    }

    pub fn not_fatal(&mut self) -> &mut Self {
        self.fatal = false;
        self
    }

    /// Add a task with the pending settings, then reset them
    pub fn add<S, F>(&mut self, name: S, action: F) -> &mut Self
    where
        S: Into<String>,
        F: FnOnce(&TaskContext) -> ResolverResult<()> + Send + 'static,
    {
        let mut task = Task::new(name, action);
        task.requires = std::mem::take(&mut self.requires);
        task.attains = std::mem::take(&mut self.attains);
        task.fatal = std::mem::replace(&mut self.fatal, true);
        self.tasks.push(task);
        self
    }

    /// Add a fully configured task
    pub fn add_task(&mut self, task: Task) -> &mut Self {
        self.tasks.push(task);
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(Task::name).collect()
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}
