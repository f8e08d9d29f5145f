//! Acting Identity
//!
//! Thread-local "acting as" identity and current task name. Pipeline tasks run
//! as [`Identity::System`]; the guard returned by [`act_as`] puts back whatever
//! was current before, on every exit path.

use std::cell::RefCell;
use std::fmt;

/// Identity that permission checks in the host see
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    System,
    User(String),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Anonymous => f.write_str("anonymous"),
            Identity::System => f.write_str("SYSTEM"),
            Identity::User(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ActingContext {
    identity: Identity,
    task: Option<String>,
}

thread_local! {
    static CURRENT: RefCell<ActingContext> = RefCell::new(ActingContext::default());
}

/// Restores the previous identity and task name when dropped
#[must_use = "the identity is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ActingGuard {
    previous: Option<ActingContext>,
}

impl Drop for ActingGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CURRENT.with(|current| *current.borrow_mut() = previous);
        }
    }
}

/// Act as `identity` while running the named task on this thread
pub fn act_as<S: Into<String>>(identity: Identity, task: S) -> ActingGuard {
    let next = ActingContext { identity, task: Some(task.into()) };
    let previous = CURRENT.with(|current| std::mem::replace(&mut *current.borrow_mut(), next));
    ActingGuard { previous: Some(previous) }
}

/// Identity currently in effect on this thread
pub fn current() -> Identity {
    CURRENT.with(|current| current.borrow().identity.clone())
}

/// Name of the task executing on this thread, if any
pub fn current_task() -> Option<String> {
    CURRENT.with(|current| current.borrow().task.clone())
}
