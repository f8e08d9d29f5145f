//! Task Reactor
//!
//! Runs a task graph in waves. Each wave executes every task whose required
//! milestones are attained, concurrently on a rayon pool. Between waves the
//! reactor collects tasks added by the finished ones and advances milestones:
//! a milestone is attained once all earlier milestones are and no unfinished
//! task attains it.

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{ResolverError, ResolverResult};
use super::identity::{self, Identity};
use super::init_strategy::InitStrategy;
use super::milestone::Milestone;
use super::observer::MilestoneObserver;
use super::task::{Task, TaskContext, TaskGraphBuilder};

/// Summary of a reactor run
#[derive(Debug, Default)]
pub struct ReactorReport {
    /// Tasks executed, failed or not
    pub executed: usize,

    /// Tasks vetoed by the init strategy
    pub skipped: Vec<String>,

    /// Non-fatal task failures
    pub failures: Vec<(String, ResolverError)>,

    /// Milestones in the order they were attained
    pub attained: Vec<Milestone>,
}

struct TaskOutcome {
    name: String,
    fatal: bool,
    result: ResolverResult<()>,
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

/// Executes task graphs on a fixed worker pool
pub struct Reactor {
    pool: ThreadPool,
}

impl Reactor {
    /// Create a reactor with `worker_threads` workers
    pub fn new(worker_threads: usize) -> ResolverResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads.max(1))
            .thread_name(|i| format!("init-worker-{}", i))
            .build()
            .map_err(|e| ResolverError::configuration(format!("Failed to build worker pool: {}", e)))?;
        Ok(Self { pool })
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run every task in `builder`, including tasks they add.
    ///
    /// Non-fatal failures (panics included) are logged and recorded; the first
    /// fatal failure ends the run with `TaskFailed` once its wave finishes.
    pub fn run(
        &self,
        builder: TaskGraphBuilder,
        strategy: &dyn InitStrategy,
        observers: &[&dyn MilestoneObserver],
    ) -> ResolverResult<ReactorReport> {
        let mut pending = builder.into_tasks();
        let mut attained = BTreeSet::new();
        let mut report = ReactorReport::default();

        info!("Running {} initialization tasks on {} workers", pending.len(), self.worker_threads());
        Self::advance(&pending, &mut attained, observers, &mut report);

        while !pending.is_empty() {
            let (ready, waiting): (Vec<Task>, Vec<Task>) =
                pending.into_iter().partition(|task| task.is_ready(&attained));
            pending = waiting;

            if ready.is_empty() {
                let stuck: Vec<String> = pending
                    .iter()
                    .map(|t| format!("{} (requires {:?})", t.name(), t.required()))
                    .collect();
                error!("Initialization stalled with {} tasks pending", stuck.len());
                return Err(ResolverError::reactor_stalled(stuck.join(", ")));
            }

            let (skipped, runnable): (Vec<Task>, Vec<Task>) =
                ready.into_iter().partition(|task| strategy.skip_init_task(task));
            report.skipped.extend(skipped.iter().map(|t| t.name().to_string()));

            let context = TaskContext::new();
            let outcomes: Vec<TaskOutcome> = self.pool.install(|| {
                runnable
                    .into_par_iter()
                    .map(|task| Self::execute(task, &context))
                    .collect()
            });
            pending.extend(context.take_added());

            let mut fatal = None;
            for outcome in outcomes {
                report.executed += 1;
                if let Err(e) = outcome.result {
                    if outcome.fatal {
                        error!("Fatal failure in task '{}': {}", outcome.name, e);
                        fatal.get_or_insert(ResolverError::task_failed(outcome.name, e.to_string()));
                    } else {
                        warn!("Task '{}' failed: {}", outcome.name, e);
                        report.failures.push((outcome.name, e));
                    }
                }
            }

            if let Some(e) = fatal {
                return Err(e);
            }

            Self::advance(&pending, &mut attained, observers, &mut report);
        }

        Ok(report)
    }

    fn execute(task: Task, context: &TaskContext) -> TaskOutcome {
        let name = task.name().to_string();
        let fatal = task.is_fatal();
        let action = task.into_action();

        let _acting = identity::act_as(Identity::System, name.clone());
        debug!("Started {}", name);

        let result = match panic::catch_unwind(AssertUnwindSafe(|| action(context))) {
            Ok(result) => result,
            Err(payload) => Err(ResolverError::task_failed(name.clone(), panic_message(payload))),
        };

        debug!("Completed {}", name);
        TaskOutcome { name, fatal, result }
    }

    fn advance(
        pending: &[Task],
        attained: &mut BTreeSet<Milestone>,
        observers: &[&dyn MilestoneObserver],
        report: &mut ReactorReport,
    ) {
        for milestone in Milestone::ALL {
            if attained.contains(&milestone) {
                continue;
            }
            if pending.iter().any(|task| task.attained().contains(&milestone)) {
                break;
            }

            attained.insert(milestone);
            report.attained.push(milestone);
            for observer in observers {
                observer.on_attained(milestone);
            }
        }
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor").field("worker_threads", &self.worker_threads()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use parking_lot::Mutex;
    use crate::pipeline::init_strategy::DefaultInitStrategy;
    use crate::pipeline::observer::ChannelObserver;

    fn run(builder: TaskGraphBuilder) -> ResolverResult<ReactorReport> {
        Reactor::new(4).unwrap().run(builder, &DefaultInitStrategy::new(), &[])
    }

    #[test]
    fn test_milestones_gate_tasks() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut builder = TaskGraphBuilder::new();

        let log = Arc::clone(&order);
        builder.requires(Milestone::PluginsListed).add("second", move |_| {
            log.lock().push("second");
            Ok(())
        });
        let log = Arc::clone(&order);
        builder.attains(Milestone::PluginsListed).add("first", move |_| {
            log.lock().push("first");
            Ok(())
        });

        let (observer, receiver) = ChannelObserver::new();
        let report = Reactor::new(2)
            .unwrap()
            .run(builder, &DefaultInitStrategy::new(), &[&observer])
            .unwrap();

        assert_eq!(*order.lock(), vec!["first", "second"]);
        assert_eq!(report.executed, 2);
        assert_eq!(receiver.try_iter().collect::<Vec<_>>(), Milestone::ALL.to_vec());
        assert_eq!(report.attained, Milestone::ALL.to_vec());
    }

    #[test]
    fn test_added_tasks_hold_back_milestones() {
        let inspected = Arc::new(AtomicUsize::new(0));
        let seen_at_resolve = Arc::new(AtomicUsize::new(usize::MAX));
        let mut builder = TaskGraphBuilder::new();

        let counter = Arc::clone(&inspected);
        builder.attains(Milestone::PluginsInspected).add("prepare", move |ctx| {
            for i in 0..10 {
                let counter = Arc::clone(&counter);
                ctx.add(
                    Task::new(format!("inspect {}", i), move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .attains(Milestone::PluginsInspected)
                    .not_fatal(),
                );
            }
            Ok(())
        });

        let (counter, seen) = (Arc::clone(&inspected), Arc::clone(&seen_at_resolve));
        builder.requires(Milestone::PluginsInspected).add("resolve", move |_| {
            seen.store(counter.load(Ordering::SeqCst), Ordering::SeqCst);
            Ok(())
        });

        let report = run(builder).unwrap();
        assert_eq!(report.executed, 12);
        assert_eq!(seen_at_resolve.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_non_fatal_failures_are_isolated() {
        let mut builder = TaskGraphBuilder::new();
        builder.not_fatal().add("fails", |_| Err(ResolverError::inspection_failed("bad", "broken")));
        builder.not_fatal().add("panics", |_| panic!("kaboom"));
        builder.add("succeeds", |_| Ok(()));

        let report = run(builder).unwrap();
        assert_eq!(report.executed, 3);
        assert_eq!(report.failures.len(), 2);

        let panicked = report.failures.iter().find(|(name, _)| name == "panics").unwrap();
        assert!(panicked.1.to_string().contains("kaboom"));
    }

    #[test]
    fn test_fatal_failure_aborts() {
        let ran_later = Arc::new(AtomicUsize::new(0));
        let mut builder = TaskGraphBuilder::new();
        builder
            .attains(Milestone::PluginsResolved)
            .add("check", |_| Err(ResolverError::cycle_check_failed("detector broke")));

        let flag = Arc::clone(&ran_later);
        builder.requires(Milestone::PluginsResolved).add("after", move |_| {
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let err = run(builder).unwrap_err();
        assert!(matches!(err, ResolverError::TaskFailed { ref task, .. } if task == "check"));
        assert!(err.to_string().contains("detector broke"));
        assert_eq!(ran_later.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stall_is_reported() {
        let mut builder = TaskGraphBuilder::new();
        builder
            .requires(Milestone::PluginsResolved)
            .attains(Milestone::PluginsListed)
            .add("chicken-and-egg", |_| Ok(()));

        assert!(matches!(run(builder), Err(ResolverError::ReactorStalled { .. })));
    }

    #[test]
    fn test_skipped_tasks_count_as_done() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut builder = TaskGraphBuilder::new();

        let flag = Arc::clone(&ran);
        builder.attains(Milestone::PluginsListed).add("Optional step", move |_| {
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        builder.requires(Milestone::PluginsListed).add("Needed step", |_| Ok(()));

        let strategy = DefaultInitStrategy::new().with_skip_prefixes(vec!["Optional".into()]);
        let report = Reactor::new(1).unwrap().run(builder, &strategy, &[]).unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(report.skipped, vec!["Optional step"]);
        assert_eq!(report.executed, 1);
    }

    #[test]
    fn test_tasks_run_as_system() {
        let seen = Arc::new(Mutex::new(None));
        let mut builder = TaskGraphBuilder::new();
        let slot = Arc::clone(&seen);
        builder.add("whoami", move |_| {
            *slot.lock() = Some((identity::current(), identity::current_task()));
            Ok(())
        });

        run(builder).unwrap();
        assert_eq!(
            seen.lock().clone(),
            Some((Identity::System, Some("whoami".to_string())))
        );
    }
}
