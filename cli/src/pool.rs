//! A batch-dispatching, unordered-result worker pool over region
//! filenames. The API contract (batch size 10, completion-order
//! delivery, panics captured and delivered as data) mirrors
//! `multiprocess.pool.Pool.imap_unordered`; the implementation uses
//! `rayon`'s scoped thread pool and a `crossbeam-channel` so the caller
//! sees a plain, lazily-driven iterator.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crossbeam_channel::{bounded, Receiver};
use log::warn;
use mcatrim_anvil::manager::RegionManager;

const BATCH_SIZE: usize = 10;

/// The Rust analogue of `commands.py::CommandError`: an error tied to the
/// region name it happened in, with no Python-style traceback but the
/// panic message or propagated error's `Display` instead.
#[derive(Debug, Clone)]
pub struct CommandError {
    pub region_name: String,
    pub message: String,
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.region_name, self.message)
    }
}

impl std::error::Error for CommandError {}

pub type PoolResult<T> = Result<T, CommandError>;

/// A unit of work dispatched per region name. Implementors run
/// synchronously inside one worker and must not share mutable state
/// across regions.
pub trait RegionCommand<T>: Send + Sync {
    fn run(&self, manager: &RegionManager, name: &str) -> PoolResult<T>;
}

/// Map `command` across `names` using a pool of `threads` workers (`None`
/// or `Some(1)` means a single worker), dispatching in batches of
/// [`BATCH_SIZE`] and returning results as they complete, in whatever
/// order that happens to be.
///
/// A supervisor thread owns the `rayon::ThreadPool` and runs the scope;
/// dropping the returned iterator early simply stops the caller reading
/// further results; the in-flight scope still runs to completion in the
/// background; rayon's scoped threads cannot be killed from outside any
/// more than a native OS thread can, which is the faithful analogue of
/// "shuts down cleanly on scope exit".
pub fn process_world<T, C>(
    manager: &RegionManager,
    threads: Option<usize>,
    names: Vec<String>,
    command: C,
) -> impl Iterator<Item = PoolResult<T>>
where
    T: Send + 'static,
    C: RegionCommand<T> + 'static,
{
    let (sender, receiver): (_, Receiver<PoolResult<T>>) = bounded(BATCH_SIZE * 2);
    let manager = manager.clone();
    let worker_count = threads.unwrap_or_else(|| num_cpus::get().saturating_sub(1).max(1));

    std::thread::spawn(move || {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .expect("failed to build worker pool");

        pool.scope(|scope| {
            for batch in names.chunks(BATCH_SIZE) {
                for name in batch {
                    let name = name.clone();
                    let sender = sender.clone();
                    let manager = &manager;
                    let command = &command;
                    scope.spawn(move |_| {
                        let result = run_one(manager, &name, command);
                        // The receiver may already be gone if the consumer
                        // stopped draining; a failed send is not an error.
                        let _ = sender.send(result);
                    });
                }
            }
        });
    });

    receiver.into_iter()
}

fn run_one<T, C: RegionCommand<T>>(manager: &RegionManager, name: &str, command: &C) -> PoolResult<T> {
    let outcome = catch_unwind(AssertUnwindSafe(|| command.run(manager, name)));
    match outcome {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(&panic);
            warn!("region '{name}' panicked: {message}");
            Err(CommandError {
                region_name: name.to_string(),
                message,
            })
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
