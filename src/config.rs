//! Walk configuration and shared CLI plumbing
//!
//! [`WalkOptions`] is the library-facing configuration for one traversal.
//! The binaries layer their own clap parsers on top and share the
//! helpers here for job-count defaulting and log setup.

use std::thread;
use tracing_subscriber::EnvFilter;

/// Configuration for one traversal
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Worker threads for the traversal pool
    pub threads: usize,

    /// Worker stack size in bytes (`None` = platform default)
    pub stack_size: Option<usize>,

    /// Task queue ceiling (`None` = unbounded). With a bound, tasks that
    /// do not fit run inline on the worker that produced them.
    pub queue_limit: Option<usize>,

    /// Dispatch each non-directory as its own pool task instead of
    /// visiting it inside the parent directory's task. Worth it when the
    /// per-file callback does real work (copying, deleting); overhead
    /// when it only reads metadata.
    pub file_tasks: bool,

    /// Sort directory entries by name before scheduling. Guarantees
    /// `exit_dir` sees entries in name order and biases scheduling toward
    /// finishing deep paths first; does not impose a traversal order.
    pub sort: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            threads: default_jobs(),
            stack_size: None,
            queue_limit: None,
            file_tasks: false,
            sort: false,
        }
    }
}

impl WalkOptions {
    /// Options as the utilities configure them: `jobs` workers, sorted
    /// entries.
    pub fn with_jobs(jobs: usize) -> Self {
        Self {
            threads: jobs,
            sort: true,
            ..Self::default()
        }
    }
}

/// Default worker count: one per available core, four when unknown.
pub fn default_jobs() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Install the tracing subscriber for a binary. `RUST_LOG` wins when set;
/// otherwise `-v` occurrences pick the level.
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
