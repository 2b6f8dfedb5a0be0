use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::models::{self, PoolState};
use crate::threads::job::{self, Invoke, Job};
use crate::threads::queue::Shared;
use crate::threads::report::{FailureReporter, LogReporter};
use crate::threads::worker::{self, Worker};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

const DEFAULT_THREAD_NAME: &str = "dispatch-worker";

/// Construction options of a [`Dispatch`].
#[derive(Clone)]
pub struct Config {
    threads: usize,
    thread_name: String,
    reporter: Arc<dyn FailureReporter>,
    #[cfg(test)]
    fail_spawn_at: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            threads: 0,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            reporter: Arc::new(LogReporter),
            #[cfg(test)]
            fail_spawn_at: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of worker threads. 0 selects the hardware concurrency.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Prefix of worker thread names, the worker index is appended.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }
}

/// Pool size for a requested count, given the hardware concurrency the
/// platform reports. Never less than one.
pub(crate) fn resolve_thread_count(requested: usize, reported: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        reported.max(1)
    }
}

/// Fixed-size pool of worker threads consuming one shared FIFO job queue.
///
/// Dropping the pool shuts it down: queued jobs are drained and every
/// worker is joined before `drop` returns.
pub struct Dispatch {
    shared: Arc<Shared>,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
    size: usize,
}

impl Dispatch {
    pub fn new() -> models::Result<Self> {
        Self::with_config(Config::default())
    }

    /// Creates a pool with `threads` workers, 0 for the hardware concurrency.
    pub fn with_threads(threads: usize) -> models::Result<Self> {
        Self::with_config(Config::default().threads(threads))
    }

    /// Creates a pool from `config`.
    ///
    /// If a worker thread cannot be spawned, the workers started so far are
    /// stopped and joined and `DispatchError::PoolCreation` is returned.
    pub fn with_config(config: Config) -> models::Result<Self> {
        let size = resolve_thread_count(config.threads, num_cpus::get());
        let shared = Arc::new(Shared::new(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed)));

        let mut threads = Vec::with_capacity(size);
        for index in 0..size {
            match spawn_worker(&config, &shared, index) {
                Ok(handle) => threads.push(handle),
                Err(err) => {
                    log::error!("Cannot spawn worker {} of {}: {}", index, size, err);
                    shared.stop();
                    join_all(shared.id, threads);
                    return Err(err.into());
                }
            }
        }

        log::debug!("Pool {} started with {} workers", shared.id, size);
        Ok(Dispatch {
            shared: shared,
            threads: Mutex::new(threads),
            size: size,
        })
    }

    pub fn submit<F>(&self, job: F) -> models::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_task(Box::new(job))
    }

    /// Binds `func` with the argument tuple `args` and queues the result.
    ///
    /// `pool.submit_with(greet, ("Hello!", "world"))` runs `greet("Hello!", "world")`
    /// on a worker.
    pub fn submit_with<F, Args>(&self, func: F, args: Args) -> models::Result<()>
    where
        F: Invoke<Args> + 'static,
        Args: Send + 'static,
    {
        self.submit_task(Box::new(job::bind(func, args)))
    }

    /// Queues an already boxed task. Fails with `DispatchError::PoolStopped`
    /// after shutdown, in which case the task is dropped unexecuted.
    pub fn submit_task(&self, job: Job) -> models::Result<()> {
        self.shared.push(job)
    }

    /// Waits until all submitted jobs have finished, including jobs submitted
    /// by other jobs meanwhile, then stops and joins every worker.
    ///
    /// Calling it again is a no-op. A concurrent second call blocks until the
    /// first one has joined every worker.
    ///
    /// # Panics
    ///
    /// When called from a job running on this pool, as the pool cannot wait
    /// for the job that is waiting on it.
    pub fn shutdown(&self) {
        assert!(
            worker::current_pool() != Some(self.shared.id),
            "a pool cannot be shut down from one of its own jobs"
        );
        // Held until every worker is joined, so concurrent callers return together.
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        drain_and_join(&self.shared, std::mem::take(&mut *threads));
    }

    pub fn thread_count(&self) -> usize {
        self.size
    }

    pub fn queued(&self) -> usize {
        self.shared.queued()
    }

    pub fn state(&self) -> PoolState {
        self.shared.state()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == PoolState::Stopped
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dispatch<id={}; threads={}; queued={}; state={}>",
            self.shared.id,
            self.size,
            self.queued(),
            self.state(),
        )
    }
}

impl Drop for Dispatch {
    fn drop(&mut self) {
        let threads = std::mem::take(self.threads.get_mut().unwrap_or_else(PoisonError::into_inner));
        if threads.is_empty() {
            return;
        }

        if worker::current_pool() == Some(self.shared.id) {
            // Dropped by one of its own jobs: this worker cannot join itself,
            // so the drain and the joins move to a separate thread.
            log::warn!("Pool {} dropped from its own worker, shutting down in background", self.shared.id);
            let shared = self.shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("dispatch-reaper-{}", shared.id))
                .spawn(move || drain_and_join(&shared, threads));
            if let Err(err) = spawned {
                log::error!("Cannot spawn reaper for pool {}: {}", self.shared.id, err);
                self.shared.stop();
            }
            return;
        }

        drain_and_join(&self.shared, threads);
    }
}

fn spawn_worker(config: &Config, shared: &Arc<Shared>, index: usize) -> io::Result<thread::JoinHandle<()>> {
    if let Some(err) = injected_spawn_failure(config, index) {
        return Err(err);
    }

    let worker = Worker::new(index, shared.clone(), config.reporter.clone());
    thread::Builder::new()
        .name(format!("{}-{}", config.thread_name, index))
        .spawn(move || worker.run())
}

#[cfg(test)]
fn injected_spawn_failure(config: &Config, index: usize) -> Option<io::Error> {
    // EAGAIN, what pthread_create returns when thread resources are exhausted.
    (config.fail_spawn_at == Some(index)).then(|| io::Error::from_raw_os_error(11))
}

#[cfg(not(test))]
fn injected_spawn_failure(_config: &Config, _index: usize) -> Option<io::Error> {
    None
}

fn drain_and_join(shared: &Shared, threads: Vec<thread::JoinHandle<()>>) {
    if shared.drain_and_stop() {
        log::debug!("Pool {} drained, stopping {} workers", shared.id, threads.len());
    }
    join_all(shared.id, threads);
}

fn join_all(pool_id: u64, mut threads: Vec<thread::JoinHandle<()>>) {
    while let Some(handle) = threads.pop() {
        if handle.join().is_err() {
            log::error!("Worker of pool {} terminated with a panic", pool_id);
        }
    }
}
