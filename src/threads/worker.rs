use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crate::models::JobFailure;
use crate::threads::job::Task;
use crate::threads::queue::Shared;
use crate::threads::report::{self, FailureReporter};

thread_local! {
    static CURRENT_POOL: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Id of the pool the calling thread works for, if it is a pool worker.
pub(crate) fn current_pool() -> Option<u64> {
    CURRENT_POOL.with(|pool| pool.get())
}

/// Releases the active slot of a job once its execution is over.
struct Executing<'a>(&'a Shared);

impl Drop for Executing<'_> {
    fn drop(&mut self) {
        self.0.finish_job();
    }
}

pub(crate) struct Worker {
    index: usize,
    shared: Arc<Shared>,
    reporter: Arc<dyn FailureReporter>,
}

impl Worker {
    pub(crate) fn new(index: usize, shared: Arc<Shared>, reporter: Arc<dyn FailureReporter>) -> Self {
        Worker {
            index: index,
            shared: shared,
            reporter: reporter,
        }
    }

    /// Waits for jobs and executes them until the pool is stopped.
    pub(crate) fn run(self) {
        CURRENT_POOL.with(|pool| pool.set(Some(self.shared.id)));
        log::debug!("Worker {} of pool {} started", self.index, self.shared.id);

        while let Some(job) = self.shared.next_job() {
            let _executing = Executing(&self.shared);
            log::trace!("Worker {} executes a job", self.index);

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job.execute())) {
                let failure = JobFailure {
                    worker: self.index,
                    thread_name: thread::current().name().unwrap_or("<unnamed>").to_string(),
                    message: report::panic_message(payload.as_ref()),
                };
                if panic::catch_unwind(AssertUnwindSafe(|| self.reporter.report(&failure))).is_err() {
                    log::error!("Failure reporter panicked while reporting {}", failure);
                }
            }
        }

        log::debug!("Worker {} of pool {} stopped", self.index, self.shared.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn exploding_job() {
        panic!("job exploded")
    }

    #[derive(Default)]
    struct Recorder {
        failures: Mutex<Vec<JobFailure>>,
    }

    impl FailureReporter for Recorder {
        fn report(&self, failure: &JobFailure) {
            self.failures.lock().unwrap().push(failure.clone());
        }
    }

    // A worker on a pre-stopped queue still executes nothing and returns.
    #[test]
    fn worker_exits_when_stopped() {
        let shared = Arc::new(Shared::new(7));
        shared.stop();
        let worker = Worker::new(0, shared, Arc::new(Recorder::default()));

        thread::spawn(move || worker.run()).join().unwrap();
    }

    #[test]
    fn worker_reports_panic_and_continues() {
        let shared = Arc::new(Shared::new(7));
        let recorder = Arc::new(Recorder::default());
        let counter = Arc::new(AtomicUsize::new(0));

        shared.push(Box::new(exploding_job)).unwrap();
        let counter_ref = counter.clone();
        shared.push(Box::new(move || { counter_ref.fetch_add(1, Ordering::SeqCst); })).unwrap();

        let worker = Worker::new(3, shared.clone(), recorder.clone());
        let handle = thread::Builder::new()
            .name("test-worker".to_string())
            .spawn(move || worker.run())
            .unwrap();

        shared.drain_and_stop();
        handle.join().unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let failures = recorder.failures.lock().unwrap();
        assert_eq!(
            *failures,
            vec![JobFailure {
                worker: 3,
                thread_name: "test-worker".to_string(),
                message: "job exploded".to_string(),
            }]
        );
    }

    struct PanickingReporter;

    impl FailureReporter for PanickingReporter {
        fn report(&self, _failure: &JobFailure) {
            panic!("reporter exploded")
        }
    }

    // A reporter that panics must not take the worker down with it.
    #[test]
    fn worker_survives_panicking_reporter() {
        let shared = Arc::new(Shared::new(7));
        let counter = Arc::new(AtomicUsize::new(0));

        shared.push(Box::new(exploding_job)).unwrap();
        let counter_ref = counter.clone();
        shared.push(Box::new(move || { counter_ref.fetch_add(1, Ordering::SeqCst); })).unwrap();

        let worker = Worker::new(0, shared.clone(), Arc::new(PanickingReporter));
        let handle = thread::spawn(move || worker.run());

        let (done_sender, done) = crossbeam::channel::bounded::<()>(1);
        let drainer = {
            let shared = shared.clone();
            thread::spawn(move || {
                shared.drain_and_stop();
                done_sender.send(()).unwrap();
            })
        };
        done.recv_timeout(std::time::Duration::from_secs(3)).expect("drain did not finish");
        drainer.join().unwrap();

        // The worker thread itself returned normally.
        handle.join().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn worker_marks_its_thread() {
        let shared = Arc::new(Shared::new(42));
        let seen = Arc::new(Mutex::new(None));
        let seen_ref = seen.clone();
        shared.push(Box::new(move || *seen_ref.lock().unwrap() = current_pool())).unwrap();

        let worker = Worker::new(0, shared.clone(), Arc::new(Recorder::default()));
        let handle = thread::spawn(move || worker.run());
        shared.drain_and_stop();
        handle.join().unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(42));
        assert_eq!(current_pool(), None);
    }
}
