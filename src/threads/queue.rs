use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::models::{self, DispatchError, PoolState};
use crate::threads::job::Job;

struct Inner {
    jobs: VecDeque<Job>,
    state: PoolState,
    // Jobs taken from the queue whose execution has not returned yet.
    active: usize,
}

/// Job queue and pool state of a single pool, guarded by one lock and
/// signalled through one condition variable.
pub(crate) struct Shared {
    pub(crate) id: u64,
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl Shared {
    pub(crate) fn new(id: u64) -> Self {
        Shared {
            id: id,
            inner: Mutex::new(Inner {
                jobs: VecDeque::new(),
                state: PoolState::Running,
                active: 0,
            }),
            condvar: Condvar::new(),
        }
    }

    // Jobs never run under the lock, so poisoning can only come from a bug
    // in this module; the data is still consistent and can be reused.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, job: Job) -> models::Result<()> {
        let mut inner = self.lock();
        if inner.state == PoolState::Stopped {
            return Err(DispatchError::PoolStopped);
        }
        inner.jobs.push_back(job);
        drop(inner);

        self.condvar.notify_one();
        Ok(())
    }

    /// Blocks until a job is available or the pool is stopped.
    /// Returns `None` once the pool is stopped.
    pub(crate) fn next_job(&self) -> Option<Job> {
        let inner = self.lock();
        let mut inner = self
            .condvar
            .wait_while(inner, |inner| {
                inner.state == PoolState::Running && inner.jobs.is_empty()
            })
            .unwrap_or_else(PoisonError::into_inner);

        if inner.state == PoolState::Stopped {
            return None;
        }

        let job = inner.jobs.pop_front();
        if job.is_some() {
            inner.active += 1;
        }
        drop(inner);

        // Let a pending shutdown re-check the queue.
        self.condvar.notify_all();
        job
    }

    pub(crate) fn finish_job(&self) {
        let mut inner = self.lock();
        inner.active -= 1;
        let idle = inner.active == 0 && inner.jobs.is_empty();
        drop(inner);

        if idle {
            self.condvar.notify_all();
        }
    }

    /// Waits until every queued job has been executed to completion, then
    /// switches the pool to `Stopped` and wakes all workers.
    ///
    /// Returns `true` if this call performed the transition.
    pub(crate) fn drain_and_stop(&self) -> bool {
        let inner = self.lock();
        let mut inner = self
            .condvar
            .wait_while(inner, |inner| {
                inner.state == PoolState::Running && (!inner.jobs.is_empty() || inner.active > 0)
            })
            .unwrap_or_else(PoisonError::into_inner);

        let transitioned = inner.state == PoolState::Running;
        inner.state = PoolState::Stopped;
        drop(inner);

        self.condvar.notify_all();
        transitioned
    }

    pub(crate) fn stop(&self) {
        self.lock().state = PoolState::Stopped;
        self.condvar.notify_all();
    }

    pub(crate) fn queued(&self) -> usize {
        self.lock().jobs.len()
    }

    pub(crate) fn state(&self) -> PoolState {
        self.lock().state
    }
}
