use std::fmt;

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A worker thread could not be spawned while building the pool.
    #[error("cannot create thread pool: {message}")]
    PoolCreation { code: Option<i32>, message: String },
    /// A job was submitted after the pool had been shut down.
    #[error("cannot submit job: thread pool is stopped")]
    PoolStopped,
}

impl From<std::io::Error> for DispatchError {
    fn from(err: std::io::Error) -> Self {
        DispatchError::PoolCreation {
            code: err.raw_os_error(),
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolState {
    Running,
    Stopped,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", match &self {
            PoolState::Running => "running",
            PoolState::Stopped => "stopped",
        })
    }
}

/// Description of a job that panicked inside a worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobFailure {
    pub worker: usize,
    pub thread_name: String,
    pub message: String,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<worker={}; thread={}; message={}>",
            self.worker,
            self.thread_name,
            self.message,
        )
    }
}
