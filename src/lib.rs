pub use models::{DispatchError, JobFailure, PoolState, Result};
pub use threads::{Bound, Config, Dispatch, FailureReporter, Invoke, Job, LogReporter, Task, bind};

pub mod models;
pub mod threads;
