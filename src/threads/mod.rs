pub use dispatch::{Config, Dispatch};
pub use job::{Bound, Invoke, Job, Task, bind};
pub use report::{FailureReporter, LogReporter};

pub mod dispatch;
pub mod job;
pub mod report;
mod queue;
mod worker;
