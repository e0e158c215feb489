pub mod dispatcher;
pub mod janitor;
pub mod pool;
pub mod scheduler;

pub use dispatcher::{CaseDirectory, DbCaseDirectory, DispatchPolicy, DispatchReport, Dispatcher};
pub use janitor::{Janitor, JanitorReport};
pub use pool::{DispatchedJob, JobReport, JobSubmitter, WorkerPool};
pub use scheduler::PeriodicTask;
