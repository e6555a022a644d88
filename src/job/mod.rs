//! Job lifecycle: scope expansion, the per-job worker-pool runner, the
//! poll-and-dispatch queue, persistence, and the per-user progress bus.

mod progress;
mod queue;
mod runner;
mod scope;
mod store;

pub use progress::{BroadcastProgressBus, CreditLedger, NoOpCreditLedger, ProgressEvent, ProgressSink};
pub use queue::{run_queue, CancellationRegistry, QueueRunnerContext, DEFAULT_QUEUE_CONCURRENCY};
pub use runner::{run_job, location_is_known, CancellationFlag, JobRunnerContext};
pub use scope::{expand_scope, Location};
pub use store::JobStore;
