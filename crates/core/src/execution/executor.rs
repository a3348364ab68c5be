/// A unit of work scheduled onto an execution context.
pub type Job = Box<dyn FnOnce() + Send>;

/// An execution context that runs posted jobs one at a time, in post order.
///
/// Implementations must never run two jobs concurrently; the frame
/// dispatcher relies on this to keep consumer callbacks non-overlapping.
pub trait Executor: Send + Sync {
    /// Schedules `job`. Returns `false` if the context has shut down and the
    /// job was discarded.
    fn execute(&self, job: Job) -> bool;

    /// Blocks until every job posted before this call has run.
    ///
    /// Contexts that are drained by their owner (see `ManualQueue`) cannot be
    /// waited on from outside and treat this as a no-op.
    fn flush(&self) {}
}
