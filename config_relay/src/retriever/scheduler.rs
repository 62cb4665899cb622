//! Timer capability driving periodic cycles.

use std::time::Duration;

use futures::future::BoxFuture;

/// Produces the delay between one cycle's completion and the next cycle.
///
/// The retriever asks for a fresh delay every time it returns to idle, so
/// the period is always measured from the end of the previous cycle.
pub trait Scheduler: Send + Sync + 'static {
    /// A future that resolves once `period` has elapsed.
    fn delay(&self, period: Duration) -> BoxFuture<'static, ()>;
}

/// [`Scheduler`] backed by [`tokio::time::sleep`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn delay(&self, period: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(period))
    }
}
