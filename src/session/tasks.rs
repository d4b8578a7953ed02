//! Background task spawning.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use super::{Session, SessionEvent};
use crate::backend::BackendError;

/// Run a future, converting a panic into its message.
///
/// Used by every spawned task so that a panic still produces an event and
/// the session's pending-task count and single-flight guard are released.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic payload".to_string()
            }
        })
}

impl Session {
    /// Spawn `future` and deliver its result as the event built by `wrap`.
    pub(super) fn spawn<T, F, W>(&mut self, task: &'static str, future: F, wrap: W)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, BackendError>> + Send + 'static,
        W: FnOnce(Result<T, BackendError>) -> SessionEvent + Send + 'static,
    {
        self.pending_tasks += 1;
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let result = match catch_task_panic(future).await {
                Ok(result) => result,
                Err(panic_msg) => {
                    tracing::error!(task, error = %panic_msg, "Task panicked");
                    Err(BackendError::TaskPanicked(panic_msg))
                }
            };
            if let Err(e) = tx.send(wrap(result)).await {
                tracing::warn!(task, error = %e, "Channel send failed (receiver dropped)");
            }
        });
    }
}
