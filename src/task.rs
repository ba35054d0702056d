use crate::error::DispatchError;
use crate::notifier::TaskCompletionStatus;

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::warn;

/// Identifier assigned to each submitted task, unique per dispatcher.
pub type TaskId = u64;

/// A queued task with its type erased. Calling it runs the user's operation,
/// delivers the outcome to the waiting caller, and reports the status.
pub(crate) type Job = Box<dyn FnOnce() -> BoxFuture<'static, TaskCompletionStatus> + Send + 'static>;

/// Internal representation of a task waiting in the dispatcher queue.
pub(crate) struct QueuedTask {
  pub(crate) task_id: TaskId,
  pub(crate) enqueued_at: Instant,
  pub(crate) job: Job,
}

impl QueuedTask {
  /// Wraps a user operation and the sender half of its result channel.
  pub(crate) fn new<F, Fut, T, E>(
    task_id: TaskId,
    operation: F,
    task_timeout: Option<Duration>,
    result_sender: oneshot::Sender<Result<T, DispatchError<E>>>,
  ) -> Self
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
  {
    let job: Job = Box::new(move || {
      async move {
        let outcome = run_guarded(operation, task_timeout).await;
        let status = TaskCompletionStatus::from(&outcome);
        if result_sender.send(outcome).is_err() {
          warn!(%task_id, "Result receiver for task was dropped. Task outcome discarded.");
        }
        status
      }
      .boxed()
    });

    Self {
      task_id,
      enqueued_at: Instant::now(),
      job,
    }
  }
}

/// Runs one operation to completion, turning panics (raised either when the
/// closure is called or while its future is polled) and an exceeded timeout
/// into dispatcher errors. The task's own `Err` is passed through as-is.
pub(crate) async fn run_guarded<F, Fut, T, E>(
  operation: F,
  task_timeout: Option<Duration>,
) -> Result<T, DispatchError<E>>
where
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  let future = match panic::catch_unwind(AssertUnwindSafe(operation)) {
    Ok(future) => future,
    Err(_) => return Err(DispatchError::TaskPanicked),
  };

  let guarded = AssertUnwindSafe(future).catch_unwind();
  let settled = match task_timeout {
    Some(limit) => match tokio::time::timeout(limit, guarded).await {
      Ok(settled) => settled,
      Err(_) => return Err(DispatchError::TimedOut(limit)),
    },
    None => guarded.await,
  };

  match settled {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(task_error)) => Err(DispatchError::Task(task_error)),
    Err(_panic_payload) => Err(DispatchError::TaskPanicked),
  }
}
