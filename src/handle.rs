use crate::error::DispatchError;
use crate::task::TaskId;

use tokio::sync::oneshot;
use tracing;

/// A handle to a task submitted to a `RequestDispatcher`.
///
/// Dropping the handle does not withdraw the task; it still runs in its turn
/// and its outcome is discarded.
#[derive(Debug)]
pub struct TaskHandle<T, E> {
  pub(crate) task_id: TaskId,
  pub(crate) result_receiver: oneshot::Receiver<Result<T, DispatchError<E>>>,
}

impl<T, E> TaskHandle<T, E> {
  /// Returns the dispatcher-assigned ID of this task.
  pub fn id(&self) -> TaskId {
    self.task_id
  }

  /// Awaits the task's turn and its completion.
  ///
  /// Resolves to exactly what the task produced: `Ok(T)`, or its own error
  /// wrapped in `DispatchError::Task`.
  ///
  /// # Errors
  /// Returns `DispatchError::TaskPanicked` if the task panicked.
  /// Returns `DispatchError::TimedOut` if a task timeout is configured and was exceeded.
  /// Returns `DispatchError::ResultChannelError` if the task was dropped without reporting.
  pub async fn await_result(self) -> Result<T, DispatchError<E>> {
    match self.result_receiver.await {
      Ok(outcome) => outcome,
      Err(recv_error) => {
        tracing::warn!(task_id = %self.task_id, "Result channel receive error: {}", recv_error);
        Err(DispatchError::ResultChannelError(format!(
          "Task (id: {}) result channel unexpectedly closed: {}",
          self.task_id, recv_error
        )))
      }
    }
  }
}
