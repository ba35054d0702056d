use std::time::Duration;

use thiserror::Error;

/// Errors a caller can observe for a task submitted to a `RequestDispatcher`.
///
/// `E` is the task's own error type. It is carried through untouched in
/// `DispatchError::Task`; every other variant comes from the dispatcher.
#[derive(Error, Debug, PartialEq)]
pub enum DispatchError<E> {
  #[error("Task failed: {0}")]
  Task(E),

  #[error("Submitted task panicked")]
  TaskPanicked,

  #[error("Task did not settle within {0:?}")]
  TimedOut(Duration),

  #[error("Dispatcher is shutting down or already shut down, cannot accept new tasks")]
  ShuttingDown,

  #[error("Task result channel error (continuation dropped before a result was sent): {0}")]
  ResultChannelError(String),
}

impl<E> DispatchError<E> {
  /// Returns `true` if this is the task's own error rather than a dispatcher error.
  pub fn is_task_error(&self) -> bool {
    matches!(self, DispatchError::Task(_))
  }

  /// Unwraps the task's own error, if that is what this is.
  pub fn into_task_error(self) -> Option<E> {
    match self {
      DispatchError::Task(e) => Some(e),
      _ => None,
    }
  }
}
