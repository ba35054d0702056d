use crate::error::DispatchError;
use crate::task::TaskId;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use tracing::{error, trace};

// --- Public Event Structs for Handlers ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCompletionStatus {
  Succeeded,
  Failed,
  Panicked,
  TimedOut,
}

impl<T, E> From<&Result<T, DispatchError<E>>> for TaskCompletionStatus {
  fn from(result: &Result<T, DispatchError<E>>) -> Self {
    match result {
      Ok(_) => TaskCompletionStatus::Succeeded,
      Err(DispatchError::TaskPanicked) => TaskCompletionStatus::Panicked,
      Err(DispatchError::TimedOut(_)) => TaskCompletionStatus::TimedOut,
      Err(_) => TaskCompletionStatus::Failed,
    }
  }
}

#[derive(Debug, Clone)]
pub struct TaskCompletionInfo {
  pub task_id: TaskId,
  pub dispatcher_name: Arc<str>,
  pub status: TaskCompletionStatus,
  /// Time between submission and the task being started.
  pub queued_for: Duration,
  /// Time the task itself took to settle, excluding the pacing delay.
  pub ran_for: Duration,
  pub completion_time: SystemTime,
}

type CompletionHandler = Arc<dyn Fn(TaskCompletionInfo) + Send + Sync + 'static>;

/// Fans each task completion out to the registered handlers.
///
/// Handlers run inline on the drain loop, in registration order, so they see
/// completions in execution order. They should be quick; a slow handler eats
/// into the pacing interval of the next task.
#[derive(Default)]
pub(crate) struct CompletionNotifier {
  handlers: RwLock<Vec<CompletionHandler>>,
}

impl fmt::Debug for CompletionNotifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CompletionNotifier")
      .field("handler_count", &self.handlers.read().len())
      .finish()
  }
}

impl CompletionNotifier {
  pub(crate) fn add_handler(&self, handler: impl Fn(TaskCompletionInfo) + Send + Sync + 'static) -> usize {
    let mut handlers = self.handlers.write();
    handlers.push(Arc::new(handler));
    handlers.len()
  }

  pub(crate) fn notify(&self, info: TaskCompletionInfo) {
    // Snapshot so a handler registering another handler can't deadlock.
    let handlers: Vec<CompletionHandler> = self.handlers.read().clone();
    if handlers.is_empty() {
      trace!(task_id = %info.task_id, "No completion handlers registered, dropping notification.");
      return;
    }

    for handler in handlers {
      let info_for_handler = info.clone();
      let result = panic::catch_unwind(AssertUnwindSafe(|| handler(info_for_handler)));
      if result.is_err() {
        error!(
          dispatcher = %info.dispatcher_name,
          task_id = %info.task_id,
          "A completion handler panicked. Continuing with remaining handlers."
        );
      }
    }
  }
}
