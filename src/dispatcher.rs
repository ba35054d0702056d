use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::handle::TaskHandle;
use crate::notifier::{CompletionNotifier, TaskCompletionInfo};
use crate::state::DispatcherState;
use crate::task::{QueuedTask, TaskId};

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Queue, drain state and the current drain loop's handle. Kept under one lock
/// so that "push and maybe start a loop" and "observe empty and go idle" are
/// never interleaved.
struct QueueState {
  queue: VecDeque<QueuedTask>,
  state: DispatcherState,
  current_task: Option<TaskId>,
  drain_join_handle: Option<JoinHandle<()>>,
}

struct Shared {
  name: Arc<str>,
  min_interval: Duration,
  task_timeout: Option<Duration>,
  tokio_handle: TokioHandle,
  inner: Mutex<QueueState>,
  next_task_id: AtomicU64,
  completed_tasks: AtomicU64,
  shutdown_token: CancellationToken,
  idle_notify: Notify,
  notifier: CompletionNotifier,
}

/// Runs submitted futures one at a time, in submission order, pausing for
/// `min_interval` after each one settles before starting the next.
///
/// Cloning is cheap and every clone shares the same queue, so all call sites
/// holding a clone share one pacing budget against the upstream service.
#[derive(Clone)]
pub struct RequestDispatcher {
  shared: Arc<Shared>,
}

impl RequestDispatcher {
  /// Creates an idle dispatcher. Drain loops are spawned on `tokio_handle`
  /// when work arrives; nothing is spawned until then.
  pub fn new(config: DispatcherConfig, tokio_handle: TokioHandle) -> Self {
    let DispatcherConfig {
      name,
      min_interval,
      task_timeout,
    } = config;

    info!(dispatcher = %name, ?min_interval, ?task_timeout, "Creating request dispatcher.");

    Self {
      shared: Arc::new(Shared {
        name: Arc::from(name),
        min_interval,
        task_timeout,
        tokio_handle,
        inner: Mutex::new(QueueState {
          queue: VecDeque::new(),
          state: DispatcherState::Idle,
          current_task: None,
          drain_join_handle: None,
        }),
        next_task_id: AtomicU64::new(0),
        completed_tasks: AtomicU64::new(0),
        shutdown_token: CancellationToken::new(),
        idle_notify: Notify::new(),
        notifier: CompletionNotifier::default(),
      }),
    }
  }

  pub fn name(&self) -> &str {
    &self.shared.name
  }

  pub fn min_interval(&self) -> Duration {
    self.shared.min_interval
  }

  pub fn state(&self) -> DispatcherState {
    self.shared.inner.lock().state
  }

  /// Returns the number of tasks waiting for their turn (excluding the one running).
  pub fn queued_task_count(&self) -> usize {
    self.shared.inner.lock().queue.len()
  }

  /// Returns the ID of the task currently executing, if any.
  pub fn current_task(&self) -> Option<TaskId> {
    self.shared.inner.lock().current_task
  }

  /// Returns how many tasks have settled so far, whatever their outcome.
  pub fn completed_task_count(&self) -> u64 {
    self.shared.completed_tasks.load(AtomicOrdering::Acquire)
  }

  pub fn is_shutting_down(&self) -> bool {
    self.shared.shutdown_token.is_cancelled()
  }

  /// Registers a handler invoked after every task settles.
  pub fn add_completion_handler(&self, handler: impl Fn(TaskCompletionInfo) + Send + Sync + 'static) {
    let total = self.shared.notifier.add_handler(handler);
    info!(dispatcher = %self.shared.name, "Added completion handler. Total handlers: {}", total);
  }

  /// Appends `task` to the queue and returns a handle to its eventual result.
  ///
  /// The task is queued before this returns, so the order of `submit` calls is
  /// the order of execution. Starts a drain loop if none is running.
  pub fn submit<F, Fut, T, E>(&self, task: F) -> Result<TaskHandle<T, E>, DispatchError<E>>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
  {
    let (result_tx, result_rx) = oneshot::channel();
    let shared = &self.shared;

    let mut inner = shared.inner.lock();
    // Checked under the lock so shutdown can't slip between this and the push.
    if shared.shutdown_token.is_cancelled() {
      warn!(dispatcher = %shared.name, "Submit: Attempted to submit task to a dispatcher that is shutting down.");
      return Err(DispatchError::ShuttingDown);
    }

    let task_id = shared.next_task_id.fetch_add(1, AtomicOrdering::Relaxed);
    inner
      .queue
      .push_back(QueuedTask::new(task_id, task, shared.task_timeout, result_tx));
    debug!(dispatcher = %shared.name, %task_id, queued = inner.queue.len(), "Task queued.");

    if inner.state.begin_drain() {
      trace!(dispatcher = %shared.name, "Dispatcher was idle. Spawning drain loop.");
      let loop_shared = shared.clone();
      let drain_span = info_span!("request_dispatcher_drain", dispatcher = %shared.name);
      inner.drain_join_handle = Some(
        shared
          .tokio_handle
          .spawn(Self::run_drain_loop(loop_shared).instrument(drain_span)),
      );
    }

    Ok(TaskHandle {
      task_id,
      result_receiver: result_rx,
    })
  }

  /// Queues `task` and resolves with its outcome once it has run.
  ///
  /// The task is placed in the queue when `enqueue` is called, not when the
  /// returned future is first polled.
  pub fn enqueue<F, Fut, T, E>(&self, task: F) -> impl Future<Output = Result<T, DispatchError<E>>> + Send + 'static
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
  {
    let submitted = self.submit(task);
    async move {
      match submitted {
        Ok(handle) => handle.await_result().await,
        Err(e) => Err(e),
      }
    }
  }

  /// Resolves once the dispatcher is idle: the queue is empty and the trailing
  /// interval after the last task has passed.
  pub async fn until_idle(&self) {
    loop {
      let notified = self.shared.idle_notify.notified();
      tokio::pin!(notified);
      // Register before checking, so a transition in between isn't missed.
      notified.as_mut().enable();
      if self.state().is_idle() {
        return;
      }
      notified.await;
    }
  }

  /// Stops accepting tasks, lets everything already queued run with the usual
  /// pacing, and waits for the drain loop to finish.
  ///
  /// Nothing queued or running is cancelled. Calling this more than once is harmless.
  pub async fn shutdown(&self) {
    let handle_to_await: Option<JoinHandle<()>> = {
      let mut inner = self.shared.inner.lock();
      if self.shared.shutdown_token.is_cancelled() {
        info!(dispatcher = %self.shared.name, "Shutdown already in progress or completed.");
      } else {
        info!(
          dispatcher = %self.shared.name,
          queued = inner.queue.len(),
          "Initiating dispatcher shutdown. Queued tasks will still run."
        );
        self.shared.shutdown_token.cancel();
      }
      inner.drain_join_handle.take()
    };

    if let Some(handle) = handle_to_await {
      info!(dispatcher = %self.shared.name, "Waiting for drain loop to finish.");
      match handle.await {
        Ok(()) => info!(dispatcher = %self.shared.name, "Drain loop finished."),
        Err(join_error) => {
          error!(dispatcher = %self.shared.name, "Error joining drain loop during shutdown: {:?}", join_error);
        }
      }
    } else {
      trace!(dispatcher = %self.shared.name, "Drain handle already taken or never set. Waiting for idle instead.");
      self.until_idle().await;
    }
  }

  async fn run_drain_loop(shared: Arc<Shared>) {
    debug!(dispatcher = %shared.name, "Drain loop started.");

    loop {
      let next = {
        let mut inner = shared.inner.lock();
        match inner.queue.pop_front() {
          Some(queued) => {
            inner.current_task = Some(queued.task_id);
            queued
          }
          None => {
            inner.state.finish_drain();
            break;
          }
        }
      };

      let QueuedTask {
        task_id,
        enqueued_at,
        job,
      } = next;
      let started_at = Instant::now();
      debug!(dispatcher = %shared.name, %task_id, "Starting task.");

      let status = job().await;

      let ran_for = started_at.elapsed();
      shared.inner.lock().current_task = None;
      shared.completed_tasks.fetch_add(1, AtomicOrdering::AcqRel);
      debug!(dispatcher = %shared.name, %task_id, ?status, ?ran_for, "Task settled.");

      shared.notifier.notify(TaskCompletionInfo {
        task_id,
        dispatcher_name: shared.name.clone(),
        status,
        queued_for: started_at.duration_since(enqueued_at),
        ran_for,
        completion_time: SystemTime::now(),
      });

      Self::pause_after_task(&shared).await;
    }

    shared.idle_notify.notify_waiters();
    debug!(dispatcher = %shared.name, "Queue empty. Drain loop exiting, dispatcher idle.");
  }

  /// Sleeps out the minimum interval. Once shutdown has begun and nothing is
  /// left to run, the trailing pause is skipped.
  async fn pause_after_task(shared: &Shared) {
    let deadline = Instant::now() + shared.min_interval;
    tokio::select! {
      biased;
      _ = sleep_until(deadline) => {}
      _ = shared.shutdown_token.cancelled() => {
        // No submits are accepted after cancellation, so an empty queue stays empty.
        let queue_empty = shared.inner.lock().queue.is_empty();
        if queue_empty {
          trace!(dispatcher = %shared.name, "Shutting down with empty queue. Skipping trailing interval.");
        } else {
          sleep_until(deadline).await;
        }
      }
    }
  }
}

impl std::fmt::Debug for RequestDispatcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let inner = self.shared.inner.lock();
    f.debug_struct("RequestDispatcher")
      .field("name", &self.shared.name)
      .field("min_interval", &self.shared.min_interval)
      .field("state", &inner.state)
      .field("queued", &inner.queue.len())
      .field("current_task", &inner.current_task)
      .finish_non_exhaustive()
  }
}
