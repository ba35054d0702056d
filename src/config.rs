use std::time::Duration;

/// Pause enforced between one task settling and the next one starting.
///
/// 400ms keeps a single dispatcher at ~2.5 requests per second, under the
/// 3/sec ceiling of the usual block-explorer free tier.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(400);

pub const DEFAULT_DISPATCHER_NAME: &str = "request_dispatcher";

/// Options for a `RequestDispatcher`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
  /// Name used in tracing fields and completion notifications.
  pub name: String,
  /// Minimum delay between the end of one task and the start of the next.
  pub min_interval: Duration,
  /// Upper bound on how long a single task may run. `None` means a task that
  /// never settles stalls the queue.
  pub task_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
  fn default() -> Self {
    Self {
      name: DEFAULT_DISPATCHER_NAME.to_string(),
      min_interval: DEFAULT_MIN_INTERVAL,
      task_timeout: None,
    }
  }
}

impl DispatcherConfig {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      ..Self::default()
    }
  }

  pub fn with_name(mut self, name: &str) -> Self {
    self.name = name.to_string();
    self
  }

  pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
    self.min_interval = min_interval;
    self
  }

  pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
    self.task_timeout = Some(task_timeout);
    self
  }
}
