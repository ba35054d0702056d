use std::fmt;

/// Lifecycle of a dispatcher's drain loop.
///
/// `Idle -> Draining` happens when a task is submitted and no loop is running.
/// `Draining -> Idle` happens only when the running loop finds the queue empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatcherState {
  #[default]
  Idle,
  Draining,
}

impl DispatcherState {
  /// Moves to `Draining`. Returns `true` if the caller is now responsible for
  /// starting a drain loop, `false` if one is already running.
  pub(crate) fn begin_drain(&mut self) -> bool {
    match self {
      DispatcherState::Idle => {
        *self = DispatcherState::Draining;
        true
      }
      DispatcherState::Draining => false,
    }
  }

  /// Moves back to `Idle`. Must only be called by the running drain loop with
  /// the queue observed empty under the same lock.
  pub(crate) fn finish_drain(&mut self) {
    debug_assert_eq!(*self, DispatcherState::Draining, "finish_drain while idle");
    *self = DispatcherState::Idle;
  }

  pub fn is_idle(&self) -> bool {
    *self == DispatcherState::Idle
  }
}

impl fmt::Display for DispatcherState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DispatcherState::Idle => f.write_str("idle"),
      DispatcherState::Draining => f.write_str("draining"),
    }
  }
}
