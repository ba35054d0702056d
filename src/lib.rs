//! A Tokio-based dispatcher that runs futures strictly one at a time, in
//! submission order, with a fixed pause between them. Intended for pacing
//! calls to a rate-limited upstream API from many call sites at once.

mod config;
mod dispatcher;
mod error;
mod handle;
mod notifier;
mod state;
mod task;

pub use config::{DispatcherConfig, DEFAULT_DISPATCHER_NAME, DEFAULT_MIN_INTERVAL};
pub use dispatcher::RequestDispatcher;
pub use error::DispatchError;
pub use handle::TaskHandle;
pub use notifier::{TaskCompletionInfo, TaskCompletionStatus};
pub use state::DispatcherState;
pub use task::TaskId;
