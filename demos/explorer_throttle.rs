//! Several call sites looking up contract metadata from a block explorer that
//! allows ~3 requests per second. The explorer is simulated; every lookup goes
//! through one shared dispatcher so the combined rate stays under the limit.

use futures_pacer::{DispatchError, DispatcherConfig, RequestDispatcher, TaskCompletionStatus};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug)]
enum ExplorerError {
  NotVerified(String),
}

impl std::fmt::Display for ExplorerError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ExplorerError::NotVerified(address) => write!(f, "contract {} is not verified", address),
    }
  }
}

async fn fake_explorer_call(action: &'static str, address: String) -> Result<String, ExplorerError> {
  tokio::time::sleep(Duration::from_millis(80)).await;
  if address.ends_with("dead") {
    return Err(ExplorerError::NotVerified(address));
  }
  Ok(format!("{}({})", action, address))
}

async fn lookup_facet(dispatcher: RequestDispatcher, address: &'static str, started: Instant) {
  let name = dispatcher.enqueue(move || fake_explorer_call("getsourcecode", address.to_string()));
  let abi = dispatcher.enqueue(move || fake_explorer_call("getabi", address.to_string()));

  for outcome in [name.await, abi.await] {
    match outcome {
      Ok(body) => info!(elapsed_ms = started.elapsed().as_millis() as u64, "{}", body),
      Err(DispatchError::Task(e)) => warn!("Explorer rejected lookup: {}", e),
      Err(e) => warn!("Lookup did not complete: {}", e),
    }
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_target(false).init();

  let dispatcher = RequestDispatcher::new(
    DispatcherConfig::new("explorer").with_task_timeout(Duration::from_secs(10)),
    Handle::current(),
  );
  dispatcher.add_completion_handler(|info| {
    if info.status != TaskCompletionStatus::Succeeded {
      warn!(task_id = info.task_id, status = ?info.status, "Explorer request did not succeed.");
    }
  });

  let started = Instant::now();
  let facets = ["0x1a2b", "0x3c4d", "0xdead", "0x5e6f"];
  let lookups: Vec<_> = facets
    .into_iter()
    .map(|address| tokio::spawn(lookup_facet(dispatcher.clone(), address, started)))
    .collect();

  for lookup in lookups {
    if let Err(e) = lookup.await {
      warn!("Lookup task failed to join: {:?}", e);
    }
  }

  dispatcher.shutdown().await;
  info!(
    requests = dispatcher.completed_task_count(),
    elapsed_ms = started.elapsed().as_millis() as u64,
    "All lookups done."
  );
}
