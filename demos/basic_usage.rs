use futures_pacer::{DispatcherConfig, RequestDispatcher, TaskHandle};
use std::convert::Infallible;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

async fn my_task_fn(id: usize, delay_ms: u64) -> Result<String, Infallible> {
  info!("Task {} starting, will sleep for {}ms", id, delay_ms);
  tokio::time::sleep(Duration::from_millis(delay_ms)).await;
  let result = format!("Task {} finished successfully after {}ms", id, delay_ms);
  info!("{}", result);
  Ok(result)
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Basic Usage Example ---");

  let dispatcher = RequestDispatcher::new(
    DispatcherConfig::new("basic_dispatcher").with_min_interval(Duration::from_millis(300)),
    Handle::current(),
  );

  let mut handles: Vec<TaskHandle<String, Infallible>> = Vec::new();

  for i in 0..5 {
    let task_id: usize = i;
    let sleep_duration: u64 = 100 + (i as u64 % 3 * 150);
    match dispatcher.submit(move || my_task_fn(task_id, sleep_duration)) {
      Ok(handle) => {
        info!("Submitted task {} with handle id {}", task_id, handle.id());
        handles.push(handle);
      }
      Err(e) => {
        tracing::error!("Failed to submit task {}: {:?}", task_id, e);
      }
    }
  }

  info!("All tasks submitted. Awaiting results...");

  for handle in handles {
    let task_id = handle.id();
    match handle.await_result().await {
      Ok(result) => info!("Result for task {}: {}", task_id, result),
      Err(e) => info!("Error for task {}: {:?}", task_id, e),
    }
  }

  info!("All task results processed. Shutting down dispatcher.");
  dispatcher.shutdown().await;
  info!("--- Basic Usage Example End ---");
}
