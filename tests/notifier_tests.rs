use futures_pacer::{
  DispatchError, DispatcherConfig, RequestDispatcher, TaskCompletionInfo, TaskCompletionStatus,
};
use std::future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

// Helper to initialize tracing for tests
fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, util::SubscriberInitExt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,futures_pacer=trace"));
    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .finish()
      .try_init()
      .ok();
  });
}

fn collecting_handler(dispatcher: &RequestDispatcher) -> Arc<Mutex<Vec<TaskCompletionInfo>>> {
  let collected = Arc::new(Mutex::new(Vec::new()));
  let sink = collected.clone();
  dispatcher.add_completion_handler(move |info| {
    sink.lock().unwrap().push(info);
  });
  collected
}

#[tokio::test(start_paused = true)]
async fn test_handler_sees_every_status_in_execution_order() {
  setup_tracing_for_test();
  let dispatcher = RequestDispatcher::new(
    DispatcherConfig::new("notifier_statuses")
      .with_min_interval(Duration::from_millis(100))
      .with_task_timeout(Duration::from_secs(1)),
    tokio::runtime::Handle::current(),
  );
  let collected = collecting_handler(&dispatcher);

  let ok = dispatcher.enqueue(|| async { Ok::<_, String>(1u8) });
  let failed = dispatcher.enqueue(|| async { Err::<u8, _>("nope".to_string()) });
  let panicked = dispatcher.enqueue(|| -> future::Ready<Result<u8, String>> { panic!("boom") });
  let timed_out = dispatcher.enqueue(|| future::pending::<Result<u8, String>>());

  assert_eq!(ok.await, Ok(1));
  assert_eq!(failed.await, Err(DispatchError::Task("nope".to_string())));
  assert_eq!(panicked.await, Err(DispatchError::TaskPanicked));
  assert_eq!(timed_out.await, Err(DispatchError::TimedOut(Duration::from_secs(1))));
  dispatcher.until_idle().await;

  let collected = collected.lock().unwrap();
  let statuses: Vec<_> = collected.iter().map(|info| (info.task_id, info.status)).collect();
  assert_eq!(
    statuses,
    vec![
      (0, TaskCompletionStatus::Succeeded),
      (1, TaskCompletionStatus::Failed),
      (2, TaskCompletionStatus::Panicked),
      (3, TaskCompletionStatus::TimedOut),
    ]
  );
  assert!(collected.iter().all(|info| &*info.dispatcher_name == "notifier_statuses"));
}

#[tokio::test(start_paused = true)]
async fn test_info_reports_queue_and_run_times() {
  setup_tracing_for_test();
  let interval = Duration::from_millis(400);
  let dispatcher = RequestDispatcher::new(
    DispatcherConfig::new("notifier_timings").with_min_interval(interval),
    tokio::runtime::Handle::current(),
  );
  let collected = collecting_handler(&dispatcher);

  let work = Duration::from_millis(250);
  let first = dispatcher.enqueue(move || async move {
    sleep(work).await;
    Ok::<_, String>(())
  });
  let second = dispatcher.enqueue(|| async { Ok::<_, String>(()) });
  first.await.unwrap();
  second.await.unwrap();
  dispatcher.until_idle().await;

  let collected = collected.lock().unwrap();
  assert_eq!(collected.len(), 2);
  assert!(collected[0].ran_for >= work);
  assert!(collected[0].queued_for < interval);
  // Second task waited for the first one plus the pause.
  assert!(collected[1].queued_for >= work + interval);
  assert!(collected[1].completion_time >= collected[0].completion_time);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_handler_does_not_stop_dispatch() {
  setup_tracing_for_test();
  let dispatcher = RequestDispatcher::new(
    DispatcherConfig::new("notifier_panicking_handler").with_min_interval(Duration::from_millis(50)),
    tokio::runtime::Handle::current(),
  );
  let calls = Arc::new(AtomicUsize::new(0));

  dispatcher.add_completion_handler(|info| {
    if info.task_id == 0 {
      panic!("handler failed on first task");
    }
  });
  let counted = calls.clone();
  dispatcher.add_completion_handler(move |_| {
    counted.fetch_add(1, Ordering::SeqCst);
  });

  let a = dispatcher.enqueue(|| async { Ok::<_, String>("a") });
  let b = dispatcher.enqueue(|| async { Ok::<_, String>("b") });
  assert_eq!(a.await, Ok("a"));
  assert_eq!(b.await, Ok("b"));

  dispatcher.until_idle().await;
  assert_eq!(calls.load(Ordering::SeqCst), 2);
  assert_eq!(dispatcher.completed_task_count(), 2);
}
