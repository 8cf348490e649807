//! Background refresh on a fixed interval.
//!
//! At most one poll request is in flight at a time, across restarts too: the
//! in-flight flag belongs to the engine, so a tick that fires while any
//! earlier poll request is still outstanding is skipped, not queued.
//! Stopping cancels future ticks only; a request already in flight runs to
//! completion and applies its result.

use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::engine::{SyncEngine, WeakEngine};
use super::error::SyncResult;

/// What each tick refreshes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollMode {
  /// Only the unread counter; cached items are left alone
  #[default]
  UnreadCount,
  /// Re-run the last listing
  Full,
}

/// Tick counters, for status display and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
  pub ticks: u64,
  pub skipped: u64,
  pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
  ticks: AtomicU64,
  skipped: AtomicU64,
  failures: AtomicU64,
}

/// Running poller. Dropping the handle stops future ticks.
pub struct PollHandle {
  shutdown: watch::Sender<bool>,
  counters: Arc<Counters>,
}

impl PollHandle {
  /// `in_flight` is shared with every poller the engine ever starts.
  pub(super) fn spawn(
    engine: WeakEngine,
    interval: Duration,
    mode: PollMode,
    in_flight: Arc<AtomicBool>,
  ) -> Self {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let counters = Arc::new(Counters::default());

    tokio::spawn(run(
      engine,
      interval,
      mode,
      shutdown_rx,
      in_flight,
      Arc::clone(&counters),
    ));

    Self { shutdown, counters }
  }

  /// Cancel future ticks.
  pub fn stop(&self) {
    let _ = self.shutdown.send(true);
  }

  pub fn stats(&self) -> PollStats {
    PollStats {
      ticks: self.counters.ticks.load(Ordering::Relaxed),
      skipped: self.counters.skipped.load(Ordering::Relaxed),
      failures: self.counters.failures.load(Ordering::Relaxed),
    }
  }

}

async fn run(
  engine: WeakEngine,
  interval: Duration,
  mode: PollMode,
  mut shutdown: watch::Receiver<bool>,
  in_flight: Arc<AtomicBool>,
  counters: Arc<Counters>,
) {
  let mut ticker = tokio::time::interval(interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    tokio::select! {
      biased;
      // Fires on stop() and when the handle is dropped
      _ = shutdown.changed() => break,
      _ = ticker.tick() => {}
    }
    counters.ticks.fetch_add(1, Ordering::Relaxed);

    if in_flight.swap(true, Ordering::AcqRel) {
      counters.skipped.fetch_add(1, Ordering::Relaxed);
      debug!("previous poll still in flight, skipping tick");
      continue;
    }

    let Some(engine) = engine.upgrade() else {
      in_flight.store(false, Ordering::Release);
      break;
    };

    let flag = Arc::clone(&in_flight);
    let counters = Arc::clone(&counters);
    // Detached so that stopping the loop never aborts a request mid-flight
    tokio::spawn(async move {
      if let Err(err) = poll_once(&engine, mode).await {
        counters.failures.fetch_add(1, Ordering::Relaxed);
        warn!(error = %err, ?mode, "poll failed");
      }
      flag.store(false, Ordering::Release);
    });
  }

  debug!("poller stopped");
}

async fn poll_once(engine: &SyncEngine, mode: PollMode) -> SyncResult<()> {
  match mode {
    PollMode::UnreadCount => engine.try_fetch_unread_count().await.map(|_| ()),
    PollMode::Full => engine.refresh().await,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::inbox::fixtures::notification;
  use crate::inbox::FetchQuery;
  use crate::transport::fake::{Call, FakeTransport};
  use crate::transport::TransportError;

  fn engine_with(fake: &Arc<FakeTransport>) -> SyncEngine {
    SyncEngine::new(fake.clone())
  }

  fn count_calls(fake: &FakeTransport, want: fn(&Call) -> bool) -> usize {
    fake.calls().iter().filter(|c| want(c)).count()
  }

  #[tokio::test(start_paused = true)]
  async fn test_tick_is_skipped_while_request_in_flight() {
    let fake = Arc::new(FakeTransport::new(vec![notification(1, false)]));
    fake.set_default_delay(Duration::from_millis(1500));
    let engine = engine_with(&fake);

    engine.start_polling(Duration::from_millis(1000), PollMode::UnreadCount);

    // t=0 request is still outstanding when the t=1000 tick fires
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(fake.call_count(), 1);
    let stats = engine.polling_stats().unwrap();
    assert_eq!(stats.ticks, 2);
    assert_eq!(stats.skipped, 1);

    // First request resolved at t=1500, next tick at t=2000 goes out
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(fake.call_count(), 2);
    assert_eq!(engine.unread_count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_ticks_do_not_stop_polling() {
    let fake = Arc::new(FakeTransport::new(vec![notification(1, false)]));
    fake.fail_count(TransportError::Network("offline".to_string()));
    fake.fail_count(TransportError::Server {
      status: 503,
      message: "busy".to_string(),
    });
    let engine = engine_with(&fake);

    engine.start_polling(Duration::from_millis(100), PollMode::UnreadCount);
    tokio::time::sleep(Duration::from_millis(350)).await;

    let stats = engine.polling_stats().unwrap();
    assert_eq!(stats.failures, 2);
    assert_eq!(count_calls(&fake, |c| matches!(c, Call::UnreadCount)), 4);
    assert_eq!(engine.unread_count(), 1);
    assert!(engine.is_polling());
  }

  #[tokio::test(start_paused = true)]
  async fn test_stop_lets_in_flight_request_finish() {
    let fake = Arc::new(FakeTransport::new(vec![
      notification(1, false),
      notification(2, false),
    ]));
    fake.set_default_delay(Duration::from_millis(500));
    let engine = engine_with(&fake);

    engine.start_polling(Duration::from_millis(1000), PollMode::Full);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(engine.stop_polling());
    assert!(!engine.is_polling());

    tokio::time::sleep(Duration::from_millis(3000)).await;

    // The t=0 fetch still landed, and no further ticks went out
    assert_eq!(fake.calls(), vec![Call::List(FetchQuery::default())]);
    assert_eq!(engine.snapshot().items().len(), 2);
    assert_eq!(engine.unread_count(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_full_mode_repeats_last_query() {
    let fake = Arc::new(FakeTransport::new(vec![notification(1, false)]));
    let engine = engine_with(&fake);
    engine.fetch(FetchQuery::unread()).await.unwrap();

    engine.start_polling(Duration::from_millis(100), PollMode::Full);
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.stop_polling();

    assert_eq!(
      fake.calls(),
      vec![Call::List(FetchQuery::unread()), Call::List(FetchQuery::unread())]
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_restart_replaces_previous_poller() {
    let fake = Arc::new(FakeTransport::new(Vec::new()));
    let engine = engine_with(&fake);

    assert!(engine.start_polling(Duration::from_millis(100), PollMode::UnreadCount));
    assert!(engine.start_polling(Duration::from_millis(1000), PollMode::UnreadCount));
    tokio::time::sleep(Duration::from_millis(550)).await;

    // Old poller ticked at most once before being replaced; new one once at t=0
    assert!(fake.call_count() <= 2);
    assert_eq!(engine.polling_stats().unwrap().ticks, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_restart_during_slow_request_does_not_overlap() {
    let fake = Arc::new(FakeTransport::new(vec![notification(1, false)]));
    fake.set_default_delay(Duration::from_millis(1500));
    let engine = engine_with(&fake);

    engine.start_polling(Duration::from_millis(1000), PollMode::UnreadCount);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(engine.is_poll_in_flight());

    // Stop and start again while the t=0 request is outstanding
    engine.stop_polling();
    engine.start_polling(Duration::from_millis(1000), PollMode::UnreadCount);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(fake.call_count(), 1);
    assert_eq!(engine.polling_stats().unwrap().skipped, 1);

    // t=1100 is still covered by the first request; t=2100 goes out
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(fake.call_count(), 2);
    assert_eq!(engine.polling_stats().unwrap().skipped, 2);
  }

  #[tokio::test]
  async fn test_zero_interval_disables_polling() {
    let fake = Arc::new(FakeTransport::new(Vec::new()));
    let engine = engine_with(&fake);

    assert!(!engine.start_polling(Duration::ZERO, PollMode::UnreadCount));
    assert!(!engine.is_polling());
  }

  #[tokio::test(start_paused = true)]
  async fn test_clear_stops_polling() {
    let fake = Arc::new(FakeTransport::new(vec![notification(1, false)]));
    let engine = engine_with(&fake);

    engine.start_polling(Duration::from_millis(100), PollMode::UnreadCount);
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.clear();
    let calls = fake.call_count();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!engine.is_polling());
    assert_eq!(fake.call_count(), calls);
  }
}
