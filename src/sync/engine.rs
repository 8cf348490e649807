//! Sync engine: sequences fetches and read-flag mutations against the
//! transport and reconciles the cached inbox with what the server says.
//!
//! The engine is the only writer of the inbox state. Callers read through
//! `snapshot` / `with_state` and ask for changes through the async methods.
//! The state lock is never held across a transport call.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::inbox::{FetchQuery, InboxState, Notification, NotificationId};
use crate::transport::DynTransport;

use super::error::{SyncError, SyncResult};
use super::optimistic::{OptimisticMarkAll, OptimisticRead};
use super::poller::{PollHandle, PollMode, PollStats};

/// Inbox state plus the engine's own bookkeeping, guarded by one lock
pub(super) struct EngineState {
  pub(super) inbox: InboxState,
  /// Bumped by `clear`; results from an older epoch are discarded
  pub(super) epoch: u64,
  /// Sequence number of the most recently issued fetch
  fetch_issued: u64,
  /// Sequence number of the most recently applied fetch
  fetch_applied: u64,
}

impl EngineState {
  /// Make every fetch issued so far stale. Used once the server has
  /// confirmed a change those pages predate.
  pub(super) fn supersede_fetches(&mut self) {
    self.fetch_applied = self.fetch_issued;
  }
}

pub(super) struct Shared {
  transport: DynTransport,
  state: Mutex<EngineState>,
  poller: Mutex<Option<PollHandle>>,
  /// Set while a poll request is outstanding, whichever poller issued it
  poll_in_flight: Arc<AtomicBool>,
}

impl Shared {
  pub(super) fn lock_state(&self) -> MutexGuard<'_, EngineState> {
    // Transitions never panic midway, so a poisoned lock still holds a
    // consistent state.
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn lock_poller(&self) -> MutexGuard<'_, Option<PollHandle>> {
    self.poller.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Handle to the notification sync engine. Clones share the same inbox.
#[derive(Clone)]
pub struct SyncEngine {
  shared: Arc<Shared>,
}

/// Non-owning engine handle held by the poller
#[derive(Clone)]
pub(super) struct WeakEngine(Weak<Shared>);

impl WeakEngine {
  pub(super) fn upgrade(&self) -> Option<SyncEngine> {
    self.0.upgrade().map(|shared| SyncEngine { shared })
  }
}

impl SyncEngine {
  pub fn new(transport: DynTransport) -> Self {
    Self {
      shared: Arc::new(Shared {
        transport,
        state: Mutex::new(EngineState {
          inbox: InboxState::new(),
          epoch: 0,
          fetch_issued: 0,
          fetch_applied: 0,
        }),
        poller: Mutex::new(None),
        poll_in_flight: Arc::new(AtomicBool::new(false)),
      }),
    }
  }

  pub(super) fn downgrade(&self) -> WeakEngine {
    WeakEngine(Arc::downgrade(&self.shared))
  }

  /// Owned copy of the current inbox state.
  pub fn snapshot(&self) -> InboxState {
    self.shared.lock_state().inbox.clone()
  }

  /// Run `f` against the current inbox state without copying it.
  pub fn with_state<R>(&self, f: impl FnOnce(&InboxState) -> R) -> R {
    f(&self.shared.lock_state().inbox)
  }

  pub fn unread_count(&self) -> u32 {
    self.shared.lock_state().inbox.unread_count()
  }

  /// Fetch a page and replace the cached list with it.
  ///
  /// On failure the cached items are left as they were. A response that
  /// arrives after a newer fetch was already applied is dropped.
  pub async fn fetch(&self, query: FetchQuery) -> SyncResult<()> {
    let (epoch, seq) = {
      let mut state = self.shared.lock_state();
      state.fetch_issued += 1;
      (state.epoch, state.fetch_issued)
    };
    debug!(?query, seq, "fetching notifications");

    let result = self.shared.transport.list_notifications(query).await;

    let mut state = self.shared.lock_state();
    if state.epoch != epoch {
      debug!(seq, "discarding fetch from a cleared session");
      return Err(SyncError::SessionReset);
    }

    let page = match result {
      Ok(page) => page,
      Err(err) => {
        warn!(seq, error = %err, "fetch failed, keeping cached inbox");
        return Err(err.into());
      }
    };

    if seq <= state.fetch_applied {
      debug!(seq, applied = state.fetch_applied, "dropping stale fetch");
      return Ok(());
    }
    state.fetch_applied = seq;

    let count = page.items.len();
    state
      .inbox
      .replace_all(page.items, page.unread_count, page.pagination);
    state.inbox.reapply_pending();
    state.inbox.record_sync(query, Utc::now());
    debug!(
      seq,
      count,
      unread = state.inbox.unread_count(),
      "applied notification page"
    );
    Ok(())
  }

  /// Repeat the last successful fetch (or the default listing).
  pub async fn refresh(&self) -> SyncResult<()> {
    let query = self.with_state(|s| s.last_query()).unwrap_or_default();
    self.fetch(query).await
  }

  /// Set one notification's read flag, optimistically.
  ///
  /// The cache reflects `is_read` immediately. On success the server's
  /// canonical record replaces the cached one; on failure the previous flag
  /// is restored and the error returned. A second call for the same id while
  /// the first is in flight is rejected with `AlreadyPending`.
  pub async fn set_read_flag(&self, id: NotificationId, is_read: bool) -> SyncResult<Notification> {
    let op = {
      let mut state = self.shared.lock_state();
      OptimisticRead::begin(&self.shared, &mut state, id, is_read)?
    };

    let result = self.shared.transport.set_read_flag(id, is_read).await;

    let mut state = self.shared.lock_state();
    match result {
      Ok(canonical) => {
        op.confirm(&mut state, canonical.clone())?;
        Ok(canonical)
      }
      Err(err) => {
        let restored = op.roll_back(&mut state)?;
        warn!(%id, is_read, restored, error = %err, "read flag update failed");
        Err(err.into())
      }
    }
  }

  pub async fn mark_read(&self, id: NotificationId) -> SyncResult<Notification> {
    self.set_read_flag(id, true).await
  }

  pub async fn mark_unread(&self, id: NotificationId) -> SyncResult<Notification> {
    self.set_read_flag(id, false).await
  }

  /// Mark everything read, optimistically.
  ///
  /// There is no per-item rollback. On failure the engine re-fetches the
  /// last listing to get back to server truth, then returns the original
  /// error.
  pub async fn mark_all_read(&self) -> SyncResult<()> {
    let op = {
      let mut state = self.shared.lock_state();
      OptimisticMarkAll::begin(&self.shared, &mut state)?
    };

    let result = self.shared.transport.mark_all_read().await;

    let resync = {
      let mut state = self.shared.lock_state();
      if !op.settle(&mut state) {
        return Err(SyncError::SessionReset);
      }
      match result {
        Ok(()) => {
          // Anything fetched while the request was in flight predates it
          state.inbox.mark_all_read();
          state.supersede_fetches();
          info!("marked all notifications read");
          return Ok(());
        }
        Err(err) => {
          warn!(error = %err, "mark-all-read failed, resynchronizing");
          (err, state.inbox.last_query().unwrap_or_default())
        }
      }
    };

    let (err, query) = resync;
    if let Err(resync_err) = self.fetch(query).await {
      warn!(error = %resync_err, "resync after failed mark-all-read also failed");
    }
    Err(err.into())
  }

  /// Ask the server for the unread count and apply it.
  ///
  /// Never fails: on error the last known count is returned unchanged.
  pub async fn fetch_unread_count(&self) -> u32 {
    match self.try_fetch_unread_count().await {
      Ok(count) => count,
      Err(err) => {
        debug!(error = %err, "unread count unavailable, keeping last known value");
        self.unread_count()
      }
    }
  }

  /// Fallible form of `fetch_unread_count`, used by the poller to account
  /// for failed ticks. Only the counter is touched, never the items.
  pub(super) async fn try_fetch_unread_count(&self) -> SyncResult<u32> {
    let epoch = self.shared.lock_state().epoch;

    let result = self.shared.transport.unread_count().await;

    let mut state = self.shared.lock_state();
    if state.epoch != epoch {
      return Err(SyncError::SessionReset);
    }
    let count = result?;

    // Pending optimistic changes are not reflected server-side yet
    if state.inbox.pending().is_empty() {
      state.inbox.set_unread_count(count);
    } else {
      debug!(count, "mutations in flight, not applying server unread count");
    }
    Ok(state.inbox.unread_count())
  }

  /// Start polling every `interval`. Replaces any running poller.
  ///
  /// A zero interval disables polling. Returns whether a poller was started.
  pub fn start_polling(&self, interval: Duration, mode: PollMode) -> bool {
    let mut slot = self.shared.lock_poller();
    if let Some(previous) = slot.take() {
      previous.stop();
    }
    if interval.is_zero() {
      debug!("polling interval is zero, not starting poller");
      return false;
    }

    info!(interval_ms = interval.as_millis() as u64, ?mode, "starting poller");
    *slot = Some(PollHandle::spawn(
      self.downgrade(),
      interval,
      mode,
      Arc::clone(&self.shared.poll_in_flight),
    ));
    true
  }

  /// Stop future ticks. A request already in flight still completes and
  /// applies its result. Returns whether a poller was running.
  pub fn stop_polling(&self) -> bool {
    match self.shared.lock_poller().take() {
      Some(handle) => {
        handle.stop();
        info!("stopped poller");
        true
      }
      None => false,
    }
  }

  pub fn is_polling(&self) -> bool {
    self.shared.lock_poller().is_some()
  }

  /// Whether a poll request is outstanding. Stays true after `stop_polling`
  /// until that request resolves.
  pub fn is_poll_in_flight(&self) -> bool {
    self.shared.poll_in_flight.load(Ordering::Acquire)
  }

  pub fn polling_stats(&self) -> Option<PollStats> {
    self.shared.lock_poller().as_ref().map(PollHandle::stats)
  }

  /// Tear down the session: stop polling and drop all cached state.
  ///
  /// Requests still in flight resolve with `SessionReset` and leave the
  /// new, empty state alone.
  pub fn clear(&self) {
    self.stop_polling();
    let mut state = self.shared.lock_state();
    state.epoch += 1;
    state.supersede_fetches();
    state.inbox.clear();
    info!(epoch = state.epoch, "cleared inbox session");
  }
}
