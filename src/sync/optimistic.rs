//! Optimistic apply, then confirm or roll back.
//!
//! Every local mutation that waits on the server goes through one of these
//! guards: `begin` captures the previous value, registers the pending entry
//! and applies the change; exactly one of `confirm`/`roll_back`/`settle`
//! resolves it. If the owning future is dropped before resolving, `Drop`
//! still frees the pending entry so later calls are never blocked.

use std::sync::Arc;
use tracing::debug;

use crate::inbox::{Notification, NotificationId, PendingRead};

use super::engine::{EngineState, Shared};
use super::error::{SyncError, SyncResult};

/// In-flight read flag change on one notification
pub(super) struct OptimisticRead {
  shared: Arc<Shared>,
  id: NotificationId,
  epoch: u64,
  settled: bool,
}

impl OptimisticRead {
  pub(super) fn begin(
    shared: &Arc<Shared>,
    state: &mut EngineState,
    id: NotificationId,
    target: bool,
  ) -> SyncResult<Self> {
    let previous = state.inbox.get(id).map(|n| n.is_read);
    state
      .inbox
      .pending_mut()
      .begin_item(
        id,
        PendingRead {
          target,
          previous,
          counter_moved: false,
        },
      )
      .map_err(|target| SyncError::AlreadyPending { target })?;

    let counter_moved = state.inbox.apply_read_flag_counted(id, target);
    if let Some(op) = state.inbox.pending_mut().get_mut(id) {
      op.counter_moved = counter_moved.unwrap_or(false);
    }
    debug!(%id, target, ?previous, ?counter_moved, "applied optimistic read flag");

    Ok(Self {
      shared: Arc::clone(shared),
      id,
      epoch: state.epoch,
      settled: false,
    })
  }

  /// Server accepted the change; adopt its canonical record.
  pub(super) fn confirm(mut self, state: &mut EngineState, canonical: Notification) -> SyncResult<()> {
    self.settled = true;
    if state.epoch != self.epoch {
      return Err(SyncError::SessionReset);
    }

    state.inbox.pending_mut().finish_item(self.id);
    let cached = state.inbox.upsert_one(canonical);
    state.supersede_fetches();
    debug!(id = %self.id, cached, "confirmed read flag");
    Ok(())
  }

  /// Server refused the change; restore the flag captured at `begin`.
  ///
  /// Only restores if the cached flag still holds the optimistic value, and
  /// only gives back a counter move the optimistic apply actually made.
  /// Returns whether anything was restored, or `SessionReset` if the session
  /// was cleared meanwhile.
  pub(super) fn roll_back(mut self, state: &mut EngineState) -> SyncResult<bool> {
    self.settled = true;
    if state.epoch != self.epoch {
      return Err(SyncError::SessionReset);
    }

    let Some(op) = state.inbox.pending_mut().finish_item(self.id) else {
      return Ok(false);
    };
    let Some(previous) = op.previous else {
      return Ok(false);
    };
    let current = state.inbox.get(self.id).map(|n| n.is_read);
    if current != Some(op.target) {
      return Ok(false);
    }
    Ok(
      state
        .inbox
        .revert_read_flag(self.id, previous, op.counter_moved),
    )
  }
}

impl Drop for OptimisticRead {
  fn drop(&mut self) {
    if self.settled {
      return;
    }
    // The request future was dropped mid-flight. Free the id and leave the
    // optimistic flag for the next refresh to reconcile.
    let mut state = self.shared.lock_state();
    if state.epoch == self.epoch {
      state.inbox.pending_mut().finish_item(self.id);
      debug!(id = %self.id, "abandoned pending read flag");
    }
  }
}

/// In-flight mark-all-read
pub(super) struct OptimisticMarkAll {
  shared: Arc<Shared>,
  epoch: u64,
  settled: bool,
}

impl OptimisticMarkAll {
  pub(super) fn begin(shared: &Arc<Shared>, state: &mut EngineState) -> SyncResult<Self> {
    state
      .inbox
      .pending_mut()
      .begin_mark_all()
      .map_err(|target| SyncError::AlreadyPending { target })?;

    state.inbox.mark_all_read();
    debug!("applied optimistic mark-all-read");

    Ok(Self {
      shared: Arc::clone(shared),
      epoch: state.epoch,
      settled: false,
    })
  }

  /// Clear the pending flag. Returns false if the session changed meanwhile.
  pub(super) fn settle(mut self, state: &mut EngineState) -> bool {
    self.settled = true;
    if state.epoch != self.epoch {
      return false;
    }
    state.inbox.pending_mut().finish_mark_all();
    true
  }
}

impl Drop for OptimisticMarkAll {
  fn drop(&mut self) {
    if self.settled {
      return;
    }
    let mut state = self.shared.lock_state();
    if state.epoch == self.epoch {
      state.inbox.pending_mut().finish_mark_all();
    }
  }
}
