//! In-memory transport for tests.
//!
//! Holds a server-side list of notifications and answers calls from it.
//! Failures, canned pages, response delays and a release gate can be
//! scripted per call so tests can interleave overlapping operations.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::inbox::{FetchQuery, Notification, NotificationId, NotificationPage, Pagination};

use super::{Transport, TransportError, TransportResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  List(FetchQuery),
  SetReadFlag(NotificationId, bool),
  MarkAllRead,
  UnreadCount,
}

#[derive(Default)]
struct Script {
  server: Vec<Notification>,
  calls: Vec<Call>,
  list_failures: VecDeque<TransportError>,
  set_failures: VecDeque<TransportError>,
  mark_all_failures: VecDeque<TransportError>,
  count_failures: VecDeque<TransportError>,
  canned_pages: VecDeque<NotificationPage>,
  list_delays: VecDeque<Duration>,
  default_delay: Duration,
}

pub struct FakeTransport {
  script: Mutex<Script>,
  gated: AtomicBool,
  gate: Semaphore,
}

impl FakeTransport {
  pub fn new(server: Vec<Notification>) -> Self {
    Self {
      script: Mutex::new(Script {
        server,
        ..Script::default()
      }),
      gated: AtomicBool::new(false),
      gate: Semaphore::new(0),
    }
  }

  fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
    let mut script = self.script.lock().unwrap();
    f(&mut script)
  }

  pub fn calls(&self) -> Vec<Call> {
    self.with_script(|s| s.calls.clone())
  }

  pub fn call_count(&self) -> usize {
    self.with_script(|s| s.calls.len())
  }

  pub fn server_items(&self) -> Vec<Notification> {
    self.with_script(|s| s.server.clone())
  }

  pub fn fail_list(&self, err: TransportError) {
    self.with_script(|s| s.list_failures.push_back(err));
  }

  pub fn fail_set(&self, err: TransportError) {
    self.with_script(|s| s.set_failures.push_back(err));
  }

  pub fn fail_mark_all(&self, err: TransportError) {
    self.with_script(|s| s.mark_all_failures.push_back(err));
  }

  pub fn fail_count(&self, err: TransportError) {
    self.with_script(|s| s.count_failures.push_back(err));
  }

  /// Answer the next listing with `page` instead of the server list
  pub fn queue_page(&self, page: NotificationPage) {
    self.with_script(|s| s.canned_pages.push_back(page));
  }

  /// Delay the next listing by `delay`
  pub fn queue_list_delay(&self, delay: Duration) {
    self.with_script(|s| s.list_delays.push_back(delay));
  }

  /// Delay every call that has no queued delay
  pub fn set_default_delay(&self, delay: Duration) {
    self.with_script(|s| s.default_delay = delay);
  }

  /// Hold every call at the gate until `release` is called
  pub fn hold(&self) {
    self.gated.store(true, Ordering::SeqCst);
  }

  /// Let `n` held calls through
  pub fn release(&self, n: usize) {
    self.gate.add_permits(n);
  }

  async fn enter(&self, call: Call) {
    let delay = self.with_script(|s| {
      let delay = match call {
        Call::List(_) => s.list_delays.pop_front().unwrap_or(s.default_delay),
        _ => s.default_delay,
      };
      s.calls.push(call);
      delay
    });

    if self.gated.load(Ordering::SeqCst) {
      self.gate.acquire().await.unwrap().forget();
    }
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
  }
}

fn unread_of(items: &[Notification]) -> u32 {
  items.iter().filter(|n| !n.is_read).count() as u32
}

#[async_trait]
impl Transport for FakeTransport {
  async fn list_notifications(&self, query: FetchQuery) -> TransportResult<NotificationPage> {
    // Scripted answers are claimed in call order, not completion order
    let (failure, canned) =
      self.with_script(|s| (s.list_failures.pop_front(), s.canned_pages.pop_front()));
    self.enter(Call::List(query)).await;

    if let Some(err) = failure {
      return Err(err);
    }
    if let Some(page) = canned {
      return Ok(page);
    }
    self.with_script(|s| {
      let items: Vec<Notification> = s
        .server
        .iter()
        .filter(|n| query.unread_only != Some(true) || !n.is_read)
        .cloned()
        .collect();
      Ok(NotificationPage {
        unread_count: unread_of(&s.server),
        pagination: Pagination {
          total_records: items.len() as u64,
          current_page: query.page.unwrap_or(1),
          total_pages: 1,
          next_page: None,
          prev_page: None,
        },
        items,
      })
    })
  }

  async fn set_read_flag(
    &self,
    id: NotificationId,
    is_read: bool,
  ) -> TransportResult<Notification> {
    self.enter(Call::SetReadFlag(id, is_read)).await;

    self.with_script(|s| {
      if let Some(err) = s.set_failures.pop_front() {
        return Err(err);
      }
      let item = s
        .server
        .iter_mut()
        .find(|n| n.id == id)
        .ok_or(TransportError::NotFound)?;
      item.is_read = is_read;
      Ok(item.clone())
    })
  }

  async fn mark_all_read(&self) -> TransportResult<()> {
    self.enter(Call::MarkAllRead).await;

    self.with_script(|s| {
      if let Some(err) = s.mark_all_failures.pop_front() {
        return Err(err);
      }
      for item in &mut s.server {
        item.is_read = true;
      }
      Ok(())
    })
  }

  async fn unread_count(&self) -> TransportResult<u32> {
    self.enter(Call::UnreadCount).await;

    self.with_script(|s| {
      if let Some(err) = s.count_failures.pop_front() {
        return Err(err);
      }
      Ok(unread_of(&s.server))
    })
  }
}
