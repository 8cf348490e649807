/// Command-line actions on top of the sync engine
use chrono::{DateTime, Local, TimeZone};
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::fmt::Display;
use std::time::Duration;
use tracing::info;

use crate::inbox::selectors::{self, AgeBucket};
use crate::inbox::{FetchQuery, InboxState, Notification, NotificationId};
use crate::sync::{PollMode, SyncEngine, SyncError};

/// Content is cut to this many characters in list output
const CONTENT_WIDTH: usize = 72;

/// Fetch one page and print it grouped by age.
pub async fn list(engine: &SyncEngine, query: FetchQuery) -> Result<()> {
  engine.fetch(query).await.map_err(report)?;
  let state = engine.snapshot();
  print!("{}", render_inbox(&state, &Local::now()));
  Ok(())
}

/// Flip the read flag on each id. Distinct ids go out concurrently.
pub async fn set_read(engine: &SyncEngine, ids: &[u64], is_read: bool) -> Result<()> {
  // Prime the cache so the optimistic update has something to act on
  engine.refresh().await.map_err(report)?;

  let results = join_all(
    ids
      .iter()
      .map(|&id| engine.set_read_flag(NotificationId(id), is_read)),
  )
  .await;

  let mut failed = 0;
  for (id, result) in ids.iter().zip(results) {
    match result {
      Ok(notification) => println!(
        "#{} marked {}",
        notification.id,
        if notification.is_read { "read" } else { "unread" }
      ),
      Err(err) => {
        failed += 1;
        eprintln!("#{}: {}", id, report(err));
      }
    }
  }
  println!("{} unread", engine.unread_count());

  if failed > 0 {
    return Err(eyre!("{} of {} updates failed", failed, ids.len()));
  }
  Ok(())
}

pub async fn read_all(engine: &SyncEngine) -> Result<()> {
  engine.refresh().await.map_err(report)?;
  engine.mark_all_read().await.map_err(report)?;
  println!("All notifications marked read");
  Ok(())
}

pub async fn count(engine: &SyncEngine) -> Result<()> {
  println!("{}", engine.fetch_unread_count().await);
  Ok(())
}

/// Poll until Ctrl-C, printing the unread count whenever it changes.
pub async fn watch(engine: &SyncEngine, interval: Duration, mode: PollMode) -> Result<()> {
  if interval.is_zero() {
    return Err(eyre!("Polling interval must be greater than zero"));
  }
  engine.refresh().await.map_err(report)?;

  let mut last = engine.unread_count();
  println!("{} unread", last);
  engine.start_polling(interval, mode);

  let mut display = tokio::time::interval(Duration::from_millis(500));
  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => break,
      _ = display.tick() => {
        let current = engine.unread_count();
        if current != last {
          println!("{} unread", current);
          last = current;
        }
      }
    }
  }

  if let Some(stats) = engine.polling_stats() {
    info!(
      ticks = stats.ticks,
      skipped = stats.skipped,
      failures = stats.failures,
      in_flight = engine.is_poll_in_flight(),
      "watch finished"
    );
  }
  engine.clear();
  Ok(())
}

fn report(err: SyncError) -> color_eyre::Report {
  match err {
    SyncError::Unauthorized => eyre!("{}. Check INBOX_SYNC_TOKEN.", err),
    other if other.is_transient() => eyre!("{} (safe to retry)", other),
    other => eyre!(other),
  }
}

/// Render the cached inbox grouped by age, newest first.
pub fn render_inbox<Tz: TimeZone>(state: &InboxState, now: &DateTime<Tz>) -> String
where
  Tz::Offset: Display,
{
  if state.is_empty() {
    return "No notifications\n".to_string();
  }

  let mut out = format!("{} unread\n", state.unread_count());
  let sorted: Vec<Notification> =
    selectors::sorted_by_time(state.items(), selectors::SortOrder::NewestFirst)
      .into_iter()
      .cloned()
      .collect();

  for (bucket, items) in selectors::group_by_age(&sorted, now) {
    out.push_str(&format!("\n{}\n", bucket.label()));
    for item in items {
      out.push_str(&render_line(item, bucket, now));
    }
  }

  if let Some(page) = state.pagination() {
    if page.total_pages > 1 {
      out.push_str(&format!(
        "\npage {}/{} ({} total)\n",
        page.current_page, page.total_pages, page.total_records
      ));
    }
  }
  out
}

fn render_line<Tz: TimeZone>(item: &Notification, bucket: AgeBucket, now: &DateTime<Tz>) -> String
where
  Tz::Offset: Display,
{
  let marker = if item.is_read { ' ' } else { '*' };
  let local = item.timestamp.with_timezone(&now.timezone());
  let when = match bucket {
    AgeBucket::Today | AgeBucket::Yesterday => selectors::relative_time(&local, now),
    _ => local.format("%b %e, %Y").to_string(),
  };
  format!(
    "{} #{:<6} {:<18} {}  [{}] {}\n",
    marker,
    item.id.0,
    item.kind.label(),
    selectors::truncate_content(&item.content, CONTENT_WIDTH),
    when,
    selectors::deep_link(item)
  )
}
