//! Read-only projections over cached notifications.
//!
//! Everything here borrows and never mutates, so it is cheap to call from
//! render paths as often as needed.

use chrono::{DateTime, Duration, Months, NaiveDate, TimeZone};

use super::types::{Notification, NotificationKind};

/// Deep link used when a notification has no usable related entity
pub const FALLBACK_LINK: &str = "/notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
  NewestFirst,
  OldestFirst,
}

/// Coarse age buckets, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgeBucket {
  Today,
  Yesterday,
  ThisWeek,
  ThisMonth,
  Older,
}

impl AgeBucket {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Today => "Today",
      Self::Yesterday => "Yesterday",
      Self::ThisWeek => "This Week",
      Self::ThisMonth => "This Month",
      Self::Older => "Older",
    }
  }
}

/// Copy of `items` sorted by creation time. Stable for equal timestamps.
pub fn sorted_by_time(items: &[Notification], order: SortOrder) -> Vec<&Notification> {
  let mut sorted: Vec<&Notification> = items.iter().collect();
  match order {
    SortOrder::NewestFirst => sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
    SortOrder::OldestFirst => sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
  }
  sorted
}

/// Unread items, in cache order
pub fn unread(items: &[Notification]) -> Vec<&Notification> {
  items.iter().filter(|n| !n.is_read).collect()
}

/// Group by calendar day in the timezone of `now`, newest day first.
/// Within a day, cache order is kept.
pub fn group_by_day<'a, Tz: TimeZone>(
  items: &'a [Notification],
  now: &DateTime<Tz>,
) -> Vec<(NaiveDate, Vec<&'a Notification>)> {
  let tz = now.timezone();
  let mut groups: Vec<(NaiveDate, Vec<&Notification>)> = Vec::new();

  for item in items {
    let day = item.timestamp.with_timezone(&tz).date_naive();
    match groups.iter_mut().find(|(d, _)| *d == day) {
      Some((_, group)) => group.push(item),
      None => groups.push((day, vec![item])),
    }
  }

  groups.sort_by(|a, b| b.0.cmp(&a.0));
  groups
}

/// Group into Today / Yesterday / This Week / This Month / Older relative to
/// `now`. Empty buckets are omitted.
pub fn group_by_age<'a, Tz: TimeZone>(
  items: &'a [Notification],
  now: &DateTime<Tz>,
) -> Vec<(AgeBucket, Vec<&'a Notification>)> {
  let tz = now.timezone();
  let today = now.date_naive();
  let yesterday = today - Duration::days(1);
  let week_ago = today - Duration::days(7);
  let month_ago = today
    .checked_sub_months(Months::new(1))
    .unwrap_or(NaiveDate::MIN);

  let mut groups: Vec<(AgeBucket, Vec<&Notification>)> = Vec::new();
  for item in items {
    let day = item.timestamp.with_timezone(&tz).date_naive();
    let bucket = if day >= today {
      AgeBucket::Today
    } else if day >= yesterday {
      AgeBucket::Yesterday
    } else if day >= week_ago {
      AgeBucket::ThisWeek
    } else if day >= month_ago {
      AgeBucket::ThisMonth
    } else {
      AgeBucket::Older
    };
    match groups.iter_mut().find(|(b, _)| *b == bucket) {
      Some((_, group)) => group.push(item),
      None => groups.push((bucket, vec![item])),
    }
  }

  groups.sort_by_key(|(bucket, _)| *bucket);
  groups
}

/// Group by category, in order of first appearance
pub fn group_by_kind(items: &[Notification]) -> Vec<(NotificationKind, Vec<&Notification>)> {
  let mut groups: Vec<(NotificationKind, Vec<&Notification>)> = Vec::new();
  for item in items {
    match groups.iter_mut().find(|(k, _)| *k == item.kind) {
      Some((_, group)) => group.push(item),
      None => groups.push((item.kind, vec![item])),
    }
  }
  groups
}

/// Navigation target for a notification. Total: every input yields a link.
pub fn deep_link(notification: &Notification) -> String {
  let Some(related) = &notification.related else {
    return FALLBACK_LINK.to_string();
  };

  match notification.kind {
    NotificationKind::CommentAdded => format!("/requests/{}#comments", related.id),
    NotificationKind::ReviewReceived => format!("/requests/{}#reviews", related.id),
    _ => format!("/requests/{}", related.id),
  }
}

/// "Just now", "5 minutes ago", "2 weeks ago", ...
pub fn relative_time<Tz: TimeZone>(timestamp: &DateTime<Tz>, now: &DateTime<Tz>) -> String {
  let seconds = now.clone().signed_duration_since(timestamp.clone()).num_seconds();
  if seconds < 60 {
    return "Just now".to_string();
  }

  let minutes = seconds / 60;
  if minutes < 60 {
    return plural(minutes, "minute");
  }
  let hours = minutes / 60;
  if hours < 24 {
    return plural(hours, "hour");
  }
  let days = hours / 24;
  if days < 7 {
    return plural(days, "day");
  }
  let weeks = days / 7;
  if weeks < 4 {
    return plural(weeks, "week");
  }
  let months = days / 30;
  if months < 12 {
    return plural(months.max(1), "month");
  }
  plural(days / 365, "year")
}

fn plural(n: i64, unit: &str) -> String {
  if n == 1 {
    format!("1 {} ago", unit)
  } else {
    format!("{} {}s ago", n, unit)
  }
}

/// Created within the last 24 hours
pub fn is_recent<Tz: TimeZone>(notification: &Notification, now: &DateTime<Tz>) -> bool {
  let age = now
    .with_timezone(&chrono::Utc)
    .signed_duration_since(notification.timestamp);
  age <= Duration::hours(24)
}

/// Shorten content to at most `max_chars` characters plus an ellipsis.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
  if content.chars().count() <= max_chars {
    return content.to_string();
  }
  let head: String = content.chars().take(max_chars).collect();
  format!("{}...", head.trim_end())
}
