//! Pure aggregation functions over raw upstream record lists.
//!
//! Nothing in here performs I/O; every function takes the already-fetched
//! records (or fields projected out of them) and produces a scalar or a small
//! structure for the dashboard.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Round to two decimals, the precision the dashboard displays.
pub fn round2(value: f64) -> f64 {
  (value * 100.0).round() / 100.0
}

/// Events per day over a window.
///
/// A zero-length window returns the raw count instead of dividing.
pub fn rate_per_day(count: usize, window_days: f64) -> f64 {
  if window_days == 0.0 {
    count as f64
  } else {
    round2(count as f64 / window_days)
  }
}

/// Percentage of records whose status is "succeeded", case-insensitively.
///
/// Returns `None` for an empty list: "no data" is distinct from "0% success".
pub fn success_rate<'a, I>(statuses: I) -> Option<f64>
where
  I: IntoIterator<Item = Option<&'a str>>,
{
  let mut total = 0usize;
  let mut successful = 0usize;
  for status in statuses {
    total += 1;
    if status.is_some_and(|s| s.eq_ignore_ascii_case("succeeded")) {
      successful += 1;
    }
  }

  if total == 0 {
    None
  } else {
    Some(round2(successful as f64 / total as f64 * 100.0))
  }
}

/// Average of `(finish - start)` in seconds across records carrying both
/// timestamps. Malformed timestamps and non-positive durations are skipped
/// individually; `None` when no valid duration remains.
pub fn average_duration_secs<'a, I>(spans: I) -> Option<f64>
where
  I: IntoIterator<Item = (Option<&'a str>, Option<&'a str>)>,
{
  let durations: Vec<f64> = spans
    .into_iter()
    .filter_map(|(start, finish)| {
      let start = DateTime::parse_from_rfc3339(start?).ok()?;
      let finish = DateTime::parse_from_rfc3339(finish?).ok()?;
      let secs = (finish - start).num_milliseconds() as f64 / 1000.0;
      (secs > 0.0).then_some(secs)
    })
    .collect();

  if durations.is_empty() {
    None
  } else {
    Some(round2(durations.iter().sum::<f64>() / durations.len() as f64))
  }
}

/// One row of the top-contributors ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
  pub name: String,
  pub commit_count: usize,
}

pub const DEFAULT_TOP_N: usize = 5;

/// Top-N authors by record count.
///
/// Missing author names land in an "Unknown" bucket. Ties keep
/// first-encountered order (the sort is stable and groups are kept in
/// insertion order).
pub fn top_contributors<I>(authors: I, n: usize) -> Vec<Contributor>
where
  I: IntoIterator<Item = Option<String>>,
{
  let mut order: Vec<String> = Vec::new();
  let mut counts: HashMap<String, usize> = HashMap::new();

  for author in authors {
    let name = author.unwrap_or_else(|| "Unknown".to_string());
    if !counts.contains_key(&name) {
      order.push(name.clone());
    }
    *counts.entry(name).or_insert(0) += 1;
  }

  let mut ranked: Vec<Contributor> = order
    .into_iter()
    .map(|name| {
      let commit_count = counts[&name];
      Contributor { name, commit_count }
    })
    .collect();

  ranked.sort_by(|a, b| b.commit_count.cmp(&a.commit_count));
  ranked.truncate(n);
  ranked
}

/// Canonical environment buckets.
pub const ENV_TEST: &str = "Test";
pub const ENV_STAGING: &str = "Staging";
pub const ENV_PRODUCTION: &str = "Production";
pub const ENV_UNKNOWN: &str = "Unknown";

/// Classify an environment display name into a dashboard bucket.
///
/// Case-insensitive substring match, checked in priority order test > stag >
/// prod; a name matching none of those keeps its literal spelling, and a
/// missing name buckets under "Unknown". The check order is load-bearing:
/// "Staging-East" and "staging-prod-mirror" both classify as Staging.
pub fn classify_environment(name: Option<&str>) -> String {
  let Some(name) = name else {
    return ENV_UNKNOWN.to_string();
  };
  let lower = name.to_lowercase();
  if lower.contains("test") {
    ENV_TEST.to_string()
  } else if lower.contains("stag") {
    ENV_STAGING.to_string()
  } else if lower.contains("prod") {
    ENV_PRODUCTION.to_string()
  } else {
    name.to_string()
  }
}

/// Deployment counts per environment bucket.
pub fn classify_environments<'a, I>(names: I) -> HashMap<String, u64>
where
  I: IntoIterator<Item = Option<&'a str>>,
{
  let mut counts: HashMap<String, u64> = HashMap::new();
  for name in names {
    *counts.entry(classify_environment(name)).or_insert(0) += 1;
  }
  counts
}
