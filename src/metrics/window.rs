//! Time windows and named reporting periods.

use chrono::{DateTime, Duration, Utc};

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl TimeWindow {
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    Self { start, end }
  }

  /// Window covering the last `days` days, ending at `now`.
  pub fn last_days(now: DateTime<Utc>, days: i64) -> Self {
    Self {
      start: now - Duration::days(days),
      end: now,
    }
  }

  /// Window length in fractional days.
  pub fn length_days(&self) -> f64 {
    (self.end - self.start).num_seconds() as f64 / 86_400.0
  }

  pub fn contains(&self, ts: DateTime<Utc>) -> bool {
    self.start <= ts && ts < self.end
  }

  /// ISO 8601 start bound, as the upstream query parameters expect it.
  pub fn start_iso(&self) -> String {
    self.start.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
  }

  /// ISO 8601 end bound.
  pub fn end_iso(&self) -> String {
    self.end.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
  }
}

/// Named reporting period.
///
/// All windows for one request are derived from a single captured `now`, so
/// the periods of one aggregation pass are mutually consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
  /// Since midnight UTC today.
  Daily,
  /// Last 7 days.
  Weekly,
  /// Last 30 days.
  Monthly,
  /// Last N days ("Nd" query form).
  Days(i64),
}

/// Fixed order the summary reports periods in.
pub const SUMMARY_PERIODS: [Period; 3] = [Period::Daily, Period::Weekly, Period::Monthly];

impl Period {
  /// Parse the `period` query parameter ("7d", "30d", ...).
  /// Malformed or missing input falls back to 7 days.
  pub fn parse(s: &str) -> Self {
    s.strip_suffix('d')
      .and_then(|n| n.parse::<i64>().ok())
      .filter(|n| *n > 0)
      .map(Period::Days)
      .unwrap_or(Period::Days(7))
  }

  pub fn label(&self) -> String {
    match self {
      Period::Daily => "daily".to_string(),
      Period::Weekly => "weekly".to_string(),
      Period::Monthly => "monthly".to_string(),
      Period::Days(n) => format!("{}d", n),
    }
  }

  /// Resolve this period against a captured `now`.
  pub fn window(&self, now: DateTime<Utc>) -> TimeWindow {
    match self {
      Period::Daily => {
        let today_start = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
        TimeWindow::new(today_start, now)
      }
      Period::Weekly => TimeWindow::last_days(now, 7),
      Period::Monthly => TimeWindow::last_days(now, 30),
      Period::Days(n) => TimeWindow::last_days(now, *n),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn window_is_half_open() {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 6, 8, 0, 0, 0).unwrap();
    let w = TimeWindow::new(start, end);

    assert!(w.contains(start));
    assert!(!w.contains(end));
    assert_eq!(w.length_days(), 7.0);
  }

  #[test]
  fn period_parse_accepts_nd() {
    assert_eq!(Period::parse("14d"), Period::Days(14));
    assert_eq!(Period::parse("7d"), Period::Days(7));
  }

  #[test]
  fn period_parse_falls_back_to_seven_days() {
    assert_eq!(Period::parse("fortnight"), Period::Days(7));
    assert_eq!(Period::parse("0d"), Period::Days(7));
    assert_eq!(Period::parse("-3d"), Period::Days(7));
    assert_eq!(Period::parse(""), Period::Days(7));
  }

  #[test]
  fn daily_window_starts_at_midnight_utc() {
    let now = Utc.with_ymd_and_hms(2025, 6, 15, 13, 45, 12).unwrap();
    let w = Period::Daily.window(now);
    assert_eq!(w.start, Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap());
    assert_eq!(w.end, now);
  }

  #[test]
  fn all_periods_share_one_now() {
    let now = Utc.with_ymd_and_hms(2025, 6, 15, 13, 45, 12).unwrap();
    for period in SUMMARY_PERIODS {
      assert_eq!(period.window(now).end, now);
    }
  }
}
