use chrono::{Months, NaiveDate, NaiveDateTime};

use crate::loader::{VideoAggregate, VideoRow};
use crate::video_table::{format_percent, UNDEFINED_TEXT};

pub const RECENT_WINDOW_MONTHS: u32 = 6;
pub const BASELINE_WINDOW_MONTHS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
    (start <= end).then_some(Self { start, end })
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
  Views,
  Likes,
  SubscribersGained,
  Shares,
  CommentsAdded,
  RpmUsd,
  AveragePctViewed,
  AvgDurationSec,
  EngagementRatio,
  ViewsPerSubGained,
}

impl Metric {
  pub const ALL: [Metric; 10] = [
    Metric::Views,
    Metric::Likes,
    Metric::SubscribersGained,
    Metric::Shares,
    Metric::CommentsAdded,
    Metric::RpmUsd,
    Metric::AveragePctViewed,
    Metric::AvgDurationSec,
    Metric::EngagementRatio,
    Metric::ViewsPerSubGained,
  ];

  pub fn label(self) -> &'static str {
    match self {
      Metric::Views => "Views",
      Metric::Likes => "Likes",
      Metric::SubscribersGained => "Subscribers gained",
      Metric::Shares => "Shares",
      Metric::CommentsAdded => "Comments added",
      Metric::RpmUsd => "RPM(USD)",
      Metric::AveragePctViewed => "Average % viewed",
      Metric::AvgDurationSec => "Avg_duration_sec",
      Metric::EngagementRatio => "Engagement_ratio",
      Metric::ViewsPerSubGained => "Views / sub gained",
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      Metric::Views => "Total number of video views",
      Metric::Likes => "Likes received by the video",
      Metric::SubscribersGained => "New subscribers from the video",
      Metric::Shares => "Times the video was shared",
      Metric::CommentsAdded => "Comments posted on the video",
      Metric::RpmUsd => "Revenue per thousand views",
      Metric::AveragePctViewed => "Average percentage of video watched",
      Metric::AvgDurationSec => "Average view duration in seconds",
      Metric::EngagementRatio => "(Comments + Shares + Likes + Dislikes) / Views",
      Metric::ViewsPerSubGained => "Views needed for each subscriber gained",
    }
  }

  pub fn value(self, row: &VideoRow) -> Option<f64> {
    let as_f64 = |v: Option<i64>| v.map(|v| v as f64);
    match self {
      Metric::Views => as_f64(row.views),
      Metric::Likes => as_f64(row.likes),
      Metric::SubscribersGained => as_f64(row.subscribers_gained),
      Metric::Shares => as_f64(row.shares),
      Metric::CommentsAdded => as_f64(row.comments_added),
      Metric::RpmUsd => row.rpm_usd,
      Metric::AveragePctViewed => row.average_pct_viewed,
      Metric::AvgDurationSec => as_f64(row.avg_duration_sec),
      Metric::EngagementRatio => row.engagement_ratio,
      Metric::ViewsPerSubGained => row.views_per_sub_gained,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MetricStat {
  pub metric: Metric,
  pub median_6mo: Option<f64>,
  pub median_12mo: Option<f64>,
  pub delta: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricSummary {
  pub range: DateRange,
  pub rows_in_range: usize,
  /// Latest publish time in range; both windows count back from it.
  pub anchor: Option<NaiveDateTime>,
  pub rows_6mo: usize,
  pub rows_12mo: usize,
  pub metrics: Vec<MetricStat>,
}

impl MetricSummary {
  pub fn get(&self, metric: Metric) -> Option<&MetricStat> {
    self.metrics.iter().find(|m| m.metric == metric)
  }

  pub fn cards(&self) -> Vec<MetricCard> {
    self.metrics.iter().map(MetricCard::from_stat).collect()
  }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricCard {
  pub metric: Metric,
  pub label: &'static str,
  pub description: &'static str,
  pub value: Option<f64>,
  pub delta: Option<f64>,
  pub delta_text: String,
}

impl MetricCard {
  pub fn from_stat(stat: &MetricStat) -> Self {
    Self {
      metric: stat.metric,
      label: stat.metric.label(),
      description: stat.metric.description(),
      value: stat.median_6mo.map(round1),
      delta: stat.delta,
      delta_text: stat
        .delta
        .map(|d| format_percent(d, 2))
        .unwrap_or_else(|| UNDEFINED_TEXT.to_string()),
    }
  }
}

fn round1(v: f64) -> f64 {
  (v * 10.0).round() / 10.0
}

pub fn median<I>(values: I) -> Option<f64>
where
  I: IntoIterator<Item = f64>,
{
  let mut sorted: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
  if sorted.is_empty() {
    return None;
  }
  sorted.sort_by(f64::total_cmp);
  let mid = sorted.len() / 2;
  if sorted.len() % 2 == 0 {
    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
  } else {
    Some(sorted[mid])
  }
}

pub fn relative_delta(recent: Option<f64>, baseline: Option<f64>) -> Option<f64> {
  let baseline = baseline.filter(|b| *b != 0.0)?;
  Some((recent? - baseline) / baseline)
}

pub fn filter_by_range<'a>(videos: &'a VideoAggregate, range: DateRange) -> Vec<&'a VideoRow> {
  videos
    .rows
    .iter()
    .filter(|r| r.publish_time.is_some_and(|t| range.contains(t.date())))
    .collect()
}

pub fn window_cutoff(anchor: NaiveDateTime, months: u32) -> Option<NaiveDateTime> {
  anchor.checked_sub_months(Months::new(months))
}

pub fn trailing_window<'a>(rows: &[&'a VideoRow], anchor: NaiveDateTime, months: u32) -> Vec<&'a VideoRow> {
  let cutoff = window_cutoff(anchor, months);
  rows
    .iter()
    .copied()
    .filter(|r| match (r.publish_time, cutoff) {
      (Some(t), Some(c)) => t >= c,
      (Some(_), None) => true,
      (None, _) => false,
    })
    .collect()
}

fn median_of(rows: &[&VideoRow], metric: Metric) -> Option<f64> {
  median(rows.iter().filter_map(|r| metric.value(r)))
}

pub fn aggregate(videos: &VideoAggregate, range: DateRange) -> MetricSummary {
  let in_range = filter_by_range(videos, range);
  let anchor = in_range.iter().filter_map(|r| r.publish_time).max();

  let (recent, baseline) = match anchor {
    Some(anchor) => (
      trailing_window(&in_range, anchor, RECENT_WINDOW_MONTHS),
      trailing_window(&in_range, anchor, BASELINE_WINDOW_MONTHS),
    ),
    None => (Vec::new(), Vec::new()),
  };

  let metrics = Metric::ALL
    .iter()
    .map(|&metric| {
      let median_6mo = median_of(&recent, metric);
      let median_12mo = median_of(&baseline, metric);
      MetricStat {
        metric,
        median_6mo,
        median_12mo,
        delta: relative_delta(median_6mo, median_12mo),
      }
    })
    .collect();

  MetricSummary {
    range,
    rows_in_range: in_range.len(),
    anchor,
    rows_6mo: recent.len(),
    rows_12mo: baseline.len(),
    metrics,
  }
}
