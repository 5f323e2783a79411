use chrono::NaiveDate;

use crate::audience::{audience_bars, AudienceBar};
use crate::loader::{DashboardSnapshot, VideoAggregate};
use crate::metrics::{aggregate, filter_by_range, DateRange, MetricCard, MetricSummary};
use crate::time_alignment::{align_within, CumulativePoint};
use crate::video_table::{format_rows, DisplayTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardMode {
  Aggregate,
  IndividualVideo,
}

impl DashboardMode {
  pub fn parse(input: &str) -> Option<Self> {
    match input.trim().to_ascii_lowercase().as_str() {
      "aggregate" | "aggregate metrics" => Some(Self::Aggregate),
      "video" | "individual" | "individual_video" | "individual video analysis" => Some(Self::IndividualVideo),
      _ => None,
    }
  }
}

pub fn default_date_range(videos: &VideoAggregate) -> Option<DateRange> {
  let mut dates = videos.rows.iter().filter_map(|r| r.publish_time.map(|t| t.date()));
  let first = dates.next()?;
  let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
  DateRange::new(min, max)
}

pub fn video_titles(videos: &VideoAggregate) -> Vec<&str> {
  videos
    .rows
    .iter()
    .map(|r| r.title.as_str())
    .filter(|t| !t.is_empty())
    .collect()
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AggregateView {
  pub range: DateRange,
  pub metric_cards: Vec<MetricCard>,
  pub summary: MetricSummary,
  pub table: DisplayTable,
}

pub fn aggregate_view(snapshot: &DashboardSnapshot, range: Option<DateRange>) -> Option<AggregateView> {
  let range = range.or_else(|| default_date_range(&snapshot.videos))?;

  let summary = aggregate(&snapshot.videos, range);
  let table = format_rows(&filter_by_range(&snapshot.videos, range));

  Some(AggregateView {
    range,
    metric_cards: summary.cards(),
    summary,
    table,
  })
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VideoView {
  pub title: String,
  pub found: bool,
  pub publish_date: Option<NaiveDate>,
  pub audience: Vec<AudienceBar>,
  pub first_days: Vec<CumulativePoint>,
}

pub fn video_view(snapshot: &DashboardSnapshot, title: &str) -> VideoView {
  let video = snapshot.videos.find_by_title(title);
  let aligned = align_within(&snapshot.time_series, &snapshot.videos, title, snapshot.first_days);

  VideoView {
    title: title.to_string(),
    found: video.is_some(),
    publish_date: video.and_then(|v| v.publish_time).map(|t| t.date()),
    audience: audience_bars(&snapshot.audience, title),
    first_days: aligned.cumulative_points(),
  }
}
