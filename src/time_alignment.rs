use std::collections::btree_map;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;

use crate::config::DEFAULT_FIRST_DAYS;
use crate::loader::{TimeSeriesTable, VideoAggregate};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days from `publish` to `date`, rounded toward negative infinity, so a
/// record a few hours before publish is day -1.
pub fn days_between(date: NaiveDateTime, publish: NaiveDateTime) -> i64 {
  (date - publish).num_seconds().div_euclid(SECONDS_PER_DAY)
}

pub fn publish_times(videos: &VideoAggregate) -> HashMap<&str, NaiveDateTime> {
  let mut out = HashMap::with_capacity(videos.rows.len());
  for row in videos.rows.iter() {
    if let Some(t) = row.publish_time {
      out.entry(row.title.as_str()).or_insert(t);
    }
  }
  out
}

pub fn compute_days_since_publish(series: &TimeSeriesTable, videos: &VideoAggregate) -> Vec<Option<i64>> {
  let publish = publish_times(videos);
  series
    .rows
    .iter()
    .map(|row| {
      let date = row.date?;
      let published = publish.get(row.title.as_str())?;
      Some(days_between(date, *published))
    })
    .collect()
}

pub fn days_since_publish<'a>(series: &'a TimeSeriesTable, videos: &VideoAggregate) -> &'a [Option<i64>] {
  series
    .days_since_publish
    .get_or_init(|| compute_days_since_publish(series, videos))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CumulativePoint {
  pub day: i64,
  pub cumulative_views: i64,
}

#[derive(Debug, Clone)]
pub struct CumulativeViews<'a> {
  days: btree_map::Range<'a, i64, i64>,
  total: i64,
}

impl Iterator for CumulativeViews<'_> {
  type Item = CumulativePoint;

  fn next(&mut self) -> Option<Self::Item> {
    let (day, views) = self.days.next()?;
    self.total = self.total.saturating_add(*views);
    Some(CumulativePoint {
      day: *day,
      cumulative_views: self.total,
    })
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoAlignment {
  pub title: String,
  pub publish_time: Option<NaiveDateTime>,
  pub last_day: i64,
  daily: BTreeMap<i64, i64>,
}

impl VideoAlignment {
  pub fn daily_views(&self) -> &BTreeMap<i64, i64> {
    &self.daily
  }

  pub fn is_empty(&self) -> bool {
    self.daily.is_empty()
  }

  pub fn cumulative_views(&self) -> CumulativeViews<'_> {
    CumulativeViews {
      days: self.daily.range(0..=self.last_day.max(0)),
      total: 0,
    }
  }

  pub fn cumulative_points(&self) -> Vec<CumulativePoint> {
    self.cumulative_views().collect()
  }
}

pub fn align_within(
  series: &TimeSeriesTable,
  videos: &VideoAggregate,
  video_title: &str,
  last_day: i64,
) -> VideoAlignment {
  let days = days_since_publish(series, videos);

  let mut daily = BTreeMap::new();
  for (row, day) in series.rows.iter().zip(days.iter()) {
    if row.title != video_title {
      continue;
    }
    let Some(day) = day else {
      continue;
    };
    let total = daily.entry(*day).or_insert(0i64);
    *total = total.saturating_add(row.views.unwrap_or(0).max(0));
  }

  VideoAlignment {
    title: video_title.to_string(),
    publish_time: videos.find_by_title(video_title).and_then(|v| v.publish_time),
    last_day,
    daily,
  }
}

pub fn align(series: &TimeSeriesTable, videos: &VideoAggregate, video_title: &str) -> VideoAlignment {
  align_within(series, videos, video_title, DEFAULT_FIRST_DAYS)
}
