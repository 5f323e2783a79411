use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike, Utc};
use tracing::{debug, info, warn};

use crate::audience::CountryBucket;
use crate::config::{DashboardConfig, MissingDurationPolicy};
use crate::error::{LoadError, ParseWarning, SourceKind};
use crate::parse::{
  maybe_gunzip_bytes, parse_bool_field, parse_datetime_field, parse_duration_field, parse_f64_field,
  parse_i64_field, parse_text, FieldResult, HeaderIndex,
};
use crate::schema::{self, agg, AGG_COLUMNS};

const WARNING_SAMPLE_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoRow {
  pub video_id: Option<String>,
  pub title: String,
  pub publish_time: Option<NaiveDateTime>,
  pub comments_added: Option<i64>,
  pub shares: Option<i64>,
  pub dislikes: Option<i64>,
  pub likes: Option<i64>,
  pub subscribers_lost: Option<i64>,
  pub subscribers_gained: Option<i64>,
  pub rpm_usd: Option<f64>,
  pub cpm_usd: Option<f64>,
  /// Percentage scale as exported (87.0 means 87%).
  pub average_pct_viewed: Option<f64>,
  pub average_view_duration: Option<NaiveTime>,
  pub views: Option<i64>,
  pub watch_time_hours: Option<f64>,
  pub subscribers: Option<i64>,
  pub estimated_revenue_usd: Option<f64>,
  pub impressions: Option<i64>,
  pub impressions_ctr: Option<f64>,
  pub avg_duration_sec: Option<i64>,
  pub engagement_ratio: Option<f64>,
  pub views_per_sub_gained: Option<f64>,
}

impl VideoRow {
  pub fn derive(&mut self, policy: MissingDurationPolicy) {
    self.avg_duration_sec = avg_duration_sec(self.average_view_duration, policy);
    self.engagement_ratio = engagement_ratio(
      self.comments_added,
      self.shares,
      self.dislikes,
      self.likes,
      self.views,
    );
    self.views_per_sub_gained = views_per_sub_gained(self.views, self.subscribers_gained);
  }
}

#[derive(Debug, Clone, Default)]
pub struct VideoAggregate {
  pub rows: Vec<VideoRow>,
}

impl VideoAggregate {
  pub fn new(mut rows: Vec<VideoRow>) -> Self {
    sort_by_publish_desc(&mut rows);
    Self { rows }
  }

  pub fn find_by_title(&self, title: &str) -> Option<&VideoRow> {
    self.rows.iter().find(|r| r.title == title)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudienceRow {
  pub title: String,
  pub video_id: Option<String>,
  pub country_code: Option<String>,
  pub country: CountryBucket,
  pub is_subscribed: Option<bool>,
  pub views: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct AudienceTable {
  pub rows: Vec<AudienceRow>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentsTable {
  pub headers: Vec<String>,
  pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRow {
  pub title: String,
  pub video_id: Option<String>,
  pub date: Option<NaiveDateTime>,
  pub views: Option<i64>,
  pub watch_time_hours: Option<f64>,
}

#[derive(Debug, Default)]
pub struct TimeSeriesTable {
  pub rows: Vec<TimeSeriesRow>,
  pub(crate) days_since_publish: OnceLock<Vec<Option<i64>>>,
}

impl TimeSeriesTable {
  pub fn new(rows: Vec<TimeSeriesRow>) -> Self {
    Self {
      rows,
      days_since_publish: OnceLock::new(),
    }
  }

  pub fn has_days_since_publish(&self) -> bool {
    self.days_since_publish.get().is_some()
  }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LoadReport {
  pub rows: BTreeMap<SourceKind, usize>,
  pub warning_count: usize,
  pub warnings_by_column: BTreeMap<String, usize>,
  pub warning_sample: Vec<ParseWarning>,
}

impl LoadReport {
  fn record_rows(&mut self, dataset: SourceKind, n: usize) {
    self.rows.insert(dataset, n);
  }

  fn record_warnings(&mut self, warnings: Vec<ParseWarning>) {
    for w in warnings {
      debug!(warning = %w, "coerced unparseable cell to null");
      self.warning_count += 1;
      *self
        .warnings_by_column
        .entry(format!("{}: {}", w.dataset, w.column))
        .or_insert(0) += 1;
      if self.warning_sample.len() < WARNING_SAMPLE_LIMIT {
        self.warning_sample.push(w);
      }
    }
  }
}

#[derive(Debug)]
pub struct DashboardSnapshot {
  pub videos: VideoAggregate,
  pub audience: AudienceTable,
  pub comments: CommentsTable,
  pub time_series: TimeSeriesTable,
  pub report: LoadReport,
  pub first_days: i64,
  pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SnapshotCache {
  cell: OnceLock<Arc<DashboardSnapshot>>,
}

impl SnapshotCache {
  pub const fn new() -> Self {
    Self { cell: OnceLock::new() }
  }

  pub fn get(&self) -> Option<Arc<DashboardSnapshot>> {
    self.cell.get().cloned()
  }

  pub fn get_or_load(&self, cfg: &DashboardConfig) -> Result<Arc<DashboardSnapshot>, LoadError> {
    if let Some(snapshot) = self.cell.get() {
      return Ok(Arc::clone(snapshot));
    }

    let snapshot = Arc::new(load(cfg)?);
    match self.cell.set(Arc::clone(&snapshot)) {
      Ok(()) => Ok(snapshot),
      // Another caller won the race; everyone reads the first snapshot.
      Err(_) => Ok(self.cell.get().cloned().unwrap_or(snapshot)),
    }
  }

  pub fn clear(&mut self) {
    self.cell.take();
  }
}

pub fn avg_duration_sec(duration: Option<NaiveTime>, policy: MissingDurationPolicy) -> Option<i64> {
  match (duration, policy) {
    (Some(t), _) => Some(i64::from(t.num_seconds_from_midnight())),
    (None, MissingDurationPolicy::Zero) => Some(0),
    (None, MissingDurationPolicy::Unknown) => None,
  }
}

/// `(comments + shares + dislikes + likes) / views`, undefined when views is 0
/// or the interaction total overflows.
pub fn engagement_ratio(
  comments_added: Option<i64>,
  shares: Option<i64>,
  dislikes: Option<i64>,
  likes: Option<i64>,
  views: Option<i64>,
) -> Option<f64> {
  let views = views.filter(|v| *v != 0)?;
  let interactions = comments_added?
    .checked_add(shares?)?
    .checked_add(dislikes?)?
    .checked_add(likes?)?;
  Some(interactions as f64 / views as f64)
}

pub fn views_per_sub_gained(views: Option<i64>, subscribers_gained: Option<i64>) -> Option<f64> {
  let gained = subscribers_gained.filter(|v| *v != 0)?;
  Some(views? as f64 / gained as f64)
}

fn sort_by_publish_desc(rows: &mut [VideoRow]) {
  rows.sort_by(|a, b| match (a.publish_time, b.publish_time) {
    (Some(x), Some(y)) => y.cmp(&x),
    (Some(_), None) => std::cmp::Ordering::Less,
    (None, Some(_)) => std::cmp::Ordering::Greater,
    (None, None) => std::cmp::Ordering::Equal,
  });
}

struct RowReader<'a> {
  dataset: SourceKind,
  row: usize,
  record: &'a csv::StringRecord,
  warnings: Vec<ParseWarning>,
}

impl<'a> RowReader<'a> {
  fn new(dataset: SourceKind, row: usize, record: &'a csv::StringRecord) -> Self {
    Self {
      dataset,
      row,
      record,
      warnings: Vec::new(),
    }
  }

  fn raw(&self, idx: Option<usize>) -> &'a str {
    idx.and_then(|i| self.record.get(i)).unwrap_or("")
  }

  fn text(&self, idx: Option<usize>) -> Option<String> {
    parse_text(self.raw(idx))
  }

  fn field<T>(&mut self, idx: Option<usize>, column: &'static str, parser: fn(&str) -> FieldResult<T>) -> Option<T> {
    let raw = self.raw(idx);
    match parser(raw) {
      Ok(v) => v,
      Err(error) => {
        self.warnings.push(ParseWarning {
          dataset: self.dataset,
          row: self.row,
          column,
          raw: raw.trim().to_string(),
          error,
        });
        None
      }
    }
  }

  fn finish(self) -> Vec<ParseWarning> {
    self.warnings
  }
}

fn open_source(dir: &Path, dataset: SourceKind) -> Result<csv::Reader<Cursor<Vec<u8>>>, LoadError> {
  let path = dir.join(dataset.file_name());
  let bytes = std::fs::read(&path).map_err(|e| LoadError::new(dataset, e))?;
  let decoded = maybe_gunzip_bytes(bytes).map_err(|e| LoadError::new(dataset, e))?;

  Ok(
    csv::ReaderBuilder::new()
      .has_headers(true)
      .flexible(true)
      .from_reader(Cursor::new(decoded)),
  )
}

fn agg_idx(name: &str) -> Option<usize> {
  schema::agg_column_index(name)
}

fn load_videos(dir: &Path, policy: MissingDurationPolicy, report: &mut LoadReport) -> Result<VideoAggregate, LoadError> {
  let dataset = SourceKind::VideoAggregate;
  let mut rdr = open_source(dir, dataset)?;

  let headers = rdr.headers().map_err(|e| LoadError::new(dataset, e))?.clone();
  if headers.len() != AGG_COLUMNS.len() {
    return Err(LoadError::schema(
      dataset,
      format!("expected {} columns, found {}", AGG_COLUMNS.len(), headers.len()),
    ));
  }

  let mut rows = Vec::new();
  // The first data row is the export's channel total, not a video.
  for (i, rec) in rdr.records().enumerate().skip(1) {
    let rec = rec.map_err(|e| LoadError::new(dataset, e))?;
    let mut r = RowReader::new(dataset, i + 1, &rec);

    let mut row = VideoRow {
      video_id: r.text(agg_idx(agg::VIDEO)),
      title: r.text(agg_idx(agg::VIDEO_TITLE)).unwrap_or_default(),
      publish_time: r.field(agg_idx(agg::PUBLISH_TIME), agg::PUBLISH_TIME, parse_datetime_field),
      comments_added: r.field(agg_idx(agg::COMMENTS_ADDED), agg::COMMENTS_ADDED, parse_i64_field),
      shares: r.field(agg_idx(agg::SHARES), agg::SHARES, parse_i64_field),
      dislikes: r.field(agg_idx(agg::DISLIKES), agg::DISLIKES, parse_i64_field),
      likes: r.field(agg_idx(agg::LIKES), agg::LIKES, parse_i64_field),
      subscribers_lost: r.field(agg_idx(agg::SUBSCRIBERS_LOST), agg::SUBSCRIBERS_LOST, parse_i64_field),
      subscribers_gained: r.field(agg_idx(agg::SUBSCRIBERS_GAINED), agg::SUBSCRIBERS_GAINED, parse_i64_field),
      rpm_usd: r.field(agg_idx(agg::RPM_USD), agg::RPM_USD, parse_f64_field),
      cpm_usd: r.field(agg_idx(agg::CPM_USD), agg::CPM_USD, parse_f64_field),
      average_pct_viewed: r.field(agg_idx(agg::AVERAGE_PCT_VIEWED), agg::AVERAGE_PCT_VIEWED, parse_f64_field),
      average_view_duration: r.field(
        agg_idx(agg::AVERAGE_VIEW_DURATION),
        agg::AVERAGE_VIEW_DURATION,
        parse_duration_field,
      ),
      views: r.field(agg_idx(agg::VIEWS), agg::VIEWS, parse_i64_field),
      watch_time_hours: r.field(agg_idx(agg::WATCH_TIME_HOURS), agg::WATCH_TIME_HOURS, parse_f64_field),
      subscribers: r.field(agg_idx(agg::SUBSCRIBERS), agg::SUBSCRIBERS, parse_i64_field),
      estimated_revenue_usd: r.field(
        agg_idx(agg::ESTIMATED_REVENUE_USD),
        agg::ESTIMATED_REVENUE_USD,
        parse_f64_field,
      ),
      impressions: r.field(agg_idx(agg::IMPRESSIONS), agg::IMPRESSIONS, parse_i64_field),
      impressions_ctr: r.field(agg_idx(agg::IMPRESSIONS_CTR), agg::IMPRESSIONS_CTR, parse_f64_field),
      ..VideoRow::default()
    };
    row.derive(policy);

    report.record_warnings(r.finish());
    rows.push(row);
  }

  report.record_rows(dataset, rows.len());
  Ok(VideoAggregate::new(rows))
}

fn header_index(
  rdr: &mut csv::Reader<Cursor<Vec<u8>>>,
  dataset: SourceKind,
  matches: &[schema::HeaderMatch],
) -> Result<HeaderIndex, LoadError> {
  let headers = rdr.headers().map_err(|e| LoadError::new(dataset, e))?;
  let idx = HeaderIndex::new(headers);
  let missing = idx.missing(matches);
  if !missing.is_empty() {
    return Err(LoadError::schema(
      dataset,
      format!("missing required columns: {}", missing.join(", ")),
    ));
  }
  Ok(idx)
}

fn load_audience(dir: &Path, report: &mut LoadReport) -> Result<AudienceTable, LoadError> {
  use schema::audience as col;

  let dataset = SourceKind::AudienceBySubscriptionAndCountry;
  let mut rdr = open_source(dir, dataset)?;
  let idx = header_index(&mut rdr, dataset, &col::ALL)?;

  let mut rows = Vec::new();
  for (i, rec) in rdr.records().enumerate() {
    let rec = rec.map_err(|e| LoadError::new(dataset, e))?;
    let mut r = RowReader::new(dataset, i + 1, &rec);

    let country_code = r.text(idx.find(&col::COUNTRY_CODE));
    let row = AudienceRow {
      title: r.text(idx.find(&col::VIDEO_TITLE)).unwrap_or_default(),
      video_id: r.text(idx.find(&col::VIDEO_ID)),
      country: CountryBucket::from_country_code(country_code.as_deref()),
      country_code,
      is_subscribed: r.field(idx.find(&col::IS_SUBSCRIBED), col::IS_SUBSCRIBED.column, parse_bool_field),
      views: r.field(idx.find(&col::VIEWS), col::VIEWS.column, parse_i64_field),
    };

    report.record_warnings(r.finish());
    rows.push(row);
  }

  report.record_rows(dataset, rows.len());
  Ok(AudienceTable { rows })
}

fn load_comments(dir: &Path, report: &mut LoadReport) -> Result<CommentsTable, LoadError> {
  let dataset = SourceKind::Comments;
  let mut rdr = open_source(dir, dataset)?;

  let headers: Vec<String> = rdr
    .headers()
    .map_err(|e| LoadError::new(dataset, e))?
    .iter()
    .map(str::to_string)
    .collect();

  let mut rows: Vec<Vec<String>> = Vec::new();
  for rec in rdr.records() {
    let rec = rec.map_err(|e| LoadError::new(dataset, e))?;
    rows.push(rec.iter().map(str::to_string).collect());
  }

  report.record_rows(dataset, rows.len());
  Ok(CommentsTable { headers, rows })
}

fn load_time_series(dir: &Path, report: &mut LoadReport) -> Result<TimeSeriesTable, LoadError> {
  use schema::time_series as col;

  let dataset = SourceKind::TimeSeries;
  let mut rdr = open_source(dir, dataset)?;
  let idx = header_index(&mut rdr, dataset, &col::ALL)?;

  let mut rows = Vec::new();
  for (i, rec) in rdr.records().enumerate() {
    let rec = rec.map_err(|e| LoadError::new(dataset, e))?;
    let mut r = RowReader::new(dataset, i + 1, &rec);

    let row = TimeSeriesRow {
      title: r.text(idx.find(&col::VIDEO_TITLE)).unwrap_or_default(),
      video_id: r.text(idx.find(&col::VIDEO_ID)),
      date: r.field(idx.find(&col::DATE), col::DATE.column, parse_datetime_field),
      views: r.field(idx.find(&col::VIEWS), col::VIEWS.column, parse_i64_field),
      watch_time_hours: r.field(
        idx.find(&col::WATCH_TIME_HOURS),
        col::WATCH_TIME_HOURS.column,
        parse_f64_field,
      ),
    };

    report.record_warnings(r.finish());
    rows.push(row);
  }

  report.record_rows(dataset, rows.len());
  Ok(TimeSeriesTable::new(rows))
}

pub fn load(cfg: &DashboardConfig) -> Result<DashboardSnapshot, LoadError> {
  let dir = cfg.data_dir.as_path();
  let mut report = LoadReport::default();

  let videos = load_videos(dir, cfg.missing_duration, &mut report)?;
  let audience = load_audience(dir, &mut report)?;
  let comments = load_comments(dir, &mut report)?;
  let time_series = load_time_series(dir, &mut report)?;

  if report.warning_count > 0 {
    warn!(
      warnings = report.warning_count,
      columns = ?report.warnings_by_column,
      "some cells could not be parsed and were set to null"
    );
  }
  info!(
    data_dir = %dir.display(),
    videos = videos.rows.len(),
    audience_rows = audience.rows.len(),
    comments = comments.rows.len(),
    time_series_rows = time_series.rows.len(),
    "loaded dashboard snapshot"
  );

  Ok(DashboardSnapshot {
    videos,
    audience,
    comments,
    time_series,
    report,
    first_days: cfg.first_days,
    loaded_at: Utc::now(),
  })
}
