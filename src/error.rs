use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
  VideoAggregate,
  AudienceBySubscriptionAndCountry,
  Comments,
  TimeSeries,
}

impl SourceKind {
  pub const ALL: [SourceKind; 4] = [
    SourceKind::VideoAggregate,
    SourceKind::AudienceBySubscriptionAndCountry,
    SourceKind::Comments,
    SourceKind::TimeSeries,
  ];

  pub fn file_name(self) -> &'static str {
    match self {
      SourceKind::VideoAggregate => "Aggregated_Metrics_By_Video.csv",
      SourceKind::AudienceBySubscriptionAndCountry => "Aggregated_Metrics_By_Country_And_Subscriber_Status.csv",
      SourceKind::Comments => "All_Comments_Final.csv",
      SourceKind::TimeSeries => "Video_Performance_Over_Time.csv",
    }
  }
}

impl fmt::Display for SourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.file_name())
  }
}

#[derive(Debug, Error)]
pub enum LoadErrorKind {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid csv: {0}")]
  Csv(#[from] csv::Error),

  #[error("schema mismatch: {0}")]
  Schema(String),
}

#[derive(Debug, Error)]
#[error("failed to load {dataset}: {kind}")]
pub struct LoadError {
  pub dataset: SourceKind,
  #[source]
  pub kind: LoadErrorKind,
}

impl LoadError {
  pub fn new(dataset: SourceKind, kind: impl Into<LoadErrorKind>) -> Self {
    Self {
      dataset,
      kind: kind.into(),
    }
  }

  pub fn schema(dataset: SourceKind, message: impl Into<String>) -> Self {
    Self::new(dataset, LoadErrorKind::Schema(message.into()))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldParseError {
  #[error("not a number")]
  Number,
  #[error("not a whole number")]
  Integer,
  #[error("not a date-time")]
  DateTime,
  #[error("not an HH:MM:SS duration")]
  Duration,
  #[error("not a boolean")]
  Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParseWarning {
  pub dataset: SourceKind,
  /// 1-based data row within the source, header excluded.
  pub row: usize,
  pub column: &'static str,
  pub raw: String,
  pub error: FieldParseError,
}

impl fmt::Display for ParseWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} row {} column {:?}: {} ({:?})",
      self.dataset, self.row, self.column, self.error, self.raw
    )
  }
}
