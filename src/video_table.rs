use chrono::NaiveDate;

use crate::loader::{VideoAggregate, VideoRow};
use crate::schema::{agg, ColumnKind};

pub const UNDEFINED_TEXT: &str = "—";

pub const PUBLISH_DATE: &str = "Publish_date";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DisplayColumn {
  pub name: &'static str,
  pub kind: ColumnKind,
}

const fn column(name: &'static str, kind: ColumnKind) -> DisplayColumn {
  DisplayColumn { name, kind }
}

pub const DISPLAY_COLUMNS: [DisplayColumn; 12] = [
  column(agg::VIDEO_TITLE, ColumnKind::Identifier),
  column(PUBLISH_DATE, ColumnKind::Timestamp),
  column(agg::VIEWS, ColumnKind::Count),
  column(agg::LIKES, ColumnKind::Count),
  column(agg::SUBSCRIBERS, ColumnKind::Count),
  column(agg::SHARES, ColumnKind::Count),
  column(agg::COMMENTS_ADDED, ColumnKind::Count),
  column(agg::RPM_USD, ColumnKind::Currency),
  column(agg::AVERAGE_PCT_VIEWED, ColumnKind::Percentage),
  column(agg::AVG_DURATION_SEC, ColumnKind::Duration),
  column(agg::ENGAGEMENT_RATIO, ColumnKind::Percentage),
  column(agg::VIEWS_PER_SUB_GAINED, ColumnKind::Ratio),
];

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum CellValue {
  Text(String),
  Date(NaiveDate),
  Number(f64),
  Undefined,
}

impl CellValue {
  fn from_count(v: Option<i64>) -> Self {
    v.map(|v| CellValue::Number(v as f64)).unwrap_or(CellValue::Undefined)
  }

  fn from_decimal(v: Option<f64>) -> Self {
    match v {
      Some(v) if !v.is_nan() => CellValue::Number(v),
      _ => CellValue::Undefined,
    }
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      CellValue::Number(v) => Some(*v),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStyle {
  Negative,
  Positive,
}

pub fn classify(value: &CellValue) -> Option<CellStyle> {
  let v = value.as_number()?;
  if v < 0.0 {
    Some(CellStyle::Negative)
  } else if v > 0.0 {
    Some(CellStyle::Positive)
  } else {
    None
  }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DisplayCell {
  pub value: CellValue,
  pub text: String,
  pub style: Option<CellStyle>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DisplayTable {
  pub columns: Vec<DisplayColumn>,
  pub rows: Vec<Vec<DisplayCell>>,
}

impl DisplayTable {
  pub fn column_index(&self, name: &str) -> Option<usize> {
    self.columns.iter().position(|c| c.name == name)
  }

  pub fn cell(&self, row: usize, name: &str) -> Option<&DisplayCell> {
    let idx = self.column_index(name)?;
    self.rows.get(row)?.get(idx)
  }
}

fn group_thousands(digits: &str) -> String {
  let mut out = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, ch) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      out.push(',');
    }
    out.push(ch);
  }
  out
}

pub fn format_whole(value: f64) -> String {
  let digits = format!("{:.0}", value.abs());
  let grouped = group_thousands(&digits);
  if value < 0.0 && digits != "0" {
    format!("-{grouped}")
  } else {
    grouped
  }
}

pub fn format_percent(fraction: f64, decimals: usize) -> String {
  format!("{:.*}%", decimals, fraction * 100.0)
}

/// Exported percentages are on a 0-100 scale and occasionally exceed 100.
pub fn normalize_pct_viewed(pct: f64) -> f64 {
  (pct / 100.0).min(1.0)
}

pub fn render(value: &CellValue, kind: ColumnKind) -> String {
  match (value, kind) {
    (CellValue::Undefined, _) => UNDEFINED_TEXT.to_string(),
    (CellValue::Text(s), _) => s.clone(),
    (CellValue::Date(d), _) => d.format("%Y-%m-%d").to_string(),
    (CellValue::Number(v), ColumnKind::Percentage) => format_percent(*v, 1),
    (CellValue::Number(v), _) => format_whole(*v),
  }
}

fn row_values(row: &VideoRow) -> [CellValue; 12] {
  [
    CellValue::Text(row.title.clone()),
    row
      .publish_time
      .map(|t| CellValue::Date(t.date()))
      .unwrap_or(CellValue::Undefined),
    CellValue::from_count(row.views),
    CellValue::from_count(row.likes),
    CellValue::from_count(row.subscribers),
    CellValue::from_count(row.shares),
    CellValue::from_count(row.comments_added),
    CellValue::from_decimal(row.rpm_usd),
    CellValue::from_decimal(row.average_pct_viewed.map(normalize_pct_viewed)),
    CellValue::from_count(row.avg_duration_sec),
    CellValue::from_decimal(row.engagement_ratio),
    CellValue::from_decimal(row.views_per_sub_gained),
  ]
}

pub fn format_rows(rows: &[&VideoRow]) -> DisplayTable {
  let rows = rows
    .iter()
    .map(|row| {
      row_values(row)
        .into_iter()
        .zip(DISPLAY_COLUMNS.iter())
        .map(|(value, col)| DisplayCell {
          text: render(&value, col.kind),
          style: classify(&value),
          value,
        })
        .collect()
    })
    .collect();

  DisplayTable {
    columns: DISPLAY_COLUMNS.to_vec(),
    rows,
  }
}

pub fn format(videos: &VideoAggregate) -> DisplayTable {
  let rows: Vec<&VideoRow> = videos.rows.iter().collect();
  format_rows(&rows)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_row() -> VideoRow {
    VideoRow {
      title: "Intro to Rust".to_string(),
      publish_time: NaiveDate::from_ymd_opt(2022, 3, 9).unwrap().and_hms_opt(15, 0, 0),
      views: Some(1_234_567),
      likes: Some(0),
      subscribers: Some(-3),
      shares: Some(12),
      comments_added: Some(4),
      rpm_usd: Some(4.6),
      average_pct_viewed: Some(112.0),
      avg_duration_sec: Some(205),
      engagement_ratio: Some(0.0421),
      views_per_sub_gained: Some(1499.6),
      ..VideoRow::default()
    }
  }

  #[test]
  fn whole_numbers_are_comma_grouped() {
    assert_eq!(format_whole(0.0), "0");
    assert_eq!(format_whole(999.0), "999");
    assert_eq!(format_whole(1000.0), "1,000");
    assert_eq!(format_whole(1_234_567.0), "1,234,567");
    assert_eq!(format_whole(-45_000.2), "-45,000");
    assert_eq!(format_whole(-0.2), "0");
  }

  #[test]
  fn percentages_use_requested_precision() {
    assert_eq!(format_percent(0.871, 1), "87.1%");
    assert_eq!(format_percent(0.0, 1), "0.0%");
    assert_eq!(format_percent(-0.25, 2), "-25.00%");
  }

  #[test]
  fn pct_viewed_is_scaled_and_capped() {
    assert_eq!(normalize_pct_viewed(87.0), 0.87);
    assert_eq!(normalize_pct_viewed(100.0), 1.0);
    assert_eq!(normalize_pct_viewed(250.0), 1.0);
    for pct in [0.0, 0.5, 42.0, 99.9, 100.0, 100.1, 1e9] {
      let v = normalize_pct_viewed(pct);
      assert!((0.0..=1.0).contains(&v), "{pct} -> {v}");
    }
  }

  #[test]
  fn renders_each_column_by_kind() {
    let row = sample_row();
    let table = format_rows(&[&row]);

    assert_eq!(table.columns.len(), 12);
    assert_eq!(table.cell(0, agg::VIDEO_TITLE).unwrap().text, "Intro to Rust");
    assert_eq!(table.cell(0, PUBLISH_DATE).unwrap().text, "2022-03-09");
    assert_eq!(table.cell(0, agg::VIEWS).unwrap().text, "1,234,567");
    assert_eq!(table.cell(0, agg::RPM_USD).unwrap().text, "5");
    assert_eq!(table.cell(0, agg::AVERAGE_PCT_VIEWED).unwrap().text, "100.0%");
    assert_eq!(table.cell(0, agg::AVERAGE_PCT_VIEWED).unwrap().value, CellValue::Number(1.0));
    assert_eq!(table.cell(0, agg::ENGAGEMENT_RATIO).unwrap().text, "4.2%");
    assert_eq!(table.cell(0, agg::VIEWS_PER_SUB_GAINED).unwrap().text, "1,500");
    assert_eq!(table.cell(0, agg::AVG_DURATION_SEC).unwrap().text, "205");
  }

  #[test]
  fn styles_follow_sign_of_numeric_cells() {
    let row = sample_row();
    let table = format_rows(&[&row]);

    assert_eq!(table.cell(0, agg::SUBSCRIBERS).unwrap().style, Some(CellStyle::Negative));
    assert_eq!(table.cell(0, agg::VIEWS).unwrap().style, Some(CellStyle::Positive));
    assert_eq!(table.cell(0, agg::LIKES).unwrap().style, None);
    assert_eq!(table.cell(0, agg::VIDEO_TITLE).unwrap().style, None);
    assert_eq!(table.cell(0, PUBLISH_DATE).unwrap().style, None);
  }

  #[test]
  fn undefined_engagement_renders_distinctly_from_zero() {
    let undefined = VideoRow {
      engagement_ratio: None,
      ..sample_row()
    };
    let zero = VideoRow {
      engagement_ratio: Some(0.0),
      ..sample_row()
    };
    let table = format_rows(&[&undefined, &zero]);

    let a = table.cell(0, agg::ENGAGEMENT_RATIO).unwrap();
    let b = table.cell(1, agg::ENGAGEMENT_RATIO).unwrap();
    assert_eq!(a.value, CellValue::Undefined);
    assert_eq!(a.text, UNDEFINED_TEXT);
    assert_eq!(a.style, None);
    assert_eq!(b.text, "0.0%");
    assert_ne!(a.text, b.text);
  }

  #[test]
  fn formatting_does_not_touch_the_source_rows() {
    let videos = VideoAggregate::new(vec![sample_row()]);
    let _ = format(&videos);
    assert_eq!(videos.rows[0].average_pct_viewed, Some(112.0));
  }

  #[test]
  fn undefined_cells_serialize_as_null() {
    let cell = DisplayCell {
      value: CellValue::Undefined,
      text: UNDEFINED_TEXT.to_string(),
      style: None,
    };
    let json = serde_json::to_value(&cell).unwrap();
    assert!(json["value"].is_null());
  }
}
