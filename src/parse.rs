use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::FieldParseError;
use crate::schema::HeaderMatch;

pub type FieldResult<T> = Result<Option<T>, FieldParseError>;

const DATE_TIME_FORMATS: [&str; 4] = [
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M:%S%.f",
];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%b %d, %Y", "%d %b %Y", "%m/%d/%Y", "%B %d, %Y"];

pub fn normalize_header_name(input: &str) -> String {
  let mut out = String::with_capacity(input.len());
  let mut last_was_sep = false;
  for ch in input.trim().trim_start_matches('\u{feff}').chars() {
    if ch.is_ascii_alphanumeric() {
      out.push(ch.to_ascii_lowercase());
      last_was_sep = false;
    } else if !last_was_sep {
      out.push('_');
      last_was_sep = true;
    }
  }
  out.trim_matches('_').to_string()
}

fn non_empty(raw: &str) -> Option<&str> {
  let trimmed = raw.trim();
  if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
    None
  } else {
    Some(trimmed)
  }
}

pub fn parse_text(raw: &str) -> Option<String> {
  non_empty(raw).map(str::to_string)
}

pub fn parse_f64_field(raw: &str) -> FieldResult<f64> {
  let Some(value) = non_empty(raw) else {
    return Ok(None);
  };
  let cleaned = value.replace(',', "");
  let cleaned = cleaned.trim_end_matches('%');
  match cleaned.parse::<f64>() {
    Ok(v) if v.is_finite() => Ok(Some(v)),
    _ => Err(FieldParseError::Number),
  }
}

/// Counters sometimes arrive as `12.0`; integral floats are accepted.
pub fn parse_i64_field(raw: &str) -> FieldResult<i64> {
  let Some(value) = non_empty(raw) else {
    return Ok(None);
  };
  let cleaned = value.replace(',', "");
  if let Ok(v) = cleaned.parse::<i64>() {
    return Ok(Some(v));
  }
  match cleaned.parse::<f64>() {
    Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(Some(v as i64)),
    Ok(_) => Err(FieldParseError::Integer),
    Err(_) => Err(FieldParseError::Number),
  }
}

pub fn parse_datetime_field(raw: &str) -> FieldResult<NaiveDateTime> {
  let Some(value) = non_empty(raw) else {
    return Ok(None);
  };

  if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
    return Ok(Some(dt.naive_utc()));
  }
  for fmt in DATE_TIME_FORMATS {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
      return Ok(Some(dt));
    }
  }
  for fmt in DATE_FORMATS {
    if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
      return Ok(Some(d.and_time(NaiveTime::MIN)));
    }
  }
  Err(FieldParseError::DateTime)
}

pub fn parse_duration_field(raw: &str) -> FieldResult<NaiveTime> {
  let Some(value) = non_empty(raw) else {
    return Ok(None);
  };
  NaiveTime::parse_from_str(value, "%H:%M:%S")
    .map(Some)
    .map_err(|_| FieldParseError::Duration)
}

pub fn parse_bool_field(raw: &str) -> FieldResult<bool> {
  let Some(value) = non_empty(raw) else {
    return Ok(None);
  };
  match value.to_ascii_lowercase().as_str() {
    "true" | "yes" | "1" | "subscribed" => Ok(Some(true)),
    "false" | "no" | "0" | "not subscribed" | "unsubscribed" => Ok(Some(false)),
    _ => Err(FieldParseError::Boolean),
  }
}

pub fn maybe_gunzip_bytes(input: Vec<u8>) -> Result<Vec<u8>, std::io::Error> {
  use std::io::Read;

  let is_gzip = input.len() >= 2 && input[0] == 0x1f && input[1] == 0x8b;
  if !is_gzip {
    return Ok(input);
  }

  let mut decoder = flate2::read::GzDecoder::new(input.as_slice());
  let mut out = Vec::new();
  decoder.read_to_end(&mut out)?;
  Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
  by_name: HashMap<String, usize>,
}

impl HeaderIndex {
  pub fn new(headers: &csv::StringRecord) -> Self {
    let mut by_name = HashMap::new();
    for (i, h) in headers.iter().enumerate() {
      by_name.entry(normalize_header_name(h)).or_insert(i);
    }
    Self { by_name }
  }

  pub fn find(&self, m: &HeaderMatch) -> Option<usize> {
    m.candidates.iter().find_map(|c| self.by_name.get(*c).copied())
  }

  pub fn missing(&self, matches: &[HeaderMatch]) -> Vec<&'static str> {
    matches
      .iter()
      .filter(|m| m.required && self.find(m).is_none())
      .map(|m| m.column)
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Timelike;

  #[test]
  fn normalizes_export_headers() {
    assert_eq!(normalize_header_name("Video Title"), "video_title");
    assert_eq!(normalize_header_name(" Watch Time (hours) "), "watch_time_hours");
    assert_eq!(normalize_header_name("\u{feff}Date"), "date");
    assert_eq!(normalize_header_name("Is Subscribed"), "is_subscribed");
  }

  #[test]
  fn empty_cells_are_null_without_error() {
    assert_eq!(parse_i64_field(""), Ok(None));
    assert_eq!(parse_f64_field("  "), Ok(None));
    assert_eq!(parse_datetime_field("NaN"), Ok(None));
    assert_eq!(parse_duration_field(""), Ok(None));
  }

  #[test]
  fn numbers_strip_thousands_separators() {
    assert_eq!(parse_i64_field("1,234"), Ok(Some(1234)));
    assert_eq!(parse_i64_field("12.0"), Ok(Some(12)));
    assert_eq!(parse_i64_field("12.5"), Err(FieldParseError::Integer));
    assert_eq!(parse_i64_field("lots"), Err(FieldParseError::Number));
    assert_eq!(parse_f64_field("3,456.25"), Ok(Some(3456.25)));
    assert_eq!(parse_f64_field("inf"), Err(FieldParseError::Number));
  }

  #[test]
  fn date_times_accept_the_export_formats() {
    let iso = parse_datetime_field("2022-01-06 17:32:10").unwrap().unwrap();
    assert_eq!(iso.date(), NaiveDate::from_ymd_opt(2022, 1, 6).unwrap());
    assert_eq!(iso.hour(), 17);

    let rfc = parse_datetime_field("2022-01-06T17:32:10Z").unwrap().unwrap();
    assert_eq!(rfc, iso);

    let short = parse_datetime_field("Jan 6, 2022").unwrap().unwrap();
    assert_eq!(short.date(), NaiveDate::from_ymd_opt(2022, 1, 6).unwrap());

    let day_first = parse_datetime_field("9 Mar 2022").unwrap().unwrap();
    assert_eq!(day_first.date(), NaiveDate::from_ymd_opt(2022, 3, 9).unwrap());

    assert_eq!(parse_datetime_field("not a date"), Err(FieldParseError::DateTime));
  }

  #[test]
  fn durations_must_be_hh_mm_ss() {
    let t = parse_duration_field("00:03:25").unwrap().unwrap();
    assert_eq!(t.num_seconds_from_midnight(), 205);
    assert_eq!(parse_duration_field("3 minutes"), Err(FieldParseError::Duration));
  }

  #[test]
  fn booleans_accept_export_spellings() {
    assert_eq!(parse_bool_field("True"), Ok(Some(true)));
    assert_eq!(parse_bool_field("FALSE"), Ok(Some(false)));
    assert_eq!(parse_bool_field("maybe"), Err(FieldParseError::Boolean));
  }

  #[test]
  fn gunzip_passes_plain_bytes_through() {
    let plain = b"a,b\n1,2\n".to_vec();
    assert_eq!(maybe_gunzip_bytes(plain.clone()).unwrap(), plain);
  }

  #[test]
  fn gunzip_decodes_gzip_bytes() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(b"a,b\n1,2\n").unwrap();
    let gz = enc.finish().unwrap();
    assert_eq!(maybe_gunzip_bytes(gz).unwrap(), b"a,b\n1,2\n".to_vec());
  }
}
