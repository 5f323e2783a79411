use std::path::PathBuf;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingDurationPolicy {
  #[default]
  Unknown,
  Zero,
}

impl MissingDurationPolicy {
  pub fn parse(input: &str) -> Option<Self> {
    match input.trim().to_ascii_lowercase().as_str() {
      "unknown" | "null" | "none" => Some(Self::Unknown),
      "zero" | "0" => Some(Self::Zero),
      _ => None,
    }
  }
}

pub const DEFAULT_FIRST_DAYS: i64 = 30;
const MAX_FIRST_DAYS: i64 = 365;

#[derive(Debug, Clone)]
pub struct DashboardConfig {
  pub data_dir: PathBuf,
  pub missing_duration: MissingDurationPolicy,
  pub first_days: i64,
}

impl Default for DashboardConfig {
  fn default() -> Self {
    Self {
      data_dir: PathBuf::from("."),
      missing_duration: MissingDurationPolicy::default(),
      first_days: DEFAULT_FIRST_DAYS,
    }
  }
}

impl DashboardConfig {
  pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
    Self {
      data_dir: data_dir.into(),
      ..Self::default()
    }
  }

  pub fn from_env() -> Self {
    let _ = dotenv::dotenv();
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup<F>(lookup: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    let defaults = Self::default();

    let data_dir = lookup("DASHBOARD_DATA_DIR")
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
      .map(PathBuf::from)
      .unwrap_or(defaults.data_dir);

    let missing_duration = match lookup("DASHBOARD_MISSING_DURATION") {
      Some(raw) => MissingDurationPolicy::parse(&raw).unwrap_or_else(|| {
        warn!(value = %raw, "invalid DASHBOARD_MISSING_DURATION, using default");
        defaults.missing_duration
      }),
      None => defaults.missing_duration,
    };

    let first_days = match lookup("DASHBOARD_FIRST_DAYS") {
      Some(raw) => match raw.trim().parse::<i64>() {
        Ok(v) => v.clamp(1, MAX_FIRST_DAYS),
        Err(_) => {
          warn!(value = %raw, "invalid DASHBOARD_FIRST_DAYS, using default");
          defaults.first_days
        }
      },
      None => defaults.first_days,
    };

    Self {
      data_dir,
      missing_duration,
      first_days,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn defaults_when_nothing_is_set() {
    let cfg = DashboardConfig::from_lookup(lookup_from(&[]));
    assert_eq!(cfg.data_dir, PathBuf::from("."));
    assert_eq!(cfg.missing_duration, MissingDurationPolicy::Unknown);
    assert_eq!(cfg.first_days, 30);
  }

  #[test]
  fn reads_and_clamps_values() {
    let cfg = DashboardConfig::from_lookup(lookup_from(&[
      ("DASHBOARD_DATA_DIR", "/data/export"),
      ("DASHBOARD_MISSING_DURATION", "Zero"),
      ("DASHBOARD_FIRST_DAYS", "9000"),
    ]));
    assert_eq!(cfg.data_dir, PathBuf::from("/data/export"));
    assert_eq!(cfg.missing_duration, MissingDurationPolicy::Zero);
    assert_eq!(cfg.first_days, 365);
  }

  #[test]
  fn invalid_values_fall_back_to_defaults() {
    let cfg = DashboardConfig::from_lookup(lookup_from(&[
      ("DASHBOARD_DATA_DIR", "   "),
      ("DASHBOARD_MISSING_DURATION", "sometimes"),
      ("DASHBOARD_FIRST_DAYS", "thirty"),
    ]));
    assert_eq!(cfg.data_dir, PathBuf::from("."));
    assert_eq!(cfg.missing_duration, MissingDurationPolicy::Unknown);
    assert_eq!(cfg.first_days, 30);
  }
}
