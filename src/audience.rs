use std::collections::BTreeMap;

use crate::loader::AudienceTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum CountryBucket {
  #[serde(rename = "USA")]
  Usa,
  India,
  Other,
}

impl CountryBucket {
  pub fn from_country_code(code: Option<&str>) -> Self {
    match code {
      Some("US") => CountryBucket::Usa,
      Some("IN") => CountryBucket::India,
      _ => CountryBucket::Other,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      CountryBucket::Usa => "USA",
      CountryBucket::India => "India",
      CountryBucket::Other => "Other",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AudienceBar {
  pub is_subscribed: bool,
  pub country: CountryBucket,
  pub views: i64,
}

pub fn audience_bars(audience: &AudienceTable, title: &str) -> Vec<AudienceBar> {
  let mut grouped: BTreeMap<(bool, CountryBucket), i64> = BTreeMap::new();

  for row in audience.rows.iter().filter(|r| r.title == title) {
    let Some(is_subscribed) = row.is_subscribed else {
      continue;
    };
    let total = grouped.entry((is_subscribed, row.country)).or_insert(0);
    *total = total.saturating_add(row.views.unwrap_or(0).max(0));
  }

  grouped
    .into_iter()
    .map(|((is_subscribed, country), views)| AudienceBar {
      is_subscribed,
      country,
      views,
    })
    .collect()
}
