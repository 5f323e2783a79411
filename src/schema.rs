#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
  Identifier,
  Timestamp,
  Count,
  Currency,
  Percentage,
  Ratio,
  Duration,
}

impl ColumnKind {
  pub fn is_numeric(self) -> bool {
    !matches!(self, ColumnKind::Identifier | ColumnKind::Timestamp)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
  pub name: &'static str,
  pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnDef {
  ColumnDef { name, kind }
}

pub mod agg {
  pub const VIDEO: &str = "Video";
  pub const VIDEO_TITLE: &str = "Video title";
  pub const PUBLISH_TIME: &str = "Video publish time";
  pub const COMMENTS_ADDED: &str = "Comments added";
  pub const SHARES: &str = "Shares";
  pub const DISLIKES: &str = "Dislikes";
  pub const LIKES: &str = "Likes";
  pub const SUBSCRIBERS_LOST: &str = "Subscribers lost";
  pub const SUBSCRIBERS_GAINED: &str = "Subscribers gained";
  pub const RPM_USD: &str = "RPM(USD)";
  pub const CPM_USD: &str = "CPM(USD)";
  pub const AVERAGE_PCT_VIEWED: &str = "Average % viewed";
  pub const AVERAGE_VIEW_DURATION: &str = "Average view duration";
  pub const VIEWS: &str = "Views";
  pub const WATCH_TIME_HOURS: &str = "Watch time (hours)";
  pub const SUBSCRIBERS: &str = "Subscribers";
  pub const ESTIMATED_REVENUE_USD: &str = "Your estimated revenue (USD)";
  pub const IMPRESSIONS: &str = "Impressions";
  pub const IMPRESSIONS_CTR: &str = "Impressions ctr(%)";

  // Derived by the loader.
  pub const AVG_DURATION_SEC: &str = "Avg_duration_sec";
  pub const ENGAGEMENT_RATIO: &str = "Engagement_ratio";
  pub const VIEWS_PER_SUB_GAINED: &str = "Views / sub gained";
}

pub const AGG_COLUMNS: [ColumnDef; 19] = [
  col(agg::VIDEO, ColumnKind::Identifier),
  col(agg::VIDEO_TITLE, ColumnKind::Identifier),
  col(agg::PUBLISH_TIME, ColumnKind::Timestamp),
  col(agg::COMMENTS_ADDED, ColumnKind::Count),
  col(agg::SHARES, ColumnKind::Count),
  col(agg::DISLIKES, ColumnKind::Count),
  col(agg::LIKES, ColumnKind::Count),
  col(agg::SUBSCRIBERS_LOST, ColumnKind::Count),
  col(agg::SUBSCRIBERS_GAINED, ColumnKind::Count),
  col(agg::RPM_USD, ColumnKind::Currency),
  col(agg::CPM_USD, ColumnKind::Currency),
  col(agg::AVERAGE_PCT_VIEWED, ColumnKind::Percentage),
  col(agg::AVERAGE_VIEW_DURATION, ColumnKind::Duration),
  col(agg::VIEWS, ColumnKind::Count),
  col(agg::WATCH_TIME_HOURS, ColumnKind::Ratio),
  col(agg::SUBSCRIBERS, ColumnKind::Count),
  col(agg::ESTIMATED_REVENUE_USD, ColumnKind::Currency),
  col(agg::IMPRESSIONS, ColumnKind::Count),
  col(agg::IMPRESSIONS_CTR, ColumnKind::Percentage),
];

pub fn agg_column_index(name: &str) -> Option<usize> {
  AGG_COLUMNS.iter().position(|c| c.name == name)
}

#[derive(Debug, Clone, Copy)]
pub struct HeaderMatch {
  pub column: &'static str,
  pub candidates: &'static [&'static str],
  pub required: bool,
}

pub mod audience {
  use super::HeaderMatch;

  pub const VIDEO_TITLE: HeaderMatch = HeaderMatch {
    column: "Video Title",
    candidates: &["video_title", "title"],
    required: true,
  };
  pub const VIDEO_ID: HeaderMatch = HeaderMatch {
    column: "External Video ID",
    candidates: &["external_video_id", "video_id", "video"],
    required: false,
  };
  pub const COUNTRY_CODE: HeaderMatch = HeaderMatch {
    column: "Country Code",
    candidates: &["country_code", "country"],
    required: true,
  };
  pub const IS_SUBSCRIBED: HeaderMatch = HeaderMatch {
    column: "Is Subscribed",
    candidates: &["is_subscribed", "subscribed_status", "subscribed"],
    required: true,
  };
  pub const VIEWS: HeaderMatch = HeaderMatch {
    column: "Views",
    candidates: &["views", "view"],
    required: true,
  };

  pub const ALL: [HeaderMatch; 5] = [VIDEO_TITLE, VIDEO_ID, COUNTRY_CODE, IS_SUBSCRIBED, VIEWS];
}

pub mod time_series {
  use super::HeaderMatch;

  pub const VIDEO_TITLE: HeaderMatch = HeaderMatch {
    column: "Video Title",
    candidates: &["video_title", "title"],
    required: true,
  };
  pub const VIDEO_ID: HeaderMatch = HeaderMatch {
    column: "External Video ID",
    candidates: &["external_video_id", "video_id", "video"],
    required: false,
  };
  pub const DATE: HeaderMatch = HeaderMatch {
    column: "Date",
    candidates: &["date", "day"],
    required: true,
  };
  pub const VIEWS: HeaderMatch = HeaderMatch {
    column: "Views",
    candidates: &["views", "view"],
    required: true,
  };
  pub const WATCH_TIME_HOURS: HeaderMatch = HeaderMatch {
    column: "Watch Time (hours)",
    candidates: &["watch_time_hours", "watch_time"],
    required: false,
  };

  pub const ALL: [HeaderMatch; 5] = [VIDEO_TITLE, VIDEO_ID, DATE, VIEWS, WATCH_TIME_HOURS];
}
