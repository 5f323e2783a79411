use std::sync::Arc;

use chrono::NaiveDate;
use hyper::{Method, StatusCode, Uri};
use tracing::{error, info};
use vercel_runtime::{run, service_fn, Error, Request, Response, ResponseBody};

use channel_dashboard_rust::config::DashboardConfig;
use channel_dashboard_rust::dashboard::{aggregate_view, default_date_range, video_titles, video_view};
use channel_dashboard_rust::loader::{DashboardSnapshot, SnapshotCache};
use channel_dashboard_rust::metrics::DateRange;
use channel_dashboard_rust::telemetry::init_tracing;

static SNAPSHOT: SnapshotCache = SnapshotCache::new();

fn json_response(status: StatusCode, value: serde_json::Value) -> Result<Response<ResponseBody>, Error> {
  Ok(
    Response::builder()
      .status(status)
      .header("content-type", "application/json; charset=utf-8")
      .body(ResponseBody::from(value))?,
  )
}

fn bad_request(message: &str) -> Result<Response<ResponseBody>, Error> {
  json_response(
    StatusCode::BAD_REQUEST,
    serde_json::json!({"ok": false, "error": "bad_request", "message": message}),
  )
}

fn method_not_allowed() -> Result<Response<ResponseBody>, Error> {
  json_response(
    StatusCode::METHOD_NOT_ALLOWED,
    serde_json::json!({"ok": false, "error": "method_not_allowed"}),
  )
}

fn hex_value(b: u8) -> Option<u8> {
  char::from(b).to_digit(16).and_then(|d| u8::try_from(d).ok())
}

fn percent_decode(input: &str) -> Option<String> {
  let mut out: Vec<u8> = Vec::with_capacity(input.len());
  let mut bytes = input.bytes();
  while let Some(b) = bytes.next() {
    match b {
      b'%' => {
        let hi = bytes.next().and_then(hex_value)?;
        let lo = bytes.next().and_then(hex_value)?;
        out.push(hi * 16 + lo);
      }
      b'+' => out.push(b' '),
      other => out.push(other),
    }
  }
  String::from_utf8(out).ok()
}

// Undecodable values are passed through raw.
fn get_query_param(uri: &Uri, key: &str) -> Option<String> {
  uri.query()?.split('&').find_map(|pair| {
    let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
    (k == key).then(|| percent_decode(v).unwrap_or_else(|| v.to_string()))
  })
}

fn date_param(uri: &Uri, key: &str) -> Result<Option<NaiveDate>, String> {
  let Some(raw) = get_query_param(uri, key) else {
    return Ok(None);
  };
  let raw = raw.trim();
  if raw.is_empty() {
    return Ok(None);
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .map(Some)
    .map_err(|_| format!("{key} must be YYYY-MM-DD"))
}

fn load_snapshot(
  cache: &SnapshotCache,
  cfg: &DashboardConfig,
) -> Result<Arc<DashboardSnapshot>, Result<Response<ResponseBody>, Error>> {
  cache.get_or_load(cfg).map_err(|e| {
    error!(dataset = %e.dataset, error = %e, "dashboard load failed");
    json_response(
      StatusCode::INTERNAL_SERVER_ERROR,
      serde_json::json!({
        "ok": false,
        "error": "load_failed",
        "dataset": e.dataset,
        "message": e.to_string(),
      }),
    )
  })
}

async fn handle_titles(
  method: &Method,
  cache: &SnapshotCache,
  cfg: &DashboardConfig,
) -> Result<Response<ResponseBody>, Error> {
  if method != Method::GET {
    return method_not_allowed();
  }

  let snapshot = match load_snapshot(cache, cfg) {
    Ok(s) => s,
    Err(resp) => return resp,
  };

  let range = default_date_range(&snapshot.videos);
  json_response(
    StatusCode::OK,
    serde_json::json!({
      "ok": true,
      "titles": video_titles(&snapshot.videos),
      "default_range": serde_json::to_value(range)?,
      "report": serde_json::to_value(&snapshot.report)?,
      "loaded_at": snapshot.loaded_at.to_rfc3339(),
    }),
  )
}

async fn handle_aggregate(
  method: &Method,
  uri: &Uri,
  cache: &SnapshotCache,
  cfg: &DashboardConfig,
) -> Result<Response<ResponseBody>, Error> {
  if method != Method::GET {
    return method_not_allowed();
  }

  let start = match date_param(uri, "start_dt") {
    Ok(v) => v,
    Err(message) => return bad_request(&message),
  };
  let end = match date_param(uri, "end_dt") {
    Ok(v) => v,
    Err(message) => return bad_request(&message),
  };
  if let (Some(s), Some(e)) = (start, end) {
    if s > e {
      return bad_request("start_dt must not be after end_dt");
    }
  }

  let snapshot = match load_snapshot(cache, cfg) {
    Ok(s) => s,
    Err(resp) => return resp,
  };

  // A missing bound falls back to the matching end of the full publish span.
  let range = match (start, end) {
    (None, None) => None,
    (start, end) => {
      let full = default_date_range(&snapshot.videos);
      let s = start.or(full.map(|r| r.start)).or(end);
      let e = end.or(full.map(|r| r.end)).or(start);
      match s.zip(e).and_then(|(s, e)| DateRange::new(s, e)) {
        Some(r) => Some(r),
        None => return bad_request("start_dt must not be after end_dt"),
      }
    }
  };

  let view = aggregate_view(&snapshot, range);
  info!(
    range = ?view.as_ref().map(|v| v.range),
    rows = view.as_ref().map(|v| v.table.rows.len()).unwrap_or(0),
    "aggregate view"
  );

  json_response(
    StatusCode::OK,
    serde_json::json!({"ok": true, "view": serde_json::to_value(view)?}),
  )
}

async fn handle_video(
  method: &Method,
  uri: &Uri,
  cache: &SnapshotCache,
  cfg: &DashboardConfig,
) -> Result<Response<ResponseBody>, Error> {
  if method != Method::GET {
    return method_not_allowed();
  }

  let title = get_query_param(uri, "title").unwrap_or_default();
  if title.trim().is_empty() {
    return bad_request("title is required");
  }

  let snapshot = match load_snapshot(cache, cfg) {
    Ok(s) => s,
    Err(resp) => return resp,
  };

  let view = video_view(&snapshot, &title);
  info!(title = %view.title, found = view.found, points = view.first_days.len(), "video view");

  json_response(
    StatusCode::OK,
    serde_json::json!({"ok": true, "view": serde_json::to_value(view)?}),
  )
}

async fn handler(req: Request) -> Result<Response<ResponseBody>, Error> {
  let action = get_query_param(req.uri(), "action").unwrap_or_default();
  let cfg = DashboardConfig::from_env();

  match action.as_str() {
    "titles" => handle_titles(req.method(), &SNAPSHOT, &cfg).await,
    "aggregate" => handle_aggregate(req.method(), req.uri(), &SNAPSHOT, &cfg).await,
    "video" => handle_video(req.method(), req.uri(), &SNAPSHOT, &cfg).await,
    "" => bad_request("action is required"),
    _ => json_response(
      StatusCode::NOT_FOUND,
      serde_json::json!({"ok": false, "error": "not_found"}),
    ),
  }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
  init_tracing();
  run(service_fn(handler)).await
}

#[cfg(test)]
mod tests {
  use super::*;

  fn missing_dir_config() -> DashboardConfig {
    DashboardConfig::with_data_dir("/nonexistent/dashboard-data")
  }

  fn write_fixtures(dir: &std::path::Path) {
    let agg = "\
Video,Video title,Video publish time,Comments added,Shares,Dislikes,Likes,Subscribers lost,Subscribers gained,RPM(USD),CPM(USD),Average % viewed,Average view duration,Views,Watch time (hours),Subscribers,Your estimated revenue (USD),Impressions,Impressions ctr(%)
Total,,,10,10,0,80,1,20,4.0,8.0,50.0,00:04:00,2000,100.0,19,8.0,20000,5.0
v1,First,2022-03-09,10,5,1,84,0,4,4.6,8.1,51.2,00:03:25,1000,57.0,4,4.6,9000,4.9
";
    std::fs::write(dir.join("Aggregated_Metrics_By_Video.csv"), agg).unwrap();
    std::fs::write(
      dir.join("Aggregated_Metrics_By_Country_And_Subscriber_Status.csv"),
      "Video Title,External Video ID,Country Code,Is Subscribed,Views\nFirst,v1,US,True,40\n",
    )
    .unwrap();
    std::fs::write(dir.join("All_Comments_Final.csv"), "Comments,VidId\nnice,v1\n").unwrap();
    std::fs::write(
      dir.join("Video_Performance_Over_Time.csv"),
      "Date,Video Title,External Video ID,Views\n2022-03-10,First,v1,30\n",
    )
    .unwrap();
  }

  #[tokio::test]
  async fn aggregate_rejects_non_get() {
    let uri: Uri = "/api/dashboard?action=aggregate".parse().unwrap();
    let cache = SnapshotCache::new();
    let response = handle_aggregate(&Method::POST, &uri, &cache, &missing_dir_config())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
  }

  #[tokio::test]
  async fn aggregate_rejects_malformed_dates_before_loading() {
    let uri: Uri = "/api/dashboard?action=aggregate&start_dt=03%2F09%2F2022".parse().unwrap();
    let cache = SnapshotCache::new();
    let response = handle_aggregate(&Method::GET, &uri, &cache, &missing_dir_config())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(cache.get().is_none());
  }

  #[tokio::test]
  async fn aggregate_rejects_inverted_range() {
    let uri: Uri = "/api/dashboard?action=aggregate&start_dt=2022-05-01&end_dt=2022-01-01"
      .parse()
      .unwrap();
    let cache = SnapshotCache::new();
    let response = handle_aggregate(&Method::GET, &uri, &cache, &missing_dir_config())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn video_requires_title() {
    let uri: Uri = "/api/dashboard?action=video&title=".parse().unwrap();
    let cache = SnapshotCache::new();
    let response = handle_video(&Method::GET, &uri, &cache, &missing_dir_config())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn missing_data_dir_is_a_load_failure() {
    let cache = SnapshotCache::new();
    let response = handle_titles(&Method::GET, &cache, &missing_dir_config()).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(cache.get().is_none());
  }

  #[tokio::test]
  async fn loads_once_and_serves_every_action() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let cfg = DashboardConfig::with_data_dir(dir.path());
    let cache = SnapshotCache::new();

    let titles = handle_titles(&Method::GET, &cache, &cfg).await.unwrap();
    assert_eq!(titles.status(), StatusCode::OK);
    let first = cache.get().unwrap();

    let uri: Uri = "/api/dashboard?action=aggregate&start_dt=2022-01-01".parse().unwrap();
    let aggregate = handle_aggregate(&Method::GET, &uri, &cache, &cfg).await.unwrap();
    assert_eq!(aggregate.status(), StatusCode::OK);

    let uri: Uri = "/api/dashboard?action=video&title=First".parse().unwrap();
    let video = handle_video(&Method::GET, &uri, &cache, &cfg).await.unwrap();
    assert_eq!(video.status(), StatusCode::OK);

    assert!(Arc::ptr_eq(&first, &cache.get().unwrap()));
  }

  #[test]
  fn query_params_are_percent_decoded() {
    let uri: Uri = "/api/dashboard?action=video&title=Rust%20in+Prod".parse().unwrap();
    assert_eq!(get_query_param(&uri, "title").as_deref(), Some("Rust in Prod"));
    assert_eq!(get_query_param(&uri, "missing"), None);
  }

  #[test]
  fn malformed_escapes_pass_through_raw() {
    let uri: Uri = "/api/dashboard?title=100%2&flag&title2=%e2%82%ac".parse().unwrap();
    assert_eq!(get_query_param(&uri, "title").as_deref(), Some("100%2"));
    assert_eq!(get_query_param(&uri, "flag").as_deref(), Some(""));
    assert_eq!(get_query_param(&uri, "title2").as_deref(), Some("\u{20ac}"));
    assert_eq!(percent_decode("%zz"), None);
  }
}
