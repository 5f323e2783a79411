use chrono::NaiveDate;
use vercel_runtime::Error;

use channel_dashboard_rust::config::DashboardConfig;
use channel_dashboard_rust::dashboard::{aggregate_view, video_titles, video_view, DashboardMode};
use channel_dashboard_rust::loader::load;
use channel_dashboard_rust::metrics::DateRange;
use channel_dashboard_rust::telemetry::init_tracing;

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
  args
    .iter()
    .position(|a| a == flag)
    .and_then(|idx| args.get(idx + 1))
    .cloned()
}

fn parse_date_flag(args: &[String], flag: &str) -> Result<Option<NaiveDate>, Error> {
  let Some(raw) = parse_flag_value(args, flag) else {
    return Ok(None);
  };
  NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
    .map(Some)
    .map_err(|e| Box::new(std::io::Error::other(format!("invalid {flag} {raw:?}: {e}"))) as Error)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
  init_tracing();
  let args: Vec<String> = std::env::args().collect();

  let mut cfg = DashboardConfig::from_env();
  if let Some(dir) = parse_flag_value(&args, "--data-dir") {
    cfg.data_dir = dir.into();
  }

  let mode_raw = parse_flag_value(&args, "--mode").unwrap_or_else(|| "aggregate".to_string());
  let Some(mode) = DashboardMode::parse(&mode_raw) else {
    eprintln!("Unknown --mode {mode_raw:?} (expected aggregate or video)");
    return Ok(());
  };

  let snapshot = load(&cfg)?;
  if snapshot.report.warning_count > 0 {
    eprintln!(
      "loaded with {} parse warnings: {:?}",
      snapshot.report.warning_count, snapshot.report.warnings_by_column
    );
  }

  let output = match mode {
    DashboardMode::Aggregate => {
      let start = parse_date_flag(&args, "--start-dt")?;
      let end = parse_date_flag(&args, "--end-dt")?;
      let range = match (start, end) {
        (Some(s), Some(e)) => match DateRange::new(s, e) {
          Some(r) => Some(r),
          None => {
            eprintln!("--start-dt must not be after --end-dt");
            return Ok(());
          }
        },
        (None, None) => None,
        _ => {
          eprintln!("Pass both --start-dt and --end-dt, or neither");
          return Ok(());
        }
      };
      serde_json::to_value(aggregate_view(&snapshot, range))?
    }
    DashboardMode::IndividualVideo => {
      let title = parse_flag_value(&args, "--title").unwrap_or_default();
      if title.trim().is_empty() {
        eprintln!("Missing required --title. Known titles:");
        for t in video_titles(&snapshot.videos) {
          eprintln!("  {t}");
        }
        return Ok(());
      }
      serde_json::to_value(video_view(&snapshot, &title))?
    }
  };

  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}
