//! FILENAME: app/src/main.rs
// PURPOSE: Command-line entry point. Prints the dashboard view, or one
// drill-down, as JSON on stdout.
// FORMAT (log): seq|level|category|message

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::Parser;

use dashboard_lib::{
    create_dashboard_state, drill_down, get_dashboard, init_log_file, load_snapshot, log_error,
    log_info, set_filter, DashboardConfig, DrillDownRequest,
};

#[derive(Parser, Debug)]
#[command(name = "herd-dashboard", version, about = "Population analytics for a herd snapshot")]
struct Cli {
    /// Snapshot file (JSON array of records). Falls back to the configured path.
    snapshot: Option<PathBuf>,

    /// Configuration file (defaults to $HERD_DASHBOARD_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Filter as key=value, e.g. race=Arabe or discipline=__family__
    #[arg(long = "filter", value_parser = parse_key_value)]
    filters: Vec<(String, String)>,

    /// Reference date for ages (defaults to today)
    #[arg(long)]
    now: Option<NaiveDate>,

    /// List the records of one bucket instead, as DIMENSION=BUCKET
    #[arg(long = "drill-down", value_parser = parse_key_value)]
    drill_down: Option<(String, String)>,

    /// Maximum records listed by --drill-down
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    pretty: bool,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected key=value, got {:?}", raw))
}

fn run(cli: Cli) -> Result<String, String> {
    let config = DashboardConfig::load_or_default(cli.config.as_deref()).map_err(|e| e.to_string())?;

    if let Some(dir) = &config.log_dir {
        match init_log_file(dir) {
            Ok(path) => log_info!("SYS", "herd-dashboard starting, log={}", path.display()),
            Err(e) => eprintln!("[LOG_INIT] FAILED: {}, console only", e),
        }
    }

    let snapshot_path = cli
        .snapshot
        .or_else(|| config.snapshot_path.clone())
        .ok_or("No snapshot given and none configured")?;

    let state = create_dashboard_state(&config);
    load_snapshot(&state, &snapshot_path.to_string_lossy())?;

    for (key, value) in &cli.filters {
        set_filter(&state, key, value)?;
    }

    let json = match cli.drill_down {
        Some((dimension, bucket)) => {
            let request = DrillDownRequest {
                dimension,
                bucket,
                max_records: cli.limit,
                now: cli.now,
            };
            let result = drill_down(&state, request)?;
            to_json(&result, cli.pretty)?
        }
        None => {
            let view = get_dashboard(&state, cli.now)?;
            to_json(&view, cli.pretty)?
        }
    };
    Ok(json)
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String, String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_error!("SYS", "{}", e);
            ExitCode::FAILURE
        }
    }
}
