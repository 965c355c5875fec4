mod pump;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use session::{SessionConfig, WireFormat};
use model::SummarySource;
use pump::{run_source, AppSession};
use vbt_ingest_core::{Command, Inbound, ReplaySource};

#[derive(Parser, Debug)]
#[command(name = "vbt-replay", about = "Replay a recorded barbell sensor capture through a set session")]
struct Args {
    /// Capture to replay (NDJSON of payloads and commands, or a serial log)
    #[arg(long)]
    capture: PathBuf,

    /// Treat the capture as a firmware serial log (one CSV row per line)
    #[arg(long)]
    serial_log: bool,

    /// Bar load for the strength estimate, e.g. 100 or 82,5
    #[arg(long)]
    load_kg: Option<String>,

    /// Wire format override: auto, binary, text
    #[arg(long)]
    format: Option<WireFormat>,

    /// Summary source override: host, device
    #[arg(long)]
    summary_source: Option<SummarySource>,

    /// Session config file (defaults to <config dir>/vbt/session.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the per-rep table of the final set here
    #[arg(long)]
    reps_csv: Option<PathBuf>,

    /// Delay between payloads in milliseconds
    #[arg(long, default_value = "0")]
    pace_ms: u64,
}

fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|d| d.join("vbt").join("session.json"))
}

fn load_config(args: &Args) -> anyhow::Result<SessionConfig> {
    let path = match &args.config {
        Some(p) => Some(p.clone()),
        None => default_config_path().filter(|p| p.exists()),
    };
    let mut cfg = match path {
        Some(p) => {
            let raw = std::fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
            info!(path = %p.display(), "loaded session config");
            SessionConfig::from_json_str(&raw).with_context(|| format!("parse {}", p.display()))?
        }
        None => SessionConfig::default(),
    };
    if let Some(f) = args.format {
        cfg.wire_format = f;
    }
    if let Some(s) = args.summary_source {
        cfg.summary_source = s;
    }
    Ok(cfg)
}

fn load_capture(args: &Args) -> anyhow::Result<Vec<Inbound>> {
    if !args.serial_log {
        return iox::import_capture_ndjson(&args.capture);
    }
    // serial logs carry no commands; the whole log is one set
    let mut items = vec![Inbound::Command(Command::StartSet)];
    items.extend(iox::import_serial_log(&args.capture)?);
    items.push(Inbound::Command(Command::StopSet));
    Ok(items)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let cfg = load_config(&args)?;
    let load_kg = match args.load_kg.as_deref() {
        Some(raw) => match analysis::parse_load_kg(raw) {
            Some(v) => Some(v),
            None => anyhow::bail!("invalid load {raw:?}"),
        },
        None => None,
    };

    let items = load_capture(&args)?;
    info!(items = items.len(), format = ?cfg.wire_format, source = ?cfg.summary_source, "replaying capture");

    let mut src = ReplaySource::new(items);
    if args.pace_ms > 0 {
        src = src.paced(Duration::from_millis(args.pace_ms));
    }
    let sess = Arc::new(AppSession::new(cfg));
    let stats = run_source(src, sess.clone()).await?;
    info!(applied = stats.applied, dropped = stats.dropped, rejected = stats.rejected, "replay finished");

    let inner = sess.inner.lock();
    let Some(summary) = inner.current_summary() else {
        warn!(state = ?inner.state(), pending = ?inner.pending(), "capture did not complete a set");
        return Ok(());
    };
    if let Some(path) = &args.reps_csv {
        iox::export_reps_csv(summary, path)?;
        info!(path = %path.display(), reps = summary.reps.len(), "wrote rep table");
    }
    let report = analysis::set_report(summary, load_kg);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
