use anyhow::{Context, Result};
use clap::Parser;
use healer_advisor::{config, engine, parser, report, tailer, AdvisorCommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(
    name = "healer-advisor",
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,
)]
struct Args {
    /// Combat log to read (overrides `log_path` in the config file)
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Config file (defaults to advisor.toml in the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep watching the log for new lines
    #[arg(short, long)]
    follow: bool,

    /// Directory for the rolling log file
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Also print a state snapshot after every update
    #[arg(long)]
    snapshots: bool,

    /// Advice intensity from 1 (quiet) to 5 (aggressive)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
    intensity: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = healer_advisor::init_logging(&args.log_dir)?;

    let mut cfg = match &args.config {
        Some(path) => config::load(path).with_context(|| format!("Loading {:?}", path))?,
        None => config::load_or_default(&std::env::current_dir()?)?,
    };
    if let Some(log) = args.log {
        cfg.log_path = log;
    }
    if let Some(intensity) = args.intensity {
        cfg.intensity = intensity;
    }
    cfg.validate()?;
    if cfg.log_path.as_os_str().is_empty() {
        anyhow::bail!("No combat log given: pass --log or set log_path in the config");
    }

    tracing::info!(
        "Starting: log={:?} follow={} intensity={} profile={:?}",
        cfg.log_path, args.follow, cfg.intensity, cfg.session.profile
    );

    let (line_tx,   line_rx)   = mpsc::channel::<String>(1_024);
    let (event_tx,  event_rx)  = mpsc::channel(1_024);
    let (cmd_tx,    cmd_rx)    = mpsc::channel::<AdvisorCommand>(64);
    let (advice_tx, advice_rx) = mpsc::channel(256);
    let (snap_tx,   snap_rx)   = mpsc::channel(256);

    let tailer_task = tokio::spawn(tailer::run(cfg.log_path.clone(), args.follow, line_tx));
    let parser_task = tokio::spawn(parser::run(line_rx, event_tx));

    // Live mode: let time pass between log writes. Replay is driven by log
    // timestamps only.
    if args.follow {
        let tick = Duration::from_millis(cfg.session.tick_interval_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                let command = AdvisorCommand::Tick { delta_secs: tick.as_secs_f64() };
                if cmd_tx.send(command).await.is_err() {
                    break;
                }
            }
        });
    } else {
        drop(cmd_tx);
    }

    let engine_task = tokio::spawn(engine::run(event_rx, cmd_rx, advice_tx, snap_tx, cfg));
    let report_task = tokio::spawn(report::run(advice_rx, snap_rx, tokio::io::stdout(), args.snapshots));

    tailer_task.await??;
    parser_task.await??;
    engine_task.await??;
    report_task.await??;
    Ok(())
}
