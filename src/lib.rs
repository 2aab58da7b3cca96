pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod hp;
pub mod intake;
pub mod parser;
pub mod party;
pub mod planner;
pub mod predictor;
pub mod report;
pub mod rules;
pub mod shadow;
pub mod state;
pub mod tailer;

use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

pub use clock::CombatClock;
pub use engine::{AdviceEvent, AdvisorCommand, HealerAdvisor, Severity};
pub use hp::{HealLanded, HpPredictor};
pub use intake::{IntakeAggregator, IntakeKind, IntakeSource};
pub use planner::{CooldownPlanner, CooldownPriority, DamageSignals};
pub use predictor::{DamagePredictor, DamageTrend, SpikeForecast};

/// Initialise logging to a daily-rolling file in `log_dir`.
///
/// The returned guard flushes the non-blocking writer on drop; keep it alive
/// for the lifetime of the process. Also installs a panic hook so panics end
/// up in the log file instead of only on stderr.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "healer-advisor.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("healer_advisor=debug".parse()?),
        )
        .with_writer(non_blocking)
        .with_ansi(false) // log files should not contain ANSI colour codes
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logging init failed: {}", e))?;

    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        tracing::error!("PANIC at {}: {}", location, message);
    }));

    tracing::info!("Healer advisor logging to {}", log_dir.display());
    Ok(guard)
}
