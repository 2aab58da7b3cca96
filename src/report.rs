/// Report layer: relays engine output to a line-oriented JSON sink.
///
/// Every record is one JSON object per line, tagged with `kind`:
///   {"kind":"advice", ...AdviceEvent}
///   {"kind":"snapshot", ...AdvisorSnapshot}
///
/// Snapshots are produced after every engine update and are usually only
/// interesting to a live display, so they are opt-in.
use crate::{engine::AdviceEvent, party::PartyHealthMetrics, predictor::DamageTrend};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::Receiver;

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub entity_id:          String,
    pub seconds_until_next: f64,
    pub confidence:         f64,
}

/// Snapshot of advisor state after an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorSnapshot {
    pub timestamp_ms:           u64,
    pub in_combat:              bool,
    /// Active encounter name from ENCOUNTER_START, or None between pulls.
    pub encounter_name:         Option<String>,
    pub encounter_elapsed_ms:   u64,
    pub party_size:             usize,
    pub metrics:                PartyHealthMetrics,
    pub damage_trend:           DamageTrend,
    pub party_damage_rate:      f64,
    pub party_healing_rate:     f64,
    pub spike_imminent:         bool,
    pub spike_severity:         f64,
    pub healing_urgency:        f64,
    pub emergency:              bool,
    pub conserve:               bool,
    pub high_damage_phase_secs: f64,
    pub pending_heals:          usize,
    pub forecasts:              Vec<ForecastEntry>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ReportLine<'a> {
    Advice(&'a AdviceEvent),
    Snapshot(&'a AdvisorSnapshot),
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &ReportLine<'_>) -> Result<()> {
    let mut json = serde_json::to_vec(line)?;
    json.push(b'\n');
    out.write_all(&json).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Report task
// ---------------------------------------------------------------------------

/// Drain advice and snapshot channels into `out` until both close.
/// Snapshots are drained but only written when `include_snapshots` is set.
pub async fn run<W: AsyncWrite + Unpin>(
    mut advice_rx:     Receiver<AdviceEvent>,
    mut snap_rx:       Receiver<AdvisorSnapshot>,
    mut out:           W,
    include_snapshots: bool,
) -> Result<()> {
    let mut advice_count = 0u64;
    loop {
        tokio::select! {
            Some(advice) = advice_rx.recv() => {
                tracing::info!("[{:?}] {}: {}", advice.severity, advice.title, advice.message);
                write_line(&mut out, &ReportLine::Advice(&advice)).await?;
                advice_count += 1;
            }
            Some(snap) = snap_rx.recv() => {
                if include_snapshots {
                    write_line(&mut out, &ReportLine::Snapshot(&snap)).await?;
                }
            }
            else => break,
        }
        out.flush().await?;
    }
    tracing::info!("Report finished: {} advice events", advice_count);
    Ok(())
}
