/// Parses raw combat log lines into typed `CombatEvent`s.
///
/// Line format:
///
///   TIMESTAMP  SUBEVENT,HIDECASTER,SOURCEGUID,SOURCENAME,SOURCEFLAGS,SOURCERAIDFLAGS,
///              DESTGUID,DESTNAME,DESTFLAGS,DESTRAIDFLAGS,[subevent-specific fields...]
///
/// Field indices (0-based after splitting on comma):
///   [0]  subevent name (e.g. "SPELL_DAMAGE")
///   [2]  source GUID
///   [6]  dest GUID
///   [7]  dest name (quoted)
///   [10] spell ID       (prefix fields for SPELL_* / RANGE_* events)
///   [13+] subevent-specific
///
/// SWING_DAMAGE has no spell prefix, so its amount sits at [10].
/// ZONE_CHANGE and ENCOUNTER_* carry no unit fields at all; their payload
/// starts at [1].
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{Receiver, Sender};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CombatEvent {
    Damage {
        timestamp_ms: u64,
        source_guid:  String,
        dest_guid:    String,
        dest_name:    String,
        /// `None` for melee swings.
        spell_id:     Option<u32>,
        amount:       u64,
    },
    Heal {
        timestamp_ms: u64,
        source_guid:  String,
        dest_guid:    String,
        spell_id:     u32,
        amount:       u64,
        overhealing:  u64,
    },
    UnitDied {
        timestamp_ms: u64,
        dest_guid:    String,
        dest_name:    String,
    },
    ZoneChange {
        timestamp_ms: u64,
        zone_id:      u32,
        zone_name:    String,
    },
    EncounterStart {
        timestamp_ms:   u64,
        encounter_id:   u32,
        encounter_name: String,
    },
    EncounterEnd {
        timestamp_ms:   u64,
        encounter_id:   u32,
        encounter_name: String,
        success:        bool,
    },
}

impl CombatEvent {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Self::Damage         { timestamp_ms, .. } => *timestamp_ms,
            Self::Heal           { timestamp_ms, .. } => *timestamp_ms,
            Self::UnitDied       { timestamp_ms, .. } => *timestamp_ms,
            Self::ZoneChange     { timestamp_ms, .. } => *timestamp_ms,
            Self::EncounterStart { timestamp_ms, .. } => *timestamp_ms,
            Self::EncounterEnd   { timestamp_ms, .. } => *timestamp_ms,
        }
    }

    /// GUID of the entity on the receiving end of this event, if any.
    pub fn dest_guid(&self) -> Option<&str> {
        match self {
            Self::Damage   { dest_guid, .. } => Some(dest_guid),
            Self::Heal     { dest_guid, .. } => Some(dest_guid),
            Self::UnitDied { dest_guid, .. } => Some(dest_guid),
            Self::ZoneChange { .. } | Self::EncounterStart { .. } | Self::EncounterEnd { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse the log timestamp prefix into milliseconds since midnight.
///
/// Accepts "M/D HH:MM:SS.mmm" and the newer "M/D/YYYY HH:MM:SS.mmmm-Z"
/// (fraction truncated to ms, timezone suffix ignored). Values are only used
/// relative to each other.
fn parse_timestamp(date_time: &str) -> Option<u64> {
    let mut parts = date_time.splitn(2, ' ');
    let _date = parts.next()?;
    let time  = parts.next()?.trim();

    let mut time_parts = time.splitn(3, ':');
    let h:  u64 = time_parts.next()?.parse().ok()?;
    let m:  u64 = time_parts.next()?.parse().ok()?;
    let sm: &str = time_parts.next()?;

    // Drop a trailing "+2" / "-4" timezone offset.
    let sm = sm.split(['+', '-']).next()?;

    let (s_str, frac) = sm.split_once('.').unwrap_or((sm, "0"));
    let s: u64 = s_str.parse().ok()?;
    // ASCII digits only, so the byte slice below stays on a char boundary.
    if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let frac = &frac[..frac.len().min(3)];
    let ms: u64 = frac.parse::<u64>().ok()? * 10u64.pow(3 - frac.len() as u32);

    Some((h * 3_600 + m * 60 + s) * 1_000 + ms)
}

#[inline]
fn unquote(s: &str) -> &str {
    s.trim_matches('"')
}

/// Split a raw log line into (timestamp_ms, fields[]).
///
///   "5/21 20:14:33.123  SPELL_DAMAGE,0,..."
///                     ^^  (two spaces between timestamp and payload)
fn split_line(raw: &str) -> Option<(u64, Vec<&str>)> {
    let sep = raw.find("  ")?;
    let ts_str  = &raw[..sep];
    let payload = raw[sep + 2..].trim_end();

    let ts_ms = parse_timestamp(ts_str)?;

    // No full CSV parse; names are unquoted field by field.
    let fields: Vec<&str> = payload.splitn(25, ',').collect();

    Some((ts_ms, fields))
}

fn field<'a>(f: &[&'a str], idx: usize) -> Option<&'a str> {
    f.get(idx).map(|s| unquote(s.trim()))
}

fn number<T: std::str::FromStr>(f: &[&str], idx: usize) -> Option<T> {
    field(f, idx)?.parse().ok()
}

pub fn parse_line(raw: &str) -> Option<CombatEvent> {
    let (ts, f) = split_line(raw)?;

    match *f.first()? {
        "SPELL_DAMAGE" | "SPELL_PERIODIC_DAMAGE" | "RANGE_DAMAGE" => {
            // After school [12]: [13]=amount, [14]=overkill ...
            Some(CombatEvent::Damage {
                timestamp_ms: ts,
                source_guid:  field(&f, 2)?.to_owned(),
                dest_guid:    field(&f, 6)?.to_owned(),
                dest_name:    field(&f, 7)?.to_owned(),
                spell_id:     Some(number(&f, 10)?),
                amount:       number(&f, 13)?,
            })
        }
        "SWING_DAMAGE" => Some(CombatEvent::Damage {
            timestamp_ms: ts,
            source_guid:  field(&f, 2)?.to_owned(),
            dest_guid:    field(&f, 6)?.to_owned(),
            dest_name:    field(&f, 7)?.to_owned(),
            spell_id:     None,
            amount:       number(&f, 10)?,
        }),
        "SPELL_HEAL" | "SPELL_PERIODIC_HEAL" => Some(CombatEvent::Heal {
            timestamp_ms: ts,
            source_guid:  field(&f, 2)?.to_owned(),
            dest_guid:    field(&f, 6)?.to_owned(),
            spell_id:     number(&f, 10)?,
            amount:       number(&f, 13)?,
            overhealing:  number(&f, 14).unwrap_or(0),
        }),
        "UNIT_DIED" => Some(CombatEvent::UnitDied {
            timestamp_ms: ts,
            dest_guid:    field(&f, 6)?.to_owned(),
            dest_name:    field(&f, 7)?.to_owned(),
        }),
        "ZONE_CHANGE" => Some(CombatEvent::ZoneChange {
            timestamp_ms: ts,
            zone_id:      number(&f, 1)?,
            zone_name:    field(&f, 2)?.to_owned(),
        }),
        "ENCOUNTER_START" => Some(CombatEvent::EncounterStart {
            timestamp_ms:   ts,
            encounter_id:   number(&f, 1)?,
            encounter_name: field(&f, 2)?.to_owned(),
        }),
        "ENCOUNTER_END" => Some(CombatEvent::EncounterEnd {
            timestamp_ms:   ts,
            encounter_id:   number(&f, 1)?,
            encounter_name: field(&f, 2)?.to_owned(),
            success:        number::<u8>(&f, 5)? == 1,
        }),
        _ => None,
    }
}

/// Async pipeline task: receive raw lines, parse, forward typed events.
pub async fn run(mut rx: Receiver<String>, tx: Sender<CombatEvent>) -> Result<()> {
    let mut skipped = 0u64;
    while let Some(line) = rx.recv().await {
        match parse_line(&line) {
            Some(event) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            None => skipped += 1,
        }
    }
    tracing::debug!("Parser finished ({} lines skipped)", skipped);
    Ok(())
}
