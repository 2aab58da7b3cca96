/// End-to-end: log file -> tailer -> parser -> engine -> report.
use healer_advisor::{config::AdvisorConfig, engine, parser, report, tailer, AdvisorCommand};
use std::io::Write;
use tokio::sync::mpsc;

fn swing(time: &str, dest: &str, amount: u64) -> String {
    format!(
        r#"5/21 {}  SWING_DAMAGE,0,Creature-0-3019-2657-1,"Ulgrax",0xa48,0x0,{},"{}",0x511,0x0,{},0,1,0,0,0,nil,nil,nil"#,
        time, dest, dest, amount
    )
}

fn heal(time: &str, dest: &str, amount: u64, overhealing: u64) -> String {
    format!(
        r#"5/21 {}  SPELL_HEAL,0,Player-1-HEALER,"Mendwell",0x511,0x0,{},"{}",0x511,0x0,2061,"Flash Heal",0x2,{},{},0,nil"#,
        time, dest, dest, amount, overhealing
    )
}

async fn replay(lines: &[String], include_snapshots: bool) -> Vec<serde_json::Value> {
    let mut log = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(log, "{}", line).unwrap();
    }
    log.flush().unwrap();

    let mut config = AdvisorConfig::default();
    config.session.default_max_hp = 100_000;
    config.session.profile = "PRIEST/Holy".to_owned();

    let (line_tx, line_rx)     = mpsc::channel(16);
    let (event_tx, event_rx)   = mpsc::channel(16);
    let (_cmd_tx, cmd_rx)      = mpsc::channel::<AdvisorCommand>(1);
    let (advice_tx, advice_rx) = mpsc::channel(16);
    let (snap_tx, snap_rx)     = mpsc::channel(16);
    drop(_cmd_tx);

    let mut out = Vec::new();
    tokio::try_join!(
        tailer::run(log.path().to_path_buf(), false, line_tx),
        parser::run(line_rx, event_tx),
        engine::run(event_rx, cmd_rx, advice_tx, snap_tx, config),
        report::run(advice_rx, snap_rx, &mut out, include_snapshots),
    )
    .unwrap();

    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn advice_keys(records: &[serde_json::Value]) -> Vec<String> {
    records
        .iter()
        .filter(|r| r["kind"] == "advice")
        .filter_map(|r| r["key"].as_str().map(str::to_owned))
        .collect()
}

#[tokio::test]
async fn emergency_is_reported_once_per_cooldown() {
    let lines = vec![
        r#"5/21 20:10:00.000  ZONE_CHANGE,2657,"Nerub-ar Palace",16"#.to_owned(),
        r#"5/21 20:12:00.000  ENCOUNTER_START,2902,"Ulgrax the Devourer",16,20,2657"#.to_owned(),
        swing("20:12:01.000", "Player-1-TANK", 20_000),
        swing("20:12:02.000", "Player-1-TANK", 60_000),
        swing("20:12:02.200", "Player-1-TANK", 5_000),
        heal("20:12:03.000", "Player-1-TANK", 60_000, 0),
        swing("20:12:12.000", "Player-1-TANK", 70_000),
        r#"5/21 20:12:15.000  ENCOUNTER_END,2902,"Ulgrax the Devourer",16,20,0,15000"#.to_owned(),
        "garbage line".to_owned(),
    ];

    let records = replay(&lines, false).await;
    let keys = advice_keys(&records);

    // 20:12:02 (15%) fires, 20:12:02.2 is deduplicated, 20:12:12 fires again (10s later)
    assert_eq!(keys.iter().filter(|k| *k == rules_emergency_key()).count(), 2, "{:?}", keys);

    let first = records
        .iter()
        .find(|r| r["key"] == rules_emergency_key())
        .unwrap();
    assert_eq!(first["severity"], "bad");
    assert!(first["message"].as_str().unwrap().contains("Guardian Spirit"));
}

#[tokio::test]
async fn snapshots_track_encounter_and_party() {
    let lines = vec![
        r#"5/21 20:12:00.000  ENCOUNTER_START,2902,"Ulgrax the Devourer",16,20,2657"#.to_owned(),
        swing("20:12:01.000", "Player-1-TANK", 10_000),
        heal("20:12:01.500", "Player-1-TANK", 8_000, 3_000),
        swing("20:12:02.000", "Player-2-DPS", 5_000),
    ];

    let records = replay(&lines, true).await;
    let snapshots: Vec<&serde_json::Value> = records.iter().filter(|r| r["kind"] == "snapshot").collect();
    assert_eq!(snapshots.len(), 4);

    let last = snapshots[3];
    assert_eq!(last["in_combat"], true);
    assert_eq!(last["encounter_name"], "Ulgrax the Devourer");
    assert_eq!(last["encounter_elapsed_ms"], 2_000);
    assert_eq!(last["party_size"], 2);
    // tank: 100k - 10k + 5k effective = 95%, dps: 95%
    assert_eq!(last["metrics"]["lowest_hp_percent"], 0.95);
    assert_eq!(last["metrics"]["injured_count"], 0);
}

fn rules_emergency_key() -> &'static str {
    healer_advisor::rules::emergency::KEY
}
