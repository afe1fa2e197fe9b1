//! Live ingestion end to end: line chunks → store → time series → statistics

use can_telemetry_core::formats::line::{LineAssembler, ReaderSource};
use can_telemetry_core::{
    compute_stats, normalize, pump, ByteOrder, Dictionary, EvictionPolicy, ManualClock,
    PipelineConfig, TelemetryHandle, TelemetryStore, TimeSeries,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn battery_dictionary() -> Dictionary {
    Dictionary::from_json_str(
        r#"{
        "2418544720": {
            "name": "LV_ID_0x10281050_Batt_Live_Statu",
            "dlc": 8,
            "signals": {
                "SOC": { "startBit": 0, "length": 8, "isLittleEndian": true, "isSigned": false, "scale": 1, "offset": 0, "unit": "%" },
                "Pack_Current": { "startBit": 16, "length": 16, "isLittleEndian": true, "isSigned": true, "scale": 0.1, "offset": 0, "unit": "A" }
            }
        }
    }"#,
    )
    .unwrap()
}

#[test]
fn live_lines_to_statistics() {
    init_logging();
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let handle = TelemetryHandle::new(TelemetryStore::new(PipelineConfig::new(), clock.clone()));
    let mut assembler = LineAssembler::new();

    // SOC 10/20/30, current +1.0 A, -1.0 A, +2.0 A, split mid-line
    let chunks: [&[u8]; 3] = [
        b"10281050#8#0A,00,0A,00,00,00,00,00\n1028",
        b"1050#8#14,00,F6,FF,00,00,00,00\n",
        b"10281050#8#1E,00,14,00,00,00,00,00\n",
    ];
    for (i, chunk) in chunks.iter().enumerate() {
        clock.set(i as f64 * 100.0);
        let mut source = ReaderSource::new(*chunk);
        pump(&mut source, &mut assembler, &handle).unwrap();
    }
    assert_eq!(handle.flush().unwrap(), 3);

    let history = handle.history().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].count(), 3);
    assert_eq!(history[1].period_ms(), 100.0);

    let dictionary = battery_dictionary();
    let series = TimeSeries::from_frames(&history, &dictionary, None);
    assert_eq!(series.signals(), &["Pack_Current", "SOC"]);

    let stats = compute_stats(&series, &["SOC", "Pack_Current"], 0.0, 200.0);
    let soc = stats["SOC"];
    assert_eq!(soc.min, 10.0);
    assert_eq!(soc.max, 30.0);
    assert_eq!(soc.avg, 20.0);
    assert_eq!(soc.delta, 20.0);
    assert_eq!(soc.dt, 200.0);

    let current = stats["Pack_Current"];
    assert!((current.min + 1.0).abs() < 1e-9);
    assert!((current.max - 2.0).abs() < 1e-9);
}

#[test]
fn published_index_ages_out() {
    init_logging();
    let clock = Arc::new(ManualClock::new(0));
    let handle = TelemetryHandle::new(TelemetryStore::new(PipelineConfig::new(), clock.clone()));
    let dictionary = battery_dictionary();

    clock.set(250.0);
    handle.ingest("10281050", 8, &[50, 0, 0, 0, 0, 0, 0, 0]).unwrap();
    handle.ingest("7DF", 1, &[0]).unwrap();
    handle.flush().unwrap();

    clock.set(250.0 + 4_999.0);
    handle.sweep_stale().unwrap();
    let live = handle.with_store(|s| s.live_messages(&dictionary)).unwrap();
    // Unknown IDs are live but not listed
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].name, "Batt Live Statu");
    assert_eq!(handle.published().unwrap().len(), 2);

    clock.set(250.0 + 5_001.0);
    handle.sweep_stale().unwrap();
    assert!(handle.published().unwrap().is_empty());
    assert_eq!(handle.history().unwrap().len(), 2);
}

#[test]
fn history_never_exceeds_bound() {
    init_logging();
    for policy in [EvictionPolicy::DropOldest, EvictionPolicy::Reset] {
        let config = PipelineConfig::new().with_max_history(10).with_eviction(policy);
        let clock = Arc::new(ManualClock::new(0));
        let handle = TelemetryHandle::new(TelemetryStore::new(config, clock.clone()));

        for batch in 0..7 {
            for i in 0..4u8 {
                clock.advance(1.0);
                handle.ingest("123", 1, &[batch * 4 + i]).unwrap();
            }
            handle.flush().unwrap();
            assert!(handle.history().unwrap().len() <= 10, "{:?}", policy);
        }

        let history = handle.history().unwrap();
        // The newest frame always survives
        assert_eq!(history.last().unwrap().data(), &[27]);
    }
}

#[test]
fn reset_starts_a_new_session() {
    init_logging();
    let clock = Arc::new(ManualClock::new(0));
    let handle = TelemetryHandle::new(TelemetryStore::new(PipelineConfig::new(), clock.clone()));

    handle.ingest("123", 1, &[1]).unwrap();
    handle.flush().unwrap();
    clock.advance(1_000.0);
    handle.reset().unwrap();

    handle.ingest("123", 1, &[2]).unwrap();
    handle.flush().unwrap();
    let history = handle.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].count(), 1);
    assert_eq!(history[0].timestamp_ms(), 0.0);
    assert_eq!(history[0].id(), &normalize("123", true));
}

#[test]
fn dictionary_from_dbc_merges_over_json() {
    init_logging();
    let dbc = r#"
VERSION ""

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_
    BA_DEF_DEF_
    SIG_VALTYPE_

BS_:

BU_: BMS

BO_ 2418544720 Batt_Replacement: 8 BMS
 SG_ Raw : 0|8@1+ (1,0) [0|255] "" Vector__XXX

BO_ 256 Charger: 8 BMS
 SG_ Charge_Current : 7|16@0+ (0.1,0) [0|6553.5] "A" Vector__XXX
"#;
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(dbc.as_bytes()).unwrap();
    file.flush().unwrap();

    let json = battery_dictionary();
    let from_dbc = Dictionary::from_dbc_file(file.path()).unwrap();
    let merged = json.merged(&from_dbc);

    // The DBC message replaces the JSON one whole, flag bit and all
    let message = merged.get(&normalize("10281050", true)).unwrap();
    assert_eq!(message.name, "Batt_Replacement");
    assert_eq!(message.signals.len(), 1);
    assert!(message.signals.contains_key("Raw"));

    let charger = merged.get(&normalize("100", true)).unwrap();
    assert_eq!(charger.signals["Charge_Current"].byte_order, ByteOrder::BigEndian);
    assert_eq!(merged.stats().num_messages, 2);
    assert_eq!(merged.stats().num_signals, 2);
}
