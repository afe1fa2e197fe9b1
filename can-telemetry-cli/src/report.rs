//! Console report generation
//!
//! Plain-text tables for range statistics and the live message list.

use can_telemetry_core::store::{LiveMessage, StoreStats};
use can_telemetry_core::{Dictionary, MessageDecoder, SignalStats};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Render a statistics table. Values use each signal's display precision
/// when the dictionary declares it.
pub fn format_stats_table(stats: &BTreeMap<String, SignalStats>, dictionary: &Dictionary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<28} {:>6} {:>7} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>10}",
        "Signal", "Unit", "Count", "Min", "Max", "Avg", "RMS", "Std", "Delta", "dt [ms]"
    );
    let _ = writeln!(out, "{}", "-".repeat(133));

    for (name, s) in stats {
        let spec = dictionary.find_signal(name).first().map(|&(_, spec)| spec);
        let fmt = |v: f64| match spec {
            Some(spec) => MessageDecoder::format_value(v, spec),
            None => format!("{:.3}", v),
        };
        let unit = spec.map(|spec| spec.unit.as_str()).unwrap_or("");

        let _ = writeln!(
            out,
            "{:<28} {:>6} {:>7} {:>12} {:>12} {:>12.3} {:>12.3} {:>12.3} {:>12} {:>10.1}",
            name,
            unit,
            s.count,
            fmt(s.min),
            fmt(s.max),
            s.avg,
            s.rms,
            s.std,
            fmt(s.delta),
            s.dt
        );
    }

    if stats.is_empty() {
        let _ = writeln!(out, "(no signal values in the selected window)");
    }
    out
}

/// Render the live message list
pub fn format_live_messages(messages: &[LiveMessage]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:<32} {:>8} {:>10}",
        "ID", "Message", "Count", "Cycle [ms]"
    );
    for m in messages {
        let _ = writeln!(
            out,
            "{:<10} {:<32} {:>8} {:>10.0}",
            m.id.display_hex(),
            m.name,
            m.count,
            m.period_ms
        );
    }
    out
}

pub fn print_stats_table(stats: &BTreeMap<String, SignalStats>, dictionary: &Dictionary) {
    print!("{}", format_stats_table(stats, dictionary));
}

pub fn print_live_messages(messages: &[LiveMessage]) {
    print!("{}", format_live_messages(messages));
}

pub fn print_store_stats(stats: &StoreStats) {
    println!("\nIngestion:");
    println!("  Accepted:        {}", stats.ingested);
    println!("  Published:       {}", stats.published);
    println!("  Evicted:         {}", stats.evicted);
    println!("  Dropped (pause): {}", stats.dropped_paused);
    println!("  Dropped (id):    {}", stats.dropped_invalid);
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_telemetry_core::{normalize, ByteOrder, MessageSpec, SignalSpec};

    #[test]
    fn test_stats_table_uses_signal_precision() {
        let dictionary = Dictionary::from_entries(vec![(
            "256",
            MessageSpec::new("A", 8).with_signal(
                SignalSpec::new("Voltage", 0, 16, ByteOrder::LittleEndian)
                    .with_scaling(0.01, 0.0)
                    .with_unit("V"),
            ),
        )]);
        let mut stats = BTreeMap::new();
        stats.insert(
            "Voltage".to_string(),
            SignalStats {
                first_time: 0.0,
                last_time: 100.0,
                dt: 100.0,
                min: 12.0,
                max: 12.5,
                avg: 12.25,
                rms: 12.26,
                std: 0.25,
                delta: 0.5,
                count: 2,
            },
        );

        let table = format_stats_table(&stats, &dictionary);
        let row = table.lines().nth(2).unwrap();
        assert!(row.starts_with("Voltage"));
        assert!(row.contains(" V "));
        assert!(row.contains("12.00"));
        assert!(row.contains("12.50"));
        assert!(row.contains("0.50"));
    }

    #[test]
    fn test_empty_stats_table() {
        let table = format_stats_table(&BTreeMap::new(), &Dictionary::new());
        assert!(table.contains("no signal values"));
    }

    #[test]
    fn test_live_message_rows() {
        let messages = vec![LiveMessage {
            id: normalize("7DF", true),
            name: "OBD Request".to_string(),
            count: 12,
            period_ms: 100.4,
            last_seen_ms: 1200.0,
        }];
        let table = format_live_messages(&messages);
        let row = table.lines().nth(1).unwrap();
        assert!(row.starts_with("0x7DF"));
        assert!(row.contains("OBD Request"));
        assert!(row.trim_end().ends_with("100"));
    }
}
