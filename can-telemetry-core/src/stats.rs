//! Range statistics over a time series
//!
//! For a closed window `[start, end]` and each requested signal, only rows
//! where the signal holds a value contribute. Signals with no contributing
//! row are left out of the result.

use crate::series::TimeSeries;
use serde::Serialize;
use std::collections::BTreeMap;

/// Summary of one signal over a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalStats {
    /// Time of the first contributing row (ms)
    pub first_time: f64,
    /// Time of the last contributing row (ms)
    pub last_time: f64,
    /// `last_time - first_time`
    pub dt: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// Root mean square
    pub rms: f64,
    /// Population standard deviation
    pub std: f64,
    /// Last value minus first value
    pub delta: f64,
    /// Number of contributing rows
    pub count: usize,
}

/// Which window a statistics request covers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatsWindow {
    /// A user-selected sub-range
    Selection { start_ms: f64, end_ms: f64 },
    /// The range currently shown
    Visible { start_ms: f64, end_ms: f64 },
    /// Everything in the series
    Session,
}

impl StatsWindow {
    /// Concrete bounds for a series, `None` when the series is empty and the
    /// window is the whole session
    pub fn bounds(&self, series: &TimeSeries) -> Option<(f64, f64)> {
        match *self {
            StatsWindow::Selection { start_ms, end_ms } | StatsWindow::Visible { start_ms, end_ms } => {
                Some((start_ms, end_ms))
            }
            StatsWindow::Session => series.time_span(),
        }
    }
}

/// Compute statistics for each named signal over `[window_start, window_end]`.
///
/// Reversed bounds are swapped. Unknown signal names and signals without a
/// value in the window are omitted.
pub fn compute_stats<S: AsRef<str>>(
    series: &TimeSeries,
    signal_names: &[S],
    window_start: f64,
    window_end: f64,
) -> BTreeMap<String, SignalStats> {
    let mut result = BTreeMap::new();
    if window_start.is_nan() || window_end.is_nan() {
        return result;
    }

    let (start, end) = if window_start <= window_end {
        (window_start, window_end)
    } else {
        (window_end, window_start)
    };
    let rows = series.window(start, end);

    for name in signal_names {
        let name = name.as_ref();
        let Some(col) = series.column(name) else {
            log::debug!("Statistics requested for unknown signal '{}'", name);
            continue;
        };

        let samples: Vec<(f64, f64)> = rows
            .iter()
            .filter_map(|row| row.values.get(col).copied().flatten().map(|v| (row.time_ms, v)))
            .collect();

        if let Some(stats) = summarize(&samples) {
            result.insert(name.to_string(), stats);
        }
    }

    result
}

/// Compute statistics for a window scope
pub fn compute_window_stats<S: AsRef<str>>(
    series: &TimeSeries,
    signal_names: &[S],
    window: StatsWindow,
) -> BTreeMap<String, SignalStats> {
    match window.bounds(series) {
        Some((start, end)) => compute_stats(series, signal_names, start, end),
        None => BTreeMap::new(),
    }
}

fn summarize(samples: &[(f64, f64)]) -> Option<SignalStats> {
    let &(first_time, first_value) = samples.first()?;
    let &(last_time, last_value) = samples.last()?;
    let n = samples.len() as f64;

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for &(_, v) in samples {
        min = min.min(v);
        max = max.max(v);
        sum += v;
        sum_sq += v * v;
    }

    let avg = sum / n;
    let variance = samples.iter().map(|&(_, v)| (v - avg).powi(2)).sum::<f64>() / n;

    Some(SignalStats {
        first_time,
        last_time,
        dt: last_time - first_time,
        min,
        max,
        avg,
        rms: (sum_sq / n).sqrt(),
        std: variance.sqrt(),
        delta: last_value - first_value,
        count: samples.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(points: &[(f64, f64)]) -> TimeSeries {
        TimeSeries::from_rows(
            vec!["s".to_string()],
            points.iter().map(|&(t, v)| (t, vec![Some(v)])),
        )
    }

    #[test]
    fn test_three_point_series() {
        let series = single(&[(0.0, 10.0), (1.0, 20.0), (2.0, 30.0)]);
        let stats = compute_stats(&series, &["s"], 0.0, 2.0);
        let s = stats["s"];

        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 30.0);
        assert_eq!(s.avg, 20.0);
        assert_eq!(s.delta, 20.0);
        assert_eq!(s.dt, 2.0);
        assert_eq!(s.count, 3);
        assert!((s.rms - (1400.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((s.std - (200.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_window_bounds_are_inclusive_and_swappable() {
        let series = single(&[(0.0, 1.0), (10.0, 2.0), (20.0, 3.0), (30.0, 4.0)]);

        let stats = compute_stats(&series, &["s"], 10.0, 20.0);
        assert_eq!(stats["s"].count, 2);
        assert_eq!(stats["s"].first_time, 10.0);

        let reversed = compute_stats(&series, &["s"], 20.0, 10.0);
        assert_eq!(reversed, stats);
    }

    #[test]
    fn test_signals_without_samples_are_omitted() {
        let series = TimeSeries::from_rows(
            vec!["a".to_string(), "b".to_string()],
            vec![(0.0, vec![Some(1.0), None]), (1.0, vec![Some(2.0), None])],
        );
        let stats = compute_stats(&series, &["a", "b", "missing"], 0.0, 1.0);
        assert_eq!(stats.len(), 1);
        assert!(stats.contains_key("a"));

        assert!(compute_stats(&series, &["a"], 5.0, 6.0).is_empty());
        assert!(compute_stats(&series, &["a"], f64::NAN, 1.0).is_empty());
    }

    #[test]
    fn test_single_sample() {
        let series = single(&[(5.0, -3.0)]);
        let s = compute_stats(&series, &["s"], 0.0, 10.0)["s"];
        assert_eq!(s.dt, 0.0);
        assert_eq!(s.std, 0.0);
        assert_eq!(s.delta, 0.0);
        assert_eq!(s.rms, 3.0);
    }

    #[test]
    fn test_window_scopes() {
        let series = single(&[(0.0, 1.0), (10.0, 2.0), (20.0, 3.0)]);

        let session = compute_window_stats(&series, &["s"], StatsWindow::Session);
        assert_eq!(session["s"].count, 3);

        let visible = compute_window_stats(
            &series,
            &["s"],
            StatsWindow::Visible { start_ms: 5.0, end_ms: 25.0 },
        );
        assert_eq!(visible["s"].count, 2);

        let selection = compute_window_stats(
            &series,
            &["s"],
            StatsWindow::Selection { start_ms: 10.0, end_ms: 10.0 },
        );
        assert_eq!(selection["s"].count, 1);

        let empty = TimeSeries::new(vec!["s".to_string()]);
        assert!(compute_window_stats(&empty, &["s"], StatsWindow::Session).is_empty());
    }
}
