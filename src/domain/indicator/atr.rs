//! Average True Range over the trailing window.
//!
//! TR is taken from bar 1 onwards (bar 0 has no previous close). ATR is the
//! plain mean of the last `period` TRs; with fewer TRs than `period` the mean
//! of all available TRs is used.

use crate::domain::bar::Bar;

pub fn calculate_atr(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.len() < 2 {
        return None;
    }

    let trs: Vec<f64> = bars
        .windows(2)
        .map(|pair| pair[1].true_range(pair[0].close))
        .collect();

    let take = if period == 0 { trs.len() } else { period.min(trs.len()) };
    let tail = &trs[trs.len() - take..];
    Some(tail.iter().sum::<f64>() / take as f64)
}
