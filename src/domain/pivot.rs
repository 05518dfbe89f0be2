//! Swing pivot detection.
//!
//! Bar `i` is a pivot high when its high equals the maximum high of the
//! closed window `[i - depth, i + depth]` (a pivot low likewise with lows).
//! Only indices with a full window on both sides are examined, so the first
//! and last `depth` bars never qualify. Equal extremes inside one window mark
//! every bar that carries the extreme; each is tested at its own index.

use serde::Serialize;

use crate::domain::bar::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pivot {
    /// Position inside the current bar window.
    pub index: usize,
    pub price: f64,
    pub kind: PivotKind,
}

/// Pivot highs and lows of one window, each ascending by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pivots {
    pub highs: Vec<Pivot>,
    pub lows: Vec<Pivot>,
}

impl Pivots {
    pub fn last_high(&self) -> Option<&Pivot> {
        self.highs.last()
    }

    pub fn last_low(&self) -> Option<&Pivot> {
        self.lows.last()
    }

    /// (previous, last) pivot highs when at least two exist.
    pub fn last_two_highs(&self) -> Option<(&Pivot, &Pivot)> {
        last_two(&self.highs)
    }

    pub fn last_two_lows(&self) -> Option<(&Pivot, &Pivot)> {
        last_two(&self.lows)
    }
}

fn last_two(pivots: &[Pivot]) -> Option<(&Pivot, &Pivot)> {
    match pivots {
        [.., prev, last] => Some((prev, last)),
        _ => None,
    }
}

/// Smallest window that can hold a single pivot for `depth`.
pub fn min_bars_for_depth(depth: usize) -> usize {
    2 * depth + 1
}

pub fn find_pivots(bars: &[Bar], depth: usize) -> Pivots {
    let mut pivots = Pivots::default();
    if depth == 0 || bars.len() < min_bars_for_depth(depth) {
        return pivots;
    }

    for i in depth..bars.len() - depth {
        let window = &bars[i - depth..=i + depth];
        let max_high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let min_low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);

        if bars[i].high == max_high {
            pivots.highs.push(Pivot {
                index: i,
                price: bars[i].high,
                kind: PivotKind::High,
            });
        }
        if bars[i].low == min_low {
            pivots.lows.push(Pivot {
                index: i,
                price: bars[i].low,
                kind: PivotKind::Low,
            });
        }
    }

    pivots
}

#[cfg(test)]
pub(crate) fn bars_from_highs_lows(rows: &[(f64, f64)]) -> Vec<Bar> {
    use chrono::NaiveDate;
    rows.iter()
        .enumerate()
        .map(|(i, &(high, low))| Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::minutes(i as i64),
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
        })
        .collect()
}
