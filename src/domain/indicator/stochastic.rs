//! Stochastic oscillator (%K / %D).
//!
//! raw %K = 100 * (C - LL(k)) / (HH(k) - LL(k)), 50 when the range is flat.
//! %K is raw %K smoothed by an SMA of `slowing` (skipped when slowing <= 1),
//! %D is an SMA of %K over `d_period`. Warmup points are `None`.

use crate::domain::bar::Bar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticParams {
    pub k_period: usize,
    pub d_period: usize,
    pub slowing: usize,
}

impl Default for StochasticParams {
    fn default() -> Self {
        StochasticParams {
            k_period: 5,
            d_period: 3,
            slowing: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StochasticSeries {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

impl StochasticSeries {
    /// The last two (%K, %D) pairs, oldest first, when both are fully warmed up.
    pub fn last_two(&self) -> Option<((f64, f64), (f64, f64))> {
        let n = self.k.len();
        if n < 2 {
            return None;
        }
        let prev = (self.k[n - 2]?, self.d[n - 2]?);
        let curr = (self.k[n - 1]?, self.d[n - 1]?);
        Some((prev, curr))
    }
}

pub fn calculate_stochastic(bars: &[Bar], params: StochasticParams) -> StochasticSeries {
    let n = bars.len();
    if params.k_period == 0 || params.d_period == 0 || n < params.k_period {
        return StochasticSeries {
            k: vec![None; n],
            d: vec![None; n],
        };
    }

    let mut raw_k: Vec<Option<f64>> = vec![None; n];
    for i in (params.k_period - 1)..n {
        let window = &bars[i + 1 - params.k_period..=i];
        let hh = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let ll = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let range = hh - ll;
        raw_k[i] = Some(if range == 0.0 {
            50.0
        } else {
            100.0 * (bars[i].close - ll) / range
        });
    }

    let k = if params.slowing > 1 {
        smooth(&raw_k, params.slowing)
    } else {
        raw_k
    };
    let d = smooth(&k, params.d_period);

    StochasticSeries { k, d }
}

fn smooth(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    for i in 0..values.len() {
        if i + 1 < period {
            continue;
        }
        let window = &values[i + 1 - period..=i];
        if window.iter().all(Option::is_some) {
            let sum: f64 = window.iter().flatten().sum();
            out[i] = Some(sum / period as f64);
        }
    }
    out
}
