//! Entry gate driven by live account drawdown.
//!
//! Drawdown is recomputed from balance and equity every cycle; nothing is
//! carried between cycles. The gate only vetoes new entries. Management of
//! open positions runs regardless of its verdict.

use serde::Serialize;

use crate::domain::account::AccountInfo;

/// `(balance - equity) / balance * 100`, or `None` when balance is not positive.
pub fn drawdown_pct(balance: f64, equity: f64) -> Option<f64> {
    if balance <= 0.0 || !balance.is_finite() || !equity.is_finite() {
        return None;
    }
    Some((balance - equity) / balance * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateVerdict {
    Open { drawdown_pct: f64 },
    Blocked { drawdown_pct: f64, limit_pct: f64 },
    /// Account info missing or unusable this cycle.
    Unknown,
    Disabled,
}

impl GateVerdict {
    pub fn allows_entries(&self) -> bool {
        matches!(self, GateVerdict::Open { .. } | GateVerdict::Disabled)
    }

    pub fn drawdown_pct(&self) -> Option<f64> {
        match self {
            GateVerdict::Open { drawdown_pct } | GateVerdict::Blocked { drawdown_pct, .. } => {
                Some(*drawdown_pct)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownGate {
    /// Daily limit in percent; zero or negative disables the gate.
    pub limit_pct: f64,
}

impl DrawdownGate {
    pub fn new(limit_pct: f64) -> Self {
        DrawdownGate { limit_pct }
    }

    pub fn is_enabled(&self) -> bool {
        self.limit_pct > 0.0
    }

    pub fn check(&self, account: Option<&AccountInfo>) -> GateVerdict {
        if !self.is_enabled() {
            return GateVerdict::Disabled;
        }
        let Some(dd) = account.and_then(|a| drawdown_pct(a.balance, a.equity)) else {
            return GateVerdict::Unknown;
        };
        if dd >= self.limit_pct {
            GateVerdict::Blocked {
                drawdown_pct: dd,
                limit_pct: self.limit_pct,
            }
        } else {
            GateVerdict::Open { drawdown_pct: dd }
        }
    }
}
