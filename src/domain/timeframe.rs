//! Chart timeframes.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
    MN,
}

impl Timeframe {
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
            Timeframe::MN => "MN",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    /// Accepts both `H1` and the terminal-style `TIMEFRAME_H1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let name = upper.strip_prefix("TIMEFRAME_").unwrap_or(&upper);
        match name {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            "W1" => Ok(Timeframe::W1),
            "MN" | "MN1" => Ok(Timeframe::MN),
            _ => Err(format!("unknown timeframe '{}'", s.trim())),
        }
    }
}

/// Parses a comma-separated precedence list, dropping duplicates.
pub fn parse_timeframes(input: &str) -> Result<Vec<Timeframe>, String> {
    let mut out = Vec::new();
    for part in input.split(',').filter(|p| !p.trim().is_empty()) {
        let tf: Timeframe = part.parse()?;
        if !out.contains(&tf) {
            out.push(tf);
        }
    }
    if out.is_empty() {
        return Err("timeframe list is empty".into());
    }
    Ok(out)
}
