//! Trade journal record, one per accepted entry order.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::signal::Direction;
use crate::domain::sizing::TradePlan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(with = "journal_time")]
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub direction: String,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub volume: f64,
    pub ticket: u64,
    pub risk_reward: f64,
    pub balance: f64,
}

impl JournalEntry {
    pub fn from_plan(
        timestamp: NaiveDateTime,
        symbol: &str,
        plan: &TradePlan,
        ticket: u64,
        balance: f64,
    ) -> Self {
        JournalEntry {
            timestamp,
            symbol: symbol.to_string(),
            direction: match plan.direction {
                Direction::Bull => "BUY".to_string(),
                Direction::Bear => "SELL".to_string(),
            },
            entry: plan.entry,
            stop: plan.stop_loss,
            target: plan.take_profit,
            volume: plan.volume,
            ticket,
            risk_reward: (plan.risk_reward() * 100.0).round() / 100.0,
            balance,
        }
    }
}

mod journal_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
