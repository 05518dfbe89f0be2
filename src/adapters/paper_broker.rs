//! CSV-fed paper trading terminal.
//!
//! Bars come from `{data_dir}/{SYMBOL}_{TF}.csv` (columns: timestamp, open,
//! high, low, close; timestamps `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`). The
//! current quote is the last close of the finest timeframe on disk, with the
//! configured spread added to the ask. Orders fill at that quote and live in
//! memory. Stops and targets are never triggered: the files are a fixed view
//! of the market, not a replay.

use std::fs;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::domain::account::{AccountInfo, Tick};
use crate::domain::bar::Bar;
use crate::domain::error::EngineError;
use crate::domain::position::Position;
use crate::domain::signal::Direction;
use crate::domain::symbol::SymbolInfo;
use crate::domain::timeframe::Timeframe;
use crate::ports::broker_port::{BrokerPort, OrderRequest, OrderResult};
use crate::ports::config_port::ConfigPort;

const ALL_TIMEFRAMES: [Timeframe; 9] = [
    Timeframe::M1,
    Timeframe::M5,
    Timeframe::M15,
    Timeframe::M30,
    Timeframe::H1,
    Timeframe::H4,
    Timeframe::D1,
    Timeframe::W1,
    Timeframe::MN,
];

#[derive(Debug, Clone, PartialEq)]
pub struct PaperConfig {
    pub data_dir: PathBuf,
    pub balance: f64,
    pub spread_pips: f64,
    pub digits: u32,
    pub point: f64,
    pub tick_value: f64,
    pub min_stop_distance_points: f64,
    pub volume_min: f64,
    pub volume_step: f64,
}

impl PaperConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        PaperConfig {
            data_dir: config
                .get_path("paper", "data_dir")
                .unwrap_or_else(|| PathBuf::from("data")),
            balance: config.get_double("paper", "balance", 10000.0),
            spread_pips: config.get_double("paper", "spread_pips", 1.0),
            digits: config.get_int("paper", "digits", 5).max(0) as u32,
            point: config.get_double("paper", "point", 0.00001),
            tick_value: config.get_double("paper", "tick_value", 1.0),
            min_stop_distance_points: config.get_double("paper", "min_stop_distance_points", 0.0),
            volume_min: config.get_double("paper", "volume_min", 0.01),
            volume_step: config.get_double("paper", "volume_step", 0.01),
        }
    }
}

pub struct PaperBroker {
    config: PaperConfig,
    connected: bool,
    positions: Vec<Position>,
    next_ticket: u64,
    balance: f64,
}

impl PaperBroker {
    pub fn new(config: PaperConfig) -> Self {
        let balance = config.balance;
        Self {
            config,
            connected: false,
            positions: Vec::new(),
            next_ticket: 1,
            balance,
        }
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}_{}.csv", symbol, timeframe))
    }

    fn symbol_info(&self, symbol: &str) -> SymbolInfo {
        SymbolInfo {
            name: symbol.to_string(),
            digits: self.config.digits,
            point: self.config.point,
            tick_size: self.config.point,
            tick_value: self.config.tick_value,
            min_stop_distance: self.config.min_stop_distance_points * self.config.point,
            volume_min: self.config.volume_min,
            volume_step: self.config.volume_step,
        }
    }

    fn load_bars(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, EngineError> {
        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| EngineError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| EngineError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            let timestamp = parse_timestamp(field(&record, 0, "timestamp")?)?;
            bars.push(Bar {
                timestamp,
                open: parse_price(&record, 1, "open")?,
                high: parse_price(&record, 2, "high")?,
                low: parse_price(&record, 3, "low")?,
                close: parse_price(&record, 4, "close")?,
            });
        }
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn position_profit(&self, position: &Position, tick: &Tick, volume: f64) -> f64 {
        if self.config.point <= 0.0 {
            return 0.0;
        }
        let move_ = position.side.sign() * (position.exit_price(tick) - position.entry_price);
        move_ / self.config.point * self.config.tick_value * volume
    }

    fn stop_ok(&self, side: Direction, stop: f64, tick: &Tick) -> bool {
        if stop <= 0.0 {
            return true;
        }
        let min = self.config.min_stop_distance_points * self.config.point;
        let gap = match side {
            Direction::Bull => tick.bid - stop,
            Direction::Bear => stop - tick.ask,
        };
        gap > 0.0 && gap >= min
    }

    fn target_ok(&self, side: Direction, target: f64, tick: &Tick) -> bool {
        if target <= 0.0 {
            return true;
        }
        match side {
            Direction::Bull => target > tick.ask,
            Direction::Bear => target < tick.bid,
        }
    }
}

fn field<'a>(
    record: &'a csv::StringRecord,
    idx: usize,
    name: &str,
) -> Result<&'a str, EngineError> {
    record.get(idx).ok_or_else(|| EngineError::Data {
        reason: format!("missing {} column", name),
    })
}

fn parse_price(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, EngineError> {
    field(record, idx, name)?
        .trim()
        .parse()
        .map_err(|e| EngineError::Data {
            reason: format!("invalid {} value: {}", name, e),
        })
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, EngineError> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|e| EngineError::Data {
            reason: format!("invalid timestamp '{}': {}", raw, e),
        })
}

impl BrokerPort for PaperBroker {
    fn initialize(&mut self) -> Result<(), EngineError> {
        if !self.config.data_dir.is_dir() {
            return Err(EngineError::TerminalInit {
                reason: format!("data directory {} not found", self.config.data_dir.display()),
            });
        }
        self.connected = true;
        Ok(())
    }

    fn select_symbol(&mut self, symbol: &str) -> Result<(), EngineError> {
        let available = ALL_TIMEFRAMES
            .iter()
            .any(|tf| self.csv_path(symbol, *tf).is_file());
        if !available {
            return Err(EngineError::SymbolUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no bar files in {}", self.config.data_dir.display()),
            });
        }
        Ok(())
    }

    fn get_bars(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Vec<Bar> {
        match self.load_bars(symbol, timeframe) {
            Ok(bars) => {
                let start = bars.len().saturating_sub(count);
                bars[start..].to_vec()
            }
            Err(e) => {
                warn!(symbol, timeframe = %timeframe, error = %e, "bar fetch failed");
                Vec::new()
            }
        }
    }

    fn get_tick(&self, symbol: &str) -> Option<Tick> {
        let tf = ALL_TIMEFRAMES
            .iter()
            .copied()
            .find(|tf| self.csv_path(symbol, *tf).is_file())?;
        let bid = self.get_bars(symbol, tf, 1).last()?.close;
        let info = self.symbol_info(symbol);
        let ask = info.round_price(bid + info.pips_to_price(self.config.spread_pips));
        Some(Tick { bid, ask })
    }

    fn get_account(&self) -> Option<AccountInfo> {
        let mut equity = self.balance;
        for position in &self.positions {
            let tick = self.get_tick(&position.symbol)?;
            equity += self.position_profit(position, &tick, position.volume);
        }
        Some(AccountInfo {
            balance: self.balance,
            equity,
        })
    }

    fn get_symbol_info(&self, symbol: &str) -> Option<SymbolInfo> {
        self.connected.then(|| self.symbol_info(symbol))
    }

    fn get_open_positions(&self, symbol: &str, magic: u64) -> Vec<Position> {
        self.positions
            .iter()
            .filter(|p| p.symbol == symbol && p.magic == magic)
            .cloned()
            .collect()
    }

    fn submit_order(&mut self, request: &OrderRequest) -> OrderResult {
        if !self.connected {
            return OrderResult::rejected("terminal not connected");
        }
        let Some(tick) = self.get_tick(&request.symbol) else {
            return OrderResult::rejected("no quote");
        };
        if request.volume < self.config.volume_min || request.volume <= 0.0 {
            return OrderResult::rejected(format!("invalid volume {}", request.volume));
        }
        if !self.stop_ok(request.direction, request.stop_loss, &tick) {
            return OrderResult::rejected("invalid stops");
        }
        if !self.target_ok(request.direction, request.take_profit, &tick) {
            return OrderResult::rejected("invalid take profit");
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let fill = match request.direction {
            Direction::Bull => tick.ask,
            Direction::Bear => tick.bid,
        };
        self.positions.push(Position {
            ticket,
            symbol: request.symbol.clone(),
            side: request.direction,
            volume: request.volume,
            initial_volume: request.volume,
            entry_price: fill,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            magic: request.magic,
        });
        debug!(ticket, fill, volume = request.volume, "paper order filled");
        OrderResult::accepted(ticket)
    }

    fn modify_stop(&mut self, ticket: u64, stop_loss: f64, take_profit: f64) -> OrderResult {
        let Some(idx) = self.positions.iter().position(|p| p.ticket == ticket) else {
            return OrderResult::rejected(format!("unknown ticket {}", ticket));
        };
        let symbol = self.positions[idx].symbol.clone();
        let side = self.positions[idx].side;
        let Some(tick) = self.get_tick(&symbol) else {
            return OrderResult::rejected("no quote");
        };
        if !self.stop_ok(side, stop_loss, &tick) {
            return OrderResult::rejected("invalid stops");
        }
        let position = &mut self.positions[idx];
        position.stop_loss = stop_loss;
        position.take_profit = take_profit;
        OrderResult::accepted(ticket)
    }

    fn close_partial(&mut self, ticket: u64, volume: f64) -> OrderResult {
        let Some(idx) = self.positions.iter().position(|p| p.ticket == ticket) else {
            return OrderResult::rejected(format!("unknown ticket {}", ticket));
        };
        let position = self.positions[idx].clone();
        if volume <= 0.0 || volume > position.volume + 1e-9 {
            return OrderResult::rejected(format!("invalid close volume {}", volume));
        }
        let Some(tick) = self.get_tick(&position.symbol) else {
            return OrderResult::rejected("no quote");
        };

        self.balance += self.position_profit(&position, &tick, volume);
        let remaining = position.volume - volume;
        if remaining < self.config.volume_min.max(1e-9) - 1e-9 {
            self.positions.remove(idx);
        } else {
            self.positions[idx].volume = (remaining * 1e8).round() / 1e8;
        }
        OrderResult::accepted(ticket)
    }

    fn shutdown(&mut self) {
        self.connected = false;
    }
}
