#![allow(dead_code)]

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use structshift::adapters::file_config_adapter::FileConfigAdapter;
use structshift::domain::account::{AccountInfo, Tick};
use structshift::domain::bar::Bar;
use structshift::domain::engine_config::EngineConfig;
use structshift::domain::error::EngineError;
use structshift::domain::journal::JournalEntry;
use structshift::domain::position::Position;
use structshift::domain::signal::Direction;
use structshift::domain::snapshot::CycleSnapshot;
use structshift::domain::symbol::SymbolInfo;
use structshift::domain::timeframe::Timeframe;
use structshift::ports::broker_port::{BrokerPort, OrderRequest, OrderResult};
use structshift::ports::journal_port::JournalPort;
use structshift::ports::snapshot_port::SnapshotPort;

pub const MAGIC: u64 = 234000;

pub struct MockBroker {
    pub bars: HashMap<Timeframe, Vec<Bar>>,
    pub tick: Option<Tick>,
    pub account: Option<AccountInfo>,
    pub symbol: Option<SymbolInfo>,
    pub positions: Vec<Position>,
    pub reject_orders: Option<String>,
    pub reject_modifications: bool,
    pub fail_init: bool,
    pub panic_on_bars: bool,
    pub orders: Vec<OrderRequest>,
    pub modifications: Vec<(u64, f64, f64)>,
    pub closes: Vec<(u64, f64)>,
    pub shut_down: bool,
    next_ticket: u64,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            tick: None,
            account: Some(AccountInfo {
                balance: 10000.0,
                equity: 10000.0,
            }),
            symbol: Some(eurusd()),
            positions: Vec::new(),
            reject_orders: None,
            reject_modifications: false,
            fail_init: false,
            panic_on_bars: false,
            orders: Vec::new(),
            modifications: Vec::new(),
            closes: Vec::new(),
            shut_down: false,
            next_ticket: 5000,
        }
    }

    pub fn with_bars(mut self, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.bars.insert(timeframe, bars);
        self
    }

    pub fn with_tick(mut self, bid: f64, ask: f64) -> Self {
        self.tick = Some(Tick { bid, ask });
        self
    }

    pub fn with_account(mut self, balance: f64, equity: f64) -> Self {
        self.account = Some(AccountInfo { balance, equity });
        self
    }

    pub fn without_account(mut self) -> Self {
        self.account = None;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.positions.push(position);
        self
    }

    pub fn rejecting_orders(mut self, reason: &str) -> Self {
        self.reject_orders = Some(reason.to_string());
        self
    }
}

impl BrokerPort for MockBroker {
    fn initialize(&mut self) -> Result<(), EngineError> {
        if self.fail_init {
            return Err(EngineError::TerminalInit {
                reason: "terminal not running".into(),
            });
        }
        Ok(())
    }

    fn select_symbol(&mut self, _symbol: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn get_bars(&self, _symbol: &str, timeframe: Timeframe, count: usize) -> Vec<Bar> {
        if self.panic_on_bars {
            panic!("terminal exploded");
        }
        let bars = self.bars.get(&timeframe).cloned().unwrap_or_default();
        let start = bars.len().saturating_sub(count);
        bars[start..].to_vec()
    }

    fn get_tick(&self, _symbol: &str) -> Option<Tick> {
        self.tick
    }

    fn get_account(&self) -> Option<AccountInfo> {
        self.account
    }

    fn get_symbol_info(&self, _symbol: &str) -> Option<SymbolInfo> {
        self.symbol.clone()
    }

    fn get_open_positions(&self, symbol: &str, magic: u64) -> Vec<Position> {
        self.positions
            .iter()
            .filter(|p| p.symbol == symbol && p.magic == magic)
            .cloned()
            .collect()
    }

    fn submit_order(&mut self, request: &OrderRequest) -> OrderResult {
        self.orders.push(request.clone());
        if let Some(reason) = &self.reject_orders {
            return OrderResult::rejected(reason.clone());
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.positions.push(Position {
            ticket,
            symbol: request.symbol.clone(),
            side: request.direction,
            volume: request.volume,
            initial_volume: request.volume,
            entry_price: request.price,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            magic: request.magic,
        });
        OrderResult::accepted(ticket)
    }

    fn modify_stop(&mut self, ticket: u64, stop_loss: f64, take_profit: f64) -> OrderResult {
        self.modifications.push((ticket, stop_loss, take_profit));
        if self.reject_modifications {
            return OrderResult::rejected("invalid stops");
        }
        match self.positions.iter_mut().find(|p| p.ticket == ticket) {
            Some(p) => {
                p.stop_loss = stop_loss;
                p.take_profit = take_profit;
                OrderResult::accepted(ticket)
            }
            None => OrderResult::rejected("unknown ticket"),
        }
    }

    fn close_partial(&mut self, ticket: u64, volume: f64) -> OrderResult {
        self.closes.push((ticket, volume));
        let Some(idx) = self.positions.iter().position(|p| p.ticket == ticket) else {
            return OrderResult::rejected("unknown ticket");
        };
        let remaining = self.positions[idx].volume - volume;
        if remaining <= 1e-9 {
            self.positions.remove(idx);
        } else {
            self.positions[idx].volume = (remaining * 1e8).round() / 1e8;
        }
        OrderResult::accepted(ticket)
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}

#[derive(Default)]
pub struct MemoryJournal {
    pub entries: Vec<JournalEntry>,
    pub fail: bool,
}

impl JournalPort for MemoryJournal {
    fn append(&mut self, entry: &JournalEntry) -> Result<(), EngineError> {
        if self.fail {
            return Err(EngineError::Journal {
                reason: "disk full".into(),
            });
        }
        self.entries.push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySnapshots {
    pub published: Vec<CycleSnapshot>,
}

impl SnapshotPort for MemorySnapshots {
    fn publish(&mut self, snapshot: &CycleSnapshot) -> Result<(), EngineError> {
        self.published.push(snapshot.clone());
        Ok(())
    }
}

pub fn eurusd() -> SymbolInfo {
    SymbolInfo {
        name: "EURUSD".into(),
        digits: 5,
        point: 0.00001,
        tick_size: 0.00001,
        tick_value: 1.0,
        min_stop_distance: 0.0,
        volume_min: 0.01,
        volume_step: 0.01,
    }
}

/// Engine configuration from INI text appended to a minimal `[engine]` block.
pub fn engine_config(timeframes: &str, extra: &str) -> EngineConfig {
    let ini = format!("[engine]\nsymbol = EURUSD\ntimeframes = {timeframes}\n{extra}");
    let adapter = FileConfigAdapter::from_string(&ini).unwrap();
    let mut config = EngineConfig::from_config(&adapter).unwrap();
    config.update_interval = std::time::Duration::ZERO;
    config
}

pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn bars_from_highs_lows(rows: &[(f64, f64)]) -> Vec<Bar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(high, low))| Bar {
            timestamp: at(1, 0) + chrono::Duration::hours(i as i64),
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
        })
        .collect()
}

/// Lower high 1.2050 and lower low 1.1700, then a close at 1.2150.
pub fn downtrend_then_bull_break() -> Vec<Bar> {
    let mut bars = bars_from_highs_lows(&[
        (1.2000, 1.1900),
        (1.2100, 1.1950),
        (1.2000, 1.1800),
        (1.2050, 1.1850),
        (1.1950, 1.1700),
        (1.2000, 1.1800),
    ]);
    if let Some(last) = bars.last_mut() {
        last.open = 1.1900;
        last.high = 1.2200;
        last.close = 1.2150;
    }
    bars
}

/// Higher high 1.2100 and higher low 1.1880, then a close at 1.1850.
pub fn uptrend_then_bear_break() -> Vec<Bar> {
    let mut bars = bars_from_highs_lows(&[
        (1.1900, 1.1800),
        (1.2000, 1.1850),
        (1.1950, 1.1820),
        (1.2100, 1.1900),
        (1.2050, 1.1880),
        (1.2060, 1.1950),
        (1.2070, 1.1800),
    ]);
    if let Some(last) = bars.last_mut() {
        last.open = 1.2000;
        last.close = 1.1850;
    }
    bars
}

pub fn open_long(ticket: u64, entry: f64, stop: f64) -> Position {
    Position {
        ticket,
        symbol: "EURUSD".into(),
        side: Direction::Bull,
        volume: 1.0,
        initial_volume: 1.0,
        entry_price: entry,
        stop_loss: stop,
        take_profit: entry + 0.0100,
        magic: MAGIC,
    }
}
