//! Per-cycle orchestration and the control loop.
//!
//! One cycle: drawdown gate, management sweep over open positions, signal
//! evaluation on every timeframe, then at most one entry (position limit,
//! sizing, order, latch, journal). Data gaps, sizing fallbacks and broker
//! rejections are logged and absorbed; a cycle never returns an error.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, error, info, warn};

use crate::domain::account::{AccountInfo, Tick};
use crate::domain::aggregator::Decision;
use crate::domain::bar::Bar;
use crate::domain::drawdown::{DrawdownGate, GateVerdict};
use crate::domain::engine_config::EngineConfig;
use crate::domain::error::EngineError;
use crate::domain::indicator::calculate_atr;
use crate::domain::journal::JournalEntry;
use crate::domain::management::{ManagementAction, evaluate_position};
use crate::domain::signal::Direction;
use crate::domain::sizing::{SizingInput, TradePlan, plan_trade};
use crate::domain::snapshot::{CycleSnapshot, DecisionRecord, EntryOutcome};
use crate::domain::strategy::Strategy;
use crate::domain::symbol::SymbolInfo;
use crate::domain::timeframe::Timeframe;
use crate::ports::broker_port::{BrokerPort, OrderRequest};
use crate::ports::journal_port::JournalPort;
use crate::ports::snapshot_port::SnapshotPort;

/// Upper bound on the pause after a failed cycle.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

const SLEEP_SLICE: Duration = Duration::from_millis(200);

pub struct Engine {
    config: EngineConfig,
    strategy: Strategy,
    gate: DrawdownGate,
    symbol_info: Option<SymbolInfo>,
    last_decision: Option<DecisionRecord>,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let strategy = Strategy::from_kind(
            config.strategy,
            &config.timeframes,
            config.structure.clone(),
            config.stochastic.clone(),
        );
        let gate = DrawdownGate::new(config.daily_drawdown_limit_pct);
        Engine {
            config,
            strategy,
            gate,
            symbol_info: None,
            last_decision: None,
            clock: local_now,
        }
    }

    /// Replaces the wall clock used by [`Engine::run`].
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Connects to the terminal and resolves the symbol. Any failure here is
    /// fatal and the loop must not start.
    pub fn initialize(&mut self, broker: &mut dyn BrokerPort) -> Result<SymbolInfo, EngineError> {
        broker.initialize()?;
        broker.select_symbol(&self.config.symbol)?;
        let symbol = broker
            .get_symbol_info(&self.config.symbol)
            .ok_or_else(|| EngineError::SymbolUnavailable {
                symbol: self.config.symbol.clone(),
                reason: "no symbol info".into(),
            })?;
        info!(
            symbol = %symbol.name,
            digits = symbol.digits,
            point = symbol.point,
            strategy = %self.strategy.kind(),
            "terminal initialised"
        );
        self.symbol_info = Some(symbol.clone());
        Ok(symbol)
    }

    pub fn run_cycle(
        &mut self,
        broker: &mut dyn BrokerPort,
        journal: &mut dyn JournalPort,
        now: NaiveDateTime,
    ) -> CycleSnapshot {
        let symbol_name = self.config.symbol.clone();
        let mut snapshot = CycleSnapshot::new(now, &symbol_name, self.strategy.info());
        snapshot.last_decision = self.last_decision.clone();

        if let Some(fresh) = broker.get_symbol_info(&symbol_name) {
            self.symbol_info = Some(fresh);
        }
        let Some(symbol) = self.symbol_info.clone() else {
            warn!(symbol = %symbol_name, "no symbol info, skipping cycle");
            return snapshot;
        };

        let account = broker.get_account();
        let verdict = self.gate.check(account.as_ref());
        snapshot.account = account;
        snapshot.drawdown_pct = verdict.drawdown_pct();
        snapshot.entries_blocked = !verdict.allows_entries();
        match verdict {
            GateVerdict::Blocked {
                drawdown_pct,
                limit_pct,
            } => warn!(drawdown_pct, limit_pct, "daily drawdown limit reached, entries blocked"),
            GateVerdict::Unknown => warn!("account info unavailable, entries blocked this cycle"),
            _ => {}
        }

        let tick = broker.get_tick(&symbol_name);
        snapshot.mid_price = tick.map(|t| t.mid());

        snapshot.management = self.manage_positions(broker, tick.as_ref(), &symbol);

        let windows = self.fetch_windows(broker);
        let evaluation = self
            .strategy
            .calculate_signals(&windows, &symbol, now.date());
        snapshot.record_evaluation(&evaluation);
        if let Some(decision) = &evaluation.decision {
            self.last_decision = Some(DecisionRecord {
                timestamp: now,
                decision: decision.clone(),
            });
            snapshot.last_decision = self.last_decision.clone();
        }

        if let Some(decision) = evaluation.decision {
            snapshot.entry = self.try_entry(
                broker,
                journal,
                EntryContext {
                    decision: &decision,
                    verdict,
                    account: account.as_ref(),
                    tick: tick.as_ref(),
                    symbol: &symbol,
                    windows: &windows,
                    now,
                },
            );
        }

        snapshot.positions = broker.get_open_positions(&symbol_name, self.config.magic);
        snapshot
    }

    /// Runs cycles until `stop` is set or `max_cycles` have completed.
    /// Returns the number of cycles run.
    pub fn run(
        &mut self,
        broker: &mut dyn BrokerPort,
        journal: &mut dyn JournalPort,
        mut snapshots: Option<&mut dyn SnapshotPort>,
        stop: &AtomicBool,
        max_cycles: Option<u64>,
    ) -> u64 {
        let interval = self.config.update_interval;
        let backoff = interval.min(MAX_BACKOFF);
        let mut cycles = 0u64;

        info!(
            symbol = %self.config.symbol,
            interval_secs = interval.as_secs(),
            "control loop started"
        );

        while !stop.load(Ordering::Relaxed) {
            let now = (self.clock)();
            let outcome = catch_unwind(AssertUnwindSafe(|| self.run_cycle(broker, journal, now)));
            cycles += 1;

            let pause = match outcome {
                Ok(snapshot) => {
                    if let Some(sink) = snapshots.as_deref_mut() {
                        if let Err(e) = sink.publish(&snapshot) {
                            warn!(error = %e, "failed to publish snapshot");
                        }
                    }
                    interval
                }
                Err(panic) => {
                    error!(
                        cycle = cycles,
                        reason = %panic_message(panic.as_ref()),
                        "cycle aborted, backing off"
                    );
                    backoff
                }
            };

            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }
            if stop.load(Ordering::Relaxed) {
                break;
            }
            sleep_unless_stopped(pause, stop);
        }

        broker.shutdown();
        info!(cycles, "control loop stopped");
        cycles
    }

    fn fetch_windows(&self, broker: &dyn BrokerPort) -> HashMap<Timeframe, Vec<Bar>> {
        self.config
            .timeframes
            .iter()
            .map(|&tf| {
                let bars = broker.get_bars(&self.config.symbol, tf, self.config.lookback);
                if bars.is_empty() {
                    warn!(timeframe = %tf, "no bars returned");
                }
                (tf, bars)
            })
            .collect()
    }

    /// Applies management actions to every open position. Returns the
    /// actions the broker accepted.
    fn manage_positions(
        &self,
        broker: &mut dyn BrokerPort,
        tick: Option<&Tick>,
        symbol: &SymbolInfo,
    ) -> Vec<ManagementAction> {
        let positions = broker.get_open_positions(&self.config.symbol, self.config.magic);
        if positions.is_empty() {
            return Vec::new();
        }
        let Some(tick) = tick else {
            warn!(positions = positions.len(), "no quote, skipping position management");
            return Vec::new();
        };

        let mut applied = Vec::new();
        for position in &positions {
            for action in evaluate_position(position, tick, symbol, &self.config.management) {
                let result = match &action {
                    ManagementAction::ModifyStop {
                        ticket,
                        new_stop,
                        take_profit,
                        ..
                    } => broker.modify_stop(*ticket, *new_stop, *take_profit),
                    ManagementAction::ClosePartial { ticket, volume, .. } => {
                        broker.close_partial(*ticket, *volume)
                    }
                };
                if result.accepted {
                    info!(ticket = position.ticket, action = ?action, "position updated");
                    applied.push(action);
                } else {
                    warn!(
                        ticket = position.ticket,
                        action = ?action,
                        reason = %result.reason,
                        "position update rejected"
                    );
                }
            }
        }
        applied
    }

    fn try_entry(
        &mut self,
        broker: &mut dyn BrokerPort,
        journal: &mut dyn JournalPort,
        ctx: EntryContext<'_>,
    ) -> EntryOutcome {
        let decision = ctx.decision;
        if !ctx.verdict.allows_entries() {
            return blocked("drawdown gate");
        }

        let open = broker
            .get_open_positions(&self.config.symbol, self.config.magic)
            .len();
        if open >= self.config.max_positions {
            debug!(open, max = self.config.max_positions, "position limit reached");
            return blocked("max positions");
        }

        let Some(tick) = ctx.tick else {
            warn!("no quote, entry skipped");
            return blocked("no quote");
        };

        let entry = match decision.direction {
            Direction::Bull => tick.ask,
            Direction::Bear => tick.bid,
        };
        let exec_bars = ctx
            .windows
            .get(&self.config.execution_timeframe())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let input = SizingInput {
            direction: decision.direction,
            entry,
            atr: calculate_atr(exec_bars, self.config.atr_period),
            reference_high: decision.reference_high,
            reference_low: decision.reference_low,
            structure_buffer: ctx.symbol.pips_to_price(self.strategy.stop_buffer_pips()),
            force_structure: self.strategy.requires_structure_stop(),
            balance: ctx.account.map(|a| a.balance),
        };
        let plan = plan_trade(&input, &self.config.risk, ctx.symbol);

        let request = OrderRequest {
            symbol: self.config.symbol.clone(),
            direction: plan.direction,
            volume: plan.volume,
            price: plan.entry,
            stop_loss: plan.stop_loss,
            take_profit: plan.take_profit,
            magic: self.config.magic,
            comment: format!("{} {}", self.strategy.kind(), decision.timeframe),
        };
        let result = broker.submit_order(&request);
        if !result.accepted {
            warn!(
                direction = %plan.direction,
                entry = plan.entry,
                stop_loss = plan.stop_loss,
                take_profit = plan.take_profit,
                volume = plan.volume,
                timeframe = %decision.timeframe,
                reason = %result.reason,
                "order rejected"
            );
            return EntryOutcome::Rejected {
                reason: result.reason,
                plan,
            };
        }

        self.strategy.mark_fired(decision.timeframe, ctx.now.date());
        info!(
            ticket = result.ticket,
            direction = %plan.direction,
            entry = plan.entry,
            stop_loss = plan.stop_loss,
            take_profit = plan.take_profit,
            volume = plan.volume,
            stop_mode = ?plan.stop_mode,
            timeframe = %decision.timeframe,
            "order placed"
        );
        self.journal_entry(journal, ctx.now, &plan, result.ticket, ctx.account);

        EntryOutcome::Placed {
            ticket: result.ticket,
            plan,
        }
    }

    fn journal_entry(
        &self,
        journal: &mut dyn JournalPort,
        now: NaiveDateTime,
        plan: &TradePlan,
        ticket: u64,
        account: Option<&AccountInfo>,
    ) {
        let balance = account.map(|a| a.balance).unwrap_or(0.0);
        let entry = JournalEntry::from_plan(now, &self.config.symbol, plan, ticket, balance);
        if let Err(e) = journal.append(&entry) {
            error!(ticket, error = %e, "failed to write journal entry");
        }
    }
}

struct EntryContext<'a> {
    decision: &'a Decision,
    verdict: GateVerdict,
    account: Option<&'a AccountInfo>,
    tick: Option<&'a Tick>,
    symbol: &'a SymbolInfo,
    windows: &'a HashMap<Timeframe, Vec<Bar>>,
    now: NaiveDateTime,
}

fn blocked(reason: &str) -> EntryOutcome {
    EntryOutcome::Blocked {
        reason: reason.to_string(),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Sleeps for `duration`, waking early once `stop` is set.
pub fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
