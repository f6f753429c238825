//! Sliding-window trade volume per token
//!
//! Each trade lands in a short (60 s) and a long (300 s) window. Windows are
//! append-ordered and pruned oldest-first; an entry survives while
//! `now - observed_at <= horizon`. Per-token buckets live in a `DashMap`, so
//! concurrent appends to one token serialize on its shard lock.

use crate::core::events::{TradeDirection, TradeEvent};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::VecDeque;

pub const SHORT_HORIZON_SECS: i64 = 60;
pub const LONG_HORIZON_SECS: i64 = 300;

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    observed_at: DateTime<Utc>,
    direction: TradeDirection,
    amount: u64,
    sol_amount: Option<u64>,
}

#[derive(Debug, Default)]
struct TokenWindows {
    short: VecDeque<WindowEntry>,
    long: VecDeque<WindowEntry>,
}

impl TokenWindows {
    fn prune(&mut self, now: DateTime<Utc>, short: TimeDelta, long: TimeDelta) {
        prune_front(&mut self.short, now, short);
        prune_front(&mut self.long, now, long);
    }

    fn is_empty(&self) -> bool {
        self.short.is_empty() && self.long.is_empty()
    }
}

#[inline]
fn prune_front(window: &mut VecDeque<WindowEntry>, now: DateTime<Utc>, horizon: TimeDelta) {
    while window.front().is_some_and(|e| now - e.observed_at > horizon) {
        window.pop_front();
    }
}

/// Counts and summed amounts over one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStats {
    pub buys: u64,
    pub sells: u64,
    pub buy_amount: u128,
    pub sell_amount: u128,
    /// Sum of known lamport amounts (trades decoded from logs)
    pub sol_volume: u128,
}

impl WindowStats {
    fn from_window(window: &VecDeque<WindowEntry>) -> Self {
        let mut stats = WindowStats::default();
        for entry in window {
            match entry.direction {
                TradeDirection::Buy => {
                    stats.buys += 1;
                    stats.buy_amount += entry.amount as u128;
                }
                TradeDirection::Sell => {
                    stats.sells += 1;
                    stats.sell_amount += entry.amount as u128;
                }
            }
            stats.sol_volume += entry.sol_amount.unwrap_or(0) as u128;
        }
        stats
    }

    pub fn trades(&self) -> u64 {
        self.buys + self.sells
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSnapshot {
    pub mint: Pubkey,
    pub short: WindowStats,
    pub long: WindowStats,
}

#[derive(Debug)]
pub struct TradeAggregator {
    windows: DashMap<Pubkey, TokenWindows>,
    short_horizon: TimeDelta,
    long_horizon: TimeDelta,
}

impl Default for TradeAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeAggregator {
    pub fn new() -> Self {
        Self::with_horizons(
            TimeDelta::seconds(SHORT_HORIZON_SECS),
            TimeDelta::seconds(LONG_HORIZON_SECS),
        )
    }

    pub fn with_horizons(short_horizon: TimeDelta, long_horizon: TimeDelta) -> Self {
        Self { windows: DashMap::new(), short_horizon, long_horizon }
    }

    /// Appends the trade to both windows of its token.
    pub fn record(&self, event: &TradeEvent) {
        let entry = WindowEntry {
            observed_at: event.observed_at,
            direction: event.direction,
            amount: event.amount,
            sol_amount: event.sol_amount,
        };
        let mut windows = self.windows.entry(event.mint).or_default();
        windows.short.push_back(entry);
        windows.long.push_back(entry);
    }

    /// Drops expired entries; tokens left with two empty windows are forgotten.
    pub fn prune(&self, now: DateTime<Utc>) {
        let (short, long) = (self.short_horizon, self.long_horizon);
        self.windows.retain(|_, w| {
            w.prune(now, short, long);
            !w.is_empty()
        });
    }

    pub fn snapshot(&self, mint: &Pubkey) -> Option<VolumeSnapshot> {
        self.windows.get(mint).map(|w| VolumeSnapshot {
            mint: *mint,
            short: WindowStats::from_window(&w.short),
            long: WindowStats::from_window(&w.long),
        })
    }

    /// Snapshots of every tracked token, busiest short window first.
    pub fn snapshots(&self) -> Vec<VolumeSnapshot> {
        let mut out: Vec<VolumeSnapshot> = self
            .windows
            .iter()
            .map(|w| VolumeSnapshot {
                mint: *w.key(),
                short: WindowStats::from_window(&w.short),
                long: WindowStats::from_window(&w.long),
            })
            .collect();
        out.sort_by(|a, b| b.short.trades().cmp(&a.short.trades()));
        out
    }

    pub fn tracked_tokens(&self) -> usize {
        self.windows.len()
    }

    /// (short, long) entry counts for one token.
    pub fn window_lengths(&self, mint: &Pubkey) -> (usize, usize) {
        self.windows.get(mint).map(|w| (w.short.len(), w.long.len())).unwrap_or((0, 0))
    }
}
