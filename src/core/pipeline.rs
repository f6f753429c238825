//! 事件管道 - 通知到事件的单一入口
//!
//! One notification is fully decoded and dispatched before the next is read, so
//! events leave the pipeline in arrival order. Block notifications go through the
//! transaction parser; log notifications through the program-log scanner. Only
//! instructions named in the interest list become events.

use crate::core::aggregator::TradeAggregator;
use crate::core::cache::SignatureCache;
use crate::core::events::*;
use crate::core::pricer::PriceService;
use crate::logs::{scan_program_logs, LogEvent};
use crate::tx_parser::{RawTransaction, TransactionParser};
use crate::ws::{Notification, NotificationHandler, SessionState, TopicKind};
use async_trait::async_trait;
use chrono::Utc;
use crossbeam_queue::ArrayQueue;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use smallvec::SmallVec;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::Arc;

/// Counters for one pipeline; never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub notifications: u64,
    pub transactions: u64,
    pub duplicates: u64,
    pub failed_transactions: u64,
    pub decode_errors: u64,
    pub events: u64,
    pub dropped: u64,
}

pub struct EventPipeline {
    parser: TransactionParser,
    /// base58 program id, for log attribution
    program: String,
    interest: Vec<String>,
    aggregator: Arc<TradeAggregator>,
    seen: SignatureCache,
    queue: Arc<ArrayQueue<PumpEvent>>,
    prices: Option<PriceService>,
    stats: PipelineStats,
}

impl EventPipeline {
    pub fn new(
        parser: TransactionParser,
        instructions_of_interest: Vec<String>,
        aggregator: Arc<TradeAggregator>,
        queue: Arc<ArrayQueue<PumpEvent>>,
        seen_capacity: usize,
    ) -> Self {
        Self {
            program: parser.program_id().to_string(),
            parser,
            interest: instructions_of_interest,
            aggregator,
            seen: SignatureCache::new(seen_capacity),
            queue,
            prices: None,
            stats: PipelineStats::default(),
        }
    }

    /// New tokens get a detached bonding-curve price lookup.
    pub fn with_price_service(mut self, prices: PriceService) -> Self {
        self.prices = Some(prices);
        self
    }

    pub fn queue(&self) -> &Arc<ArrayQueue<PumpEvent>> {
        &self.queue
    }

    pub fn aggregator(&self) -> &Arc<TradeAggregator> {
        &self.aggregator
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    #[inline]
    fn interested(&self, name: &str) -> bool {
        self.interest.iter().any(|n| n == name)
    }

    /// Dispatches one notification; returns the number of events emitted.
    pub fn handle(&mut self, notification: &Notification) -> usize {
        self.stats.notifications += 1;
        match notification.kind {
            TopicKind::Blocks => self.process_block(&notification.value, notification.slot),
            TopicKind::Logs => self.process_logs(&notification.value, notification.slot),
        }
    }

    /// `blockNotification` value: `{"slot":..,"block":{"transactions":[..]}}`.
    pub fn process_block(&mut self, value: &Value, context_slot: Option<u64>) -> usize {
        let slot = value.get("slot").and_then(Value::as_u64).or(context_slot).unwrap_or(0);
        let transactions = value
            .get("block")
            .and_then(|b| b.get("transactions"))
            .and_then(Value::as_array);

        let mut emitted = 0;
        if let Some(transactions) = transactions {
            for (tx_index, tx) in transactions.iter().enumerate() {
                match RawTransaction::deserialize(tx) {
                    Ok(raw) => emitted += self.process_transaction(&raw, slot, tx_index as u64),
                    Err(e) => {
                        self.stats.decode_errors += 1;
                        warn!("slot {} tx #{}: malformed transaction entry: {}", slot, tx_index, e);
                    }
                }
            }
        } else if let Some(err) = value.get("err").filter(|e| !e.is_null()) {
            warn!("block notification for slot {} carries error: {}", slot, err);
        }

        self.aggregator.prune(Utc::now());
        emitted
    }

    /// Decodes one transaction of a block notification.
    pub fn process_transaction(&mut self, raw: &RawTransaction, slot: u64, tx_index: u64) -> usize {
        self.stats.transactions += 1;
        if raw.is_failed() {
            self.stats.failed_transactions += 1;
            return 0;
        }

        let parsed = match self.parser.parse(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!("slot {} tx #{}: {}", slot, tx_index, e);
                return 0;
            }
        };
        if !self.seen.insert(parsed.signature) {
            self.stats.duplicates += 1;
            return 0;
        }
        for skipped in &parsed.skipped {
            self.stats.decode_errors += 1;
            warn!("{} instruction #{} skipped: {}", parsed.signature, skipped.index, skipped.error);
        }

        let metadata = EventMetadata {
            signature: parsed.signature,
            slot,
            tx_index,
            recv_us: Utc::now().timestamp_micros(),
        };
        let observed_at = Utc::now();

        // TradeEvent logs carry the lamports actually moved
        let scanned = scan_program_logs(self.parser.descriptor(), &self.program, raw.log_messages());
        let mut log_trades: Vec<Option<TradeEvent>> = scanned
            .events
            .iter()
            .filter(|e| e.name == "TradeEvent")
            .map(|e| TradeEvent::from_log(metadata.clone(), &e.fields, observed_at).ok())
            .collect();

        let mut events: SmallVec<[PumpEvent; 4]> = SmallVec::new();
        for ix in &parsed.instructions {
            let (name, args) = match ix {
                DecodedInstruction::Matched { name, args, .. } => (name, args),
                DecodedInstruction::Unknown { data, .. } => {
                    debug!(
                        "{}: unknown instruction discriminator {}",
                        parsed.signature,
                        hex::encode(&data[..data.len().min(8)])
                    );
                    continue;
                }
                DecodedInstruction::External { .. } => continue,
            };
            if !self.interested(name) {
                continue;
            }
            let event = match name.as_str() {
                "create" => TokenCreatedEvent::from_decoded(name, metadata.clone(), args, EventSource::Instruction)
                    .map(PumpEvent::TokenCreated),
                "buy" | "sell" => TradeEvent::from_instruction(name, metadata.clone(), args, observed_at).map(|mut trade| {
                    let logged = log_trades.iter_mut().find(|t| {
                        t.as_ref().is_some_and(|t| t.mint == trade.mint && t.direction == trade.direction)
                    });
                    if let Some(logged) = logged.and_then(Option::take) {
                        trade.sol_amount = logged.sol_amount;
                    }
                    PumpEvent::Trade(trade)
                }),
                other => {
                    debug!("{}: `{}` has no event mapping", parsed.signature, other);
                    continue;
                }
            };
            match event {
                Ok(event) => events.push(event),
                Err(e) => {
                    self.stats.decode_errors += 1;
                    warn!("{}: {}", parsed.signature, e);
                }
            }
        }
        for event in scanned.events.iter().filter(|e| e.name == "CompleteEvent") {
            if let Some(complete) = self.complete_event(metadata.clone(), event) {
                events.push(PumpEvent::CurveComplete(complete));
            }
        }

        self.emit_all(events)
    }

    /// `logsNotification` value: `{"signature":..,"err":..,"logs":[..]}`.
    pub fn process_logs(&mut self, value: &Value, slot: Option<u64>) -> usize {
        self.stats.transactions += 1;
        if value.get("err").is_some_and(|e| !e.is_null()) {
            self.stats.failed_transactions += 1;
            return 0;
        }
        let signature = match value.get("signature").and_then(Value::as_str).map(Signature::from_str) {
            Some(Ok(signature)) => signature,
            _ => {
                self.stats.decode_errors += 1;
                warn!("logs notification without a valid signature");
                return 0;
            }
        };
        if !self.seen.insert(signature) {
            self.stats.duplicates += 1;
            return 0;
        }

        let logs: Vec<&str> = value
            .get("logs")
            .and_then(Value::as_array)
            .map(|lines| lines.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let scanned = scan_program_logs(self.parser.descriptor(), &self.program, &logs);
        for e in &scanned.errors {
            self.stats.decode_errors += 1;
            warn!("{}: program data: {}", signature, e);
        }
        if !scanned.mentions_any(&self.interest) {
            self.aggregator.prune(Utc::now());
            return 0;
        }

        let metadata = EventMetadata {
            signature,
            slot: slot.unwrap_or(0),
            tx_index: 0,
            recv_us: Utc::now().timestamp_micros(),
        };
        let observed_at = Utc::now();

        let mut events: SmallVec<[PumpEvent; 4]> = SmallVec::new();
        for event in &scanned.events {
            let decoded = match event.name.as_str() {
                "CreateEvent" if self.interested("create") => TokenCreatedEvent::from_decoded(
                    &event.name,
                    metadata.clone(),
                    &event.fields,
                    EventSource::Log,
                )
                .map(PumpEvent::TokenCreated),
                "TradeEvent" => match TradeEvent::from_log(metadata.clone(), &event.fields, observed_at) {
                    Ok(trade) if self.interested(trade.direction.as_instruction()) => Ok(PumpEvent::Trade(trade)),
                    Ok(_) => continue,
                    Err(e) => Err(e),
                },
                "CompleteEvent" => match self.complete_event(metadata.clone(), event) {
                    Some(complete) => Ok(PumpEvent::CurveComplete(complete)),
                    None => continue,
                },
                _ => continue,
            };
            match decoded {
                Ok(event) => events.push(event),
                Err(e) => {
                    self.stats.decode_errors += 1;
                    warn!("{}: {}", signature, e);
                }
            }
        }

        let emitted = self.emit_all(events);
        self.aggregator.prune(Utc::now());
        emitted
    }

    fn complete_event(&mut self, metadata: EventMetadata, event: &LogEvent) -> Option<CurveCompleteEvent> {
        match CurveCompleteEvent::from_log(metadata, &event.fields) {
            Ok(complete) => Some(complete),
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!("CompleteEvent: {}", e);
                None
            }
        }
    }

    fn emit_all(&mut self, events: SmallVec<[PumpEvent; 4]>) -> usize {
        let count = events.len();
        for event in events {
            self.emit(event);
        }
        count
    }

    fn emit(&mut self, event: PumpEvent) {
        match &event {
            PumpEvent::Trade(trade) => self.aggregator.record(trade),
            PumpEvent::TokenCreated(created) => {
                info!(
                    "new token {} ({}) mint={} curve={}",
                    created.name, created.symbol, created.mint, created.bonding_curve
                );
                if let Some(prices) = &self.prices {
                    prices.spawn_lookup(created.mint, created.bonding_curve, self.queue.clone());
                }
            }
            _ => {}
        }
        self.stats.events += 1;
        if self.queue.push(event).is_err() {
            self.stats.dropped += 1;
            warn!("event queue full, dropping event");
        }
    }
}

#[async_trait]
impl NotificationHandler for EventPipeline {
    async fn on_notification(&mut self, notification: Notification) {
        self.handle(&notification);
    }

    async fn on_state_change(&mut self, state: SessionState) {
        debug!("subscription state -> {:?}", state);
    }
}
