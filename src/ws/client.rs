use super::transport::{Connection, Connector, Frame, TungsteniteConnector};
use super::types::*;
use crate::accounts::RpcAccountFetcher;
use crate::core::aggregator::TradeAggregator;
use crate::core::events::PumpEvent;
use crate::core::pipeline::EventPipeline;
use crate::core::pricer::PriceService;
use crate::error::{DescriptorError, StreamError};
use crate::idl::InterfaceDescriptor;
use crate::tx_parser::TransactionParser;
use async_trait::async_trait;
use crossbeam_queue::ArrayQueue;
use log::{debug, error, info, warn};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

/// `Disconnected → Connecting → Subscribed → (Active ⇄ AwaitingData) → Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Subscription requests sent, waiting for every acknowledgement
    Subscribed,
    Active,
    /// A receive wait ran out; a ping was sent and the connection is still considered live
    AwaitingData,
}

/// Consumer of the notification stream.
#[async_trait]
pub trait NotificationHandler: Send {
    async fn on_notification(&mut self, notification: Notification);

    async fn on_state_change(&mut self, _state: SessionState) {}
}

/// Per-connection state; rebuilt on every reconnect.
pub struct SubscriptionSession<C> {
    conn: C,
    last_activity: Instant,
    last_ping: Instant,
    /// subscription id -> topic
    subscriptions: HashMap<u64, TopicKind>,
}

impl<C: Connection> SubscriptionSession<C> {
    fn new(conn: C) -> Self {
        let now = Instant::now();
        Self { conn, last_activity: now, last_ping: now, subscriptions: HashMap::new() }
    }

    /// Topic acknowledged under `subscription` on this connection.
    fn topic(&self, subscription: u64) -> Option<TopicKind> {
        self.subscriptions.get(&subscription).copied()
    }

    async fn ping(&mut self) -> Result<(), StreamError> {
        self.conn.send(Frame::Ping(Vec::new())).await?;
        self.last_ping = Instant::now();
        Ok(())
    }
}

/// 0 disables the timer
fn millis_or_never(ms: u64) -> Duration {
    if ms == 0 {
        Duration::from_secs(u32::MAX as u64)
    } else {
        Duration::from_millis(ms)
    }
}

/// A JSON-RPC error reply; rate limits get their own variant.
fn rpc_error(code: i64, message: &str) -> StreamError {
    let lower = message.to_ascii_lowercase();
    if code == 429 || lower.contains("rate limit") || lower.contains("too many requests") {
        StreamError::RateLimited
    } else {
        StreamError::Protocol(format!("rpc error {}: {}", code, message))
    }
}

pub struct StreamSubscriber<K> {
    connector: K,
    endpoint: String,
    topics: Vec<Topic>,
    config: ClientConfig,
    state: SessionState,
    sessions: u64,
}

impl<K: Connector> StreamSubscriber<K> {
    pub fn new(connector: K, endpoint: impl Into<String>, topics: Vec<Topic>, config: ClientConfig) -> Self {
        Self {
            connector,
            endpoint: endpoint.into(),
            topics,
            config,
            state: SessionState::Disconnected,
            sessions: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connections attempted so far.
    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    async fn transition<H: NotificationHandler>(&mut self, next: SessionState, handler: &mut H) {
        if self.state != next {
            self.state = next;
            handler.on_state_change(next).await;
        }
    }

    /// Connect, subscribe and dispatch until `shutdown` flips to `true` (or its sender is dropped).
    /// Recoverable errors never end the loop: the subscriber goes back to `Disconnected`,
    /// waits, and reconnects with the full set of subscriptions.
    pub async fn run<H: NotificationHandler>(
        &mut self,
        handler: &mut H,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), StreamError> {
        if self.topics.is_empty() {
            return Err(StreamError::Protocol("no topics to subscribe".to_string()));
        }

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = tokio::select! {
                outcome = self.run_session(handler) => outcome,
                _ = shutdown.changed() => break,
            };
            self.transition(SessionState::Disconnected, handler).await;

            let delay = match &outcome {
                Err(StreamError::RateLimited) => {
                    warn!("{} rate limited, backing off", self.endpoint);
                    self.config.rate_limit_backoff_ms
                }
                Err(e) => {
                    error!("{} session ended: {}", self.endpoint, e);
                    self.config.reconnect_delay_ms
                }
                Ok(()) => self.config.reconnect_delay_ms,
            };

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.transition(SessionState::Disconnected, handler).await;
        Ok(())
    }

    async fn run_session<H: NotificationHandler>(&mut self, handler: &mut H) -> Result<(), StreamError> {
        self.sessions += 1;
        self.transition(SessionState::Connecting, handler).await;
        let conn = self.connector.connect(&self.endpoint).await?;
        let mut session = SubscriptionSession::new(conn);
        info!("connected to {}", self.endpoint);

        self.subscribe(&mut session, handler).await?;
        self.transition(SessionState::Active, handler).await;
        self.receive_loop(&mut session, handler).await
    }

    async fn subscribe<H: NotificationHandler>(
        &mut self,
        session: &mut SubscriptionSession<K::Conn>,
        handler: &mut H,
    ) -> Result<(), StreamError> {
        self.transition(SessionState::Subscribed, handler).await;

        let mut pending: HashMap<u64, TopicKind> = HashMap::with_capacity(self.topics.len());
        for (i, topic) in self.topics.iter().enumerate() {
            let id = i as u64 + 1;
            let request = topic.to_request(id, &self.config.commitment);
            let text = serde_json::to_string(&request).map_err(|e| StreamError::Protocol(e.to_string()))?;
            session.conn.send(Frame::Text(text)).await?;
            pending.insert(id, topic.kind());
        }

        let ack_timeout = millis_or_never(self.config.ack_timeout_ms);
        let started = Instant::now();
        while !pending.is_empty() {
            let remaining = ack_timeout.saturating_sub(started.elapsed());
            let frame = timeout(remaining, session.conn.recv())
                .await
                .map_err(|_| StreamError::Timeout("subscription acknowledgement"))??;

            let text = match frame {
                None | Some(Frame::Close) => {
                    return Err(StreamError::Transport("closed before acknowledgement".to_string()))
                }
                Some(Frame::Text(text)) => text,
                Some(_) => continue,
            };
            match ServerMessage::parse(&text) {
                Ok(ServerMessage::Ack { id, subscription }) => {
                    if let Some(kind) = pending.remove(&id) {
                        info!("{} acknowledged, subscription {}", kind.subscribe_method(), subscription);
                        session.subscriptions.insert(subscription, kind);
                    }
                }
                Ok(ServerMessage::Error { code, message, .. }) => return Err(rpc_error(code, &message)),
                Ok(ServerMessage::Notification(n)) => handler.on_notification(n).await,
                Ok(ServerMessage::Other) => {}
                Err(e) => warn!("unparseable frame while subscribing: {}", e),
            }
        }
        session.last_activity = Instant::now();
        Ok(())
    }

    async fn receive_loop<H: NotificationHandler>(
        &mut self,
        session: &mut SubscriptionSession<K::Conn>,
        handler: &mut H,
    ) -> Result<(), StreamError> {
        let recv_timeout = millis_or_never(self.config.recv_timeout_ms);
        let ping_interval = millis_or_never(self.config.ping_interval_ms);

        loop {
            let until_ping = ping_interval.saturating_sub(session.last_ping.elapsed());
            if until_ping.is_zero() {
                session.ping().await?;
                continue;
            }
            let until_idle = recv_timeout.saturating_sub(session.last_activity.elapsed());
            let wait = until_ping.min(until_idle).max(Duration::from_millis(1));

            let frame = match timeout(wait, session.conn.recv()).await {
                Ok(frame) => frame?,
                Err(_) => {
                    if session.last_activity.elapsed() >= recv_timeout {
                        // quiet connection: ping it and keep waiting
                        self.transition(SessionState::AwaitingData, handler).await;
                        session.ping().await?;
                        session.last_activity = Instant::now();
                    }
                    continue;
                }
            };

            session.last_activity = Instant::now();
            if self.state == SessionState::AwaitingData {
                self.transition(SessionState::Active, handler).await;
            }

            match frame {
                None | Some(Frame::Close) => {
                    return Err(StreamError::Transport("connection closed by peer".to_string()))
                }
                Some(Frame::Text(text)) => match ServerMessage::parse(&text) {
                    Ok(ServerMessage::Notification(n)) => {
                        if session.topic(n.subscription) == Some(n.kind) {
                            handler.on_notification(n).await;
                        } else {
                            debug!("{} for unknown subscription {}", n.kind.notification_method(), n.subscription);
                        }
                    }
                    Ok(ServerMessage::Error { code, message, .. }) => {
                        let err = rpc_error(code, &message);
                        if err.is_rate_limited() {
                            return Err(err);
                        }
                        warn!("{}", err);
                    }
                    Ok(ServerMessage::Ack { .. }) | Ok(ServerMessage::Other) => {}
                    Err(e) => warn!("unparseable frame: {}", e),
                },
                Some(Frame::Ping(_)) | Some(Frame::Pong(_)) => {}
            }
        }
    }
}

/// Handle to a running stream.
pub struct StreamHandle {
    pub queue: Arc<ArrayQueue<PumpEvent>>,
    pub aggregator: Arc<TradeAggregator>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), StreamError>>,
}

impl StreamHandle {
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Stops the subscriber and waits for it to wind down.
    pub async fn shutdown(self) -> Result<(), StreamError> {
        self.stop();
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(StreamError::Protocol(format!("subscriber task failed: {}", e))),
        }
    }
}

/// pump.fun event stream over the bundled IDL.
#[derive(Clone)]
pub struct PumpStream {
    config: ListenerConfig,
}

impl PumpStream {
    pub fn new(config: ListenerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Builds the pipeline for this listener (no network involved).
    pub fn build_pipeline(&self) -> Result<EventPipeline, DescriptorError> {
        let descriptor = Arc::new(InterfaceDescriptor::pump_fun()?);
        descriptor.require_instructions(&self.config.instructions_of_interest)?;
        let program_id = Pubkey::from_str(&self.config.program_id).map_err(|e| {
            DescriptorError::Malformed(format!("invalid program id `{}`: {}", self.config.program_id, e))
        })?;

        let client = &self.config.client;
        let mut pipeline = EventPipeline::new(
            TransactionParser::new(descriptor, program_id),
            self.config.instructions_of_interest.clone(),
            Arc::new(TradeAggregator::new()),
            Arc::new(ArrayQueue::new(client.event_queue_capacity.max(1))),
            client.seen_signature_capacity,
        );
        if self.config.fetch_prices {
            let fetcher = Arc::new(RpcAccountFetcher::new(self.config.rpc_endpoint.clone()));
            pipeline = pipeline.with_price_service(PriceService::new(fetcher, self.config.price.clone()));
        }
        Ok(pipeline)
    }

    /// 订阅事件（无锁队列）
    ///
    /// Spawns the subscriber and returns the output queue immediately.
    pub fn subscribe(&self) -> Result<StreamHandle, DescriptorError> {
        let mut pipeline = self.build_pipeline()?;
        let queue = pipeline.queue().clone();
        let aggregator = pipeline.aggregator().clone();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let connector =
            TungsteniteConnector::new(Duration::from_millis(self.config.client.connection_timeout_ms));
        let mut subscriber = StreamSubscriber::new(
            connector,
            self.config.endpoint.clone(),
            self.config.topics.clone(),
            self.config.client.clone(),
        );
        let task = tokio::spawn(async move { subscriber.run(&mut pipeline, shutdown_rx).await });

        Ok(StreamHandle { queue, aggregator, shutdown, task })
    }
}
