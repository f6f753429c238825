use crate::core::pricer::PriceLookupConfig;
use crate::instr::program_ids::PUMPFUN_PROGRAM_ID;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_WSS_ENDPOINT: &str = "wss://api.mainnet-beta.solana.com";
pub const DEFAULT_RPC_ENDPOINT: &str = "https://api.mainnet-beta.solana.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 单次接收等待时间（毫秒），超时后发送 ping；0 = 不限
    pub recv_timeout_ms: u64,
    /// 主动 ping 间隔（毫秒）；0 = 关闭
    pub ping_interval_ms: u64,
    /// 断线重连延迟（毫秒）
    pub reconnect_delay_ms: u64,
    /// 被限流后的等待时间（毫秒）
    pub rate_limit_backoff_ms: u64,
    /// 订阅确认等待时间（毫秒）；0 = 不限
    pub ack_timeout_ms: u64,
    pub commitment: String,
    /// 输出队列容量
    pub event_queue_capacity: usize,
    /// 去重签名缓存容量
    pub seen_signature_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 8000,
            recv_timeout_ms: 30_000,
            ping_interval_ms: 20_000,
            reconnect_delay_ms: 5000,
            rate_limit_backoff_ms: 1000,
            ack_timeout_ms: 10_000,
            commitment: "confirmed".to_string(),
            event_queue_capacity: 100_000,
            seen_signature_capacity: 100_000,
        }
    }
}

impl ClientConfig {
    pub fn low_latency() -> Self {
        Self {
            connection_timeout_ms: 5000,
            recv_timeout_ms: 10_000,
            ping_interval_ms: 10_000,
            reconnect_delay_ms: 1000,
            rate_limit_backoff_ms: 500,
            ack_timeout_ms: 5000,
            commitment: "processed".to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicKind {
    Logs,
    Blocks,
}

impl TopicKind {
    pub fn subscribe_method(self) -> &'static str {
        match self {
            TopicKind::Logs => "logsSubscribe",
            TopicKind::Blocks => "blockSubscribe",
        }
    }

    pub fn notification_method(self) -> &'static str {
        match self {
            TopicKind::Logs => "logsNotification",
            TopicKind::Blocks => "blockNotification",
        }
    }

    pub fn from_notification_method(method: &str) -> Option<Self> {
        match method {
            "logsNotification" => Some(TopicKind::Logs),
            "blockNotification" => Some(TopicKind::Blocks),
            _ => None,
        }
    }
}

/// One logical subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Topic {
    /// Log lines of every transaction mentioning the address
    Logs { mentions: String },
    /// Full blocks containing a transaction that touches the address
    Blocks { mentions_account_or_program: String },
}

impl Topic {
    pub fn logs(mentions: impl Into<String>) -> Self {
        Topic::Logs { mentions: mentions.into() }
    }

    pub fn blocks(address: impl Into<String>) -> Self {
        Topic::Blocks { mentions_account_or_program: address.into() }
    }

    pub fn kind(&self) -> TopicKind {
        match self {
            Topic::Logs { .. } => TopicKind::Logs,
            Topic::Blocks { .. } => TopicKind::Blocks,
        }
    }

    /// JSON-RPC request for this topic.
    pub fn to_request(&self, id: u64, commitment: &str) -> SubscriptionRequest {
        let params = match self {
            Topic::Logs { mentions } => vec![
                json!({ "mentions": [mentions] }),
                json!({ "commitment": commitment }),
            ],
            Topic::Blocks { mentions_account_or_program } => vec![
                json!({ "mentionsAccountOrProgram": mentions_account_or_program }),
                json!({
                    "commitment": commitment,
                    "encoding": "base64",
                    "transactionDetails": "full",
                    "maxSupportedTransactionVersion": 0,
                    "showRewards": false,
                }),
            ],
        };
        SubscriptionRequest { jsonrpc: "2.0", id, method: self.kind().subscribe_method(), params }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: Vec<Value>,
}

/// Inbound frame after JSON decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Subscription acknowledgement `{"id":..,"result":<subscription id>}`
    Ack { id: u64, subscription: u64 },
    /// JSON-RPC error reply
    Error { id: Option<u64>, code: i64, message: String },
    Notification(Notification),
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: TopicKind,
    pub subscription: u64,
    pub slot: Option<u64>,
    /// `params.result.value`
    pub value: Value,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RawRpcError>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Deserialize)]
struct RawRpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct RawParams {
    #[serde(default)]
    subscription: u64,
    result: RawResult,
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(default)]
    context: Option<RawContext>,
    value: Value,
}

#[derive(Deserialize)]
struct RawContext {
    slot: u64,
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let frame: RawFrame = serde_json::from_str(text)?;

        if let Some(err) = frame.error {
            return Ok(ServerMessage::Error { id: frame.id, code: err.code, message: err.message });
        }
        if let (Some(id), Some(result)) = (frame.id, frame.result.as_ref()) {
            if let Some(subscription) = result.as_u64() {
                return Ok(ServerMessage::Ack { id, subscription });
            }
        }
        let kind = frame.method.as_deref().and_then(TopicKind::from_notification_method);
        match (kind, frame.params) {
            (Some(kind), Some(params)) => {
                let params: RawParams = serde_json::from_value(params)?;
                Ok(ServerMessage::Notification(Notification {
                    kind,
                    subscription: params.subscription,
                    slot: params.result.context.map(|c| c.slot),
                    value: params.result.value,
                }))
            }
            _ => Ok(ServerMessage::Other),
        }
    }
}

/// Everything one listener needs; each listener variant is a different value of this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub endpoint: String,
    pub rpc_endpoint: String,
    pub program_id: String,
    pub topics: Vec<Topic>,
    /// Instruction names that become events
    pub instructions_of_interest: Vec<String>,
    /// Price each new token's bonding curve
    pub fetch_prices: bool,
    pub price: PriceLookupConfig,
    pub client: ClientConfig,
}

impl ListenerConfig {
    /// New-token listener: program logs, `create` only, curve prices fetched.
    pub fn new_tokens(endpoint: impl Into<String>, rpc_endpoint: impl Into<String>) -> Self {
        let program_id = PUMPFUN_PROGRAM_ID.to_string();
        Self {
            endpoint: endpoint.into(),
            rpc_endpoint: rpc_endpoint.into(),
            topics: vec![Topic::logs(program_id.clone())],
            program_id,
            instructions_of_interest: vec!["create".to_string()],
            fetch_prices: true,
            price: PriceLookupConfig::default(),
            client: ClientConfig::default(),
        }
    }

    /// Trade-volume listener: full blocks, `buy` / `sell`.
    pub fn trade_volume(endpoint: impl Into<String>, rpc_endpoint: impl Into<String>) -> Self {
        let program_id = PUMPFUN_PROGRAM_ID.to_string();
        Self {
            endpoint: endpoint.into(),
            rpc_endpoint: rpc_endpoint.into(),
            topics: vec![Topic::blocks(program_id.clone())],
            program_id,
            instructions_of_interest: vec!["buy".to_string(), "sell".to_string()],
            fetch_prices: false,
            price: PriceLookupConfig::default(),
            client: ClientConfig::default(),
        }
    }

    /// [`new_tokens`](Self::new_tokens) on mainnet defaults, overridden from the environment.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Overrides endpoints and program from `WSS_ENDPOINT`, `RPC_ENDPOINT`, `PUMP_PROGRAM`.
    pub fn with_env(mut self) -> Self {
        self.apply_env(|key| std::env::var(key).ok());
        self
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("WSS_ENDPOINT").filter(|v| !v.is_empty()) {
            self.endpoint = endpoint;
        }
        if let Some(rpc) = lookup("RPC_ENDPOINT").filter(|v| !v.is_empty()) {
            self.rpc_endpoint = rpc;
        }
        if let Some(program) = lookup("PUMP_PROGRAM").filter(|v| !v.is_empty()) {
            for topic in &mut self.topics {
                match topic {
                    Topic::Logs { mentions } if *mentions == self.program_id => *mentions = program.clone(),
                    Topic::Blocks { mentions_account_or_program } if *mentions_account_or_program == self.program_id => {
                        *mentions_account_or_program = program.clone()
                    }
                    _ => {}
                }
            }
            self.program_id = program;
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::new_tokens(DEFAULT_WSS_ENDPOINT, DEFAULT_RPC_ENDPOINT)
    }
}
