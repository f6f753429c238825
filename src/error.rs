//! 错误类型
//!
//! Every recoverable category is its own enum so the dispatch loop can match on
//! the kind instead of catching and guessing.

use thiserror::Error;

/// Binary payload decoding failures. Recoverable per instruction / per transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload truncated: needed {needed} bytes at offset {offset}, {remaining} remaining")]
    Truncated { offset: usize, needed: usize, remaining: usize },

    #[error("invalid utf-8 in string argument at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("account role `{role}` expects index {index}, only {len} accounts supplied")]
    AccountIndexOutOfRange { role: String, index: usize, len: usize },

    #[error("discriminator mismatch: expected {expected:02x?}, found {found:02x?}")]
    DiscriminatorMismatch { expected: [u8; 8], found: [u8; 8] },

    #[error("decoded instruction `{instruction}` is missing field `{field}`")]
    MissingField { instruction: String, field: String },
}

impl DecodeError {
    #[inline]
    pub(crate) fn truncated(offset: usize, needed: usize, len: usize) -> Self {
        DecodeError::Truncated { offset, needed, remaining: len.saturating_sub(offset) }
    }
}

/// Spot-price computation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("invalid reserves: virtual_token_reserves={virtual_token_reserves}, virtual_sol_reserves={virtual_sol_reserves}")]
    InvalidReserves { virtual_token_reserves: u64, virtual_sol_reserves: u64 },
}

/// Interface descriptor load failures. Fatal at startup.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("malformed descriptor: {0}")]
    Malformed(String),

    #[error("descriptor is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read descriptor: {0}")]
    Io(#[from] std::io::Error),
}

/// Subscription transport failures. Recoverable: the subscriber reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited by endpoint")]
    RateLimited,

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl StreamError {
    /// `true` when the caller should back off instead of treating the connection as dead.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, StreamError::RateLimited)
    }
}

/// Transaction envelope failures (before any instruction is looked at).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unsupported transaction encoding `{0}`")]
    UnsupportedEncoding(String),

    #[error("failed to decode base64 payload: {0}")]
    Base64(String),

    #[error("failed to decode base58 payload: {0}")]
    Base58(String),

    #[error("failed to deserialize transaction: {0}")]
    Deserialize(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// Account-state read failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("rate limited by rpc endpoint")]
    RateLimited,

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl FetchError {
    /// Classifies an rpc client error message; HTTP 429 becomes [`FetchError::RateLimited`].
    pub fn from_rpc_message(message: String) -> Self {
        if message.contains("429") || message.contains("Too Many Requests") {
            FetchError::RateLimited
        } else {
            FetchError::Rpc(message)
        }
    }
}
