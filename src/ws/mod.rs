//! WebSocket 订阅模块
//!
//! logsSubscribe / blockSubscribe 会话、断线重连与事件流入口

pub mod client;
pub mod transport;
pub mod types;

pub use client::{NotificationHandler, PumpStream, SessionState, StreamHandle, StreamSubscriber, SubscriptionSession};
pub use transport::{Connection, Connector, Frame, TungsteniteConnection, TungsteniteConnector};
pub use types::*;
