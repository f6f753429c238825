//! Websocket transport
//!
//! The subscriber talks to a [`Connection`] obtained from a [`Connector`]; the
//! production pair is tokio-tungstenite over rustls, tests plug in an in-memory one.

use crate::error::StreamError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), StreamError>;

    /// `Ok(None)` once the peer has closed the stream.
    async fn recv(&mut self) -> Result<Option<Frame>, StreamError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    async fn connect(&self, endpoint: &str) -> Result<Self::Conn, StreamError>;
}

/// Maps tungstenite failures; an HTTP 429 on the upgrade is a rate limit, not a dead endpoint.
pub(crate) fn map_ws_error(err: tungstenite::Error) -> StreamError {
    match err {
        tungstenite::Error::Http(response) if response.status().as_u16() == 429 => StreamError::RateLimited,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            StreamError::Transport("connection closed".to_string())
        }
        other => StreamError::Transport(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

pub struct TungsteniteConnection {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connector for TungsteniteConnector {
    type Conn = TungsteniteConnection;

    async fn connect(&self, endpoint: &str) -> Result<TungsteniteConnection, StreamError> {
        // already installed is fine
        let _ = rustls::crypto::ring::default_provider().install_default();

        let connecting = connect_async(endpoint);
        let (inner, _response) = if self.connect_timeout.is_zero() {
            connecting.await.map_err(map_ws_error)?
        } else {
            tokio::time::timeout(self.connect_timeout, connecting)
                .await
                .map_err(|_| StreamError::Timeout("websocket connect"))?
                .map_err(map_ws_error)?
        };
        Ok(TungsteniteConnection { inner })
    }
}

#[async_trait]
impl Connection for TungsteniteConnection {
    async fn send(&mut self, frame: Frame) -> Result<(), StreamError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Ping(payload) => Message::Ping(payload),
            Frame::Pong(payload) => Message::Pong(payload),
            Frame::Close => Message::Close(None),
        };
        self.inner.send(message).await.map_err(map_ws_error)
    }

    async fn recv(&mut self) -> Result<Option<Frame>, StreamError> {
        loop {
            let frame = match self.inner.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(map_ws_error(e)),
                Some(Ok(Message::Text(text))) => Frame::Text(text),
                Some(Ok(Message::Binary(bytes))) => Frame::Text(String::from_utf8_lossy(&bytes).into_owned()),
                Some(Ok(Message::Ping(payload))) => Frame::Ping(payload),
                Some(Ok(Message::Pong(payload))) => Frame::Pong(payload),
                Some(Ok(Message::Close(_))) => Frame::Close,
                Some(Ok(Message::Frame(_))) => continue,
            };
            return Ok(Some(frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tungstenite::http::Response;

    #[test]
    fn test_http_429_is_rate_limit() {
        let response = Response::builder().status(429).body(None).unwrap();
        assert_eq!(map_ws_error(tungstenite::Error::Http(response)), StreamError::RateLimited);

        let response = Response::builder().status(503).body(None).unwrap();
        assert!(matches!(map_ws_error(tungstenite::Error::Http(response)), StreamError::Transport(_)));
    }

    #[test]
    fn test_closed_is_transport() {
        assert_eq!(
            map_ws_error(tungstenite::Error::ConnectionClosed),
            StreamError::Transport("connection closed".into())
        );
    }
}
