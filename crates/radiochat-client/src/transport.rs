//! WebSocket transport for the client.
//!
//! Provides [`WebSocketConnector`], which opens links backed by a
//! tokio-tungstenite connection. This is a thin layer that only moves text
//! frames: decoding into [`ServerFrame`] happens here, but all protocol logic
//! stays in the core state machines.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use radiochat_core::connection::DEFAULT_CONNECT_TIMEOUT;
use radiochat_proto::{ProtoError, ServerFrame};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::link::{Connector, LinkEvent, LinkHandles, TransportLink};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Connection attempt took too long.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Peer closed the connection.
    #[error("closed by server: {0}")]
    Closed(String),
}

/// Opens WebSocket links to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Connector for `url` (e.g. `ws://localhost:3000/chat`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), connect_timeout: DEFAULT_CONNECT_TIMEOUT }
    }

    /// Override the per-attempt timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Connector for WebSocketConnector {
    fn open(&self) -> TransportLink {
        let (mut link, handles) = TransportLink::pair();
        let task = tokio::spawn(run_link(self.url.clone(), self.connect_timeout, handles));
        link.attach(task.abort_handle());
        link
    }
}

/// Connect, then bridge between the link channels and the socket.
async fn run_link(url: String, connect_timeout: Duration, mut handles: LinkHandles) {
    let socket = match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((socket, _response))) => socket,
        Ok(Err(e)) => {
            let reason = TransportError::Connection(e.to_string()).to_string();
            handles.emit(LinkEvent::ConnectFailed { reason }).await;
            return;
        },
        Err(_) => {
            let reason = TransportError::Timeout(connect_timeout).to_string();
            handles.emit(LinkEvent::ConnectFailed { reason }).await;
            return;
        },
    };

    info!(%url, "websocket connected");
    handles.set_connected(true);
    if !handles.emit(LinkEvent::Opened).await {
        return;
    }

    let (mut sink, mut stream) = socket.split();
    let error = loop {
        tokio::select! {
            outbound = handles.outbound.recv() => {
                let Some(frame) = outbound else {
                    let _ = sink.close().await;
                    return;
                };
                match frame.encode() {
                    Ok(text) => {
                        if let Err(e) = sink.send(Message::text(text)).await {
                            break TransportError::Stream(e.to_string());
                        }
                    },
                    Err(e) => warn!(error = %e, "failed to encode outbound frame"),
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => match ServerFrame::decode(text.as_str()) {
                    Ok(frame) => {
                        if !handles.emit(LinkEvent::Frame(frame)).await {
                            return;
                        }
                    },
                    Err(ProtoError::UnknownEvent(event)) => debug!(%event, "ignoring unknown event"),
                    Err(e) => warn!(error = %e, "dropping malformed frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "no reason given".to_string());
                    break TransportError::Closed(reason);
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => break TransportError::Stream(e.to_string()),
                None => break TransportError::Closed("stream ended".to_string()),
            },
        }
    };

    warn!(%url, %error, "websocket disconnected");
    handles.set_connected(false);
    handles.emit(LinkEvent::Closed { reason: error.to_string() }).await;
}
