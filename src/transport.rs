#[cfg(any(test, feature = "test-util"))]
pub mod memory;

use crate::client::config::Config;
use crate::client::utils::build_request;
use crate::error::{Error, Result};
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// One discrete message on a duplex connection. Text carries control JSON,
/// binary carries raw audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Text(String),
    Binary(Vec<u8>),
    Close(Option<(u16, String)>),
}

impl WireMessage {
    pub fn len(&self) -> usize {
        match self {
            WireMessage::Text(text) => text.len(),
            WireMessage::Binary(bytes) => bytes.len(),
            WireMessage::Close(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type WireSink = Pin<Box<dyn Sink<WireMessage, Error = Error> + Send>>;
pub type WireStream = Pin<Box<dyn Stream<Item = Result<WireMessage>> + Send>>;

/// Opens persistent bidirectional connections for sessions.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &Config) -> Result<(WireSink, WireStream)>;
}

/// WebSocket connector used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self, config: &Config) -> Result<(WireSink, WireStream)> {
        let request = build_request(config).map_err(|e| Error::Config(e.to_string()))?;
        let (ws_stream, _) =
            tokio::time::timeout(config.connect_timeout(), tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| {
                    Error::Connect(format!("handshake timed out after {:?}", config.connect_timeout()))
                })?
                .map_err(|e| Error::Connect(e.to_string()))?;
        tracing::info!("connected to {}", config.websocket_url());

        let (write, read) = ws_stream.split();
        let sink = write
            .sink_map_err(Error::from)
            .with(|message: WireMessage| future::ready(Ok::<_, Error>(Message::from(message))));
        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(WireMessage::Text(text))),
                Ok(Message::Binary(bytes)) => Some(Ok(WireMessage::Binary(bytes))),
                Ok(Message::Close(frame)) => Some(Ok(WireMessage::Close(
                    frame.map(|frame| (u16::from(frame.code), frame.reason.into_owned())),
                ))),
                // tungstenite answers pings on its own
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
                Err(e) => Some(Err(Error::from(e))),
            })
        });
        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

impl From<WireMessage> for Message {
    fn from(message: WireMessage) -> Self {
        match message {
            WireMessage::Text(text) => Message::Text(text),
            WireMessage::Binary(bytes) => Message::Binary(bytes),
            WireMessage::Close(frame) => Message::Close(frame.map(|(code, reason)| CloseFrame {
                code: code.into(),
                reason: reason.into(),
            })),
        }
    }
}
