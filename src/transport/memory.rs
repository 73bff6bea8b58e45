//! In-process transport. Every `connect` hands the server half of a fresh
//! channel pair to the [`MemoryListener`], which lets tests script the
//! service side of a session.

use crate::client::config::Config;
use crate::error::{Error, Result};
use crate::transport::{Connector, WireMessage, WireSink, WireStream};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};

pub fn memory_transport() -> (MemoryConnector, MemoryListener) {
    let (accept_tx, accept_rx) = mpsc::unbounded();
    (
        MemoryConnector {
            accept_tx: Some(accept_tx),
        },
        MemoryListener { accept_rx },
    )
}

pub struct MemoryConnector {
    accept_tx: Option<mpsc::UnboundedSender<MemoryPeer>>,
}

impl MemoryConnector {
    /// A connector whose every connection attempt fails.
    pub fn refusing() -> Self {
        Self { accept_tx: None }
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _config: &Config) -> Result<(WireSink, WireStream)> {
        let accept_tx = self
            .accept_tx
            .as_ref()
            .ok_or_else(|| Error::Connect("connection refused".to_string()))?;

        let (client_tx, server_rx) = mpsc::unbounded::<WireMessage>();
        let (server_tx, client_rx) = mpsc::unbounded::<Result<WireMessage>>();
        accept_tx
            .unbounded_send(MemoryPeer {
                tx: server_tx,
                rx: server_rx,
            })
            .map_err(|_| Error::Connect("listener is gone".to_string()))?;

        let sink = client_tx.sink_map_err(|e| Error::Transport(e.to_string()));
        Ok((Box::pin(sink), Box::pin(client_rx)))
    }
}

pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.next().await
    }
}

/// Server side of one in-memory connection.
pub struct MemoryPeer {
    tx: mpsc::UnboundedSender<Result<WireMessage>>,
    rx: mpsc::UnboundedReceiver<WireMessage>,
}

impl MemoryPeer {
    /// Returns `None` once the client released its writer.
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.rx.next().await
    }

    /// Next text message decoded as JSON. Binary frames in between are skipped.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        while let Some(message) = self.recv().await {
            if let WireMessage::Text(text) = message {
                return serde_json::from_str(&text).ok();
            }
        }
        None
    }

    pub fn send_text(&self, text: &str) -> bool {
        self.push(Ok(WireMessage::Text(text.to_string())))
    }

    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send_text(&value.to_string())
    }

    pub fn send_binary(&self, bytes: Vec<u8>) -> bool {
        self.push(Ok(WireMessage::Binary(bytes)))
    }

    pub fn send_close(&self, code: u16, reason: &str) -> bool {
        self.push(Ok(WireMessage::Close(Some((code, reason.to_string())))))
    }

    /// Fails the client's read half with a transport error.
    pub fn fail(&self, reason: &str) -> bool {
        self.push(Err(Error::Transport(reason.to_string())))
    }

    /// Ends the client's read half without a close frame.
    pub fn hang_up(&self) {
        self.tx.close_channel();
    }

    fn push(&self, message: Result<WireMessage>) -> bool {
        self.tx.unbounded_send(message).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn peers_exchange_messages() {
        let (connector, mut listener) = memory_transport();
        let (mut sink, mut stream) = connector.connect(&Config::new()).await.unwrap();
        let mut peer = listener.accept().await.unwrap();

        sink.send(WireMessage::Binary(vec![1, 2, 3])).await.unwrap();
        assert_eq!(peer.recv().await, Some(WireMessage::Binary(vec![1, 2, 3])));

        peer.send_text("{}");
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            WireMessage::Text("{}".to_string())
        );

        sink.close().await.unwrap();
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test]
    async fn refusing_connector_fails_to_connect() {
        let result = MemoryConnector::refusing().connect(&Config::new()).await;
        assert!(matches!(result, Err(Error::Connect(_))));
    }
}
