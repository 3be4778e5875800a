use crate::core::errors::BybitError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Opens a WebSocket connection and hands back its two halves.
///
/// The session talks to the transport only through these traits, so tests
/// can inject an in-memory transport and assert on the exact frames sent.
#[async_trait]
pub(crate) trait WsConnector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn WsWriter>, Box<dyn WsReader>), BybitError>;
}

/// Outbound half of a realtime connection.
#[async_trait]
pub(crate) trait WsWriter: Send + Sync {
    async fn send(&mut self, msg: Message) -> Result<(), BybitError>;

    /// Initiate the close handshake. Errors are not interesting here; the
    /// connection is being torn down either way.
    async fn close(&mut self);
}

/// Inbound half of a realtime connection. `None` means the stream ended.
#[async_trait]
pub(crate) trait WsReader: Send + Sync {
    async fn next(&mut self) -> Option<Result<Message, BybitError>>;
}

/// Production connector backed by tokio-tungstenite.
pub(crate) struct TungsteniteConnector;

#[async_trait]
impl WsConnector for TungsteniteConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn WsWriter>, Box<dyn WsReader>), BybitError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| BybitError::Connect(format!("WebSocket connection failed: {}", e)))?;

        let (write, read) = ws_stream.split();
        Ok((
            Box::new(TungsteniteWriter { inner: write }),
            Box::new(TungsteniteReader { inner: read }),
        ))
    }
}

struct TungsteniteWriter {
    inner: futures_util::stream::SplitSink<WsStream, Message>,
}

#[async_trait]
impl WsWriter for TungsteniteWriter {
    async fn send(&mut self, msg: Message) -> Result<(), BybitError> {
        self.inner
            .send(msg)
            .await
            .map_err(|e| BybitError::Transport(format!("failed to send message: {}", e)))
    }

    async fn close(&mut self) {
        let _ = self.inner.send(Message::Close(None)).await;
    }
}

struct TungsteniteReader {
    inner: futures_util::stream::SplitStream<WsStream>,
}

#[async_trait]
impl WsReader for TungsteniteReader {
    async fn next(&mut self) -> Option<Result<Message, BybitError>> {
        self.inner
            .next()
            .await
            .map(|r| r.map_err(|e| BybitError::Transport(e.to_string())))
    }
}
