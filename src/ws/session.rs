use crate::auth::{stream, timestamp_ms};
use crate::core::config::BybitConfig;
use crate::core::errors::BybitError;
use crate::ws::frame::OpFrame;
use crate::ws::transport::{TungsteniteConnector, WsConnector, WsReader, WsWriter};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, RwLock};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{instrument, warn};

/// Handler invoked synchronously for every decoded inbound message.
pub type MessageHandler = std::sync::Arc<dyn Fn(Value) + Send + Sync>;

/// Shared connection state: the two transport halves, the liveness flag and
/// the subscription registry. Guarded by one lock; the lock is only held
/// around handle/registry access, never across a blocking read.
#[derive(Default)]
struct ConnState {
    writer: Option<Box<dyn WsWriter>>,
    reader: Option<Box<dyn WsReader>>,
    connected: bool,
    subscriptions: Vec<String>,
}

/// A persistent, authenticated, subscription-tracking realtime session.
///
/// Lifecycle: `connect` (private sessions authenticate in the same step),
/// `subscribe`/`unsubscribe` (lazy-connecting if needed), `listen` (blocking
/// receive loop), `close`. Exactly one transport connection is owned at a
/// time and there is no automatic reconnection: a failed read ends the
/// listen loop, reports once to the handler and leaves the session
/// disconnected.
///
/// All methods take `&self`, so a session wrapped in an `Arc` can be driven
/// from several tasks at once - typically one task blocked in `listen` while
/// another subscribes or closes on shutdown.
pub struct BybitWebSocket {
    config: BybitConfig,
    private: bool,
    connector: Box<dyn WsConnector>,
    state: RwLock<ConnState>,
    handler: RwLock<Option<MessageHandler>>,
    close_signal: Notify,
    closing: AtomicBool,
}

impl BybitWebSocket {
    /// Create a public (market data) session.
    #[must_use]
    pub fn public(config: BybitConfig) -> Self {
        Self::with_connector(config, false, Box::new(TungsteniteConnector))
    }

    /// Create a private session; `connect` will authenticate with the
    /// configured credentials before anything else is sent.
    #[must_use]
    pub fn private(config: BybitConfig) -> Self {
        Self::with_connector(config, true, Box::new(TungsteniteConnector))
    }

    fn with_connector(
        config: BybitConfig,
        private: bool,
        connector: Box<dyn WsConnector>,
    ) -> Self {
        Self {
            config,
            private,
            connector,
            state: RwLock::new(ConnState::default()),
            handler: RwLock::new(None),
            close_signal: Notify::new(),
            closing: AtomicBool::new(false),
        }
    }

    /// Stream endpoint for this session's environment.
    pub fn url(&self) -> String {
        let host = if self.config.testnet {
            "wss://stream-testnet.bybit.com"
        } else {
            self.config.region.stream_host()
        };
        let path = if self.private {
            "/v5/private"
        } else {
            "/v5/public/spot"
        };
        format!("{}{}", host, path)
    }

    /// Open the transport and, for private sessions, send the auth frame.
    ///
    /// On transport failure the session stays disconnected. An auth send
    /// failure closes the fresh connection and also leaves the session
    /// disconnected; nothing is retried.
    #[instrument(skip(self), fields(url = %self.url(), private = self.private))]
    pub async fn connect(&self) -> Result<(), BybitError> {
        let (writer, reader) = self.connector.connect(&self.url()).await?;

        {
            let mut state = self.state.write().await;
            state.writer = Some(writer);
            state.reader = Some(reader);
            state.connected = true;
        }
        self.closing.store(false, Ordering::SeqCst);

        if self.private && self.config.has_credentials() {
            let frame = stream::auth_frame(
                self.config.api_key(),
                self.config.api_secret(),
                timestamp_ms(),
            )?;
            if let Err(e) = self.send_message(frame.to_message()?).await {
                self.close().await;
                return Err(BybitError::Auth(format!(
                    "failed to send auth frame: {}",
                    e
                )));
            }
        }

        Ok(())
    }

    /// Send an operation frame, transparently connecting first if no
    /// transport is open.
    pub async fn send(&self, frame: &OpFrame) -> Result<(), BybitError> {
        if !self.is_connected().await {
            self.connect().await?;
        }
        self.send_message(frame.to_message()?).await
    }

    async fn send_message(&self, msg: Message) -> Result<(), BybitError> {
        let mut state = self.state.write().await;
        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| BybitError::Transport("WebSocket not connected".to_string()))?;
        writer.send(msg).await
    }

    /// Subscribe to topics, recording them in the subscription registry.
    pub async fn subscribe<S: AsRef<str>>(&self, topics: &[S]) -> Result<(), BybitError> {
        let topics: Vec<String> = topics.iter().map(|t| t.as_ref().to_string()).collect();

        {
            let mut state = self.state.write().await;
            for topic in &topics {
                if !state.subscriptions.contains(topic) {
                    state.subscriptions.push(topic.clone());
                }
            }
        }

        self.send(&OpFrame::subscribe(&topics)).await
    }

    /// Unsubscribe from topics, removing them from the registry.
    pub async fn unsubscribe<S: AsRef<str>>(&self, topics: &[S]) -> Result<(), BybitError> {
        let topics: Vec<String> = topics.iter().map(|t| t.as_ref().to_string()).collect();

        {
            let mut state = self.state.write().await;
            state.subscriptions.retain(|sub| !topics.contains(sub));
        }

        self.send(&OpFrame::unsubscribe(&topics)).await
    }

    pub async fn subscribe_orderbook(&self, symbol: &str, depth: u32) -> Result<(), BybitError> {
        self.subscribe(&[format!("orderbook.{}.{}", depth, symbol)])
            .await
    }

    pub async fn subscribe_trades(&self, symbol: &str) -> Result<(), BybitError> {
        self.subscribe(&[format!("publicTrade.{}", symbol)]).await
    }

    pub async fn subscribe_ticker(&self, symbol: &str) -> Result<(), BybitError> {
        self.subscribe(&[format!("tickers.{}", symbol)]).await
    }

    pub async fn subscribe_kline(&self, symbol: &str, interval: &str) -> Result<(), BybitError> {
        self.subscribe(&[format!("kline.{}.{}", interval, symbol)])
            .await
    }

    pub async fn subscribe_position(&self) -> Result<(), BybitError> {
        self.subscribe(&["position"]).await
    }

    pub async fn subscribe_execution(&self) -> Result<(), BybitError> {
        self.subscribe(&["execution"]).await
    }

    pub async fn subscribe_orders(&self) -> Result<(), BybitError> {
        self.subscribe(&["order"]).await
    }

    pub async fn subscribe_wallet(&self) -> Result<(), BybitError> {
        self.subscribe(&["wallet"]).await
    }

    /// Register the message handler. Every decoded inbound message is
    /// dispatched to it verbatim; a terminal read failure is delivered as
    /// `{"error": true, "message": <text>}`.
    pub async fn on_message<F>(&self, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        *self.handler.write().await = Some(std::sync::Arc::new(handler));
    }

    /// Blocking receive loop.
    ///
    /// Connects first if needed, then reads one message at a time until the
    /// transport fails or `close` is called from another task. Malformed
    /// JSON frames are skipped. Messages with `op == "ping"` are answered
    /// with a pong on the same transport without handler involvement.
    #[instrument(skip(self), fields(url = %self.url()))]
    pub async fn listen(&self) -> Result<(), BybitError> {
        if !self.is_connected().await {
            self.connect().await?;
        }

        let mut reader = {
            let mut state = self.state.write().await;
            state
                .reader
                .take()
                .ok_or_else(|| BybitError::Transport("listen loop already active".to_string()))?
        };

        loop {
            if self.closing.load(Ordering::SeqCst) {
                break;
            }

            let next = tokio::select! {
                msg = reader.next() => msg,
                () = self.close_signal.notified() => break,
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    let Ok(data) = serde_json::from_str::<Value>(&text) else {
                        // Malformed frames are dropped, not fatal
                        continue;
                    };

                    self.dispatch(data.clone()).await;

                    if data.get("op").and_then(Value::as_str) == Some("ping") {
                        if let Err(e) = self.send(&OpFrame::pong()).await {
                            warn!("failed to send pong: {}", e);
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    if !self.closing.load(Ordering::SeqCst) {
                        self.dispatch(json!({
                            "error": true,
                            "message": "connection closed",
                        }))
                        .await;
                    }
                    break;
                }
                Some(Ok(_)) => {
                    // Binary and control frames carry no V5 payloads
                }
                Some(Err(e)) => {
                    if !self.closing.load(Ordering::SeqCst) {
                        self.dispatch(json!({
                            "error": true,
                            "message": e.to_string(),
                        }))
                        .await;
                    }
                    break;
                }
            }
        }

        let mut state = self.state.write().await;
        state.writer = None;
        state.reader = None;
        state.connected = false;

        Ok(())
    }

    async fn dispatch(&self, value: Value) {
        let handler = self.handler.read().await.clone();
        if let Some(handler) = handler {
            handler(value);
        }
    }

    /// Send an application-level ping frame.
    pub async fn ping(&self) -> Result<(), BybitError> {
        self.send(&OpFrame::ping()).await
    }

    /// Close the connection. Idempotent; also cancels a `listen` loop
    /// blocked on a read in another task.
    pub async fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);

        {
            let mut state = self.state.write().await;
            if let Some(mut writer) = state.writer.take() {
                writer.close().await;
            }
            state.reader = None;
            state.connected = false;
        }

        self.close_signal.notify_waiters();
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    /// Active topic subscriptions in insertion order.
    pub async fn subscriptions(&self) -> Vec<String> {
        self.state.read().await.subscriptions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct MockConnector {
        sent: Arc<Mutex<Vec<String>>>,
        inbound: Mutex<Option<mpsc::UnboundedReceiver<Result<Message, BybitError>>>>,
        fail_connect: bool,
    }

    impl MockConnector {
        fn new(
            sent: Arc<Mutex<Vec<String>>>,
            inbound: Option<mpsc::UnboundedReceiver<Result<Message, BybitError>>>,
        ) -> Self {
            Self {
                sent,
                inbound: Mutex::new(inbound),
                fail_connect: false,
            }
        }
    }

    #[async_trait]
    impl WsConnector for MockConnector {
        async fn connect(
            &self,
            _url: &str,
        ) -> Result<(Box<dyn WsWriter>, Box<dyn WsReader>), BybitError> {
            if self.fail_connect {
                return Err(BybitError::Connect("refused".to_string()));
            }

            let rx = self.inbound.lock().unwrap().take().unwrap_or_else(|| {
                let (_tx, rx) = mpsc::unbounded_channel();
                rx
            });

            Ok((
                Box::new(MockWriter {
                    sent: self.sent.clone(),
                }),
                Box::new(MockReader { rx }),
            ))
        }
    }

    struct MockWriter {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl WsWriter for MockWriter {
        async fn send(&mut self, msg: Message) -> Result<(), BybitError> {
            if let Message::Text(text) = msg {
                self.sent.lock().unwrap().push(text);
            }
            Ok(())
        }

        async fn close(&mut self) {}
    }

    struct MockReader {
        rx: mpsc::UnboundedReceiver<Result<Message, BybitError>>,
    }

    #[async_trait]
    impl WsReader for MockReader {
        async fn next(&mut self) -> Option<Result<Message, BybitError>> {
            self.rx.recv().await
        }
    }

    fn session(
        private: bool,
        sent: Arc<Mutex<Vec<String>>>,
        inbound: Option<mpsc::UnboundedReceiver<Result<Message, BybitError>>>,
    ) -> BybitWebSocket {
        let config = BybitConfig::new("test-key".to_string(), "test-secret".to_string());
        BybitWebSocket::with_connector(
            config,
            private,
            Box::new(MockConnector::new(sent, inbound)),
        )
    }

    async fn collect_handler(ws: &BybitWebSocket) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        ws.on_message(move |msg| {
            sink.lock().unwrap().push(msg);
        })
        .await;
        seen
    }

    #[tokio::test]
    async fn registry_preserves_insertion_order() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = session(false, sent, None);

        ws.subscribe(&["orderbook.50.BTCUSDT", "publicTrade.BTCUSDT"])
            .await
            .unwrap();
        assert_eq!(
            ws.subscriptions().await,
            vec!["orderbook.50.BTCUSDT", "publicTrade.BTCUSDT"]
        );

        ws.unsubscribe(&["publicTrade.BTCUSDT"]).await.unwrap();
        assert_eq!(ws.subscriptions().await, vec!["orderbook.50.BTCUSDT"]);
    }

    #[tokio::test]
    async fn duplicate_subscribe_is_idempotent_in_registry() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = session(false, sent, None);

        ws.subscribe(&["tickers.BTCUSDT"]).await.unwrap();
        ws.subscribe(&["tickers.BTCUSDT"]).await.unwrap();
        assert_eq!(ws.subscriptions().await, vec!["tickers.BTCUSDT"]);
    }

    #[tokio::test]
    async fn subscribe_lazily_connects() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = session(false, sent.clone(), None);

        assert!(!ws.is_connected().await);
        ws.subscribe_orderbook("BTCUSDT", 50).await.unwrap();
        assert!(ws.is_connected().await);
        assert_eq!(
            sent.lock().unwrap().as_slice(),
            [r#"{"op":"subscribe","args":["orderbook.50.BTCUSDT"]}"#]
        );
    }

    #[tokio::test]
    async fn private_session_authenticates_before_subscribing() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = session(true, sent.clone(), None);

        ws.subscribe_position().await.unwrap();

        let frames = sent.lock().unwrap();
        assert_eq!(frames.len(), 2);
        let auth: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(auth["op"], "auth");
        assert_eq!(auth["args"][0], "test-key");
        let sub: Value = serde_json::from_str(&frames[1]).unwrap();
        assert_eq!(sub["op"], "subscribe");
        assert_eq!(sub["args"][0], "position");
    }

    #[tokio::test]
    async fn public_session_skips_auth() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = session(false, sent.clone(), None);

        ws.connect().await.unwrap();
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_connect_leaves_session_disconnected() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let config = BybitConfig::read_only();
        let mut connector = MockConnector::new(sent, None);
        connector.fail_connect = true;
        let ws = BybitWebSocket::with_connector(config, false, Box::new(connector));

        let err = ws.subscribe(&["tickers.BTCUSDT"]).await.unwrap_err();
        assert!(matches!(err, BybitError::Connect(_)));
        assert!(!ws.is_connected().await);
    }

    #[tokio::test]
    async fn inbound_ping_triggers_pong_without_handler() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = session(false, sent.clone(), Some(rx));
        let seen = collect_handler(&ws).await;

        tx.send(Ok(Message::Text(r#"{"op":"ping"}"#.to_string())))
            .unwrap();
        drop(tx);

        ws.listen().await.unwrap();

        let frames = sent.lock().unwrap();
        assert!(frames.iter().any(|f| f.contains(r#""op":"pong""#)));
        // The ping itself is still dispatched verbatim
        assert_eq!(seen.lock().unwrap()[0]["op"], "ping");
    }

    #[tokio::test]
    async fn malformed_json_is_skipped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = session(false, sent, Some(rx));
        let seen = collect_handler(&ws).await;

        tx.send(Ok(Message::Text("{not json".to_string()))).unwrap();
        tx.send(Ok(Message::Text(
            r#"{"topic":"tickers.BTCUSDT","data":{}}"#.to_string(),
        )))
        .unwrap();
        drop(tx);

        ws.listen().await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0]["topic"], "tickers.BTCUSDT");
    }

    #[tokio::test]
    async fn read_failure_reports_exactly_once_and_exits() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = session(false, sent, Some(rx));
        let seen = collect_handler(&ws).await;

        tx.send(Err(BybitError::Transport("read reset".to_string())))
            .unwrap();
        // Anything queued behind the failure must never be dispatched
        tx.send(Ok(Message::Text(r#"{"op":"ignored"}"#.to_string())))
            .unwrap();

        ws.listen().await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["error"], true);
        assert!(seen[0]["message"].as_str().unwrap().contains("read reset"));
        assert!(!ws.is_connected().await);
    }

    #[tokio::test]
    async fn close_cancels_blocked_listen() {
        let (tx, rx) = mpsc::unbounded_channel::<Result<Message, BybitError>>();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = Arc::new(session(false, sent, Some(rx)));
        let seen = collect_handler(&ws).await;

        let listener = {
            let ws = ws.clone();
            tokio::spawn(async move { ws.listen().await })
        };

        // Give the listener a moment to block on the read
        tokio::time::sleep(Duration::from_millis(20)).await;
        ws.close().await;

        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .expect("listen did not exit after close")
            .unwrap()
            .unwrap();

        // A deliberate close is not a transport failure
        assert!(seen.lock().unwrap().is_empty());
        assert!(!ws.is_connected().await);
        drop(tx);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = session(false, sent, None);

        ws.connect().await.unwrap();
        ws.close().await;
        ws.close().await;
        assert!(!ws.is_connected().await);
    }

    #[tokio::test]
    async fn sends_work_from_other_tasks_while_listening() {
        let (tx, rx) = mpsc::unbounded_channel::<Result<Message, BybitError>>();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = Arc::new(session(false, sent.clone(), Some(rx)));

        let listener = {
            let ws = ws.clone();
            tokio::spawn(async move { ws.listen().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        ws.subscribe(&["tickers.BTCUSDT"]).await.unwrap();
        ws.ping().await.unwrap();

        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let frames = sent.lock().unwrap();
        assert!(frames.iter().any(|f| f.contains(r#""op":"subscribe""#)));
        assert!(frames.iter().any(|f| f.contains(r#""op":"ping""#)));
    }

    #[test]
    fn urls_select_environment_and_privacy() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let public = session(false, sent.clone(), None);
        assert_eq!(public.url(), "wss://stream.bybit.com/v5/public/spot");

        let config = BybitConfig::read_only().testnet(true);
        let private = BybitWebSocket::with_connector(
            config,
            true,
            Box::new(MockConnector::new(sent, None)),
        );
        assert_eq!(private.url(), "wss://stream-testnet.bybit.com/v5/private");
    }
}
