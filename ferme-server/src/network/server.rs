//! WebSocket Game Server
//!
//! Async WebSocket server. Every connection talks to the same `GameTable`,
//! so a reconnecting browser picks up the game where it left off.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::game::engine::GameError;
use crate::game::rules::GameRules;
use crate::network::protocol::{
    ClientMessage, ServerMessage, ServerError, ErrorCode, BonusOffer,
};
use crate::network::session::{GameTable, MoveOutcome};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Connections silent for this long are closed.
    pub idle_timeout: Duration,
    /// Seed for games started without one (reproducible play).
    pub fixed_seed: Option<u64>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: 64,
            idle_timeout: Duration::from_secs(300),
            fixed_seed: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("FERME_BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            max_connections: std::env::var("FERME_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            idle_timeout: std::env::var("FERME_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
            fixed_seed: std::env::var("FERME_SEED")
                .ok()
                .and_then(|v| v.parse().ok()),
            version: defaults.version,
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached.
    #[error("Connection limit reached")]
    ConnectionLimitReached,

    /// Outgoing message could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Connection time.
    connected_at: Instant,
    /// Last message received.
    last_activity: Instant,
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// The single game table.
    table: Arc<GameTable>,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig, rules: GameRules) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let table = GameTable::new(rules).with_fixed_seed(config.fixed_seed);

        Self {
            config,
            table: Arc::new(table),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            // Register before spawning so a burst of accepts sees the count
                            {
                                let mut clients = self.clients.write().await;
                                if clients.len() >= self.config.max_connections {
                                    warn!("Rejecting {}: {}", addr, GameServerError::ConnectionLimitReached);
                                    continue;
                                }
                                let now = Instant::now();
                                clients.insert(addr, ConnectedClient {
                                    connected_at: now,
                                    last_activity: now,
                                });
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection. The client must already be registered.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let table = self.table.clone();
        let idle_timeout = self.config.idle_timeout;
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            if let Err(e) = Self::serve_connection(stream, addr, &clients, &table, idle_timeout, shutdown_rx).await {
                error!("Connection {} failed: {}", addr, e);
            }

            if let Some(client) = clients.write().await.remove(&addr) {
                info!("Client {} cleaned up after {:?}", addr, client.connected_at.elapsed());
            }
        });
    }

    /// Pump one connection until it closes, idles out, or the server stops.
    async fn serve_connection(
        stream: TcpStream,
        addr: SocketAddr,
        clients: &Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
        table: &Arc<GameTable>,
        idle_timeout: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

        // Spawn message sender task
        let sender_task = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                let text = match msg.to_json() {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Failed to serialize message: {}", GameServerError::Encode(e));
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    return;
                }
            }
            let _ = ws_sender.close().await;
        });

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            touch(clients, addr).await;

                            let replies = match ClientMessage::from_json(&text) {
                                Ok(client_msg) => {
                                    debug!("{} -> {}", addr, client_msg.kind());
                                    Self::dispatch(table, client_msg).await
                                }
                                Err(e) => {
                                    debug!("Invalid message from {}: {}", addr, e);
                                    vec![ServerMessage::Error(ServerError::new(
                                        ErrorCode::InvalidInput,
                                        "Invalid message format",
                                    ))]
                                }
                            };

                            for reply in replies {
                                if msg_tx.send(reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                ErrorCode::InvalidInput,
                                "Binary frames are not supported",
                            ))).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Client {} disconnected", addr);
                            break;
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                            // Keepalives count as activity; tungstenite answers pings itself
                            touch(clients, addr).await;
                        }
                        Some(Err(e)) => {
                            sender_task.abort();
                            return Err(e.into());
                        }
                        _ => {}
                    }
                }
                _ = tokio::time::sleep(idle_timeout) => {
                    let idle = clients.read().await
                        .get(&addr)
                        .map(|c| c.last_activity.elapsed())
                        .unwrap_or_default();
                    if idle >= idle_timeout {
                        info!("Closing idle client {}", addr);
                        break;
                    }
                }
                _ = shutdown_rx.recv() => {
                    let _ = msg_tx.send(ServerMessage::Shutdown {
                        reason: "Server shutting down".to_string(),
                    }).await;
                    break;
                }
            }
        }

        // Let queued replies flush before the socket drops
        drop(msg_tx);
        let _ = sender_task.await;

        Ok(())
    }

    /// Apply one client message to the table and build the replies.
    pub async fn dispatch(table: &GameTable, msg: ClientMessage) -> Vec<ServerMessage> {
        match msg {
            ClientMessage::Start { seed } => {
                vec![ServerMessage::State(table.start(seed).await)]
            }
            ClientMessage::Roll => move_replies(table.roll().await),
            ClientMessage::Exit { fruit } => move_replies(table.exit_round(&fruit).await),
            ClientMessage::ChooseBonus { chosen } => move_replies(table.choose_bonus(&chosen).await),
            ClientMessage::PlaceFirst { fruit } => move_replies(table.place_first(&fruit).await),
            ClientMessage::UseBonus => match table.use_bonus().await {
                Ok(draw) => {
                    let mut replies = Vec::with_capacity(2);
                    if !draw.events.is_empty() {
                        replies.push(ServerMessage::Events { events: draw.events.clone() });
                    }
                    replies.push(ServerMessage::Bonus(BonusOffer::from(draw)));
                    replies
                }
                Err(e) => vec![error_reply(&e)],
            },
            ClientMessage::GetState => vec![ServerMessage::State(table.state().await)],
            ClientMessage::GetScore => vec![ServerMessage::Score { score: table.score().await }],
            ClientMessage::Ping { timestamp } => vec![ServerMessage::Pong {
                timestamp,
                server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
            }],
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// The game table served by this server.
    pub fn table(&self) -> &Arc<GameTable> {
        &self.table
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn touch(clients: &RwLock<BTreeMap<SocketAddr, ConnectedClient>>, addr: SocketAddr) {
    if let Some(client) = clients.write().await.get_mut(&addr) {
        client.last_activity = Instant::now();
    }
}

fn move_replies(outcome: Result<MoveOutcome, GameError>) -> Vec<ServerMessage> {
    match outcome {
        Ok(MoveOutcome { update, result }) => {
            let mut replies = Vec::with_capacity(2);
            if !result.events.is_empty() {
                replies.push(ServerMessage::Events { events: result.events });
            }
            replies.push(ServerMessage::State(update));
            replies
        }
        Err(e) => vec![error_reply(&e)],
    }
}

fn error_reply(err: &GameError) -> ServerMessage {
    debug!("Rejected move: {}", err);
    ServerMessage::Error(ServerError::from(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Default::default()
        }
    }

    async fn spawn_server(
        config: ServerConfig,
    ) -> (Arc<GameServer>, SocketAddr, JoinHandle<Result<(), GameServerError>>) {
        let server = Arc::new(GameServer::new(config, GameRules::default()));
        let listener = TcpListener::bind(server.config().bind_addr).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let serving = server.clone();
        let handle = tokio::spawn(async move { serving.serve(listener).await });
        (server, addr, handle)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        ws
    }

    /// Next server message, skipping control frames. `None` once the socket closes.
    async fn next_message(ws: &mut Client) -> Option<ServerMessage> {
        let read = async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => return Some(ServerMessage::from_json(&text).unwrap()),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                    Some(Ok(_)) => continue,
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), read)
            .await
            .expect("no frame from server within 5s")
    }

    async fn wait_for_connections(server: &GameServer, expected: usize) {
        for _ in 0..200 {
            if server.connection_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("connection count never reached {}", expected);
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.max_connections, 64);
        assert!(config.fixed_seed.is_none());
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = GameServer::new(test_config(), GameRules::default());

        assert_eq!(server.connection_count().await, 0);
        assert!(!server.table().has_game().await);
    }

    #[tokio::test]
    async fn test_shutdown_notifies_clients() {
        let (server, addr, handle) = spawn_server(test_config()).await;
        let mut ws = connect(addr).await;
        wait_for_connections(&server, 1).await;

        server.shutdown();

        match next_message(&mut ws).await {
            Some(ServerMessage::Shutdown { reason }) => assert!(!reason.is_empty()),
            other => panic!("expected shutdown, got {:?}", other),
        }
        assert!(next_message(&mut ws).await.is_none());
        handle.await.unwrap().unwrap();
        wait_for_connections(&server, 0).await;
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let config = ServerConfig { max_connections: 1, ..test_config() };
        let (server, addr, handle) = spawn_server(config).await;

        let mut first = connect(addr).await;
        assert_eq!(server.connection_count().await, 1);

        // Over the limit: dropped before the handshake completes
        match connect_async(format!("ws://{}", addr)).await {
            Err(_) => {}
            Ok((mut second, _)) => assert!(next_message(&mut second).await.is_none()),
        }

        // The first client is unaffected
        first.send(Message::Text(r#"{"type":"ping","timestamp":7}"#.to_string())).await.unwrap();
        assert!(matches!(next_message(&mut first).await, Some(ServerMessage::Pong { timestamp: 7, .. })));

        // Its slot frees up once it leaves
        first.close(None).await.unwrap();
        wait_for_connections(&server, 0).await;
        let mut third = connect(addr).await;
        third.send(Message::Text(r#"{"type":"get_score"}"#.to_string())).await.unwrap();
        assert!(matches!(next_message(&mut third).await, Some(ServerMessage::Score { score: None })));

        server.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_idle_client_is_closed() {
        let config = ServerConfig { idle_timeout: Duration::from_millis(200), ..test_config() };
        let (server, addr, handle) = spawn_server(config).await;

        let mut ws = connect(addr).await;
        assert!(next_message(&mut ws).await.is_none());
        wait_for_connections(&server, 0).await;

        server.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_keepalive_pings_count_as_activity() {
        let config = ServerConfig { idle_timeout: Duration::from_millis(300), ..test_config() };
        let (server, addr, handle) = spawn_server(config).await;
        let mut ws = connect(addr).await;

        for _ in 0..8 {
            ws.send(Message::Ping(vec![1])).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let idle = server.clients.read().await.values().next().map(|c| c.last_activity.elapsed());
        assert!(idle.unwrap() < Duration::from_millis(300));

        ws.send(Message::Text(r#"{"type":"get_state"}"#.to_string())).await.unwrap();
        assert!(matches!(next_message(&mut ws).await, Some(ServerMessage::State(_))));

        server.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_before_start() {
        let table = GameTable::new(GameRules::default());

        let replies = GameServer::dispatch(&table, ClientMessage::Roll).await;
        assert!(matches!(
            replies.as_slice(),
            [ServerMessage::Error(ServerError { code: ErrorCode::NoActiveSession, .. })]
        ));

        let replies = GameServer::dispatch(&table, ClientMessage::GetScore).await;
        assert!(matches!(replies.as_slice(), [ServerMessage::Score { score: None }]));

        let replies = GameServer::dispatch(&table, ClientMessage::GetState).await;
        assert!(matches!(replies.as_slice(), [ServerMessage::State(update)] if update.session.is_none()));
    }

    #[tokio::test]
    async fn test_dispatch_move_sends_events_then_state() {
        let table = GameTable::new(GameRules::default());
        GameServer::dispatch(&table, ClientMessage::Start { seed: Some(8) }).await;

        let replies = GameServer::dispatch(&table, ClientMessage::Exit { fruit: "prune".into() }).await;
        match replies.as_slice() {
            [ServerMessage::Events { events }, ServerMessage::State(update)] => {
                assert!(!events.is_empty());
                assert_eq!(update.session.as_ref().unwrap().round, 2);
            }
            other => panic!("unexpected replies: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_invalid_fruit() {
        let table = GameTable::new(GameRules::default());
        GameServer::dispatch(&table, ClientMessage::Start { seed: Some(8) }).await;

        let replies = GameServer::dispatch(&table, ClientMessage::ChooseBonus { chosen: "kiwi".into() }).await;
        assert!(matches!(
            replies.as_slice(),
            [ServerMessage::Error(ServerError { code: ErrorCode::InvalidFruit, .. })]
        ));
    }

    #[tokio::test]
    async fn test_dispatch_bonus() {
        let table = GameTable::new(GameRules::default());
        GameServer::dispatch(&table, ClientMessage::Start { seed: Some(8) }).await;

        let replies = GameServer::dispatch(&table, ClientMessage::UseBonus).await;
        match replies.last() {
            Some(ServerMessage::Bonus(offer)) => assert_eq!(offer.candidates.len(), 2),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_websocket_round_trip() {
        let (server, addr, handle) = spawn_server(test_config()).await;

        let mut ws = connect(addr).await;
        ws.send(Message::Text(r#"{"type":"start","seed":4}"#.to_string())).await.unwrap();

        match next_message(&mut ws).await {
            Some(ServerMessage::State(update)) => {
                let session = update.session.unwrap();
                assert_eq!(session.round, 1);
                assert_eq!(session.bowl_remaining, 9);
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        server.shutdown();
        handle.await.unwrap().unwrap();
    }
}
