//! WebSocket chat server: one JSON command per text frame.
//!
//! Same architecture as the socket variant — register, serve, unregister —
//! with a richer command vocabulary (model selection, translation, language
//! catalog). Each connection's session state is its own; commands never
//! mutate anything another connection can observe.

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use chatrelay_llm::{ChatGateway, TranslationGateway};

use crate::handle::ServerHandle;
use crate::protocol::{
    is_quit, ClientCommand, WsReply, GOODBYE_MESSAGE, INVALID_FORMAT_MESSAGE, WELCOME_MESSAGE,
};
use crate::registry::{Connection, ConnectionId, ConnectionRegistry};
use crate::session::{SessionState, SharedDefaults};

#[derive(Clone, Debug)]
pub struct WsServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WsServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8890,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
struct WsState {
    chat: Arc<ChatGateway>,
    translation: Arc<TranslationGateway>,
    defaults: Arc<SharedDefaults>,
    registry: Arc<ConnectionRegistry>,
    shutdown: CancellationToken,
}

/// Bind and start serving `/ws` upgrades.
pub async fn start(
    config: WsServerConfig,
    chat: Arc<ChatGateway>,
    translation: Arc<TranslationGateway>,
    defaults: Arc<SharedDefaults>,
) -> io::Result<ServerHandle> {
    let registry = Arc::new(ConnectionRegistry::new());
    let running = Arc::new(AtomicBool::new(true));
    let shutdown = CancellationToken::new();

    let state = WsState {
        chat,
        translation,
        defaults,
        registry: Arc::clone(&registry),
        shutdown: shutdown.clone(),
    };

    let router = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(host = %config.host, port = local_addr.port(), "websocket chat server started");

    let stop = shutdown.clone();
    let acceptor = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(stop.cancelled_owned())
            .await
            .ok();
    });

    Ok(ServerHandle::new(
        config.host,
        local_addr,
        running,
        shutdown,
        registry,
        acceptor,
    ))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one WebSocket session to completion, then tear down.
async fn handle_socket(socket: WebSocket, state: WsState) {
    let id = ConnectionId::generate();
    let closer = state.shutdown.child_token();
    let conn = Arc::new(Connection::new(id.clone(), None, closer.clone()));
    state.registry.register(Arc::clone(&conn));
    tracing::info!(client = %id, "websocket client connected");

    let mut session = state.defaults.snapshot();
    if let Err(err) = serve_socket(socket, &id, &mut session, &state, &closer).await {
        tracing::info!(client = %id, error = %err, "connection ended with transport error");
    }

    state.registry.unregister(&id);
    let connected_secs = (chrono::Utc::now() - conn.opened_at).num_seconds();
    tracing::info!(client = %id, connected_secs, "connection closed");
}

async fn serve_socket(
    mut socket: WebSocket,
    id: &ConnectionId,
    session: &mut SessionState,
    state: &WsState,
    closer: &CancellationToken,
) -> Result<(), axum::Error> {
    send_reply(&mut socket, &WsReply::response(WELCOME_MESSAGE)).await?;

    loop {
        enum Event {
            Closing,
            Received(Option<Result<Message, axum::Error>>),
        }

        let event = tokio::select! {
            _ = closer.cancelled() => Event::Closing,
            received = socket.recv() => Event::Received(received),
        };
        let received = match event {
            Event::Closing => {
                let _ = socket.send(Message::Close(None)).await;
                return Ok(());
            }
            Event::Received(None) => return Ok(()),
            Event::Received(Some(received)) => received,
        };

        match received? {
            Message::Text(raw) => {
                tracing::debug!(client = %id, "received frame");
                match dispatch(raw.as_str(), session, &state.chat, &state.translation).await {
                    Outcome::Reply(reply) => send_reply(&mut socket, &reply).await?,
                    Outcome::Silent => {}
                    Outcome::Close(reply) => {
                        send_reply(&mut socket, &reply).await?;
                        let _ = socket.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
            }
            Message::Close(_) => return Ok(()),
            // axum answers pings automatically; binary frames are not part
            // of the protocol.
            _ => {}
        }
    }
}

async fn send_reply(socket: &mut WebSocket, reply: &WsReply) -> Result<(), axum::Error> {
    socket.send(Message::Text(reply.to_json().into())).await
}

/// What one inbound frame asks the session loop to do.
#[derive(Debug)]
enum Outcome {
    Reply(WsReply),
    Silent,
    Close(WsReply),
}

/// Interpret one inbound frame against this connection's session.
async fn dispatch(
    raw: &str,
    session: &mut SessionState,
    chat: &ChatGateway,
    translation: &TranslationGateway,
) -> Outcome {
    let command: ClientCommand = match serde_json::from_str(raw) {
        Ok(command) => command,
        Err(_) => return Outcome::Reply(WsReply::error(INVALID_FORMAT_MESSAGE)),
    };

    match command {
        ClientCommand::Model { text } => {
            let model = text.trim();
            if !model.is_empty() {
                session.model = model.to_string();
            }
            Outcome::Silent
        }
        ClientCommand::Message { text } => {
            let text = text.trim();
            if is_quit(text) {
                return Outcome::Close(WsReply::response(GOODBYE_MESSAGE));
            }
            if text.is_empty() {
                return Outcome::Silent;
            }
            let reply = chat.reply(text, &session.model).await;
            Outcome::Reply(WsReply::response(reply))
        }
        ClientCommand::Translate { text, text_from, text_to } => {
            session.apply_languages(text_from.as_deref(), text_to.as_deref());
            let text = text.trim();
            if text.is_empty() {
                return Outcome::Silent;
            }
            let translated = translation
                .translate(text, &session.languages.source, &session.languages.target)
                .await;
            Outcome::Reply(WsReply::response(translated))
        }
        ClientCommand::Languages => {
            let catalog = translation.languages().await;
            let listing = serde_json::to_string(&catalog).unwrap_or_else(|_| "{}".to_string());
            Outcome::Reply(WsReply::response(listing))
        }
    }
}
