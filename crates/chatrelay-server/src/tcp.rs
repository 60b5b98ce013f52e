//! Newline-delimited JSON chat server over raw TCP.
//!
//! One task per accepted connection; the handler owns the socket for the
//! whole session and removes itself from the registry on the way out.

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::ReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use chatrelay_llm::ChatGateway;

use crate::handle::ServerHandle;
use crate::protocol::{
    is_quit, ChatFrame, ChatRequest, GOODBYE_MESSAGE, INVALID_FORMAT_MESSAGE, WELCOME_MESSAGE,
};
use crate::registry::{Connection, ConnectionId, ConnectionRegistry};
use crate::session::{SessionState, SharedDefaults};

#[derive(Clone, Debug)]
pub struct TcpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8888,
        }
    }
}

/// Bind and start accepting. Failure to bind is the only fatal error.
pub async fn start(
    config: TcpServerConfig,
    gateway: Arc<ChatGateway>,
    defaults: Arc<SharedDefaults>,
) -> io::Result<ServerHandle> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local_addr = listener.local_addr()?;

    let registry = Arc::new(ConnectionRegistry::new());
    let running = Arc::new(AtomicBool::new(true));
    let shutdown = CancellationToken::new();

    tracing::info!(host = %config.host, port = local_addr.port(), "chat socket server started");

    let acceptor = tokio::spawn(accept_loop(
        listener,
        Arc::clone(&registry),
        gateway,
        defaults,
        shutdown.clone(),
    ));

    Ok(ServerHandle::new(
        config.host,
        local_addr,
        running,
        shutdown,
        registry,
        acceptor,
    ))
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    gateway: Arc<ChatGateway>,
    defaults: Arc<SharedDefaults>,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                let id = ConnectionId::from_addr(peer);
                let closer = shutdown.child_token();
                let conn = Arc::new(Connection::new(id, Some(peer), closer.clone()));
                registry.register(Arc::clone(&conn));
                tracing::info!(peer = %peer, "new connection");

                tokio::spawn(handle_client(
                    stream,
                    conn,
                    Arc::clone(&registry),
                    Arc::clone(&gateway),
                    defaults.snapshot(),
                    closer,
                ));
            }
            Err(err) => {
                if shutdown.is_cancelled() {
                    break;
                }
                tracing::error!(error = %err, "error accepting connection");
            }
        }
    }
    // Dropping the listener here releases the port; handlers drain on their own.
}

/// Run one client session to completion, then tear down. Unregistration runs
/// no matter how the session loop ended.
async fn handle_client(
    stream: TcpStream,
    conn: Arc<Connection>,
    registry: Arc<ConnectionRegistry>,
    gateway: Arc<ChatGateway>,
    session: SessionState,
    closer: CancellationToken,
) {
    let id = conn.id.clone();

    if let Err(err) = serve_client(stream, &id, &session, &gateway, &closer).await {
        tracing::info!(client = %id, error = %err, "connection ended with transport error");
    }

    registry.unregister(&id);
    let connected_secs = (chrono::Utc::now() - conn.opened_at).num_seconds();
    tracing::info!(client = %id, connected_secs, "connection closed");
}

async fn serve_client(
    mut stream: TcpStream,
    id: &ConnectionId,
    session: &SessionState,
    gateway: &ChatGateway,
    closer: &CancellationToken,
) -> io::Result<()> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    send_frame(&mut write_half, &ChatFrame::system(WELCOME_MESSAGE)).await?;

    let mut line = String::new();
    loop {
        line.clear();
        let read = tokio::select! {
            _ = closer.cancelled() => return Ok(()),
            read = read_frame(&mut reader, &mut line) => read?,
        };
        let Some(payload) = read else {
            return Ok(());
        };

        let request: ChatRequest = match serde_json::from_str(&payload) {
            Ok(request) => request,
            Err(_) => {
                send_frame(&mut write_half, &ChatFrame::error(INVALID_FORMAT_MESSAGE)).await?;
                continue;
            }
        };

        let text = request.message.trim();
        if is_quit(text) {
            send_frame(&mut write_half, &ChatFrame::system(GOODBYE_MESSAGE)).await?;
            return Ok(());
        }
        if text.is_empty() {
            continue;
        }

        tracing::info!(client = %id, message = %text, "received chat message");
        let reply = gateway.reply(text, &session.model).await;
        send_frame(&mut write_half, &ChatFrame::bot(reply)).await?;
    }
}

/// Read one newline-delimited frame. Returns `None` at end-of-stream; bytes
/// that arrive without a trailing newline before the peer disconnects count
/// as end-of-stream, not as a frame.
async fn read_frame(
    reader: &mut BufReader<ReadHalf<'_>>,
    line: &mut String,
) -> io::Result<Option<String>> {
    let n = reader.read_line(line).await?;
    if n == 0 || !line.ends_with('\n') {
        return Ok(None);
    }
    Ok(Some(line.trim_end().to_string()))
}

async fn send_frame(
    writer: &mut (impl AsyncWrite + Unpin),
    frame: &ChatFrame,
) -> io::Result<()> {
    writer.write_all(frame.to_line().as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, BufReader as TokioBufReader};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

    use chatrelay_core::errors::GatewayError;
    use chatrelay_llm::gateway::UNAVAILABLE_REPLY;
    use chatrelay_llm::mock::MockChatModel;

    use crate::session::LanguagePair;

    struct TestClient {
        reader: TokioBufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl TestClient {
        async fn connect(addr: std::net::SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.expect("connect");
            let (read, writer) = stream.into_split();
            Self {
                reader: TokioBufReader::new(read),
                writer,
            }
        }

        async fn send_line(&mut self, raw: &str) {
            self.writer.write_all(raw.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }

        async fn recv(&mut self) -> Option<serde_json::Value> {
            let mut line = String::new();
            let n = tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
                .await
                .expect("read timed out")
                .unwrap();
            if n == 0 {
                return None;
            }
            Some(serde_json::from_str(line.trim_end()).expect("reply is JSON"))
        }

        async fn expect_eof(&mut self) {
            let mut buf = [0u8; 1];
            let n = tokio::time::timeout(Duration::from_secs(5), self.reader.read(&mut buf))
                .await
                .expect("read timed out")
                .unwrap();
            assert_eq!(n, 0, "expected end-of-stream");
        }
    }

    async fn start_with(model: Arc<MockChatModel>) -> ServerHandle {
        let gateway = Arc::new(ChatGateway::new(model));
        let defaults = Arc::new(SharedDefaults::new(
            "meta/llama-3.1-8b-instruct",
            LanguagePair::new("en", "de"),
        ));
        let config = TcpServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        start(config, gateway, defaults).await.expect("server starts")
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn welcome_then_bot_then_goodbye() {
        let model = Arc::new(MockChatModel::echo());
        let handle = start_with(Arc::clone(&model)).await;

        let mut client = TestClient::connect(handle.local_addr()).await;

        let welcome = client.recv().await.unwrap();
        assert_eq!(welcome["type"], "system");
        assert_eq!(welcome["message"], WELCOME_MESSAGE);

        client.send_line(r#"{"message": "Hello, bot!"}"#).await;
        let reply = client.recv().await.unwrap();
        assert_eq!(reply["type"], "bot");
        assert_eq!(reply["message"], "echo: Hello, bot!");

        client.send_line(r#"{"message": "quit"}"#).await;
        let goodbye = client.recv().await.unwrap();
        assert_eq!(goodbye["type"], "system");
        assert_eq!(goodbye["message"], GOODBYE_MESSAGE);
        client.expect_eof().await;

        // Exactly one gateway call for the one chat turn.
        assert_eq!(model.call_count(), 1);

        wait_until(|| handle.registry().count() == 0).await;
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn replies_arrive_in_message_order() {
        let model = Arc::new(MockChatModel::echo());
        let handle = start_with(model).await;

        let mut client = TestClient::connect(handle.local_addr()).await;
        client.recv().await.unwrap(); // welcome

        for text in ["one", "two", "three"] {
            client
                .send_line(&format!(r#"{{"message": "{text}"}}"#))
                .await;
        }
        for text in ["one", "two", "three"] {
            let reply = client.recv().await.unwrap();
            assert_eq!(reply["message"], format!("echo: {text}"));
        }

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_input_keeps_connection_open() {
        let model = Arc::new(MockChatModel::echo());
        let handle = start_with(Arc::clone(&model)).await;

        let mut client = TestClient::connect(handle.local_addr()).await;
        client.recv().await.unwrap(); // welcome

        client.send_line("this is not json").await;
        let reply = client.recv().await.unwrap();
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["message"], INVALID_FORMAT_MESSAGE);

        // No gateway call was made for the malformed frame.
        assert_eq!(model.call_count(), 0);

        // The connection still works.
        client.send_line(r#"{"message": "still here"}"#).await;
        let reply = client.recv().await.unwrap();
        assert_eq!(reply["message"], "echo: still here");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn empty_and_missing_message_bodies_are_ignored() {
        let model = Arc::new(MockChatModel::echo());
        let handle = start_with(Arc::clone(&model)).await;

        let mut client = TestClient::connect(handle.local_addr()).await;
        client.recv().await.unwrap(); // welcome

        client.send_line(r#"{"message": "   "}"#).await;
        client.send_line(r#"{"user_id": "someone"}"#).await;
        client.send_line(r#"{"message": "real"}"#).await;

        // The first reply corresponds to the first non-empty message.
        let reply = client.recv().await.unwrap();
        assert_eq!(reply["message"], "echo: real");
        assert_eq!(model.call_count(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn quit_keyword_variants_close_and_unregister() {
        let model = Arc::new(MockChatModel::echo());
        let handle = start_with(model).await;

        for quit in ["QUIT", "  exit  ", "Bye"] {
            let mut client = TestClient::connect(handle.local_addr()).await;
            client.recv().await.unwrap(); // welcome

            wait_until(|| handle.registry().count() == 1).await;

            client
                .send_line(&format!(r#"{{"message": "{quit}"}}"#))
                .await;
            let goodbye = client.recv().await.unwrap();
            assert_eq!(goodbye["message"], GOODBYE_MESSAGE);
            client.expect_eof().await;

            wait_until(|| handle.registry().count() == 0).await;
        }

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_connections_quitting_leave_registry_empty() {
        let model = Arc::new(MockChatModel::echo());
        let handle = start_with(model).await;
        let addr = handle.local_addr();

        let mut sessions = Vec::new();
        for i in 0..8 {
            sessions.push(tokio::spawn(async move {
                let mut client = TestClient::connect(addr).await;
                client.recv().await.unwrap(); // welcome

                client
                    .send_line(&format!(r#"{{"message": "hello {i}"}}"#))
                    .await;
                let reply = client.recv().await.unwrap();
                assert_eq!(reply["message"], format!("echo: hello {i}"));

                client.send_line(r#"{"message": "quit"}"#).await;
                let goodbye = client.recv().await.unwrap();
                assert_eq!(goodbye["message"], GOODBYE_MESSAGE);
                client.expect_eof().await;
            }));
        }
        for session in sessions {
            session.await.unwrap();
        }

        wait_until(|| handle.registry().count() == 0).await;
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn gateway_fault_yields_fallback_and_connection_survives() {
        let model = Arc::new(MockChatModel::scripted([
            Err(GatewayError::Network("connection refused".into())),
            Ok("recovered".to_string()),
        ]));
        let handle = start_with(model).await;

        let mut client = TestClient::connect(handle.local_addr()).await;
        client.recv().await.unwrap(); // welcome

        client.send_line(r#"{"message": "are you there?"}"#).await;
        let reply = client.recv().await.unwrap();
        assert_eq!(reply["type"], "bot");
        assert_eq!(reply["message"], UNAVAILABLE_REPLY);

        client.send_line(r#"{"message": "and now?"}"#).await;
        let reply = client.recv().await.unwrap();
        assert_eq!(reply["message"], "recovered");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_active_connections_and_refuses_new() {
        let model = Arc::new(MockChatModel::echo());
        let handle = start_with(model).await;
        let addr = handle.local_addr();

        let mut clients = Vec::new();
        for _ in 0..3 {
            let mut client = TestClient::connect(addr).await;
            client.recv().await.unwrap(); // welcome
            clients.push(client);
        }
        wait_until(|| handle.registry().count() == 3).await;

        let registry = Arc::clone(handle.registry());
        handle.shutdown().await;

        for client in &mut clients {
            client.expect_eof().await;
        }
        wait_until(move || registry.count() == 0).await;

        assert!(TcpStream::connect(addr).await.is_err(), "listener should be gone");
    }

    #[tokio::test]
    async fn status_snapshot_tracks_connections() {
        let model = Arc::new(MockChatModel::echo());
        let handle = start_with(model).await;

        let status = handle.status();
        assert!(status.running);
        assert_eq!(status.host, "127.0.0.1");
        assert_eq!(status.port, handle.port());
        assert_eq!(status.active_connections, 0);

        let mut client = TestClient::connect(handle.local_addr()).await;
        client.recv().await.unwrap();
        wait_until(|| handle.registry().count() == 1).await;
        assert_eq!(handle.status().active_connections, 1);

        handle.shutdown().await;
    }
}
