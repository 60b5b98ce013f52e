use std::sync::Arc;

use clap::Parser;

use chatrelay_core::provider::{ChatModel, Translator};
use chatrelay_core::Settings;
use chatrelay_llm::{ChatGateway, NvidiaProvider, RivaTranslator, TranslationGateway};
use chatrelay_server::session::{LanguagePair, SharedDefaults};
use chatrelay_server::{tcp, ws};

/// Chat relay: forwards client messages to an LLM API and relays replies.
#[derive(Parser, Debug)]
#[command(name = "chatrelay", version, about)]
struct Cli {
    /// Listen host for both servers (overrides HOST).
    #[arg(long)]
    host: Option<String>,
    /// Socket server port (overrides PORT).
    #[arg(long)]
    port: Option<u16>,
    /// WebSocket server port (overrides WS_PORT).
    #[arg(long)]
    ws_port: Option<u16>,
    /// Skip the WebSocket server and serve raw sockets only.
    #[arg(long)]
    no_ws: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;
    if let Some(host) = cli.host {
        settings.host = host;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(ws_port) = cli.ws_port {
        settings.ws_port = ws_port;
    }

    tracing::info!("starting chatrelay");

    let provider: Arc<dyn ChatModel> = Arc::new(NvidiaProvider::new(
        settings.base_url.clone(),
        settings.api_key.clone(),
    ));
    let chat = Arc::new(ChatGateway::new(provider));

    let translator: Arc<dyn Translator> = Arc::new(RivaTranslator::new(
        &settings.translate,
        settings.api_key.clone(),
    ));
    let translation = Arc::new(TranslationGateway::new(translator));

    let defaults = Arc::new(SharedDefaults::new(
        settings.model_name.clone(),
        LanguagePair::new(&settings.translate.text_from, &settings.translate.text_to),
    ));

    let tcp_handle = tcp::start(
        tcp::TcpServerConfig {
            host: settings.host.clone(),
            port: settings.port,
        },
        Arc::clone(&chat),
        Arc::clone(&defaults),
    )
    .await?;

    let ws_handle = if cli.no_ws {
        None
    } else {
        Some(
            ws::start(
                ws::WsServerConfig {
                    host: settings.host.clone(),
                    port: settings.ws_port,
                },
                chat,
                translation,
                defaults,
            )
            .await?,
        )
    };

    tracing::info!(
        socket_port = tcp_handle.port(),
        ws_port = ws_handle.as_ref().map(|h| h.port()),
        "chatrelay ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    tcp_handle.shutdown().await;
    if let Some(ws_handle) = ws_handle {
        ws_handle.shutdown().await;
    }

    Ok(())
}
