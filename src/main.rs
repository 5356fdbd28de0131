use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loqa_interpreter::audio::{AudioBackendConfig, AudioBackendFactory, AudioSource};
use loqa_interpreter::client::{ClientCommand, ClientEvent, ConversationClient, FilePlayer};
use loqa_interpreter::pipeline::{Engines, PipelineOrchestrator};
use loqa_interpreter::{create_router, AppState, Config, NatsEngines, RelaySession, SessionRegistry};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "loqa-interpreter")]
#[command(about = "Two-party translated conversation relay")]
struct Cli {
    /// Config file (without extension)
    #[arg(short, long, default_value = "config/loqa-interpreter")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay server (default)
    Serve,

    /// Talk to an in-process relay using a WAV file as the microphone
    Replay {
        /// WAV file replayed as live input for every turn
        input: String,

        /// Where synthesized replies are written
        #[arg(short, long, default_value = "replies")]
        output_dir: String,

        /// Stop after this many played replies
        #[arg(short, long, default_value = "2")]
        turns: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Loqa Interpreter v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let nats = Arc::new(
        NatsEngines::connect(cfg.engines.clone())
            .await
            .context("Failed to connect to engines")?,
    );
    let engines = Engines::shared(Arc::clone(&nats));

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg, engines).await,
        Command::Replay {
            input,
            output_dir,
            turns,
        } => replay(cfg, engines, input, output_dir, turns).await,
    };

    if let Err(e) = nats.close().await {
        warn!("{:#}", e);
    }
    result
}

async fn serve(cfg: Config, engines: Engines) -> Result<()> {
    let state = AppState::new(engines, cfg.relay.clone());
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Relay listening on http://{}", addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}

async fn replay(
    cfg: Config,
    engines: Engines,
    input: String,
    output_dir: String,
    turns: usize,
) -> Result<()> {
    let orchestrator = Arc::new(PipelineOrchestrator::new(engines, &cfg.relay));
    let (to_client, from_server) = mpsc::channel(256);
    let (to_server, from_client) = mpsc::channel(256);

    let session = RelaySession::open(SessionRegistry::new(), orchestrator, cfg.relay.clone(), to_client)
        .await
        .context("Failed to open session")?;
    let server = tokio::spawn(session.run(from_client));

    let backend = AudioBackendFactory::create(AudioSource::File(input), AudioBackendConfig::default())?;
    let player = FilePlayer::new(output_dir).realtime(true);
    let (events_tx, mut events_rx) = mpsc::channel(64);
    let (commands_tx, commands_rx) = mpsc::channel(4);

    let client = ConversationClient::new(&cfg, backend, Box::new(player), to_server, events_tx);
    let client = tokio::spawn(client.run(from_server, commands_rx));
    commands_tx.send(ClientCommand::StartListening).await?;

    let mut played = 0;
    while let Some(event) = events_rx.recv().await {
        match event {
            ClientEvent::Transcript { text, .. } => info!("Heard: {}", text),
            ClientEvent::Translation { text, partial: false, .. } => info!("Translated: {}", text),
            ClientEvent::TurnSwapped(languages) => {
                played += 1;
                info!("Turn {} done, now {} → {}", played, languages.source, languages.target);
                if played >= turns {
                    let _ = commands_tx.send(ClientCommand::Shutdown).await;
                }
            }
            ClientEvent::Error { kind, message } => warn!("{:?}: {}", kind, message),
            ClientEvent::Halted => {
                error!("Turn-taking halted");
                let _ = commands_tx.send(ClientCommand::Shutdown).await;
            }
            other => info!("{:?}", other),
        }
    }

    client.await.context("Client task failed")??;
    server.await.context("Session task failed")?;
    Ok(())
}
