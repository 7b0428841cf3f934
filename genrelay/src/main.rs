// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, Subcommand};
use genrelay::client::RelayClient;
use genrelay::config::{self, ConfigSource};
use genrelay::relay;
use genrelay::source::GenerateRequest;
use genrelay::stream::{StreamCallbacks, StreamError};

use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genrelay", about = "Streaming relay for generative backends")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay server
    Serve {
        /// Path to the genrelay.yaml config file
        #[arg(long, default_value = "genrelay.yaml", env = "GENRELAY_CONFIG")]
        config: String,

        /// Port to listen on (overrides server.port)
        #[arg(long, env = "GENRELAY_PORT")]
        port: Option<u16>,
    },
    /// Send a prompt to a running relay and print the reply as it arrives
    Ask {
        /// Relay base URL
        #[arg(long, default_value = "http://127.0.0.1:9810", env = "GENRELAY_URL")]
        url: String,

        /// Model to request instead of the relay's default
        #[arg(long)]
        model: Option<String>,

        prompt: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Command::Serve { config, port } => serve(config, port).await,
        Command::Ask { url, model, prompt } => ask(url, model, prompt).await,
    };
    std::process::exit(code);
}

async fn serve(config_path: String, port: Option<u16>) -> i32 {
    let source = config::FileSource::new(config_path);
    let config = match config::load_config(&source) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            return 1;
        }
    };

    tracing::info!(
        origin = %source.origin(),
        environment = %config.environment,
        backend = ?config.backend.kind,
        model = %config.backend.model,
        content_type = config.stream.content_type.header_value(),
        usage = config.usage.enabled,
        config_hash = %config.config_hash,
        "config loaded"
    );

    let addr = relay::bind_addr(port.unwrap_or(config.server.port));
    let app = relay::build_router(relay::AppState::from_config(&config));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, "failed to bind to address: {e}");
            return 1;
        }
    };

    tracing::info!(%addr, "genrelay listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(relay::shutdown_signal(tokio::signal::ctrl_c()))
        .await
    {
        tracing::error!("server error: {e}");
        return 1;
    }
    0
}

/// Prints chunks to stdout as they arrive.
struct StdoutPrinter;

impl StreamCallbacks for StdoutPrinter {
    fn on_chunk(&mut self, delta: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(delta.as_bytes());
        let _ = out.flush();
    }

    fn on_complete(&mut self, _full_text: &str) {
        println!();
    }

    fn on_error(&mut self, error: &StreamError) {
        println!();
        eprintln!("error: {error}");
    }
}

async fn ask(url: String, model: Option<String>, prompt: String) -> i32 {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let client = RelayClient::new(url);
    let request = GenerateRequest { prompt, model };
    match client
        .stream_request(&request, &mut StdoutPrinter, &cancel)
        .await
    {
        Ok(_) => 0,
        Err(StreamError::Cancelled) => 130,
        Err(_) => 1,
    }
}
