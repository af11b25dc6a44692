// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use session_client::{config, manager, store};

use clap::Parser;
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "session-client")]
#[command(about = "Realtime session client", version)]
struct Args {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Session token to seed the credential store with
    #[arg(short, long, env = "SESSION_TOKEN")]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = config::Config::load(args.config)?;

    tracing::info!("Starting session client");
    tracing::info!("Server: {}", config.server.url);

    let credentials = store::CredentialStore::from_config(&config.session);
    if let Some(token) = args.token {
        let username = session_core::credential::decode_username(&token);
        credentials.set(&token, username.as_deref());
    }
    if let Some(user_id) = credentials.current_identity() {
        tracing::info!("Resuming session for user {}", user_id);
    }

    let manager = if config.auth.handshake {
        manager::ConnectionManager::with_credentials(
            config.reconnect.clone(),
            credentials.clone(),
        )
    } else {
        manager::ConnectionManager::new(config.reconnect.clone())
    };

    manager.on_message(|frame| match frame {
        manager::InboundFrame::Text(text) => tracing::info!("<< {}", text),
        manager::InboundFrame::Binary(data) => {
            tracing::info!("<< binary frame ({} bytes)", data.len())
        }
    });

    let mut states = manager.state_changes();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            tracing::info!("link state: {:?}", *states.borrow());
        }
    });

    manager.connect(&config.server.url).await?;

    // stdin lines become outbound frames until EOF or Ctrl-C
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if !manager.send(line) {
                        tracing::warn!("link not open, message dropped");
                    }
                }
                Ok(None) | Err(_) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Shutting down");
    manager.close();
    Ok(())
}
