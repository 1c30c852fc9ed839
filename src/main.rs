//! message-relay: an HTTP message board next to a UDP echo relay
//!
//! Two servers run side by side in one process:
//! - HTTP: pages, static files, and a message form whose submissions are
//!   written to a document store
//! - UDP: echoes every datagram back to its sender
//!
//! Features:
//! - Independent server tasks; one failing does not stop the other
//! - Graceful shutdown on Ctrl-C / SIGTERM
//! - `--send <TEXT>` client mode for talking to a running relay
//! - Configuration via CLI arguments or TOML file

mod config;
mod form;
mod protocols;
mod server;
mod shutdown;
mod static_files;
mod storage;

use config::Config;
use protocols::echo::{self, EchoRelay};
use protocols::http::HttpServer;
use server::Supervisor;
use static_files::{StaticFiles, Templates};
use std::sync::Arc;
use std::time::Duration;
use storage::{MemoryStore, MessageStore, MongoStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Store URI scheme that keeps messages in process instead.
const MEMORY_STORE_URI: &str = "memory://";

/// How long the `--send` client waits for each echo.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match config.send.clone() {
        Some(text) => runtime.block_on(run_client(config, text)),
        None => runtime.block_on(run_servers(config)),
    }
}

/// Run both servers until a termination signal arrives.
async fn run_servers(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        http = %config.http_listen,
        udp = %config.udp_listen,
        root = %config.root.display(),
        store = %config.store_uri,
        collection = %config.store_collection,
        "Starting message-relay"
    );

    if config.store_uri == MEMORY_STORE_URI {
        info!("Using in-memory message store");
        supervise(&config, Arc::new(MemoryStore::new())).await
    } else {
        let store = MongoStore::new(
            &config.store_uri,
            &config.store_database,
            &config.store_collection,
            config.store_timeout,
        );
        supervise(&config, Arc::new(store)).await
    }
}

async fn supervise<S: MessageStore>(
    config: &Config,
    store: Arc<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = StaticFiles::new(&config.root, Templates::load(config.templates.as_deref()));

    let mut supervisor = Supervisor::new();
    supervisor.spawn(HttpServer::new(&config.http_listen, files, store));
    supervisor.spawn(EchoRelay::new(&config.udp_listen));

    supervisor.wait(shutdown::termination_signal()).await?;
    info!("All servers stopped");
    Ok(())
}

/// Relay `text` word by word through the UDP server and exit.
async fn run_client(config: Config, text: String) -> Result<(), Box<dyn std::error::Error>> {
    let replies = echo::send_words(&config.udp_listen, &text, CLIENT_TIMEOUT).await?;
    info!(replies = replies.len(), server = %config.udp_listen, "Relay finished");
    Ok(())
}
