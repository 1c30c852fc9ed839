//! TCP listener for the HTTP message board.
//!
//! Accepts connections, reads one request from each, and writes the
//! handler's response before closing.

use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, trace, warn};

use super::handler;
use super::parser::{ParseResult, Parser};
use super::response::Response;
use crate::server::{ServerError, Service};
use crate::shutdown::Shutdown;
use crate::static_files::StaticFiles;
use crate::storage::MessageStore;

/// Maximum number of concurrent connections
const MAX_CONNECTIONS: usize = 1024;

/// Read buffer size
const BUFFER_SIZE: usize = 8 * 1024;

/// Time a client gets to send its whole request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Time in-flight connections get to finish after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a connection needs to answer a request.
struct Context<S> {
    files: StaticFiles,
    store: Arc<S>,
}

/// Unbound HTTP server configuration.
pub struct HttpServer<S> {
    listen: String,
    context: Context<S>,
}

impl<S: MessageStore> HttpServer<S> {
    pub fn new(listen: &str, files: StaticFiles, store: Arc<S>) -> Self {
        Self {
            listen: listen.to_string(),
            context: Context { files, store },
        }
    }

    /// Bind the listening socket.
    pub async fn bind(self) -> Result<BoundHttpServer<S>, ServerError> {
        let listener = TcpListener::bind(&self.listen)
            .await
            .map_err(|e| ServerError::Bind(self.listen.clone(), e))?;
        info!(address = %self.listen, "HTTP server listening");

        Ok(BoundHttpServer {
            listener,
            context: Arc::new(self.context),
            connection_limit: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        })
    }
}

impl<S: MessageStore> Service for HttpServer<S> {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn run(self, shutdown: Shutdown) -> Result<(), ServerError> {
        self.bind().await?.serve(shutdown).await
    }
}

/// An HTTP server with its listener bound.
pub struct BoundHttpServer<S> {
    listener: TcpListener,
    context: Arc<Context<S>>,
    connection_limit: Arc<Semaphore>,
}

impl<S: MessageStore> BoundHttpServer<S> {
    #[cfg(test)]
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until cancelled, then let in-flight requests
    /// finish (up to `DRAIN_TIMEOUT`).
    pub async fn serve(self, mut shutdown: Shutdown) -> Result<(), ServerError> {
        let BoundHttpServer {
            listener,
            context,
            connection_limit,
        } = self;
        let mut connections = JoinSet::new();

        loop {
            // Wait for a connection slot
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&connection_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!(peer = %addr, "New connection");
                        let context = Arc::clone(&context);

                        connections.spawn(async move {
                            match tokio::time::timeout(REQUEST_TIMEOUT, handle_connection(stream, &context)).await {
                                Ok(Ok(())) => {}
                                Ok(Err(e)) => debug!(peer = %addr, error = %e, "Connection error"),
                                Err(_) => debug!(peer = %addr, "Request timed out"),
                            }
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    reap(joined);
                }
            }
        }

        drop(listener);
        info!(in_flight = connections.len(), "HTTP server stopping");

        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while let Some(joined) = connections.join_next().await {
                reap(joined);
            }
        })
        .await;
        if drained.is_err() {
            warn!(aborted = connections.len(), "Aborting unfinished connections");
            connections.shutdown().await;
        }

        info!("HTTP server stopped");
        Ok(())
    }
}

/// Log a finished connection task that did not end cleanly.
fn reap(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Connection task panicked");
        }
    }
}

/// Handle a single client connection: read one request, answer it, close.
async fn handle_connection<S, T>(
    mut stream: T,
    context: &Context<S>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: MessageStore,
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);

    let response = loop {
        match Parser::parse(&buffer) {
            ParseResult::Complete(request, consumed) => {
                trace!(
                    method = request.method.as_str(),
                    target = %request.target,
                    bytes = consumed,
                    "Processing request"
                );
                let response = handler::handle(&request, &context.files, context.store.as_ref()).await;
                info!(
                    method = request.method.as_str(),
                    target = %request.target,
                    version = %request.version,
                    status = response.status,
                    location = response.header("Location"),
                    "Request served"
                );
                break response;
            }

            ParseResult::NeedData {
                head_bytes,
                body_bytes,
            } => {
                buffer.reserve((head_bytes + body_bytes).saturating_sub(buffer.len()));
                if stream.read_buf(&mut buffer).await? == 0 {
                    trace!("Connection closed mid-body");
                    return Ok(());
                }
            }

            ParseResult::Incomplete => {
                if stream.read_buf(&mut buffer).await? == 0 {
                    trace!("Connection closed by client");
                    return Ok(());
                }
            }

            ParseResult::Error(e) => {
                warn!(error = %e, "Parse error");
                break Response::error_page(e.status(), &e.to_string());
            }
        }
    };

    stream.write_all(&response.encode()).await?;
    stream.shutdown().await?;
    Ok(())
}
