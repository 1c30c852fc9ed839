//! Server lifecycle: the `Service` abstraction and the supervisor that runs
//! the HTTP and UDP servers side by side.
//!
//! Each service runs on its own task and owns its socket. Services share
//! nothing but the shutdown signal, so one failing (or panicking) leaves the
//! other running until it is cancelled.

use crate::shutdown::{self, Shutdown, ShutdownTrigger};
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{error, info};

/// A long-running network server.
pub trait Service: Send + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Bind and serve until `shutdown` fires.
    ///
    /// Returns `Ok(())` after a requested cancellation. The socket is
    /// released before the future completes.
    fn run(self, shutdown: Shutdown) -> impl Future<Output = Result<(), ServerError>> + Send;
}

/// Runs services concurrently and waits for all of them.
pub struct Supervisor {
    trigger: ShutdownTrigger,
    shutdown: Shutdown,
    tasks: JoinSet<(&'static str, Result<(), ServerError>)>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        let (trigger, shutdown) = shutdown::channel();
        Self {
            trigger,
            shutdown,
            tasks: JoinSet::new(),
        }
    }

    /// Start a service on its own task.
    pub fn spawn<S: Service>(&mut self, service: S) {
        let name = service.name();
        let handle = tokio::spawn(service.run(self.shutdown.clone()));
        info!(service = name, "Server started");

        self.tasks.spawn(async move {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ServerError::Panicked(name, e.to_string())),
            };
            (name, result)
        });
    }

    /// Wait for every service to finish.
    ///
    /// When `signal` resolves, cancellation is propagated to all services.
    /// Returns the first failure, if any, once all services are done.
    pub async fn wait<F>(mut self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(signal);
        let mut signalled = false;
        let mut first_error = None;

        loop {
            tokio::select! {
                _ = &mut signal, if !signalled => {
                    signalled = true;
                    info!("Termination signal received, stopping servers");
                    self.trigger.trigger();
                }
                joined = self.tasks.join_next() => {
                    let Some(joined) = joined else {
                        break;
                    };
                    match joined {
                        Ok((name, Ok(()))) => info!(service = name, "Server stopped"),
                        Ok((name, Err(e))) => {
                            error!(service = name, error = %e, "Server failed");
                            first_error.get_or_insert(e);
                        }
                        Err(e) => {
                            error!(error = %e, "Supervisor task failed");
                            first_error.get_or_insert(ServerError::Panicked("supervisor", e.to_string()));
                        }
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Server lifecycle errors
#[derive(Debug)]
pub enum ServerError {
    /// The listening socket could not be bound at startup.
    Bind(String, std::io::Error),
    /// The service task panicked.
    Panicked(&'static str, String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Bind(addr, e) => write!(f, "Failed to bind '{}': {}", addr, e),
            ServerError::Panicked(name, msg) => write!(f, "{} server panicked: {}", name, msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind(_, e) => Some(e),
            ServerError::Panicked(..) => None,
        }
    }
}
