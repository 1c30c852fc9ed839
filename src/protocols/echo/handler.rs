//! Echo relay server and client on tokio UDP sockets.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, info, warn};

use crate::server::{ServerError, Service};
use crate::shutdown::Shutdown;

/// Largest payload read (and echoed) per datagram.
pub const MAX_DATAGRAM: usize = 1024;

/// First pause after a failed receive
const RECV_BACKOFF_MIN: Duration = Duration::from_millis(10);

/// Longest pause between failed receives
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause between consecutive receive errors, doubling up to a cap.
struct RecvBackoff {
    delay: Duration,
}

impl RecvBackoff {
    fn new() -> Self {
        Self {
            delay: RECV_BACKOFF_MIN,
        }
    }

    /// Delay to wait after this failure.
    fn failed(&mut self) -> Duration {
        let delay = self.delay;
        self.delay = (self.delay * 2).min(RECV_BACKOFF_MAX);
        delay
    }

    fn reset(&mut self) {
        self.delay = RECV_BACKOFF_MIN;
    }
}

/// Unbound relay configuration.
pub struct EchoRelay {
    listen: String,
}

impl EchoRelay {
    pub fn new(listen: &str) -> Self {
        Self {
            listen: listen.to_string(),
        }
    }

    /// Bind the relay socket.
    pub async fn bind(self) -> Result<BoundRelay, ServerError> {
        let socket = UdpSocket::bind(&self.listen)
            .await
            .map_err(|e| ServerError::Bind(self.listen.clone(), e))?;
        info!(address = %self.listen, "UDP echo relay listening");
        Ok(BoundRelay { socket })
    }
}

impl Service for EchoRelay {
    fn name(&self) -> &'static str {
        "udp-echo"
    }

    async fn run(self, shutdown: Shutdown) -> Result<(), ServerError> {
        self.bind().await?.serve(shutdown).await
    }
}

/// A relay with its socket bound.
pub struct BoundRelay {
    socket: UdpSocket,
}

impl BoundRelay {
    #[cfg(test)]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive and echo datagrams until cancelled.
    ///
    /// The socket is dropped when this returns, on every path.
    pub async fn serve(self, mut shutdown: Shutdown) -> Result<(), ServerError> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let mut backoff = RecvBackoff::new();

        while !shutdown.is_cancelled() {
            let (len, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(received) => {
                        backoff.reset();
                        received
                    }
                    Err(e) => {
                        // e.g. ICMP port unreachable from an earlier reply
                        let delay = backoff.failed();
                        warn!(error = %e, retry_ms = delay.as_millis() as u64, "Receive failed");
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(delay) => continue,
                        }
                    }
                },
            };

            let payload = &buf[..len];
            info!(
                peer = %peer,
                bytes = len,
                data = %String::from_utf8_lossy(payload),
                "Received datagram"
            );

            match self.socket.send_to(payload, peer).await {
                Ok(sent) => debug!(peer = %peer, bytes = sent, "Echoed datagram"),
                Err(e) => warn!(peer = %peer, error = %e, "Echo failed"),
            }
        }

        info!("UDP echo relay stopped");
        Ok(())
    }
}

/// Send each whitespace-separated word of `text` to the relay at `server`
/// as its own datagram, waiting for each reply before sending the next.
pub async fn send_words(server: &str, text: &str, timeout: Duration) -> io::Result<Vec<Vec<u8>>> {
    let server_addr = lookup_host(server).await?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("cannot resolve '{}'", server))
    })?;

    let local = if server_addr.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(local).await?;

    let mut replies = Vec::new();
    let mut buf = [0u8; MAX_DATAGRAM];
    for word in text.split_whitespace() {
        socket.send_to(word.as_bytes(), server_addr).await?;
        info!(data = word, server = %server_addr, "Sent datagram");

        let (len, from) = tokio::time::timeout(timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no reply from relay"))??;
        info!(
            data = %String::from_utf8_lossy(&buf[..len]),
            from = %from,
            "Received reply"
        );
        replies.push(buf[..len].to_vec());
    }

    Ok(replies)
}
