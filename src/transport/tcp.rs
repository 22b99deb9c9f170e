//! TCP connection manager
//!
//! One task per accepted socket. A connection carries exactly one exchange:
//! read the first complete frame, answer it (or not), shut the stream down.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

use crate::core::codec::FrameCodec;
use crate::error::{ProtocolError, Result};
use crate::protocol::handshake::PacketKind;
use crate::protocol::login::LoginService;
use crate::store::AccountStore;
use crate::utils::timeout::{with_timeout_error, WRITE_TIMEOUT};
use crate::utils::AddressKey;

const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Where a connection is in its single exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingFrame,
    ParsingHeader,
    StatusQuery,
    LoginRequest,
    Responding,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::AwaitingFrame => "awaiting_frame",
            ConnectionState::ParsingHeader => "parsing_header",
            ConnectionState::StatusQuery => "status_query",
            ConnectionState::LoginRequest => "login_request",
            ConnectionState::Responding => "responding",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

impl From<PacketKind> for ConnectionState {
    fn from(kind: PacketKind) -> Self {
        match kind {
            PacketKind::Status => ConnectionState::StatusQuery,
            PacketKind::Login => ConnectionState::LoginRequest,
        }
    }
}

/// Bind the configured listen address
pub async fn bind<A: ToSocketAddrs>(address: A) -> Result<TcpListener> {
    let listener = TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "Login server listening");
    Ok(listener)
}

/// Serve until Ctrl-C
pub async fn start_server<S: AccountStore>(
    listener: TcpListener,
    service: Arc<LoginService<S>>,
) -> Result<()> {
    serve_until_signal(listener, service, tokio::signal::ctrl_c()).await
}

/// Serve until `signal` completes with `Ok`.
///
/// A signal source that fails is logged and the server keeps running.
pub async fn serve_until_signal<S, F>(
    listener: TcpListener,
    service: Arc<LoginService<S>>,
    signal: F,
) -> Result<()>
where
    S: AccountStore,
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                info!("Received shutdown signal, shutting down");
                let _ = shutdown_tx_clone.send(()).await;
            }
            Err(e) => error!(error = %e, "Unable to listen for shutdown signal"),
        }
    });

    let result = start_server_with_shutdown(listener, service, shutdown_rx).await;
    drop(shutdown_tx);
    result
}

/// Serve until a message (or sender drop) on `shutdown_rx`.
#[instrument(skip_all)]
pub async fn start_server_with_shutdown<S: AccountStore>(
    listener: TcpListener,
    service: Arc<LoginService<S>>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let max_connections = service.config().server.max_connections;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down server. Waiting for connections to close...");
                drain(&service).await;
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        let Some(peer) = admit(&service, addr, max_connections) else {
                            service.metrics().connection_rejected();
                            continue;
                        };

                        service.metrics().connection_established();
                        let service = service.clone();
                        tokio::spawn(async move {
                            match handle_connection(stream, peer, &service).await {
                                Ok(()) => {}
                                Err(ProtocolError::ConnectionClosed) => {
                                    debug!(peer = %addr, "Peer closed before sending a frame");
                                }
                                Err(e) => {
                                    service.metrics().protocol_error();
                                    warn!(peer = %addr, error = %e, "Connection dropped");
                                }
                            }
                            service.metrics().connection_closed();
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

/// Connection-level checks at accept time.
fn admit<S: AccountStore>(
    service: &LoginService<S>,
    addr: SocketAddr,
    max_connections: usize,
) -> Option<AddressKey> {
    let active = service.metrics().connections_active.load(Ordering::Relaxed);
    if active >= max_connections as u64 {
        warn!(peer = %addr, active, "Connection cap reached, dropping socket");
        return None;
    }

    let peer = match AddressKey::try_from(addr.ip()) {
        Ok(peer) => peer,
        Err(e) => {
            debug!(peer = %addr, error = %e, "Unusable peer address, dropping socket");
            return None;
        }
    };

    if !service.limiter().admit(peer) {
        debug!(peer = %addr, "Connection rate limit exceeded, dropping socket");
        return None;
    }

    Some(peer)
}

async fn drain<S: AccountStore>(service: &LoginService<S>) {
    let timeout = tokio::time::sleep(service.config().server.shutdown_timeout);
    tokio::pin!(timeout);

    loop {
        let connections = service.metrics().connections_active.load(Ordering::Relaxed);
        if connections == 0 {
            info!("All connections closed, shutting down");
            break;
        }

        tokio::select! {
            _ = &mut timeout => {
                warn!(connections, "Shutdown timeout reached, forcing exit");
                break;
            }
            _ = tokio::time::sleep(DRAIN_POLL) => {
                debug!(connections, "Waiting for connections to close");
            }
        }
    }

    service.metrics().log_metrics();
    let stats = service.limiter().stats();
    info!(
        tracked_connections = stats.tracked_connections,
        tracked_authorizations = stats.tracked_authorizations,
        "Rate limiter tables"
    );
}

/// Serve the single exchange of one connection.
#[instrument(level = "debug", skip_all, fields(peer = %peer))]
pub async fn handle_connection<S: AccountStore>(
    stream: TcpStream,
    peer: AddressKey,
    service: &LoginService<S>,
) -> Result<()> {
    let idle_timeout = service.config().server.idle_timeout;
    let mut framed = Framed::new(stream, FrameCodec::new());

    let mut state = ConnectionState::AwaitingFrame;
    debug!(%state);

    let frame = with_timeout_error(async { framed.next().await.transpose() }, idle_timeout)
        .await
        .map_err(|e| match e {
            ProtocolError::Timeout => ProtocolError::ConnectionTimeout,
            other => other,
        })?
        .ok_or(ProtocolError::ConnectionClosed)?;
    service.metrics().frame_received();

    state = ConnectionState::ParsingHeader;
    debug!(%state, size = frame.len());

    let reply = service.handle_frame(frame, peer).await?;
    state = ConnectionState::from(reply.kind);
    debug!(%state);

    if let Some(bytes) = reply.frame {
        state = ConnectionState::Responding;
        debug!(%state, size = bytes.len());
        let written = bytes.len() as u64;
        with_timeout_error(framed.send(bytes), WRITE_TIMEOUT).await?;
        service.metrics().bytes_written(written);
    }

    state = ConnectionState::Closed;
    debug!(%state);
    let mut stream = framed.into_inner();
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "Shutdown after reply failed");
    }
    Ok(())
}

/// Open a framed client connection; replies decode to their bodies.
pub async fn connect<A: ToSocketAddrs>(address: A) -> Result<Framed<TcpStream, FrameCodec>> {
    let stream = TcpStream::connect(address).await?;
    Ok(Framed::new(stream, FrameCodec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::AwaitingFrame.to_string(), "awaiting_frame");
        assert_eq!(
            ConnectionState::from(PacketKind::Status),
            ConnectionState::StatusQuery
        );
        assert_eq!(
            ConnectionState::from(PacketKind::Login),
            ConnectionState::LoginRequest
        );
    }
}
