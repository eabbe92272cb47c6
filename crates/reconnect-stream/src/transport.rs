//! TCP transport layer for reconnect sessions
//!
//! Provides a thin wrapper around tokio's TCP types with:
//! - Configurable send/receive buffer sizes
//! - Nagle disabled, since lessons and responses are small and latency bound
//! - Accepted and dialed sockets handed out as [`Connection`]s

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpSocket};

use crate::connection::{Connection, StreamConfig};
use crate::error::Result;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Address to bind to
    pub bind: SocketAddr,
    /// Send buffer size in bytes
    pub sndbuf: usize,
    /// Receive buffer size in bytes
    pub rcvbuf: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 9000)),
            sndbuf: 4 * 1024 * 1024, // 4MB
            rcvbuf: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// Listening side of a reconnect transport.
pub struct ReconnectListener {
    listener: TcpListener,
    stream_config: StreamConfig,
}

impl ReconnectListener {
    /// Bind to the configured address with configured buffer sizes
    pub fn bind(cfg: &TransportConfig, stream_config: StreamConfig) -> Result<Self> {
        let domain = if cfg.bind.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

        // Accepted sockets inherit these
        socket.set_send_buffer_size(cfg.sndbuf)?;
        socket.set_recv_buffer_size(cfg.rcvbuf)?;
        socket.set_reuse_address(true)?;

        socket.bind(&cfg.bind.into())?;
        socket.listen(128)?;
        socket.set_nonblocking(true)?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = TcpListener::from_std(std_listener)?;

        tracing::info!(
            "reconnect listener bound to {} (sndbuf={}, rcvbuf={})",
            cfg.bind,
            cfg.sndbuf,
            cfg.rcvbuf
        );

        Ok(Self {
            listener,
            stream_config,
        })
    }

    /// Wait for the next peer.
    pub async fn accept(&self) -> Result<(Connection, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        tracing::debug!("accepted reconnect peer {}", peer);
        Ok((
            Connection::from_tcp(stream, self.stream_config.clone()),
            peer,
        ))
    }

    /// Get the local address this listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Dial a listening peer.
pub async fn connect(
    addr: SocketAddr,
    cfg: &TransportConfig,
    stream_config: StreamConfig,
) -> Result<Connection> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_send_buffer_size(cfg.sndbuf as u32)?;
    socket.set_recv_buffer_size(cfg.rcvbuf as u32)?;

    let stream = socket.connect(addr).await?;
    stream.set_nodelay(true)?;
    tracing::debug!("connected to reconnect peer {}", addr);
    Ok(Connection::from_tcp(stream, stream_config))
}
