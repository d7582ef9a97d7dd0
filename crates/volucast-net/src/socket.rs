use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{trace, warn};

use volucast_protocol::types::MAX_PACKET_SIZE;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// One received datagram.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub bytes: Bytes,
    pub addr: SocketAddr,
}

/// Non-blocking UDP wrapper shared by one receive task and one send task.
///
/// Receiving never suspends: `drain` returns whatever datagrams the
/// kernel has queued and comes back empty-handed otherwise, so the net
/// loops can tick at a fixed period.
#[derive(Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind with enlarged kernel buffers to absorb video packet bursts.
    pub fn bind(addr: SocketAddr, buffer_size: usize) -> Result<Self, NetError> {
        let domain = if addr.is_ipv4() {
            socket2::Domain::IPV4
        } else {
            socket2::Domain::IPV6
        };
        let socket = socket2::Socket::new(
            domain,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;
        let _ = socket.set_recv_buffer_size(buffer_size);
        let _ = socket.set_send_buffer_size(buffer_size);
        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;

        let socket: std::net::UdpSocket = socket.into();
        Ok(Self {
            socket: Arc::new(UdpSocket::from_std(socket)?),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.socket.local_addr()?)
    }

    /// Drain every datagram currently queued, up to `max` of them.
    ///
    /// Oversized datagrams are truncated by the kernel and then dropped
    /// by packet parsing; zero-length datagrams are skipped outright.
    pub fn drain(&self, max: usize) -> Vec<Datagram> {
        let mut datagrams = Vec::new();
        let mut buf = [0u8; MAX_PACKET_SIZE];
        while datagrams.len() < max {
            match self.socket.try_recv_from(&mut buf) {
                Ok((0, addr)) => {
                    trace!(%addr, "zero-length datagram skipped");
                }
                Ok((len, addr)) => {
                    datagrams.push(Datagram {
                        bytes: Bytes::copy_from_slice(&buf[..len]),
                        addr,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("transient receive error: {e}");
                    break;
                }
            }
        }
        datagrams
    }

    /// Send one datagram; transient failures are logged and swallowed so
    /// the calling loop keeps running.
    pub async fn send_to(&self, bytes: &[u8], addr: SocketAddr) {
        debug_assert!(bytes.len() <= MAX_PACKET_SIZE);
        if let Err(e) = self.socket.send_to(bytes, addr).await {
            warn!(%addr, "transient send error: {e}");
        }
    }
}
