//! Upstream relay.
//!
//! Each relayed query gets its own UDP socket on an ephemeral port. The
//! query is sent once to the upstream resolver and the first datagram that
//! comes back is taken as the reply. The socket is dropped when the call
//! returns, on success and on every error path.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::warn;

use crate::error::RelayError;
use crate::transport::MAX_DNS_PACKET_SIZE;

/// A reply received from upstream.
#[derive(Debug, Clone)]
pub struct Relayed {
    /// Reply bytes, unaltered, bounded to [`MAX_DNS_PACKET_SIZE`].
    pub response: Vec<u8>,
    /// Sender of the reply.
    pub from: SocketAddr,
    /// Time spent waiting on upstream.
    pub elapsed: Duration,
}

/// Relays single queries to one upstream resolver.
#[derive(Debug, Clone)]
pub struct UpstreamRelay {
    addr: SocketAddr,
    timeout: Option<Duration>,
}

impl UpstreamRelay {
    /// Create a relay for `addr`.
    ///
    /// With `timeout` set to `None` the receive blocks until a datagram
    /// arrives, however long that takes.
    pub fn new(addr: SocketAddr, timeout: Option<Duration>) -> Self {
        Self { addr, timeout }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Send `query` upstream and wait for exactly one reply.
    ///
    /// The reply is accepted from any sender; a reply from an address other
    /// than the upstream is logged but still returned.
    pub async fn relay(&self, query: &[u8]) -> Result<Relayed, RelayError> {
        let socket = UdpSocket::bind(self.local_bind_addr())
            .await
            .map_err(RelayError::Bind)?;

        let start = Instant::now();
        socket
            .send_to(query, self.addr)
            .await
            .map_err(RelayError::Send)?;

        let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];
        let received = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, socket.recv_from(&mut buf))
                .await
                .map_err(|_| RelayError::Timeout(limit))?,
            None => socket.recv_from(&mut buf).await,
        };
        let (len, from) = received.map_err(RelayError::Receive)?;

        if from != self.addr {
            warn!(upstream = %self.addr, %from, "reply came from unexpected sender");
        }

        buf.truncate(len);

        Ok(Relayed {
            response: buf,
            from,
            elapsed: start.elapsed(),
        })
    }

    /// Wildcard address of the upstream's family, ephemeral port.
    fn local_bind_addr(&self) -> SocketAddr {
        match self.addr {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        }
    }
}
