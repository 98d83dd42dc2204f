//! UDP transport for DNS queries.
//!
//! Every received datagram is one query and gets at most one reply, sent to
//! the address it came from. No state is kept between queries: each one is
//! filtered and relayed on its own, with its own upstream socket.

use std::future::{self, Future};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::resolver::{Resolution, Resolver};

use super::{MAX_DNS_PACKET_SIZE, QueryLogger, ServeMode};

/// Default cap on queries handled at once in [`ServeMode::Concurrent`].
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1024;

/// UDP transport for DNS proxy.
///
/// Binds to a local address and answers queries through a [`Resolver`].
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    max_in_flight: usize,
}

impl UdpTransport {
    /// Bind the listening socket for the transport.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);

        Ok(Self {
            socket,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        })
    }

    /// Cap the number of queries in flight in concurrent mode.
    ///
    /// Once the cap is reached the loop stops receiving until a query
    /// finishes; further datagrams wait in the socket buffer.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Address the transport is listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the UDP transport.
    ///
    /// Spawns the receive loop. It runs until the returned handle is aborted.
    pub fn start(self, resolver: Arc<Resolver>, mode: ServeMode) -> JoinHandle<()> {
        tokio::spawn(self.serve(resolver, mode, future::pending()))
    }

    /// Serve queries until `shutdown` completes.
    ///
    /// In-flight queries are cancelled before this returns, so the listening
    /// socket and every upstream socket are closed by then.
    pub async fn serve(
        self,
        resolver: Arc<Resolver>,
        mode: ServeMode,
        shutdown: impl Future<Output = ()>,
    ) {
        run(self.socket, resolver, mode, self.max_in_flight, shutdown).await
    }
}

/// Main receive loop for UDP transport.
///
/// Receive errors are logged and skipped; nothing a single query does can
/// end the loop. On Linux an unconnected UDP socket does not surface ICMP
/// errors, so the receive error path is not reachable from loopback tests.
async fn run(
    socket: Arc<UdpSocket>,
    resolver: Arc<Resolver>,
    mode: ServeMode,
    max_in_flight: usize,
    shutdown: impl Future<Output = ()>,
) {
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];
    let mut tasks = JoinSet::new();
    let permits = Arc::new(Semaphore::new(max_in_flight));
    tokio::pin!(shutdown);

    loop {
        let (len, src) = tokio::select! {
            _ = &mut shutdown => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok(r) => r,
                Err(e) => {
                    warn!("UDP recv error: {}", e);
                    continue;
                }
            },
        };

        // Reap finished queries so the set only holds live ones.
        while tasks.try_join_next().is_some() {}

        let query = &buf[..len];

        match mode {
            ServeMode::Sequential => tokio::select! {
                _ = &mut shutdown => break,
                _ = respond(&socket, &resolver, query, src) => {}
            },
            ServeMode::Concurrent => {
                let permit = tokio::select! {
                    _ = &mut shutdown => break,
                    permit = permits.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                let socket = socket.clone();
                let resolver = resolver.clone();
                let query = query.to_vec();
                tasks.spawn(async move {
                    respond(&socket, &resolver, &query, src).await;
                    drop(permit);
                });
            }
        }
    }

    debug!(in_flight = tasks.len(), "UDP transport stopping");
    tasks.shutdown().await;
}

/// Resolve one query and send the reply, if there is one, back to `client`.
///
/// A failed send is logged and dropped. The loop keeps going either way.
/// Sending to a peer address taken from `recv_from` does not fail on
/// loopback, even when the client socket is already gone.
async fn respond(socket: &UdpSocket, resolver: &Resolver, query: &[u8], client: SocketAddr) {
    let log = QueryLogger::start(client, query.len());

    let resolution = resolver.resolve(query).await;

    match &resolution {
        Resolution::Restricted(_) => log.restricted(),
        Resolution::Forwarded(relayed) => log.forwarded(relayed),
        Resolution::Failed { error, fallback } => log.failed(error, fallback.is_some()),
    }

    let Some(reply) = resolution.reply() else {
        return;
    };

    if let Err(e) = socket.send_to(reply, client).await {
        warn!(%client, "UDP response error: {}", e);
    }
}
