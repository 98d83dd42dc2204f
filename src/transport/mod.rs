//! Transport layer for the DNS proxy.
//!
//! Receives queries from clients over UDP, hands them to the resolver and
//! sends the outcome back to the client that asked.

pub mod udp;

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

use std::net::SocketAddr;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::RelayError;
use crate::upstream::Relayed;

/// How the proxy loop schedules queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServeMode {
    /// Answer each query before receiving the next one. A slow upstream
    /// stalls every other client.
    Sequential,
    /// Handle each query in its own task.
    #[default]
    Concurrent,
}

/// Logger for a single query's lifecycle.
pub struct QueryLogger {
    client: SocketAddr,
    len: usize,
    start: Instant,
}

impl QueryLogger {
    pub fn start(client: SocketAddr, len: usize) -> Self {
        Self {
            client,
            len,
            start: Instant::now(),
        }
    }

    pub fn restricted(&self) {
        debug!(
            client = %self.client,
            bytes = self.len,
            total_ms = self.elapsed_ms(),
            "RESTRICTED"
        );
    }

    pub fn forwarded(&self, relayed: &Relayed) {
        debug!(
            client = %self.client,
            bytes = self.len,
            reply_bytes = relayed.response.len(),
            total_ms = self.elapsed_ms(),
            upstream_ms = relayed.elapsed.as_secs_f64() * 1000.0,
            from = %relayed.from,
            "FORWARDED"
        );
    }

    pub fn failed(&self, error: &RelayError, replied: bool) {
        warn!(
            client = %self.client,
            bytes = self.len,
            total_ms = self.elapsed_ms(),
            replied,
            "relay failed: {error}"
        );
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
