//! DNS query resolution logic.
//!
//! Handles the per-query pipeline:
//! 1. Filter (restricted queries get the canned refusal)
//! 2. Relay everything else to the upstream resolver
//! 3. Map relay failures to the configured failure policy
//!
//! Transports handle the actual I/O with clients, the resolver handles
//! decisions and talks to upstream.

use std::time::Instant;

use crate::error::RelayError;
use crate::filter::{Blocklist, filter_query};
use crate::stats::Stats;
use crate::upstream::{Relayed, UpstreamRelay};

/// Action to take for a DNS query.
#[derive(Debug, PartialEq, Eq)]
pub enum QueryAction {
    /// Query is restricted, return this response immediately.
    Restricted { response: Vec<u8> },
    /// Query should be forwarded to upstream.
    Forward,
}

/// What a client receives when relaying its query fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Send nothing back.
    #[default]
    Drop,
    /// Send this payload back.
    Respond(Vec<u8>),
}

/// Outcome of resolving one query.
#[derive(Debug)]
pub enum Resolution {
    Restricted(Vec<u8>),
    Forwarded(Relayed),
    Failed {
        error: RelayError,
        fallback: Option<Vec<u8>>,
    },
}

impl Resolution {
    /// Bytes to send back to the client, if any.
    pub fn reply(&self) -> Option<&[u8]> {
        match self {
            Resolution::Restricted(response) => Some(response),
            Resolution::Forwarded(relayed) => Some(&relayed.response),
            Resolution::Failed { fallback, .. } => fallback.as_deref(),
        }
    }
}

/// Resolver handles DNS query processing decisions.
///
/// Holds everything shared between in-flight queries. None of it is mutated
/// after construction apart from the atomic counters in [`Stats`], so one
/// resolver can be shared across tasks without locking.
pub struct Resolver {
    blocklist: Blocklist,
    refusal: Vec<u8>,
    relay: UpstreamRelay,
    on_failure: FailurePolicy,
    stats: Stats,
}

impl Resolver {
    pub fn new(
        blocklist: Blocklist,
        refusal: impl Into<Vec<u8>>,
        relay: UpstreamRelay,
        on_failure: FailurePolicy,
    ) -> Self {
        Self {
            blocklist,
            refusal: refusal.into(),
            relay,
            on_failure,
            stats: Stats::new(),
        }
    }

    /// Decide what to do with a raw query without touching the network.
    pub fn process_query(&self, query: &[u8]) -> QueryAction {
        match filter_query(&self.blocklist, &self.refusal, query) {
            Some(response) => QueryAction::Restricted { response },
            None => QueryAction::Forward,
        }
    }

    /// Resolve a raw query: refuse it, or relay it and return upstream's reply.
    ///
    /// Relay failures are returned as [`Resolution::Failed`]; they never
    /// propagate further than the query that caused them.
    pub async fn resolve(&self, query: &[u8]) -> Resolution {
        let start = Instant::now();

        match self.process_query(query) {
            QueryAction::Restricted { response } => {
                self.stats.record_restricted(elapsed_ms(start));
                Resolution::Restricted(response)
            }
            QueryAction::Forward => match self.relay.relay(query).await {
                Ok(relayed) => {
                    self.stats.record_forwarded(elapsed_ms(start));
                    Resolution::Forwarded(relayed)
                }
                Err(error) => {
                    self.stats.record_failed(elapsed_ms(start));
                    let fallback = match &self.on_failure {
                        FailurePolicy::Drop => None,
                        FailurePolicy::Respond(payload) => Some(payload.clone()),
                    };
                    Resolution::Failed { error, fallback }
                }
            },
        }
    }

    pub fn relay(&self) -> &UpstreamRelay {
        &self.relay
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Payload sent back for restricted queries.
    pub fn refusal(&self) -> &[u8] {
        &self.refusal
    }

    /// Returns the size of the blocklist blob in bytes.
    pub fn blocklist_len(&self) -> usize {
        self.blocklist.len()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::net::UdpSocket;

    use super::*;

    fn resolver_for(upstream: SocketAddr, on_failure: FailurePolicy) -> Resolver {
        Resolver::new(
            Blocklist::new("blockedsite"),
            "BLOCKED",
            UpstreamRelay::new(upstream, Some(Duration::from_millis(100))),
            on_failure,
        )
    }

    #[test]
    fn process_query_restricts_listed_query() {
        let resolver = resolver_for("127.0.0.1:53".parse().unwrap(), FailurePolicy::Drop);

        let action = resolver.process_query(b"blockedsite");

        assert_eq!(action, QueryAction::Restricted { response: b"BLOCKED".to_vec() });
    }

    #[test]
    fn process_query_forwards_unlisted_query() {
        let resolver = resolver_for("127.0.0.1:53".parse().unwrap(), FailurePolicy::Drop);

        assert_eq!(resolver.process_query(b"example"), QueryAction::Forward);
    }

    #[tokio::test]
    async fn resolve_restricted_skips_upstream() {
        // Upstream never replies, so a relay attempt would time out.
        let upstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let resolver = resolver_for(upstream.local_addr().unwrap(), FailurePolicy::Drop);

        let resolution = resolver.resolve(b"blocked").await;

        assert!(matches!(resolution, Resolution::Restricted(_)));
        assert_eq!(resolution.reply(), Some(&b"BLOCKED"[..]));
        assert_eq!(resolver.stats().snapshot_and_reset().restricted, 1);
    }

    #[tokio::test]
    async fn resolve_failure_drops_by_default() {
        let upstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let resolver = resolver_for(upstream.local_addr().unwrap(), FailurePolicy::Drop);

        let resolution = resolver.resolve(b"example").await;

        assert!(matches!(
            resolution,
            Resolution::Failed { error: RelayError::Timeout(_), fallback: None }
        ));
        assert_eq!(resolution.reply(), None);
        assert_eq!(resolver.stats().snapshot_and_reset().failed, 1);
    }

    #[tokio::test]
    async fn resolve_failure_uses_fallback() {
        let upstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let resolver = resolver_for(
            upstream.local_addr().unwrap(),
            FailurePolicy::Respond(b"UPSTREAM DOWN".to_vec()),
        );

        let resolution = resolver.resolve(b"example").await;

        assert_eq!(resolution.reply(), Some(&b"UPSTREAM DOWN"[..]));
    }
}
