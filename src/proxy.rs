//! DNS proxy orchestration.
//!
//! Binds the transport, wires it to the resolver and runs until shutdown.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::ConfigError;
use crate::filter::Blocklist;
use crate::resolver::{FailurePolicy, Resolver};
use crate::transport::ServeMode;
use crate::transport::udp::{DEFAULT_MAX_IN_FLIGHT, UdpTransport};
use crate::upstream::UpstreamRelay;

/// Default bound on the wait for an upstream reply.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Default period between stats log lines.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the DNS proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Local address to bind (e.g., 127.0.0.1:53)
    pub bind_addr: SocketAddr,
    /// Upstream resolver address
    pub upstream_addr: SocketAddr,
    /// Blocklist blob, matched by raw containment
    pub blocklist: String,
    /// Canned response for restricted queries
    pub refusal: String,
    pub mode: ServeMode,
    /// Cap on queries handled at once in concurrent mode
    pub max_in_flight: usize,
    /// `None` waits for upstream indefinitely
    pub upstream_timeout: Option<Duration>,
    pub on_failure: FailurePolicy,
    /// `None` disables the periodic stats line
    pub stats_interval: Option<Duration>,
}

impl ProxyConfig {
    /// Resolve a loaded config file into proxy settings, with defaults for
    /// everything the file does not carry.
    pub fn from_config(config: &Config, listen_port: u16) -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: config.listen_addr(listen_port)?,
            upstream_addr: config.upstream_addr()?,
            blocklist: config.blocklist.clone(),
            refusal: config.refusal.clone(),
            mode: ServeMode::default(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            upstream_timeout: Some(DEFAULT_UPSTREAM_TIMEOUT),
            on_failure: FailurePolicy::default(),
            stats_interval: Some(DEFAULT_STATS_INTERVAL),
        })
    }
}

/// A bound, not yet running, DNS proxy.
pub struct Proxy {
    transport: UdpTransport,
    resolver: Arc<Resolver>,
    mode: ServeMode,
    stats_interval: Option<Duration>,
}

impl Proxy {
    /// Bind the listening socket. Fails if the address cannot be bound.
    pub async fn bind(config: ProxyConfig) -> io::Result<Self> {
        let relay = UpstreamRelay::new(config.upstream_addr, config.upstream_timeout);
        let resolver = Resolver::new(
            Blocklist::new(config.blocklist),
            config.refusal,
            relay,
            config.on_failure,
        );
        let transport = UdpTransport::bind(config.bind_addr)
            .await?
            .with_max_in_flight(config.max_in_flight);

        Ok(Self {
            transport,
            resolver: Arc::new(resolver),
            mode: config.mode,
            stats_interval: config.stats_interval,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Serve queries until `shutdown` completes.
    ///
    /// Returns once the transport has stopped and every in-flight query has
    /// been cancelled, so the listen address is free again.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> io::Result<()> {
        let relay = self.resolver.relay();
        info!(
            listen = %self.local_addr()?,
            upstream = %relay.addr(),
            timeout = ?relay.timeout(),
            blocklist_bytes = self.resolver.blocklist_len(),
            refusal = %String::from_utf8_lossy(self.resolver.refusal()),
            mode = ?self.mode,
            "DNS proxy listening"
        );

        let stats_task = self
            .stats_interval
            .map(|period| tokio::spawn(report_stats(self.resolver.clone(), period)));

        let shutdown = async {
            shutdown.await;
            info!("shutting down");
        };
        self.transport.serve(self.resolver, self.mode, shutdown).await;

        if let Some(task) = stats_task {
            task.abort();
        }

        Ok(())
    }
}

/// Run the DNS proxy with the given configuration until `shutdown` completes.
pub async fn run(config: ProxyConfig, shutdown: impl Future<Output = ()>) -> io::Result<()> {
    Proxy::bind(config).await?.run_until(shutdown).await
}

async fn report_stats(resolver: Arc<Resolver>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // Skip first immediate tick
    loop {
        interval.tick().await;
        let stats = resolver.stats().snapshot_and_reset();
        if stats.failed > 0 {
            warn!(failed = stats.failed, "upstream relay failures in last period");
        }
        info!(
            uptime_secs = stats.uptime_secs,
            requests = stats.requests,
            forwarded = stats.forwarded,
            restricted = stats.restricted,
            failed = stats.failed,
            avg_response_ms = %format!("{:.2}", stats.avg_response_ms),
            "stats"
        );
    }
}
