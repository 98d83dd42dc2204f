use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dnsgate::config::{Config, DEFAULT_CONFIG_FILE, DNS_PORT};
use dnsgate::proxy::{self, ProxyConfig};
use dnsgate::resolver::FailurePolicy;
use dnsgate::transport::ServeMode;
use dnsgate::transport::udp::DEFAULT_MAX_IN_FLIGHT;

#[derive(Parser)]
#[command(name = "dnsgate")]
#[command(
    version,
    about = "DNS forwarding proxy with a restricted-query blocklist",
    long_about = None
)]
struct Args {
    /// Config file: listen address, upstream address, blocklist, refusal text
    #[arg(value_name = "CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Local port to listen on
    #[arg(short, long, default_value_t = DNS_PORT)]
    port: u16,

    /// Answer queries one at a time instead of one task per query
    #[arg(long)]
    sequential: bool,

    /// Most queries handled at once when not sequential
    #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Seconds to wait for an upstream reply (0 waits forever)
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    /// Payload sent to the client when the upstream relay fails
    #[arg(long, value_name = "TEXT")]
    failure_response: Option<String>,

    /// Seconds between stats log lines (0 disables)
    #[arg(long, default_value_t = 60)]
    stats_interval: u64,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Parse arguments; any usage error exits with status 1.
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

fn main() -> anyhow::Result<()> {
    let args = parse_args();
    init_logging(&args.log_level);

    let config = Config::load(&args.config)?;
    info!(
        path = %args.config.display(),
        listen = %config.listen,
        upstream = %config.upstream,
        blocklist = %config.blocklist,
        refusal = %config.refusal,
        "loaded config"
    );

    let mut proxy_config = ProxyConfig::from_config(&config, args.port)?;
    proxy_config.upstream_timeout = seconds(args.timeout);
    proxy_config.stats_interval = seconds(args.stats_interval);
    proxy_config.max_in_flight = args.max_in_flight;
    if args.sequential {
        proxy_config.mode = ServeMode::Sequential;
    }
    if let Some(text) = args.failure_response {
        proxy_config.on_failure = FailurePolicy::Respond(text.into_bytes());
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let bind_addr = proxy_config.bind_addr;
    rt.block_on(proxy::run(proxy_config, shutdown_signal()))
        .with_context(|| format!("DNS proxy on {} failed", bind_addr))
}
