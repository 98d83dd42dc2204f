//! Configuration file loading.
//!
//! The config file holds four fields in fixed order:
//!
//! 1. listen address (whitespace-delimited token, at most 64 bytes)
//! 2. upstream resolver address (token, at most 64 bytes)
//! 3. blocklist blob (token, at most 4096 bytes)
//! 4. refusal text (rest of the next non-blank line, may contain spaces)
//!
//! Field contents are not validated beyond their size bounds. Addresses are
//! checked only when [`Config::listen_addr`] or [`Config::upstream_addr`]
//! resolves them.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use crate::error::ConfigError;
use crate::transport::MAX_DNS_PACKET_SIZE;

/// File read when no path is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "dns_proxy_config.txt";

/// Well-known DNS port, used for both listening and the upstream resolver.
pub const DNS_PORT: u16 = 53;

const ADDRESS_MAX_LEN: usize = 64;
const BLOCKLIST_MAX_LEN: usize = 4096;
const REFUSAL_MAX_LEN: usize = MAX_DNS_PACKET_SIZE;

/// The loaded configuration record. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen: String,
    pub upstream: String,
    pub blocklist: String,
    pub refusal: String,
}

impl Config {
    /// Read and parse the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&text)
    }

    /// Parse the four config fields from `text`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut rest = text;

        let listen = next_token(&mut rest, "listen", ADDRESS_MAX_LEN)?;
        let upstream = next_token(&mut rest, "upstream", ADDRESS_MAX_LEN)?;
        let blocklist = next_token(&mut rest, "blocklist", BLOCKLIST_MAX_LEN)?;
        let refusal = rest_of_line(&mut rest, "refusal", REFUSAL_MAX_LEN)?;

        Ok(Self {
            listen: listen.to_string(),
            upstream: upstream.to_string(),
            blocklist: blocklist.to_string(),
            refusal: refusal.to_string(),
        })
    }

    /// Socket address to listen on.
    ///
    /// The listen field is an IP literal bound on `port`. An explicit
    /// `ip:port` in the field takes precedence.
    pub fn listen_addr(&self, port: u16) -> Result<SocketAddr, ConfigError> {
        socket_addr("listen", &self.listen, port)
    }

    /// Socket address of the upstream resolver, on port 53 unless the field
    /// carries its own port.
    pub fn upstream_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr("upstream", &self.upstream, DNS_PORT)
    }
}

/// Take the next whitespace-delimited token, skipping leading whitespace.
fn next_token<'a>(
    rest: &mut &'a str,
    field: &'static str,
    max: usize,
) -> Result<&'a str, ConfigError> {
    let trimmed = rest.trim_start();
    let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let (token, tail) = trimmed.split_at(end);

    if token.is_empty() {
        return Err(ConfigError::MissingField(field));
    }
    if token.len() > max {
        return Err(ConfigError::FieldTooLong { field, max });
    }

    *rest = tail;
    Ok(token)
}

/// Take the remainder of the next non-blank line.
fn rest_of_line<'a>(
    rest: &mut &'a str,
    field: &'static str,
    max: usize,
) -> Result<&'a str, ConfigError> {
    let trimmed = rest.trim_start();
    let (line, tail) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.is_empty() {
        return Err(ConfigError::MissingField(field));
    }
    if line.len() > max {
        return Err(ConfigError::FieldTooLong { field, max });
    }

    *rest = tail;
    Ok(line)
}

fn socket_addr(field: &'static str, value: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }

    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .map_err(|_| ConfigError::InvalidAddress {
            field,
            value: value.to_string(),
        })
}
