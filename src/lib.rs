//! dnsgate - A DNS forwarding proxy with a restricted-query blocklist.
//!
//! Queries whose raw bytes appear in the configured blocklist get a canned
//! refusal; everything else is relayed to the upstream resolver and the
//! reply is passed back unaltered.

pub mod config;
pub mod error;
pub mod filter;
pub mod proxy;
pub mod resolver;
pub mod stats;
pub mod transport;
pub mod upstream;
