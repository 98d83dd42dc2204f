//! Restricted-domain blocklist.
//!
//! The blocklist is kept as one opaque text blob. A query is restricted when
//! its raw bytes occur somewhere inside that blob. There is no domain
//! parsing: no label boundaries, no case folding, no TLD handling.

/// The configured blocklist blob.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    blob: Vec<u8>,
}

impl Blocklist {
    /// Create a blocklist from the configured blob.
    pub fn new(blob: impl Into<Vec<u8>>) -> Self {
        Self { blob: blob.into() }
    }

    /// Check whether a raw query buffer is restricted.
    ///
    /// True iff the whole buffer is a contiguous substring of the blob. An
    /// empty query or an empty blob never matches. The buffer is compared in
    /// full, including any NUL or length-prefix bytes it carries.
    pub fn is_restricted(&self, query: &[u8]) -> bool {
        if query.is_empty() || query.len() > self.blob.len() {
            return false;
        }

        self.blob
            .windows(query.len())
            .any(|window| window == query)
    }

    /// Length of the blob in bytes.
    pub fn len(&self) -> usize {
        self.blob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }
}
