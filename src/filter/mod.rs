//! DNS query filtering module.
//!
//! Decides whether a raw query is restricted and, if so, produces the
//! canned refusal that is sent back instead of forwarding.

mod blocklist;

pub use blocklist::Blocklist;

/// Check if a query is restricted and return the canned response.
///
/// Returns `Some(response)` with the refusal text copied verbatim when the
/// query is restricted, `None` if it should be forwarded upstream.
pub fn filter_query(blocklist: &Blocklist, refusal: &[u8], query: &[u8]) -> Option<Vec<u8>> {
    if blocklist.is_restricted(query) {
        Some(refusal.to_vec())
    } else {
        None
    }
}
