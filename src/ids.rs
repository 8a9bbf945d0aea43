//! Content-addressed identifiers
//!
//! Every durable id in webx (pages, jobs, queue items, actions) is a
//! sha-256 digest truncated to 16 hex characters.

use sha2::{Digest, Sha256};

/// Hashes the input and returns the first 16 hex characters of the digest.
///
/// # Examples
///
/// ```
/// use webx::ids::sha256_16;
///
/// let id = sha256_16("job-1:https://example.com/docs");
/// assert_eq!(id.len(), 16);
/// assert_eq!(id, sha256_16("job-1:https://example.com/docs"));
/// ```
pub fn sha256_16(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}
