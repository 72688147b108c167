pub mod fake;
pub mod real;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Content type the record host reports for a retrievable shard.
pub const RECORD_CONTENT_TYPE: &str = "application/octet-stream";

/// The remote store that hosts record shards.
///
/// Abstracted so tests can count HEAD and GET traffic without a network.
#[async_trait]
pub trait RecordHost: Send + Sync {
    /// Issues a metadata-only request and returns the reported
    /// `Content-Type`, if the host sent one.
    async fn content_type(&self, url: &str) -> Result<Option<String>>;

    /// Streams the object at `url` into the file at `dest`, returning the
    /// number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// The lookup endpoint mapping internal identifiers to public ones.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Fetches the raw response body for `url`.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Compares a `Content-Type` header value against `expected`, ignoring
/// parameters such as `charset` and ASCII case.
pub fn content_type_matches(header: &str, expected: &str) -> bool {
    header
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}
