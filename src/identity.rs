use crate::error::{FetchError, Result};
use crate::remote::IdentityLookup;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument, warn};
use url::Url;

pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Number of trailing identifier characters that address the lookup file.
const LOOKUP_KEY_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub video_id: String,
    pub link: String,
}

impl ResolvedIdentity {
    pub fn new(video_id: impl Into<String>) -> Self {
        let video_id = video_id.into();
        let link = format!("{}{}", WATCH_URL_PREFIX, video_id);
        Self { video_id, link }
    }
}

/// The trailing `LOOKUP_KEY_LEN` characters of an internal identifier,
/// ignoring trailing whitespace.
pub fn lookup_key(internal_id: &str) -> Option<String> {
    let chars: Vec<char> = internal_id.trim_end().chars().collect();
    if chars.len() < LOOKUP_KEY_LEN {
        return None;
    }
    Some(chars[chars.len() - LOOKUP_KEY_LEN..].iter().collect())
}

fn quoted_literal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""([^"]+)""#).expect("quoted literal pattern is valid")
    })
}

/// First non-empty double-quoted literal in `text`, without the quotes.
pub fn first_quoted_literal(text: &str) -> Option<&str> {
    quoted_literal_pattern()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Maps internal identifiers to public video ids through the lookup host.
pub struct IdentityResolver {
    lookup_host: String,
    lookup: Arc<dyn IdentityLookup>,
}

impl IdentityResolver {
    pub fn new(
        lookup_host: impl Into<String>,
        lookup: Arc<dyn IdentityLookup>,
    ) -> Self {
        Self {
            lookup_host: lookup_host.into(),
            lookup,
        }
    }

    /// `http://<host>/2/j/i/<k0k1>/<k0k1k2k3>.js` for lookup key `k`.
    pub fn lookup_url(&self, internal_id: &str) -> Result<String> {
        let key = lookup_key(internal_id).ok_or_else(|| {
            FetchError::IdentityResolutionFailed(format!(
                "internal id '{}' is too short",
                internal_id.trim_end()
            ))
        })?;
        let shard: String = key.chars().take(2).collect();
        let file = format!("{}.js", key);

        let mut url = Url::parse(&format!("http://{}/", self.lookup_host))
            .map_err(|e| {
                FetchError::IdentityResolutionFailed(format!(
                    "invalid lookup host '{}': {}",
                    self.lookup_host, e
                ))
            })?;
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::IdentityResolutionFailed(format!(
                    "lookup host '{}' cannot be a base URL",
                    self.lookup_host
                ))
            })?
            .pop_if_empty()
            .extend(["2", "j", "i", shard.as_str(), file.as_str()]);
        Ok(url.to_string())
    }

    /// Fetches the lookup file for `internal_id` and takes its first quoted
    /// literal as the public video id.
    ///
    /// A payload shaped like `i("<key>","<id>");` therefore resolves to the
    /// echoed key rather than the id; only single-literal payloads resolve
    /// to the video id.
    #[instrument(skip(self), err)]
    pub async fn resolve(&self, internal_id: &str) -> Result<ResolvedIdentity> {
        let url = self.lookup_url(internal_id)?;
        let body = self.lookup.fetch_text(&url).await.map_err(|e| {
            warn!("Identity lookup at {} failed: {:#}", url, e);
            FetchError::IdentityResolutionFailed(format!(
                "lookup at {} failed",
                url
            ))
        })?;
        debug!("Lookup response: {}", body);

        let video_id = first_quoted_literal(&body).ok_or_else(|| {
            FetchError::IdentityResolutionFailed(format!(
                "no quoted id in response from {}",
                url
            ))
        })?;
        Ok(ResolvedIdentity::new(video_id))
    }

    /// Reads the identifier written by the annotator and resolves it.
    pub async fn resolve_file(&self, path: &Path) -> Result<ResolvedIdentity> {
        let internal_id = tokio::fs::read_to_string(path).await?;
        self.resolve(&internal_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeRemote;
    use crate::test_utils::init_test_logging;

    fn resolver(remote: Arc<FakeRemote>) -> IdentityResolver {
        IdentityResolver::new("lookup.test", remote)
    }

    #[test]
    fn test_lookup_key_uses_trailing_characters() {
        assert_eq!(lookup_key("0xAb12\n").as_deref(), Some("Ab12"));
        assert_eq!(lookup_key("Ab12").as_deref(), Some("Ab12"));
        assert_eq!(lookup_key("b12\n"), None);
        assert_eq!(lookup_key(""), None);
    }

    #[test]
    fn test_first_quoted_literal() {
        assert_eq!(first_quoted_literal(r#"foo"abc123"bar"#), Some("abc123"));
        assert_eq!(
            first_quoted_literal(r#"i("dQw4w9WgXcQ","other");"#),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(first_quoted_literal("no quotes here"), None);
        assert_eq!(first_quoted_literal(r#"just "one quote"#), None);
    }

    #[test]
    fn test_lookup_url() {
        let resolver = resolver(Arc::new(FakeRemote::new()));
        assert_eq!(
            resolver.lookup_url("XYab12\n").unwrap(),
            "http://lookup.test/2/j/i/ab/ab12.js"
        );
        assert!(matches!(
            resolver.lookup_url("ab\n"),
            Err(FetchError::IdentityResolutionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_extracts_id_and_link() {
        init_test_logging();
        let remote = Arc::new(FakeRemote::new().with_lookup(
            "http://lookup.test/2/j/i/ab/ab12.js",
            r#"foo"abc123"bar"#,
        ));
        let resolved =
            resolver(remote.clone()).resolve("XYab12\n").await.unwrap();
        assert_eq!(resolved.video_id, "abc123");
        assert_eq!(resolved.link, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(remote.lookup_requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_two_literal_payload_takes_first() {
        init_test_logging();
        let remote = Arc::new(FakeRemote::new().with_lookup(
            "http://lookup.test/2/j/i/ab/ab12.js",
            r#"i("ab12","dQw4w9WgXcQ");"#,
        ));
        let resolved = resolver(remote).resolve("XYab12\n").await.unwrap();
        assert_eq!(resolved.video_id, "ab12");
    }

    #[tokio::test]
    async fn test_resolve_without_quoted_literal_fails() {
        init_test_logging();
        let remote = Arc::new(FakeRemote::new().with_lookup(
            "http://lookup.test/2/j/i/ab/ab12.js",
            "not found",
        ));
        let err = resolver(remote).resolve("XYab12").await.unwrap_err();
        assert!(
            matches!(err, FetchError::IdentityResolutionFailed(_)),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_resolve_lookup_failure() {
        init_test_logging();
        let err = resolver(Arc::new(FakeRemote::new()))
            .resolve("XYab12")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::IdentityResolutionFailed(_)));
    }

    #[tokio::test]
    async fn test_resolve_file_reads_identifier() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yt8m_id");
        std::fs::write(&path, "XYcd34\n").unwrap();
        let remote = Arc::new(FakeRemote::new().with_lookup(
            "http://lookup.test/2/j/i/cd/cd34.js",
            r#"i("vid34");"#,
        ));
        let resolved = resolver(remote).resolve_file(&path).await.unwrap();
        assert_eq!(resolved, ResolvedIdentity::new("vid34"));
    }
}
