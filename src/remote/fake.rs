use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::remote::{IdentityLookup, RecordHost, RECORD_CONTENT_TYPE};

/// An in-memory stand-in for the record host and the lookup endpoint.
///
/// Unknown record URLs answer HEAD with `text/html`, the way the real host
/// answers with an error page. Every request is recorded so tests can
/// assert on traffic, e.g. that a cached shard is not downloaded twice.
pub struct FakeRemote {
    records: HashMap<String, (String, Vec<u8>)>,
    lookups: HashMap<String, String>,
    failing_downloads: Vec<String>,
    pub head_requests: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<String>>,
    pub lookup_requests: Mutex<Vec<String>>,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            lookups: HashMap::new(),
            failing_downloads: vec![],
            head_requests: Mutex::new(vec![]),
            downloads: Mutex::new(vec![]),
            lookup_requests: Mutex::new(vec![]),
        }
    }

    /// Serve `body` as a retrievable shard at `url`.
    pub fn with_record(self, url: &str, body: &[u8]) -> Self {
        self.with_typed_record(url, RECORD_CONTENT_TYPE, body)
    }

    pub fn with_typed_record(
        mut self,
        url: &str,
        content_type: &str,
        body: &[u8],
    ) -> Self {
        self.records
            .insert(url.to_string(), (content_type.to_string(), body.to_vec()));
        self
    }

    /// HEAD succeeds for `url` but the GET fails.
    pub fn with_failing_download(mut self, url: &str) -> Self {
        self.records.insert(
            url.to_string(),
            (RECORD_CONTENT_TYPE.to_string(), vec![]),
        );
        self.failing_downloads.push(url.to_string());
        self
    }

    pub fn with_lookup(mut self, url: &str, body: &str) -> Self {
        self.lookups.insert(url.to_string(), body.to_string());
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

#[async_trait]
impl RecordHost for FakeRemote {
    async fn content_type(&self, url: &str) -> Result<Option<String>> {
        self.head_requests.lock().unwrap().push(url.to_string());
        Ok(Some(
            self.records
                .get(url)
                .map(|(content_type, _)| content_type.clone())
                .unwrap_or_else(|| "text/html".to_string()),
        ))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.downloads.lock().unwrap().push(url.to_string());
        if self.failing_downloads.iter().any(|u| u == url) {
            return Err(anyhow::anyhow!("connection reset fetching {}", url));
        }
        let (_, body) = self
            .records
            .get(url)
            .ok_or_else(|| anyhow::anyhow!("404 Not Found: {}", url))?;
        tokio::fs::write(dest, body).await?;
        Ok(body.len() as u64)
    }
}

#[async_trait]
impl IdentityLookup for FakeRemote {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.lookup_requests.lock().unwrap().push(url.to_string());
        self.lookups
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Lookup returned 404 for {}", url))
    }
}
