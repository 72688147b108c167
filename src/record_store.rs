use crate::error::{FetchError, Result};
use crate::record_ref::RecordReference;
use crate::remote::{content_type_matches, RecordHost, RECORD_CONTENT_TYPE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A record shard materialized under the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRecordArtifact {
    pub local_path: PathBuf,
    pub remote_url: String,
}

/// Downloads record shards on first use and keeps them under the root.
///
/// Cached shards are never re-validated against the host: once a file
/// exists at the local path it is trusted as-is.
pub struct RecordStore {
    root: PathBuf,
    record_host: String,
    host: Arc<dyn RecordHost>,
}

impl RecordStore {
    pub fn new(
        root: impl Into<PathBuf>,
        record_host: impl Into<String>,
        host: Arc<dyn RecordHost>,
    ) -> Self {
        Self {
            root: root.into(),
            record_host: record_host.into(),
            host,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn remote_url(&self, reference: &RecordReference) -> String {
        format!("http://{}{}", self.record_host, reference.remote_path())
    }

    pub fn local_path(&self, reference: &RecordReference) -> PathBuf {
        self.root.join(reference.file_name())
    }

    #[instrument(
        skip(self, reference),
        fields(record = %reference.file_name()),
        err
    )]
    pub async fn materialize(
        &self,
        reference: &RecordReference,
    ) -> Result<LocalRecordArtifact> {
        let remote_url = self.remote_url(reference);
        let local_path = self.local_path(reference);

        let content_type =
            self.host.content_type(&remote_url).await.map_err(|e| {
                warn!("HEAD request for {} failed: {:#}", remote_url, e);
                FetchError::DownloadFailed(remote_url.clone())
            })?;
        match content_type.as_deref() {
            Some(ct) if content_type_matches(ct, RECORD_CONTENT_TYPE) => {}
            other => {
                warn!("{} reported content type {:?}", remote_url, other);
                return Err(FetchError::InvalidReference(
                    reference.file_name(),
                ));
            }
        }

        if tokio::fs::try_exists(&local_path).await? {
            debug!("Using cached record at {}", local_path.display());
            return Ok(LocalRecordArtifact {
                local_path,
                remote_url,
            });
        }

        // Stage inside the root so the final rename stays on one filesystem
        // and readers never see a partially written shard.
        let staging = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(&self.root)?;
        info!("Downloading {} to {}", remote_url, local_path.display());
        let bytes = self
            .host
            .download(&remote_url, staging.path())
            .await
            .map_err(|e| {
                warn!("Download of {} failed: {:#}", remote_url, e);
                FetchError::DownloadFailed(remote_url.clone())
            })?;
        staging
            .persist(&local_path)
            .map_err(|e| FetchError::Io(e.error))?;
        info!("Stored {} bytes at {}", bytes, local_path.display());

        Ok(LocalRecordArtifact {
            local_path,
            remote_url,
        })
    }
}
