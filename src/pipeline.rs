use crate::annotation::AnnotationRunner;
use crate::error::Result;
use crate::identity::{IdentityResolver, ResolvedIdentity};
use crate::labels::{self, AnnotationEntry};
use crate::record_ref::RecordReference;
use crate::record_store::RecordStore;
use crate::remote::{IdentityLookup, RecordHost};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_RECORD_HOST: &str = "us.data.yt8m.org";
pub const DEFAULT_LOOKUP_HOST: &str = "data.yt8m.org";

/// Response body of `/video`. Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResult {
    pub video_id: String,
    pub link: String,
    pub entries: Vec<AnnotationEntry>,
}

impl FetchResult {
    pub fn assemble(
        identity: ResolvedIdentity,
        entries: Vec<AnnotationEntry>,
    ) -> Self {
        Self {
            video_id: identity.video_id,
            link: identity.link,
            entries,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub root: PathBuf,
    pub pbtxt: String,
    pub record_host: String,
    pub lookup_host: String,
    pub annotation_timeout: Duration,
}

/// Reference in, labelled video out.
///
/// Runs hold no shared mutable state besides the record cache, so the
/// router may drive any number of them concurrently.
pub struct Pipeline {
    store: RecordStore,
    runner: AnnotationRunner,
    resolver: IdentityResolver,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        records: Arc<dyn RecordHost>,
        lookup: Arc<dyn IdentityLookup>,
    ) -> Self {
        Self {
            store: RecordStore::new(
                config.root.clone(),
                config.record_host.clone(),
                records,
            ),
            runner: AnnotationRunner::new(
                config.root.clone(),
                config.pbtxt.clone(),
                config.annotation_timeout,
            ),
            resolver: IdentityResolver::new(config.lookup_host.clone(), lookup),
        }
    }

    pub fn runner(&self) -> &AnnotationRunner {
        &self.runner
    }

    #[instrument(skip(self), err)]
    pub async fn fetch(
        &self,
        raw_reference: &str,
        index: u64,
    ) -> Result<FetchResult> {
        // Nothing is downloaded while the annotator cannot run anyway.
        self.runner.check_dependencies()?;
        let reference = RecordReference::parse(raw_reference)?;

        tokio::fs::create_dir_all(self.store.root()).await?;
        let artifact = self.store.materialize(&reference).await?;
        let outputs = self.runner.run(&artifact.local_path, index).await?;

        let (identity, entries) = tokio::try_join!(
            self.resolver.resolve_file(&outputs.internal_id_path),
            labels::read_labels(&outputs.labels_path),
        )?;
        info!(
            "Resolved {} record {} to {} with {} entries",
            reference.file_name(),
            index,
            identity.video_id,
            entries.len()
        );
        Ok(FetchResult::assemble(identity, entries))
    }
}
