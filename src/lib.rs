use crate::pipeline::{Pipeline, PipelineConfig};
use crate::remote::real::HttpRemote;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod annotation;
pub mod app;
pub mod cli;
pub mod error;
pub mod identity;
pub mod labels;
pub mod pipeline;
pub mod record_ref;
pub mod record_store;
pub mod remote;

pub mod test_utils;

// Shared by every request handler
pub struct AppState {
    pub pipeline: Pipeline,
    pub static_dir: PathBuf,
    pub config_path: PathBuf,
}

impl AppState {
    /// State backed by an in-memory remote, rooted at `root`.
    ///
    /// Static assets are served from `<root>/static` and the front-end
    /// config from `<root>/static/config.json`; neither is created here.
    pub fn new_for_testing(
        root: &Path,
        remote: Arc<remote::fake::FakeRemote>,
    ) -> Self {
        let config = PipelineConfig {
            root: root.to_path_buf(),
            pbtxt: annotation::DEFAULT_PBTXT.to_string(),
            record_host: test_utils::TEST_RECORD_HOST.to_string(),
            lookup_host: test_utils::TEST_LOOKUP_HOST.to_string(),
            annotation_timeout: Duration::from_secs(30),
        };
        let static_dir = root.join("static");
        Self {
            pipeline: Pipeline::new(&config, remote.clone(), remote),
            config_path: static_dir.join("config.json"),
            static_dir,
        }
    }
}

// Create a config struct to hold AppState configuration
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub static_dir: PathBuf,
    pub config_path: PathBuf,
    pub http_timeout: Duration,
}

// Function to create AppState from parameters
pub fn create_app_state(config: AppConfig) -> Result<Arc<AppState>> {
    let remote = Arc::new(HttpRemote::new(config.http_timeout)?);
    info!(
        "Records from {}, video ids from {}",
        config.pipeline.record_host, config.pipeline.lookup_host
    );
    Ok(Arc::new(AppState {
        pipeline: Pipeline::new(&config.pipeline, remote.clone(), remote),
        static_dir: config.static_dir,
        config_path: config.config_path,
    }))
}
