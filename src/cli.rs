use crate::annotation::DEFAULT_PBTXT;
use crate::pipeline::{PipelineConfig, DEFAULT_LOOKUP_HOST, DEFAULT_RECORD_HOST};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the viewer server
#[derive(Parser, Debug, Clone)]
#[command(about = "Serves YouTube-8M segment-level inference results")]
pub struct Args {
    /// Host address to bind to
    #[arg(long, default_value = "::", env = "YT8M_HOST")]
    pub host: String,

    /// Port that the API is served over
    #[arg(long, default_value_t = 8008, env = "YT8M_PORT")]
    pub port: u16,

    /// Directory holding cached records and the inference artifacts
    #[arg(long, default_value = "/tmp/mediapipe", env = "YT8M_ROOT")]
    pub root: PathBuf,

    /// Graph config file name, relative to the root
    #[arg(long, default_value = DEFAULT_PBTXT)]
    pub pbtxt: String,

    /// JSON configuration served to the front end
    #[arg(long, default_value = "static/config.json")]
    pub config: PathBuf,

    /// Directory of static website assets
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// Host serving the record shards
    #[arg(long, default_value = DEFAULT_RECORD_HOST)]
    pub record_host: String,

    /// Host serving the video id lookup files
    #[arg(long, default_value = DEFAULT_LOOKUP_HOST)]
    pub lookup_host: String,

    /// Seconds before a running annotator is killed
    #[arg(long, default_value_t = 600)]
    pub annotation_timeout_secs: u64,

    /// Seconds before a request to a remote host is abandoned
    #[arg(long, default_value_t = 300)]
    pub http_timeout_secs: u64,
}

impl Args {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            root: self.root.clone(),
            pbtxt: self.pbtxt.clone(),
            record_host: self.record_host.clone(),
            lookup_host: self.lookup_host.clone(),
            annotation_timeout: Duration::from_secs(
                self.annotation_timeout_secs,
            ),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
