use crate::error::{FetchError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time;
use tracing::{debug, error, info, instrument};

pub const ANNOTATOR_BINARY: &str = "segment_level_inference";
pub const LABEL_MAP: &str = "label_map.txt";
pub const DEFAULT_PBTXT: &str = "dataset_segment_level_inference.pbtxt";

const OUTPUT_STREAM: &str = "annotation_summary";
const OUTPUT_SIDE_PACKET: &str = "yt8m_id";
const LABELS_FILE: &str = "labels";

/// Files produced by one annotator run.
///
/// Both live in a scratch directory owned by this value, so results from
/// concurrent runs never share a path. The directory is removed on drop.
#[derive(Debug)]
pub struct AnnotationOutputs {
    pub labels_path: PathBuf,
    pub internal_id_path: PathBuf,
    _scratch: TempDir,
}

pub struct AnnotationRunner {
    root: PathBuf,
    pbtxt: String,
    timeout: Duration,
}

impl AnnotationRunner {
    pub fn new(
        root: impl Into<PathBuf>,
        pbtxt: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            root: root.into(),
            pbtxt: pbtxt.into(),
            timeout,
        }
    }

    pub fn graph_config_path(&self) -> PathBuf {
        self.root.join(&self.pbtxt)
    }

    pub fn executable_path(&self) -> PathBuf {
        self.root.join(ANNOTATOR_BINARY)
    }

    pub fn label_map_path(&self) -> PathBuf {
        self.root.join(LABEL_MAP)
    }

    pub fn required_paths(&self) -> Vec<PathBuf> {
        vec![
            self.graph_config_path(),
            self.executable_path(),
            self.label_map_path(),
        ]
    }

    /// Fails with every required artifact that is absent, not just the
    /// first one.
    pub fn check_dependencies(&self) -> Result<()> {
        let missing: Vec<PathBuf> = self
            .required_paths()
            .into_iter()
            .filter(|path| !path.exists())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FetchError::MissingDependency(missing))
        }
    }

    fn command_args(
        &self,
        record_path: &Path,
        index: u64,
        labels_path: &Path,
        internal_id_path: &Path,
    ) -> Vec<String> {
        vec![
            format!(
                "--calculator_graph_config_file={}",
                self.graph_config_path().display()
            ),
            format!(
                "--input_side_packets=tfrecord_path={},record_index_str={}",
                record_path.display(),
                index
            ),
            format!("--output_stream={}", OUTPUT_STREAM),
            format!("--output_stream_file={}", labels_path.display()),
            format!("--output_side_packets={}", OUTPUT_SIDE_PACKET),
            format!(
                "--output_side_packets_file={}",
                internal_id_path.display()
            ),
        ]
    }

    /// Runs the annotator over one record of the shard at `record_path`.
    ///
    /// Anything written to stderr fails the run even when the process
    /// exits with status zero.
    #[instrument(skip(self), err)]
    pub async fn run(
        &self,
        record_path: &Path,
        index: u64,
    ) -> Result<AnnotationOutputs> {
        self.check_dependencies()?;

        let scratch = tempfile::Builder::new()
            .prefix("annotation-")
            .tempdir_in(&self.root)?;
        let labels_path = scratch.path().join(LABELS_FILE);
        let internal_id_path = scratch.path().join(OUTPUT_SIDE_PACKET);

        let mut command = Command::new(self.executable_path());
        command
            .args(self.command_args(
                record_path,
                index,
                &labels_path,
                &internal_id_path,
            ))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!("Running annotator: {:?}", command);

        let child = command.spawn().map_err(|e| {
            FetchError::AnnotationFailed(format!(
                "failed to spawn {}: {}",
                self.executable_path().display(),
                e
            ))
        })?;

        let output = match time::timeout(self.timeout, child.wait_with_output())
            .await
        {
            Ok(result) => result.map_err(|e| {
                FetchError::AnnotationFailed(format!(
                    "failed to wait for annotator: {}",
                    e
                ))
            })?,
            Err(_) => {
                error!("Annotator timed out after {:?}", self.timeout);
                return Err(FetchError::AnnotationFailed(format!(
                    "timed out after {} seconds",
                    self.timeout.as_secs_f64()
                )));
            }
        };

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            error!("Annotator wrote to stderr: {}", stderr);
            return Err(FetchError::AnnotationFailed(stderr));
        }
        if !output.status.success() {
            error!("Annotator exited with {}", output.status);
            return Err(FetchError::AnnotationFailed(format!(
                "annotator exited with {}",
                output.status
            )));
        }

        for path in [&labels_path, &internal_id_path] {
            if !tokio::fs::try_exists(path).await? {
                return Err(FetchError::AnnotationFailed(format!(
                    "annotator did not produce {}",
                    path.display()
                )));
            }
        }

        info!("Annotated record {} of {}", index, record_path.display());
        Ok(AnnotationOutputs {
            labels_path,
            internal_id_path,
            _scratch: scratch,
        })
    }
}
