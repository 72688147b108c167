use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize test logging in a thread-safe way.
/// This function ensures that logging is initialized only once across all tests,
/// even when multiple test files are running in parallel.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info,tower_http=debug".into()),
            )
            .with_test_writer()
            .finish();

        // Another harness may already have installed one.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Hosts the state from `AppState::new_for_testing` talks to.
pub const TEST_RECORD_HOST: &str = "records.test";
pub const TEST_LOOKUP_HOST: &str = "lookup.test";

/// Marker files read by the fake annotator from the directory it is
/// installed in.
pub const FAKE_STDERR_FILE: &str = "fake_stderr.txt";
pub const FAKE_EXIT_CODE_FILE: &str = "fake_exit_code";
pub const FAKE_NO_OUTPUT_FILE: &str = "fake_no_output";
pub const FAKE_SLEEP_SECS_FILE: &str = "fake_sleep_secs";
/// Copied verbatim to the label stream instead of the generated lines.
pub const FAKE_LABELS_FILE: &str = "fake_labels.txt";

/// A stand-in for `segment_level_inference`.
///
/// For record index `n` it writes `n + 1` label lines, one per second,
/// whose first label is the record's contents, and an internal id of
/// `XY<contents><n as two digits>`. A two-character record therefore
/// resolves through the lookup key `<contents><nn>`.
#[cfg(unix)]
const FAKE_ANNOTATOR_SCRIPT: &str = r#"#!/bin/sh
dir=$(dirname "$0")
for arg in "$@"; do
  case "$arg" in
    --input_side_packets=*) packets="${arg#--input_side_packets=}" ;;
    --output_stream_file=*) labels="${arg#--output_stream_file=}" ;;
    --output_side_packets_file=*) idfile="${arg#--output_side_packets_file=}" ;;
  esac
done
record="${packets%%,record_index_str=*}"
record="${record#tfrecord_path=}"
index="${packets##*record_index_str=}"

if [ -f "$dir/fake_sleep_secs" ]; then sleep "$(cat "$dir/fake_sleep_secs")"; fi
if [ -f "$dir/fake_stderr.txt" ]; then cat "$dir/fake_stderr.txt" >&2; fi
if [ -f "$dir/fake_exit_code" ]; then exit "$(cat "$dir/fake_exit_code")"; fi
if [ -f "$dir/fake_no_output" ]; then exit 0; fi

sleep 0.1
shard=$(cat "$record")
if [ -f "$dir/fake_labels.txt" ]; then
  cp "$dir/fake_labels.txt" "$labels"
else
  : > "$labels"
  i=0
  while [ "$i" -le "$index" ]; do
    printf '%d,%s:0.%d,index%s:0.5\n' "$((i * 1000000))" "$shard" "$i" "$index" >> "$labels"
    i=$((i + 1))
  done
fi
printf 'XY%s%02d\n' "$shard" "$index" > "$idfile"
"#;

/// Writes the fake annotator once per test process and returns its path.
///
/// Every test links to the same file: writing an executable while another
/// thread forks can fail the later exec with ETXTBSY.
#[cfg(unix)]
fn shared_fake_annotator() -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::OnceLock;

    static SCRIPT_DIR: OnceLock<tempfile::TempDir> = OnceLock::new();
    let dir = SCRIPT_DIR.get_or_init(|| {
        let dir = tempfile::Builder::new()
            .prefix("fake-annotator-")
            .tempdir()
            .expect("Failed to create fake annotator directory");
        let script = dir.path().join("segment_level_inference");
        std::fs::write(&script, FAKE_ANNOTATOR_SCRIPT)
            .expect("Failed to write fake annotator");
        std::fs::set_permissions(
            &script,
            std::fs::Permissions::from_mode(0o755),
        )
        .expect("Failed to mark fake annotator executable");
        dir
    });
    dir.path().join("segment_level_inference")
}

/// Installs the graph config, label map and fake annotator under `root`.
#[cfg(unix)]
pub fn install_fake_annotator(
    root: &std::path::Path,
    pbtxt: &str,
) -> std::io::Result<()> {
    std::fs::write(root.join(pbtxt), "# graph config\n")?;
    std::fs::write(root.join("label_map.txt"), "cat\ndog\n")?;
    std::os::unix::fs::symlink(
        shared_fake_annotator(),
        root.join("segment_level_inference"),
    )
}
