use crate::error::{FetchError, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

pub const RECORD_EXTENSION: &str = "tfrecord";

/// Dataset partition a record shard belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Validate,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validate => "validate",
            Split::Test => "test",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "train" => Some(Split::Train),
            "validate" => Some(Split::Validate),
            "test" => Some(Split::Test),
            _ => None,
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated reference to one record shard, e.g. `train00` or
/// `validate0a.tfrecord`.
///
/// The suffix is limited to `[A-Za-z0-9_-]` because it ends up verbatim in
/// a URL path, a file name and the annotator's side-packet list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordReference {
    split: Split,
    suffix: String,
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(train|validate|test)([A-Za-z0-9_-]*)(?:\.tfrecord)?$")
            .expect("reference pattern is valid")
    })
}

impl RecordReference {
    pub fn parse(raw: &str) -> Result<Self> {
        let captures = reference_pattern()
            .captures(raw)
            .ok_or_else(|| FetchError::InvalidReference(raw.to_string()))?;
        let split = Split::from_prefix(&captures[1])
            .ok_or_else(|| FetchError::InvalidReference(raw.to_string()))?;
        Ok(Self {
            split,
            suffix: captures[2].to_string(),
        })
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Shard file name, identical locally and remotely.
    pub fn file_name(&self) -> String {
        format!("{}{}.{}", self.split, self.suffix, RECORD_EXTENSION)
    }

    /// Path of the shard on the record host.
    pub fn remote_path(&self) -> String {
        format!("/2/frame/{}/{}", self.split, self.file_name())
    }
}
