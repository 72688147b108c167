//! Parser for the annotation summary stream.
//!
//! Each line is `<micros>,<label>:<score>,<label>:<score>...`. Anything
//! after the digits of a score is ignored, so `cat:0.5 (top)` yields a
//! score of 0.5.

use crate::error::{FetchError, Result};
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationEntry {
    pub time: f64,
    pub labels: Vec<LabelScore>,
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Greedy label: the split happens at the last colon followed by a score.
    PATTERN.get_or_init(|| {
        Regex::new(r"^(.+):([0-9.]+)").expect("label pattern is valid")
    })
}

fn parse_label(column: &str) -> Option<LabelScore> {
    let captures = label_pattern().captures(column)?;
    let score = captures[2].parse::<f64>().ok()?;
    Some(LabelScore {
        label: captures[1].to_string(),
        score,
    })
}

/// Parses a single line; `index` is only used for error reporting.
pub fn parse_line(line: &str, index: usize) -> Result<AnnotationEntry> {
    let malformed = || FetchError::MalformedLabelLine {
        line: line.to_string(),
        index,
    };

    let mut columns = line.split(',');
    let micros = columns
        .next()
        .and_then(|first| first.trim().parse::<i64>().ok())
        .ok_or_else(malformed)?;

    let labels = columns
        .map(|column| parse_label(column).ok_or_else(malformed))
        .collect::<Result<Vec<_>>>()?;

    Ok(AnnotationEntry {
        time: micros as f64 / MICROS_PER_SECOND,
        labels,
    })
}

/// Parses a whole label stream, stopping at the first malformed line.
pub fn parse_labels(contents: &str) -> Result<Vec<AnnotationEntry>> {
    contents
        .lines()
        .enumerate()
        .map(|(index, line)| parse_line(line, index))
        .collect()
}

pub async fn read_labels(path: &Path) -> Result<Vec<AnnotationEntry>> {
    let contents = tokio::fs::read_to_string(path).await?;
    parse_labels(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn label(label: &str, score: f64) -> LabelScore {
        LabelScore {
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn test_parse_line_converts_micros_to_seconds() {
        assert_eq!(
            parse_line("1000000,cat:0.5,dog:0.25", 0).unwrap(),
            AnnotationEntry {
                time: 1.0,
                labels: vec![label("cat", 0.5), label("dog", 0.25)],
            }
        );
        assert_eq!(
            parse_line("0,bird:0.9", 0).unwrap(),
            AnnotationEntry {
                time: 0.0,
                labels: vec![label("bird", 0.9)],
            }
        );
    }

    #[test]
    fn test_parse_line_label_edge_cases() {
        let entry =
            parse_line("2500000,Video game:0.75xyz,a:b:1,Car:0.1 ", 3).unwrap();
        assert_eq!(entry.time, 2.5);
        assert_eq!(
            entry.labels,
            vec![label("Video game", 0.75), label("a:b", 1.0), label("Car", 0.1)]
        );

        // A timestamp with no labels is still an entry.
        assert_eq!(parse_line("5", 0).unwrap().labels, vec![]);
    }

    #[test]
    fn test_parse_line_rejects_bad_columns() {
        for bad in
            ["abc,cat:0.5", "", "1.5,cat:0.5", "1,cat", "1,:0.5", "1,cat:x"]
        {
            match parse_line(bad, 7) {
                Err(FetchError::MalformedLabelLine { line, index }) => {
                    assert_eq!(line, bad);
                    assert_eq!(index, 7);
                }
                other => panic!("expected malformed for {bad:?}: {other:?}"),
            }
        }
        assert!(parse_line("1,cat:1.2.3", 0).is_err());
    }

    #[test]
    fn test_parse_labels_preserves_order() {
        let entries =
            parse_labels("0,a:0.1\n1000000,b:0.2\n2000000,c:0.3\n").unwrap();
        let times: Vec<f64> = entries.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
        assert_eq!(entries[2].labels, vec![label("c", 0.3)]);
    }

    #[test]
    fn test_parse_labels_stops_at_first_malformed_line() {
        let err = parse_labels("0,a:0.1\nnope,b:0.2\n2,c:oops\n").unwrap_err();
        match err {
            FetchError::MalformedLabelLine { line, index } => {
                assert_eq!(line, "nope,b:0.2");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_parse_labels_empty_stream() {
        assert_eq!(parse_labels("").unwrap(), vec![]);
    }
}
