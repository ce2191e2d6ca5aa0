//! Dataset access: splits and JSONL loading.

use crate::models::{PreformError, RawExample, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// A named partition of the dataset, processed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Validation,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Validation];

    /// Output filename for the preference format of this split.
    pub fn preference_file(&self) -> String {
        format!("preference-{self}.jsonl")
    }

    /// Output filename for the supervised format of this split.
    pub fn sft_file(&self) -> String {
        format!("sft-{self}.jsonl")
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Validation => write!(f, "validation"),
        }
    }
}

/// Load raw examples from a JSONL file, in source order.
///
/// Blank lines are skipped. A malformed line fails the whole load with its
/// 1-based line number.
pub fn load_split(path: &Path) -> Result<Vec<RawExample>> {
    let file = File::open(path).map_err(|e| PreformError::io("opening dataset file", e))?;
    let reader = BufReader::new(file);
    let mut examples = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| PreformError::io("reading dataset file", e))?;
        if line.trim().is_empty() {
            continue;
        }
        let example: RawExample = serde_json::from_str(&line)
            .map_err(|e| PreformError::Parse(format!("Line {}: {}", line_num + 1, e)))?;
        examples.push(example);
    }

    info!(count = examples.len(), path = %path.display(), "Loaded examples");
    Ok(examples)
}

/// Count the JSON objects in a JSONL file without interpreting them.
///
/// Used as a pre-upload check that a formatted file is well-formed.
pub fn count_jsonl_records(path: &Path) -> Result<usize> {
    let file = File::open(path).map_err(|e| PreformError::io("opening jsonl file", e))?;
    let reader = BufReader::new(file);
    let mut count = 0;

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| PreformError::io("reading jsonl file", e))?;
        if line.trim().is_empty() {
            continue;
        }
        serde_json::from_str::<serde_json::Value>(&line)
            .map_err(|e| PreformError::Parse(format!("Line {}: {}", line_num + 1, e)))?;
        count += 1;
    }

    Ok(count)
}
