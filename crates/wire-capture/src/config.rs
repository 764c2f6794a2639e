use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of most-recent chunks retained when no capacity is given.
pub const DEFAULT_CAPTURE_LAST: usize = 1024;

/// Configuration of a capturing decorator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    /// Number of chunks to retain from the very start of the stream.
    #[serde(default)]
    pub capture_first: usize,
    /// Number of most-recent chunks to retain.
    #[serde(default = "default_capture_last")]
    pub capture_last: usize,
    /// Directory into which dumps are written.
    /// Defaults to the system temporary directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_dir: Option<PathBuf>,
}

fn default_capture_last() -> usize {
    DEFAULT_CAPTURE_LAST
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_first: 0,
            capture_last: DEFAULT_CAPTURE_LAST,
            dump_dir: None,
        }
    }
}

impl CaptureConfig {
    pub fn with_capacity(capture_first: usize, capture_last: usize) -> Self {
        Self {
            capture_first,
            capture_last,
            dump_dir: None,
        }
    }
}
