//! Logging for SWAP.
//!
//! - [`initialize_logging`] installs the global `tracing` subscriber with a
//!   stdout layer and an optional size-rotated file sink.
//! - [`SwapLogger`] carries the node and peer context and tags every scope
//!   with an [`Action`].

mod action;
mod logging;

pub use action::{Action, SwapLogger};
pub use logging::{RotatingFile, initialize_logging};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default size of a log file before it is rotated.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 262_144;

/// Default number of rotated files kept next to the live one.
pub const DEFAULT_MAX_FILES: usize = 5;

/// Name of the live log file inside the log directory.
pub const LOG_FILE_NAME: &str = "swap.log";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON instead of human-readable lines.
    pub json: bool,
    /// Directory for the rolling log file. `None` or empty disables the sink.
    pub log_dir: Option<PathBuf>,
    /// Rotate once the live file would grow past this many bytes.
    pub max_file_size: u64,
    /// Rotated files to keep.
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            log_dir: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl LoggingConfig {
    /// The file sink directory, if enabled.
    pub fn file_sink(&self) -> Option<&Path> {
        self.log_dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}
