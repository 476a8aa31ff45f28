use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::app_config::DEFAULT_ACCOUNTS_FILE;

/// Number of accounts the test suites expect
pub const DEFAULT_BATCH_SIZE: u32 = 7;

/// Configuration for batch account generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Number of accounts to generate
    pub batch_size: u32,

    /// Output file path for generated accounts
    pub output_file: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            output_file: PathBuf::from(DEFAULT_ACCOUNTS_FILE),
        }
    }
}

impl GeneratorConfig {
    /// Create a new generator config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set batch size
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    /// Set output file path
    pub fn with_output_file(mut self, path: PathBuf) -> Self {
        self.output_file = path;
        self
    }
}
