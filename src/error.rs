use crate::config::ConfigError;

/// Error type for the crate's outer surfaces (config, decoding, output I/O).
///
/// The chunk transformer itself never fails; every malformed input degrades
/// to a best-effort chunk instead.
#[derive(Debug, thiserror::Error)]
pub enum ChunkifyError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<std::convert::Infallible> for ChunkifyError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

/// Broad error category, used for the CLI exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Output,
}

impl ChunkifyError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            ChunkifyError::Config(_) => ErrorCategory::Configuration,
            ChunkifyError::Decode(_) => ErrorCategory::Input,
            ChunkifyError::Io(_) | ChunkifyError::Encode(_) => ErrorCategory::Output,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 78,
            ErrorCategory::Input => 65,
            ErrorCategory::Output => 74,
        }
    }
}
