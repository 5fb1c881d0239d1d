use thiserror::Error;

/// Main error type for the css-purge crate
///
/// The purging core itself never fails; these errors come from configuration
/// and from the file handling around it.
#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Glob error: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("No files found matching the provided patterns")]
    NoFilesFound,

    #[error("Failed to read {path}: {message}")]
    InputError { path: String, message: String },

    #[error("Failed to write output to {path}: {message}")]
    OutputError { path: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid safelist pattern '{pattern}': {source}")]
    SafelistPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Security violation: {0}")]
    SecurityError(String),
}

pub type Result<T> = std::result::Result<T, PurgeError>;
