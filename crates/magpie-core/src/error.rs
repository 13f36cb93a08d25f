use std::path::PathBuf;

/// Errors that can occur across the Magpie bot.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette::Result` at the boundary.
///
/// # Examples
///
/// ```
/// use magpie_core::MagpieError;
///
/// let err = MagpieError::Config("GITHUB_TOKEN not set".into());
/// assert!(err.to_string().contains("GITHUB_TOKEN"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum MagpieError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// GitHub API or network failure.
    #[error("GitHub error: {0}")]
    Github(String),

    /// LLM API or response error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}
