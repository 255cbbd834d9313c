use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing target URL, or a target host outside the allowlist.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Failure while inspecting the document. Aborts the run.
    #[error("Schema extraction failed: {0}")]
    ExtractionError(String),

    /// A single control could not be filled. Recovered by the runner.
    #[error("Fill failed for '{field}': {reason}")]
    FillError { field: String, reason: String },

    /// A correction derived from error feedback could not be synthesized.
    #[error("Correction failed for '{field}': {reason}")]
    CorrectionError { field: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailure(String),

    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    #[error("Navigation failed: {0}")]
    NavigationError(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("JavaScript error: {0}")]
    JsError(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotError(String),

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
