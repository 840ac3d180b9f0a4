use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MirrorError {
    #[error("catalog unavailable: {0}")]
    #[diagnostic(help("the cycle was aborted before any dataset was processed"))]
    CatalogUnavailable(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("ledger at {path} is corrupt: {message}")]
    #[diagnostic(help("inspect or remove the file, or rerun with --reset to start from empty"))]
    CorruptState { path: Utf8PathBuf, message: String },

    #[error("payload request failed: {0}")]
    PayloadHttp(String),

    #[error("payload returned status {status}: {message}")]
    PayloadStatus { status: u16, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl MirrorError {
    /// True for errors that abort a whole cycle because no catalog could be trusted.
    pub fn is_catalog_failure(&self) -> bool {
        matches!(
            self,
            MirrorError::CatalogUnavailable(_) | MirrorError::CatalogStatus { .. }
        )
    }
}
