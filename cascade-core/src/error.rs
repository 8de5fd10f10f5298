use thiserror::Error;

/// Failure to retrieve a document from the catalog host.
///
/// Every variant is recoverable from the caller's point of view: the
/// affected document or dependency is omitted and loading continues.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("HTTP {status} for {path}")]
    Status { path: String, status: u16 },

    #[error("request for {path} failed: {message}")]
    Transport { path: String, message: String },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
            || matches!(self, FetchError::Status { status: 404, .. })
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Known-files table error: {0}")]
    KnownFiles(String),

    #[error("Invalid page location: {0}")]
    PageLocation(String),

    #[error("Invalid submission: {0}")]
    Submission(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
