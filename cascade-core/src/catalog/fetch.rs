//! Fetch seam - Abstraction over where catalog documents come from
//!
//! - HTTP (the static host serving the catalog, or raw repository content)
//! - Local checkout on disk
//! - In-memory (testing)

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::FetchError;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Retrieves catalog documents by path
///
/// Paths are the display, source, or manifest paths produced by
/// [`PathPolicy`](super::paths::PathPolicy): relative, site-absolute, or
/// full URLs. Implementations resolve them against their own base.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Whether a document exists at `path` (HEAD request, never fails)
    async fn exists(&self, path: &str) -> bool;

    /// Fetch the text of the document at `path`
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError>;

    /// Fetcher identifier for logging
    fn name(&self) -> &'static str;
}

/// Fetches over HTTP relative to a base URL
#[cfg(feature = "http")]
pub struct HttpFetcher {
    client: reqwest::Client,
    base: reqwest::Url,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    /// Create a fetcher rooted at `base_url` with a per-request timeout
    pub fn new(base_url: &str, timeout: std::time::Duration) -> crate::error::Result<Self> {
        use crate::error::CatalogError;

        let base = reqwest::Url::parse(base_url)
            .map_err(|e| CatalogError::Config(format!("invalid base URL '{base_url}': {e}")))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("cascade-catalog/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    fn resolve(&self, path: &str) -> Result<reqwest::Url, FetchError> {
        self.base.join(path).map_err(|e| FetchError::Transport {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Fetcher for HttpFetcher {
    async fn exists(&self, path: &str) -> bool {
        let Ok(url) = self.resolve(path) else {
            return false;
        };

        match self.client.head(url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                false
            }
        }
    }

    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        let url = self.resolve(path)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                path: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                path: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                path: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Transport {
            path: url.to_string(),
            message: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Reads documents from a local checkout
///
/// `root` stands in for the directory the catalog page is served from;
/// relative and site-absolute paths are both resolved under it.
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FetchError> {
        if path.contains("://") {
            return Err(FetchError::Transport {
                path: path.to_string(),
                message: "remote URLs cannot be read from a local checkout".to_string(),
            });
        }

        Ok(normalize(&self.root.join(path.trim_start_matches('/'))))
    }
}

#[async_trait]
impl Fetcher for FsFetcher {
    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::metadata(&full)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        let full = self.resolve(path)?;
        debug!("Reading {}", full.display());

        tokio::fs::read_to_string(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound {
                    path: full.display().to_string(),
                }
            } else {
                FetchError::Io {
                    path: full.display().to_string(),
                    source: e,
                }
            }
        })
    }

    fn name(&self) -> &'static str {
        "fs"
    }
}

/// Resolve `.` and `..` lexically
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// In-memory fetcher for unit tests
#[cfg(test)]
pub(crate) struct MockFetcher {
    pub documents: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl MockFetcher {
    pub fn new<I, K, V>(documents: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            documents: documents
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Fetcher for MockFetcher {
    async fn exists(&self, path: &str) -> bool {
        self.documents.contains_key(path)
    }

    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                path: path.to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
