//! Cascade Catalog library exports
//!
//! Loads rule and workflow customizations plus team bundles from a static
//! file host (or a local checkout) and normalizes them into catalog records.

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{Catalog, CatalogLoader, CatalogRecord, DocumentKind};
pub use config::CatalogConfig;
pub use error::{CatalogError, FetchError};
