//! Cascade catalog - discovery, normalization and bundle resolution
//!
//! # Overview
//!
//! The catalog is a tree of markdown customizations plus team bundles,
//! served by a static host:
//!
//! ```text
//! customizations/
//!     rules/<category>/<name>.md        ← shared rules
//!     workflows/<category>/<name>.md    ← shared workflows
//! bundles/<bundle>/
//!     bundle.yaml                       ← manifest listing dependencies
//!     windsurf/{rules,workflows}/*.md   ← documents embedded in the bundle
//! ```
//!
//! # Architecture
//!
//! ```text
//! PathPolicy ──► DirectoryDiscovery ──► CatalogRecordBuilder ──┐
//!     │                                   (metadata)          │
//!     └────────► BundleResolver ──────────────────────────────┤
//!                  (structured_text)                          ▼
//!                                          CatalogLoader ──► Catalog
//! ```
//!
//! Every component fetches through the [`Fetcher`] seam and builds paths
//! through one shared [`PathPolicy`].

pub mod bundle;
pub mod discovery;
pub mod fetch;
pub mod loader;
pub mod metadata;
pub mod paths;
pub mod record;
pub mod structured_text;
pub mod submission;

pub use bundle::{
    lint_manifest, BundleManifest, BundleResolution, BundleResolver, DeclaredDependency,
    DependencyDescriptor, LintReport, SkipReason, DEFAULT_BUNDLES,
};
pub use discovery::{DirectoryDiscovery, KnownFiles};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{Fetcher, FsFetcher};
pub use loader::{BundleEntry, Catalog, CatalogLoader};
pub use paths::{DeploymentMode, PageLocation, PathPolicy, ResolvedPaths};
pub use record::{CatalogRecord, CatalogRecordBuilder, DocumentKind, FileRef};
pub use submission::{Submission, SubmissionCategory};
