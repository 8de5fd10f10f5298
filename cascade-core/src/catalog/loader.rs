//! Full catalog load
//!
//! Discovers rules and workflows, builds their records, then loads every
//! configured bundle and resolves its dependencies. Fetches run one at a
//! time so the catalog order always follows table and declaration order.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::bundle::{BundleManifest, BundleResolver, SkippedDependency};
use super::discovery::{DirectoryDiscovery, KnownFiles};
use super::fetch::Fetcher;
use super::paths::PathPolicy;
use super::record::{CatalogRecord, CatalogRecordBuilder, DocumentKind};
use crate::config::CatalogConfig;
use crate::error::{FetchError, Result};

/// A loaded bundle with its resolved dependencies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleEntry {
    pub record: CatalogRecord,
    pub manifest: BundleManifest,
    pub dependencies: Vec<CatalogRecord>,
    pub skipped: Vec<SkippedDependency>,
}

/// Everything loaded in one session
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub records: Vec<CatalogRecord>,
    pub bundles: Vec<BundleEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record unless one with the same id is already present
    pub fn insert(&mut self, record: CatalogRecord) -> bool {
        if self.records.iter().any(|r| r.id == record.id) {
            warn!("Duplicate catalog id {}, keeping the first", record.id);
            return false;
        }
        self.records.push(record);
        true
    }

    /// Look up a record by id, including bundle dependencies
    pub fn get(&self, id: &str) -> Option<&CatalogRecord> {
        self.records.iter().find(|r| r.id == id).or_else(|| {
            self.bundles
                .iter()
                .flat_map(|b| b.dependencies.iter())
                .find(|r| r.id == id)
        })
    }

    /// Look up a bundle by directory name
    pub fn bundle(&self, name: &str) -> Option<&BundleEntry> {
        self.bundles.iter().find(|b| b.manifest.bundle_name == name)
    }

    /// Records whose title, description, or labels contain `query` (case-insensitive)
    pub fn search(&self, query: &str) -> Vec<&CatalogRecord> {
        self.records.iter().filter(|r| r.matches(query)).collect()
    }

    pub fn filter_by_kind(&self, kind: DocumentKind) -> Vec<&CatalogRecord> {
        self.records.iter().filter(|r| r.kind == kind).collect()
    }

    pub fn filter_by_label(&self, label: &str) -> Vec<&CatalogRecord> {
        let label = label.to_lowercase();
        self.records
            .iter()
            .filter(|r| r.labels.iter().any(|l| *l == label))
            .collect()
    }

    /// Distinct display categories, sorted
    pub fn categories(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Loads the catalog from one host
pub struct CatalogLoader {
    fetcher: Arc<dyn Fetcher>,
    policy: Arc<PathPolicy>,
    discovery: DirectoryDiscovery,
    builder: CatalogRecordBuilder,
    resolver: BundleResolver,
    bundle_names: Vec<String>,
}

impl CatalogLoader {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        policy: Arc<PathPolicy>,
        known: KnownFiles,
        bundle_names: Vec<String>,
    ) -> Self {
        Self {
            discovery: DirectoryDiscovery::new(fetcher.clone(), policy.clone(), Arc::new(known)),
            builder: CatalogRecordBuilder::new(policy.clone()),
            resolver: BundleResolver::new(fetcher.clone(), policy.clone()),
            fetcher,
            policy,
            bundle_names,
        }
    }

    /// Loader for the bundles and known-files table named in `config`
    pub fn from_config(
        config: &CatalogConfig,
        fetcher: Arc<dyn Fetcher>,
        policy: Arc<PathPolicy>,
    ) -> Result<Self> {
        Ok(Self::new(
            fetcher,
            policy,
            config.known_files()?,
            config.bundles.clone(),
        ))
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    pub fn resolver(&self) -> &BundleResolver {
        &self.resolver
    }

    /// Load rules, workflows, then bundles
    pub async fn load(&self) -> Catalog {
        let mut catalog = Catalog::new();

        for kind in DocumentKind::DOCUMENTS {
            for record in self.load_kind(kind).await {
                catalog.insert(record);
            }
        }

        for name in &self.bundle_names {
            if let Some(entry) = self.load_bundle(name).await {
                catalog.insert(entry.record.clone());
                catalog.bundles.push(entry);
            }
        }

        info!(
            "Loaded {} records and {} bundles via {}",
            catalog.records.len(),
            catalog.bundles.len(),
            self.fetcher.name()
        );
        catalog
    }

    /// Discover and build the records of one kind
    pub async fn load_kind(&self, kind: DocumentKind) -> Vec<CatalogRecord> {
        let mut records = Vec::new();

        for file_ref in self.discovery.discover(kind).await {
            let fetched = self.fetcher.fetch_text(&file_ref.display_path).await;
            if let Some(record) = self.builder.build(&file_ref, fetched) {
                records.push(record);
            }
        }

        debug!("Built {} {} records", records.len(), kind);
        records
    }

    /// Load one bundle and resolve its dependencies
    pub async fn load_bundle(&self, name: &str) -> Option<BundleEntry> {
        let manifest = self.resolver.load_manifest(name).await?;
        let resolution = self.resolver.resolve_with_report(&manifest).await;

        Some(BundleEntry {
            record: manifest.to_record(&self.policy),
            manifest,
            dependencies: resolution.records,
            skipped: resolution.skipped,
        })
    }

    /// Raw text of a record, read from its source path
    pub async fn fetch_source(
        &self,
        record: &CatalogRecord,
    ) -> std::result::Result<String, FetchError> {
        self.fetcher.fetch_text(&record.source_path).await
    }
}

#[cfg(test)]
mod loader_tests {
    use super::*;
    use crate::catalog::fetch::MockFetcher;
    use pretty_assertions::assert_eq;

    fn record(id: &str, kind: DocumentKind, category: &str, labels: &[&str]) -> CatalogRecord {
        CatalogRecord {
            id: id.to_string(),
            title: id.to_uppercase(),
            description: format!("About {id}"),
            kind,
            category: category.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            author: "Unknown".to_string(),
            activation: "manual".to_string(),
            modified: "2024-01-01".to_string(),
            filename: format!("{id}.md"),
            source_path: id.to_string(),
            display_path: id.to_string(),
            bundle_reference: false,
            bundle_dependency: None,
        }
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut catalog = Catalog::new();
        assert!(catalog.insert(record("a", DocumentKind::Rule, "Style", &[])));
        assert!(!catalog.insert(record("a", DocumentKind::Workflow, "Setup", &[])));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("a").unwrap().kind, DocumentKind::Rule);
    }

    #[test]
    fn test_queries() {
        let mut catalog = Catalog::new();
        catalog.insert(record(
            "react",
            DocumentKind::Rule,
            "Frameworks & Libraries",
            &["frontend"],
        ));
        catalog.insert(record("java", DocumentKind::Rule, "Languages", &["backend"]));
        catalog.insert(record("setup", DocumentKind::Workflow, "Setup", &["frontend"]));

        let ids = |records: Vec<&CatalogRecord>| -> Vec<String> {
            records.into_iter().map(|r| r.id.clone()).collect()
        };

        assert_eq!(ids(catalog.search("REACT")), vec!["react"]);
        assert_eq!(ids(catalog.search("frontend")), vec!["react", "setup"]);
        assert_eq!(ids(catalog.filter_by_kind(DocumentKind::Workflow)), vec!["setup"]);
        assert_eq!(ids(catalog.filter_by_label("Backend")), vec!["java"]);
        assert_eq!(
            catalog.categories(),
            vec!["Frameworks & Libraries", "Languages", "Setup"]
        );
    }

    #[tokio::test]
    async fn test_load_orders_rules_workflows_bundles() {
        let fetcher = MockFetcher::new([
            ("customizations/workflows/setup/node-project-setup.md", "Node."),
            ("customizations/rules/style/style.md", "Style."),
            ("customizations/rules/framework/react.md", "React."),
            (
                "bundles/frontend-team/bundle.yaml",
                "name: Frontend\ndependencies:\n  rules:\n    - path: framework/react.md\n",
            ),
        ]);
        let loader = CatalogLoader::new(
            Arc::new(fetcher),
            Arc::new(PathPolicy::local("")),
            KnownFiles::default(),
            vec!["frontend-team".to_string(), "backend-team".to_string()],
        );

        let catalog = loader.load().await;
        let ids: Vec<_> = catalog.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "rules-framework-react",
                "rules-style-style",
                "workflows-setup-node-project-setup",
                "bundle-frontend-team",
            ]
        );

        let bundle = catalog.bundle("frontend-team").unwrap();
        assert_eq!(bundle.dependencies.len(), 1);
        assert!(bundle.dependencies[0].bundle_reference);
        assert!(catalog.bundle("backend-team").is_none());
    }
}
