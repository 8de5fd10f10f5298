//! Document discovery
//!
//! Static hosts cannot list directories, so discovery works from a table of
//! known files per kind and category. Each candidate is checked and only the
//! ones that exist are returned. The table is regenerated offline from a
//! checkout with [`KnownFiles::scan_directory`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::fetch::Fetcher;
use super::paths::PathPolicy;
use super::record::{generate_title, DocumentKind, FileRef};
use crate::error::{CatalogError, Result};

/// Base names of known documents, by category, in declaration order
pub type CategoryTable = IndexMap<String, Vec<String>>;

/// Table of known documents for each document kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownFiles {
    #[serde(default)]
    pub rules: CategoryTable,
    #[serde(default)]
    pub workflows: CategoryTable,
}

impl Default for KnownFiles {
    /// The table matching the published catalog tree
    fn default() -> Self {
        Self {
            rules: table(&[
                ("framework", &["react"]),
                ("language", &["java", "typescript"]),
                ("security", &["secure-coding"]),
                ("style", &["style"]),
            ]),
            workflows: table(&[
                ("maintenance", &["debugging-issues"]),
                ("setup", &["dev-environment-setup", "node-project-setup"]),
            ]),
        }
    }
}

fn table(entries: &[(&str, &[&str])]) -> CategoryTable {
    entries
        .iter()
        .map(|(category, files)| {
            (
                category.to_string(),
                files.iter().map(|f| f.to_string()).collect(),
            )
        })
        .collect()
}

impl KnownFiles {
    /// Categories and base names for `kind` (`None` for bundles)
    pub fn table(&self, kind: DocumentKind) -> Option<&CategoryTable> {
        match kind {
            DocumentKind::Rule => Some(&self.rules),
            DocumentKind::Workflow => Some(&self.workflows),
            DocumentKind::Bundle => None,
        }
    }

    fn table_mut(&mut self, kind: DocumentKind) -> Option<&mut CategoryTable> {
        match kind {
            DocumentKind::Rule => Some(&mut self.rules),
            DocumentKind::Workflow => Some(&mut self.workflows),
            DocumentKind::Bundle => None,
        }
    }

    /// Total number of known documents
    pub fn len(&self) -> usize {
        self.rules.values().chain(self.workflows.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse a table from YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Serialize the table to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Load a table from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::KnownFiles(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Build a table from a `customizations/` directory
    ///
    /// Reads `rules/<category>/*.md` and `workflows/<category>/*.md`.
    /// Categories and base names are sorted; categories without documents
    /// are left out.
    pub fn scan_directory(customizations_root: &Path) -> Result<Self> {
        if !customizations_root.is_dir() {
            return Err(CatalogError::KnownFiles(format!(
                "not a directory: {}",
                customizations_root.display()
            )));
        }

        let mut known = KnownFiles {
            rules: CategoryTable::new(),
            workflows: CategoryTable::new(),
        };

        for kind in DocumentKind::DOCUMENTS {
            let kind_root = customizations_root.join(kind.dir_name());
            if !kind_root.is_dir() {
                debug!("No {} directory under {}", kind, customizations_root.display());
                continue;
            }

            let Some(table) = known.table_mut(kind) else {
                continue;
            };

            for entry in WalkDir::new(&kind_root)
                .min_depth(2)
                .max_depth(2)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }

                let category = path
                    .parent()
                    .and_then(|p| p.file_name())
                    .and_then(|n| n.to_str());
                let base = path.file_stem().and_then(|s| s.to_str());

                if let (Some(category), Some(base)) = (category, base) {
                    table
                        .entry(category.to_string())
                        .or_default()
                        .push(base.to_string());
                }
            }

            table.sort_keys();
            for files in table.values_mut() {
                files.sort();
                files.dedup();
            }
        }

        info!(
            "Scanned {} documents ({} rule categories, {} workflow categories)",
            known.len(),
            known.rules.len(),
            known.workflows.len()
        );
        Ok(known)
    }
}

/// Finds which known documents exist on the host
pub struct DirectoryDiscovery {
    fetcher: Arc<dyn Fetcher>,
    policy: Arc<PathPolicy>,
    known: Arc<KnownFiles>,
}

impl DirectoryDiscovery {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        policy: Arc<PathPolicy>,
        known: Arc<KnownFiles>,
    ) -> Self {
        Self {
            fetcher,
            policy,
            known,
        }
    }

    /// List the documents of `kind` that exist, in table order
    ///
    /// Missing documents are left out silently. Bundles are not discovered
    /// this way and yield an empty list.
    pub async fn discover(&self, kind: DocumentKind) -> Vec<FileRef> {
        let Some(table) = self.known.table(kind) else {
            warn!("No directory structure defined for {}", kind);
            return Vec::new();
        };

        let mut found = Vec::new();
        for (category, base_names) in table {
            for base in base_names {
                let paths = self.policy.resolve(kind, category, base);

                if !self.fetcher.exists(&paths.display_path).await {
                    debug!("Not found via {}: {}", self.fetcher.name(), paths.display_path);
                    continue;
                }

                found.push(FileRef {
                    title: generate_title(base),
                    filename: format!("{base}.md"),
                    kind,
                    category: category.clone(),
                    display_path: paths.display_path,
                });
            }
        }

        debug!("Discovered {} {} documents", found.len(), kind);
        found
    }
}
