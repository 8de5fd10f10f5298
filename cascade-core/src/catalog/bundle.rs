//! Bundle manifests and dependency resolution
//!
//! A bundle (`bundles/<name>/bundle.yaml`) groups customizations for a team.
//! Its dependencies either reference shared documents from
//! `customizations/` or documents embedded in the bundle itself:
//!
//! ```yaml
//! name: Frontend Team
//! version: 1.0.0
//! dependencies:
//!   rules:
//!     - path: language/typescript.md          # shared rule
//!       activation: always_on
//!     - path: windsurf/rules/a11y.md          # embedded in this bundle
//!   workflows:
//!     - path: workflows/setup/node-project-setup.md
//! ```
//!
//! Resolution turns each dependency into a [`CatalogRecord`]. Dependencies
//! that cannot be resolved are skipped and reported, never fatal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::fetch::Fetcher;
use super::metadata::{truncate_description, NO_DESCRIPTION};
use super::paths::{strip_markdown_extension, PathPolicy};
use super::record::{
    assemble, format_bundle_category, format_category, generate_title, normalize_date,
    CatalogRecord, CategorySource, DocumentKind, RecordFields, DEFAULT_ACTIVATION,
    DEFAULT_AUTHOR, EMBEDDED_AUTHOR,
};
use super::structured_text::{self, Mapping, Value};

/// Bundles loaded when configuration names none
pub const DEFAULT_BUNDLES: &[&str] = &[
    "frontend-team",
    "backend-team",
    "security-team",
    "devops-team",
];

/// File name of a bundle manifest
pub const MANIFEST_FILE: &str = "bundle.yaml";

/// Top-level manifest keys with dedicated fields
const KNOWN_KEYS: &[&str] = &[
    "name",
    "description",
    "version",
    "author",
    "labels",
    "tags",
    "metadata",
    "dependencies",
];

/// A declared dependency of a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<String>,
}

/// A dependency entry as written in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DeclaredDependency {
    Valid(DependencyDescriptor),
    /// Entry without a usable `path`
    Malformed(Value),
}

impl DeclaredDependency {
    fn from_value(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match text("path") {
            Some(path) => DeclaredDependency::Valid(DependencyDescriptor {
                path,
                description: text("description"),
                activation: text("activation"),
            }),
            None => DeclaredDependency::Malformed(value.clone()),
        }
    }

    pub fn descriptor(&self) -> Option<&DependencyDescriptor> {
        match self {
            DeclaredDependency::Valid(d) => Some(d),
            DeclaredDependency::Malformed(_) => None,
        }
    }
}

/// `dependencies` section of a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestDependencies {
    pub rules: Vec<DeclaredDependency>,
    pub workflows: Vec<DeclaredDependency>,
}

impl ManifestDependencies {
    pub fn len(&self) -> usize {
        self.rules.len() + self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rules then workflows, each in declaration order, tagged with their list
    pub fn iter(&self) -> impl Iterator<Item = (DocumentKind, usize, &DeclaredDependency)> {
        let rules = self
            .rules
            .iter()
            .enumerate()
            .map(|(i, d)| (DocumentKind::Rule, i, d));
        let workflows = self
            .workflows
            .iter()
            .enumerate()
            .map(|(i, d)| (DocumentKind::Workflow, i, d));
        rules.chain(workflows)
    }
}

/// Team details shown with a bundle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BundleMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_size: Option<String>,
    pub use_cases: Vec<String>,
}

/// A parsed `bundle.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleManifest {
    /// Directory name of the bundle
    pub bundle_name: String,
    /// Display name (falls back to the directory name)
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub labels: Vec<String>,
    pub metadata: BundleMetadata,
    pub dependencies: ManifestDependencies,
    /// Remaining top-level fields
    pub extra: Mapping,
    pub manifest_path: String,
}

impl BundleManifest {
    /// Parse manifest text
    ///
    /// Returns `None` when the text holds no fields at all.
    pub fn parse(bundle_name: &str, manifest_path: &str, text: &str) -> Option<Self> {
        let fields = structured_text::parse(text);
        if fields.is_empty() {
            return None;
        }

        let text_field = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let labels = fields
            .get("labels")
            .or_else(|| fields.get("tags"))
            .map(|v| match v {
                Value::Scalar(s) => s
                    .split(',')
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect(),
                other => other.to_string_list(),
            })
            .unwrap_or_default();

        let metadata = fields
            .get("metadata")
            .map(|m| BundleMetadata {
                team_size: m
                    .get("team_size")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                use_cases: m
                    .get("use_cases")
                    .map(Value::to_string_list)
                    .unwrap_or_default(),
            })
            .unwrap_or_default();

        let declared = |key: &str| -> Vec<DeclaredDependency> {
            fields
                .get("dependencies")
                .and_then(|d| d.get(key))
                .and_then(Value::as_list)
                .map(|items| items.iter().map(DeclaredDependency::from_value).collect())
                .unwrap_or_default()
        };

        let extra = fields
            .iter()
            .filter(|(k, _)| !KNOWN_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(Self {
            bundle_name: bundle_name.to_string(),
            name: text_field("name").unwrap_or_else(|| bundle_name.to_string()),
            description: text_field("description"),
            version: text_field("version"),
            author: text_field("author"),
            labels,
            metadata,
            dependencies: ManifestDependencies {
                rules: declared("rules"),
                workflows: declared("workflows"),
            },
            extra,
            manifest_path: manifest_path.to_string(),
        })
    }

    /// Catalog id of the bundle itself
    pub fn id(&self) -> String {
        format!("bundle-{}", self.bundle_name)
    }

    /// The catalog record representing the bundle
    pub fn to_record(&self, policy: &PathPolicy) -> CatalogRecord {
        let paths = policy.resolve(DocumentKind::Bundle, &self.bundle_name, MANIFEST_FILE);
        let description = self
            .description
            .as_deref()
            .map(truncate_description)
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        CatalogRecord {
            id: self.id(),
            title: self.name.clone(),
            description,
            kind: DocumentKind::Bundle,
            category: format_bundle_category(&self.bundle_name),
            labels: self.labels.iter().map(|l| l.to_lowercase()).collect(),
            author: self
                .author
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            activation: DEFAULT_ACTIVATION.to_string(),
            modified: normalize_date(None),
            filename: MANIFEST_FILE.to_string(),
            source_path: paths.source_path,
            display_path: self.manifest_path.clone(),
            bundle_reference: false,
            bundle_dependency: None,
        }
    }
}

/// Where a dependency path points, by its shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyTarget<'a> {
    /// `windsurf/<subtype>/<file>` inside the declaring bundle
    Embedded { subtype: &'a str, filename: &'a str },
    /// `workflows/<category>/<file>`
    SharedWorkflow { category: &'a str, filename: &'a str },
    /// `<category>/<file>`
    SharedRule { category: &'a str, filename: &'a str },
}

impl<'a> DependencyTarget<'a> {
    /// Classify a dependency path, `None` when it has no recognized shape
    pub fn classify(path: &'a str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }

        match segments[..] {
            ["windsurf", subtype, filename] => Some(DependencyTarget::Embedded { subtype, filename }),
            ["workflows", category, filename] => {
                Some(DependencyTarget::SharedWorkflow { category, filename })
            }
            [category, filename] => Some(DependencyTarget::SharedRule { category, filename }),
            _ => None,
        }
    }
}

/// Why a declared dependency produced no record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Entry has no `path`
    MissingPath,
    /// `path` has no recognized shape
    UnrecognizedPath { path: String },
    /// Embedded path resolved without a bundle
    NoBundleContext { path: String },
    /// Document could not be fetched
    FetchFailed { path: String, error: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingPath => write!(f, "dependency has no path"),
            SkipReason::UnrecognizedPath { path } => write!(f, "unrecognized path '{path}'"),
            SkipReason::NoBundleContext { path } => {
                write!(f, "embedded path '{path}' has no bundle to resolve against")
            }
            SkipReason::FetchFailed { path, error } => write!(f, "failed to fetch {path}: {error}"),
        }
    }
}

/// A dependency that was skipped during resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDependency {
    /// List the entry was declared in
    pub list: DocumentKind,
    /// Position within that list
    pub index: usize,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Records resolved from a manifest plus what was skipped
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BundleResolution {
    pub records: Vec<CatalogRecord>,
    pub skipped: Vec<SkippedDependency>,
}

/// Loads manifests and resolves their dependencies
pub struct BundleResolver {
    fetcher: Arc<dyn Fetcher>,
    policy: Arc<PathPolicy>,
}

impl BundleResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, policy: Arc<PathPolicy>) -> Self {
        Self { fetcher, policy }
    }

    /// Fetch and parse `bundles/<name>/bundle.yaml`
    ///
    /// A missing or empty manifest yields `None`.
    pub async fn load_manifest(&self, bundle_name: &str) -> Option<BundleManifest> {
        let manifest_path = self.policy.manifest_path(bundle_name);

        let text = match self.fetcher.fetch_text(&manifest_path).await {
            Ok(text) => text,
            Err(e) if e.is_not_found() => {
                debug!("Bundle {} is not published: {}", bundle_name, e);
                return None;
            }
            Err(e) => {
                warn!("Failed to load bundle {}: {}", bundle_name, e);
                return None;
            }
        };

        let manifest = BundleManifest::parse(bundle_name, &manifest_path, &text);
        match &manifest {
            Some(m) => debug!(
                "Loaded bundle {} with {} declared dependencies",
                bundle_name,
                m.dependencies.len()
            ),
            None => warn!("Bundle manifest {} is empty", manifest_path),
        }
        manifest
    }

    /// Resolve every dependency of a manifest into records
    pub async fn resolve_dependencies(&self, manifest: &BundleManifest) -> Vec<CatalogRecord> {
        self.resolve_with_report(manifest).await.records
    }

    /// Resolve every dependency, reporting the ones that were skipped
    ///
    /// Rules come before workflows; declaration order is kept within each.
    pub async fn resolve_with_report(&self, manifest: &BundleManifest) -> BundleResolution {
        let mut resolution = BundleResolution::default();

        for (list, index, declared) in manifest.dependencies.iter() {
            let outcome = match declared {
                DeclaredDependency::Valid(descriptor) => {
                    self.try_resolve(descriptor, Some(&manifest.bundle_name)).await
                }
                DeclaredDependency::Malformed(_) => Err(SkipReason::MissingPath),
            };

            match outcome {
                Ok(record) => resolution.records.push(record),
                Err(reason) => {
                    warn!(
                        "Skipping {} dependency #{} of bundle {}: {}",
                        list, index, manifest.bundle_name, reason
                    );
                    resolution.skipped.push(SkippedDependency {
                        list,
                        index,
                        reason,
                    });
                }
            }
        }

        info!(
            "Resolved {} of {} dependencies for bundle {}",
            resolution.records.len(),
            manifest.dependencies.len(),
            manifest.bundle_name
        );
        resolution
    }

    /// Resolve one dependency
    ///
    /// `bundle` names the bundle that declared it; embedded paths cannot be
    /// resolved without one.
    pub async fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        bundle: Option<&str>,
    ) -> Option<CatalogRecord> {
        match self.try_resolve(descriptor, bundle).await {
            Ok(record) => Some(record),
            Err(reason) => {
                warn!("Skipping dependency {}: {}", descriptor.path, reason);
                None
            }
        }
    }

    async fn try_resolve(
        &self,
        descriptor: &DependencyDescriptor,
        bundle: Option<&str>,
    ) -> Result<CatalogRecord, SkipReason> {
        let unrecognized = || SkipReason::UnrecognizedPath {
            path: descriptor.path.clone(),
        };
        let target = DependencyTarget::classify(&descriptor.path).ok_or_else(unrecognized)?;

        let (kind, id, filename, category, default_author, paths) = match target {
            DependencyTarget::Embedded { subtype, filename } => {
                let bundle = bundle.ok_or_else(|| SkipReason::NoBundleContext {
                    path: descriptor.path.clone(),
                })?;
                let kind = DocumentKind::from_dir_name(subtype)
                    .filter(|k| *k != DocumentKind::Bundle)
                    .ok_or_else(unrecognized)?;
                let base = strip_markdown_extension(filename);

                (
                    kind,
                    format!("{bundle}-{subtype}-{base}"),
                    filename,
                    format_bundle_category(bundle),
                    EMBEDDED_AUTHOR,
                    self.policy.resolve_embedded(bundle, subtype, filename),
                )
            }
            DependencyTarget::SharedWorkflow { category, filename } => (
                DocumentKind::Workflow,
                shared_id(DocumentKind::Workflow, category, filename),
                filename,
                format_category(category),
                DEFAULT_AUTHOR,
                self.policy.resolve(DocumentKind::Workflow, category, filename),
            ),
            DependencyTarget::SharedRule { category, filename } => (
                DocumentKind::Rule,
                shared_id(DocumentKind::Rule, category, filename),
                filename,
                format_category(category),
                DEFAULT_AUTHOR,
                self.policy.resolve(DocumentKind::Rule, category, filename),
            ),
        };

        let content = self
            .fetcher
            .fetch_text(&paths.display_path)
            .await
            .map_err(|e| SkipReason::FetchFailed {
                path: paths.display_path.clone(),
                error: e.to_string(),
            })?;

        let title = descriptor
            .description
            .clone()
            .unwrap_or_else(|| generate_title(filename));

        Ok(assemble(RecordFields {
            id,
            title,
            kind,
            category: CategorySource::Fixed(category),
            filename: format!("{}.md", strip_markdown_extension(filename)),
            paths,
            content: &content,
            rendered_as_html: self.policy.renders_html(),
            default_author,
            activation_override: descriptor.activation.clone(),
            dependency: Some(descriptor.clone()),
        }))
    }
}

fn shared_id(kind: DocumentKind, category: &str, filename: &str) -> String {
    format!(
        "{}-{}-{}",
        kind.dir_name(),
        category,
        strip_markdown_extension(filename)
    )
}

/// Problems found in a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl LintReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a manifest for structural problems
pub fn lint_manifest(manifest: &BundleManifest) -> LintReport {
    let mut report = LintReport::default();

    if manifest.name.trim().is_empty() {
        report.errors.push("name is required".to_string());
    }

    match manifest.version.as_deref() {
        None => report.warnings.push("version is not set".to_string()),
        Some(version) => {
            if let Err(e) = semver::Version::parse(version) {
                report
                    .errors
                    .push(format!("version '{version}' is not valid semver: {e}"));
            }
        }
    }

    if manifest.description.is_none() {
        report.warnings.push("description is not set".to_string());
    }

    if manifest.dependencies.is_empty() {
        report.warnings.push("bundle declares no dependencies".to_string());
    }

    for (list, index, declared) in manifest.dependencies.iter() {
        let location = format!("dependencies.{}[{}]", list.dir_name(), index);

        let Some(descriptor) = declared.descriptor() else {
            report.errors.push(format!("{location}: missing path"));
            continue;
        };

        match DependencyTarget::classify(&descriptor.path) {
            None => report.errors.push(format!(
                "{location}: unrecognized path '{}'",
                descriptor.path
            )),
            Some(DependencyTarget::Embedded { subtype, .. })
                if !matches!(subtype, "rules" | "workflows") =>
            {
                report.errors.push(format!(
                    "{location}: embedded subtype '{subtype}' must be rules or workflows"
                ))
            }
            Some(DependencyTarget::SharedWorkflow { .. }) if list == DocumentKind::Rule => {
                report.warnings.push(format!(
                    "{location}: workflow path '{}' listed under rules",
                    descriptor.path
                ))
            }
            Some(DependencyTarget::SharedRule { .. }) if list == DocumentKind::Workflow => {
                report.warnings.push(format!(
                    "{location}: rule path '{}' listed under workflows",
                    descriptor.path
                ))
            }
            Some(_) => {}
        }
    }

    report
}

/// Lint a manifest and check that every dependency exists in a checkout
pub fn lint_manifest_in_checkout(manifest: &BundleManifest, checkout_root: &Path) -> LintReport {
    let mut report = lint_manifest(manifest);
    let local = PathPolicy::local("");

    for (list, index, declared) in manifest.dependencies.iter() {
        let Some(descriptor) = declared.descriptor() else {
            continue;
        };

        let rel_path = match DependencyTarget::classify(&descriptor.path) {
            Some(DependencyTarget::Embedded { subtype, filename }) => {
                local
                    .resolve_embedded(&manifest.bundle_name, subtype, filename)
                    .source_path
            }
            Some(DependencyTarget::SharedWorkflow { category, filename }) => {
                local.resolve(DocumentKind::Workflow, category, filename).source_path
            }
            Some(DependencyTarget::SharedRule { category, filename }) => {
                local.resolve(DocumentKind::Rule, category, filename).source_path
            }
            None => continue,
        };

        if !checkout_root.join(&rel_path).is_file() {
            report.errors.push(format!(
                "dependencies.{}[{}]: {} does not exist",
                list.dir_name(),
                index,
                rel_path
            ));
        }
    }

    report
}
