//! Normalized catalog records
//!
//! Every document the catalog shows, whether discovered directly or pulled
//! in through a bundle, ends up as a [`CatalogRecord`]. Discovered documents
//! go through [`CatalogRecordBuilder`]; bundle dependencies share the same
//! field assembly via [`assemble`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::bundle::DependencyDescriptor;
use super::metadata::{self, DocumentMetadata};
use super::paths::{strip_markdown_extension, PathPolicy, ResolvedPaths};
use crate::error::FetchError;

/// Author used when a shared document names none
pub const DEFAULT_AUTHOR: &str = "Unknown";

/// Author used when a bundle-embedded document names none
pub const EMBEDDED_AUTHOR: &str = "Team";

/// Activation used when neither the document nor a dependency names one
pub const DEFAULT_ACTIVATION: &str = "manual";

/// Kind of catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentKind {
    #[serde(rename = "rules")]
    Rule,
    #[serde(rename = "workflows")]
    Workflow,
    #[serde(rename = "bundle")]
    Bundle,
}

impl DocumentKind {
    /// Kinds backed by standalone markdown documents
    pub const DOCUMENTS: [DocumentKind; 2] = [DocumentKind::Rule, DocumentKind::Workflow];

    /// Directory name under `customizations/` (and id prefix)
    pub fn dir_name(&self) -> &'static str {
        match self {
            DocumentKind::Rule => "rules",
            DocumentKind::Workflow => "workflows",
            DocumentKind::Bundle => "bundles",
        }
    }

    /// Parse a directory name (`rules`, `workflows`)
    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "rules" => Some(DocumentKind::Rule),
            "workflows" => Some(DocumentKind::Workflow),
            "bundles" => Some(DocumentKind::Bundle),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentKind::Rule => "rules",
            DocumentKind::Workflow => "workflows",
            DocumentKind::Bundle => "bundle",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rule" | "rules" => Ok(DocumentKind::Rule),
            "workflow" | "workflows" => Ok(DocumentKind::Workflow),
            "bundle" | "bundles" => Ok(DocumentKind::Bundle),
            other => Err(format!(
                "unknown kind '{other}' (expected rules, workflows or bundle)"
            )),
        }
    }
}

/// A document found by discovery, not yet fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub title: String,
    pub filename: String,
    pub kind: DocumentKind,
    /// Raw category directory name (`language`, `setup`, ...)
    pub category: String,
    pub display_path: String,
}

/// A normalized catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: DocumentKind,
    pub category: String,
    pub labels: Vec<String>,
    pub author: String,
    pub activation: String,
    pub modified: String,
    pub filename: String,
    pub source_path: String,
    pub display_path: String,
    pub bundle_reference: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_dependency: Option<DependencyDescriptor>,
}

impl CatalogRecord {
    /// Whether `query` (case-insensitive) occurs in the title, description, or a label
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
            || self.labels.iter().any(|l| l.contains(&query))
    }
}

/// How a record's display category is chosen
#[derive(Debug, Clone)]
pub enum CategorySource {
    /// Header `category` if present, else this raw key; both run through [`format_category`]
    HeaderOr(String),
    /// Already formatted, used as-is
    Fixed(String),
}

/// Everything needed to assemble a record from fetched content
#[derive(Debug, Clone)]
pub struct RecordFields<'a> {
    pub id: String,
    pub title: String,
    pub kind: DocumentKind,
    pub category: CategorySource,
    pub filename: String,
    pub paths: ResolvedPaths,
    /// Text fetched from the display path
    pub content: &'a str,
    pub rendered_as_html: bool,
    pub default_author: &'a str,
    /// Activation that takes precedence over the document's own
    pub activation_override: Option<String>,
    pub dependency: Option<DependencyDescriptor>,
}

/// Assemble a record from fetched content, applying all defaults
pub fn assemble(fields: RecordFields<'_>) -> CatalogRecord {
    let header = if fields.rendered_as_html {
        metadata::extract_header_from_html(fields.content)
    } else {
        metadata::extract_header(fields.content)
    };
    let meta = DocumentMetadata::from_header(&header);

    let category = match fields.category {
        CategorySource::HeaderOr(raw) => {
            format_category(meta.category.as_deref().unwrap_or(raw.as_str()))
        }
        CategorySource::Fixed(display) => display,
    };

    let labels = meta
        .labels
        .unwrap_or_default()
        .into_iter()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect();

    let activation = fields
        .activation_override
        .filter(|a| !a.trim().is_empty())
        .or(meta.activation)
        .unwrap_or_else(|| DEFAULT_ACTIVATION.to_string());

    CatalogRecord {
        id: fields.id,
        title: fields.title,
        description: metadata::extract_description(fields.content, fields.rendered_as_html),
        kind: fields.kind,
        category,
        labels,
        author: meta
            .author
            .unwrap_or_else(|| fields.default_author.to_string()),
        activation,
        modified: normalize_date(meta.modified.as_deref()),
        filename: fields.filename,
        source_path: fields.paths.source_path,
        display_path: fields.paths.display_path,
        bundle_reference: fields.dependency.is_some(),
        bundle_dependency: fields.dependency,
    }
}

/// Turns discovered documents into records
pub struct CatalogRecordBuilder {
    policy: Arc<PathPolicy>,
}

impl CatalogRecordBuilder {
    pub fn new(policy: Arc<PathPolicy>) -> Self {
        Self { policy }
    }

    /// Build a record from a discovered document and its fetch result
    ///
    /// A failed fetch yields `None`; the document is omitted from the catalog.
    pub fn build(
        &self,
        file_ref: &FileRef,
        fetched: Result<String, FetchError>,
    ) -> Option<CatalogRecord> {
        let content = match fetched {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping {}: {}", file_ref.filename, e);
                return None;
            }
        };

        let base_name = strip_markdown_extension(&file_ref.filename);
        let paths = self
            .policy
            .resolve(file_ref.kind, &file_ref.category, &file_ref.filename);

        let record = assemble(RecordFields {
            id: format!(
                "{}-{}-{}",
                file_ref.kind.dir_name(),
                file_ref.category,
                base_name
            ),
            title: file_ref.title.clone(),
            kind: file_ref.kind,
            category: CategorySource::HeaderOr(file_ref.category.clone()),
            filename: format!("{base_name}.md"),
            paths,
            content: &content,
            rendered_as_html: self.policy.renders_html(),
            default_author: DEFAULT_AUTHOR,
            activation_override: None,
            dependency: None,
        });

        debug!("Built record {}", record.id);
        Some(record)
    }
}

/// Display name for a category directory
pub fn format_category(key: &str) -> String {
    let key = key.trim();
    match key.to_lowercase().as_str() {
        "language" | "languages" => "Languages".to_string(),
        "framework" | "frameworks & libraries" => "Frameworks & Libraries".to_string(),
        "security" => "Security".to_string(),
        "style" => "Style".to_string(),
        "maintenance" => "Maintenance".to_string(),
        "setup" => "Setup".to_string(),
        other => title_case_words(other, '-'),
    }
}

/// Display name for a bundle, used as the category of its embedded documents
pub fn format_bundle_category(bundle_name: &str) -> String {
    match bundle_name {
        "frontend-team" => "Frontend Team".to_string(),
        "backend-team" => "Backend Team".to_string(),
        "security-team" => "Security Team".to_string(),
        "devops-team" => "DevOps Team".to_string(),
        other => title_case_words(other, '-'),
    }
}

/// Title from a filename: extension dropped, `-`/`_` become spaces, words capitalized
pub fn generate_title(filename: &str) -> String {
    strip_markdown_extension(filename)
        .split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a header date to `YYYY-MM-DD`
///
/// Accepts plain dates and RFC 3339 timestamps. Missing values become today;
/// unparseable values are kept as written.
pub fn normalize_date(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    };

    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return ts.date_naive().format("%Y-%m-%d").to_string();
    }
    if let Ok(ts) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return ts.date().format("%Y-%m-%d").to_string();
    }

    debug!("Keeping unparseable date '{}'", raw);
    raw.to_string()
}

fn title_case_words(text: &str, separator: char) -> String {
    text.split(separator)
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod record_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rule_ref() -> FileRef {
        FileRef {
            title: "Typescript".to_string(),
            filename: "typescript.md".to_string(),
            kind: DocumentKind::Rule,
            category: "language".to_string(),
            display_path: "customizations/rules/language/typescript.md".to_string(),
        }
    }

    #[test]
    fn test_format_category() {
        assert_eq!(format_category("language"), "Languages");
        assert_eq!(format_category("languages"), "Languages");
        assert_eq!(format_category("framework"), "Frameworks & Libraries");
        assert_eq!(format_category("Frameworks & Libraries"), "Frameworks & Libraries");
        assert_eq!(format_category("setup"), "Setup");
        assert_eq!(format_category("some-key"), "Some Key");
        assert_eq!(format_category("CODE-review"), "Code Review");
    }

    #[test]
    fn test_format_bundle_category() {
        assert_eq!(format_bundle_category("devops-team"), "DevOps Team");
        assert_eq!(format_bundle_category("frontend-team"), "Frontend Team");
        assert_eq!(format_bundle_category("data-platform-team"), "Data Platform Team");
    }

    #[test]
    fn test_generate_title() {
        assert_eq!(generate_title("node-project-setup.md"), "Node Project Setup");
        assert_eq!(generate_title("secure_coding"), "Secure Coding");
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date(Some("2024-03-01")), "2024-03-01");
        assert_eq!(normalize_date(Some("2024-03-01T10:00:00Z")), "2024-03-01");
        assert_eq!(normalize_date(Some("last spring")), "last spring");

        let today = normalize_date(None);
        assert_eq!(today.len(), 10);
        assert!(chrono::NaiveDate::parse_from_str(&today, "%Y-%m-%d").is_ok());
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(serde_json::to_string(&DocumentKind::Rule).unwrap(), "\"rules\"");
        assert_eq!(serde_json::to_string(&DocumentKind::Bundle).unwrap(), "\"bundle\"");
        assert_eq!("workflow".parse::<DocumentKind>(), Ok(DocumentKind::Workflow));
        assert!("skill".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn test_build_applies_defaults() {
        let builder = CatalogRecordBuilder::new(Arc::new(PathPolicy::local("")));
        let content = "# TypeScript\n\nStrict typing everywhere.\n";
        let record = builder.build(&rule_ref(), Ok(content.to_string())).unwrap();

        assert_eq!(record.id, "rules-language-typescript");
        assert_eq!(record.category, "Languages");
        assert_eq!(record.labels, Vec::<String>::new());
        assert_eq!(record.author, DEFAULT_AUTHOR);
        assert_eq!(record.activation, DEFAULT_ACTIVATION);
        assert_eq!(record.description, "Strict typing everywhere.");
        assert_eq!(record.filename, "typescript.md");
        assert_eq!(record.source_path, "customizations/rules/language/typescript.md");
        assert!(!record.bundle_reference);
    }

    #[test]
    fn test_build_reads_header() {
        let builder = CatalogRecordBuilder::new(Arc::new(PathPolicy::local("")));
        let content = "---\ntrigger: always_on\nlabels: [TypeScript, Frontend]\nauthor: Platform\ncategory: style\nmodified: 2024-01-15\n---\n\n## Description\nTyped code.\n";
        let record = builder.build(&rule_ref(), Ok(content.to_string())).unwrap();

        assert_eq!(record.labels, vec!["typescript", "frontend"]);
        assert_eq!(record.author, "Platform");
        assert_eq!(record.activation, "always_on");
        assert_eq!(record.category, "Style");
        assert_eq!(record.modified, "2024-01-15");
        assert_eq!(record.description, "Typed code.");
    }

    #[test]
    fn test_build_failed_fetch_is_omitted() {
        let builder = CatalogRecordBuilder::new(Arc::new(PathPolicy::local("")));
        let fetched = Err(FetchError::Status {
            path: "x".to_string(),
            status: 500,
        });
        assert!(builder.build(&rule_ref(), fetched).is_none());
    }

    #[test]
    fn test_build_published_uses_html_extraction() {
        let builder = CatalogRecordBuilder::new(Arc::new(PathPolicy::published(
            "acme", "catalog", "main",
        )));
        let html = "<!-- labels: react, ui -->\n<h1>React</h1>\n<h2>Description</h2>\n<p>Hooks &amp; components.</p>";
        let record = builder.build(&rule_ref(), Ok(html.to_string())).unwrap();

        assert_eq!(record.labels, vec!["react", "ui"]);
        assert_eq!(record.description, "Hooks & components.");
        assert_eq!(
            record.display_path,
            "/catalog/customizations/rules/language/typescript.html"
        );
        assert!(record.source_path.starts_with("https://raw.githubusercontent.com/acme/catalog/main/"));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let builder = CatalogRecordBuilder::new(Arc::new(PathPolicy::local("")));
        let record = builder.build(&rule_ref(), Ok("text".to_string())).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["kind"], "rules");
        assert_eq!(json["bundleReference"], false);
        assert!(json.get("sourcePath").is_some());
        assert!(json.get("bundleDependency").is_none());
    }
}
