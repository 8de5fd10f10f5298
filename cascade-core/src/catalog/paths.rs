//! Deployment-aware path construction
//!
//! The catalog is served in one of two ways:
//!
//! - **Local**: raw markdown served from a checkout. Display and source
//!   paths are the same relative `.md` file.
//! - **Published**: a static site (GitHub Pages) that renders markdown to
//!   HTML. Display paths point at the rendered `.html` under the site root,
//!   source paths at the raw file on `raw.githubusercontent.com`.
//!
//! The mode is chosen once from the page location and injected into every
//! component that needs a path. Nothing else builds paths by hand.

use serde::Serialize;
use tracing::debug;

use super::record::DocumentKind;
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};

/// Host serving raw repository content in published mode
pub const RAW_CONTENT_HOST: &str = "https://raw.githubusercontent.com";

/// Root directory of shared customizations
const CUSTOMIZATIONS_DIR: &str = "customizations";

/// Root directory of bundles
const BUNDLES_DIR: &str = "bundles";

/// Directory inside a bundle holding its embedded documents
const EMBEDDED_DIR: &str = "windsurf";

/// Hostname and path of the page the catalog is viewed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    pub hostname: String,
    pub pathname: String,
}

impl PageLocation {
    /// Parse a page URL such as `https://owner.github.io/repo/index.html`
    pub fn parse(url: &str) -> Result<Self> {
        let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
        let without_fragment = without_scheme
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        let (authority, path) = match without_fragment.find('/') {
            Some(i) => (&without_fragment[..i], &without_fragment[i..]),
            None => (without_fragment, "/"),
        };

        let hostname = authority
            .rsplit('@')
            .next()
            .unwrap_or_default()
            .split(':')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if hostname.is_empty() {
            return Err(CatalogError::PageLocation(format!(
                "no hostname in '{url}'"
            )));
        }

        Ok(Self {
            hostname,
            pathname: path.to_string(),
        })
    }

    /// Non-empty path segments of the page
    fn segments(&self) -> impl Iterator<Item = &str> {
        self.pathname.split('/').filter(|s| !s.is_empty())
    }
}

/// How documents are addressed on the current host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Raw markdown relative to `root`
    Local { root: String },
    /// Rendered HTML under `/{repo}`, raw sources from the repository
    Published {
        site_root: String,
        owner: String,
        repo: String,
        branch: String,
    },
}

/// Source and display location of one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPaths {
    /// Canonical raw-content location (what gets copied or downloaded)
    pub source_path: String,
    /// Location fetched for previewing and metadata extraction
    pub display_path: String,
}

/// Path construction for one deployment mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPolicy {
    mode: DeploymentMode,
}

impl PathPolicy {
    pub fn new(mode: DeploymentMode) -> Self {
        Self { mode }
    }

    /// Local mode rooted at `root` (empty for paths relative to the catalog root)
    pub fn local(root: impl Into<String>) -> Self {
        Self::new(DeploymentMode::Local {
            root: root.into().trim_end_matches('/').to_string(),
        })
    }

    /// Published mode for `owner/repo` on `branch`
    pub fn published(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        let repo = repo.into();
        Self::new(DeploymentMode::Published {
            site_root: format!("/{repo}"),
            owner: owner.into(),
            repo,
            branch: branch.into(),
        })
    }

    /// Select the mode from the page the catalog is viewed from
    ///
    /// A hostname ending in the configured hosting suffix means published
    /// mode; the owner is the first hostname label and the repository the
    /// first path segment. Anything else (or no page at all) is local mode.
    pub fn detect(page: Option<&PageLocation>, config: &CatalogConfig) -> Self {
        let published = page.filter(|p| p.hostname.ends_with(&config.hosting_suffix));

        let policy = match published {
            Some(page) => {
                let owner = page
                    .hostname
                    .split('.')
                    .next()
                    .filter(|s| !s.is_empty())
                    .unwrap_or(config.default_owner.as_str());
                let repo = page.segments().next().unwrap_or(config.default_repo.as_str());
                Self::published(owner, repo, &config.branch)
            }
            None => Self::local(&config.local_root),
        };

        debug!("Selected deployment mode: {:?}", policy.mode);
        policy
    }

    pub fn mode(&self) -> &DeploymentMode {
        &self.mode
    }

    pub fn is_published(&self) -> bool {
        matches!(self.mode, DeploymentMode::Published { .. })
    }

    /// Whether display paths serve rendered HTML instead of markdown
    pub fn renders_html(&self) -> bool {
        self.is_published()
    }

    /// Extension of documents at their display path
    pub fn file_extension(&self) -> &'static str {
        if self.renders_html() {
            ".html"
        } else {
            ".md"
        }
    }

    /// Base that relative repository paths hang from
    ///
    /// `/{repo}` when published, the configured root when local.
    pub fn base_path(&self) -> String {
        match &self.mode {
            DeploymentMode::Local { root } => root.clone(),
            DeploymentMode::Published { site_root, .. } => site_root.clone(),
        }
    }

    /// Raw-content URL (published) or local path for a repository-relative path
    pub fn raw_url(&self, rel_path: &str) -> String {
        match &self.mode {
            DeploymentMode::Local { .. } => self.under_base(rel_path),
            DeploymentMode::Published {
                owner,
                repo,
                branch,
                ..
            } => format!("{RAW_CONTENT_HOST}/{owner}/{repo}/{branch}/{rel_path}"),
        }
    }

    /// Paths of a shared rule or workflow document
    ///
    /// `filename` may be given with or without its `.md` extension.
    pub fn resolve(&self, kind: DocumentKind, category: &str, filename: &str) -> ResolvedPaths {
        if kind == DocumentKind::Bundle {
            let rel = format!("{BUNDLES_DIR}/{category}/{filename}");
            return ResolvedPaths {
                source_path: self.raw_url(&rel),
                display_path: self.under_base(&rel),
            };
        }

        let dir = format!("{CUSTOMIZATIONS_DIR}/{}/{category}", kind.dir_name());
        self.resolve_in(&dir, filename)
    }

    /// Paths of a document embedded in a bundle (`windsurf/{subtype}/{filename}`)
    pub fn resolve_embedded(&self, bundle: &str, subtype: &str, filename: &str) -> ResolvedPaths {
        let dir = format!("{BUNDLES_DIR}/{bundle}/{EMBEDDED_DIR}/{subtype}");
        self.resolve_in(&dir, filename)
    }

    /// Location of a bundle's `bundle.yaml`
    pub fn manifest_path(&self, bundle: &str) -> String {
        self.under_base(&format!("{BUNDLES_DIR}/{bundle}/bundle.yaml"))
    }

    fn resolve_in(&self, dir: &str, filename: &str) -> ResolvedPaths {
        let base_name = strip_markdown_extension(filename);
        let display_path = self.under_base(&format!(
            "{dir}/{base_name}{}",
            self.file_extension()
        ));
        let source_path = self.raw_url(&format!("{dir}/{base_name}.md"));

        ResolvedPaths {
            source_path,
            display_path,
        }
    }

    fn under_base(&self, rel_path: &str) -> String {
        let base = self.base_path();
        if base.is_empty() {
            rel_path.to_string()
        } else {
            format!("{base}/{rel_path}")
        }
    }
}

/// Drop a trailing `.md` (any case) from a filename
pub fn strip_markdown_extension(filename: &str) -> &str {
    let len = filename.len();
    if len >= 3 && filename.is_char_boundary(len - 3) && filename[len - 3..].eq_ignore_ascii_case(".md")
    {
        &filename[..len - 3]
    } else {
        filename
    }
}

#[cfg(test)]
mod paths_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn published() -> PathPolicy {
        PathPolicy::published("windsurf-samples", "cascade-customizations-catalog", "main")
    }

    #[test]
    fn test_parse_page_location() {
        let page =
            PageLocation::parse("https://Owner.github.io/my-repo/index.html?x=1#top").unwrap();
        assert_eq!(page.hostname, "owner.github.io");
        assert_eq!(page.pathname, "/my-repo/index.html");

        let page = PageLocation::parse("http://localhost:8000").unwrap();
        assert_eq!(page.hostname, "localhost");
        assert_eq!(page.pathname, "/");

        assert!(PageLocation::parse("https:///nohost").is_err());
    }

    #[test]
    fn test_detect_published_mode() {
        let config = CatalogConfig::default();
        let page = PageLocation::parse("https://acme.github.io/rules-catalog/web-ui/").unwrap();
        let policy = PathPolicy::detect(Some(&page), &config);

        assert_eq!(
            policy.mode(),
            &DeploymentMode::Published {
                site_root: "/rules-catalog".into(),
                owner: "acme".into(),
                repo: "rules-catalog".into(),
                branch: "main".into(),
            }
        );
    }

    #[test]
    fn test_detect_published_defaults_repo() {
        let config = CatalogConfig::default();
        let page = PageLocation::parse("https://acme.github.io/").unwrap();
        let policy = PathPolicy::detect(Some(&page), &config);
        assert_eq!(policy.base_path(), format!("/{}", config.default_repo));
    }

    #[test]
    fn test_detect_local_mode() {
        let config = CatalogConfig::default();
        let page = PageLocation::parse("http://localhost:8000/web-ui/").unwrap();
        assert!(!PathPolicy::detect(Some(&page), &config).is_published());
        assert!(!PathPolicy::detect(None, &config).is_published());
    }

    #[test]
    fn test_resolve_local() {
        let policy = PathPolicy::local("..");
        let paths = policy.resolve(DocumentKind::Rule, "language", "typescript.md");
        assert_eq!(paths.display_path, "../customizations/rules/language/typescript.md");
        assert_eq!(paths.source_path, paths.display_path);

        let paths = PathPolicy::local("").resolve(DocumentKind::Workflow, "setup", "node-setup");
        assert_eq!(paths.display_path, "customizations/workflows/setup/node-setup.md");
    }

    #[test]
    fn test_resolve_published() {
        let paths = published().resolve(DocumentKind::Rule, "language", "typescript.md");
        assert_eq!(
            paths.display_path,
            "/cascade-customizations-catalog/customizations/rules/language/typescript.html"
        );
        assert_eq!(
            paths.source_path,
            "https://raw.githubusercontent.com/windsurf-samples/cascade-customizations-catalog/main/customizations/rules/language/typescript.md"
        );
    }

    #[test]
    fn test_resolve_embedded_both_modes() {
        let local = PathPolicy::local("").resolve_embedded("frontend-team", "rules", "a11y.md");
        assert_eq!(local.display_path, "bundles/frontend-team/windsurf/rules/a11y.md");
        assert_eq!(local.source_path, local.display_path);

        let remote = published().resolve_embedded("frontend-team", "rules", "a11y.md");
        assert_eq!(
            remote.display_path,
            "/cascade-customizations-catalog/bundles/frontend-team/windsurf/rules/a11y.html"
        );
        assert!(remote
            .source_path
            .ends_with("/main/bundles/frontend-team/windsurf/rules/a11y.md"));
    }

    #[test]
    fn test_manifest_path() {
        assert_eq!(
            PathPolicy::local("..").manifest_path("devops-team"),
            "../bundles/devops-team/bundle.yaml"
        );
        assert_eq!(
            published().manifest_path("devops-team"),
            "/cascade-customizations-catalog/bundles/devops-team/bundle.yaml"
        );
    }

    #[test]
    fn test_strip_markdown_extension() {
        assert_eq!(strip_markdown_extension("react.md"), "react");
        assert_eq!(strip_markdown_extension("README.MD"), "README");
        assert_eq!(strip_markdown_extension("plain"), "plain");
    }
}
