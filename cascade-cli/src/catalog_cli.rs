//! Catalog CLI commands
//!
//! Every command loads what it needs from the configured source, then
//! prints a table (or JSON with `--json`) to stdout.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{debug, warn};

use cascade_catalog_core::catalog::bundle::lint_manifest_in_checkout;
use cascade_catalog_core::catalog::metadata::strip_metadata;
use cascade_catalog_core::catalog::{
    lint_manifest, BundleEntry, BundleManifest, Catalog, CatalogLoader, CatalogRecord,
    DocumentKind, Fetcher, FsFetcher, KnownFiles, PageLocation, PathPolicy, Submission,
    SubmissionCategory,
};
use cascade_catalog_core::CatalogConfig;

/// Where the catalog is read from, shared by all commands
#[derive(Debug, Clone)]
pub struct SourceArgs {
    pub source: String,
    pub page_url: Option<String>,
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum CatalogSubcommand {
    /// List rules, workflows and bundles
    List {
        /// Only this kind (rules, workflows, bundle)
        #[clap(long)]
        kind: Option<DocumentKind>,

        /// Only records carrying this label
        #[clap(long)]
        label: Option<String>,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Search titles, descriptions and labels
    Search {
        /// Search query (case-insensitive)
        query: String,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show a record's details and its copyable content
    Show {
        /// Record id (e.g. rules-language-typescript)
        id: String,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Save a document with its metadata stripped
    Download {
        /// Record id
        id: String,

        /// Output file (defaults to the record's filename)
        #[clap(long, short)]
        output: Option<PathBuf>,
    },

    /// Print a document with its metadata stripped
    Copy {
        /// Record id
        id: String,
    },

    /// List team bundles
    Bundles {
        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show a bundle and its resolved dependencies
    Bundle {
        /// Bundle directory name (e.g. frontend-team)
        name: String,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Validate a bundle directory before publishing
    LintBundle {
        /// Path to the bundle directory (containing bundle.yaml)
        path: PathBuf,

        /// Catalog checkout to check dependency files against
        #[clap(long)]
        checkout: Option<PathBuf>,
    },

    /// Regenerate the known-files table from a customizations/ directory
    RegenTable {
        /// Path to customizations/
        path: PathBuf,

        /// Write the table here instead of stdout
        #[clap(long, short)]
        output: Option<PathBuf>,
    },

    /// Render a new customization for contribution
    Submit {
        /// Title (also used for the file name)
        #[clap(long)]
        title: String,

        /// One-line description
        #[clap(long)]
        description: String,

        /// Rule or Workflow
        #[clap(long, default_value = "Rule")]
        category: String,

        /// Rule directory, e.g. rules/language (required for rules)
        #[clap(long)]
        subcategory: Option<String>,

        /// Label (repeatable)
        #[clap(long = "label", required = true)]
        labels: Vec<String>,

        /// Rule trigger (defaults to model_decision)
        #[clap(long)]
        activation: Option<String>,

        /// Markdown file with the document body
        #[clap(long)]
        file: PathBuf,

        /// Usage instructions section
        #[clap(long)]
        instructions: Option<String>,

        /// Usage examples section
        #[clap(long)]
        examples: Option<String>,

        /// Print a pre-filled repository URL instead of the document
        #[clap(long)]
        print_url: bool,
    },
}

impl CatalogSubcommand {
    pub async fn execute(self, source: &SourceArgs) -> Result<()> {
        match self {
            CatalogSubcommand::List { kind, label, json } => {
                execute_list(source, kind, label.as_deref(), json).await
            }
            CatalogSubcommand::Search { query, json } => {
                execute_search(source, &query, json).await
            }
            CatalogSubcommand::Show { id, json } => execute_show(source, &id, json).await,
            CatalogSubcommand::Download { id, output } => {
                execute_download(source, &id, output).await
            }
            CatalogSubcommand::Copy { id } => execute_copy(source, &id).await,
            CatalogSubcommand::Bundles { json } => execute_bundles(source, json).await,
            CatalogSubcommand::Bundle { name, json } => {
                execute_bundle(source, &name, json).await
            }
            CatalogSubcommand::LintBundle { path, checkout } => {
                execute_lint_bundle(&path, checkout.as_deref())
            }
            CatalogSubcommand::RegenTable { path, output } => {
                execute_regen_table(&path, output.as_deref())
            }
            CatalogSubcommand::Submit {
                title,
                description,
                category,
                subcategory,
                labels,
                activation,
                file,
                instructions,
                examples,
                print_url,
            } => {
                let content = std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let submission = Submission {
                    title,
                    description,
                    category: category.parse::<SubmissionCategory>()?,
                    subcategory,
                    labels,
                    activation,
                    content,
                    instructions,
                    examples,
                };
                execute_submit(source, &submission, print_url)
            }
        }
    }
}

/// Loaded configuration plus a loader wired to the source
struct Session {
    config: CatalogConfig,
    loader: CatalogLoader,
}

impl Session {
    fn open(args: &SourceArgs) -> Result<Self> {
        let config = load_config(args)?;

        let page = match &args.page_url {
            Some(url) => Some(PageLocation::parse(url)?),
            None if is_url(&args.source) => Some(PageLocation::parse(&args.source)?),
            None => None,
        };
        let policy = Arc::new(PathPolicy::detect(page.as_ref(), &config));

        let fetcher = open_fetcher(&args.source, &config)?;
        if policy.is_published() && !is_url(&args.source) {
            warn!("Published mode with a local source: raw sources will not be readable");
        }
        debug!("Reading catalog via {} fetcher", fetcher.name());

        let loader = CatalogLoader::from_config(&config, fetcher, policy)?;
        Ok(Self { config, loader })
    }

    async fn load(&self) -> Catalog {
        self.loader.load().await
    }

    async fn raw_content(&self, record: &CatalogRecord) -> Result<String> {
        self.loader
            .fetch_source(record)
            .await
            .with_context(|| format!("Failed to fetch {}", record.source_path))
    }

    /// Document text ready to copy or save
    async fn stripped_content(&self, record: &CatalogRecord) -> Result<String> {
        if record.kind == DocumentKind::Bundle {
            bail!("'{}' is a bundle; use `bundle {}`", record.id, record.id);
        }

        Ok(strip_metadata(&self.raw_content(record).await?))
    }

    /// Text to save for a record and the file name it is saved under
    ///
    /// Bundles are saved as their manifest, unstripped.
    async fn download(&self, record: &CatalogRecord) -> Result<(String, String)> {
        if record.kind == DocumentKind::Bundle {
            let name = bundle_name_from_id(&record.id);
            let content = self.raw_content(record).await?;
            return Ok((content, format!("{name}-bundle.yaml")));
        }

        let content = self.stripped_content(record).await?;
        Ok((content, record.filename.clone()))
    }
}

/// Bundle directory name behind a `bundle-<name>` record id
fn bundle_name_from_id(id: &str) -> &str {
    id.strip_prefix("bundle-").unwrap_or(id)
}

fn load_config(args: &SourceArgs) -> Result<CatalogConfig> {
    let config = match &args.config {
        Some(path) => CatalogConfig::load_from_path(path)?,
        None => CatalogConfig::load()?,
    };
    Ok(config)
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(feature = "http")]
fn open_fetcher(source: &str, config: &CatalogConfig) -> Result<Arc<dyn Fetcher>> {
    use cascade_catalog_core::catalog::HttpFetcher;

    if is_url(source) {
        // Relative paths must join under the page directory
        let base = if source.ends_with('/') {
            source.to_string()
        } else {
            format!("{source}/")
        };
        return Ok(Arc::new(HttpFetcher::new(&base, config.request_timeout())?));
    }

    open_fs_fetcher(source)
}

#[cfg(not(feature = "http"))]
fn open_fetcher(source: &str, _config: &CatalogConfig) -> Result<Arc<dyn Fetcher>> {
    if is_url(source) {
        bail!("HTTP sources need the `http` feature. Rebuild with --features http");
    }

    open_fs_fetcher(source)
}

fn open_fs_fetcher(source: &str) -> Result<Arc<dyn Fetcher>> {
    let root = PathBuf::from(source);
    if !root.is_dir() {
        bail!("Catalog source {} is not a directory", root.display());
    }
    Ok(Arc::new(FsFetcher::new(root)))
}

/// Table row for catalog records
#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Activation")]
    activation: String,
    #[tabled(rename = "Labels")]
    labels: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&CatalogRecord> for RecordRow {
    fn from(record: &CatalogRecord) -> Self {
        Self {
            id: record.id.clone(),
            kind: record.kind.to_string(),
            category: record.category.clone(),
            activation: record.activation.clone(),
            labels: record.labels.join(", "),
            description: shorten(&record.description, 50),
        }
    }
}

/// Table row for bundles
#[derive(Tabled)]
struct BundleRow {
    #[tabled(rename = "Bundle")]
    name: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Resolved")]
    resolved: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&BundleEntry> for BundleRow {
    fn from(entry: &BundleEntry) -> Self {
        Self {
            name: entry.manifest.bundle_name.clone(),
            title: entry.manifest.name.clone(),
            version: entry.manifest.version.clone().unwrap_or_else(|| "-".into()),
            resolved: format!(
                "{}/{}",
                entry.dependencies.len(),
                entry.manifest.dependencies.len()
            ),
            description: shorten(&entry.record.description, 50),
        }
    }
}

fn shorten(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max - 3).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn print_table<T: Tabled>(rows: &[T]) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
}

fn print_records(records: &[&CatalogRecord], json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No customizations found.");
        return Ok(());
    }

    println!("Found {} customization(s):\n", records.len());
    let rows: Vec<RecordRow> = records.iter().map(|r| RecordRow::from(*r)).collect();
    print_table(&rows);
    Ok(())
}

async fn execute_list(
    source: &SourceArgs,
    kind: Option<DocumentKind>,
    label: Option<&str>,
    json_output: bool,
) -> Result<()> {
    let session = Session::open(source)?;
    let catalog = session.load().await;

    print_records(&select_records(&catalog, kind, label), json_output)
}

fn select_records<'a>(
    catalog: &'a Catalog,
    kind: Option<DocumentKind>,
    label: Option<&str>,
) -> Vec<&'a CatalogRecord> {
    let mut records: Vec<&CatalogRecord> = match label {
        Some(label) => catalog.filter_by_label(label),
        None => catalog.records.iter().collect(),
    };
    if let Some(kind) = kind {
        records.retain(|r| r.kind == kind);
    }
    records
}

async fn execute_search(source: &SourceArgs, query: &str, json_output: bool) -> Result<()> {
    let session = Session::open(source)?;
    let catalog = session.load().await;

    print_records(&catalog.search(query), json_output)
}

async fn execute_show(source: &SourceArgs, id: &str, json_output: bool) -> Result<()> {
    let session = Session::open(source)?;
    let catalog = session.load().await;

    let record = catalog
        .get(id)
        .with_context(|| format!("No customization with id '{id}'"))?;

    if record.kind == DocumentKind::Bundle {
        let name = bundle_name_from_id(id);
        let entry = catalog
            .bundle(name)
            .with_context(|| format!("Bundle '{name}' not loaded"))?;
        return print_bundle(entry, json_output);
    }

    let content = session.stripped_content(record).await?;

    if json_output {
        let output = serde_json::json!({
            "record": record,
            "content": content,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", record.title);
    println!("ID:         {}", record.id);
    println!("Kind:       {}", record.kind);
    println!("Category:   {}", record.category);
    println!("Author:     {}", record.author);
    println!("Activation: {}", record.activation);
    println!("Modified:   {}", record.modified);
    if !record.labels.is_empty() {
        println!("Labels:     {}", record.labels.join(", "));
    }
    if let Some(dependency) = &record.bundle_dependency {
        println!("Bundle dep: {}", dependency.path);
    }
    println!("Source:     {}", record.source_path);
    println!();
    println!("Description:");
    println!("  {}", record.description);
    println!();
    println!("{content}");

    Ok(())
}

async fn execute_download(source: &SourceArgs, id: &str, output: Option<PathBuf>) -> Result<()> {
    let session = Session::open(source)?;
    let catalog = session.load().await;

    let record = catalog
        .get(id)
        .with_context(|| format!("No customization with id '{id}'"))?;
    let (content, filename) = session.download(record).await?;

    let output = output.unwrap_or_else(|| PathBuf::from(filename));
    std::fs::write(&output, content)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Saved {} to {}", record.id, output.display());
    Ok(())
}

async fn execute_copy(source: &SourceArgs, id: &str) -> Result<()> {
    let session = Session::open(source)?;
    let catalog = session.load().await;

    let record = catalog
        .get(id)
        .with_context(|| format!("No customization with id '{id}'"))?;
    print!("{}", session.stripped_content(record).await?);
    Ok(())
}

async fn execute_bundles(source: &SourceArgs, json_output: bool) -> Result<()> {
    let session = Session::open(source)?;
    let catalog = session.load().await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&catalog.bundles)?);
        return Ok(());
    }

    if catalog.bundles.is_empty() {
        println!(
            "No bundles found (looked for: {}).",
            session.config.bundles.join(", ")
        );
        return Ok(());
    }

    let rows: Vec<BundleRow> = catalog.bundles.iter().map(BundleRow::from).collect();
    print_table(&rows);
    Ok(())
}

async fn execute_bundle(source: &SourceArgs, name: &str, json_output: bool) -> Result<()> {
    let session = Session::open(source)?;
    let entry = session
        .loader
        .load_bundle(name)
        .await
        .with_context(|| format!("Bundle '{name}' not found"))?;

    print_bundle(&entry, json_output)
}

fn print_bundle(entry: &BundleEntry, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(entry)?);
        return Ok(());
    }

    let manifest = &entry.manifest;
    println!("Bundle:    {} ({})", manifest.name, manifest.bundle_name);
    if let Some(version) = &manifest.version {
        println!("Version:   {version}");
    }
    println!(
        "Team size: {}",
        manifest
            .metadata
            .team_size
            .as_deref()
            .unwrap_or("Not specified")
    );
    if !manifest.metadata.use_cases.is_empty() {
        println!("Use cases: {}", manifest.metadata.use_cases.join(", "));
    }
    println!();
    println!("{}", entry.record.description);
    println!();

    let rows: Vec<RecordRow> = entry.dependencies.iter().map(RecordRow::from).collect();
    if rows.is_empty() {
        println!("No dependencies resolved.");
    } else {
        print_table(&rows);
    }

    for skipped in &entry.skipped {
        println!(
            "Skipped {}[{}]: {}",
            skipped.list.dir_name(),
            skipped.index,
            skipped.reason
        );
    }

    Ok(())
}

fn execute_lint_bundle(path: &Path, checkout: Option<&Path>) -> Result<()> {
    println!("Validating bundle at {path:?}...\n");

    let manifest_path = path.join("bundle.yaml");
    let text = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;

    let bundle_name = path
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .context("Could not determine bundle name from path")?;

    let manifest = BundleManifest::parse(&bundle_name, &manifest_path.display().to_string(), &text)
        .context("bundle.yaml is empty")?;

    let report = match checkout {
        Some(root) => lint_manifest_in_checkout(&manifest, root),
        None => lint_manifest(&manifest),
    };

    print_validation_results(&report.errors, &report.warnings);

    if !report.is_ok() {
        bail!("Bundle '{bundle_name}' failed validation");
    }
    Ok(())
}

fn print_validation_results(errors: &[String], warnings: &[String]) {
    if errors.is_empty() && warnings.is_empty() {
        println!("Bundle is valid.");
        return;
    }

    for error in errors {
        println!("ERROR: {error}");
    }

    for warning in warnings {
        println!("WARNING: {warning}");
    }

    println!();
    if errors.is_empty() {
        println!("Validation passed with {} warning(s).", warnings.len());
    } else {
        println!(
            "Validation failed with {} error(s) and {} warning(s).",
            errors.len(),
            warnings.len()
        );
    }
}

fn execute_regen_table(path: &Path, output: Option<&Path>) -> Result<()> {
    let known = KnownFiles::scan_directory(path)?;
    let yaml = known.to_yaml()?;

    match output {
        Some(output) => {
            std::fs::write(output, yaml)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Wrote {} documents to {} (set known_files in config to use it)",
                known.len(),
                output.display()
            );
        }
        None => print!("{yaml}"),
    }
    Ok(())
}

fn execute_submit(source: &SourceArgs, submission: &Submission, print_url: bool) -> Result<()> {
    submission.validate()?;

    if print_url {
        return print_contribution_url(source, submission);
    }

    println!("File:    {}", submission.file_path());
    println!("Commit:  {}", submission.commit_message().replace('\n', "\n         "));
    println!();
    print!("{}", submission.render_document());
    Ok(())
}

#[cfg(feature = "http")]
fn print_contribution_url(source: &SourceArgs, submission: &Submission) -> Result<()> {
    let config = load_config(source)?;
    let url = submission.contribution_url(
        &config.default_owner,
        &config.default_repo,
        &config.branch,
    )?;
    println!("{url}");
    Ok(())
}

#[cfg(not(feature = "http"))]
fn print_contribution_url(_source: &SourceArgs, _submission: &Submission) -> Result<()> {
    bail!("Contribution URLs need the `http` feature. Rebuild with --features http")
}
