//! Document metadata and description extraction
//!
//! Customization documents start with an optional `---` delimited header:
//!
//! ```text
//! ---
//! trigger: always_on
//! description: TypeScript conventions
//! labels: [typescript, frontend]
//! author: Platform Team
//! ---
//! ```
//!
//! When the catalog is published the host serves rendered HTML instead of
//! the raw markdown, so a degraded extraction path reads labels from an HTML
//! comment and descriptions from `<h2>`/`<p>` elements.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::structured_text::{clean_scalar, parse_bracketed_list, Mapping, Value};

/// Maximum description length before the ellipsis is appended
pub const DESCRIPTION_LIMIT: usize = 200;

/// Returned when a document has nothing usable as a description
pub const NO_DESCRIPTION: &str = "No description available";

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)")
        .expect("valid header regex")
});
static HTML_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--(.*?)-->").expect("valid comment regex"));
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```.*?```").expect("valid fence regex"));
static IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]+\)").expect("valid image regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid link regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static HTML_DESCRIPTION_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<h2[^>]*>\s*Description\s*</h2>").expect("valid heading regex")
});
static HTML_ANY_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<h[1-6][^>]*>").expect("valid heading regex"));
static HTML_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p>").expect("valid paragraph regex"));
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag regex"));

/// Header fields the catalog cares about, with defaults not yet applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub labels: Option<Vec<String>>,
    pub author: Option<String>,
    pub activation: Option<String>,
    pub category: Option<String>,
    pub modified: Option<String>,
}

impl DocumentMetadata {
    /// Pick the known fields out of an extracted header
    ///
    /// `activation` falls back to the `trigger` field used by rule documents.
    pub fn from_header(header: &Mapping) -> Self {
        let text = |key: &str| {
            header
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            labels: header.get("labels").map(Value::to_string_list),
            author: text("author"),
            activation: text("activation").or_else(|| text("trigger")),
            category: text("category"),
            modified: text("modified"),
        }
    }
}

/// Extract the leading `---` header block as a flat mapping
///
/// Returns an empty mapping when the document does not start with a header.
/// Only `key: value` pairs are read; a key with an empty value followed by
/// `- item` lines collects those items as a list. `labels` given as a string
/// is split into a list.
pub fn extract_header(content: &str) -> Mapping {
    let Some(block) = split_header(content).0 else {
        return Mapping::new();
    };

    let mut header = Mapping::new();
    let mut open_list: Option<String> = None;

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = trimmed.strip_prefix('-') {
            if let Some(Value::List(items)) = open_list.as_ref().and_then(|k| header.get_mut(k)) {
                items.push(Value::Scalar(clean_scalar(item)));
            }
            continue;
        }

        let Some(colon) = trimmed.find(':').filter(|&i| i > 0) else {
            continue;
        };
        let key = trimmed[..colon].trim().to_string();
        let value = clean_scalar(&trimmed[colon + 1..]);

        if value.is_empty() {
            header.insert(key.clone(), Value::List(Vec::new()));
            open_list = Some(key);
        } else {
            header.insert(key, Value::Scalar(value));
            open_list = None;
        }
    }

    // Keys that opened a list but never received items are plain empty values
    header = header
        .into_iter()
        .map(|(key, value)| match value {
            Value::List(items) if items.is_empty() && key != "labels" => {
                (key, Value::Scalar(String::new()))
            }
            other => (key, other),
        })
        .collect();

    if let Some(Value::Scalar(raw)) = header.get("labels") {
        let labels = split_labels(raw);
        header.insert("labels".to_string(), Value::List(labels));
    }

    debug!("Extracted {} header fields", header.len());
    header
}

/// Best-effort metadata for rendered HTML documents
///
/// Reads the first HTML comment carrying a `labels:` token and comma-splits
/// the remainder of that line. No other fields are recovered.
pub fn extract_header_from_html(content: &str) -> Mapping {
    let mut header = Mapping::new();

    for comment in HTML_COMMENT.captures_iter(content) {
        let body = &comment[1];
        let Some(start) = body.find("labels:") else {
            continue;
        };

        let payload = body[start + "labels:".len()..]
            .lines()
            .next()
            .unwrap_or_default()
            .trim();
        let labels: Vec<Value> = payload
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(clean_label)
            .filter(|label| !label.is_empty())
            .map(Value::Scalar)
            .collect();

        header.insert("labels".to_string(), Value::List(labels));
        break;
    }

    header
}

/// Extract a one-paragraph description of a document
///
/// Markdown documents prefer a `## Description` section, then the first
/// plain line of the body. Rendered HTML prefers an `<h2>Description</h2>`
/// section, then the first paragraph, then the first line of text.
pub fn extract_description(content: &str, rendered_as_html: bool) -> String {
    if rendered_as_html {
        return extract_html_description(content);
    }

    if let Some(section) = description_section(content) {
        let section = CODE_FENCE.replace_all(&section, "");
        let section = clean_inline_markdown(&section);
        let normalized = truncate_description(&section);
        if normalized != NO_DESCRIPTION {
            return normalized;
        }
    }

    let body = HTML_COMMENT.replace_all(split_header(content).1, "");
    let body = CODE_FENCE.replace_all(&body, "");

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("```") {
            continue;
        }

        let cleaned = clean_inline_markdown(trimmed);
        if !cleaned.trim().is_empty() {
            return truncate_description(&cleaned);
        }
    }

    NO_DESCRIPTION.to_string()
}

/// Collapse whitespace and cut to [`DESCRIPTION_LIMIT`] characters plus `...`
pub fn truncate_description(text: &str) -> String {
    let normalized = WHITESPACE.replace_all(text, " ");
    let normalized = normalized.trim();

    if normalized.is_empty() {
        return NO_DESCRIPTION.to_string();
    }

    if normalized.chars().count() > DESCRIPTION_LIMIT {
        let cut: String = normalized.chars().take(DESCRIPTION_LIMIT).collect();
        format!("{cut}...")
    } else {
        normalized.to_string()
    }
}

/// Prepare a document for copying or downloading
///
/// Removes HTML comments and replaces the header with a minimal one that
/// keeps only `trigger` (when present) and `description`. A missing header
/// description is filled with the extracted description.
pub fn strip_metadata(content: &str) -> String {
    let header = extract_header(content);
    let trigger = header
        .get("trigger")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let description = header
        .get("description")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| extract_description(content, false));

    let body = HTML_COMMENT.replace_all(split_header(content).1, "");
    let body = body.trim_start_matches(['\r', '\n']);

    let mut output = String::from("---\n");
    if let Some(trigger) = trigger {
        output.push_str(&format!("trigger: {trigger}\n"));
    }
    output.push_str(&format!("description: {}\n", description.trim()));
    output.push_str("---\n\n");
    output.push_str(body);
    output
}

/// Split a header `labels` string into trimmed, quote-stripped labels
pub fn split_labels(raw: &str) -> Vec<Value> {
    let raw = raw.trim();
    let items = match parse_bracketed_list(raw) {
        Some(items) => items
            .iter()
            .flat_map(Value::to_string_list)
            .collect::<Vec<_>>(),
        None => raw.split(',').map(str::to_string).collect::<Vec<_>>(),
    };

    items
        .iter()
        .map(|label| clean_label(label))
        .filter(|label| !label.is_empty())
        .map(Value::Scalar)
        .collect()
}

/// Split a document into its leading header block (if any) and the body after it
fn split_header(content: &str) -> (Option<&str>, &str) {
    match HEADER.captures(content) {
        Some(caps) => {
            let block = caps.get(1).map_or("", |m| m.as_str());
            let end = caps.get(0).map_or(0, |m| m.end());
            (Some(block), &content[end..])
        }
        None => (None, content),
    }
}

fn clean_label(label: &str) -> String {
    label.trim().replace(['"', '\''], "")
}

/// Body of a `## Description` section up to the next `##`/`###` heading
fn description_section(content: &str) -> Option<String> {
    let mut lines = content.lines();

    lines.by_ref().find(|line| {
        let trimmed = line.trim();
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        hashes >= 2 && trimmed[hashes..].trim().eq_ignore_ascii_case("description")
    })?;

    let section: Vec<&str> = lines
        .take_while(|line| !(line.starts_with("## ") || line.starts_with("### ")))
        .collect();

    Some(section.join("\n"))
}

fn clean_inline_markdown(text: &str) -> String {
    let without_images = IMAGE.replace_all(text, "");
    LINK.replace_all(&without_images, "$1").into_owned()
}

fn extract_html_description(content: &str) -> String {
    if let Some(heading) = HTML_DESCRIPTION_HEADING.find(content) {
        let rest = &content[heading.end()..];
        let section = match HTML_ANY_HEADING.find(rest) {
            Some(next) => &rest[..next.start()],
            None => rest,
        };

        return match HTML_PARAGRAPH.captures(section) {
            Some(paragraph) => truncate_description(&html_to_text(&paragraph[1])),
            None => truncate_description(&html_to_text(section)),
        };
    }

    if let Some(paragraph) = HTML_PARAGRAPH.captures(content) {
        return truncate_description(&html_to_text(&paragraph[1]));
    }

    let plain = html_to_text(content);
    let first_line = plain
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    truncate_description(first_line)
}

/// Text content of an HTML fragment
fn html_to_text(html: &str) -> String {
    let without_comments = HTML_COMMENT.replace_all(html, "");
    let text = HTML_TAG.replace_all(&without_comments, "");
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

#[cfg(test)]
mod metadata_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RULE_DOC: &str = "---\ntrigger: always_on\ndescription: TypeScript rules\nlabels: [typescript, \"frontend\"]\nauthor: Jane\n---\n\n<!-- internal note -->\n# TypeScript\n\nUse strict mode.\n";

    #[test]
    fn test_extract_header_fields() {
        let header = extract_header(RULE_DOC);
        assert_eq!(header["trigger"], Value::Scalar("always_on".into()));
        assert_eq!(header["author"], Value::Scalar("Jane".into()));
        assert_eq!(
            header["labels"].to_string_list(),
            vec!["typescript", "frontend"]
        );
    }

    #[test]
    fn test_extract_header_absent() {
        assert!(extract_header("# Title\n\nBody").is_empty());
        // A header that does not start the document is ignored
        assert!(extract_header("intro\n---\na: b\n---\n").is_empty());
    }

    #[test]
    fn test_labels_comma_separated_and_yaml_list() {
        let header = extract_header("---\nlabels: java, 'backend' , spring\n---\n");
        assert_eq!(
            header["labels"].to_string_list(),
            vec!["java", "backend", "spring"]
        );

        let header = extract_header("---\nlabels:\n  - go\n  - cli\ntitle: x\n---\n");
        assert_eq!(header["labels"].to_string_list(), vec!["go", "cli"]);
        assert_eq!(header["title"], Value::Scalar("x".into()));
    }

    #[test]
    fn test_metadata_from_header_uses_trigger_for_activation() {
        let meta = DocumentMetadata::from_header(&extract_header(RULE_DOC));
        assert_eq!(meta.activation.as_deref(), Some("always_on"));
        assert_eq!(meta.author.as_deref(), Some("Jane"));
        assert!(meta.modified.is_none());
    }

    #[test]
    fn test_extract_header_from_html_comment() {
        let html = "<html><!-- labels: react, hooks , ui --><p>Body</p></html>";
        let header = extract_header_from_html(html);
        assert_eq!(header["labels"].to_string_list(), vec!["react", "hooks", "ui"]);

        assert!(extract_header_from_html("<p>nothing</p>").is_empty());
    }

    #[test]
    fn test_description_section_stops_at_next_heading() {
        let doc = "---\ntitle: X\n---\n\n## Description\n\nHello world.\n\n## Usage\n...";
        assert_eq!(extract_description(doc, false), "Hello world.");
    }

    #[test]
    fn test_description_section_cleans_markdown() {
        let doc = "## Description\n\nSee [the guide](https://x.y) ![logo](img.png)\n```\ncode\n```\nnow.\n### Next\n";
        assert_eq!(extract_description(doc, false), "See the guide now.");
    }

    #[test]
    fn test_description_falls_back_to_first_line() {
        assert_eq!(extract_description(RULE_DOC, false), "Use strict mode.");

        let fenced = "# T\n```rust\nfn main() {}\n```\nAfter fence.\n";
        assert_eq!(extract_description(fenced, false), "After fence.");
    }

    #[test]
    fn test_empty_description_section_falls_back() {
        let doc = "# Title\n\nFirst line.\n\n## Description\n\n## Usage\n";
        assert_eq!(extract_description(doc, false), "First line.");
    }

    #[test]
    fn test_description_truncation() {
        let body = "a".repeat(250);
        let description = extract_description(&body, false);
        assert_eq!(description.chars().count(), 203);
        assert!(description.ends_with("..."));
        assert_eq!(&description[..200], &body[..200]);
    }

    #[test]
    fn test_description_sentinel() {
        assert_eq!(extract_description("", false), NO_DESCRIPTION);
        assert_eq!(extract_description("---\na: b\n---\n# Only heading\n", false), NO_DESCRIPTION);
        assert_eq!(extract_description("<div></div>", true), NO_DESCRIPTION);
    }

    #[test]
    fn test_html_description_preferences() {
        let html = "<h1>T</h1><p>Intro</p><h2 id=\"description\">Description</h2>\n<p>The <em>real</em> one &amp; only.</p><h2>Usage</h2>";
        assert_eq!(extract_description(html, true), "The real one & only.");

        let html = "<h1>T</h1><p>First   paragraph\nhere</p>";
        assert_eq!(extract_description(html, true), "First paragraph here");

        let html = "<div>\n\n  Loose text\nsecond</div>";
        assert_eq!(extract_description(html, true), "Loose text");
    }

    #[test]
    fn test_strip_metadata_keeps_minimal_header() {
        let stripped = strip_metadata(RULE_DOC);
        assert!(!stripped.contains("<!--"));
        assert!(stripped.contains("# TypeScript"));

        let header = extract_header(&stripped);
        let keys: Vec<&str> = header.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["description", "trigger"]);
        assert_eq!(header["description"], Value::Scalar("TypeScript rules".into()));
    }

    #[test]
    fn test_strip_metadata_without_header() {
        let stripped = strip_metadata("# Workflow\n\nRun the steps.\n<!-- x -->\n");
        let header = extract_header(&stripped);
        assert_eq!(header.len(), 1);
        assert_eq!(header["description"], Value::Scalar("Run the steps.".into()));
        assert!(!stripped.contains("<!--"));
    }

    #[test]
    fn test_closing_delimiter_with_trailing_space_keeps_body() {
        let doc = "---\ntrigger: always_on\nauthor: x\n--- \n\nIntro line.\n\n---\n\nMore.\n";

        assert_eq!(extract_header(doc).len(), 2);
        assert_eq!(extract_description(doc, false), "Intro line.");
        assert_eq!(
            strip_metadata(doc),
            "---\ntrigger: always_on\ndescription: Intro line.\n---\n\nIntro line.\n\n---\n\nMore.\n"
        );
    }

    #[test]
    fn test_header_closed_at_end_of_file() {
        let doc = "---\ntrigger: always_on\nauthor: x\n---";

        assert_eq!(extract_header(doc)["author"], Value::Scalar("x".into()));
        assert_eq!(extract_description(doc, false), NO_DESCRIPTION);

        let stripped = strip_metadata(doc);
        assert!(!stripped.contains("author"));
        assert_eq!(
            stripped,
            format!("---\ntrigger: always_on\ndescription: {NO_DESCRIPTION}\n---\n\n")
        );
    }

    #[test]
    fn test_empty_header_block() {
        let doc = "---\n---\nBody text.\n";
        assert!(extract_header(doc).is_empty());
        assert_eq!(extract_description(doc, false), "Body text.");
    }
}
