//! Contributing a new customization
//!
//! A submission is rendered into the document that would be committed to
//! the catalog repository, along with its path and commit message. With the
//! `http` feature a pre-filled "new file" URL for the repository host can be
//! produced as well.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CatalogError, Result};

/// Activation written for rules that do not name one
pub const DEFAULT_RULE_TRIGGER: &str = "model_decision";

/// What is being submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionCategory {
    Rule,
    Workflow,
}

impl fmt::Display for SubmissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionCategory::Rule => write!(f, "Rule"),
            SubmissionCategory::Workflow => write!(f, "Workflow"),
        }
    }
}

impl FromStr for SubmissionCategory {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rule" => Ok(SubmissionCategory::Rule),
            "workflow" => Ok(SubmissionCategory::Workflow),
            _ => Err(CatalogError::Submission(
                "category must be 'Rule' or 'Workflow'".to_string(),
            )),
        }
    }
}

/// A proposed customization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub title: String,
    pub description: String,
    pub category: SubmissionCategory,
    /// Rule directory (`rules/language`, ...), required for rules
    #[serde(default)]
    pub subcategory: Option<String>,
    pub labels: Vec<String>,
    /// Rule trigger, ignored for workflows
    #[serde(default)]
    pub activation: Option<String>,
    pub content: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub examples: Option<String>,
}

impl Submission {
    /// Check the submission is complete
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() || slugify(&self.title).is_empty() {
            return Err(CatalogError::Submission(
                "title must contain letters or digits".to_string(),
            ));
        }

        if self.category == SubmissionCategory::Rule
            && self
                .subcategory
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .is_empty()
        {
            return Err(CatalogError::Submission(
                "subcategory is required for rules".to_string(),
            ));
        }

        if !self.labels.iter().any(|l| !l.trim().is_empty()) {
            return Err(CatalogError::Submission(
                "at least one label is required".to_string(),
            ));
        }

        if self.content.trim().is_empty() {
            return Err(CatalogError::Submission("content must not be empty".to_string()));
        }

        Ok(())
    }

    /// Repository path of the new document
    pub fn file_path(&self) -> String {
        let filename = format!("{}.md", slugify(&self.title));
        match self.category {
            SubmissionCategory::Rule => format!(
                "customizations/{}/{filename}",
                self.subcategory
                    .as_deref()
                    .unwrap_or_default()
                    .trim()
                    .trim_matches('/')
            ),
            SubmissionCategory::Workflow => format!("customizations/workflows/{filename}"),
        }
    }

    /// Full text of the new document
    pub fn render_document(&self) -> String {
        let mut doc = String::from("---\n");
        if self.category == SubmissionCategory::Rule {
            let trigger = self
                .activation
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .unwrap_or(DEFAULT_RULE_TRIGGER);
            doc.push_str(&format!("trigger: {trigger}\n"));
        }
        doc.push_str(&format!("description: {}\n---\n\n", self.description.trim()));
        doc.push_str(&self.content);

        if let Some(instructions) = self.instructions.as_deref().filter(|s| !s.trim().is_empty()) {
            doc.push_str(&format!("\n\n## Usage Instructions\n\n{instructions}"));
        }
        if let Some(examples) = self.examples.as_deref().filter(|s| !s.trim().is_empty()) {
            doc.push_str(&format!("\n\n## Usage Examples\n\n{examples}"));
        }

        doc
    }

    pub fn commit_message(&self) -> String {
        format!(
            "Add {}: {}\n\nLabels: {}",
            self.category.to_string().to_lowercase(),
            self.title.trim(),
            self.labels.join(", ")
        )
    }

    /// Repository "new file" URL pre-filled with the rendered document
    #[cfg(feature = "http")]
    pub fn contribution_url(&self, owner: &str, repo: &str, branch: &str) -> Result<String> {
        let base = format!("https://github.com/{owner}/{repo}/new/{branch}");
        let document = self.render_document();
        let url = reqwest::Url::parse_with_params(
            &base,
            &[
                ("filename", self.file_path().as_str()),
                ("value", document.as_str()),
                ("message", self.commit_message().as_str()),
            ],
        )
        .map_err(|e| CatalogError::Submission(format!("invalid repository URL: {e}")))?;
        Ok(url.to_string())
    }
}

/// Lowercase alphanumeric runs joined with `-`
pub fn slugify(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod submission_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rule() -> Submission {
        Submission {
            title: "Go Error Handling!".to_string(),
            description: "Wrap errors with context".to_string(),
            category: SubmissionCategory::Rule,
            subcategory: Some("rules/language".to_string()),
            labels: vec!["go".to_string(), "errors".to_string()],
            activation: None,
            content: "# Go Errors\n\nAlways wrap.".to_string(),
            instructions: Some("Enable for Go repos.".to_string()),
            examples: None,
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Go Error Handling!"), "go-error-handling");
        assert_eq!(slugify("  React -- Hooks  "), "react-hooks");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_rule_document() {
        let submission = rule();
        assert!(submission.validate().is_ok());
        assert_eq!(
            submission.file_path(),
            "customizations/rules/language/go-error-handling.md"
        );
        assert_eq!(
            submission.render_document(),
            "---\ntrigger: model_decision\ndescription: Wrap errors with context\n---\n\n# Go Errors\n\nAlways wrap.\n\n## Usage Instructions\n\nEnable for Go repos."
        );
    }

    #[test]
    fn test_workflow_document() {
        let submission = Submission {
            category: SubmissionCategory::Workflow,
            subcategory: None,
            activation: Some("always_on".to_string()),
            instructions: None,
            examples: Some("/release".to_string()),
            ..rule()
        };
        assert!(submission.validate().is_ok());
        assert_eq!(
            submission.file_path(),
            "customizations/workflows/go-error-handling.md"
        );

        let doc = submission.render_document();
        assert!(doc.starts_with("---\ndescription: Wrap errors with context\n---\n\n"));
        assert!(!doc.contains("trigger:"));
        assert!(doc.ends_with("## Usage Examples\n\n/release"));
    }

    #[test]
    fn test_validation_errors() {
        let missing_subcategory = Submission {
            subcategory: None,
            ..rule()
        };
        assert!(missing_subcategory.validate().is_err());

        let no_labels = Submission {
            labels: vec![" ".to_string()],
            ..rule()
        };
        assert!(no_labels.validate().is_err());

        let no_title = Submission {
            title: "??".to_string(),
            ..rule()
        };
        assert!(no_title.validate().is_err());

        assert!("Snippet".parse::<SubmissionCategory>().is_err());
        assert_eq!("rule".parse::<SubmissionCategory>().unwrap(), SubmissionCategory::Rule);
    }

    #[test]
    fn test_commit_message() {
        assert_eq!(
            rule().commit_message(),
            "Add rule: Go Error Handling!\n\nLabels: go, errors"
        );
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_contribution_url() {
        let url = rule()
            .contribution_url("acme", "catalog", "main")
            .unwrap();
        assert!(url.starts_with("https://github.com/acme/catalog/new/main?filename="));
        assert!(url.contains("go-error-handling.md"));
        assert!(!url.contains(' '));
    }
}
