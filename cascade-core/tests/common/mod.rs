//! Shared helpers for catalog integration tests
//!
//! Used through the tests/common/ pattern; not every test file needs every
//! helper.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use cascade_catalog_core::{catalog::Fetcher, FetchError};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// In-memory host keyed by request path, counting requests
pub struct MockFetcher {
    documents: HashMap<String, String>,
    requests: AtomicUsize,
}

impl MockFetcher {
    pub fn new<I, K, V>(documents: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            documents: documents
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn exists(&self, path: &str) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.documents.contains_key(path)
    }

    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                path: path.to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub const TYPESCRIPT_RULE: &str = r#"---
trigger: always_on
description: TypeScript conventions
labels: typescript, Frontend
author: Platform Team
modified: 2024-03-05
---

# TypeScript

<!-- internal note -->

## Description

Strict typing for every TypeScript project.

## Rules

- Enable `strict`.
"#;

pub const SETUP_WORKFLOW: &str = r#"---
description: Set up a Node project
labels: [node, setup]
---

# Node Project Setup

Bootstraps a new Node.js project with linting and tests.
"#;

pub const FRONTEND_MANIFEST: &str = r#"
name: Frontend Team
description: Everything a frontend team needs
version: 1.0.0
labels: [Frontend]
metadata:
  team_size: 5-10
  use_cases:
    - components
dependencies:
  rules:
    - path: language/typescript.md
      activation: model_decision
    - path: windsurf/rules/components.md
    - description: missing path
  workflows:
    - path: workflows/setup/node-project-setup.md
"#;

pub const COMPONENTS_RULE: &str = "---\nlabels: react\n---\n\nKeep components small.\n";

/// Write a small catalog checkout under `root`
///
/// Holds one rule, one workflow and the `frontend-team` bundle with one
/// embedded rule.
pub fn create_catalog_checkout(root: &Path) -> Result<()> {
    let write = |rel: &str, content: &str| -> Result<()> {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    };

    write("customizations/rules/language/typescript.md", TYPESCRIPT_RULE)?;
    write(
        "customizations/workflows/setup/node-project-setup.md",
        SETUP_WORKFLOW,
    )?;
    write("bundles/frontend-team/bundle.yaml", FRONTEND_MANIFEST)?;
    write(
        "bundles/frontend-team/windsurf/rules/components.md",
        COMPONENTS_RULE,
    )?;

    Ok(())
}
