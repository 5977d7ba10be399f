//! Run settings: API location, worker pool size, page policy, project
//! labels and the query pairs to execute.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::domain::{Project, QueryPair};
use crate::error::{MetricsError, Result};
use crate::search_client::PagePolicy;

pub const DEFAULT_BASE_URL: &str = "https://gitlab.essent.nl/api/v4";
pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_DATABASE_PATH: &str = "./data/adoption.db";
pub const TOKEN_ENV_VAR: &str = "PRIVATE_TOKEN";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub workers: usize,
    pub page_policy: PagePolicy,
    pub projects: Vec<Project>,
    pub queries: Vec<QueryPair>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            workers: DEFAULT_WORKERS,
            page_policy: PagePolicy::default(),
            projects: vec![Project {
                id: 62,
                name: "Sitecore plus / Frontend".to_string(),
            }],
            queries: default_query_pairs(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. Keys that are absent keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MetricsError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(MetricsError::Configuration(
                "worker count must be at least 1".to_string(),
            ));
        }
        validate_pairs(&self.queries)
    }

    /// Display name for a project, falling back to its numeric id.
    pub fn project_name(&self, project_id: i64) -> String {
        self.projects
            .iter()
            .find(|p| p.id == project_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| project_id.to_string())
    }
}

/// Reject pair lists with blank or duplicate names, or blank queries.
pub fn validate_pairs(pairs: &[QueryPair]) -> Result<()> {
    let mut seen = HashSet::new();
    for pair in pairs {
        if pair.name.trim().is_empty() {
            return Err(MetricsError::Configuration(
                "query pair with an empty name".to_string(),
            ));
        }
        if !seen.insert(pair.name.as_str()) {
            return Err(MetricsError::Configuration(format!(
                "duplicate query pair name '{}'",
                pair.name
            )));
        }
        if pair.old_query.trim().is_empty() || pair.new_query.trim().is_empty() {
            return Err(MetricsError::Configuration(format!(
                "query pair '{}' has an empty query",
                pair.name
            )));
        }
    }
    Ok(())
}

/// Pick the access token from an explicit value or the environment value.
/// Blank values count as missing.
pub fn resolve_token(explicit: Option<&str>, from_env: Option<String>) -> Result<String> {
    match explicit {
        Some(t) if !t.trim().is_empty() => Ok(t.to_string()),
        _ => match from_env {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(MetricsError::Configuration(format!(
                "GitLab access token not set in environment variable {}",
                TOKEN_ENV_VAR
            ))),
        },
    }
}

fn default_query_pairs() -> Vec<QueryPair> {
    vec![
        QueryPair::new(
            "primary-button",
            62,
            r#"class=\"btn btn-primary extension:html"#,
            r#"("crnt-button" | "crnt-button-alt") variant=\"primary\" extension:html"#,
        ),
        // one use case sets the button type dynamically
        QueryPair::new(
            "secondary-button",
            62,
            r#"class=\""btn btn-secondary" extension:html"#,
            r#"("crnt-button" | "crnt-button-alt") variant=\"secondary\" extension:html"#,
        ),
        QueryPair::new(
            "tertiary-button",
            62,
            r#"class=\""btn btn-link" extension:html"#,
            r#"("crnt-button" | "crnt-button-alt") variant=\"tertiary\" extension:html"#,
        ),
        QueryPair::new(
            "fa-icon",
            62,
            r#""fa-icon" extension:html"#,
            r#""<crnt-icon" -"crnt-icon-button" extension:html"#,
        ),
    ]
}
