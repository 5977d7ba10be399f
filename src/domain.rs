use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

use crate::error::{MetricsError, Result};

/// A project known by name, used to label report rows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// A named pair of search queries (legacy pattern vs. replacement pattern)
/// scoped to a single project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryPair {
    pub name: String,
    pub project_id: i64,
    #[serde(alias = "old")]
    pub old_query: String,
    #[serde(alias = "new", alias = "crnt")]
    pub new_query: String,
    /// Optional file extension filter applied to both queries.
    #[serde(default)]
    pub extension: Option<String>,
}

impl QueryPair {
    pub fn new(
        name: impl Into<String>,
        project_id: i64,
        old_query: impl Into<String>,
        new_query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            project_id,
            old_query: old_query.into(),
            new_query: new_query.into(),
            extension: None,
        }
    }

    pub fn old_search(&self) -> SearchQuery {
        self.search_for(&self.old_query)
    }

    pub fn new_search(&self) -> SearchQuery {
        self.search_for(&self.new_query)
    }

    fn search_for(&self, query: &str) -> SearchQuery {
        SearchQuery {
            query: query.to_string(),
            extension: self.extension.clone(),
            project_id: Some(self.project_id),
        }
    }
}

/// One persisted observation: both counts for a [`QueryPair`] at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub timestamp: DateTime<Utc>,
    pub project_id: i64,
    pub query_name: String,
    pub old_count: i64,
    pub new_count: i64,
}

/// A single search call. The query string is passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub extension: Option<String>,
    /// Limit the search to a single project.
    pub project_id: Option<i64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            extension: None,
            project_id: None,
        }
    }

    pub fn in_project(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Build the DSL string sent as the `search` parameter.
    pub fn to_dsl(&self) -> Result<String> {
        if self.query.trim().is_empty() {
            return Err(MetricsError::Configuration(
                "no search query passed".to_string(),
            ));
        }

        Ok(match self.extension.as_deref() {
            Some(ext) if !ext.is_empty() => format!("{} extension:{}", self.query, ext),
            _ => self.query.clone(),
        })
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.query)?;
        if let Some(ext) = &self.extension {
            write!(f, " extension: '{}'", ext)?;
        }
        if let Some(id) = self.project_id {
            write!(f, " projectId: {}", id)?;
        }
        Ok(())
    }
}

/// A blob match returned by the search API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlobMatch {
    pub project_id: i64,
    pub path: String,
    #[serde(default, rename = "startline")]
    pub start_line: i64,
    #[serde(default, rename = "data")]
    pub snippet: String,
}
