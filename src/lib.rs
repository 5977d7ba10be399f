//! # CRNT Metrics
//!
//! Tracks adoption of a design-system component library by running paired
//! code search queries (legacy pattern vs. new pattern) against a GitLab
//! instance and recording both match counts over time.
//!
//! ## Main Components
//!
//! - [`SearchClient`]: counts matches of a query, walking all result pages
//! - [`QueryRunner`]: runs every [`QueryPair`] on a bounded worker pool
//! - [`ResultStore`]: append-only SQLite log of [`ResultRow`]s
//! - [`report`]: table and chart output
//!
//! ## Example
//!
//! ```no_run
//! use crnt_metrics_lib::{QueryRunner, ResultStore, SearchClient, Settings};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> crnt_metrics_lib::Result<()> {
//!     let settings = Settings::default();
//!     let client = SearchClient::new(&settings.base_url, "my-token")?;
//!
//!     let rows = QueryRunner::new(Arc::new(client))
//!         .with_workers(settings.workers)
//!         .run(&settings.queries)
//!         .await?;
//!
//!     let mut store = ResultStore::open(Path::new("./data/adoption.db"))?;
//!     store.save(&rows)?;
//!     Ok(())
//! }
//! ```

mod args;
pub mod config;
mod domain;
mod error;
pub mod report;
mod runner;
mod search_client;
mod store;

pub use crate::args::{Args, Command};
pub use crate::config::Settings;
pub use crate::domain::{BlobMatch, Project, QueryPair, ResultRow, SearchQuery};
pub use crate::error::{ErrorKind, MetricsError, Result};
pub use crate::runner::{run_timestamp, QueryRunner};
pub use crate::search_client::{CodeSearch, PagePolicy, SearchClient, SearchOutcome};
pub use crate::store::{save_result, Persists, ResultStore};
