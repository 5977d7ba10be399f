use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use tracing::{debug, warn};

use crate::domain::{BlobMatch, SearchQuery};
use crate::error::{MetricsError, Result};

/// Response header carrying the number of result pages.
pub const TOTAL_PAGES_HEADER: &str = "x-total-pages";
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// What to do when a page after the first one fails.
///
/// The first page always aborts the call on failure, since the page count
/// comes from its headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagePolicy {
    /// Any failed page aborts the whole call.
    #[default]
    Strict,
    /// Failed secondary pages are skipped and reported in
    /// [`SearchOutcome::skipped_pages`].
    ///
    /// [`CodeSearch::count`] only returns a number, so a count built from a
    /// skipped page is an undercount that reaches the stored [`ResultRow`]
    /// unmarked; the only trace is a `warn` log line. Use
    /// [`SearchClient::search_all`] to see which pages were skipped.
    ///
    /// [`ResultRow`]: crate::ResultRow
    Lenient,
}

/// Anything that can count the matches of a query.
pub trait CodeSearch {
    /// Total number of matches across all pages.
    fn count(&self, query: &SearchQuery) -> impl Future<Output = Result<i64>> + Send;
}

/// All matches collected for one query, with paging metadata.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub matches: Vec<BlobMatch>,
    pub total_pages: u32,
    pub skipped_pages: Vec<u32>,
}

impl SearchOutcome {
    /// True when no page was skipped.
    pub fn is_complete(&self) -> bool {
        self.skipped_pages.is_empty()
    }
}

struct Page {
    matches: Vec<BlobMatch>,
    headers: HeaderMap,
}

/// Client for the blob search endpoint of a GitLab-compatible API.
#[derive(Clone)]
pub struct SearchClient {
    client: Client,
    base_url: String,
    token: String,
    page_policy: PagePolicy,
}

impl SearchClient {
    /// Create a client for the API at `base_url`, authenticating with `token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(MetricsError::Configuration(
                "search API token is required".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("crnt-metrics/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            page_policy: PagePolicy::default(),
        })
    }

    /// Set how failures on pages after the first are handled.
    pub fn with_page_policy(mut self, policy: PagePolicy) -> Self {
        self.page_policy = policy;
        self
    }

    /// Fetch every page of results for a query, in page order.
    pub async fn search_all(&self, query: &SearchQuery) -> Result<SearchOutcome> {
        let dsl = query.to_dsl()?;
        let url = self.search_url(query);

        let first = self.search_page(&url, &dsl, None).await?;
        let total_pages = total_pages(&first.headers)?;
        debug!(query = %query, page = 1, total_pages, "fetched page");

        let mut outcome = SearchOutcome {
            matches: first.matches,
            total_pages,
            skipped_pages: Vec::new(),
        };

        for page in 2..=total_pages {
            match self.search_page(&url, &dsl, Some(page)).await {
                Ok(next) => {
                    debug!(query = %query, page, total_pages, "fetched page");
                    outcome.matches.extend(next.matches);
                }
                Err(e) if self.page_policy == PagePolicy::Lenient => {
                    warn!(
                        query = %query,
                        page,
                        total_pages,
                        "error fetching page: {}, skipping",
                        e
                    );
                    outcome.skipped_pages.push(page);
                }
                Err(e) => {
                    return Err(e);
                }
            }
        }

        if !outcome.is_complete() {
            warn!(
                query = %query,
                skipped = ?outcome.skipped_pages,
                "result set is incomplete"
            );
        }

        Ok(outcome)
    }

    /// Project-scoped endpoint when the query has a project, global otherwise.
    fn search_url(&self, query: &SearchQuery) -> String {
        match query.project_id {
            Some(id) if id > 0 => format!("{}/projects/{}/search", self.base_url, id),
            _ => format!("{}/search", self.base_url),
        }
    }

    /// Request a single page. `None` requests the first page without a
    /// `page` parameter.
    async fn search_page(&self, url: &str, dsl: &str, page: Option<u32>) -> Result<Page> {
        let mut request = self
            .client
            .get(url)
            .header(TOKEN_HEADER, &self.token)
            .query(&[("scope", "blobs"), ("search", dsl)]);
        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }

        debug!("Requesting URL: {} page {:?}", url, page);
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetricsError::Decode(format!(
                "API error: {} on page {}",
                status,
                page.unwrap_or(1)
            )));
        }

        let headers = response.headers().clone();
        let body = response.text().await?;
        let matches: Vec<BlobMatch> = serde_json::from_str(&body).map_err(|e| {
            MetricsError::Decode(format!(
                "error parsing page {}: {}",
                page.unwrap_or(1),
                e
            ))
        })?;

        Ok(Page { matches, headers })
    }
}

impl CodeSearch for SearchClient {
    async fn count(&self, query: &SearchQuery) -> Result<i64> {
        let outcome = self.search_all(query).await?;
        Ok(outcome.matches.len() as i64)
    }
}

fn total_pages(headers: &HeaderMap) -> Result<u32> {
    let value = headers.get(TOTAL_PAGES_HEADER).ok_or_else(|| {
        MetricsError::Protocol(format!(
            "missing {} header, are there more than 10.000 results?",
            TOTAL_PAGES_HEADER
        ))
    })?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .ok_or_else(|| {
            MetricsError::Protocol(format!(
                "unparseable {} header: {:?}",
                TOTAL_PAGES_HEADER, value
            ))
        })
}
