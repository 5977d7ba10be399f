//! In-process stand-in for the GitLab blob search endpoint.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TOKEN: &str = "test-token";

/// Canned answer for one search string.
#[derive(Debug, Clone, Default)]
pub struct MockQuery {
    /// Number of matches on each page; the length is the page count.
    pub pages: Vec<usize>,
    /// Pages answered with a 500.
    pub fail_pages: Vec<u32>,
    /// Leave out the x-total-pages header.
    pub omit_total_pages: bool,
}

impl MockQuery {
    pub fn pages(pages: &[usize]) -> Self {
        Self {
            pages: pages.to_vec(),
            ..Self::default()
        }
    }

    pub fn failing(mut self, page: u32) -> Self {
        self.fail_pages.push(page);
        self
    }
}

#[derive(Default)]
pub struct MockSearchApi {
    queries: HashMap<String, MockQuery>,
    pub requests: AtomicUsize,
}

impl MockSearchApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, search: &str, query: MockQuery) -> Self {
        self.queries.insert(search.to_string(), query);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Serve the mock on an ephemeral port and return its base URL.
pub async fn spawn(api: MockSearchApi) -> (String, Arc<MockSearchApi>) {
    let api = Arc::new(api);
    let app = Router::new()
        .route("/projects/{id}/search", get(project_search))
        .route("/search", get(global_search))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), api)
}

/// A base URL nothing listens on.
pub fn dead_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

async fn project_search(
    State(api): State<Arc<MockSearchApi>>,
    Path(project_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    answer(&api, project_id, &params, &headers)
}

async fn global_search(
    State(api): State<Arc<MockSearchApi>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    answer(&api, 1, &params, &headers)
}

fn answer(
    api: &MockSearchApi,
    project_id: i64,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Response {
    api.requests.fetch_add(1, Ordering::SeqCst);

    let token = headers.get("PRIVATE-TOKEN").and_then(|v| v.to_str().ok());
    if token != Some(TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if params.get("scope").map(String::as_str) != Some("blobs") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let Some(query) = params.get("search").and_then(|s| api.queries.get(s)) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let page: u32 = params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    if query.fail_pages.contains(&page) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let count = query
        .pages
        .get(page.saturating_sub(1) as usize)
        .copied()
        .unwrap_or(0);
    let blobs: Vec<Value> = (0..count)
        .map(|i| {
            let path = format!("src/page{}/file{}.html", page, i);
            json!({
                "basename": format!("file{}", i),
                "data": "<i class=\"fa-icon\"></i>",
                "path": path,
                "filename": path,
                "id": null,
                "ref": "main",
                "startline": i + 1,
                "project_id": project_id,
            })
        })
        .collect();

    if query.omit_total_pages {
        return Json(blobs).into_response();
    }
    (
        [("x-total-pages", query.pages.len().to_string())],
        Json(blobs),
    )
        .into_response()
}
