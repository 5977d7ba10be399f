//! Full update flow: run query pairs against a mock search API, then persist.

mod common;

use common::{MockQuery, MockSearchApi, TOKEN};
use crnt_metrics_lib::{
    run_timestamp, ErrorKind, QueryPair, QueryRunner, ResultRow, ResultStore, SearchClient,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn client_for(api: MockSearchApi) -> Arc<SearchClient> {
    let (base_url, _api) = common::spawn(api).await;
    Arc::new(SearchClient::new(base_url, TOKEN).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn icon_counts_are_persisted_and_reloaded() {
    let client = client_for(
        MockSearchApi::new()
            .with_query("fa-icon", MockQuery::pages(&[10, 2]))
            .with_query("crnt-icon", MockQuery::pages(&[3])),
    )
    .await;
    let pairs = vec![QueryPair::new("icon", 62, "fa-icon", "crnt-icon")];

    let rows = QueryRunner::new(client).run(&pairs).await.unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("adoption.db");
    let mut store = ResultStore::open(&path).unwrap();
    store.save(&rows).unwrap();

    let loaded = store.load_by_query("icon").unwrap();
    assert_eq!(loaded.len(), 1);
    let row = &loaded[0];
    assert_eq!(row.project_id, 62);
    assert_eq!(row.query_name, "icon");
    assert_eq!(row.old_count, 12);
    assert_eq!(row.new_count, 3);
    assert_eq!(row.timestamp, rows[0].timestamp);
}

/// Run the pairs and save the rows, the way `update` does.
async fn run_then_save(
    client: Arc<SearchClient>,
    pairs: &[QueryPair],
    store: &mut ResultStore,
) -> crnt_metrics_lib::Result<()> {
    let rows = QueryRunner::new(client).with_workers(2).run(pairs).await?;
    store.save(&rows)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn first_page_failure_persists_nothing() {
    let client = client_for(
        MockSearchApi::new()
            .with_query("old-a", MockQuery::pages(&[1]))
            .with_query("new-a", MockQuery::pages(&[1]))
            .with_query("old-b", MockQuery::pages(&[2, 2]).failing(1))
            .with_query("new-b", MockQuery::pages(&[1])),
    )
    .await;
    let mut store = ResultStore::open_in_memory().unwrap();

    let healthy = vec![QueryPair::new("a", 62, "old-a", "new-a")];
    run_then_save(client.clone(), &healthy, &mut store)
        .await
        .unwrap();
    assert_eq!(store.load_all().unwrap().len(), 1);

    let pairs = vec![
        QueryPair::new("a", 62, "old-a", "new-a"),
        QueryPair::new("b", 62, "old-b", "new-b"),
    ];
    let err = run_then_save(client, &pairs, &mut store).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    // only the earlier run is stored; pair "a" of the failed run is not
    let stored = store.load_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert!(store.load_by_query("b").unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_count_only_changes_arrival_order() {
    let mut api = MockSearchApi::new();
    for i in 0..8usize {
        api = api
            .with_query(&format!("old-{}", i), MockQuery::pages(&[i + 1, i]))
            .with_query(&format!("new-{}", i), MockQuery::pages(&[i]));
    }
    let client = client_for(api).await;
    let pairs: Vec<QueryPair> = (0..8)
        .map(|i| {
            QueryPair::new(
                format!("query-{}", i),
                60 + i,
                format!("old-{}", i),
                format!("new-{}", i),
            )
        })
        .collect();
    let now = run_timestamp();

    let mut results: Vec<Vec<ResultRow>> = Vec::new();
    for workers in [1, 3, 5] {
        let mut rows = QueryRunner::new(client.clone())
            .with_workers(workers)
            .run_at(&pairs, now)
            .await
            .unwrap();
        rows.sort_by(|a, b| a.query_name.cmp(&b.query_name));
        results.push(rows);
    }

    assert_eq!(results[0], results[1]);
    assert_eq!(results[0], results[2]);
    assert_eq!(results[0].len(), 8);
    for (i, row) in results[0].iter().enumerate() {
        let i = i as i64;
        assert_eq!(row.query_name, format!("query-{}", i));
        assert_eq!(row.project_id, 60 + i);
        assert_eq!(row.old_count, 2 * i + 1);
        assert_eq!(row.new_count, i);
    }
}
