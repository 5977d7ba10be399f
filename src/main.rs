use clap::Parser;
use dotenv::dotenv;
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crnt_metrics_lib::config::{resolve_token, TOKEN_ENV_VAR};
use crnt_metrics_lib::{
    report, run_timestamp, Args, Command, PagePolicy, QueryRunner, ResultStore, SearchClient,
    Settings,
};

#[tokio::main]
async fn main() {
    dotenv().ok();

    let args = Args::parse();

    // RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> crnt_metrics_lib::Result<()> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    match args.command {
        Command::Update {
            dont_persist,
            reset,
            token,
            base_url,
            workers,
            lenient_pages,
        } => {
            let token = resolve_token(token.as_deref(), env::var(TOKEN_ENV_VAR).ok())?;
            if let Some(url) = base_url {
                settings.base_url = url;
            }
            if let Some(workers) = workers {
                settings.workers = workers;
            }
            if lenient_pages {
                settings.page_policy = PagePolicy::Lenient;
            }
            settings.validate()?;

            // open the store first so a broken database fails before any searching
            let mut store = if dont_persist {
                None
            } else {
                Some(open_store(&args.database, reset)?)
            };

            update(&settings, &token, store.as_mut()).await
        }
        Command::GenerateChart { query, output } => {
            let store = ResultStore::open(&args.database)?;
            generate_chart(&store, &query, output)
        }
    }
}

fn open_store(path: &Path, reset: bool) -> crnt_metrics_lib::Result<ResultStore> {
    // a missing database starts from scratch anyway
    if reset && path.exists() {
        ResultStore::reset(path)?;
    }
    ResultStore::open(path)
}

async fn update(
    settings: &Settings,
    token: &str,
    store: Option<&mut ResultStore>,
) -> crnt_metrics_lib::Result<()> {
    let client = SearchClient::new(&settings.base_url, token)?.with_page_policy(settings.page_policy);

    let progress = ProgressBar::new(settings.queries.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}/{len:3} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    progress.set_message("Running query pairs");

    // one timestamp for all results
    let now = run_timestamp();
    let rows = QueryRunner::new(Arc::new(client))
        .with_workers(settings.workers)
        .with_progress(progress.clone())
        .run_at(&settings.queries, now)
        .await;
    progress.finish_and_clear();
    let rows = rows?;

    match store {
        Some(store) => store.save(&rows)?,
        None => info!("Not persisting {} results", rows.len()),
    }

    let mut stdout = std::io::stdout().lock();
    report::write_table(
        &mut stdout,
        &format!("Queried results at {}", now.format("%Y-%m-%d %H:%M:%S")),
        &rows,
        settings,
    )
}

fn generate_chart(
    store: &ResultStore,
    query: &str,
    output: Option<PathBuf>,
) -> crnt_metrics_lib::Result<()> {
    let rows = if query == "all" {
        store.load_all()?
    } else {
        store.load_by_query(query)?
    };
    info!("Loaded {} results for '{}'", rows.len(), query);

    let path = output.unwrap_or_else(|| PathBuf::from(format!("{}.html", query)));
    report::write_chart(&path, &format!("CRNT Adoption Rate for {}", query), &rows)?;
    Ok(())
}
