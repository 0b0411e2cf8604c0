mod cli;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cli::{DevCmd, Opts, OptsCmd};
use herald::enrich::Enricher;
use herald::error::CycleError;
use herald::fetcher::FetchCoordinator;
use herald::notifier::NotificationCoordinator;
use herald::publisher::TelegramPublisher;
use herald::scheduler::Periodic;
use herald::source::HttpFeedSource;
use herald::summarizer::OpenAiSummarizer;
use herald_core::error::FmtCompact as _;
use herald_db::{Database, DbError};
use snafu::{OptionExt as _, ResultExt as _, Snafu};
use tokio::signal;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

pub const LOG_TARGET: &str = "herald::cli";

/// How long the loops get to wind down after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Logging initialization failed"))]
    Logging,
    #[snafu(display("Could not determine data dir; use --data-dir"))]
    DataDirUnknown,
    #[snafu(display("Data dir error: {source}"))]
    DataDir { source: io::Error },
    #[snafu(display("Database error: {source}"))]
    Database { source: DbError },
    #[snafu(display("Http client error: {source}"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Missing required option --{name}"))]
    MissingOption { name: &'static str },
    #[snafu(display("Fetch failed: {source}"))]
    Fetch { source: CycleError },
    #[snafu(display("Output error: {source}"))]
    Output { source: serde_json::Error },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

#[snafu::report]
#[tokio::main]
async fn main() -> CliResult<()> {
    init_logging()?;

    let opts = Opts::parse();

    match opts.cmd {
        None | Some(OptsCmd::Run) => run(&opts).await,
        Some(OptsCmd::Dev(ref cmd)) => {
            let out = handle_dev_cmd(&opts, cmd).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&out).context(OutputSnafu)?
            );
            Ok(())
        }
    }
}

async fn open_db(opts: &Opts) -> CliResult<Arc<Database>> {
    let data_dir = opts.global.data_dir().context(DataDirUnknownSnafu)?;
    let path = Database::mk_db_path(data_dir)
        .await
        .context(DataDirSnafu)?;
    let db = Database::open(path).await.context(DatabaseSnafu)?;
    Ok(Arc::new(db))
}

fn fetch_coordinator(
    opts: &Opts,
    db: &Arc<Database>,
    client: &reqwest::Client,
) -> FetchCoordinator {
    FetchCoordinator::builder()
        .registry(db.clone())
        .store(db.clone())
        .source(Arc::new(HttpFeedSource::new(client.clone())))
        .filter(opts.pipeline.keyword_filter())
        .build()
}

async fn run(opts: &Opts) -> CliResult<()> {
    let token = opts
        .pipeline
        .telegram_token
        .as_deref()
        .context(MissingOptionSnafu {
            name: "telegram-token",
        })?;
    let channel = opts
        .pipeline
        .telegram_channel_id
        .clone()
        .context(MissingOptionSnafu {
            name: "telegram-channel-id",
        })?;

    let db = open_db(opts).await?;
    let client =
        herald::build_http_client(opts.global.request_timeout()).context(HttpClientSnafu)?;

    let fetcher = fetch_coordinator(opts, &db, &client);

    let summarizer = OpenAiSummarizer::builder()
        .client(client.clone())
        .maybe_api_key(opts.pipeline.openai_key.clone())
        .base_url(opts.pipeline.openai_base_url.clone())
        .model(opts.pipeline.openai_model.clone())
        .prompt(opts.pipeline.openai_prompt.clone())
        .build();
    let notifier = NotificationCoordinator::builder()
        .store(db.clone())
        .enricher(Enricher::new(client.clone(), Arc::new(summarizer)))
        .publisher(Arc::new(TelegramPublisher::new(
            client.clone(),
            &opts.pipeline.telegram_api_base,
            token,
        )))
        .channel(channel)
        .policy(opts.pipeline.delivery_policy())
        .build();

    info!(
        target: LOG_TARGET,
        fetch_interval_secs = opts.pipeline.fetch_interval_secs,
        notification_interval_secs = opts.pipeline.notification_interval_secs,
        filter_keywords = opts.pipeline.filter_keywords.len(),
        policy = ?opts.pipeline.delivery_policy(),
        "Starting"
    );

    let cancel = CancellationToken::new();
    let mut loops = JoinSet::new();
    let mut names = HashMap::new();
    let id = loops
        .spawn(Periodic::new(fetcher, opts.pipeline.fetch_interval()).run(cancel.clone()))
        .id();
    names.insert(id, "fetch");
    let id = loops
        .spawn(Periodic::new(notifier, opts.pipeline.notification_interval()).run(cancel.clone()))
        .id();
    names.insert(id, "notify");

    supervise(loops, &names, cancel).await;

    Ok(())
}

/// Wait for a shutdown signal, then stop the loops
///
/// A loop ending on its own is logged; the others keep running.
async fn supervise(
    mut loops: JoinSet<()>,
    names: &HashMap<task::Id, &'static str>,
    cancel: CancellationToken,
) {
    let name_of = |id: task::Id| names.get(&id).copied().unwrap_or("unknown");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(res) = loops.join_next_with_id() => match res {
                Ok((id, ())) => {
                    warn!(target: LOG_TARGET, name = name_of(id), "Loop ended unexpectedly");
                }
                Err(err) => {
                    error!(target: LOG_TARGET, name = name_of(err.id()), err = %err.fmt_compact(), "Loop crashed");
                }
            },
        }
    }

    info!(target: LOG_TARGET, "Shutting down");
    cancel.cancel();

    let drain = async {
        while let Some(res) = loops.join_next_with_id().await {
            match res {
                Ok((id, ())) => debug!(target: LOG_TARGET, name = name_of(id), "Loop stopped"),
                Err(err) => {
                    error!(target: LOG_TARGET, name = name_of(err.id()), err = %err.fmt_compact(), "Loop crashed");
                }
            }
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!(target: LOG_TARGET, "Loops did not stop in time, aborting");
    }
}

async fn handle_dev_cmd(opts: &Opts, cmd: &DevCmd) -> CliResult<serde_json::Value> {
    let db = open_db(opts).await?;

    Ok(match cmd {
        DevCmd::AddFeed { name, url } => {
            let id = db
                .insert_feed(name, url.as_str())
                .await
                .context(DatabaseSnafu)?;
            serde_json::json!({ "id": id })
        }
        DevCmd::RemoveFeed { id } => {
            let removed = db.remove_feed(*id).await.context(DatabaseSnafu)?;
            serde_json::json!({ "removed": removed })
        }
        DevCmd::ListFeeds => {
            let feeds = db.list_feeds().await.context(DatabaseSnafu)?;
            serde_json::to_value(feeds).context(OutputSnafu)?
        }
        DevCmd::ListUnposted => {
            let articles = db.list_unposted().await.context(DatabaseSnafu)?;
            serde_json::to_value(articles).context(OutputSnafu)?
        }
        DevCmd::FetchOnce => {
            let client = herald::build_http_client(opts.global.request_timeout())
                .context(HttpClientSnafu)?;
            let report = fetch_coordinator(opts, &db, &client)
                .fetch_once(&CancellationToken::new())
                .await
                .context(FetchSnafu)?;
            serde_json::to_value(report).context(OutputSnafu)?
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(target: LOG_TARGET, err = %err.fmt_compact(), "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!(target: LOG_TARGET, err = %err.fmt_compact(), "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn init_logging() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|_| CliError::Logging)?;

    Ok(())
}
