use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use herald::filter::KeywordFilter;
use herald::notifier::DeliveryPolicy;
use herald::publisher::DEFAULT_TELEGRAM_API_BASE;
use herald::summarizer::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_PROMPT};
use herald_core::FeedId;
use url::Url;

/// Feed ingestion and notification bot
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(flatten)]
    pub pipeline: PipelineOpts,

    /// Defaults to `run`
    #[command(subcommand)]
    pub cmd: Option<OptsCmd>,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Directory to keep the database in
    #[arg(long, env = "HERALD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Timeout of every outgoing http request
    #[arg(
        long,
        env = "HERALD_REQUEST_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub request_timeout_secs: u64,
}

static PROJECT_DIRS: LazyLock<Option<directories::ProjectDirs>> =
    LazyLock::new(|| directories::ProjectDirs::from("org", "Herald", "herald"));

impl GlobalOpts {
    pub fn data_dir(&self) -> Option<&Path> {
        if let Some(data_dir) = self.data_dir.as_deref() {
            return Some(data_dir);
        }
        PROJECT_DIRS
            .as_ref()
            .map(|dirs| dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Args)]
pub struct PipelineOpts {
    /// Telegram bot token
    #[arg(long, env = "HERALD_TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    /// Channel to post to: numeric id or `@channelname`
    #[arg(long, env = "HERALD_TELEGRAM_CHANNEL_ID")]
    pub telegram_channel_id: Option<String>,

    #[arg(long, env = "HERALD_TELEGRAM_API_BASE", default_value = DEFAULT_TELEGRAM_API_BASE)]
    pub telegram_api_base: Url,

    /// Seconds between fetch cycles
    #[arg(
        long,
        env = "HERALD_FETCH_INTERVAL_SECS",
        default_value_t = 600,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub fetch_interval_secs: u64,

    /// Seconds between notification cycles, each posting at most one article
    #[arg(
        long,
        env = "HERALD_NOTIFICATION_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub notification_interval_secs: u64,

    /// Comma separated keywords; matching entries are never stored
    #[arg(long, env = "HERALD_FILTER_KEYWORDS", value_delimiter = ',')]
    pub filter_keywords: Vec<String>,

    /// Summaries are left out when not set
    #[arg(long, env = "HERALD_OPENAI_KEY", hide_env_values = true)]
    pub openai_key: Option<String>,

    #[arg(long, env = "HERALD_OPENAI_PROMPT", default_value = DEFAULT_PROMPT)]
    pub openai_prompt: String,

    #[arg(long, env = "HERALD_OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub openai_model: String,

    #[arg(long, env = "HERALD_OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: Url,

    /// Retry delivery up to this many times per cycle and only mark articles
    /// posted once delivered
    #[arg(
        long,
        env = "HERALD_CONFIRMED_DELIVERY_ATTEMPTS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub confirmed_delivery_attempts: Option<u32>,
}

impl PipelineOpts {
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.notification_interval_secs)
    }

    pub fn keyword_filter(&self) -> KeywordFilter {
        KeywordFilter::new(&self.filter_keywords)
    }

    pub fn delivery_policy(&self) -> DeliveryPolicy {
        match self.confirmed_delivery_attempts {
            Some(attempts) => DeliveryPolicy::Confirmed { attempts },
            None => DeliveryPolicy::BestEffort,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum OptsCmd {
    /// Run the fetch and notification loops until interrupted
    Run,

    /// Development and debugging commands
    #[command(subcommand)]
    Dev(DevCmd),
}

#[derive(Debug, Subcommand)]
pub enum DevCmd {
    /// Register a feed
    AddFeed {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: Url,
    },
    /// Unregister a feed; its articles are kept
    RemoveFeed {
        #[arg(long)]
        id: FeedId,
    },
    ListFeeds,
    /// Articles waiting to be posted, in posting order
    ListUnposted,
    /// Run a single fetch cycle and print its report
    FetchOnce,
}
