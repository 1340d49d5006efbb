//! Command-line definitions.

use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use echoat_core::config::{SchedulerConfig, SubmitConfig};
use echoat_core::ports::IndexStrategy;
use echoat_redis::RedisStoreConfig;

/// Echo messages back at the time you ask for, across any number of nodes.
#[derive(Parser, Debug)]
#[command(name = "echoat", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve `POST /echoAtTime` and run schedulers in this process.
    Serve(ServeArgs),

    /// Run schedulers only (no HTTP).
    Worker(WorkerArgs),

    /// Queue one message and exit.
    Submit(SubmitArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Shared Redis; required for more than one node.
    Redis,
    /// Process-local store. Tasks are lost on exit.
    Memory,
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, value_enum, default_value_t = StoreKind::Redis, env = "ECHOAT_STORE")]
    pub store: StoreKind,

    #[arg(long, default_value = "redis://127.0.0.1:6379", env = "REDIS_URL")]
    pub redis_url: String,

    /// Key prefix; every node serving the same tasks must use the same one.
    #[arg(long, default_value = "tasks", env = "ECHOAT_NAMESPACE")]
    pub namespace: String,

    #[arg(long, env = "ECHOAT_REDIS_DB")]
    pub db: Option<u32>,

    /// How the earliest task is found: `sorted-index` or `full-scan`.
    #[arg(long, default_value = "sorted-index", env = "ECHOAT_INDEX")]
    pub index: IndexStrategy,

    /// Add missing keyspace notification flags on the server at startup
    /// instead of refusing to start.
    #[arg(long, env = "ECHOAT_CONFIGURE_KEYSPACE_EVENTS")]
    pub configure_keyspace_events: bool,

    #[arg(long, default_value_t = 1_000)]
    pub resubscribe_backoff_ms: u64,
}

impl StoreArgs {
    pub fn redis_config(&self) -> RedisStoreConfig {
        RedisStoreConfig {
            url: self.redis_url.clone(),
            namespace: self.namespace.clone(),
            db: self.db,
            index: self.index,
            configure_keyspace_events: self.configure_keyspace_events,
            resubscribe_backoff_ms: self.resubscribe_backoff_ms,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SchedulerArgs {
    /// Schedulers to run in this process.
    #[arg(long, default_value_t = 1, env = "ECHOAT_SCHEDULERS")]
    pub schedulers: usize,

    #[arg(long, default_value_t = 1_000)]
    pub error_backoff_ms: u64,

    #[arg(long, default_value_t = 1)]
    pub stale_retries: u32,
}

impl SchedulerArgs {
    pub fn config(&self) -> SchedulerConfig {
        SchedulerConfig {
            error_backoff_ms: self.error_backoff_ms,
            stale_retries: self.stale_retries,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SubmitterArgs {
    /// Insert attempts before a key collision is reported.
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,
}

impl SubmitterArgs {
    pub fn config(&self) -> SubmitConfig {
        SubmitConfig {
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0:8080", env = "ECHOAT_LISTEN")]
    pub listen: SocketAddr,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub scheduler: SchedulerArgs,

    #[command(flatten)]
    pub submitter: SubmitterArgs,
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub scheduler: SchedulerArgs,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Due time in Unix epoch milliseconds.
    #[arg(long)]
    pub time: String,

    #[arg(long)]
    pub message: String,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub submitter: SubmitterArgs,
}
