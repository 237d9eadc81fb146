use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use backend_memory::MemoryBackendConfig;
use stream_api::{Locator, ShardId};
use stream_api_server::ReadDefaults;
use stream_engine::PartitionPolicy;

use crate::error::ShimError;

#[derive(Parser)]
#[command(name = "notify-shim", about = "Notification stream producer/consumer shim")]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the REST shim
    Serve(ServeArgs),
    /// Send one generated notification
    SendOne,
    /// Send a batch of generated notifications
    SendBatch(SendBatchArgs),
    /// Read and decode records from one shard
    Get(GetArgs),
}

#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml", env = "NOTIFY_SHIM_CONFIG", global = true)]
    pub config: String,

    /// Stream name
    #[arg(long, env = "NOTIFY_SHIM_STREAM", global = true)]
    pub stream: Option<String>,

    /// Partition policy: constant, id_hash, round_robin
    #[arg(long, global = true)]
    pub partition: Option<PartitionPolicy>,

    /// Shards per stream in the in-memory backend
    #[arg(long, global = true)]
    pub shards: Option<usize>,

    /// Generator seed (0 = current time)
    #[arg(long, global = true)]
    pub seed: Option<i64>,
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// REST port
    #[arg(long, env = "API_PORT")]
    pub port: Option<u16>,
}

#[derive(Args, Clone, Debug)]
pub struct SendBatchArgs {
    #[arg(long, default_value_t = stream_api_server::BATCH_SEND_COUNT)]
    pub count: usize,
}

#[derive(Args, Clone, Debug, Default)]
pub struct GetArgs {
    #[arg(long)]
    pub shard: Option<String>,

    /// trim_horizon, latest, at_sequence, after_sequence, at_timestamp
    #[arg(long)]
    pub locator: Option<String>,

    #[arg(long)]
    pub sequence: Option<String>,

    /// Unix ms, for at_timestamp
    #[arg(long)]
    pub timestamp: Option<i64>,

    #[arg(long)]
    pub limit: Option<usize>,

    /// Publish this many generated notifications before reading
    #[arg(long, default_value_t = 0)]
    pub preload: usize,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct ShimConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_stream")]
    pub stream: String,
    #[serde(default)]
    pub partition: PartitionPolicy,
    #[serde(default = "default_partition_buckets")]
    pub partition_buckets: usize,
    #[serde(default)]
    pub seed: i64,
    #[serde(default)]
    pub backend: MemoryBackendConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_shard")]
    pub shard: String,
    #[serde(default = "default_locator")]
    pub locator: String,
    pub sequence: Option<String>,
    pub timestamp: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_api_port() -> u16 {
    9300
}
fn default_stream() -> String {
    "kinesis-integration-lambda-test".into()
}
fn default_partition_buckets() -> usize {
    8
}
fn default_shard() -> String {
    "shardId-000000000000".into()
}
fn default_locator() -> String {
    "trim_horizon".into()
}
fn default_limit() -> usize {
    100
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            stream: default_stream(),
            partition: PartitionPolicy::default(),
            partition_buckets: default_partition_buckets(),
            seed: 0,
            backend: MemoryBackendConfig::default(),
            consumer: ConsumerConfig::default(),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            shard: default_shard(),
            locator: default_locator(),
            sequence: None,
            timestamp: None,
            limit: default_limit(),
        }
    }
}

impl ShimConfig {
    pub fn load(path: &str) -> Result<Self, ShimError> {
        let content = std::fs::read_to_string(path).map_err(|e| ShimError::Config {
            context: "read",
            detail: format!("'{path}': {e}"),
        })?;
        Self::parse(&content).map_err(|e| match e {
            ShimError::Config { detail, .. } => ShimError::Config {
                context: "parse",
                detail: format!("'{path}': {detail}"),
            },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, ShimError> {
        toml::from_str(content).map_err(|e| ShimError::Config {
            context: "parse",
            detail: e.to_string(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Effective: config.toml < env/CLI
// ═══════════════════════════════════════════════════════════════

pub struct Effective {
    pub api_port: u16,
    pub stream: String,
    pub partition: PartitionPolicy,
    pub partition_buckets: usize,
    pub seed: i64,
    pub backend: MemoryBackendConfig,
    pub consumer: ConsumerConfig,
}

impl Effective {
    /// A missing config file means defaults; an unreadable or malformed
    /// one that exists is an error.
    pub fn new(args: &CommonArgs) -> Result<Self, ShimError> {
        let cfg = match ShimConfig::load(&args.config) {
            Ok(c) => {
                tracing::info!(config = %args.config, "loaded config");
                c
            }
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                tracing::debug!(config = %args.config, "no config file, using defaults");
                ShimConfig::default()
            }
        };
        Self::merge(args, cfg)
    }

    pub fn merge(args: &CommonArgs, cfg: ShimConfig) -> Result<Self, ShimError> {
        let mut backend = cfg.backend;
        if let Some(shards) = args.shards {
            backend.shards = shards;
        }
        if backend.shards == 0 {
            return Err(ShimError::Config {
                context: "backend",
                detail: "shards must be at least 1".into(),
            });
        }

        Ok(Self {
            api_port: cfg.api_port,
            stream: args.stream.clone().unwrap_or(cfg.stream),
            partition: args.partition.unwrap_or(cfg.partition),
            partition_buckets: cfg.partition_buckets,
            seed: args.seed.unwrap_or(cfg.seed),
            backend,
            consumer: cfg.consumer,
        })
    }

    /// Read defaults for the `/get` endpoint and the `get` command.
    pub fn read_defaults(&self) -> Result<ReadDefaults, ShimError> {
        let c = &self.consumer;
        Ok(ReadDefaults {
            shard: ShardId::new(c.shard.clone()),
            locator: Locator::from_parts(&c.locator, c.sequence.as_deref(), c.timestamp)?,
            limit: c.limit,
        })
    }
}
