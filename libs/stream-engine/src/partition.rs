use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use md5::{Digest, Md5};
use serde::Deserialize;

use stream_api::{Message, PartitionKey};

/// Picks the partition key, and so the shard, for an outgoing message.
///
/// Total over every message. Policies are swapped without touching the
/// batcher or the producer.
pub trait PartitionAssigner: Send + Sync {
    fn assign(&self, message: &Message) -> PartitionKey;
}

// ---------------------------------------------------------------------------
// ConstantKey
// ---------------------------------------------------------------------------

/// One key for the whole producer session.
///
/// Every record lands on the same shard, so throughput is capped at a single
/// shard's write limit. Fine for low-volume use.
#[derive(Debug, Clone)]
pub struct ConstantKey {
    key: PartitionKey,
}

impl ConstantKey {
    pub fn new(key: PartitionKey) -> Self {
        Self { key }
    }

    /// Fresh random key (UUID v4) for this session.
    pub fn random() -> Self {
        Self {
            key: PartitionKey::random(),
        }
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }
}

impl Default for ConstantKey {
    fn default() -> Self {
        Self::random()
    }
}

impl PartitionAssigner for ConstantKey {
    fn assign(&self, _message: &Message) -> PartitionKey {
        self.key.clone()
    }
}

// ---------------------------------------------------------------------------
// IdHash
// ---------------------------------------------------------------------------

/// MD5 of the message id, folded into a fixed number of buckets.
/// The same id always gets the same key.
#[derive(Debug, Clone)]
pub struct IdHash {
    keys: Vec<PartitionKey>,
}

impl IdHash {
    pub fn new(buckets: usize) -> Self {
        Self {
            keys: bucket_keys(buckets.max(1)),
        }
    }

    pub fn buckets(&self) -> usize {
        self.keys.len()
    }
}

impl PartitionAssigner for IdHash {
    fn assign(&self, message: &Message) -> PartitionKey {
        let digest = Md5::digest(message.id().as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_be_bytes(head) % self.keys.len() as u64) as usize;
        self.keys[bucket].clone()
    }
}

// ---------------------------------------------------------------------------
// RoundRobin
// ---------------------------------------------------------------------------

/// Cycles through a fixed key set, one key per assigned message.
#[derive(Debug)]
pub struct RoundRobin {
    keys: Vec<PartitionKey>,
    next: AtomicUsize,
}

impl RoundRobin {
    /// `keys` must not be empty; an empty set falls back to one random key.
    pub fn new(keys: Vec<PartitionKey>) -> Self {
        let keys = if keys.is_empty() { vec![PartitionKey::random()] } else { keys };
        Self {
            keys,
            next: AtomicUsize::new(0),
        }
    }

    pub fn with_buckets(buckets: usize) -> Self {
        Self::new(bucket_keys(buckets.max(1)))
    }
}

impl PartitionAssigner for RoundRobin {
    fn assign(&self, _message: &Message) -> PartitionKey {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        self.keys[i % self.keys.len()].clone()
    }
}

// ---------------------------------------------------------------------------
// Explicit
// ---------------------------------------------------------------------------

/// Caller-chosen keys per message id, with a fallback policy for the rest.
pub struct Explicit {
    overrides: HashMap<String, PartitionKey>,
    fallback: Arc<dyn PartitionAssigner>,
}

impl Explicit {
    pub fn new(fallback: Arc<dyn PartitionAssigner>) -> Self {
        Self {
            overrides: HashMap::new(),
            fallback,
        }
    }

    pub fn with_key(mut self, message_id: impl Into<String>, key: PartitionKey) -> Self {
        self.overrides.insert(message_id.into(), key);
        self
    }
}

impl PartitionAssigner for Explicit {
    fn assign(&self, message: &Message) -> PartitionKey {
        match self.overrides.get(message.id()) {
            Some(key) => key.clone(),
            None => self.fallback.assign(message),
        }
    }
}

// ---------------------------------------------------------------------------
// Config-facing policy selector
// ---------------------------------------------------------------------------

/// Policy name as it appears in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionPolicy {
    #[default]
    Constant,
    IdHash,
    RoundRobin,
}

impl PartitionPolicy {
    pub fn build(self, buckets: usize) -> Arc<dyn PartitionAssigner> {
        match self {
            PartitionPolicy::Constant => Arc::new(ConstantKey::random()),
            PartitionPolicy::IdHash => Arc::new(IdHash::new(buckets)),
            PartitionPolicy::RoundRobin => Arc::new(RoundRobin::with_buckets(buckets)),
        }
    }
}

impl std::str::FromStr for PartitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(PartitionPolicy::Constant),
            "id_hash" => Ok(PartitionPolicy::IdHash),
            "round_robin" => Ok(PartitionPolicy::RoundRobin),
            other => Err(format!(
                "unknown partition policy '{other}' (expected constant, id_hash, round_robin)"
            )),
        }
    }
}

fn bucket_keys(buckets: usize) -> Vec<PartitionKey> {
    (0..buckets).map(PartitionKey::bucket).collect()
}
