use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use md5::{Digest, Md5};
use tokio::sync::RwLock;

use stream_api::{
    now_ms, BackendLimits, BatchEntry, EntryOutcome, FailureCode, Locator, PartitionKey,
    RecordPage, SequenceNumber, ShardId, StreamBackend, StreamError, StreamPosition, StreamRecord,
};

// ═══════════════════════════════════════════════════════════════
//  MemoryBackendConfig
// ═══════════════════════════════════════════════════════════════

fn default_shards() -> usize {
    2
}

fn default_iterator_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MemoryBackendConfig {
    /// Shards of every stream created from config.
    #[serde(default = "default_shards")]
    pub shards: usize,
    /// How long a position handle stays valid after it was issued.
    #[serde(default = "default_iterator_ttl_secs")]
    pub iterator_ttl_secs: u64,
    #[serde(default)]
    pub limits: BackendLimits,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            iterator_ttl_secs: default_iterator_ttl_secs(),
            limits: BackendLimits::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Fault injection
// ═══════════════════════════════════════════════════════════════

/// Failure plan for an upcoming write call, kept in one FIFO queue.
///
/// `put_records` consumes the front fault whatever it is. `put_record`
/// consumes it only when it applies to a single entry: `Unavailable`, or a
/// `FailEntries` plan naming index 0. Any other plan is left for the next
/// batch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Whole call rejected as unavailable; nothing is stored.
    Unavailable,
    /// Listed entries fail with the given code, the rest are stored.
    FailEntries(Vec<(usize, FailureCode)>),
}

// ═══════════════════════════════════════════════════════════════
//  State
// ═══════════════════════════════════════════════════════════════

struct StoredRecord {
    sequence_number: SequenceNumber,
    partition_key: PartitionKey,
    payload: Vec<u8>,
    arrival_ms: i64,
}

struct Shard {
    id: ShardId,
    records: Vec<StoredRecord>,
    closed: bool,
}

struct Stream {
    shards: Vec<Shard>,
    next_sequence: u128,
}

impl Stream {
    fn new(shard_count: usize) -> Self {
        Self {
            shards: (0..shard_count)
                .map(|i| Shard {
                    id: ShardId::from_index(i),
                    records: Vec::new(),
                    closed: false,
                })
                .collect(),
            next_sequence: 1,
        }
    }

    fn shard_index(&self, id: &ShardId) -> Option<usize> {
        self.shards.iter().position(|s| &s.id == id)
    }

    /// Route a key to an open shard by its MD5 hash, the way the real
    /// service splits the 128-bit hash key space across shards.
    fn route(&self, key: &PartitionKey) -> Option<usize> {
        let open: Vec<usize> = (0..self.shards.len())
            .filter(|&i| !self.shards[i].closed)
            .collect();
        if open.is_empty() {
            return None;
        }
        let digest = Md5::digest(key.as_str().as_bytes());
        let mut top = [0u8; 8];
        top.copy_from_slice(&digest[..8]);
        let top = u64::from_be_bytes(top) as u128;
        let slot = ((top * open.len() as u128) >> 64) as usize;
        Some(open[slot])
    }

    fn append(&mut self, shard: usize, payload: Vec<u8>, key: PartitionKey) -> SequenceNumber {
        let sequence_number = SequenceNumber::from_counter(self.next_sequence);
        self.next_sequence += 1;
        self.shards[shard].records.push(StoredRecord {
            sequence_number: sequence_number.clone(),
            partition_key: key,
            payload,
            arrival_ms: now_ms(),
        });
        sequence_number
    }
}

struct IteratorState {
    stream: String,
    shard: usize,
    offset: usize,
    issued: Instant,
}

#[derive(Default)]
struct State {
    streams: HashMap<String, Stream>,
    iterators: HashMap<String, IteratorState>,
    next_iterator: u64,
    faults: VecDeque<Fault>,
}

impl State {
    fn stream(&self, name: &str) -> Result<&Stream, StreamError> {
        self.streams
            .get(name)
            .ok_or_else(|| StreamError::Permanent(format!("stream '{name}' not found")))
    }

    fn stream_mut(&mut self, name: &str) -> Result<&mut Stream, StreamError> {
        self.streams
            .get_mut(name)
            .ok_or_else(|| StreamError::Permanent(format!("stream '{name}' not found")))
    }

    fn issue_iterator(&mut self, stream: &str, shard: usize, offset: usize, ttl: Duration) -> StreamPosition {
        self.iterators.retain(|_, it| it.issued.elapsed() < ttl);
        self.next_iterator += 1;
        let token = format!("it-{:016x}-{shard}-{offset}", self.next_iterator);
        self.iterators.insert(
            token.clone(),
            IteratorState {
                stream: stream.to_string(),
                shard,
                offset,
                issued: Instant::now(),
            },
        );
        StreamPosition::from_token(token)
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBackend
// ═══════════════════════════════════════════════════════════════

/// In-process stream backend with the limits, sequence numbering, shard
/// hashing and iterator expiry of the real service. For demos and tests.
pub struct MemoryBackend {
    state: RwLock<State>,
    iterator_ttl: Duration,
    limits: BackendLimits,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(MemoryBackendConfig::default())
    }
}

impl MemoryBackend {
    pub fn new(config: MemoryBackendConfig) -> Self {
        Self {
            state: RwLock::new(State::default()),
            iterator_ttl: Duration::from_secs(config.iterator_ttl_secs),
            limits: config.limits,
        }
    }

    /// Override the iterator lifetime. `Duration::ZERO` expires every
    /// handle immediately.
    pub fn with_iterator_ttl(mut self, ttl: Duration) -> Self {
        self.iterator_ttl = ttl;
        self
    }

    pub fn limits(&self) -> &BackendLimits {
        &self.limits
    }

    pub async fn create_stream(&self, name: &str, shard_count: usize) -> Result<(), StreamError> {
        if shard_count == 0 {
            return Err(StreamError::Validation("stream needs at least one shard".into()));
        }
        let mut state = self.state.write().await;
        if state.streams.contains_key(name) {
            return Err(StreamError::Permanent(format!("stream '{name}' already exists")));
        }
        state.streams.insert(name.to_string(), Stream::new(shard_count));
        tracing::info!(stream = %name, shards = shard_count, "created stream");
        Ok(())
    }

    /// Close a shard: no further writes land there, and readers get a
    /// `None` continuation once they pass its last record.
    pub async fn close_shard(&self, stream: &str, shard: &ShardId) -> Result<(), StreamError> {
        let mut state = self.state.write().await;
        let s = state.stream_mut(stream)?;
        let idx = s.shard_index(shard).ok_or_else(|| StreamError::UnknownShard {
            stream: stream.to_string(),
            shard: shard.to_string(),
        })?;
        s.shards[idx].closed = true;
        tracing::info!(stream = %stream, shard = %shard, "closed shard");
        Ok(())
    }

    /// Queue a failure for an upcoming write call.
    pub async fn inject_fault(&self, fault: Fault) {
        self.state.write().await.faults.push_back(fault);
    }

    /// Records currently stored in a shard.
    pub async fn shard_len(&self, stream: &str, shard: &ShardId) -> Result<usize, StreamError> {
        let state = self.state.read().await;
        let s = state.stream(stream)?;
        s.shard_index(shard)
            .map(|i| s.shards[i].records.len())
            .ok_or_else(|| StreamError::UnknownShard {
                stream: stream.to_string(),
                shard: shard.to_string(),
            })
    }
}

impl StreamBackend for MemoryBackend {
    fn put_record(
        &self,
        stream: &str,
        payload: Vec<u8>,
        key: PartitionKey,
    ) -> Pin<Box<dyn Future<Output = Result<SequenceNumber, StreamError>> + Send + '_>> {
        let stream = stream.to_string();
        Box::pin(async move {
            self.limits.check_entry(payload.len() + key.len_bytes())?;

            let mut state = self.state.write().await;
            // A single put only consumes faults that apply to it; an entry
            // plan without index 0 stays queued for the next batch call.
            let single_fault = match state.faults.front() {
                Some(Fault::Unavailable) => Some(None),
                Some(Fault::FailEntries(failed)) => failed
                    .iter()
                    .find(|(i, _)| *i == 0)
                    .map(|(_, code)| Some(*code)),
                None => None,
            };
            if let Some(code) = single_fault {
                state.faults.pop_front();
                return Err(match code {
                    None => StreamError::Transient("service unavailable".into()),
                    Some(code) if code.is_retry_safe() => StreamError::Transient(format!("{code:?}")),
                    Some(code) => StreamError::Permanent(format!("{code:?}")),
                });
            }

            let s = state.stream_mut(&stream)?;
            let shard = s
                .route(&key)
                .ok_or_else(|| StreamError::Permanent(format!("stream '{stream}' has no open shards")))?;
            let seq = s.append(shard, payload, key);
            tracing::debug!(stream = %stream, shard, sequence = %seq, "stored record");
            Ok(seq)
        })
    }

    fn put_records(
        &self,
        stream: &str,
        entries: Vec<BatchEntry>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<EntryOutcome>, StreamError>> + Send + '_>> {
        let stream = stream.to_string();
        Box::pin(async move {
            if entries.is_empty() || entries.len() > self.limits.max_batch_records {
                return Err(StreamError::Validation(format!(
                    "put_records takes 1..={} entries, got {}",
                    self.limits.max_batch_records,
                    entries.len()
                )));
            }
            let mut total = 0usize;
            for entry in &entries {
                self.limits.check_entry(entry.size_bytes())?;
                total += entry.size_bytes();
            }
            if total > self.limits.max_batch_bytes {
                return Err(StreamError::Validation(format!(
                    "put_records payload of {total} bytes exceeds {} bytes",
                    self.limits.max_batch_bytes
                )));
            }

            let mut state = self.state.write().await;
            let failed: HashMap<usize, FailureCode> = match state.faults.pop_front() {
                Some(Fault::Unavailable) => {
                    return Err(StreamError::Transient("service unavailable".into()));
                }
                Some(Fault::FailEntries(list)) => list.into_iter().collect(),
                None => HashMap::new(),
            };

            let s = state.stream_mut(&stream)?;
            let mut outcomes = Vec::with_capacity(entries.len());
            for (i, entry) in entries.into_iter().enumerate() {
                if let Some(code) = failed.get(&i) {
                    outcomes.push(EntryOutcome::Failed {
                        code: *code,
                        message: format!("entry {i}: {code:?}"),
                    });
                    continue;
                }
                match s.route(&entry.key) {
                    Some(shard) => {
                        let sequence_number = s.append(shard, entry.payload, entry.key);
                        outcomes.push(EntryOutcome::Stored {
                            sequence_number,
                            shard_id: s.shards[shard].id.clone(),
                        });
                    }
                    None => outcomes.push(EntryOutcome::Failed {
                        code: FailureCode::Rejected,
                        message: "no open shards".into(),
                    }),
                }
            }
            tracing::debug!(stream = %stream, entries = outcomes.len(), "stored batch");
            Ok(outcomes)
        })
    }

    fn get_position(
        &self,
        stream: &str,
        shard: &ShardId,
        locator: &Locator,
    ) -> Pin<Box<dyn Future<Output = Result<StreamPosition, StreamError>> + Send + '_>> {
        let stream = stream.to_string();
        let shard = shard.clone();
        let locator = locator.clone();
        Box::pin(async move {
            let mut state = self.state.write().await;
            let s = state.stream(&stream)?;
            let idx = s.shard_index(&shard).ok_or_else(|| StreamError::UnknownShard {
                stream: stream.clone(),
                shard: shard.to_string(),
            })?;
            let records = &s.shards[idx].records;
            let find = |seq: &SequenceNumber| {
                records
                    .iter()
                    .position(|r| &r.sequence_number == seq)
                    .ok_or_else(|| {
                        StreamError::InvalidLocator(format!("sequence number {seq} is not in shard {shard}"))
                    })
            };
            let offset = match &locator {
                Locator::TrimHorizon => 0,
                Locator::Latest => records.len(),
                Locator::AtSequenceNumber(seq) => find(seq)?,
                Locator::AfterSequenceNumber(seq) => find(seq)? + 1,
                Locator::AtTimestamp(ts) => records
                    .iter()
                    .position(|r| r.arrival_ms >= *ts)
                    .unwrap_or(records.len()),
            };
            let position = state.issue_iterator(&stream, idx, offset, self.iterator_ttl);
            tracing::debug!(stream = %stream, shard = %shard, locator = %locator, offset, "issued position");
            Ok(position)
        })
    }

    fn get_records(
        &self,
        position: &StreamPosition,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<RecordPage, StreamError>> + Send + '_>> {
        let position = position.clone();
        Box::pin(async move {
            self.limits.check_pull_limit(limit)?;

            let mut state = self.state.write().await;
            let lookup = state
                .iterators
                .get(position.token())
                .map(|it| (it.stream.clone(), it.shard, it.offset, it.issued.elapsed() < self.iterator_ttl));
            let (stream, shard, offset) = match lookup {
                Some((stream, shard, offset, true)) => (stream, shard, offset),
                Some(_) => {
                    state.iterators.remove(position.token());
                    return Err(StreamError::ExpiredIterator(format!(
                        "position '{}' is past its lifetime",
                        position.token()
                    )));
                }
                None => {
                    return Err(StreamError::ExpiredIterator(format!(
                        "position '{}' is unknown or expired",
                        position.token()
                    )));
                }
            };

            let s = state.stream(&stream)?;
            let sh = &s.shards[shard];
            let end = (offset + limit).min(sh.records.len());
            let records: Vec<StreamRecord> = sh.records[offset.min(end)..end]
                .iter()
                .map(|r| StreamRecord {
                    sequence_number: r.sequence_number.clone(),
                    partition_key: r.partition_key.clone(),
                    payload: r.payload.clone(),
                    arrival_ms: r.arrival_ms,
                })
                .collect();
            let millis_behind_latest = match (records.last(), sh.records.last()) {
                (Some(last), Some(tip)) => (tip.arrival_ms - last.arrival_ms).max(0) as u64,
                _ => 0,
            };
            let at_end = end >= sh.records.len();
            let closed = sh.closed;

            let next = if at_end && closed {
                None
            } else if records.is_empty() {
                // Caught up: same handle, lifetime renewed.
                if let Some(it) = state.iterators.get_mut(position.token()) {
                    it.issued = Instant::now();
                }
                Some(position)
            } else {
                Some(state.issue_iterator(&stream, shard, end, self.iterator_ttl))
            };

            Ok(RecordPage {
                records,
                next,
                millis_behind_latest,
            })
        })
    }

    fn list_shards(
        &self,
        stream: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ShardId>, StreamError>> + Send + '_>> {
        let stream = stream.to_string();
        Box::pin(async move {
            let state = self.state.read().await;
            Ok(state.stream(&stream)?.shards.iter().map(|s| s.id.clone()).collect())
        })
    }
}
