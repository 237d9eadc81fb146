use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::limits::BackendLimits;
use crate::message::PartitionKey;
use crate::position::StreamPosition;

// ════════════════════════════════════════════════════════════════
//  Identifiers
// ════════════════════════════════════════════════════════════════

/// Backend-assigned position of a record within its shard.
///
/// A decimal digit string. Real values exceed 128 bits, so ordering is
/// numeric on the string: fewer digits is smaller, equal length compares
/// lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SequenceNumber(String);

impl SequenceNumber {
    pub fn parse(raw: impl Into<String>) -> Result<Self, StreamError> {
        let raw = raw.into();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StreamError::InvalidLocator(format!(
                "sequence number '{raw}' is not a decimal digit string"
            )));
        }
        let trimmed = raw.trim_start_matches('0');
        let normalized = if trimmed.is_empty() { "0" } else { trimmed };
        Ok(Self(normalized.to_string()))
    }

    /// Build from a counter. Used by backends that number records locally.
    pub fn from_counter(n: u128) -> Self {
        Self(n.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for SequenceNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for SequenceNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SequenceNumber {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SequenceNumber::parse(raw).map_err(serde::de::Error::custom)
    }
}

/// Shard identifier, e.g. `shardId-000000000001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(String);

impl ShardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Canonical id for the n-th shard of a stream.
    pub fn from_index(index: usize) -> Self {
        Self(format!("shardId-{index:012}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ════════════════════════════════════════════════════════════════
//  Batch
// ════════════════════════════════════════════════════════════════

/// One outgoing record: encoded payload plus partition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub payload: Vec<u8>,
    pub key: PartitionKey,
}

impl BatchEntry {
    pub fn new(payload: Vec<u8>, key: PartitionKey) -> Self {
        Self { payload, key }
    }

    /// Bytes counted against backend limits: payload plus key.
    pub fn size_bytes(&self) -> usize {
        self.payload.len() + self.key.len_bytes()
    }
}

/// Ordered group of entries sent in a single backend call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    entries: Vec<BatchEntry>,
    size_bytes: usize,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: BatchEntry) {
        self.size_bytes += entry.size_bytes();
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Whether `entry` can be appended without breaking `limits`.
    pub fn fits(&self, entry: &BatchEntry, limits: &BackendLimits) -> bool {
        self.entries.len() < limits.max_batch_records
            && self.size_bytes + entry.size_bytes() <= limits.max_batch_bytes
    }

    /// Check every size/shape invariant of a batch call.
    pub fn validate(&self, limits: &BackendLimits) -> Result<(), StreamError> {
        if self.entries.is_empty() {
            return Err(StreamError::Validation("batch is empty".into()));
        }
        if self.entries.len() > limits.max_batch_records {
            return Err(StreamError::Validation(format!(
                "batch has {} entries, limit is {}",
                self.entries.len(),
                limits.max_batch_records
            )));
        }
        for (i, entry) in self.entries.iter().enumerate() {
            limits
                .check_entry(entry.size_bytes())
                .map_err(|e| e.with_context(format!("entry {i}")))?;
        }
        if self.size_bytes > limits.max_batch_bytes {
            return Err(StreamError::Validation(format!(
                "batch of {} bytes exceeds per-call limit of {} bytes",
                self.size_bytes, limits.max_batch_bytes
            )));
        }
        Ok(())
    }

    /// New batch holding the entries at `indices`, in that order.
    /// Out-of-range indices are skipped.
    pub fn select(&self, indices: &[usize]) -> Batch {
        let mut out = Batch::new();
        for &i in indices {
            if let Some(entry) = self.entries.get(i) {
                out.push(entry.clone());
            }
        }
        out
    }
}

impl FromIterator<BatchEntry> for Batch {
    fn from_iter<I: IntoIterator<Item = BatchEntry>>(iter: I) -> Self {
        let mut batch = Batch::new();
        for entry in iter {
            batch.push(entry);
        }
        batch
    }
}

// ════════════════════════════════════════════════════════════════
//  BatchResult
// ════════════════════════════════════════════════════════════════

/// Why a single batch entry was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// Shard write throughput exceeded. Retry-safe.
    ThroughputExceeded,
    /// Backend-side internal failure. Retry-safe.
    InternalFailure,
    /// Entry rejected for a reason retrying will not fix.
    Rejected,
}

impl FailureCode {
    pub fn is_retry_safe(self) -> bool {
        matches!(self, FailureCode::ThroughputExceeded | FailureCode::InternalFailure)
    }
}

/// Backend answer for one entry of a batch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    Stored {
        sequence_number: SequenceNumber,
        shard_id: ShardId,
    },
    Failed {
        code: FailureCode,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryResult {
    /// Position of the entry in the submitted batch.
    pub index: usize,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

/// Per-entry results of a batch call, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    entries: Vec<EntryResult>,
}

impl BatchResult {
    /// Pair backend outcomes with their submission index.
    pub fn from_outcomes(outcomes: Vec<EntryOutcome>) -> Self {
        let entries = outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| EntryResult { index, outcome })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[EntryResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stored(&self) -> impl Iterator<Item = (usize, &SequenceNumber)> {
        self.entries.iter().filter_map(|e| match &e.outcome {
            EntryOutcome::Stored { sequence_number, .. } => Some((e.index, sequence_number)),
            EntryOutcome::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, FailureCode, &str)> {
        self.entries.iter().filter_map(|e| match &e.outcome {
            EntryOutcome::Failed { code, message } => Some((e.index, *code, message.as_str())),
            EntryOutcome::Stored { .. } => None,
        })
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }

    /// Indices of failed entries worth resubmitting.
    pub fn retry_indices(&self) -> Vec<usize> {
        self.failures()
            .filter(|(_, code, _)| code.is_retry_safe())
            .map(|(i, _, _)| i)
            .collect()
    }

    /// Batch of exactly the retry-safe failed entries of `submitted`,
    /// with their original indices. `None` when nothing is worth retrying.
    pub fn retry_batch(&self, submitted: &Batch) -> Option<(Batch, Vec<usize>)> {
        let indices = self.retry_indices();
        if indices.is_empty() {
            return None;
        }
        Some((submitted.select(&indices), indices))
    }
}

// ════════════════════════════════════════════════════════════════
//  Read side
// ════════════════════════════════════════════════════════════════

/// A record as returned by a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub sequence_number: SequenceNumber,
    pub partition_key: PartitionKey,
    pub payload: Vec<u8>,
    /// Arrival time at the backend, Unix ms.
    pub arrival_ms: i64,
}

/// Result of one pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPage {
    pub records: Vec<StreamRecord>,
    /// Where to continue. `None` once a closed shard is fully read.
    pub next: Option<StreamPosition>,
    /// How far the last returned record is behind the shard tip.
    pub millis_behind_latest: u64,
}

impl RecordPage {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Shard closed and every record delivered.
    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(payload: &str, key: &str) -> BatchEntry {
        BatchEntry::new(payload.as_bytes().to_vec(), PartitionKey::new(key).unwrap())
    }

    #[test]
    fn sequence_numbers_order_numerically() {
        let small = SequenceNumber::parse("9").unwrap();
        let big = SequenceNumber::parse("10").unwrap();
        let huge =
            SequenceNumber::parse("49647769585298572699646905094020095640747936436373684242").unwrap();
        assert!(small < big);
        assert!(big < huge);
        assert_eq!(SequenceNumber::parse("007").unwrap(), SequenceNumber::parse("7").unwrap());
    }

    #[test]
    fn sequence_number_rejects_non_digits() {
        assert!(matches!(
            SequenceNumber::parse("12a"),
            Err(StreamError::InvalidLocator(_))
        ));
        assert!(SequenceNumber::parse("").is_err());
    }

    #[test]
    fn batch_tracks_size() {
        let mut batch = Batch::new();
        batch.push(entry("hello", "k1"));
        batch.push(entry("world!", "k2"));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.size_bytes(), 7 + 8);
    }

    #[test]
    fn batch_validation_limits() {
        let limits = BackendLimits {
            max_batch_records: 2,
            max_batch_bytes: 20,
            max_record_bytes: 10,
            ..BackendLimits::default()
        };
        assert!(Batch::new().validate(&limits).is_err());

        let too_many: Batch = (0..3).map(|_| entry("a", "k")).collect();
        assert!(too_many.validate(&limits).is_err());

        let too_big: Batch = [entry("0123456789", "k")].into_iter().collect();
        assert!(matches!(too_big.validate(&limits), Err(StreamError::Validation(_))));

        let ok: Batch = [entry("abc", "k"), entry("def", "k")].into_iter().collect();
        assert!(ok.validate(&limits).is_ok());
    }

    #[test]
    fn retry_batch_keeps_original_indices() {
        let batch: Batch = [entry("a", "k"), entry("b", "k"), entry("c", "k"), entry("d", "k")]
            .into_iter()
            .collect();
        let result = BatchResult::from_outcomes(vec![
            EntryOutcome::Stored {
                sequence_number: SequenceNumber::from_counter(1),
                shard_id: ShardId::from_index(0),
            },
            EntryOutcome::Failed {
                code: FailureCode::ThroughputExceeded,
                message: "slow down".into(),
            },
            EntryOutcome::Failed {
                code: FailureCode::Rejected,
                message: "no".into(),
            },
            EntryOutcome::Failed {
                code: FailureCode::InternalFailure,
                message: "oops".into(),
            },
        ]);

        assert_eq!(result.failed_count(), 3);
        assert_eq!(result.stored().count(), 1);

        let (retry, indices) = result.retry_batch(&batch).unwrap();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(retry.entries()[0].payload, b"b");
        assert_eq!(retry.entries()[1].payload, b"d");
    }

    #[test]
    fn complete_result_has_nothing_to_retry() {
        let batch: Batch = [entry("a", "k")].into_iter().collect();
        let result = BatchResult::from_outcomes(vec![EntryOutcome::Stored {
            sequence_number: SequenceNumber::from_counter(5),
            shard_id: ShardId::from_index(1),
        }]);
        assert!(result.is_complete());
        assert!(result.retry_batch(&batch).is_none());
    }
}
