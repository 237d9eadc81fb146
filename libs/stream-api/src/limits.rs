use serde::Deserialize;

use crate::error::StreamError;

pub const MAX_BATCH_RECORDS: usize = 500;
pub const MAX_BATCH_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;
pub const MAX_PARTITION_KEY_CHARS: usize = 256;
pub const MAX_RECORDS_PER_PULL: usize = 10_000;

/// Size ceilings enforced by the backend. Producers check them locally so
/// oversized input fails as a validation error instead of a rejected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BackendLimits {
    #[serde(default = "default_max_batch_records")]
    pub max_batch_records: usize,
    /// Aggregate ceiling of one batch call, payloads plus keys.
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,
    /// Ceiling of one entry, payload plus key.
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
    #[serde(default = "default_max_records_per_pull")]
    pub max_records_per_pull: usize,
}

fn default_max_batch_records() -> usize {
    MAX_BATCH_RECORDS
}
fn default_max_batch_bytes() -> usize {
    MAX_BATCH_BYTES
}
fn default_max_record_bytes() -> usize {
    MAX_RECORD_BYTES
}
fn default_max_records_per_pull() -> usize {
    MAX_RECORDS_PER_PULL
}

impl Default for BackendLimits {
    fn default() -> Self {
        Self {
            max_batch_records: MAX_BATCH_RECORDS,
            max_batch_bytes: MAX_BATCH_BYTES,
            max_record_bytes: MAX_RECORD_BYTES,
            max_records_per_pull: MAX_RECORDS_PER_PULL,
        }
    }
}

impl BackendLimits {
    /// Check a single entry size (payload + key bytes).
    pub fn check_entry(&self, entry_bytes: usize) -> Result<(), StreamError> {
        if entry_bytes > self.max_record_bytes {
            return Err(StreamError::Validation(format!(
                "record of {entry_bytes} bytes exceeds per-record limit of {} bytes",
                self.max_record_bytes
            )));
        }
        if entry_bytes > self.max_batch_bytes {
            return Err(StreamError::Validation(format!(
                "record of {entry_bytes} bytes exceeds per-call limit of {} bytes",
                self.max_batch_bytes
            )));
        }
        Ok(())
    }

    pub fn check_pull_limit(&self, max_records: usize) -> Result<(), StreamError> {
        if max_records == 0 || max_records > self.max_records_per_pull {
            return Err(StreamError::Validation(format!(
                "pull limit must be within 1..={}, got {max_records}",
                self.max_records_per_pull
            )));
        }
        Ok(())
    }
}
