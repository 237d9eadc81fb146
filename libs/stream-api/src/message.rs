use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::limits::MAX_PARTITION_KEY_CHARS;

// ═══════════════════════════════════════════════════════════════
//  Message
// ═══════════════════════════════════════════════════════════════

/// Application message carried by the stream. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    title: String,
    id: String,
    code: i64,
}

impl Message {
    pub fn new(title: impl Into<String>, id: impl Into<String>, code: i64) -> Self {
        Self {
            title: title.into(),
            id: id.into(),
            code,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn code(&self) -> i64 {
        self.code
    }
}

// ═══════════════════════════════════════════════════════════════
//  PartitionKey
// ═══════════════════════════════════════════════════════════════

/// Key the backend hashes to pick a shard. 1..=256 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn new(key: impl Into<String>) -> Result<Self, StreamError> {
        let key = key.into();
        let chars = key.chars().count();
        if chars == 0 {
            return Err(StreamError::Validation("partition key is empty".into()));
        }
        if chars > MAX_PARTITION_KEY_CHARS {
            return Err(StreamError::Validation(format!(
                "partition key has {chars} characters, limit is {MAX_PARTITION_KEY_CHARS}"
            )));
        }
        Ok(Self(key))
    }

    /// `bucket-<index>`. Always within the key limits.
    pub fn bucket(index: usize) -> Self {
        Self(format!("bucket-{index}"))
    }

    /// Fresh UUID v4 key, 36 characters.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Size counted against the per-record limit.
    pub fn len_bytes(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PartitionKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PartitionKey::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_key_bounds() {
        assert!(PartitionKey::new("").is_err());
        assert!(PartitionKey::new("k".repeat(256)).is_ok());
        assert!(matches!(
            PartitionKey::new("k".repeat(257)),
            Err(StreamError::Validation(_))
        ));
    }

    #[test]
    fn partition_key_counts_characters_not_bytes() {
        // 256 two-byte characters is still a valid key.
        let key = PartitionKey::new("é".repeat(256)).unwrap();
        assert_eq!(key.len_bytes(), 512);
    }

    #[test]
    fn generated_keys_pass_validation() {
        let bucket = PartitionKey::bucket(usize::MAX);
        assert_eq!(PartitionKey::new(bucket.as_str()).unwrap(), bucket);

        let random = PartitionKey::random();
        assert_eq!(random.as_str().chars().count(), 36);
        assert_eq!(PartitionKey::new(random.as_str()).unwrap(), random);
        assert_ne!(random, PartitionKey::random());
    }

    #[test]
    fn message_accessors() {
        let m = Message::new("Scheduled maintenance coming", "abc", 42);
        assert_eq!(m.title(), "Scheduled maintenance coming");
        assert_eq!(m.id(), "abc");
        assert_eq!(m.code(), 42);
    }
}
