pub mod backend;
pub mod codec;
pub mod error;
pub mod limits;
pub mod message;
pub mod position;
pub mod record;

pub use backend::StreamBackend;
pub use codec::PayloadCodec;
pub use error::{ErrorKind, StreamError};
pub use limits::BackendLimits;
pub use message::{Message, PartitionKey};
pub use position::{Locator, StreamPosition};
pub use record::{
    Batch, BatchEntry, BatchResult, EntryOutcome, EntryResult, FailureCode, RecordPage,
    SequenceNumber, ShardId, StreamRecord,
};

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
