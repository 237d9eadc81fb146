use std::future::Future;
use std::pin::Pin;

use crate::error::StreamError;
use crate::message::PartitionKey;
use crate::position::{Locator, StreamPosition};
use crate::record::{BatchEntry, EntryOutcome, RecordPage, SequenceNumber, ShardId};

/// Streaming backend the producer and consumer talk to.
///
/// Every method is exactly one request/response round trip. Implementations
/// must not retry internally; retry policy belongs to the caller.
///
/// Implementations: in-memory backend (plugins/backend/memory).
pub trait StreamBackend: Send + Sync {
    /// Store one record. Returns its sequence number.
    fn put_record(
        &self,
        stream: &str,
        payload: Vec<u8>,
        key: PartitionKey,
    ) -> Pin<Box<dyn Future<Output = Result<SequenceNumber, StreamError>> + Send + '_>>;

    /// Store up to 500 records in one call.
    ///
    /// Returns one outcome per entry, in submission order. An `Err` means the
    /// whole call was rejected and nothing was stored.
    fn put_records(
        &self,
        stream: &str,
        entries: Vec<BatchEntry>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<EntryOutcome>, StreamError>> + Send + '_>>;

    /// Turn a locator into a readable position within a shard.
    fn get_position(
        &self,
        stream: &str,
        shard: &ShardId,
        locator: &Locator,
    ) -> Pin<Box<dyn Future<Output = Result<StreamPosition, StreamError>> + Send + '_>>;

    /// Read up to `limit` records from `position` forward.
    fn get_records(
        &self,
        position: &StreamPosition,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<RecordPage, StreamError>> + Send + '_>>;

    /// Shards of a stream, in id order.
    fn list_shards(
        &self,
        stream: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ShardId>, StreamError>> + Send + '_>>;
}
