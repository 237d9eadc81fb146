use std::sync::Arc;

use stream_api::{
    BackendLimits, Locator, Message, PayloadCodec, RecordPage, SequenceNumber, ShardId,
    StreamBackend, StreamError, StreamPosition,
};

/// Reads records from shards.
///
/// Stateless apart from its collaborators: every position is passed in by
/// the caller. Use [`ShardCursor`] to have the position chain tracked.
#[derive(Clone)]
pub struct StreamConsumer {
    backend: Arc<dyn StreamBackend>,
    limits: BackendLimits,
}

/// A page with payloads decoded into messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPage {
    /// Sequence number and message, in shard order.
    pub messages: Vec<(SequenceNumber, Message)>,
    pub next: Option<StreamPosition>,
    pub millis_behind_latest: u64,
}

impl StreamConsumer {
    pub fn new(backend: Arc<dyn StreamBackend>, limits: BackendLimits) -> Self {
        Self { backend, limits }
    }

    pub async fn list_shards(&self, stream: &str) -> Result<Vec<ShardId>, StreamError> {
        self.backend.list_shards(stream).await
    }

    /// Resolve a locator into a position handle.
    ///
    /// Errors: `UnknownShard`, `InvalidLocator`, `Permanent` (unknown stream).
    pub async fn resolve_position(
        &self,
        stream: &str,
        shard: &ShardId,
        locator: &Locator,
    ) -> Result<StreamPosition, StreamError> {
        let position = self.backend.get_position(stream, shard, locator).await?;
        tracing::debug!(stream = %stream, shard = %shard, locator = %locator, "resolved position");
        Ok(position)
    }

    /// Pull up to `max_records` from `position`.
    ///
    /// An empty page whose `next` equals `position` means "caught up, poll
    /// again later". `next == None` means the shard is closed and drained.
    /// A stale position fails with `ExpiredIterator`; re-resolve it.
    pub async fn pull(
        &self,
        position: &StreamPosition,
        max_records: usize,
    ) -> Result<RecordPage, StreamError> {
        self.limits.check_pull_limit(max_records)?;
        let page = self.backend.get_records(position, max_records).await?;
        tracing::debug!(
            records = page.records.len(),
            behind_ms = page.millis_behind_latest,
            exhausted = page.is_exhausted(),
            "pulled page"
        );
        Ok(page)
    }

    /// Pull, then decode every payload with `codec`.
    ///
    /// A payload that fails to decode fails the whole call with `Codec`;
    /// nothing is skipped silently.
    pub async fn pull_decoded(
        &self,
        position: &StreamPosition,
        max_records: usize,
        codec: &dyn PayloadCodec,
    ) -> Result<DecodedPage, StreamError> {
        let page = self.pull(position, max_records).await?;
        decode_page(page, codec)
    }
}

pub fn decode_page(page: RecordPage, codec: &dyn PayloadCodec) -> Result<DecodedPage, StreamError> {
    let mut messages = Vec::with_capacity(page.records.len());
    for record in page.records {
        let message = codec
            .decode(&record.payload)
            .map_err(|e| e.with_context(format!("record {}", record.sequence_number)))?;
        messages.push((record.sequence_number, message));
    }
    Ok(DecodedPage {
        messages,
        next: page.next,
        millis_behind_latest: page.millis_behind_latest,
    })
}

// ═══════════════════════════════════════════════════════════════
//  ShardCursor
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    Unpositioned,
    Positioned(StreamPosition),
    /// Shard closed and fully read.
    Exhausted,
}

/// Follows the position chain of one shard.
///
/// `Unpositioned → Positioned → Positioned … → Exhausted`. On
/// `ExpiredIterator` the cursor drops back to `Unpositioned` and the caller
/// re-positions it from a locator.
pub struct ShardCursor {
    consumer: StreamConsumer,
    stream: String,
    shard: ShardId,
    state: CursorState,
}

impl ShardCursor {
    pub fn new(consumer: StreamConsumer, stream: impl Into<String>, shard: ShardId) -> Self {
        Self {
            consumer,
            stream: stream.into(),
            shard,
            state: CursorState::Unpositioned,
        }
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    /// (Re)position at `locator`. Allowed from any state but `Exhausted`.
    pub async fn position(&mut self, locator: &Locator) -> Result<(), StreamError> {
        if self.state == CursorState::Exhausted {
            return Err(StreamError::InvalidState(format!(
                "shard {} is exhausted",
                self.shard
            )));
        }
        let position = self
            .consumer
            .resolve_position(&self.stream, &self.shard, locator)
            .await?;
        self.state = CursorState::Positioned(position);
        Ok(())
    }

    /// Pull the next page and advance.
    pub async fn next_page(&mut self, max_records: usize) -> Result<RecordPage, StreamError> {
        let position = match &self.state {
            CursorState::Positioned(p) => p.clone(),
            CursorState::Unpositioned => {
                return Err(StreamError::InvalidState(format!(
                    "shard {} has no position; call position() first",
                    self.shard
                )));
            }
            CursorState::Exhausted => {
                return Err(StreamError::InvalidState(format!(
                    "shard {} is exhausted",
                    self.shard
                )));
            }
        };

        let page = match self.consumer.pull(&position, max_records).await {
            Ok(page) => page,
            Err(e @ StreamError::ExpiredIterator(_)) => {
                tracing::warn!(shard = %self.shard, "position expired, cursor reset");
                self.state = CursorState::Unpositioned;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.state = match &page.next {
            Some(next) => CursorState::Positioned(next.clone()),
            None => {
                tracing::info!(stream = %self.stream, shard = %self.shard, "shard exhausted");
                CursorState::Exhausted
            }
        };
        Ok(page)
    }
}
