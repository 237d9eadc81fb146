use std::sync::Arc;

use stream_api::{
    BackendLimits, Batch, BatchEntry, BatchResult, Message, PartitionKey, PayloadCodec,
    SequenceNumber, StreamBackend, StreamError,
};

use crate::batcher::RecordBatcher;
use crate::partition::PartitionAssigner;

/// Outcome of [`StreamProducer::send_messages`].
///
/// `results` covers every batch the backend answered, in order. When a
/// whole batch call failed, `error` holds that failure and `unsent` counts
/// the messages of the failed batch and of every batch after it; none of
/// those were stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    pub results: Vec<BatchResult>,
    pub error: Option<StreamError>,
    pub unsent: usize,
}

impl SendReport {
    /// Entries the backend stored.
    pub fn stored(&self) -> usize {
        self.results.iter().map(|r| r.len() - r.failed_count()).sum()
    }

    /// Entries the backend answered with a per-entry failure.
    pub fn failed(&self) -> usize {
        self.results.iter().map(BatchResult::failed_count).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.failed() == 0
    }

    /// Drop the partial results and surface the stopping error, if any.
    pub fn into_result(self) -> Result<Vec<BatchResult>, StreamError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.results),
        }
    }
}

/// Sends records to the backend.
///
/// Holds only immutable collaborators, so one producer can be shared across
/// tasks. Never retries: `Transient` errors and retry-safe per-entry
/// failures are handed back for the caller to act on.
pub struct StreamProducer {
    backend: Arc<dyn StreamBackend>,
    codec: Arc<dyn PayloadCodec>,
    assigner: Arc<dyn PartitionAssigner>,
    batcher: RecordBatcher,
}

impl StreamProducer {
    pub fn new(
        backend: Arc<dyn StreamBackend>,
        codec: Arc<dyn PayloadCodec>,
        assigner: Arc<dyn PartitionAssigner>,
        limits: BackendLimits,
    ) -> Self {
        Self {
            backend,
            codec,
            assigner,
            batcher: RecordBatcher::new(limits),
        }
    }

    pub fn limits(&self) -> &BackendLimits {
        self.batcher.limits()
    }

    pub fn assigner(&self) -> &Arc<dyn PartitionAssigner> {
        &self.assigner
    }

    /// Send one record and wait for the backend to acknowledge it.
    ///
    /// Errors: `Validation` (too large, nothing sent), `Transient`
    /// (retry-safe), `Permanent` (unknown stream and the like).
    pub async fn send_one(
        &self,
        stream: &str,
        payload: Vec<u8>,
        key: PartitionKey,
    ) -> Result<SequenceNumber, StreamError> {
        self.limits().check_entry(payload.len() + key.len_bytes())?;

        let seq = self
            .backend
            .put_record(stream, payload, key)
            .await
            .map_err(|e| e.with_context(format!("put_record to '{stream}'")))?;
        tracing::debug!(stream = %stream, sequence = %seq, "record acknowledged");
        Ok(seq)
    }

    /// Send up to one batch worth of records in a single call.
    ///
    /// Per-entry failures come back inside the `BatchResult` with their
    /// original index. An `Err` means the whole call failed and nothing from
    /// this batch should be assumed stored.
    pub async fn send_batch(&self, stream: &str, batch: Batch) -> Result<BatchResult, StreamError> {
        batch.validate(self.limits())?;
        let submitted = batch.len();

        let outcomes = self
            .backend
            .put_records(stream, batch.into_entries())
            .await
            .map_err(|e| e.with_context(format!("put_records to '{stream}'")))?;
        if outcomes.len() != submitted {
            return Err(StreamError::Permanent(format!(
                "backend answered {} outcomes for {submitted} entries",
                outcomes.len()
            )));
        }

        let result = BatchResult::from_outcomes(outcomes);
        let failed = result.failed_count();
        if failed > 0 {
            tracing::warn!(
                stream = %stream,
                failed,
                retryable = result.retry_indices().len(),
                submitted,
                "batch partially failed"
            );
        } else {
            tracing::debug!(stream = %stream, submitted, "batch stored");
        }
        Ok(result)
    }

    /// Encode, key and send a single message.
    pub async fn send_message(
        &self,
        stream: &str,
        message: &Message,
    ) -> Result<SequenceNumber, StreamError> {
        let payload = self.codec.encode(message)?;
        let key = self.assigner.assign(message);
        self.send_one(stream, payload, key).await
    }

    /// Batch and send messages, one backend call per batch, in order.
    ///
    /// `Err` means nothing reached the backend: a message failed to encode
    /// or to fit. Once sending starts the outcome is always a
    /// [`SendReport`]. A whole-call failure stops the run and is kept in
    /// `error`, next to the results of the batches stored before it.
    /// Partial failures do not stop the run.
    pub async fn send_messages(
        &self,
        stream: &str,
        messages: &[Message],
    ) -> Result<SendReport, StreamError> {
        let batches = self
            .batcher
            .batch(messages, self.codec.as_ref(), self.assigner.as_ref())?;
        let total = batches.len();
        let mut report = SendReport::default();
        let mut pending = batches.into_iter();
        while let Some(batch) = pending.next() {
            let submitted = batch.len();
            match self.send_batch(stream, batch).await {
                Ok(result) => report.results.push(result),
                Err(e) => {
                    report.unsent = submitted + pending.by_ref().map(|b| b.len()).sum::<usize>();
                    tracing::warn!(
                        stream = %stream,
                        error = %e,
                        completed = report.results.len(),
                        batches = total,
                        unsent = report.unsent,
                        "batch run stopped"
                    );
                    report.error = Some(e);
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Build a batch from raw entries, keyed by the caller.
    pub fn batch_entries(
        &self,
        entries: impl IntoIterator<Item = BatchEntry>,
    ) -> Result<Vec<Batch>, StreamError> {
        self.batcher.batch_entries(entries)
    }
}
