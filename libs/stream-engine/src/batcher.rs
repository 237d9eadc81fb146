use stream_api::{BackendLimits, Batch, BatchEntry, Message, PayloadCodec, StreamError};

use crate::partition::PartitionAssigner;

/// Splits outgoing records into batches the backend accepts in one call.
///
/// Pure: encodes, assigns keys and chunks, nothing else. Chunks are
/// consecutive runs of the input, so input order is kept within and across
/// batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordBatcher {
    limits: BackendLimits,
}

impl RecordBatcher {
    pub fn new(limits: BackendLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &BackendLimits {
        &self.limits
    }

    /// Encode and key every message, then chunk.
    ///
    /// Fails with `Validation` if any single message cannot fit a batch even
    /// alone; in that case no batches are returned.
    pub fn batch(
        &self,
        messages: &[Message],
        codec: &dyn PayloadCodec,
        assigner: &dyn PartitionAssigner,
    ) -> Result<Vec<Batch>, StreamError> {
        let mut entries = Vec::with_capacity(messages.len());
        for (i, message) in messages.iter().enumerate() {
            let payload = codec
                .encode(message)
                .map_err(|e| e.with_context(format!("message {i} ({})", message.id())))?;
            let entry = BatchEntry::new(payload, assigner.assign(message));
            self.limits
                .check_entry(entry.size_bytes())
                .map_err(|e| e.with_context(format!("message {i} ({})", message.id())))?;
            entries.push(entry);
        }
        self.batch_entries(entries)
    }

    /// Chunk already-encoded entries.
    pub fn batch_entries(
        &self,
        entries: impl IntoIterator<Item = BatchEntry>,
    ) -> Result<Vec<Batch>, StreamError> {
        let mut batches = Vec::new();
        let mut current = Batch::new();

        for (i, entry) in entries.into_iter().enumerate() {
            self.limits
                .check_entry(entry.size_bytes())
                .map_err(|e| e.with_context(format!("entry {i}")))?;
            if !current.fits(&entry, &self.limits) {
                batches.push(std::mem::take(&mut current));
            }
            current.push(entry);
        }
        if !current.is_empty() {
            batches.push(current);
        }

        tracing::trace!(batches = batches.len(), "batched records");
        Ok(batches)
    }
}
