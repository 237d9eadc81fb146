//! Producer and consumer against the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use backend_memory::{Fault, MemoryBackend};
use codec_json::JsonCodec;
use stream_api::{
    BackendLimits, Batch, BatchEntry, FailureCode, Locator, Message, PartitionKey, ShardId,
    StreamBackend, StreamError,
};
use stream_engine::{ConstantKey, CursorState, RoundRobin, ShardCursor, StreamConsumer, StreamProducer};

const STREAM: &str = "kinesis-integration-lambda-test";

async fn setup(backend: MemoryBackend, shards: usize) -> (Arc<MemoryBackend>, StreamProducer, StreamConsumer) {
    backend.create_stream(STREAM, shards).await.unwrap();
    let backend = Arc::new(backend);
    let dyn_backend: Arc<dyn StreamBackend> = backend.clone();
    let producer = StreamProducer::new(
        dyn_backend.clone(),
        Arc::new(JsonCodec::new()),
        Arc::new(ConstantKey::random()),
        BackendLimits::default(),
    );
    let consumer = StreamConsumer::new(dyn_backend, BackendLimits::default());
    (backend, producer, consumer)
}

fn entry(payload: &str) -> BatchEntry {
    BatchEntry::new(payload.as_bytes().to_vec(), PartitionKey::new("k").unwrap())
}

fn notification(i: i64) -> Message {
    Message::new("New content available for IPA", format!("id-{i}"), i)
}

#[tokio::test]
async fn partial_batch_failure_is_reported_per_entry() {
    let (backend, producer, _) = setup(MemoryBackend::default(), 1).await;
    backend
        .inject_fault(Fault::FailEntries(vec![(1, FailureCode::ThroughputExceeded)]))
        .await;

    let batch: Batch = [entry("a"), entry("b"), entry("c")].into_iter().collect();
    let result = producer.send_batch(STREAM, batch.clone()).await.unwrap();

    let stored: Vec<_> = result.stored().map(|(i, _)| i).collect();
    assert_eq!(stored, vec![0, 2]);

    let failures: Vec<_> = result.failures().collect();
    assert_eq!(failures.len(), 1);
    let (index, code, _) = failures[0];
    assert_eq!(index, 1);
    assert!(code.is_retry_safe());

    // Resubmitting only the failed subset stores exactly that entry.
    let (retry, original) = result.retry_batch(&batch).unwrap();
    assert_eq!(original, vec![1]);
    let retried = producer.send_batch(STREAM, retry).await.unwrap();
    assert!(retried.is_complete());
    assert_eq!(backend.shard_len(STREAM, &ShardId::from_index(0)).await.unwrap(), 3);
}

#[tokio::test]
async fn whole_call_outage_is_a_transient_error() {
    let (backend, producer, _) = setup(MemoryBackend::default(), 1).await;
    backend.inject_fault(Fault::Unavailable).await;

    let batch: Batch = [entry("a"), entry("b")].into_iter().collect();
    let err = producer.send_batch(STREAM, batch).await.unwrap_err();
    assert!(matches!(err, StreamError::Transient(_)));
    assert!(err.is_retry_safe());
    assert_eq!(backend.shard_len(STREAM, &ShardId::from_index(0)).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_stream_is_permanent() {
    let (_, producer, _) = setup(MemoryBackend::default(), 1).await;
    let err = producer
        .send_message("no-such-stream", &notification(1))
        .await
        .unwrap_err();
    assert!(matches!(err, StreamError::Permanent(_)));
    assert!(!err.is_retry_safe());
}

#[tokio::test]
async fn trim_horizon_pull_is_ordered() {
    let (_, producer, consumer) = setup(MemoryBackend::default(), 1).await;
    for i in 0..20 {
        producer.send_message(STREAM, &notification(i)).await.unwrap();
    }

    let shard = ShardId::from_index(0);
    let position = consumer
        .resolve_position(STREAM, &shard, &Locator::TrimHorizon)
        .await
        .unwrap();
    let page = consumer.pull(&position, 100).await.unwrap();

    assert_eq!(page.records.len(), 20);
    assert!(page
        .records
        .windows(2)
        .all(|w| w[0].sequence_number <= w[1].sequence_number));
}

#[tokio::test]
async fn caught_up_pull_returns_same_position() {
    let (_, producer, consumer) = setup(MemoryBackend::default(), 1).await;
    producer.send_message(STREAM, &notification(1)).await.unwrap();

    let shard = ShardId::from_index(0);
    let start = consumer
        .resolve_position(STREAM, &shard, &Locator::TrimHorizon)
        .await
        .unwrap();
    let first = consumer.pull(&start, 100).await.unwrap();
    assert_eq!(first.records.len(), 1);
    let next = first.next.unwrap();

    let idle = consumer.pull(&next, 100).await.unwrap();
    assert!(idle.is_empty());
    assert_eq!(idle.next.as_ref(), Some(&next));

    // Still valid for polling after new data arrives.
    producer.send_message(STREAM, &notification(2)).await.unwrap();
    let later = consumer.pull(&next, 100).await.unwrap();
    assert_eq!(later.records.len(), 1);
}

#[tokio::test]
async fn batch_send_round_trips_through_decode() {
    let (backend, producer, consumer) = setup(MemoryBackend::default(), 2).await;
    let messages: Vec<_> = (0..500).map(notification).collect();

    let report = producer.send_messages(STREAM, &messages).await.unwrap();
    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].is_complete());
    assert!(report.is_complete());

    // Constant key: every record sits in exactly one shard.
    let mut decoded = Vec::new();
    for shard in consumer.list_shards(STREAM).await.unwrap() {
        if backend.shard_len(STREAM, &shard).await.unwrap() == 0 {
            continue;
        }
        let position = consumer
            .resolve_position(STREAM, &shard, &Locator::TrimHorizon)
            .await
            .unwrap();
        let page = consumer
            .pull_decoded(&position, 1000, &JsonCodec::new())
            .await
            .unwrap();
        decoded.extend(page.messages.into_iter().map(|(_, m)| m));
    }
    assert_eq!(decoded, messages);
}

#[tokio::test]
async fn outage_mid_run_reports_stored_batches() {
    let (backend, producer, _) = setup(MemoryBackend::default(), 1).await;
    // First batch call succeeds untouched, the second hits an outage.
    backend.inject_fault(Fault::FailEntries(vec![])).await;
    backend.inject_fault(Fault::Unavailable).await;
    let messages: Vec<_> = (0..1001).map(notification).collect();

    let report = producer.send_messages(STREAM, &messages).await.unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.stored(), 500);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.unsent, 501);
    assert!(matches!(report.error, Some(StreamError::Transient(_))));
    assert_eq!(
        backend.shard_len(STREAM, &ShardId::from_index(0)).await.unwrap(),
        500
    );
}

#[tokio::test]
async fn at_timestamp_reads_from_the_cut() {
    let (_, producer, consumer) = setup(MemoryBackend::default(), 1).await;
    producer.send_message(STREAM, &notification(0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let cut = stream_api::now_ms();
    tokio::time::sleep(Duration::from_millis(5)).await;
    producer.send_message(STREAM, &notification(1)).await.unwrap();

    let position = consumer
        .resolve_position(STREAM, &ShardId::from_index(0), &Locator::AtTimestamp(cut))
        .await
        .unwrap();
    let page = consumer
        .pull_decoded(&position, 100, &JsonCodec::new())
        .await
        .unwrap();
    let read: Vec<_> = page.messages.into_iter().map(|(_, m)| m).collect();
    assert_eq!(read, vec![notification(1)]);
}

#[tokio::test]
async fn round_robin_spreads_across_shards() {
    let backend = MemoryBackend::default();
    backend.create_stream(STREAM, 4).await.unwrap();
    let backend = Arc::new(backend);
    let producer = StreamProducer::new(
        backend.clone(),
        Arc::new(JsonCodec::new()),
        Arc::new(RoundRobin::with_buckets(64)),
        BackendLimits::default(),
    );
    let messages: Vec<_> = (0..256).map(notification).collect();
    producer.send_messages(STREAM, &messages).await.unwrap();

    let mut used = 0;
    for i in 0..4 {
        if backend.shard_len(STREAM, &ShardId::from_index(i)).await.unwrap() > 0 {
            used += 1;
        }
    }
    assert!(used > 1, "records should not all land on one shard");
}

#[tokio::test]
async fn positioning_errors() {
    let (_, _, consumer) = setup(MemoryBackend::default(), 1).await;
    let err = consumer
        .resolve_position(STREAM, &ShardId::new("shardId-000000000001"), &Locator::TrimHorizon)
        .await
        .unwrap_err();
    assert!(matches!(err, StreamError::UnknownShard { .. }));

    let locator = Locator::from_parts(
        "at_sequence",
        Some("49647769585298572699646905094020095640747936436373684242"),
        None,
    )
    .unwrap();
    let err = consumer
        .resolve_position(STREAM, &ShardId::from_index(0), &locator)
        .await
        .unwrap_err();
    assert!(matches!(err, StreamError::InvalidLocator(_)));
}

#[tokio::test]
async fn cursor_walks_closed_shard_to_exhaustion() {
    let (backend, producer, consumer) = setup(MemoryBackend::default(), 1).await;
    for i in 0..3 {
        producer.send_message(STREAM, &notification(i)).await.unwrap();
    }
    let shard = ShardId::from_index(0);
    backend.close_shard(STREAM, &shard).await.unwrap();

    let mut cursor = ShardCursor::new(consumer, STREAM, shard);
    assert_eq!(cursor.state(), &CursorState::Unpositioned);
    assert!(matches!(cursor.next_page(2).await, Err(StreamError::InvalidState(_))));

    cursor.position(&Locator::TrimHorizon).await.unwrap();
    let first = cursor.next_page(2).await.unwrap();
    assert_eq!(first.records.len(), 2);
    assert!(matches!(cursor.state(), CursorState::Positioned(_)));

    let last = cursor.next_page(2).await.unwrap();
    assert_eq!(last.records.len(), 1);
    assert!(last.is_exhausted());
    assert_eq!(cursor.state(), &CursorState::Exhausted);

    assert!(matches!(cursor.next_page(2).await, Err(StreamError::InvalidState(_))));
    assert!(matches!(
        cursor.position(&Locator::TrimHorizon).await,
        Err(StreamError::InvalidState(_))
    ));
}

#[tokio::test]
async fn expired_position_resets_cursor() {
    let backend = MemoryBackend::default().with_iterator_ttl(Duration::ZERO);
    let (_, producer, consumer) = setup(backend, 1).await;
    producer.send_message(STREAM, &notification(1)).await.unwrap();

    let err = consumer
        .pull(
            &consumer
                .resolve_position(STREAM, &ShardId::from_index(0), &Locator::TrimHorizon)
                .await
                .unwrap(),
            10,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StreamError::ExpiredIterator(_)));

    let mut cursor = ShardCursor::new(consumer, STREAM, ShardId::from_index(0));
    cursor.position(&Locator::TrimHorizon).await.unwrap();
    let err = cursor.next_page(10).await.unwrap_err();
    assert!(matches!(err, StreamError::ExpiredIterator(_)));
    assert_eq!(cursor.state(), &CursorState::Unpositioned);
}

#[tokio::test]
async fn undecodable_payload_is_a_codec_error() {
    let (_, producer, consumer) = setup(MemoryBackend::default(), 1).await;
    producer
        .send_one(STREAM, b"not json".to_vec(), PartitionKey::new("k").unwrap())
        .await
        .unwrap();
    let position = consumer
        .resolve_position(STREAM, &ShardId::from_index(0), &Locator::TrimHorizon)
        .await
        .unwrap();
    let err = consumer
        .pull_decoded(&position, 10, &JsonCodec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StreamError::Codec(_)));
}
