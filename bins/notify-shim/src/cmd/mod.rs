pub mod get;
pub mod send;
pub mod serve;

use std::sync::Arc;

use backend_memory::MemoryBackend;
use codec_json::JsonCodec;
use stream_api::StreamBackend;
use stream_engine::{StreamConsumer, StreamProducer};

use crate::config::Effective;
use crate::error::ShimError;
use crate::notification::NotificationGenerator;

/// Backend, producer, consumer and generator wired from the effective config.
pub struct Runtime {
    pub producer: Arc<StreamProducer>,
    pub consumer: StreamConsumer,
    pub codec: Arc<JsonCodec>,
    pub generator: Arc<NotificationGenerator>,
}

impl Runtime {
    pub async fn start(eff: &Effective) -> Result<Self, ShimError> {
        let limits = eff.backend.limits;
        let backend = MemoryBackend::new(eff.backend.clone());
        backend.create_stream(&eff.stream, eff.backend.shards).await?;
        tracing::info!(
            stream = %eff.stream,
            shards = eff.backend.shards,
            partition = ?eff.partition,
            "stream ready"
        );

        let backend: Arc<dyn StreamBackend> = Arc::new(backend);
        let codec = Arc::new(JsonCodec::pretty());
        let producer = StreamProducer::new(
            backend.clone(),
            codec.clone(),
            eff.partition.build(eff.partition_buckets),
            limits,
        );

        Ok(Self {
            producer: Arc::new(producer),
            consumer: StreamConsumer::new(backend, limits),
            codec,
            generator: Arc::new(NotificationGenerator::new(eff.seed)),
        })
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ShimError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
