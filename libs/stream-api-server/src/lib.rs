mod error;
mod http;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio_util::sync::CancellationToken;

use stream_api::{Locator, Message, PayloadCodec, ShardId};
use stream_engine::{StreamConsumer, StreamProducer};

pub use error::ApiError;
pub use http::{BatchSendResponse, ReadResponse, ReadRecord, SendOneResponse};

/// Notifications sent by the batch endpoint per request.
pub const BATCH_SEND_COUNT: usize = 500;

/// Supplies the messages the send endpoints publish.
///
/// Called once per request; implementations keep no state shared between
/// requests beyond what they need to stay random.
pub trait MessageSource: Send + Sync {
    /// A message for a single send.
    fn single(&self) -> Message;

    /// `count` messages for a batch send.
    fn batch(&self, count: usize) -> Vec<Message>;
}

/// Where `/get` reads when the query string leaves a field out.
#[derive(Debug, Clone)]
pub struct ReadDefaults {
    pub shard: ShardId,
    pub locator: Locator,
    pub limit: usize,
}

impl Default for ReadDefaults {
    fn default() -> Self {
        Self {
            shard: ShardId::from_index(0),
            locator: Locator::TrimHorizon,
            limit: 100,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    producer: Arc<StreamProducer>,
    consumer: StreamConsumer,
    codec: Arc<dyn PayloadCodec>,
    source: Arc<dyn MessageSource>,
    stream: Arc<str>,
    defaults: ReadDefaults,
}

impl AppState {
    pub fn new(
        producer: Arc<StreamProducer>,
        consumer: StreamConsumer,
        codec: Arc<dyn PayloadCodec>,
        source: Arc<dyn MessageSource>,
        stream: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            producer,
            consumer,
            codec,
            source,
            stream: stream.into(),
            defaults: ReadDefaults::default(),
        }
    }

    pub fn with_read_defaults(mut self, defaults: ReadDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/quarkus-kinesis/1", get(http::handle_send_one))
        .route("/quarkus-kinesis/500", get(http::handle_send_batch))
        .route("/quarkus-kinesis/get", get(http::handle_read))
        .with_state(state)
}

/// Serve the REST shim until `shutdown` fires.
pub async fn run(port: u16, state: AppState, shutdown: CancellationToken) -> Result<(), String> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;
    tracing::info!(port, "api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}
