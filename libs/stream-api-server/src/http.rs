use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use stream_api::{Locator, Message, ShardId};
use stream_engine::SendReport;

use super::error::ApiError;
use super::{AppState, BATCH_SEND_COUNT};

// ═══════════════════════════════════════════════════════════════
//  GET /quarkus-kinesis/1
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize)]
pub struct SendOneResponse {
    pub sequence_number: String,
    pub id: String,
}

pub(crate) async fn handle_send_one(
    State(state): State<AppState>,
) -> Result<Json<SendOneResponse>, ApiError> {
    let message = state.source.single();
    let seq = state.producer.send_message(&state.stream, &message).await?;
    tracing::info!(stream = %state.stream, id = %message.id(), sequence = %seq, "notification sent");

    Ok(Json(SendOneResponse {
        sequence_number: seq.to_string(),
        id: message.id().to_string(),
    }))
}

// ═══════════════════════════════════════════════════════════════
//  GET /quarkus-kinesis/500
// ═══════════════════════════════════════════════════════════════

/// Counts from one batch run. `error` is set when the run stopped early;
/// `unsent` messages were never stored.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchSendResponse {
    pub sent: usize,
    pub failed: usize,
    pub batches: usize,
    #[serde(default)]
    pub unsent: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&SendReport> for BatchSendResponse {
    fn from(report: &SendReport) -> Self {
        Self {
            sent: report.stored(),
            failed: report.failed(),
            batches: report.results.len(),
            unsent: report.unsent,
            error: report.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Answers with the error's status when the run stopped early, keeping the
/// counts of what was already stored in the body.
pub(crate) async fn handle_send_batch(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<BatchSendResponse>), ApiError> {
    let messages = state.source.batch(BATCH_SEND_COUNT);
    let report = state.producer.send_messages(&state.stream, &messages).await?;

    let body = BatchSendResponse::from(&report);
    let status = match report.error {
        Some(e) => ApiError(e).status(),
        None => StatusCode::OK,
    };
    tracing::info!(
        stream = %state.stream,
        sent = body.sent,
        failed = body.failed,
        unsent = body.unsent,
        batches = body.batches,
        status = status.as_u16(),
        "notifications sent"
    );
    Ok((status, Json(body)))
}

// ═══════════════════════════════════════════════════════════════
//  GET /quarkus-kinesis/get?shard=&locator=&sequence=&timestamp=&limit=
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReadParams {
    shard: Option<String>,
    locator: Option<String>,
    sequence: Option<String>,
    timestamp: Option<i64>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadRecord {
    pub sequence_number: String,
    #[serde(flatten)]
    pub message: Message,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadResponse {
    pub stream: String,
    pub shard: String,
    pub count: usize,
    pub millis_behind_latest: u64,
    /// Continuation token; absent once a closed shard is fully read.
    pub next: Option<String>,
    pub messages: Vec<ReadRecord>,
}

pub(crate) async fn handle_read(
    State(state): State<AppState>,
    Query(params): Query<ReadParams>,
) -> Result<Json<ReadResponse>, ApiError> {
    let shard = params
        .shard
        .map(ShardId::new)
        .unwrap_or_else(|| state.defaults.shard.clone());
    let locator = match params.locator.as_deref() {
        Some(kind) => Locator::from_parts(kind, params.sequence.as_deref(), params.timestamp)?,
        // A bare sequence number means "start there".
        None => match params.sequence.as_deref() {
            Some(seq) => Locator::from_parts("at_sequence", Some(seq), None)?,
            None => state.defaults.locator.clone(),
        },
    };
    let limit = params.limit.unwrap_or(state.defaults.limit);

    let position = state
        .consumer
        .resolve_position(&state.stream, &shard, &locator)
        .await?;
    let page = state
        .consumer
        .pull_decoded(&position, limit, state.codec.as_ref())
        .await?;

    for (seq, message) in &page.messages {
        tracing::info!(sequence = %seq, id = %message.id(), title = %message.title(), "record");
    }
    tracing::info!(stream = %state.stream, shard = %shard, count = page.messages.len(), "read records");

    let messages: Vec<ReadRecord> = page
        .messages
        .into_iter()
        .map(|(seq, message)| ReadRecord {
            sequence_number: seq.to_string(),
            message,
        })
        .collect();

    Ok(Json(ReadResponse {
        stream: state.stream.to_string(),
        shard: shard.to_string(),
        count: messages.len(),
        millis_behind_latest: page.millis_behind_latest,
        next: page.next.map(|p| p.token().to_string()),
        messages,
    }))
}
