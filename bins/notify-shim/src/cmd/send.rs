use stream_api_server::{BatchSendResponse, MessageSource, SendOneResponse};

use super::{Runtime, print_json};
use crate::config::{Effective, SendBatchArgs};
use crate::error::ShimError;

pub async fn run_one(eff: &Effective) -> Result<(), ShimError> {
    let rt = Runtime::start(eff).await?;
    let message = rt.generator.single();
    let seq = rt.producer.send_message(&eff.stream, &message).await?;
    tracing::info!(id = %message.id(), sequence = %seq, "notification sent");

    print_json(&SendOneResponse {
        sequence_number: seq.to_string(),
        id: message.id().to_string(),
    })
}

/// Prints the counts even when the run stopped early, then fails with the
/// error that stopped it.
pub async fn run_batch(eff: &Effective, args: SendBatchArgs) -> Result<(), ShimError> {
    let rt = Runtime::start(eff).await?;
    let messages = rt.generator.batch(args.count);
    let report = rt.producer.send_messages(&eff.stream, &messages).await?;

    for (batch, result) in report.results.iter().enumerate() {
        for (index, code, reason) in result.failures() {
            tracing::warn!(batch, index, ?code, %reason, "entry failed");
        }
    }

    print_json(&BatchSendResponse::from(&report))?;
    match report.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
