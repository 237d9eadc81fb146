use stream_api::{Locator, ShardId};
use stream_api_server::{MessageSource, ReadRecord, ReadResponse};

use super::{Runtime, print_json};
use crate::config::{Effective, GetArgs};
use crate::error::ShimError;

pub async fn run(eff: &Effective, args: GetArgs) -> Result<(), ShimError> {
    let rt = Runtime::start(eff).await?;

    if args.preload > 0 {
        let messages = rt.generator.batch(args.preload);
        rt.producer
            .send_messages(&eff.stream, &messages)
            .await?
            .into_result()?;
        tracing::info!(count = args.preload, "preloaded notifications");
    }

    let defaults = eff.read_defaults()?;
    let shard = args.shard.map(ShardId::new).unwrap_or(defaults.shard);
    let locator = match args.locator.as_deref() {
        Some(kind) => Locator::from_parts(kind, args.sequence.as_deref(), args.timestamp)?,
        None => defaults.locator,
    };
    let limit = args.limit.unwrap_or(defaults.limit);

    let position = rt
        .consumer
        .resolve_position(&eff.stream, &shard, &locator)
        .await?;
    let page = rt
        .consumer
        .pull_decoded(&position, limit, rt.codec.as_ref())
        .await?;
    tracing::info!(shard = %shard, count = page.messages.len(), "read records");

    let messages: Vec<ReadRecord> = page
        .messages
        .into_iter()
        .map(|(seq, message)| ReadRecord {
            sequence_number: seq.to_string(),
            message,
        })
        .collect();

    print_json(&ReadResponse {
        stream: eff.stream.clone(),
        shard: shard.to_string(),
        count: messages.len(),
        millis_behind_latest: page.millis_behind_latest,
        next: page.next.map(|p| p.token().to_string()),
        messages,
    })
}
