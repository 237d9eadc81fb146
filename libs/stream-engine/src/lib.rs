pub mod batcher;
pub mod consumer;
pub mod partition;
pub mod producer;

pub use batcher::RecordBatcher;
pub use consumer::{decode_page, CursorState, DecodedPage, ShardCursor, StreamConsumer};
pub use partition::{
    ConstantKey, Explicit, IdHash, PartitionAssigner, PartitionPolicy, RoundRobin,
};
pub use producer::{SendReport, StreamProducer};
