use crate::error::StreamError;
use crate::message::Message;

/// Payload format: `Message` ↔ bytes.
///
/// Must round-trip: `decode(&encode(m)?)? == m` for every valid message.
/// Producers and consumers never look inside payloads themselves.
pub trait PayloadCodec: Send + Sync {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, StreamError>;

    fn decode(&self, payload: &[u8]) -> Result<Message, StreamError>;
}
