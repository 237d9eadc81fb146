use stream_api::{Message, PayloadCodec, StreamError};

/// JSON payloads: `{"title": .., "id": .., "code": ..}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output. Larger on the wire, easier to read in consoles.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl PayloadCodec for JsonCodec {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, StreamError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(message)?
        } else {
            serde_json::to_vec(message)?
        };
        Ok(bytes)
    }

    fn decode(&self, payload: &[u8]) -> Result<Message, StreamError> {
        let s = std::str::from_utf8(payload)?;
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_expected_fields() {
        let m = Message::new("Festival in the city happening", "id-1", 7);
        let bytes = JsonCodec::new().encode(&m).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["title"], "Festival in the city happening");
        assert_eq!(value["id"], "id-1");
        assert_eq!(value["code"], 7);
    }

    #[test]
    fn pretty_output_is_still_decodable() {
        let m = Message::new("Best driving mode for this route", "id-2", 9998);
        let codec = JsonCodec::pretty();
        let bytes = codec.encode(&m).unwrap();
        assert!(bytes.contains(&b'\n'));
        assert_eq!(codec.decode(&bytes).unwrap(), m);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let codec = JsonCodec::new();
        assert!(matches!(codec.decode(b"{not json"), Err(StreamError::Codec(_))));
        assert!(matches!(codec.decode(&[0xff, 0xfe]), Err(StreamError::Codec(_))));
        assert!(matches!(
            codec.decode(br#"{"title":"t","id":"i"}"#),
            Err(StreamError::Codec(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(title in ".{0,64}", id in "[a-f0-9-]{1,36}", code in any::<i64>()) {
            let m = Message::new(title, id, code);
            let codec = JsonCodec::new();
            let bytes = codec.encode(&m).unwrap();
            prop_assert_eq!(codec.decode(&bytes).unwrap(), m);
        }
    }
}
