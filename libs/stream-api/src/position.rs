use crate::error::StreamError;
use crate::record::SequenceNumber;

/// Where a consumer wants to start reading a shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// At the record with this sequence number.
    AtSequenceNumber(SequenceNumber),
    /// Right after the record with this sequence number.
    AfterSequenceNumber(SequenceNumber),
    /// First record that arrived at or after this Unix ms timestamp.
    AtTimestamp(i64),
    /// Oldest record still retained.
    TrimHorizon,
    /// Just past the newest record: only records written later are seen.
    Latest,
}

impl Locator {
    /// Build a locator from its textual kind plus optional arguments, as
    /// they arrive from config files and query strings.
    pub fn from_parts(
        kind: &str,
        sequence: Option<&str>,
        timestamp_ms: Option<i64>,
    ) -> Result<Self, StreamError> {
        let need_sequence = || {
            sequence
                .ok_or_else(|| StreamError::InvalidLocator(format!("locator '{kind}' needs a sequence number")))
                .and_then(|s| SequenceNumber::parse(s))
        };
        match kind {
            "trim_horizon" => Ok(Locator::TrimHorizon),
            "latest" => Ok(Locator::Latest),
            "at_sequence" => Ok(Locator::AtSequenceNumber(need_sequence()?)),
            "after_sequence" => Ok(Locator::AfterSequenceNumber(need_sequence()?)),
            "at_timestamp" => timestamp_ms.map(Locator::AtTimestamp).ok_or_else(|| {
                StreamError::InvalidLocator("locator 'at_timestamp' needs a timestamp".into())
            }),
            other => Err(StreamError::InvalidLocator(format!(
                "unknown locator '{other}' (expected trim_horizon, latest, at_sequence, after_sequence, at_timestamp)"
            ))),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::AtSequenceNumber(s) => write!(f, "at_sequence({s})"),
            Locator::AfterSequenceNumber(s) => write!(f, "after_sequence({s})"),
            Locator::AtTimestamp(t) => write!(f, "at_timestamp({t})"),
            Locator::TrimHorizon => f.write_str("trim_horizon"),
            Locator::Latest => f.write_str("latest"),
        }
    }
}

/// Opaque handle to a point within a shard.
///
/// Only backends mint these, either from a locator or as the continuation
/// of a pull. The token content is backend-private.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamPosition(String);

impl StreamPosition {
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_from_parts() {
        assert_eq!(Locator::from_parts("latest", None, None).unwrap(), Locator::Latest);
        assert_eq!(
            Locator::from_parts("at_sequence", Some("42"), None).unwrap(),
            Locator::AtSequenceNumber(SequenceNumber::parse("42").unwrap())
        );
        assert_eq!(
            Locator::from_parts("at_timestamp", None, Some(1_700_000_000_000)).unwrap(),
            Locator::AtTimestamp(1_700_000_000_000)
        );
    }

    #[test]
    fn locator_missing_arguments_is_invalid() {
        assert!(matches!(
            Locator::from_parts("after_sequence", None, None),
            Err(StreamError::InvalidLocator(_))
        ));
        assert!(matches!(
            Locator::from_parts("at_timestamp", Some("1"), None),
            Err(StreamError::InvalidLocator(_))
        ));
        assert!(matches!(
            Locator::from_parts("somewhere", None, None),
            Err(StreamError::InvalidLocator(_))
        ));
    }
}
