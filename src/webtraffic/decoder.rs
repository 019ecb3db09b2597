//! Tolerant JSON decoding of raw records into typed events.
//!
//! Decoding is an explicit result-or-error contract: the decoder never
//! produces a placeholder event for bad input, and a bad record never aborts
//! the stream. The caller owns the filter-and-log step.

use crate::webtraffic::event::WebTrafficEvent;
use thiserror::Error;

/// Per-record decode failure. Always recoverable; the pipeline logs the
/// offending record and moves on.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not a well-formed event object
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload parsed but carries no usable `country` field
    #[error("event has a missing or empty `country` field")]
    MissingCountry,
}

/// Decodes raw text records into [`WebTrafficEvent`]s.
///
/// An event is valid only if its `country` field is present and non-empty;
/// all other fields are optional. Equal country strings compare exactly
/// (case-sensitive, no normalization), so the decoded key is byte-for-byte
/// the input's country field.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventDecoder;

impl EventDecoder {
    /// Create a new EventDecoder
    pub fn new() -> Self {
        EventDecoder
    }

    /// Decode one raw record.
    ///
    /// # Examples
    ///
    /// ```
    /// use webtraffic_by_country::EventDecoder;
    ///
    /// let decoder = EventDecoder::new();
    /// let event = decoder.decode(r#"{"country":"Spain"}"#).unwrap();
    /// assert_eq!(event.country, "Spain");
    ///
    /// assert!(decoder.decode("not-json").is_err());
    /// assert!(decoder.decode(r#"{"country":""}"#).is_err());
    /// ```
    pub fn decode(&self, raw: &str) -> Result<WebTrafficEvent, DecodeError> {
        let event: WebTrafficEvent = serde_json::from_str(raw)?;
        if event.country.is_empty() {
            return Err(DecodeError::MissingCountry);
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_preserves_country_exactly() {
        let decoder = EventDecoder::new();

        for country in ["Spain", "spain", " Spain ", "Azerbaiyán", "S"] {
            let raw = serde_json::json!({ "country": country }).to_string();
            let event = decoder.decode(&raw).unwrap();
            assert_eq!(event.country, country);
        }
    }

    #[test]
    fn test_decode_keeps_optional_fields() {
        let decoder = EventDecoder::new();
        let event = decoder
            .decode(r#"{"country":"France","ip":"169.197.157.15","email":"a@b.c"}"#)
            .unwrap();
        assert_eq!(event.country, "France");
        assert_eq!(event.ip.as_deref(), Some("169.197.157.15"));
        assert_eq!(event.email.as_deref(), Some("a@b.c"));
        assert_eq!(event.user_agent, None);
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let decoder = EventDecoder::new();

        assert!(matches!(
            decoder.decode("not-json"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decoder.decode(r#"{"country": 42}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decoder.decode(r#"["country","Spain"]"#),
            Err(DecodeError::Malformed(_))
        ));
        // null is not a string either; it fails at the type level
        assert!(matches!(
            decoder.decode(r#"{"country":null}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(decoder.decode(""), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_missing_or_empty_country() {
        let decoder = EventDecoder::new();

        assert!(matches!(
            decoder.decode(r#"{"ip":"10.0.0.1"}"#),
            Err(DecodeError::MissingCountry)
        ));
        assert!(matches!(
            decoder.decode(r#"{"country":""}"#),
            Err(DecodeError::MissingCountry)
        ));
    }
}
