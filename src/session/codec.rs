//! Record encoding for the session store.
//!
//! Records are persisted as MessagePack. Encoding and decoding are exact
//! inverses for every representable record value, including the null token
//! and invalidated or expired states; corrupt input fails decoding instead
//! of being papered over with a sentinel value.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::SessionError;

/// Encode a record to its durable representation.
pub fn encode<R: Serialize>(record: &R) -> Result<Vec<u8>, SessionError> {
    rmp_serde::to_vec(record)
        .map_err(|e| SessionError::Persistence(std::io::Error::other(e)))
}

/// Decode a record from its durable representation.
///
/// Malformed input fails with [`SessionError::CorruptRecord`]; it is never
/// silently mapped to the null token here. That decision belongs to the
/// read path, which must log the corruption first.
pub fn decode<R: DeserializeOwned>(bytes: &[u8]) -> Result<R, SessionError> {
    rmp_serde::from_slice(bytes).map_err(SessionError::CorruptRecord)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::SessionToken;
    use chrono::{Duration, Utc};

    #[test]
    fn test_token_round_trip() {
        let token = SessionToken::new("AXoq-32_bZ", Utc::now() + Duration::hours(4));
        let decoded: SessionToken = decode(&encode(&token).unwrap()).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_null_token_round_trip() {
        let null = SessionToken::null();
        let decoded: SessionToken = decode(&encode(&null).unwrap()).unwrap();
        assert_eq!(decoded, null);
        assert!(decoded.is_null());
    }

    #[test]
    fn test_invalidated_and_expired_round_trip() {
        let invalidated = SessionToken::new("J1", Utc::now() + Duration::hours(1)).invalidated();
        let decoded: SessionToken = decode(&encode(&invalidated).unwrap()).unwrap();
        assert_eq!(decoded, invalidated);
        assert!(!decoded.valid);

        let expired = SessionToken::new("J2", Utc::now() - Duration::seconds(5));
        let decoded: SessionToken = decode(&encode(&expired).unwrap()).unwrap();
        assert_eq!(decoded, expired);
        assert!(decoded.is_expired());
        assert!(decoded.valid);
    }

    #[test]
    fn test_ticket_index_round_trip() {
        let token_id = "AXoq-32_bZ".to_string();
        let decoded: String = decode(&encode(&token_id).unwrap()).unwrap();
        assert_eq!(decoded, token_id);
    }

    #[test]
    fn test_corrupt_input_fails_loudly() {
        let result: Result<SessionToken, _> = decode(b"\xc1 definitely not msgpack");
        match result {
            Err(SessionError::CorruptRecord(_)) => {}
            other => panic!("expected CorruptRecord, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_truncated_input_fails_loudly() {
        let bytes = encode(&SessionToken::new("J1", Utc::now())).unwrap();
        let result: Result<SessionToken, _> = decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(SessionError::CorruptRecord(_))));
    }
}
