//! Session token types for CAS authentication persistence.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// A session token as tracked by the correlation store.
///
/// The relying application issues the actual signed credential; this record
/// tracks only what the store needs: the token id, the expiry, and an
/// explicit validity flag that is cleared on backchannel logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Token id, unique and immutable once assigned (the `jti` claim of the
    /// issued credential).
    pub id: String,

    /// Expiry timestamp. The token is semantically invalid once
    /// `now >= expires_at`; expiry is computed at read time, never written
    /// back into the record.
    pub expires_at: DateTime<Utc>,

    /// Validity flag, independent of expiry. Cleared exactly once, by
    /// backchannel logout.
    pub valid: bool,
}

/// Claims read from the host-issued JWT. Only the two the store cares about.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    jti: String,
    exp: i64,
}

impl SessionToken {
    /// A freshly issued, valid token.
    pub fn new(id: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            expires_at,
            valid: true,
        }
    }

    /// The null token: an inert value standing in for "no such token" so
    /// callers can branch on identity instead of absence.
    pub fn null() -> Self {
        Self {
            id: String::new(),
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
            valid: false,
        }
    }

    /// Whether this is the null token.
    pub fn is_null(&self) -> bool {
        self.id.is_empty()
    }

    /// Whether the expiry timestamp has passed.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// A copy with the validity flag cleared. Same id, same expiry; the
    /// original value is left untouched.
    pub fn invalidated(&self) -> Self {
        Self {
            id: self.id.clone(),
            expires_at: self.expires_at,
            valid: false,
        }
    }

    /// A copy with a later expiry. Same id, validity flag untouched.
    pub fn refreshed(&self, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: self.id.clone(),
            expires_at,
            valid: self.valid,
        }
    }

    /// Build a token record from the host-issued JWT.
    ///
    /// The signature is *not* verified: the store tracks validity of tokens
    /// the host already issued, it is not a credential verifier. Only the
    /// `jti` and `exp` claims are read.
    pub fn from_jwt(token_str: &str) -> Result<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.algorithms = vec![
            Algorithm::HS256,
            Algorithm::HS384,
            Algorithm::HS512,
            Algorithm::RS256,
            Algorithm::ES256,
        ];
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<TokenClaims>(token_str, &DecodingKey::from_secret(&[]), &validation)
            .context("issued session token does not decode")?;

        let expires_at = Utc
            .timestamp_opt(data.claims.exp, 0)
            .single()
            .ok_or_else(|| anyhow!("issued session token carries an out-of-range expiry"))?;

        Ok(Self::new(data.claims.jti, expires_at))
    }
}

/// Extract the issued session token from `Set-Cookie` response headers.
///
/// The host's token-issuing subsystem emits the signed credential as a
/// session cookie; the login flow picks it out of the response it is about
/// to send. A missing cookie is an error: without the issued token there is
/// nothing to correlate the granting ticket with.
pub fn token_from_set_cookie_headers(headers: &[String], cookie_name: &str) -> Result<SessionToken> {
    for header in headers {
        let cookie = header.split(';').next().unwrap_or(header).trim();
        if let Some((name, value)) = cookie.split_once('=') {
            if name.trim() == cookie_name && !value.is_empty() {
                return SessionToken::from_jwt(value.trim());
            }
        }
    }
    Err(anyhow!(
        "no {} cookie among {} Set-Cookie header(s)",
        cookie_name,
        headers.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        jti: String,
        exp: i64,
    }

    fn make_jwt(jti: &str, exp: i64) -> String {
        let claims = Claims {
            jti: jti.to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_null_token_is_inert() {
        let null = SessionToken::null();
        assert!(null.is_null());
        assert!(!null.valid);
        assert!(null.is_expired());
        // branching on identity, not absence
        assert_eq!(null, SessionToken::null());
    }

    #[test]
    fn test_expiry_is_computed_not_stored() {
        let mut token = SessionToken::new("J1", Utc::now() + Duration::hours(1));
        assert!(!token.is_expired());
        assert!(token.valid);

        token.expires_at = Utc::now() - Duration::seconds(10);
        assert!(token.is_expired());
        // the flag never moves with the clock
        assert!(token.valid);
    }

    #[test]
    fn test_invalidated_copy_keeps_id_and_expiry() {
        let expires_at = Utc::now() + Duration::hours(1);
        let token = SessionToken::new("J1", expires_at);

        let invalidated = token.invalidated();
        assert_eq!(invalidated.id, "J1");
        assert_eq!(invalidated.expires_at, expires_at);
        assert!(!invalidated.valid);
        // original untouched
        assert!(token.valid);
    }

    #[test]
    fn test_refreshed_copy_extends_expiry() {
        let token = SessionToken::new("J1", Utc::now() - Duration::seconds(10));
        let later = Utc::now() + Duration::hours(1);

        let refreshed = token.refreshed(later);
        assert_eq!(refreshed.id, "J1");
        assert_eq!(refreshed.expires_at, later);
        assert!(!refreshed.is_expired());
    }

    #[test]
    fn test_from_jwt_reads_jti_and_exp() {
        let exp = (Utc::now() + Duration::hours(2)).timestamp();
        let jwt = make_jwt("AXkZy12", exp);

        let token = SessionToken::from_jwt(&jwt).unwrap();
        assert_eq!(token.id, "AXkZy12");
        assert_eq!(token.expires_at.timestamp(), exp);
        assert!(token.valid);
    }

    #[test]
    fn test_from_jwt_rejects_garbage() {
        assert!(SessionToken::from_jwt("not-a-jwt").is_err());
        assert!(SessionToken::from_jwt("").is_err());
    }

    #[test]
    fn test_token_from_set_cookie_headers() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let jwt = make_jwt("J42", exp);
        let headers = vec![
            "XSRF-TOKEN=abc; Path=/".to_string(),
            format!("JWT-SESSION={}; Path=/; HttpOnly; Max-Age=3600", jwt),
        ];

        let token = token_from_set_cookie_headers(&headers, "JWT-SESSION").unwrap();
        assert_eq!(token.id, "J42");
    }

    #[test]
    fn test_token_from_set_cookie_headers_missing_cookie() {
        let headers = vec!["XSRF-TOKEN=abc; Path=/".to_string()];
        assert!(token_from_set_cookie_headers(&headers, "JWT-SESSION").is_err());
    }
}
