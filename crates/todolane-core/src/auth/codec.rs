//! Bearer token claim decoding.
//!
//! Tokens are JWTs issued by the API. Only the payload's `exp` claim is
//! read; signatures are the server's concern and are never verified here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Token is empty")]
    Empty,

    #[error("Token has no payload segment")]
    MissingPayload,

    #[error("Token payload is not valid base64")]
    InvalidEncoding,

    #[error("Token payload has no usable exp claim: {0}")]
    InvalidClaims(String),
}

/// Claims read from a token payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Expiry in Unix seconds
    pub exp: i64,
}

impl TokenClaims {
    pub fn expiry_millis(&self) -> i64 {
        self.exp.saturating_mul(1000)
    }
}

/// Decode the claims segment of a token without contacting the server.
pub fn decode_claims(token: &str) -> Result<TokenClaims, DecodeError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(DecodeError::Empty);
    }

    let mut parts = token.split('.');
    let _header = parts.next();
    let payload = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or(DecodeError::MissingPayload)?;

    // Some issuers pad the segment even though JWT says not to
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| DecodeError::InvalidEncoding)?;

    serde_json::from_slice(&decoded).map_err(|e| DecodeError::InvalidClaims(e.to_string()))
}

/// Expiry of a token in Unix seconds.
pub fn decode_expiry(token: &str) -> Result<i64, DecodeError> {
    decode_claims(token).map(|claims| claims.exp)
}

/// Expiry of a token in Unix milliseconds, or `None` when it can't be read.
pub fn expiry_millis(token: &str) -> Option<i64> {
    decode_claims(token).ok().map(|claims| claims.expiry_millis())
}

/// Whether a token is expired at `now_millis`. Undecodable tokens count as expired.
pub fn is_expired(token: &str, now_millis: i64) -> bool {
    expiry_millis(token)
        .map(|expiry| expiry <= now_millis)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload);
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_decode_expiry_reads_exp_claim() {
        let token = token_with_payload(r#"{"token_type":"access","exp":1700000000,"user_id":7}"#);
        assert_eq!(decode_expiry(&token), Ok(1_700_000_000));
        assert_eq!(expiry_millis(&token), Some(1_700_000_000_000));
    }

    #[test]
    fn test_decode_tolerates_padding() {
        let header = URL_SAFE_NO_PAD.encode("{}");
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":12}"#);
        let token = format!("{}.{}.sig", header, payload);
        assert_eq!(decode_expiry(&token), Ok(12));
    }

    #[test]
    fn test_malformed_tokens_are_errors_not_panics() {
        assert_eq!(decode_expiry(""), Err(DecodeError::Empty));
        assert_eq!(decode_expiry("   "), Err(DecodeError::Empty));
        assert_eq!(decode_expiry("opaque"), Err(DecodeError::MissingPayload));
        assert_eq!(decode_expiry("a..c"), Err(DecodeError::MissingPayload));
        assert_eq!(decode_expiry("a.!!!.c"), Err(DecodeError::InvalidEncoding));
        assert!(matches!(
            decode_expiry(&token_with_payload("not json")),
            Err(DecodeError::InvalidClaims(_))
        ));
        assert!(matches!(
            decode_expiry(&token_with_payload(r#"{"sub":"no-exp"}"#)),
            Err(DecodeError::InvalidClaims(_))
        ));
    }

    #[test]
    fn test_is_expired() {
        let token = token_with_payload(r#"{"exp":100}"#);
        assert!(!is_expired(&token, 99_999));
        assert!(is_expired(&token, 100_000));
        assert!(is_expired(&token, 100_001));

        // Anything undecodable is treated as expired
        assert!(is_expired("garbage", 0));
    }
}
