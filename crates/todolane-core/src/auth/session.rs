use super::codec;

/// Credentials as read from the token store.
///
/// The access expiry is always derived from the access token's claims when
/// the session is built, so it can never drift from the token it describes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    access_expiry_millis: Option<i64>,
}

impl Session {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_tokens(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        let access_expiry_millis = access_token.as_deref().and_then(codec::expiry_millis);
        Self {
            access_token,
            refresh_token,
            access_expiry_millis,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn access_expiry_millis(&self) -> Option<i64> {
        self.access_expiry_millis
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// Milliseconds until the access token expires. Negative once expired.
    pub fn ms_remaining(&self, now_millis: i64) -> Option<i64> {
        self.access_expiry_millis.map(|expiry| expiry - now_millis)
    }

    /// Access token present, decodable, and not yet expired.
    pub fn is_live(&self, now_millis: i64) -> bool {
        self.ms_remaining(now_millis)
            .map(|remaining| remaining > 0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn token(exp: i64) -> String {
        format!(
            "h.{}.s",
            URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp))
        )
    }

    #[test]
    fn test_expiry_follows_access_token() {
        let session = Session::from_tokens(Some(token(50)), Some("refresh".into()));
        assert_eq!(session.access_expiry_millis(), Some(50_000));
        assert_eq!(session.ms_remaining(49_000), Some(1_000));
        assert!(session.is_live(49_999));
        assert!(!session.is_live(50_000));
    }

    #[test]
    fn test_undecodable_access_token_is_not_live() {
        let session = Session::from_tokens(Some("opaque".into()), Some("refresh".into()));
        assert_eq!(session.access_expiry_millis(), None);
        assert!(!session.is_live(0));
        assert!(!session.is_empty());
    }

    #[test]
    fn test_empty_session() {
        let session = Session::empty();
        assert!(session.is_empty());
        assert!(!session.is_live(0));
        assert_eq!(session.ms_remaining(0), None);
    }
}
