#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use futures::FutureExt;
use todolane_core::api::RefreshFuture;
use todolane_core::{AuthGateway, Clock, RefreshError, TokenRefresher, TokenStore};
use wiremock::MockServer;

/// Wall time the paused-clock tests start at, on a whole second.
pub const ANCHOR_MILLIS: i64 = 1_700_000_000_000;
pub const ANCHOR_SECS: i64 = ANCHOR_MILLIS / 1000;

/// Unsigned JWT carrying only an `exp` claim.
pub fn jwt(exp_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = format!(r#"{{"token_type":"access","exp":{}}}"#, exp_secs);
    let payload = URL_SAFE_NO_PAD.encode(claims);
    format!("{}.{}.test-signature", header, payload)
}

pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// JWT expiring `secs` from the real current time.
pub fn jwt_expiring_in(secs: i64) -> String {
    jwt(now_secs() + secs)
}

pub fn memory_store() -> Arc<TokenStore> {
    Arc::new(TokenStore::in_memory())
}

pub fn gateway(server: &MockServer, store: Arc<TokenStore>) -> Arc<AuthGateway> {
    Arc::new(
        AuthGateway::new(server.uri(), store, Duration::from_secs(5))
            .expect("build gateway"),
    )
}

/// Refresher that mints tokens locally after an optional delay.
pub struct FakeRefresher {
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
    lifetime_secs: Option<i64>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeRefresher {
    /// Succeeds with a token valid for `lifetime_secs`.
    pub fn succeeding(store: Arc<TokenStore>, clock: Arc<dyn Clock>, lifetime_secs: i64) -> Self {
        Self {
            store,
            clock,
            lifetime_secs: Some(lifetime_secs),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always rejected, as if the refresh token had expired.
    pub fn rejecting(store: Arc<TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            lifetime_secs: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenRefresher for FakeRefresher {
    fn start_refresh(&self) -> RefreshFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let lifetime = self.lifetime_secs;
        let delay = self.delay;
        let refresh_token = self.store.get().refresh_token().map(str::to_string);

        async move {
            tokio::time::sleep(delay).await;
            match lifetime {
                Some(secs) => {
                    let token = jwt(clock.now_millis() / 1000 + secs);
                    let refresh_token = refresh_token.ok_or(RefreshError::NoRefreshToken)?;
                    let stored = store
                        .set_access_for(&refresh_token, &token)
                        .map_err(|e| RefreshError::Storage(e.to_string()))?;
                    if !stored {
                        return Err(RefreshError::SessionChanged);
                    }
                    Ok(token)
                }
                None => {
                    store.clear().ok();
                    Err(RefreshError::Rejected)
                }
            }
        }
        .boxed()
    }
}
