//! Token-authenticated access to the task API.
//!
//! `AuthGateway` is the only component that talks to the auth endpoints and
//! the only one that writes tokens into the `TokenStore`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{codec, Session, TokenStore};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::models::{PermissionsResponse, UserProfile};

use super::error::{ApiError, AuthError, RefreshError};

// ============================================================================
// Constants
// ============================================================================

/// Token pair endpoint
pub const TOKEN_PATH: &str = "/auth/token/";

/// Access token renewal endpoint
pub const REFRESH_PATH: &str = "/auth/token/refresh/";

/// Current user endpoint
pub const USER_PATH: &str = "/auth/users/";

/// Current user's permission list
pub const PERMISSIONS_PATH: &str = "/auth/permissions";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

pub type RefreshFuture = BoxFuture<'static, Result<String, RefreshError>>;

/// Something that can mint a new access token.
///
/// The session monitor only needs this much of the gateway, which keeps it
/// testable without an HTTP server.
pub trait TokenRefresher: Send + Sync {
    fn start_refresh(&self) -> RefreshFuture;
}

/// A refresh on the wire, tagged with the refresh token it was sent with.
struct InFlightRefresh {
    refresh_token: Option<String>,
    future: Shared<RefreshFuture>,
}

/// Auth-aware API client.
pub struct AuthGateway {
    client: Client,
    base_url: String,
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<Option<InFlightRefresh>>,
}

impl AuthGateway {
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<TokenStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            store,
            clock: Arc::new(SystemClock),
            in_flight: Mutex::new(None),
        })
    }

    pub fn from_config(config: &Config, store: Arc<TokenStore>) -> Result<Self, ApiError> {
        Self::new(
            config.api_base_url(),
            store,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Use a different clock for the local refresh-token expiry check.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Session operations
    // ========================================================================

    /// Exchange credentials for a token pair and store it.
    ///
    /// A failed login leaves whatever was stored before untouched.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.url(TOKEN_PATH))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                warn!(status = status.as_u16(), "Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
            s if s.is_server_error() => {
                let body = response.text().await.unwrap_or_default();
                return Err(AuthError::Server(ApiError::server_message(&body)));
            }
            s if !s.is_success() => {
                return Err(AuthError::InvalidResponse(format!("Status {}", s)));
            }
            _ => {}
        }

        let tokens: LoginResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        self.store.set_tokens(&tokens.access, &tokens.refresh)?;
        self.forget_in_flight();
        info!("Logged in");
        Ok(self.store.get())
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Concurrent callers share one request. Terminal failures clear the
    /// store; network failures leave it alone.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        self.shared_refresh().await
    }

    /// Forget the stored session. The API has no server-side logout.
    pub fn logout(&self) -> Result<(), crate::auth::StoreError> {
        info!("Logging out");
        self.forget_in_flight();
        self.store.clear()
    }

    /// Join the in-flight refresh if it was sent for the refresh token that
    /// is stored now, otherwise start a new one.
    fn shared_refresh(&self) -> Shared<RefreshFuture> {
        let refresh_token = self.store.get().refresh_token().map(str::to_string);
        let mut slot = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pending) = slot.as_ref() {
            if pending.future.peek().is_none() && pending.refresh_token == refresh_token {
                debug!("Joining in-flight refresh");
                return pending.future.clone();
            }
        }

        let future = run_refresh(
            self.client.clone(),
            self.url(REFRESH_PATH),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            refresh_token.clone(),
        )
        .boxed()
        .shared();
        *slot = Some(InFlightRefresh {
            refresh_token,
            future: future.clone(),
        });
        future
    }

    fn forget_in_flight(&self) {
        let mut slot = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    // ========================================================================
    // Authenticated requests
    // ========================================================================

    pub async fn fetch_current_user(&self) -> Result<UserProfile, ApiError> {
        self.get_authorized(USER_PATH).await
    }

    pub async fn fetch_permissions(&self) -> Result<Vec<String>, ApiError> {
        let response: PermissionsResponse = self.get_authorized(PERMISSIONS_PATH).await?;
        Ok(response.permissions)
    }

    pub async fn get_authorized<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send_authorized(Method::GET, path, None::<&()>).await?;
        Self::parse_json(response, path).await
    }

    pub async fn send_authorized_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send_authorized(method, path, Some(body)).await?;
        Self::parse_json(response, path).await
    }

    pub async fn delete_authorized(&self, path: &str) -> Result<(), ApiError> {
        self.send_authorized(Method::DELETE, path, None::<&()>)
            .await
            .map(|_| ())
    }

    /// Send with the stored access token. A 401 triggers exactly one
    /// refresh and one retry; a second 401 is returned as `Unauthorized`.
    async fn send_authorized<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let token = self
            .store
            .get()
            .access_token()
            .map(str::to_string)
            .ok_or(ApiError::NotLoggedIn)?;

        let response = self.send_with_token(&method, &url, &token, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_response(response).await;
        }

        debug!(path = path, "Access token rejected, refreshing once");
        let token = self.refresh().await?;
        let response = self.send_with_token(&method, &url, &token, body).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path = path, "Request still unauthorized after refresh");
        }
        Self::check_response(response).await
    }

    async fn send_with_token<B>(
        &self,
        method: &Method,
        url: &str,
        token: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.client.request(method.clone(), url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    // ========================================================================
    // Response helpers
    // ========================================================================

    /// Check if response is successful, returning an error with body if not.
    pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    pub(crate) async fn parse_json<T: DeserializeOwned>(
        response: Response,
        path: &str,
    ) -> Result<T, ApiError> {
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    /// POST without credentials, for the account endpoints.
    pub(crate) async fn post_public<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response, path).await
    }
}

impl TokenRefresher for AuthGateway {
    fn start_refresh(&self) -> RefreshFuture {
        self.shared_refresh().boxed()
    }
}

async fn run_refresh(
    client: Client,
    url: String,
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
    refresh_token: Option<String>,
) -> Result<String, RefreshError> {
    let Some(refresh_token) = refresh_token else {
        warn!("No refresh token, clearing session");
        if let Err(e) = store.clear() {
            warn!(error = %e, "Failed to clear token store");
        }
        return Err(RefreshError::NoRefreshToken);
    };

    // Opaque refresh tokens can't be checked locally; the server decides
    if let Ok(exp) = codec::decode_expiry(&refresh_token) {
        if exp.saturating_mul(1000) <= clock.now_millis() {
            return Err(end_session(&store, &refresh_token, RefreshError::RefreshTokenExpired));
        }
    }

    let response = client
        .post(&url)
        .json(&RefreshRequest {
            refresh: &refresh_token,
        })
        .send()
        .await
        .map_err(|e| RefreshError::Network(e.to_string()))?;

    let status = response.status();
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(end_session(&store, &refresh_token, RefreshError::Rejected));
        }
        s if s.is_server_error() => {
            return Err(RefreshError::Network(format!("Server returned {}", s)));
        }
        s if !s.is_success() => {
            return Err(RefreshError::InvalidResponse(format!("Status {}", s)));
        }
        _ => {}
    }

    let body: RefreshResponse = response
        .json()
        .await
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

    let stored = store
        .set_access_for(&refresh_token, &body.access)
        .map_err(|e| RefreshError::Storage(e.to_string()))?;
    if !stored {
        return Err(RefreshError::SessionChanged);
    }
    info!("Access token refreshed");
    Ok(body.access)
}

/// Clear the session the refresh was made for. A session that was replaced
/// or cleared in the meantime is left alone.
fn end_session(store: &TokenStore, refresh_token: &str, reason: RefreshError) -> RefreshError {
    match store.clear_for(refresh_token) {
        Ok(true) => {
            warn!(reason = %reason, "Refresh failed, clearing session");
            reason
        }
        Ok(false) => RefreshError::SessionChanged,
        Err(e) => {
            warn!(error = %e, "Failed to clear token store");
            reason
        }
    }
}
