//! Core library for todolane, a client for a token-authenticated task API.
//!
//! - `auth`: token store, token claim decoding, storage backends
//! - `api`: the auth gateway (login, refresh, authenticated calls), account
//!   and todo endpoints
//! - `monitor`: the session state machine and its timer-driven task
//! - `bridge`: the session surface a front end talks to
//! - `config`: persisted settings and environment overrides

pub mod api;
pub mod auth;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod models;
pub mod monitor;

pub use api::{ApiError, AuthError, AuthGateway, RefreshError, TodoService, TokenRefresher};
pub use auth::{Session, TokenStore};
pub use bridge::SessionBridge;
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::Config;
pub use monitor::{
    LogoutReason, MonitorConfig, MonitorHandle, SessionError, SessionEvent, SessionMonitor,
    SessionState, SessionView,
};
