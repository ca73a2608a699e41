use serde::Serialize;
use thiserror::Error;

use crate::api::RefreshError;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    LoggedOut,
    LoggedInStable,
    /// Access token expires within the warning threshold
    LoggedInWarning,
    /// Transient; the store is cleared and the state becomes `LoggedOut`
    Expired,
}

impl SessionState {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, SessionState::LoggedInStable | SessionState::LoggedInWarning)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// The access token ran out
    Expired,
    /// The user chose to end the session
    UserEnded,
    /// The refresh token was missing, expired, or rejected
    RefreshFailed,
    /// The store no longer holds a usable session
    NoValidSession,
}

/// Notifications published by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// Whole seconds left, emitted every tick while in warning
    Countdown { seconds: i64 },
    LoggedOut { reason: LogoutReason },
}

/// Monitor state as published after every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub access_expiry_millis: Option<i64>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::LoggedOut,
            access_expiry_millis: None,
        }
    }
}

/// Read-only view of the session at one instant. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub state: SessionState,
    pub logged_in: bool,
    pub ms_remaining: Option<i64>,
    /// `floor(ms_remaining / 1000)`, only while in warning
    pub countdown_secs: Option<i64>,
}

impl SessionView {
    pub fn observe(snapshot: SessionSnapshot, now_millis: i64) -> Self {
        let logged_in = snapshot.state.is_logged_in();
        let ms_remaining = if logged_in {
            snapshot
                .access_expiry_millis
                .map(|expiry| (expiry - now_millis).max(0))
        } else {
            None
        };
        let countdown_secs = match (snapshot.state, ms_remaining) {
            (SessionState::LoggedInWarning, Some(ms)) => Some(ms.div_euclid(1000)),
            _ => None,
        };

        Self {
            state: snapshot.state,
            logged_in,
            ms_remaining,
            countdown_secs,
        }
    }
}

/// Failures surfaced to whoever drives the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error("Session ended before the request completed")]
    Ended,

    #[error("Session monitor is not running")]
    MonitorStopped,
}
