use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::RefreshError;
use crate::auth::TokenStore;
use crate::clock::Clock;

use super::state::{
    LogoutReason, SessionError, SessionEvent, SessionSnapshot, SessionState, SessionView,
};
use super::MonitorConfig;

/// The session state machine.
///
/// Purely synchronous: every step reads the clock and the token store,
/// updates the state, and returns the events it produced. Scheduling lives
/// in the driver.
pub struct SessionMonitor {
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
    state: SessionState,
    access_expiry_millis: Option<i64>,
    refreshing: bool,
}

impl SessionMonitor {
    pub fn new(store: Arc<TokenStore>, clock: Arc<dyn Clock>, config: MonitorConfig) -> Self {
        Self {
            store,
            clock,
            config,
            state: SessionState::LoggedOut,
            access_expiry_millis: None,
            refreshing: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            access_expiry_millis: self.access_expiry_millis,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView::observe(self.snapshot(), self.clock.now_millis())
    }

    /// Coarse check: re-read the store and re-derive login state and expiry.
    pub fn poll_liveness(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let session = self.store.get();
        let now = self.clock.now_millis();

        if session.is_live(now) {
            self.access_expiry_millis = session.access_expiry_millis();
            self.settle(now, &mut events);
        } else if self.state != SessionState::LoggedOut || !session.is_empty() {
            let reason = if self.state.is_logged_in() && session.access_token().is_some() {
                LogoutReason::Expired
            } else {
                LogoutReason::NoValidSession
            };
            debug!(?reason, "Liveness check found no valid session");
            self.logout(reason, &mut events);
        }

        events
    }

    /// Fine check: advance the countdown against the cached expiry.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.state.is_logged_in() {
            let now = self.clock.now_millis();
            self.settle(now, &mut events);
        }
        events
    }

    /// Mark a refresh as started. Only a logged-in session can refresh.
    pub fn begin_refresh(&mut self) -> Result<(), SessionError> {
        if !self.state.is_logged_in() {
            return Err(SessionError::NotLoggedIn);
        }
        self.refreshing = true;
        Ok(())
    }

    /// Apply the outcome of a refresh. Any failure ends the session.
    pub fn finish_refresh(&mut self, result: &Result<String, RefreshError>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        self.refreshing = false;
        if !self.state.is_logged_in() {
            debug!("Refresh finished after session ended, ignoring");
            return events;
        }

        match result {
            Ok(_) => {
                let session = self.store.get();
                let now = self.clock.now_millis();
                if session.is_live(now) {
                    self.access_expiry_millis = session.access_expiry_millis();
                    self.settle(now, &mut events);
                } else {
                    warn!("Refreshed access token is not usable");
                    self.logout(LogoutReason::RefreshFailed, &mut events);
                }
            }
            Err(RefreshError::SessionChanged) => {
                // Someone else replaced the session; judge the new one
                return self.poll_liveness();
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed, ending session");
                self.logout(LogoutReason::RefreshFailed, &mut events);
            }
        }
        events
    }

    /// The user chose to log out. Always clears the store.
    pub fn end_session(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        self.logout(LogoutReason::UserEnded, &mut events);
        events
    }

    /// Place a live session in stable or warning, or expire it.
    fn settle(&mut self, now: i64, events: &mut Vec<SessionEvent>) {
        let Some(expiry) = self.access_expiry_millis else {
            self.logout(LogoutReason::NoValidSession, events);
            return;
        };

        let remaining = expiry - now;
        if remaining <= 0 {
            self.logout(LogoutReason::Expired, events);
        } else if remaining <= self.config.warning_threshold_millis() {
            self.transition(SessionState::LoggedInWarning, events);
            let seconds = remaining.div_euclid(1000);
            debug!(seconds, "Session expiring");
            events.push(SessionEvent::Countdown { seconds });
        } else {
            self.transition(SessionState::LoggedInStable, events);
        }
    }

    fn logout(&mut self, reason: LogoutReason, events: &mut Vec<SessionEvent>) {
        let was_logged_in = self.state.is_logged_in();
        if was_logged_in && reason != LogoutReason::NoValidSession {
            self.transition(SessionState::Expired, events);
        }

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear token store");
        }
        self.access_expiry_millis = None;
        self.refreshing = false;

        if self.state != SessionState::LoggedOut {
            self.transition(SessionState::LoggedOut, events);
            warn!(?reason, "Session ended");
            events.push(SessionEvent::LoggedOut { reason });
        }
    }

    fn transition(&mut self, to: SessionState, events: &mut Vec<SessionEvent>) {
        if self.state == to {
            return;
        }
        let from = self.state;
        info!(from = ?from, to = ?to, "Session state changed");
        self.state = to;
        events.push(SessionEvent::StateChanged { from, to });
    }
}
