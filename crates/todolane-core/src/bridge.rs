//! The session surface for front ends.
//!
//! `SessionBridge` is what a view layer holds: it answers "am I logged in"
//! and "how long until expiry", publishes state transitions, and takes the
//! user's stay/logout decisions during the expiry warning.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::warn;

use crate::api::{AuthError, AuthGateway, TokenRefresher};
use crate::clock::{Clock, SystemClock};
use crate::monitor::{
    MonitorConfig, MonitorHandle, SessionError, SessionEvent, SessionMonitor, SessionSnapshot,
    SessionView,
};

pub struct SessionBridge {
    gateway: Arc<AuthGateway>,
    monitor: MonitorHandle,
}

impl SessionBridge {
    /// Start monitoring the gateway's token store on the system clock.
    pub fn start(gateway: Arc<AuthGateway>, config: MonitorConfig) -> Self {
        Self::start_with_clock(gateway, Arc::new(SystemClock), config)
    }

    pub fn start_with_clock(
        gateway: Arc<AuthGateway>,
        clock: Arc<dyn Clock>,
        config: MonitorConfig,
    ) -> Self {
        let monitor = SessionMonitor::new(Arc::clone(gateway.store()), clock, config);
        let refresher: Arc<dyn TokenRefresher> = gateway.clone();
        Self {
            monitor: MonitorHandle::spawn(monitor, refresher),
            gateway,
        }
    }

    pub fn gateway(&self) -> &Arc<AuthGateway> {
        &self.gateway
    }

    pub fn view(&self) -> SessionView {
        self.monitor.view()
    }

    pub fn is_logged_in(&self) -> bool {
        self.view().logged_in
    }

    pub fn ms_until_expiry(&self) -> Option<i64> {
        self.view().ms_remaining
    }

    /// Seconds to show in the expiry warning, if one is showing.
    pub fn countdown_secs(&self) -> Option<i64> {
        self.view().countdown_secs
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.monitor.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.monitor.watch()
    }

    /// Log in and bring the monitor up to date before returning.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionView, AuthError> {
        self.gateway.login(username, password).await?;
        if let Err(e) = self.monitor.resync().await {
            warn!(error = %e, "Logged in but the session monitor did not respond");
        }
        Ok(self.view())
    }

    /// Keep the session: refresh now. On failure the session is over.
    pub async fn stay(&self) -> Result<(), SessionError> {
        self.monitor.stay().await
    }

    /// End the session immediately.
    pub async fn end_session(&self) -> Result<(), SessionError> {
        self.monitor.end_session().await
    }

    /// Re-read the token store now instead of waiting for the next poll.
    pub async fn resync(&self) -> Result<SessionView, SessionError> {
        self.monitor.resync().await?;
        Ok(self.view())
    }

    pub fn shutdown(&self) {
        self.monitor.shutdown();
    }
}
