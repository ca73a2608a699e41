mod support;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::broadcast;
use tokio::time::Instant;
use todolane_core::{
    Clock, LogoutReason, MonitorConfig, MonitorHandle, RefreshError, SessionError, SessionEvent,
    SessionMonitor, SessionState, TokenRefresher, TokenStore, TokioClock,
};

use support::{jwt, memory_store, FakeRefresher, ANCHOR_MILLIS, ANCHOR_SECS};

struct Harness {
    store: Arc<TokenStore>,
    refresher: Arc<FakeRefresher>,
    handle: MonitorHandle,
    events: broadcast::Receiver<SessionEvent>,
    started: Instant,
}

fn harness(
    store: Arc<TokenStore>,
    make: impl FnOnce(Arc<TokenStore>, Arc<dyn Clock>) -> FakeRefresher,
) -> Harness {
    let started = Instant::now();
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(ANCHOR_MILLIS));
    let refresher = Arc::new(make(Arc::clone(&store), Arc::clone(&clock)));
    let monitor = SessionMonitor::new(Arc::clone(&store), clock, MonitorConfig::default());
    let dyn_refresher: Arc<dyn TokenRefresher> = refresher.clone();
    let handle = MonitorHandle::spawn(monitor, dyn_refresher);
    let events = handle.subscribe();
    Harness {
        store,
        refresher,
        handle,
        events,
        started,
    }
}

/// Store holding a session whose access token expires `secs` after the anchor.
fn session_expiring_in(secs: i64) -> Arc<TokenStore> {
    let store = memory_store();
    store
        .set_tokens(&jwt(ANCHOR_SECS + secs), "refresh-1")
        .unwrap();
    store
}

async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    events.recv().await.expect("monitor event")
}

/// Collect events up to and including the next `LoggedOut`.
async fn events_until_logged_out(
    events: &mut broadcast::Receiver<SessionEvent>,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = matches!(event, SessionEvent::LoggedOut { .. });
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn changed(from: SessionState, to: SessionState) -> SessionEvent {
    SessionEvent::StateChanged { from, to }
}

#[tokio::test(start_paused = true)]
async fn short_lived_session_enters_warning_immediately() {
    let mut h = harness(session_expiring_in(5), |s, c| FakeRefresher::succeeding(s, c, 3600));

    assert_eq!(
        next_event(&mut h.events).await,
        changed(SessionState::LoggedOut, SessionState::LoggedInWarning)
    );
    assert_eq!(next_event(&mut h.events).await, SessionEvent::Countdown { seconds: 5 });

    let view = h.handle.view();
    assert!(view.logged_in);
    assert_eq!(view.countdown_secs, Some(5));
    assert_eq!(view.ms_remaining, Some(5000));
}

#[tokio::test(start_paused = true)]
async fn unattended_warning_counts_down_and_expires() {
    let mut h = harness(session_expiring_in(5), |s, c| FakeRefresher::succeeding(s, c, 3600));

    let events = events_until_logged_out(&mut h.events).await;

    assert_eq!(
        events,
        vec![
            changed(SessionState::LoggedOut, SessionState::LoggedInWarning),
            SessionEvent::Countdown { seconds: 5 },
            SessionEvent::Countdown { seconds: 4 },
            SessionEvent::Countdown { seconds: 3 },
            SessionEvent::Countdown { seconds: 2 },
            SessionEvent::Countdown { seconds: 1 },
            changed(SessionState::LoggedInWarning, SessionState::Expired),
            changed(SessionState::Expired, SessionState::LoggedOut),
            SessionEvent::LoggedOut {
                reason: LogoutReason::Expired
            },
        ]
    );
    assert_eq!(h.started.elapsed(), Duration::from_secs(5));
    assert!(h.store.get().is_empty());
    assert_eq!(h.handle.snapshot().state, SessionState::LoggedOut);
    assert_eq!(h.refresher.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn long_lived_session_is_stable() {
    let mut h = harness(session_expiring_in(3600), |s, c| FakeRefresher::succeeding(s, c, 3600));

    assert_eq!(
        next_event(&mut h.events).await,
        changed(SessionState::LoggedOut, SessionState::LoggedInStable)
    );
    let view = h.handle.view();
    assert_eq!(view.countdown_secs, None);
    assert_eq!(view.ms_remaining, Some(3_600_000));
}

#[tokio::test(start_paused = true)]
async fn stay_during_warning_returns_to_stable() {
    let mut h = harness(session_expiring_in(5), |s, c| FakeRefresher::succeeding(s, c, 3600));
    next_event(&mut h.events).await;
    next_event(&mut h.events).await;

    h.handle.stay().await.expect("stay");

    assert_eq!(
        next_event(&mut h.events).await,
        changed(SessionState::LoggedInWarning, SessionState::LoggedInStable)
    );
    assert_eq!(h.handle.snapshot().state, SessionState::LoggedInStable);
    assert_eq!(h.handle.view().countdown_secs, None);
    assert_eq!(h.refresher.calls(), 1);
    assert_eq!(h.store.get().refresh_token(), Some("refresh-1"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_stays_share_one_refresh() {
    let mut h = harness(session_expiring_in(8), |s, c| {
        FakeRefresher::succeeding(s, c, 3600).with_delay(Duration::from_millis(500))
    });
    next_event(&mut h.events).await;

    let (first, second) = tokio::join!(h.handle.stay(), h.handle.stay());

    assert_eq!(first, Ok(()));
    assert_eq!(second, Ok(()));
    assert_eq!(h.refresher.calls(), 1);
    assert_eq!(h.handle.snapshot().state, SessionState::LoggedInStable);
}

#[tokio::test(start_paused = true)]
async fn rejected_stay_ends_session() {
    let mut h = harness(session_expiring_in(5), FakeRefresher::rejecting);
    next_event(&mut h.events).await;
    next_event(&mut h.events).await;

    let err = h.handle.stay().await.unwrap_err();
    assert_eq!(err, SessionError::Refresh(RefreshError::Rejected));

    let events = events_until_logged_out(&mut h.events).await;
    assert_eq!(
        events.last(),
        Some(&SessionEvent::LoggedOut {
            reason: LogoutReason::RefreshFailed
        })
    );
    assert!(h.store.get().is_empty());
    assert!(!h.handle.view().logged_in);
}

#[tokio::test(start_paused = true)]
async fn refresh_outlasting_expiry_reports_ended() {
    let mut h = harness(session_expiring_in(3), |s, c| {
        FakeRefresher::succeeding(s, c, 3600).with_delay(Duration::from_secs(10))
    });
    next_event(&mut h.events).await;

    let err = h.handle.stay().await.unwrap_err();

    assert_eq!(err, SessionError::Ended);
    assert_eq!(h.started.elapsed(), Duration::from_secs(3));
    assert_eq!(h.handle.snapshot().state, SessionState::LoggedOut);
    assert!(h.store.get().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stay_without_session_is_refused() {
    let h = harness(memory_store(), |s, c| FakeRefresher::succeeding(s, c, 3600));

    assert_eq!(h.handle.stay().await, Err(SessionError::NotLoggedIn));
    assert_eq!(h.refresher.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn end_session_clears_store() {
    let mut h = harness(session_expiring_in(3600), |s, c| FakeRefresher::succeeding(s, c, 3600));
    next_event(&mut h.events).await;

    h.handle.end_session().await.expect("end session");

    let events = events_until_logged_out(&mut h.events).await;
    assert_eq!(
        events.last(),
        Some(&SessionEvent::LoggedOut {
            reason: LogoutReason::UserEnded
        })
    );
    assert!(h.store.get().is_empty());
    assert_eq!(h.handle.snapshot().state, SessionState::LoggedOut);
}

#[tokio::test(start_paused = true)]
async fn end_session_during_refresh_abandons_it() {
    let mut h = harness(session_expiring_in(3600), |s, c| {
        FakeRefresher::succeeding(s, c, 3600).with_delay(Duration::from_secs(5))
    });
    next_event(&mut h.events).await;

    let handle = &h.handle;
    let (stayed, ended) = tokio::join!(handle.stay(), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.end_session().await
    });

    assert_eq!(stayed, Err(SessionError::Ended));
    assert_eq!(ended, Ok(()));
    assert_eq!(h.started.elapsed(), Duration::from_secs(1));

    // Well past the point the refresh would have finished
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.store.get().is_empty());
    assert_eq!(h.handle.snapshot().state, SessionState::LoggedOut);
    assert_eq!(h.refresher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn liveness_poll_notices_external_logout() {
    let mut h = harness(session_expiring_in(3600), |s, c| FakeRefresher::succeeding(s, c, 3600));
    next_event(&mut h.events).await;

    h.store.clear().unwrap();

    assert_eq!(
        next_event(&mut h.events).await,
        changed(SessionState::LoggedInStable, SessionState::LoggedOut)
    );
    assert_eq!(
        next_event(&mut h.events).await,
        SessionEvent::LoggedOut {
            reason: LogoutReason::NoValidSession
        }
    );
    assert_eq!(h.started.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn resync_picks_up_new_login() {
    let h = harness(memory_store(), |s, c| FakeRefresher::succeeding(s, c, 3600));
    assert_eq!(h.handle.snapshot().state, SessionState::LoggedOut);

    h.store
        .set_tokens(&jwt(ANCHOR_SECS + 3600), "refresh-1")
        .unwrap();
    let snapshot = h.handle.resync().await.expect("resync");

    assert_eq!(snapshot.state, SessionState::LoggedInStable);
    assert_eq!(snapshot.access_expiry_millis, Some(ANCHOR_MILLIS + 3_600_000));
    assert_eq!(h.handle.snapshot(), snapshot);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_timers() {
    let mut h = harness(session_expiring_in(5), |s, c| FakeRefresher::succeeding(s, c, 3600));
    next_event(&mut h.events).await;

    h.handle.shutdown();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(!h.handle.is_running());
    assert_eq!(h.handle.stay().await, Err(SessionError::MonitorStopped));
    // Nothing expired the session after shutdown
    assert!(h.store.get().access_token().is_some());
}
