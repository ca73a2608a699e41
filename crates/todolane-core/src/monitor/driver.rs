use std::sync::Arc;

use futures::future::OptionFuture;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::api::{RefreshFuture, TokenRefresher};
use crate::clock::Clock;

use super::machine::SessionMonitor;
use super::state::{SessionError, SessionEvent, SessionSnapshot, SessionView};

/// Capacity of the command channel.
const COMMAND_CHANNEL_SIZE: usize = 16;

/// Capacity of the event broadcast. Slow subscribers skip ahead.
const EVENT_CHANNEL_SIZE: usize = 64;

type StayReply = oneshot::Sender<Result<(), SessionError>>;

enum Command {
    Stay(StayReply),
    EndSession(oneshot::Sender<()>),
    Resync(oneshot::Sender<SessionSnapshot>),
}

enum Reply {
    Stay(StayReply, Result<(), SessionError>),
    Ended(oneshot::Sender<()>),
    Resynced(oneshot::Sender<SessionSnapshot>),
}

impl Reply {
    /// Callers that went away are not an error.
    fn deliver(self, snapshot: SessionSnapshot) {
        let _ = match self {
            Reply::Stay(tx, outcome) => tx.send(outcome).map_err(|_| ()),
            Reply::Ended(tx) => tx.send(()).map_err(|_| ()),
            Reply::Resynced(tx) => tx.send(snapshot).map_err(|_| ()),
        };
    }
}

/// Owner of the running monitor task.
///
/// All timers live inside the task; dropping the handle aborts it, so no
/// check can act on a session after its owner is gone.
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    clock: Arc<dyn Clock>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Start the liveness poll and countdown tick for `monitor`.
    pub fn spawn(monitor: SessionMonitor, refresher: Arc<dyn TokenRefresher>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (snapshot_tx, snapshot_rx) = watch::channel(monitor.snapshot());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let clock = Arc::clone(monitor.clock());

        let task = tokio::spawn(run(
            monitor,
            refresher,
            command_rx,
            snapshot_tx,
            event_tx.clone(),
        ));

        Self {
            commands: command_tx,
            snapshot: snapshot_rx,
            events: event_tx,
            clock,
            task,
        }
    }

    /// Refresh the access token. Resolves once the session is stable again
    /// or has ended.
    pub async fn stay(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stay(reply)).await?;
        rx.await.map_err(|_| SessionError::MonitorStopped)?
    }

    /// Log out now, abandoning any pending refresh.
    pub async fn end_session(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::EndSession(reply)).await?;
        rx.await.map_err(|_| SessionError::MonitorStopped)
    }

    /// Run a liveness check immediately, e.g. right after login.
    pub async fn resync(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Resync(reply)).await?;
        rx.await.map_err(|_| SessionError::MonitorStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshot.borrow()
    }

    /// Session view computed at the moment of the call.
    pub fn view(&self) -> SessionView {
        SessionView::observe(self.snapshot(), self.clock.now_millis())
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the monitor and all of its timers.
    pub fn shutdown(&self) {
        self.task.abort();
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::MonitorStopped)
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut monitor: SessionMonitor,
    refresher: Arc<dyn TokenRefresher>,
    mut commands: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    let config = *monitor.config();
    let mut liveness = interval(config.liveness_interval);
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Liveness fires immediately; the countdown starts one tick later
    let mut countdown = interval_at(Instant::now() + config.tick_interval, config.tick_interval);
    countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut pending: Option<RefreshFuture> = None;
    let mut waiters: Vec<StayReply> = Vec::new();

    info!("Session monitor started");
    loop {
        // Replies wait until the new snapshot is published
        let mut replies: Vec<Reply> = Vec::new();

        let events = tokio::select! {
            _ = liveness.tick() => monitor.poll_liveness(),
            _ = countdown.tick() => monitor.tick(),
            Some(result) = OptionFuture::from(pending.as_mut()), if pending.is_some() => {
                pending = None;
                let events = monitor.finish_refresh(&result);
                let outcome = match result {
                    Ok(_) if monitor.state().is_logged_in() => Ok(()),
                    Ok(_) => Err(SessionError::Ended),
                    Err(e) => Err(SessionError::Refresh(e)),
                };
                replies.extend(waiters.drain(..).map(|w| Reply::Stay(w, outcome.clone())));
                events
            }
            command = commands.recv() => match command {
                Some(Command::Stay(reply)) => {
                    match monitor.begin_refresh() {
                        Ok(()) => {
                            if pending.is_none() {
                                debug!("Starting refresh");
                                pending = Some(refresher.start_refresh());
                            }
                            waiters.push(reply);
                        }
                        Err(e) => replies.push(Reply::Stay(reply, Err(e))),
                    }
                    Vec::new()
                }
                Some(Command::EndSession(reply)) => {
                    replies.push(Reply::Ended(reply));
                    monitor.end_session()
                }
                Some(Command::Resync(reply)) => {
                    replies.push(Reply::Resynced(reply));
                    monitor.poll_liveness()
                }
                None => break,
            },
        };

        // The session ended while a refresh was on the wire
        if pending.is_some() && !monitor.is_refreshing() {
            debug!("Dropping refresh for ended session");
            pending = None;
            replies.extend(waiters.drain(..).map(|w| Reply::Stay(w, Err(SessionError::Ended))));
        }

        let snapshot = monitor.snapshot();
        snapshot_tx.send_replace(snapshot);
        for event in events {
            let _ = event_tx.send(event);
        }
        for reply in replies {
            reply.deliver(snapshot);
        }
    }
    info!("Session monitor stopped");
}
