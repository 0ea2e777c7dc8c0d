//! The session context shared by every screen.
//!
//! A [`Session`] bundles the three pieces of state that outlive any single
//! screen: the [`ModeController`], the [`TaskRecord`] and the backend
//! [`Connection`]. It is created once at startup and handed to screens by
//! reference. Mutations are recorded as [`Change`]s which the owner drains
//! and broadcasts after each event, so every observer sees every write.

pub mod connection;
pub mod controller;
pub mod error;
pub mod mode;
pub mod task;

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::error;

pub use connection::{ChannelEvent, Connection, ConnectionConfig, ConnectionState};
pub use controller::ModeController;
pub use error::SessionError;
pub use mode::{AppMode, MenuTab, Transition, MENU_TABS};
pub use task::TaskRecord;

pub const SPLASH_DELAY: Duration = Duration::from_millis(1500);

/// Events produced off the UI task (timer, backend driver) that the session
/// owner feeds back into [`Session::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SplashElapsed,
    Channel(ChannelEvent),
}

/// Observable effect of a session mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Mode(Transition),
    Task { key: String },
    Connection(ConnectionState),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub splash_delay: Duration,
    /// `None` runs without a backend channel.
    pub backend: Option<ConnectionConfig>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            splash_delay: SPLASH_DELAY,
            backend: Some(ConnectionConfig::default()),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    controller: ModeController,
    task: TaskRecord,
    connection: Connection,
    changes: Vec<Change>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session on the splash screen with no timer and no backend.
    pub fn new() -> Self {
        Self {
            controller: ModeController::new(),
            task: TaskRecord::new(),
            connection: Connection::detached(),
            changes: Vec::new(),
        }
    }

    /// Arms the splash timer and connects to the backend. Timer and channel
    /// report back through `events`.
    pub fn start(options: &SessionOptions, events: UnboundedSender<SessionEvent>) -> Self {
        let mut session = Self::new();
        session
            .controller
            .arm_splash(options.splash_delay, events.clone());

        if let Some(backend) = &options.backend {
            match Connection::open(backend, events) {
                Ok(connection) => session.connection = connection,
                Err(err) => {
                    error!("{err}");
                    session
                        .connection
                        .handle(ChannelEvent::Errored(err.to_string()));
                }
            }
        }
        session
    }

    pub fn mode(&self) -> AppMode {
        self.controller.mode()
    }

    pub fn active_tab(&self) -> usize {
        self.controller.active_tab()
    }

    pub fn menu_visible(&self) -> bool {
        self.controller.menu_visible()
    }

    pub fn set_mode(&mut self, mode: AppMode) -> bool {
        let transition = self.controller.set_mode(mode);
        self.record(transition)
    }

    pub fn navigate(&mut self, position: usize) -> bool {
        let transition = self.controller.navigate(position);
        self.record(transition)
    }

    pub fn request(&mut self, name: &str) -> bool {
        let transition = self.controller.request(name);
        self.record(transition)
    }

    fn record(&mut self, transition: Option<Transition>) -> bool {
        match transition {
            Some(transition) => {
                self.changes.push(Change::Mode(transition));
                true
            }
            None => false,
        }
    }

    pub fn set_task(&mut self, key: &str, value: impl Into<Value>) {
        self.task.set(key, value);
        self.changes.push(Change::Task {
            key: key.to_string(),
        });
    }

    pub fn get_task(&self, key: &str) -> Option<&Value> {
        self.task.get(key)
    }

    pub fn task(&self) -> &TaskRecord {
        &self.task
    }

    /// Sends `event` to the backend. `false` means it was dropped.
    pub fn emit(&self, event: &str, payload: Value) -> bool {
        self.connection.send(event, payload)
    }

    pub fn on<F>(&mut self, event: &str, handler: F)
    where
        F: FnMut(&Value) + Send + 'static,
    {
        self.connection.on(event, handler);
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::SplashElapsed => {
                let transition = self.controller.complete_splash();
                self.record(transition);
            }
            SessionEvent::Channel(event) => {
                if let Some(state) = self.connection.handle(event) {
                    self.changes.push(Change::Connection(state));
                }
            }
        }
    }

    /// Changes recorded since the last call, oldest first.
    pub fn drain_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn offline() -> SessionOptions {
        SessionOptions {
            backend: None,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_lands_on_welcome() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = Session::start(&offline(), tx);
        assert!(!session.menu_visible());

        let event = rx.recv().await.unwrap();
        session.handle(event);

        assert_eq!(session.mode(), AppMode::Welcome);
        assert_eq!(session.active_tab(), 0);
        assert!(session.menu_visible());
        assert_eq!(
            session.drain_changes(),
            vec![Change::Mode(Transition {
                mode: AppMode::Welcome,
                tab: 0
            })]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clicking_a_tab_during_splash_wins() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = Session::start(&offline(), tx);

        let converter = MENU_TABS
            .iter()
            .position(|tab| tab.title == "3) iEEG to BIDS")
            .unwrap();
        assert!(session.navigate(converter));
        assert_eq!(session.mode(), AppMode::Converter);
        assert_eq!(session.active_tab(), 2);

        tokio::time::sleep(SPLASH_DELAY * 3).await;
        while let Ok(event) = rx.try_recv() {
            session.handle(event);
        }
        assert_eq!(session.mode(), AppMode::Converter);
        assert_eq!(session.drain_changes().len(), 1);
    }

    #[test]
    fn repeated_mode_records_nothing() {
        let mut session = Session::new();
        assert!(session.set_mode(AppMode::Validator));
        assert!(!session.set_mode(AppMode::Validator));
        assert!(!session.request("Nowhere"));
        assert_eq!(session.drain_changes().len(), 1);
        assert!(session.drain_changes().is_empty());
    }

    #[test]
    fn task_writes_are_visible_and_announced() {
        let mut session = Session::new();
        session.set_task("x", 1);
        session.set_task("x", 2);
        assert_eq!(session.get_task("x"), Some(&json!(2)));
        assert_eq!(session.get_task("y"), None);
        assert_eq!(
            session.drain_changes(),
            vec![
                Change::Task {
                    key: "x".to_string()
                },
                Change::Task {
                    key: "x".to_string()
                },
            ]
        );
    }

    #[test]
    fn channel_events_update_the_connection_state() {
        let mut session = Session::new();
        session.handle(SessionEvent::Channel(ChannelEvent::Opened));
        session.handle(SessionEvent::Channel(ChannelEvent::Closed));
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(
            session.drain_changes(),
            vec![
                Change::Connection(ConnectionState::Connected),
                Change::Connection(ConnectionState::Disconnected),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_backend_reports_an_error_state() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let options = SessionOptions {
            backend: Some(ConnectionConfig::with_uri("ftp://127.0.0.1")),
            ..Default::default()
        };
        let session = Session::start(&options, tx);
        assert_eq!(session.connection_state(), ConnectionState::Errored);
        assert!(session.connection().last_error().is_some());
    }
}
