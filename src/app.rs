use std::time::Duration;

use async_channel::Sender;
use color_eyre::eyre::Result;
use crossterm::event::KeyEvent;
use eeg2bids::session::{ConnectionConfig, Session, SessionEvent, SessionOptions, MENU_TABS};
use ratatui::prelude::Rect;
use tokio::sync::mpsc;

use crate::{action::Action, cli::Cli, components::host::ScreenHost, config::Config, tui};

pub struct App {
    pub config: Config,
    pub tick_rate: f64,
    pub frame_rate: f64,
    pub host: ScreenHost,
    pub session_options: SessionOptions,
    pub should_quit: bool,
    pub should_suspend: bool,
    pub last_tick_key_events: Vec<KeyEvent>,
}

impl App {
    pub fn new(args: &Cli) -> Result<Self> {
        let config = Config::new()?;
        let backend = match (&args.backend, args.offline) {
            (_, true) => None,
            (Some(uri), false) => Some(ConnectionConfig {
                uri: uri.clone(),
                ..config.backend.clone()
            }),
            (None, false) => Some(config.backend.clone()),
        };
        let session_options = SessionOptions {
            splash_delay: Duration::from_millis(args.splash_ms.unwrap_or(config.splash_ms)),
            backend,
        };
        Ok(Self {
            tick_rate: args.tick_rate,
            frame_rate: args.frame_rate,
            host: ScreenHost::new(),
            session_options,
            should_quit: false,
            should_suspend: false,
            config,
            last_tick_key_events: Vec::new(),
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let (action_tx, action_rx) = async_channel::unbounded();
        let (session_tx, mut session_rx) = mpsc::unbounded_channel::<SessionEvent>();

        let mut session = Session::start(&self.session_options, session_tx);
        log::info!(
            "session started, backend {:?}",
            self.session_options.backend.as_ref().map(|backend| &backend.uri)
        );

        let mut tui = tui::Tui::new()?
            .tick_rate(self.tick_rate)
            .frame_rate(self.frame_rate)
            .mouse(true);
        tui.enter()?;

        self.host.register_action_handler(action_tx.clone())?;
        self.host.register_config_handler(self.config.clone())?;
        self.host.register_session_handler(&mut session)?;

        loop {
            tokio::select! {
                Some(e) = tui.next() => self.handle_event(e, &action_tx, &mut session).await?,
                Some(event) = session_rx.recv() => session.handle(event),
                else => break,
            }

            loop {
                for change in session.drain_changes() {
                    action_tx.send(Action::Changed(change)).await?;
                }
                let Ok(action) = action_rx.try_recv() else {
                    break;
                };
                if action != Action::Tick && action != Action::Render {
                    log::debug!("{action:?}");
                }
                match action.clone() {
                    Action::Tick => {
                        self.last_tick_key_events.drain(..);
                    }
                    Action::Quit => self.should_quit = true,
                    Action::Suspend => self.should_suspend = true,
                    Action::Resume => self.should_suspend = false,
                    Action::Resize(w, h) => {
                        tui.resize(Rect::new(0, 0, w, h))?;
                        self.render(&mut tui, &session, &action_tx)?;
                    }
                    Action::Render => self.render(&mut tui, &session, &action_tx)?,
                    Action::Navigate(position) => {
                        session.navigate(position);
                    }
                    Action::NextTab => {
                        session.navigate((session.active_tab() + 1) % MENU_TABS.len());
                    }
                    Action::PreviousTab => {
                        session
                            .navigate((session.active_tab() + MENU_TABS.len() - 1) % MENU_TABS.len());
                    }
                    Action::SwitchMode(mode) => {
                        session.set_mode(mode);
                    }
                    Action::Changed(_) => action_tx.send(Action::Render).await?,
                    _ => {}
                }
                for follow_up in self.host.update(action, &mut session)? {
                    action_tx.send(follow_up).await?;
                }
            }

            if self.should_suspend {
                tui.suspend()?;
                action_tx.send(Action::Resume).await?;
                tui = tui::Tui::new()?
                    .tick_rate(self.tick_rate)
                    .frame_rate(self.frame_rate)
                    .mouse(true);
                tui.enter()?;
            } else if self.should_quit {
                tui.stop()?;
                break;
            }
        }
        tui.exit()?;
        Ok(())
    }

    async fn handle_event(
        &mut self,
        e: tui::Event,
        action_tx: &Sender<Action>,
        session: &mut Session,
    ) -> Result<()> {
        match e {
            tui::Event::Quit => action_tx.send(Action::Quit).await?,
            tui::Event::Tick => action_tx.send(Action::Tick).await?,
            tui::Event::Render => action_tx.send(Action::Render).await?,
            tui::Event::Resize(x, y) => action_tx.send(Action::Resize(x, y)).await?,
            tui::Event::Key(key) => {
                if let Some(keymap) = self.config.keybindings.get(&session.mode()) {
                    let bound = match keymap.get(&vec![key]) {
                        Some(action) => Some(action),
                        None => {
                            // not a single key binding, try it as part of a sequence
                            self.last_tick_key_events.push(key);
                            keymap.get(&self.last_tick_key_events)
                        }
                    };
                    if let Some(action) = bound.filter(|action| self.host.allows(action)) {
                        log::info!("Got action: {action:?}");
                        action_tx.send(action.clone()).await?;
                        return Ok(());
                    }
                }
            }
            _ => {}
        }
        if let Some(action) = self.host.handle_events(Some(e), session)? {
            action_tx.send(action).await?;
        }
        Ok(())
    }

    fn render(&mut self, tui: &mut tui::Tui, session: &Session, action_tx: &Sender<Action>) -> Result<()> {
        tui.draw(|f| {
            let area = f.size();
            if let Err(e) = self.host.draw(f, area, session) {
                action_tx
                    .try_send(Action::Error(format!("Failed to draw: {:?}", e)))
                    .ok();
            }
        })?;
        Ok(())
    }
}
