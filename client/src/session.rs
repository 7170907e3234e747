//! The game session: one channel, one phase machine, one render loop.

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use shared::{ClientCommand, ServerEvent, ServerMessage, StatusUpdate};

use crate::channel::Channels;
use crate::error::ClientError;
use crate::game::{GameView, Phase, Timer};
use crate::input::{InputAction, InputConfig, InputController, InputDriver};
use crate::network::{ServerEndpoint, TransportEvent, WsTransport, CLOSE_ABNORMAL, CLOSE_TERMINAL};
use crate::rendering::{Display, RenderLoop};
use crate::storage::{RejoinStore, GAME_KEY};

/// Channel name the game session registers its transport under.
pub const GAME_CHANNEL: &str = "game";

/// Which flavour of game this session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameMode {
    /// Two paddles on one keyboard, sharing one connection.
    Local,
    /// Online match against a remote opponent.
    Remote { game_id: u64 },
}

/// What the caller (the view/router layer) should do once the session
/// yields control. The session never navigates itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// The match ran to completion and the result was displayed.
    Finished,
    /// Fatal transport failure; the persisted rejoin id is gone.
    NavigateBack,
    /// The connection dropped; a persisted id may allow a rejoin.
    ConnectionLost,
}

/// Owns the game channel, the phase state machine, input wiring, entity
/// state, countdown timer and frame driver.
///
/// There is exactly one of these per running game: the caller constructs
/// it on entering the game view and must call [`GameSession::end`] when
/// leaving, which tears everything down synchronously.
pub struct GameSession {
    mode: GameMode,
    phase: Phase,
    channels: Channels,
    store: RejoinStore,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    view: GameView,
    input: InputController,
    timer: Timer,
    frames: RenderLoop,
    fps: u32,
}

impl GameSession {
    /// Opens the game channel and hands back a session in `Connecting`
    /// phase. A construction failure aborts before anything is registered
    /// or any event consumed.
    pub async fn connect(
        endpoint: &ServerEndpoint,
        mode: GameMode,
        user_id: u32,
        channels: Channels,
        store: RejoinStore,
        fps: u32,
    ) -> Result<Self, ClientError> {
        let url = match &mode {
            GameMode::Remote { game_id } => endpoint.remote_game_url(*game_id),
            GameMode::Local => endpoint.local_game_url(),
        };

        let (transport, events) = WsTransport::connect(&url).await?;
        channels.add(GAME_CHANNEL, Box::new(transport));

        Ok(Self::with_events(mode, user_id, channels, store, events, fps))
    }

    /// Wires a session over an already-registered transport. This is the
    /// seam scripted event sequences are fed through in tests.
    pub fn with_events(
        mode: GameMode,
        user_id: u32,
        channels: Channels,
        store: RejoinStore,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        fps: u32,
    ) -> Self {
        let input = match mode {
            GameMode::Local => InputController::new(InputConfig::local(user_id)),
            GameMode::Remote { .. } => InputController::new(InputConfig::remote(user_id)),
        };

        Self {
            mode,
            phase: Phase::Connecting,
            channels,
            store,
            events,
            view: GameView::new(user_id),
            input,
            timer: Timer::default(),
            frames: RenderLoop::new(),
            fps,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn view(&self) -> &GameView {
        &self.view
    }

    /// Runs the session until the match finishes or the transport dies.
    /// Teardown has already happened by the time this returns.
    pub async fn run<D: Display>(&mut self, display: &mut D) -> SessionExit {
        let mut driver = InputDriver::new(self.input.config());

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    // A vanished pump counts as an abnormal close.
                    let event = event.unwrap_or(TransportEvent::Closed {
                        code: CLOSE_ABNORMAL,
                    });
                    if let Some(exit) = self.handle_event(event, display) {
                        self.teardown();
                        return exit;
                    }
                }
                _ = self.frames.tick() => {
                    for action in driver.poll(&mut self.input) {
                        self.handle_action(action);
                    }
                    display.render_frame(&self.view);
                }
            }
        }
    }

    /// Applies one transport event to the phase machine. Returns the exit
    /// the caller should take once the session is over.
    pub fn handle_event<D: Display>(
        &mut self,
        event: TransportEvent,
        display: &mut D,
    ) -> Option<SessionExit> {
        match event {
            TransportEvent::Open => {
                self.on_open();
                None
            }
            TransportEvent::Message(text) => self.on_message(&text, display),
            TransportEvent::Error(reason) => {
                if self.phase.is_terminal() {
                    return Some(SessionExit::Finished);
                }
                error!("game transport error: {reason}");
                self.store.remove(GAME_KEY);
                self.phase = Phase::Finished;
                Some(SessionExit::NavigateBack)
            }
            TransportEvent::Closed { code } => {
                if self.phase.is_terminal() {
                    return Some(SessionExit::Finished);
                }
                if code == CLOSE_TERMINAL {
                    // Clean terminal close; nothing to rejoin.
                    info!("game channel closed cleanly");
                    self.store.remove(GAME_KEY);
                } else {
                    warn!("{}", ClientError::UnexpectedClose(code));
                }
                self.phase = Phase::Finished;
                Some(SessionExit::ConnectionLost)
            }
        }
    }

    /// The transport is open: announce readiness and remember the game id
    /// so a reload can rejoin, then start producing frames.
    fn on_open(&mut self) {
        self.send(&ClientCommand::Ready);
        if let GameMode::Remote { game_id } = &self.mode {
            self.store.set(GAME_KEY, game_id.to_string());
        }
        self.frames.start(self.fps);
    }

    fn on_message<D: Display>(&mut self, text: &str, display: &mut D) -> Option<SessionExit> {
        let message: ServerMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                // Malformed payloads never crash the session.
                warn!("dropping malformed message: {e}");
                return None;
            }
        };

        if self.phase.is_terminal() {
            debug!("ignoring message after finish");
            return None;
        }

        match message {
            ServerMessage::Status(StatusUpdate::Ready { timer }) => {
                if matches!(self.phase, Phase::Connecting | Phase::Ready) {
                    self.phase = Phase::Ready;
                    self.timer.start(timer);
                    self.view.countdown = self.timer.remaining();
                } else {
                    debug!("ignoring ready in phase {:?}", self.phase);
                }
                None
            }
            ServerMessage::Status(StatusUpdate::Started {
                player,
                opponent,
                ball,
            }) => {
                if matches!(self.phase, Phase::Ready | Phase::Started | Phase::Paused) {
                    // A snapshot while paused means the server resumed.
                    self.phase = Phase::Started;
                    self.timer.clear();
                    self.view.countdown = None;
                    self.view.apply_snapshot(&player, &opponent, &ball);
                } else {
                    debug!("ignoring snapshot in phase {:?}", self.phase);
                }
                None
            }
            ServerMessage::Status(StatusUpdate::Paused) => {
                if self.phase == Phase::Started {
                    self.phase = Phase::Paused;
                }
                None
            }
            ServerMessage::Status(StatusUpdate::Finished {
                player,
                opponent,
                ball,
            }) => {
                self.view.apply_snapshot(&player, &opponent, &ball);
                self.finish(display);
                Some(SessionExit::Finished)
            }
            ServerMessage::Event(ServerEvent::UsersInfo { users }) => {
                self.view.apply_users_info(&users);
                None
            }
            ServerMessage::Event(event) => {
                debug!("ignoring event on game channel: {event:?}");
                None
            }
        }
    }

    /// Forwards an input action over the game channel. Movement is still
    /// captured while paused but not forwarded.
    pub fn handle_action(&mut self, action: InputAction) {
        match action {
            InputAction::Move { user_id, movement } => {
                if self.phase == Phase::Paused {
                    debug!("holding movement while paused");
                    return;
                }
                self.send(&ClientCommand::Update { user_id, movement });
            }
            InputAction::Pause => {
                if self.phase == Phase::Started {
                    self.send(&ClientCommand::Pause);
                    self.phase = Phase::Paused;
                }
            }
            InputAction::Unpause => {
                if self.phase == Phase::Paused {
                    self.send(&ClientCommand::Unpause);
                    self.phase = Phase::Started;
                }
            }
        }
    }

    /// Terminal cleanup. The phase guard in `on_message` makes this run
    /// exactly once no matter how many `finished` messages arrive.
    fn finish<D: Display>(&mut self, display: &mut D) {
        self.phase = Phase::Finished;
        self.store.remove(GAME_KEY);
        self.channels.remove(GAME_CHANNEL);
        self.timer.clear();

        display.show_result(&self.view, self.view.outcome());
        self.view.clear_entities();
    }

    /// Ends the session from the outside (navigation away). The quit
    /// command is best-effort; teardown happens regardless.
    pub fn end(&mut self) {
        if !self.phase.is_terminal() {
            self.send(&ClientCommand::Quit);
            self.phase = Phase::Finished;
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        // Cancel unconditionally; it is a no-op when no frame was ever
        // scheduled.
        self.frames.cancel();
        self.channels.remove(GAME_CHANNEL);
    }

    /// Best-effort write to the game channel; a missing channel only logs.
    fn send(&self, command: &ClientCommand) {
        if let Err(e) = self.channels.send(GAME_CHANNEL, command) {
            warn!("dropping {command:?}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MatchOutcome;
    use crate::network::Transport;
    use shared::Movement;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeTransport {
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<u32>>,
    }

    impl FakeTransport {
        fn sent_types(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|text| {
                    let value: serde_json::Value = serde_json::from_str(text).unwrap();
                    value["type"].as_str().unwrap().to_string()
                })
                .collect()
        }

        fn close_count(&self) -> u32 {
            *self.closed.lock().unwrap()
        }
    }

    impl Transport for FakeTransport {
        fn send(&self, text: String) -> Result<(), ClientError> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }

        fn close(&self) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    #[derive(Default)]
    struct FakeDisplay {
        frames: u32,
        results: Vec<MatchOutcome>,
    }

    impl Display for FakeDisplay {
        fn render_frame(&mut self, _view: &GameView) {
            self.frames += 1;
        }

        fn resize(&mut self, _width: f32, _height: f32) {}

        fn show_result(&mut self, _view: &GameView, outcome: MatchOutcome) {
            self.results.push(outcome);
        }
    }

    struct Rig {
        session: GameSession,
        transport: FakeTransport,
        display: FakeDisplay,
        store: RejoinStore,
        channels: Channels,
    }

    fn rig(mode: GameMode) -> Rig {
        let channels = Channels::new();
        let store = RejoinStore::new();
        let transport = FakeTransport::default();
        channels.add(GAME_CHANNEL, Box::new(transport.clone()));

        // The receiver side is unused: events are injected directly.
        let (_tx, events) = mpsc::unbounded_channel();
        let session =
            GameSession::with_events(mode, 1, channels.clone(), store.clone(), events, 60);

        Rig {
            session,
            transport,
            display: FakeDisplay::default(),
            store,
            channels,
        }
    }

    fn started_json(player_score: u32, opponent_score: u32) -> String {
        format!(
            r#"{{"status":"started",
                 "player":{{"position":{{"x":1,"y":2}},"score":{player_score}}},
                 "opponent":{{"position":{{"x":-1,"y":0}},"score":{opponent_score}}},
                 "ball":{{"position":{{"x":0,"y":0}}}}}}"#
        )
    }

    fn finished_json() -> String {
        started_json(10, 4).replace("started", "finished")
    }

    fn open(rig: &mut Rig) {
        assert_eq!(
            rig.session
                .handle_event(TransportEvent::Open, &mut rig.display),
            None
        );
    }

    fn message(rig: &mut Rig, text: &str) -> Option<SessionExit> {
        rig.session
            .handle_event(TransportEvent::Message(text.to_string()), &mut rig.display)
    }

    #[test]
    fn test_open_sends_ready_and_persists_game_id() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);

        assert_eq!(rig.transport.sent_types(), vec!["ready"]);
        assert_eq!(rig.store.get(GAME_KEY), Some("42".to_string()));
        assert!(rig.session.frames.is_running());
    }

    #[test]
    fn test_local_game_persists_nothing() {
        let mut rig = rig(GameMode::Local);
        open(&mut rig);

        assert_eq!(rig.transport.sent_types(), vec!["ready"]);
        assert_eq!(rig.store.get(GAME_KEY), None);
    }

    #[test]
    fn test_ready_starts_the_countdown() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);

        message(&mut rig, r#"{"status":"ready","timer":3}"#);
        assert_eq!(rig.session.phase(), Phase::Ready);
        assert_eq!(rig.session.view().countdown, Some(3));

        // The server refreshes the countdown once per second.
        message(&mut rig, r#"{"status":"ready","timer":2}"#);
        assert_eq!(rig.session.view().countdown, Some(2));
    }

    #[test]
    fn test_snapshot_updates_scores_and_clears_countdown() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);
        message(&mut rig, r#"{"status":"ready","timer":0}"#);

        message(&mut rig, &started_json(3, 1));
        assert_eq!(rig.session.phase(), Phase::Started);
        assert_eq!(rig.session.view().player.score, 3);
        assert_eq!(rig.session.view().opponent.score, 1);
        assert_eq!(rig.session.view().countdown, None);
        assert!(rig.session.view().ball.is_some());
    }

    #[test]
    fn test_snapshot_before_ready_is_ignored() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);

        message(&mut rig, &started_json(3, 1));
        assert_eq!(rig.session.phase(), Phase::Connecting);
        assert_eq!(rig.session.view().player.score, 0);
    }

    #[test]
    fn test_reapplying_a_snapshot_is_idempotent() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);
        message(&mut rig, r#"{"status":"ready","timer":0}"#);

        message(&mut rig, &started_json(3, 1));
        let after_once = rig.session.view().clone();
        message(&mut rig, &started_json(3, 1));
        assert_eq!(rig.session.view(), &after_once);
    }

    #[test]
    fn test_malformed_message_is_dropped_without_phase_change() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);
        message(&mut rig, r#"{"status":"ready","timer":1}"#);

        assert_eq!(message(&mut rig, "{not json"), None);
        assert_eq!(message(&mut rig, r#"{"status":"warming_up"}"#), None);
        assert_eq!(
            message(&mut rig, r#"{"status":"started","player":{}}"#),
            None
        );
        assert_eq!(rig.session.phase(), Phase::Ready);
    }

    #[test]
    fn test_pause_cycle() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);
        message(&mut rig, r#"{"status":"ready","timer":0}"#);
        message(&mut rig, &started_json(0, 0));

        rig.session.handle_action(InputAction::Pause);
        assert_eq!(rig.session.phase(), Phase::Paused);

        // Captured, not forwarded.
        rig.session.handle_action(InputAction::Move {
            user_id: 1,
            movement: Movement::Up,
        });
        assert_eq!(
            rig.transport.sent_types(),
            vec!["ready", "pause"],
            "movement while paused must not reach the channel"
        );

        rig.session.handle_action(InputAction::Unpause);
        assert_eq!(rig.session.phase(), Phase::Started);
        rig.session.handle_action(InputAction::Move {
            user_id: 1,
            movement: Movement::Down,
        });
        assert_eq!(
            rig.transport.sent_types(),
            vec!["ready", "pause", "unpause", "update"]
        );
    }

    #[test]
    fn test_pause_only_reachable_from_started() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);
        message(&mut rig, r#"{"status":"ready","timer":3}"#);

        rig.session.handle_action(InputAction::Pause);
        assert_eq!(rig.session.phase(), Phase::Ready);

        message(&mut rig, &started_json(0, 0));
        message(&mut rig, r#"{"status":"paused"}"#);
        assert_eq!(rig.session.phase(), Phase::Paused);

        // A fresh snapshot means the server resumed play.
        message(&mut rig, &started_json(0, 1));
        assert_eq!(rig.session.phase(), Phase::Started);
    }

    #[test]
    fn test_finished_cleans_up_exactly_once() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);
        message(&mut rig, r#"{"status":"ready","timer":0}"#);
        message(&mut rig, &started_json(9, 4));

        assert_eq!(message(&mut rig, &finished_json()), Some(SessionExit::Finished));
        assert_eq!(rig.session.phase(), Phase::Finished);
        assert_eq!(rig.store.get(GAME_KEY), None);
        assert!(!rig.channels.contains(GAME_CHANNEL));
        assert_eq!(rig.transport.close_count(), 1);
        assert_eq!(rig.display.results, vec![MatchOutcome::Won]);
        assert!(rig.session.view().ball.is_none());

        // Duplicate finished messages change nothing.
        assert_eq!(message(&mut rig, &finished_json()), None);
        assert_eq!(rig.transport.close_count(), 1);
        assert_eq!(rig.display.results.len(), 1);

        // Frames come from the frame driver, never from message handling.
        assert_eq!(rig.display.frames, 0);
    }

    #[test]
    fn test_terminal_close_code_clears_the_rejoin_id() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);

        let exit = rig
            .session
            .handle_event(TransportEvent::Closed { code: 4000 }, &mut rig.display);
        assert_eq!(exit, Some(SessionExit::ConnectionLost));
        assert_eq!(rig.store.get(GAME_KEY), None);
    }

    #[test]
    fn test_other_close_codes_keep_the_rejoin_id() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);

        let exit = rig
            .session
            .handle_event(TransportEvent::Closed { code: 1006 }, &mut rig.display);
        assert_eq!(exit, Some(SessionExit::ConnectionLost));
        assert_eq!(rig.store.get(GAME_KEY), Some("42".to_string()));

        // The session is over either way; a later end() has nothing left
        // to quit.
        rig.session.end();
        assert_eq!(rig.transport.sent_types(), vec!["ready"]);
    }

    #[test]
    fn test_transport_error_is_fatal_and_clears_the_rejoin_id() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);

        let exit = rig.session.handle_event(
            TransportEvent::Error("broken pipe".to_string()),
            &mut rig.display,
        );
        assert_eq!(exit, Some(SessionExit::NavigateBack));
        assert_eq!(rig.store.get(GAME_KEY), None);
    }

    #[test]
    fn test_end_sends_quit_and_removes_the_channel() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);
        message(&mut rig, r#"{"status":"ready","timer":3}"#);

        rig.session.end();
        assert_eq!(rig.transport.sent_types(), vec!["ready", "quit"]);
        assert!(!rig.channels.contains(GAME_CHANNEL));
        assert!(!rig.session.frames.is_running());

        // Ending twice must not double-quit or double-close.
        rig.session.end();
        assert_eq!(rig.transport.sent_types(), vec!["ready", "quit"]);
        assert_eq!(rig.transport.close_count(), 1);
    }

    #[test]
    fn test_end_after_finish_does_not_quit() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);
        message(&mut rig, r#"{"status":"ready","timer":0}"#);
        message(&mut rig, &started_json(10, 0));
        message(&mut rig, &finished_json());

        rig.session.end();
        let types = rig.transport.sent_types();
        assert!(!types.contains(&"quit".to_string()));
    }

    #[test]
    fn test_users_info_fills_the_scoreboard() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        open(&mut rig);

        message(
            &mut rig,
            r#"{"type":"users_info","users":[
                {"id":1,"username":"alice"},{"id":8,"username":"bob"}]}"#,
        );
        assert_eq!(rig.session.view().player.username.as_deref(), Some("alice"));
        assert_eq!(rig.session.view().opponent.username.as_deref(), Some("bob"));
        assert_eq!(rig.session.view().opponent.id, 8);
    }

    #[test]
    fn test_send_on_missing_channel_is_dropped_silently() {
        let mut rig = rig(GameMode::Remote { game_id: 42 });
        rig.channels.remove(GAME_CHANNEL);

        // Must not panic; the command is logged and dropped.
        open(&mut rig);
        rig.session.handle_action(InputAction::Move {
            user_id: 1,
            movement: Movement::Up,
        });
    }
}
