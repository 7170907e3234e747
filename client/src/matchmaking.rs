//! Short-lived pairing channels: the matchmaking queue and the
//! tournament bracket watch.
//!
//! Both follow the same pattern as the game session (one named channel,
//! events consumed one by one) but produce exactly one terminal outcome
//! and then close.

use log::{debug, info, warn};
use tokio::sync::mpsc;

use shared::{ClientCommand, ServerEvent, ServerMessage};

use crate::channel::Channels;
use crate::error::ClientError;
use crate::network::{ServerEndpoint, TransportEvent, WsTransport};
use crate::storage::{RejoinStore, TOURNAMENT_KEY};

/// Channel name used while queued for a match.
pub const MATCHMAKING_CHANNEL: &str = "matchmaking";

/// Channel name used while watching a tournament bracket.
pub const TOURNAMENT_CHANNEL: &str = "tournament";

/// Which queue to wait in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchmakingKind {
    Game,
    Tournament,
}

impl MatchmakingKind {
    pub fn as_path(self) -> &'static str {
        match self {
            MatchmakingKind::Game => "game",
            MatchmakingKind::Tournament => "tournament",
        }
    }
}

/// The single terminal message a matchmaking channel produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchmakingOutcome {
    GameFound { game_id: u64 },
    TournamentFound { tournament_id: u64 },
    /// The channel went away before any pairing arrived.
    Disconnected,
}

/// Waits in the server's matchmaking queue until it pushes a pairing.
///
/// The server pushes unprompted: nothing is sent on open. Once the first
/// terminal message arrives the channel is closed, so anything the server
/// sends afterwards is never seen.
pub struct MatchmakingSession {
    channels: Channels,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl MatchmakingSession {
    pub async fn connect(
        endpoint: &ServerEndpoint,
        kind: MatchmakingKind,
        channels: Channels,
    ) -> Result<Self, ClientError> {
        let url = endpoint.matchmaking_url(kind.as_path());
        let (transport, events) = WsTransport::connect(&url).await?;
        channels.add(MATCHMAKING_CHANNEL, Box::new(transport));
        info!("queued for {} matchmaking", kind.as_path());

        Ok(Self::with_events(channels, events))
    }

    pub fn with_events(
        channels: Channels,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { channels, events }
    }

    /// Consumes events until the first terminal message, then closes the
    /// channel and returns the outcome.
    pub async fn wait(mut self) -> MatchmakingOutcome {
        let outcome = loop {
            match self.events.recv().await {
                Some(TransportEvent::Open) => {}
                Some(TransportEvent::Message(text)) => {
                    if let Some(outcome) = decode_outcome(&text) {
                        break outcome;
                    }
                }
                Some(TransportEvent::Error(reason)) => {
                    warn!("matchmaking transport error: {reason}");
                    break MatchmakingOutcome::Disconnected;
                }
                Some(TransportEvent::Closed { code }) => {
                    info!("matchmaking channel closed (code {code})");
                    break MatchmakingOutcome::Disconnected;
                }
                None => break MatchmakingOutcome::Disconnected,
            }
        };

        self.channels.remove(MATCHMAKING_CHANNEL);
        outcome
    }

    /// Leaves the queue without producing an outcome.
    pub fn cancel(self) {
        self.channels.remove(MATCHMAKING_CHANNEL);
    }
}

fn decode_outcome(text: &str) -> Option<MatchmakingOutcome> {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::Event(ServerEvent::GameFound { game_id })) => {
            Some(MatchmakingOutcome::GameFound { game_id })
        }
        Ok(ServerMessage::Event(ServerEvent::TournamentFound { tournament_id })) => {
            Some(MatchmakingOutcome::TournamentFound { tournament_id })
        }
        Ok(other) => {
            debug!("ignoring {other:?} while queued");
            None
        }
        Err(e) => {
            warn!("dropping malformed matchmaking message: {e}");
            None
        }
    }
}

/// Watches a tournament bracket for this player's next match.
///
/// Persists the tournament id while the channel is open and clears it on
/// any close, mirroring the game session's rejoin bookkeeping.
pub struct TournamentSession {
    channels: Channels,
    store: RejoinStore,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TournamentSession {
    pub async fn connect(
        endpoint: &ServerEndpoint,
        tournament_id: u64,
        channels: Channels,
        store: RejoinStore,
    ) -> Result<Self, ClientError> {
        let url = endpoint.tournament_url(tournament_id);
        let (transport, events) = WsTransport::connect(&url).await?;
        channels.add(TOURNAMENT_CHANNEL, Box::new(transport));
        store.set(TOURNAMENT_KEY, tournament_id.to_string());

        Ok(Self::with_events(channels, store, events))
    }

    pub fn with_events(
        channels: Channels,
        store: RejoinStore,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            channels,
            store,
            events,
        }
    }

    /// Resolves with the game id of this player's next bracket match, or
    /// `None` if the channel ends first.
    pub async fn wait(mut self) -> Option<u64> {
        let game_id = loop {
            match self.events.recv().await {
                Some(TransportEvent::Open) => {
                    if let Err(e) = self.channels.send(TOURNAMENT_CHANNEL, &ClientCommand::Ready) {
                        warn!("dropping ready: {e}");
                    }
                }
                Some(TransportEvent::Message(text)) => {
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(ServerMessage::Event(ServerEvent::GameFound { game_id })) => {
                            break Some(game_id);
                        }
                        Ok(other) => debug!("ignoring bracket update: {other:?}"),
                        Err(e) => warn!("dropping malformed bracket message: {e}"),
                    }
                }
                Some(TransportEvent::Error(reason)) => {
                    warn!("tournament transport error: {reason}");
                    break None;
                }
                Some(TransportEvent::Closed { .. }) | None => break None,
            }
        };

        self.close();
        game_id
    }

    /// Stops watching the bracket.
    pub fn cancel(self) {
        self.close();
    }

    fn close(&self) {
        self.channels.remove(TOURNAMENT_CHANNEL);
        self.store.remove(TOURNAMENT_KEY);
    }
}
