use serde::{Deserialize, Serialize};

pub const COURT_WIDTH: f32 = 800.0;
pub const COURT_HEIGHT: f32 = 600.0;
pub const COURT_HALF_WIDTH: f32 = 400.0;
pub const COURT_HALF_HEIGHT: f32 = 300.0;
pub const PADDLE_WIDTH: f32 = 8.0;
pub const PADDLE_HEIGHT: f32 = 64.0;
pub const PADDLE_X: f32 = 400.0 - 20.0;
pub const BALL_SIZE: f32 = 4.0;
pub const COUNTDOWN_SECONDS: u32 = 3;
pub const POINTS_TO_WIN: u32 = 10;

/// User id of the second paddle in a local two-keyboard game. The server
/// attributes commands tagged with it to the unauthenticated guest seat.
pub const GUEST_USER_ID: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// Paddle movement carried by `update` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Movement {
    Up,
    Down,
    None,
}

/// Client-to-server envelope, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientCommand {
    Ready,
    Update { user_id: u32, movement: Movement },
    Quit,
    Pause,
    Unpause,
    Hello,
}

/// One side's slice of an authoritative snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub position: Vec2,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub position: Vec2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: u32,
    pub username: String,
}

/// Game-lifecycle messages, discriminated by the `status` field.
///
/// Snapshots are always expressed from the receiving player's point of
/// view; the server mirrors coordinates so `player` is the local paddle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusUpdate {
    Ready {
        timer: u32,
    },
    Started {
        player: PlayerSnapshot,
        opponent: PlayerSnapshot,
        ball: BallSnapshot,
    },
    Paused,
    Finished {
        player: PlayerSnapshot,
        opponent: PlayerSnapshot,
        ball: BallSnapshot,
    },
}

/// Out-of-band server events, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    UsersInfo {
        users: Vec<UserInfo>,
    },
    /// Matchmaking spells the field `game_id`; tournament brackets send
    /// the same event with a bare `id`.
    GameFound {
        #[serde(alias = "id")]
        game_id: u64,
    },
    TournamentFound {
        tournament_id: u64,
    },
}

/// Any server-to-client message. A payload that matches neither family,
/// or carries an unknown discriminant, is a decode error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Status(StatusUpdate),
    Event(ServerEvent),
}
