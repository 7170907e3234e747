//! Client-side game state: phase, entities and the countdown timer.
//!
//! Everything here is mutated by inbound server messages only. There is
//! no local prediction; the render loop reads whatever the most recent
//! snapshot left behind.

use shared::{BallSnapshot, PlayerSnapshot, UserInfo, Vec2, PADDLE_X};

/// Lifecycle stage of a game session.
///
/// `Finished` is terminal: no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Ready,
    Started,
    Paused,
    Finished,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finished)
    }
}

/// How the match ended for the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Won,
    Lost,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub id: u32,
    pub username: Option<String>,
    pub position: Vec2,
    pub score: u32,
}

impl PlayerView {
    fn new(id: u32, x: f32) -> Self {
        Self {
            id,
            username: None,
            position: Vec2 { x, y: 0.0 },
            score: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BallView {
    pub position: Vec2,
}

/// Everything a frame needs: both paddles, the ball, the countdown.
#[derive(Debug, Clone, PartialEq)]
pub struct GameView {
    pub player: PlayerView,
    pub opponent: PlayerView,
    pub ball: Option<BallView>,
    pub countdown: Option<u32>,
}

impl GameView {
    /// Paddles start at the court edges; the opponent id is unknown until
    /// a `users_info` message names it.
    pub fn new(user_id: u32) -> Self {
        Self {
            player: PlayerView::new(user_id, -PADDLE_X),
            opponent: PlayerView::new(0, PADDLE_X),
            ball: None,
            countdown: None,
        }
    }

    /// Overwrites positions and scores wholesale from a snapshot.
    ///
    /// Application is idempotent and last-received-wins: there are no
    /// sequence numbers, so a reordered transport can make a stale
    /// snapshot win. That matches the server contract, which resends the
    /// full state every tick.
    pub fn apply_snapshot(
        &mut self,
        player: &PlayerSnapshot,
        opponent: &PlayerSnapshot,
        ball: &BallSnapshot,
    ) {
        self.player.position = player.position;
        self.player.score = player.score;
        self.opponent.position = opponent.position;
        self.opponent.score = opponent.score;
        self.ball = Some(BallView {
            position: ball.position,
        });
    }

    /// Assigns usernames from a `users_info` event; the entry that is not
    /// ours also fixes up the opponent id.
    pub fn apply_users_info(&mut self, users: &[UserInfo]) {
        for user in users {
            if user.id == self.player.id {
                self.player.username = Some(user.username.clone());
            } else {
                self.opponent.id = user.id;
                self.opponent.username = Some(user.username.clone());
            }
        }
    }

    /// Drops the movable entities once the match is over. Scores and
    /// usernames survive for the result screen.
    pub fn clear_entities(&mut self) {
        self.ball = None;
        self.countdown = None;
    }

    pub fn outcome(&self) -> MatchOutcome {
        if self.player.score > self.opponent.score {
            MatchOutcome::Won
        } else {
            MatchOutcome::Lost
        }
    }
}

/// Presentational countdown shown between `ready` and the first snapshot.
///
/// Carries no authority: the server's `started` snapshot, not this timer,
/// decides when play begins. Each `ready` refresh overwrites the value.
#[derive(Debug, Default)]
pub struct Timer {
    remaining: Option<u32>,
}

impl Timer {
    pub fn start(&mut self, seconds: u32) {
        self.remaining = Some(seconds);
    }

    pub fn clear(&mut self) {
        self.remaining = None;
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(x: f32, score: u32) -> PlayerSnapshot {
        PlayerSnapshot {
            position: Vec2 { x, y: 0.0 },
            score,
        }
    }

    const BALL: BallSnapshot = BallSnapshot {
        position: Vec2 { x: 3.0, y: -2.0 },
    };

    #[test]
    fn test_initial_paddle_placement() {
        let view = GameView::new(9);
        assert_eq!(view.player.id, 9);
        assert_eq!(view.player.position.x, -PADDLE_X);
        assert_eq!(view.opponent.position.x, PADDLE_X);
        assert!(view.ball.is_none());
    }

    #[test]
    fn test_snapshot_application_is_idempotent() {
        let mut view = GameView::new(1);
        view.apply_snapshot(&snapshot(1.0, 3), &snapshot(-1.0, 1), &BALL);
        let once = view.clone();

        view.apply_snapshot(&snapshot(1.0, 3), &snapshot(-1.0, 1), &BALL);
        assert_eq!(view, once);
        assert_eq!(view.player.score, 3);
        assert_eq!(view.opponent.score, 1);
    }

    #[test]
    fn test_last_received_snapshot_wins() {
        let mut view = GameView::new(1);
        view.apply_snapshot(&snapshot(5.0, 2), &snapshot(-5.0, 2), &BALL);
        view.apply_snapshot(&snapshot(1.0, 1), &snapshot(-1.0, 0), &BALL);

        assert_eq!(view.player.position.x, 1.0);
        assert_eq!(view.player.score, 1);
    }

    #[test]
    fn test_users_info_names_both_sides() {
        let mut view = GameView::new(1);
        view.apply_users_info(&[
            UserInfo {
                id: 2,
                username: "bob".to_string(),
            },
            UserInfo {
                id: 1,
                username: "alice".to_string(),
            },
        ]);

        assert_eq!(view.player.username.as_deref(), Some("alice"));
        assert_eq!(view.opponent.username.as_deref(), Some("bob"));
        assert_eq!(view.opponent.id, 2);
    }

    #[test]
    fn test_clear_entities_keeps_scores() {
        let mut view = GameView::new(1);
        view.apply_snapshot(&snapshot(0.0, 10), &snapshot(0.0, 4), &BALL);
        view.clear_entities();

        assert!(view.ball.is_none());
        assert_eq!(view.player.score, 10);
        assert_eq!(view.outcome(), MatchOutcome::Won);
    }

    #[test]
    fn test_tied_score_counts_as_a_loss() {
        // A quit mid-game can end with even scores; only a strictly
        // higher score counts as a win.
        let view = GameView::new(1);
        assert_eq!(view.outcome(), MatchOutcome::Lost);
    }

    #[test]
    fn test_timer_overwrites_and_clears() {
        let mut timer = Timer::default();
        assert_eq!(timer.remaining(), None);

        timer.start(3);
        timer.start(2);
        assert_eq!(timer.remaining(), Some(2));

        timer.clear();
        assert_eq!(timer.remaining(), None);
    }
}
