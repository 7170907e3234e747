//! Input capture with per-user change detection.

use std::collections::HashMap;

use macroquad::input::{is_key_down, touches, TouchPhase};
use macroquad::window::screen_width;
use shared::{Movement, GUEST_USER_ID};

pub use macroquad::input::KeyCode;

/// A physical key pair steering one paddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddleKeys {
    pub up: KeyCode,
    pub down: KeyCode,
    pub user_id: u32,
}

/// Which physical inputs map to which logical user id.
///
/// Local and remote games differ only in this table, not in handler
/// logic: a local game simply binds a second key pair to the guest id.
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub paddles: Vec<PaddleKeys>,
    pub pause: KeyCode,
    pub unpause: KeyCode,
    /// Touch input steers this user id.
    pub touch_user_id: u32,
}

impl InputConfig {
    /// Remote game: one key pair bound to the authenticated user.
    pub fn remote(user_id: u32) -> Self {
        Self {
            paddles: vec![PaddleKeys {
                up: KeyCode::A,
                down: KeyCode::D,
                user_id,
            }],
            pause: KeyCode::P,
            unpause: KeyCode::Q,
            touch_user_id: user_id,
        }
    }

    /// Local game: arrow keys drive the second paddle under the guest id,
    /// sharing the same connection.
    pub fn local(user_id: u32) -> Self {
        let mut config = Self::remote(user_id);
        config.paddles.push(PaddleKeys {
            up: KeyCode::Left,
            down: KeyCode::Right,
            user_id: GUEST_USER_ID,
        });
        config
    }
}

/// What a key or touch transition asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Move { user_id: u32, movement: Movement },
    Pause,
    Unpause,
}

/// Turns raw key and touch transitions into deduplicated movement
/// commands: a command is produced only when the derived movement differs
/// from the last one produced for that user id, so held keys and repeated
/// key-down events never flood the channel.
pub struct InputController {
    config: InputConfig,
    last_sent: HashMap<u32, Movement>,
}

impl InputController {
    pub fn new(config: InputConfig) -> Self {
        Self {
            config,
            last_sent: HashMap::new(),
        }
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    pub fn key_down(&mut self, key: KeyCode) -> Option<InputAction> {
        if key == self.config.pause {
            return Some(InputAction::Pause);
        }
        if key == self.config.unpause {
            return Some(InputAction::Unpause);
        }

        let paddle = self
            .config
            .paddles
            .iter()
            .find(|p| p.up == key || p.down == key)?;
        let movement = if key == paddle.up {
            Movement::Up
        } else {
            Movement::Down
        };
        self.transition(paddle.user_id, movement)
    }

    pub fn key_up(&mut self, key: KeyCode) -> Option<InputAction> {
        let paddle = self
            .config
            .paddles
            .iter()
            .find(|p| p.up == key || p.down == key)?;
        self.transition(paddle.user_id, Movement::None)
    }

    /// `x_fraction` is the touch position across the screen in `0..1`;
    /// the left half steers up, the right half down.
    pub fn touch_start(&mut self, x_fraction: f32) -> Option<InputAction> {
        let movement = if x_fraction < 0.5 {
            Movement::Up
        } else {
            Movement::Down
        };
        self.transition(self.config.touch_user_id, movement)
    }

    pub fn touch_end(&mut self) -> Option<InputAction> {
        self.transition(self.config.touch_user_id, Movement::None)
    }

    fn transition(&mut self, user_id: u32, movement: Movement) -> Option<InputAction> {
        let last = self
            .last_sent
            .get(&user_id)
            .copied()
            .unwrap_or(Movement::None);
        if last == movement {
            return None;
        }
        self.last_sent.insert(user_id, movement);
        Some(InputAction::Move { user_id, movement })
    }
}

/// Samples macroquad input once per frame and feeds edges to the
/// controller, comparing against the previous frame's key state.
pub struct InputDriver {
    watched: Vec<KeyCode>,
    previous: HashMap<KeyCode, bool>,
}

impl InputDriver {
    pub fn new(config: &InputConfig) -> Self {
        let mut watched = vec![config.pause, config.unpause];
        for paddle in &config.paddles {
            watched.push(paddle.up);
            watched.push(paddle.down);
        }
        Self {
            watched,
            previous: HashMap::new(),
        }
    }

    /// Returns the actions produced by transitions since the last frame.
    pub fn poll(&mut self, controller: &mut InputController) -> Vec<InputAction> {
        let mut actions = Vec::new();

        for &key in &self.watched {
            let down = is_key_down(key);
            let was_down = self.previous.insert(key, down).unwrap_or(false);
            if down && !was_down {
                actions.extend(controller.key_down(key));
            } else if !down && was_down {
                actions.extend(controller.key_up(key));
            }
        }

        for touch in touches() {
            match touch.phase {
                TouchPhase::Started => {
                    actions.extend(controller.touch_start(touch.position.x / screen_width()));
                }
                TouchPhase::Ended | TouchPhase::Cancelled => {
                    actions.extend(controller.touch_end());
                }
                _ => {}
            }
        }

        actions
    }
}
