//! Frame scheduling and the court renderer.

use std::time::Duration;

use macroquad::prelude::*;
use shared::{BALL_SIZE, COURT_HALF_HEIGHT, COURT_HALF_WIDTH, PADDLE_HEIGHT, PADDLE_WIDTH};
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::game::{GameView, MatchOutcome};

/// Narrow rendering boundary so the session core can run headless.
///
/// The session never reaches past this trait: it hands over the latest
/// view once per frame and the final view once at match end.
pub trait Display {
    /// Draws one frame from the latest view. Cadence belongs to the frame
    /// driver, not the network; a frame may re-render a stale snapshot.
    fn render_frame(&mut self, view: &GameView);

    fn resize(&mut self, width: f32, height: f32);

    /// Shows the end-of-match screen. Called exactly once per session.
    fn show_result(&mut self, view: &GameView, outcome: MatchOutcome);
}

/// Schedules the recurring frame callback; cancelable.
///
/// Not armed until the game channel opens; there is nothing to draw
/// before then.
#[derive(Default)]
pub struct RenderLoop {
    fps: Option<u32>,
    frames: Option<Interval>,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the loop. The interval itself is created on the first await,
    /// so this can be called from a synchronous event handler.
    pub fn start(&mut self, fps: u32) {
        self.fps = Some(fps);
    }

    pub fn is_running(&self) -> bool {
        self.fps.is_some()
    }

    /// Waits for the next frame slot. Never resolves while stopped, so it
    /// can sit in a `select!` unconditionally.
    pub async fn tick(&mut self) {
        match self.fps {
            Some(fps) => {
                let frames = self.frames.get_or_insert_with(|| {
                    let mut frames =
                        interval(Duration::from_millis(1000 / u64::from(fps.max(1))));
                    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    frames
                });
                frames.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Stops scheduling frames. Idempotent, and safe before `start`:
    /// teardown calls this unconditionally even if no frame was ever
    /// scheduled.
    pub fn cancel(&mut self) {
        self.fps = None;
        self.frames = None;
    }
}

/// Draws the court, paddles, ball, scores and countdown with macroquad.
pub struct CourtRenderer {
    width: f32,
    height: f32,
}

impl CourtRenderer {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Server coordinates are centred on the origin with y pointing up.
    fn to_screen(&self, position: &shared::Vec2) -> (f32, f32) {
        let sx = self.width / 2.0 + position.x * self.scale_x();
        let sy = self.height / 2.0 - position.y * self.scale_y();
        (sx, sy)
    }

    fn scale_x(&self) -> f32 {
        self.width / (COURT_HALF_WIDTH * 2.0)
    }

    fn scale_y(&self) -> f32 {
        self.height / (COURT_HALF_HEIGHT * 2.0)
    }

    fn draw_paddle(&self, position: &shared::Vec2, color: Color) {
        let (cx, cy) = self.to_screen(position);
        let w = PADDLE_WIDTH * self.scale_x();
        let h = PADDLE_HEIGHT * self.scale_y();
        draw_rectangle(cx - w / 2.0, cy - h / 2.0, w, h, color);
    }

    fn draw_scores(&self, view: &GameView) {
        let player = format!(
            "{} {}",
            view.player.username.as_deref().unwrap_or("you"),
            view.player.score
        );
        let opponent = format!(
            "{} {}",
            view.opponent.score,
            view.opponent.username.as_deref().unwrap_or("opponent"),
        );

        draw_text(&player, 20.0, 30.0, 24.0, WHITE);
        let opponent_width = measure_text(&opponent, None, 24, 1.0).width;
        draw_text(&opponent, self.width - opponent_width - 20.0, 30.0, 24.0, WHITE);
    }
}

impl Display for CourtRenderer {
    fn render_frame(&mut self, view: &GameView) {
        let (width, height) = (screen_width(), screen_height());
        if width != self.width || height != self.height {
            self.resize(width, height);
        }

        clear_background(Color::from_rgba(26, 26, 26, 255));

        // Centre line.
        draw_line(
            self.width / 2.0,
            0.0,
            self.width / 2.0,
            self.height,
            1.0,
            Color::from_rgba(68, 68, 68, 255),
        );

        self.draw_paddle(&view.player.position, GREEN);
        self.draw_paddle(&view.opponent.position, Color::from_rgba(255, 68, 68, 255));

        if let Some(ball) = &view.ball {
            let (bx, by) = self.to_screen(&ball.position);
            draw_circle(bx, by, BALL_SIZE * self.scale_x(), WHITE);
        }

        self.draw_scores(view);

        if let Some(countdown) = view.countdown {
            let text = countdown.to_string();
            let size = measure_text(&text, None, 96, 1.0);
            draw_text(
                &text,
                self.width / 2.0 - size.width / 2.0,
                self.height / 2.0,
                96.0,
                YELLOW,
            );
        }
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn show_result(&mut self, view: &GameView, outcome: MatchOutcome) {
        let name = view.player.username.as_deref().unwrap_or("player");
        let (title, message) = match outcome {
            MatchOutcome::Won => ("You Won !".to_string(), format!("Congratulation {name}")),
            MatchOutcome::Lost => (
                "You Lose ...".to_string(),
                format!("Don't give up {name}, you'll do better next time, maybe..."),
            ),
        };

        clear_background(Color::from_rgba(26, 26, 26, 255));
        self.draw_scores(view);

        let title_size = measure_text(&title, None, 64, 1.0);
        draw_text(
            &title,
            self.width / 2.0 - title_size.width / 2.0,
            self.height / 2.0 - 20.0,
            64.0,
            WHITE,
        );
        let message_size = measure_text(&message, None, 24, 1.0);
        draw_text(
            &message,
            self.width / 2.0 - message_size.width / 2.0,
            self.height / 2.0 + 30.0,
            24.0,
            GRAY,
        );
    }
}
