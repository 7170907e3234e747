//! # Pong Client Library
//!
//! This library implements the client side of a real-time two-player Pong
//! game whose state lives entirely on the server. It connects named
//! WebSocket channels to that server, turns local input into movement
//! commands, applies the authoritative snapshots the server pushes, and
//! drives a render loop that draws whatever the latest snapshot says.
//!
//! ## Architecture Overview
//!
//! The server simulates the match and streams full snapshots; this client
//! never predicts, interpolates or corrects. That keeps the engine small:
//! it is a connection multiplexer plus a phase state machine, with
//! rendering and input at the edges.
//!
//! Control flow for one frame of play:
//!
//! ```text
//! key/touch edge -> InputController -> GameSession -> Channels -> server
//! server snapshot -> GameSession -> GameView -> RenderLoop -> Display
//! ```
//!
//! ## Module Organization
//!
//! ### Channel Module (`channel`)
//! Named channel registry. Each name ("game", "matchmaking",
//! "tournament") holds at most one live transport; re-registering a name
//! closes the previous connection first.
//!
//! ### Network Module (`network`)
//! The WebSocket transport. Connections are pumped by a background task
//! that delivers `Open` / `Message` / `Error` / `Closed` events over a
//! channel, so sessions consume the socket as an ordered event stream.
//!
//! ### Game Module (`game`)
//! Phase machine states and the entity views the renderer reads. Entity
//! state is mutated exclusively by inbound server messages.
//!
//! ### Input Module (`input`)
//! Key and touch capture with per-user change detection: a movement
//! command goes out only when it differs from the last one sent for that
//! user id, so held keys never flood the channel.
//!
//! ### Session Module (`session`)
//! The orchestrator. Owns the game channel, the phase machine, entity
//! state, the countdown timer and the frame driver; tears all of it down
//! when the match ends or the caller navigates away.
//!
//! ### Matchmaking Module (`matchmaking`)
//! Single-outcome sessions: the matchmaking queue and the tournament
//! bracket watch. Same channel plumbing, one terminal message each.
//!
//! ### Rendering Module (`rendering`)
//! The frame scheduler and the macroquad court renderer, behind a narrow
//! trait so the session can run headless in tests.
//!
//! ## Concurrency Model
//!
//! Everything runs cooperatively on the session's `select!` loop:
//! transport events and frame ticks are handled to completion one at a
//! time, so a frame never observes a half-applied snapshot. There is no
//! client-side watchdog; a silent transport is only detected through its
//! own error or close events.

pub mod channel;
pub mod error;
pub mod game;
pub mod input;
pub mod matchmaking;
pub mod network;
pub mod rendering;
pub mod session;
pub mod storage;
