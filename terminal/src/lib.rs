//! # Pong Terminal
//!
//! The player side of a networked Pong match. A terminal plays one side of the
//! table: it keeps a local mirror of the game, applies its own paddle moves to the
//! mirror straight away, forwards them to the coordinator, and overrides the
//! mirror whenever a fresher snapshot arrives.
//!
//! ## Modules
//!
//! - [`game`]: the mirror, speculative moves and stale snapshot filtering
//! - [`input`]: keyboard edge detection on top of macroquad
//! - [`local`]: an offline match with several players on one keyboard
//! - [`network`]: the UDP tasks, heartbeats and the per-frame loop
//! - [`rendering`]: the arena and a small connection HUD
//!
//! ## Usage
//!
//! ```no_run
//! use shared::control::ScriptedInput;
//! use shared::settings::Settings;
//! use shared::{Pong, Side};
//! use terminal::Terminal;
//!
//! # async fn play() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let settings = Settings::default();
//! let pong = Pong::new(settings.size, settings.config)?;
//! let mut terminal = Terminal::connect(&settings, Side::Left, pong).await?;
//! let reason = terminal.run_headless(settings.fps, &mut ScriptedInput::default()).await;
//! println!("stopped: {:?}", reason);
//! # Ok(())
//! # }
//! ```
//!
//! The frame loop is synchronous so that it can be driven from the macroquad
//! window loop while the network tasks live on a tokio runtime.

pub mod game;
pub mod input;
pub mod local;
pub mod network;
pub mod rendering;

pub use network::{StopReason, Terminal};
