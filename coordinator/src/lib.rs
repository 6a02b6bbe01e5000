//! # Pong Coordinator
//!
//! The authoritative side of a networked Pong match. It owns the canonical
//! simulation, admits terminals as players on one side of the table each, applies
//! their paddle moves, and broadcasts a sequenced snapshot of the whole game on
//! every tick.
//!
//! ## Modules
//!
//! - [`game`]: event arbitration on the canonical `Pong`
//! - [`peers`]: which address plays which side, and who went silent
//! - [`network`]: the UDP tasks and the `tokio::select!` simulation loop
//!
//! Network tasks never touch the simulation. They hand decoded events to the
//! loop through an unbounded channel, and the loop is the only place where the
//! game is mutated.

pub mod game;
pub mod network;
pub mod peers;

pub use network::{Coordinator, ShutdownHandle};
