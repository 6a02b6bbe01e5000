//! Shared library for the networked Pong coordinator and terminals
//!
//! Holds everything both sides must agree on: geometry and collision, the
//! simulation model, the wire protocol, the UDP transport, player controls and
//! runtime settings.

pub mod control;
pub mod error;
pub mod geometry;
pub mod model;
pub mod protocol;
pub mod settings;
pub mod transport;

pub use error::{CodecError, PongError, SettingsError, TransportError};
pub use geometry::{Direction, Rectangle, Vector2};
pub use model::{Config, Pong, Side};
pub use protocol::Event;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Port the coordinator listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 12345;

/// Milliseconds since the Unix epoch.
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
