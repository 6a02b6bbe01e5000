//! Wire protocol: the event taxonomy and its JSON codec
//!
//! Every datagram carries exactly one `Event`. Composite values are tagged with
//! `"$type"` so a receiver can dispatch without knowing the schema up front.

use crate::error::CodecError;
use crate::geometry::Direction;
use crate::model::{Pong, Side};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "$type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    PlayerJoin {
        side: Side,
    },
    PlayerLeave {
        side: Side,
    },
    PaddleMove {
        side: Side,
        direction: Direction,
    },
    /// A local tick, or an authoritative snapshot when `snapshot` is present.
    TimeElapsed {
        dt: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<Box<Pong>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },
    Heartbeat {
        side: Side,
        timestamp: u64,
    },
    GameOver,
}

impl Event {
    pub fn tick(dt: f32) -> Self {
        Event::TimeElapsed {
            dt,
            snapshot: None,
            seq: None,
        }
    }

    pub fn snapshot(dt: f32, pong: &Pong, seq: u64) -> Self {
        Event::TimeElapsed {
            dt,
            snapshot: Some(Box::new(pong.clone())),
            seq: Some(seq),
        }
    }

    /// The player this event concerns, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            Event::PlayerJoin { side }
            | Event::PlayerLeave { side }
            | Event::PaddleMove { side, .. }
            | Event::Heartbeat { side, .. } => Some(*side),
            Event::TimeElapsed { .. } | Event::GameOver => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::PlayerJoin { .. } => "PLAYER_JOIN",
            Event::PlayerLeave { .. } => "PLAYER_LEAVE",
            Event::PaddleMove { .. } => "PADDLE_MOVE",
            Event::TimeElapsed { .. } => "TIME_ELAPSED",
            Event::Heartbeat { .. } => "HEARTBEAT",
            Event::GameOver => "GAME_OVER",
        }
    }
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    decode(std::str::from_utf8(bytes)?)
}
