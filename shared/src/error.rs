//! Error types for each layer of the shared library

use crate::model::Side;
use std::io;

/// Domain violations raised by the simulation model.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PongError {
    #[error("side {0} already has a paddle")]
    SideOccupied(Side),
    #[error("no paddle on side {0}")]
    PaddleNotFound(Side),
    #[error("arena size must be strictly positive")]
    InvalidSize,
    #[error("side {0} appears more than once")]
    DuplicateSide(Side),
}

/// Failures while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("message violates the model: {0}")]
    Model(#[from] PongError),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("payload of {0} bytes exceeds the datagram limit")]
    PayloadTooLarge(usize),
    #[error("received packet from unexpected party {actual} (expected {expected})")]
    UnexpectedSender { expected: String, actual: String },
    #[error("cannot resolve host {0}")]
    Resolve(String),
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    #[error("drop rate {0} must lie in [0, 1)")]
    InvalidDropRate(f32),
}

/// Rejected runtime settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("frame rate must be positive")]
    ZeroFps,
    #[error("arena {0}x{1} must have positive dimensions")]
    InvalidSize(f32, f32),
    #[error("heartbeat interval {interval_ms}ms must be shorter than the timeout {timeout_ms}ms")]
    HeartbeatTooSlow { interval_ms: u128, timeout_ms: u128 },
    #[error("at least one peer must be allowed")]
    NoPeers,
    #[error(transparent)]
    Transport(#[from] TransportError),
}
