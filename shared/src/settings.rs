//! Runtime settings shared by both binaries

use crate::error::{SettingsError, TransportError};
use crate::geometry::Vector2;
use crate::model::Config;
use crate::transport::{Address, DropRate};
use crate::DEFAULT_PORT;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub size: Vector2,
    pub fps: u32,
    pub host: String,
    pub port: u16,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub drop_rate: f32,
    pub max_peers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config: Config::default(),
            size: Vector2::new(800.0, 600.0),
            fps: 60,
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            heartbeat_interval: Duration::from_millis(500),
            heartbeat_timeout: Duration::from_secs(5),
            drop_rate: 0.0,
            max_peers: 4,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.fps == 0 {
            return Err(SettingsError::ZeroFps);
        }
        if !(self.size.x > 0.0 && self.size.y > 0.0) {
            return Err(SettingsError::InvalidSize(self.size.x, self.size.y));
        }
        if self.heartbeat_interval >= self.heartbeat_timeout {
            return Err(SettingsError::HeartbeatTooSlow {
                interval_ms: self.heartbeat_interval.as_millis(),
                timeout_ms: self.heartbeat_timeout.as_millis(),
            });
        }
        if self.max_peers == 0 {
            return Err(SettingsError::NoPeers);
        }
        self.drop_rate()?;
        Ok(())
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }

    /// Where terminals reach the coordinator.
    pub fn coordinator_address(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }

    /// Where the coordinator listens.
    pub fn bind_address(&self) -> Address {
        Address::any_interface(self.port)
    }

    pub fn drop_rate(&self) -> Result<DropRate, TransportError> {
        DropRate::new(self.drop_rate)
    }
}
