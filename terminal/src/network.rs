//! Terminal network layer: the UDP tasks and the per-frame loop
//!
//! The frame loop never waits on the network. A receiver task decodes datagrams
//! into an inbox that each frame drains, and a sender task drains the outbox the
//! frame loop posts to.

use crate::game::ClientGameState;
use crate::rendering::HudState;
use log::{debug, error, info, warn};
use shared::control::{event_for, ChannelSink, EventSink, InputSource};
use shared::protocol::{decode_bytes, encode, Event};
use shared::settings::Settings;
use shared::transport::{SessionSender, UdpClient, UdpSession};
use shared::{get_timestamp, Pong, Side, TransportError};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};

/// Why the frame loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    GameOver,
    Quit,
    CoordinatorSilent,
}

/// A player process: local mirror, input, and the session with the coordinator.
pub struct Terminal {
    game_state: ClientGameState,
    outbox: ChannelSink,
    inbox: mpsc::UnboundedReceiver<Event>,
    shutdown_tx: watch::Sender<bool>,
    local_addr: SocketAddr,

    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
    since_heartbeat: Duration,
    last_heard: Instant,
    stopped: Option<StopReason>,
}

impl Terminal {
    /// Opens a session with the coordinator and announces the player.
    pub async fn connect(
        settings: &Settings,
        side: Side,
        pong: Pong,
    ) -> Result<Self, TransportError> {
        let drop_rate = settings.drop_rate()?;
        let client = UdpClient::connect(settings.coordinator_address(), drop_rate).await?;
        let local_addr = client.local_addr()?;
        info!("Connecting to {} as {} from {}", client.remote(), side, local_addr);

        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let (outbox, outbox_rx) = ChannelSink::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self::spawn_network_sender(client.sender(), outbox_rx);
        Self::spawn_network_receiver(client.into_session(), inbox_tx, shutdown_rx);

        outbox.post(Event::PlayerJoin { side });

        Ok(Self {
            game_state: ClientGameState::new(pong, side),
            outbox,
            inbox,
            shutdown_tx,
            local_addr,
            heartbeat_interval: settings.heartbeat_interval,
            heartbeat_timeout: settings.heartbeat_timeout,
            since_heartbeat: Duration::ZERO,
            last_heard: Instant::now(),
            stopped: None,
        })
    }

    /// Spawns task that decodes datagrams from the coordinator into the inbox
    fn spawn_network_receiver(
        mut session: UdpSession,
        inbox_tx: mpsc::UnboundedSender<Event>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    received = session.receive() => received,
                };

                let bytes = match received {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("Dropping datagram: {}", e);
                        continue;
                    }
                };

                match decode_bytes::<Event>(&bytes) {
                    Ok(event) => {
                        if inbox_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to decode datagram: {}", e),
                }
            }
            debug!("Receiver task stopped");
        });
    }

    /// Spawns task that encodes and sends everything posted to the outbox
    fn spawn_network_sender(sender: SessionSender, mut outbox_rx: mpsc::UnboundedReceiver<Event>) {
        tokio::spawn(async move {
            while let Some(event) = outbox_rx.recv().await {
                let payload = match encode(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!("Failed to encode {}: {}", event.kind(), e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(payload.as_bytes()).await {
                    error!("Failed to send {} to {}: {}", event.kind(), sender.remote(), e);
                }
            }
            debug!("Sender task stopped");
        });
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stopped
    }

    pub fn is_running(&self) -> bool {
        self.stopped.is_none()
    }

    pub fn hud(&self, fps: i32) -> HudState {
        let (accepted, discarded) = self.game_state.snapshot_counts();
        HudState {
            side: Some(self.game_state.side()),
            joined: self.game_state.is_joined(),
            last_seq: self.game_state.last_seq(),
            accepted,
            discarded,
            players: self.game_state.pong().paddle_count(),
            fps,
        }
    }

    fn stop(&mut self, reason: StopReason) {
        if self.stopped.is_none() {
            info!("Terminal stopping: {:?}", reason);
            self.stopped = Some(reason);
        }
    }

    fn handle_inbound(&mut self, event: Event) {
        self.last_heard = Instant::now();
        match event {
            Event::TimeElapsed {
                snapshot: Some(snapshot),
                seq,
                ..
            } => {
                let was_joined = self.game_state.is_joined();
                let applied = self.game_state.apply_server_state(&snapshot, seq);
                if applied && !was_joined && self.game_state.is_joined() {
                    info!("Joined the match as {}", self.game_state.side());
                }
            }
            Event::GameOver => self.stop(StopReason::GameOver),
            other => debug!("Ignoring {} from coordinator", other.kind()),
        }
    }

    fn handle_local(&mut self, event: Event) {
        if let Err(e) = self.game_state.apply_prediction(&event) {
            debug!("Local {} not applied: {}", event.kind(), e);
        }
        let leaving = matches!(event, Event::PlayerLeave { .. });
        self.outbox.post(event);
        if leaving {
            self.stop(StopReason::Quit);
        }
    }

    /// One iteration of the loop: inbox, local input, heartbeats, liveness, simulation.
    ///
    /// Returns whether the terminal is still running.
    pub fn frame(&mut self, dt: f32, input: &mut dyn InputSource) -> bool {
        if !self.is_running() {
            return false;
        }

        while let Ok(event) = self.inbox.try_recv() {
            self.handle_inbound(event);
        }

        for (key_action, side) in input.poll_actions() {
            if let Some(event) = event_for(key_action, side) {
                self.handle_local(event);
            }
        }
        if !self.is_running() {
            return false;
        }

        self.since_heartbeat += Duration::from_secs_f32(dt.max(0.0));
        if self.since_heartbeat >= self.heartbeat_interval {
            self.since_heartbeat = Duration::ZERO;
            let side = self.game_state.side();
            if !self.game_state.is_joined() {
                self.outbox.post(Event::PlayerJoin { side });
            }
            self.outbox.post(Event::Heartbeat {
                side,
                timestamp: get_timestamp(),
            });
        }

        if self.last_heard.elapsed() > self.heartbeat_timeout {
            warn!(
                "No word from the coordinator for {:?}, giving up",
                self.heartbeat_timeout
            );
            self.stop(StopReason::CoordinatorSilent);
            return false;
        }

        self.game_state.step(dt);
        self.is_running()
    }

    /// Runs the frame loop on a tokio interval, without a window.
    pub async fn run_headless(&mut self, fps: u32, input: &mut dyn InputSource) -> StopReason {
        let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
        let mut frame_interval = interval(period);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = Instant::now();

        loop {
            frame_interval.tick().await;
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f32();
            last = now;

            if !self.frame(dt, input) {
                break;
            }
        }
        self.close();
        self.stopped.unwrap_or(StopReason::Quit)
    }

    /// Leaves the match if still in it and stops the receiver task.
    pub fn close(&mut self) {
        if self.is_running() {
            self.outbox.post(Event::PlayerLeave {
                side: self.game_state.side(),
            });
            self.stop(StopReason::Quit);
        }
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
