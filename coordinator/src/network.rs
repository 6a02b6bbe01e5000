//! Coordinator network layer: UDP tasks, peer bookkeeping and the simulation loop

use crate::game::{GameState, Outcome};
use crate::peers::{Admission, Peer, PeerRegistry};
use log::{debug, error, info, warn};
use shared::protocol::{decode_bytes, encode, Event};
use shared::settings::Settings;
use shared::transport::{Address, UdpServer};
use shared::{Pong, Side, TransportError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Largest simulation step, so a stalled loop does not teleport the ball.
const MAX_DELTA: f32 = 1.0 / 20.0;

/// Messages sent from network tasks to the simulation loop
#[derive(Debug)]
pub enum CoordinatorMessage {
    EventReceived { event: Event, from: Address },
    PeerTimeout { peer: Peer },
}

/// Messages sent from the simulation loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    Send { event: Event, to: Address },
    Broadcast { event: Event },
}

/// Stops a running coordinator from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Owns the canonical game and talks to every terminal.
pub struct Coordinator {
    server: UdpServer,
    peers: Arc<RwLock<PeerRegistry>>,
    game: GameState,
    settings: Settings,

    coordinator_tx: mpsc::UnboundedSender<CoordinatorMessage>,
    coordinator_rx: mpsc::UnboundedReceiver<CoordinatorMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: Option<mpsc::UnboundedReceiver<OutboundMessage>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl Coordinator {
    pub async fn bind(settings: Settings, pong: Pong) -> Result<Self, TransportError> {
        let server = UdpServer::bind(&settings.bind_address(), settings.drop_rate()?).await?;
        info!("Coordinator listening on {}", server.local_addr()?);

        let (coordinator_tx, coordinator_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            server,
            peers: Arc::new(RwLock::new(PeerRegistry::new(settings.max_peers))),
            game: GameState::new(pong),
            settings,
            coordinator_tx,
            coordinator_rx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
            shutdown_tx: Arc::new(shutdown_tx),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.server.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Spawns task that decodes incoming datagrams into events
    fn spawn_network_receiver(&self) {
        let server = self.server.clone();
        let coordinator_tx = self.coordinator_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    received = server.receive() => received,
                };
                let Some((bytes, from)) = received else {
                    continue;
                };

                match decode_bytes::<Event>(&bytes) {
                    Ok(event) => {
                        debug!("Received {} from {}", event.kind(), from);
                        let message = CoordinatorMessage::EventReceived { event, from };
                        if let Err(e) = coordinator_tx.send(message) {
                            error!("Failed to hand event to main loop: {}", e);
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to decode datagram from {}: {}", from, e),
                }
            }
            debug!("Receiver task stopped");
        });
    }

    /// Spawns task that processes the outgoing queue
    fn spawn_network_sender(&mut self) {
        let Some(mut outbound_rx) = self.outbound_rx.take() else {
            return;
        };
        let server = self.server.clone();
        let peers = Arc::clone(&self.peers);

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    OutboundMessage::Send { event, to } => {
                        Self::send_event_impl(&server, &event, std::slice::from_ref(&to)).await;
                    }
                    OutboundMessage::Broadcast { event } => {
                        let addresses = {
                            let peers_guard = peers.read().await;
                            peers_guard.addresses()
                        };
                        Self::send_event_impl(&server, &event, &addresses).await;
                    }
                }
            }
        });
    }

    /// Spawns task that evicts silent peers
    fn spawn_timeout_checker(&self) {
        let peers = Arc::clone(&self.peers);
        let coordinator_tx = self.coordinator_tx.clone();
        let timeout = self.settings.heartbeat_timeout;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut check_interval = interval(self.settings.heartbeat_interval);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = check_interval.tick() => {}
                }

                let timed_out = {
                    let mut peers_guard = peers.write().await;
                    peers_guard.check_timeouts(timeout)
                };

                for peer in timed_out {
                    if let Err(e) = coordinator_tx.send(CoordinatorMessage::PeerTimeout { peer }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_event_impl(server: &UdpServer, event: &Event, addresses: &[Address]) {
        if addresses.is_empty() {
            return;
        }
        let payload = match encode(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode {}: {}", event.kind(), e);
                return;
            }
        };
        for address in addresses {
            if let Err(e) = server.send(address, payload.as_bytes()).await {
                error!("Failed to send {} to {}: {}", event.kind(), address, e);
            }
        }
    }

    fn queue(&self, message: OutboundMessage) {
        if let Err(e) = self.outbound_tx.send(message) {
            error!("Failed to queue outgoing event: {}", e);
        }
    }

    fn apply(&mut self, event: Event) -> Outcome {
        let kind = event.kind();
        match self.game.handle(event) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Rejected {}: {}", kind, e);
                Outcome::Continue
            }
        }
    }

    /// Arbitrates one event coming from `from`
    async fn handle_event(&mut self, event: Event, from: Address) -> Outcome {
        match event {
            Event::PlayerJoin { side } => {
                let admission = {
                    let mut peers = self.peers.write().await;
                    peers.admit(from.clone(), side)
                };
                match admission {
                    Admission::Admitted => match self.game.handle(Event::PlayerJoin { side }) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            // A queued eviction may still hold the paddle: let the
                            // terminal retry once it is gone.
                            warn!("Rejected join from {}: {}", from, e);
                            self.peers.write().await.remove(&from);
                            Outcome::Continue
                        }
                    },
                    Admission::AlreadyJoined(existing) if existing == side => {
                        if self.game.pong().has_paddle(side) {
                            debug!("Repeated join from {} for {}", from, side);
                            Outcome::Continue
                        } else {
                            info!("Restoring missing paddle {} for {}", side, from);
                            self.apply(Event::PlayerJoin { side })
                        }
                    }
                    Admission::AlreadyJoined(existing) => {
                        warn!("{} already plays {}, ignoring join for {}", from, existing, side);
                        Outcome::Continue
                    }
                    Admission::SideTaken(owner) => {
                        warn!("Side {} requested by {} is owned by {}", side, from, owner);
                        Outcome::Continue
                    }
                    Admission::Full => {
                        warn!("Rejecting {}: match is full", from);
                        self.queue(OutboundMessage::Send {
                            event: Event::GameOver,
                            to: from,
                        });
                        Outcome::Continue
                    }
                }
            }

            Event::PlayerLeave { side } => {
                let removed = {
                    let mut peers = self.peers.write().await;
                    match peers.side_of(&from) {
                        Some(owned) if owned == side => peers.remove(&from),
                        _ => None,
                    }
                };
                if removed.is_none() {
                    warn!("Ignoring leave for {} from non-owner {}", side, from);
                    return Outcome::Continue;
                }
                self.apply(Event::PlayerLeave { side })
            }

            Event::PaddleMove { side, direction } => {
                if !self.owns(&from, side).await {
                    warn!("Ignoring move for {} from non-owner {}", side, from);
                    return Outcome::Continue;
                }
                self.apply(Event::PaddleMove { side, direction })
            }

            Event::Heartbeat { side, timestamp } => {
                let known = {
                    let mut peers = self.peers.write().await;
                    peers.touch(&from)
                };
                if known {
                    debug!("Heartbeat from {} ({}) at {}", from, side, timestamp);
                } else {
                    debug!("Heartbeat from unknown peer {}", from);
                }
                Outcome::Continue
            }

            Event::TimeElapsed { .. } | Event::GameOver => {
                warn!("Unexpected {} from {}", event.kind(), from);
                Outcome::Continue
            }
        }
    }

    /// Removes the paddle of a peer the timeout sweep dropped from the registry.
    fn evict(&mut self, peer: Peer) -> Outcome {
        warn!("Evicting silent peer {} ({})", peer.address, peer.side);
        self.apply(Event::PlayerLeave { side: peer.side })
    }

    async fn owns(&self, address: &Address, side: Side) -> bool {
        let peers = self.peers.read().await;
        peers.side_of(address) == Some(side)
    }

    /// Sends `GameOver` to everyone still registered, bypassing the queue.
    async fn announce_game_over(&self) {
        let addresses = {
            let peers = self.peers.read().await;
            peers.addresses()
        };
        info!("Announcing game over to {} peers", addresses.len());
        Self::send_event_impl(&self.server, &Event::GameOver, &addresses).await;
    }

    /// Main coordinator loop: drains events, ticks the game and broadcasts snapshots
    pub async fn run(&mut self) -> Result<(), TransportError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tick_interval = interval(self.settings.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        if *shutdown_rx.borrow() {
            return Ok(());
        }
        info!("Coordinator started");

        loop {
            tokio::select! {
                message = self.coordinator_rx.recv() => {
                    let outcome = match message {
                        Some(CoordinatorMessage::EventReceived { event, from }) => {
                            self.handle_event(event, from).await
                        }
                        Some(CoordinatorMessage::PeerTimeout { peer }) => self.evict(peer),
                        None => Outcome::GameOver,
                    };
                    if outcome == Outcome::GameOver {
                        info!("Game over");
                        break;
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    if dt > MAX_DELTA {
                        debug!("Large delta time ({:.3}s), capping to {:.3}s", dt, MAX_DELTA);
                        dt = MAX_DELTA;
                    }

                    let snapshot = self.game.tick(dt);
                    self.queue(OutboundMessage::Broadcast { event: snapshot });

                    if self.game.seq() % 600 == 0 {
                        let peer_count = self.peers.read().await.len();
                        debug!("Tick {}: {} peers", self.game.seq(), peer_count);
                    }
                },

                _ = shutdown_rx.changed() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.announce_game_over().await;
        let _ = self.shutdown_tx.send(true);
        info!("Coordinator stopped after {} ticks", self.game.seq());
        Ok(())
    }
}
