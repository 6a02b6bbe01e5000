//! Registry of terminals taking part in the match
//!
//! A peer is known by the address its datagrams come from and owns exactly one
//! side of the table. Liveness is tracked per peer so that silent terminals can
//! be evicted and their paddles removed.

use log::info;
use shared::transport::Address;
use shared::Side;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Peer {
    pub address: Address,
    pub side: Side,
    /// Last time a join or heartbeat arrived from this peer
    pub last_seen: Instant,
}

impl Peer {
    pub fn new(address: Address, side: Side) -> Self {
        Self {
            address,
            side,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Result of a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// The address already plays the given side. Its liveness was refreshed.
    AlreadyJoined(Side),
    /// Another address owns the requested side.
    SideTaken(Address),
    Full,
}

pub struct PeerRegistry {
    peers: HashMap<Address, Peer>,
    max_peers: usize,
}

impl PeerRegistry {
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: HashMap::new(),
            max_peers,
        }
    }

    pub fn admit(&mut self, address: Address, side: Side) -> Admission {
        if let Some(peer) = self.peers.get_mut(&address) {
            peer.touch();
            return Admission::AlreadyJoined(peer.side);
        }
        if let Some(owner) = self.owner_of(side) {
            return Admission::SideTaken(owner.clone());
        }
        if self.peers.len() >= self.max_peers {
            return Admission::Full;
        }

        info!("Peer {} joined as {}", address, side);
        self.peers.insert(address.clone(), Peer::new(address, side));
        Admission::Admitted
    }

    pub fn remove(&mut self, address: &Address) -> Option<Peer> {
        let peer = self.peers.remove(address)?;
        info!("Peer {} ({}) left", peer.address, peer.side);
        Some(peer)
    }

    /// Refreshes liveness. Returns false for unknown addresses.
    pub fn touch(&mut self, address: &Address) -> bool {
        match self.peers.get_mut(address) {
            Some(peer) => {
                peer.touch();
                true
            }
            None => false,
        }
    }

    pub fn side_of(&self, address: &Address) -> Option<Side> {
        self.peers.get(address).map(|peer| peer.side)
    }

    pub fn owner_of(&self, side: Side) -> Option<&Address> {
        self.peers
            .values()
            .find(|peer| peer.side == side)
            .map(|peer| &peer.address)
    }

    /// Removes and returns every peer silent for longer than `timeout`.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Peer> {
        let expired: Vec<Address> = self
            .peers
            .values()
            .filter(|peer| peer.is_timed_out(timeout))
            .map(|peer| peer.address.clone())
            .collect();

        expired
            .iter()
            .filter_map(|address| self.peers.remove(address))
            .inspect(|peer| info!("Peer {} ({}) timed out", peer.address, peer.side))
            .collect()
    }

    /// Snapshot of peer addresses, to be used after the lock is released.
    pub fn addresses(&self) -> Vec<Address> {
        self.peers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(port: u16) -> Address {
        Address::new("127.0.0.1", port)
    }

    #[test]
    fn test_admission_rules() {
        let mut registry = PeerRegistry::new(2);
        assert_eq!(registry.admit(address(1), Side::Left), Admission::Admitted);
        assert_eq!(
            registry.admit(address(1), Side::Right),
            Admission::AlreadyJoined(Side::Left)
        );
        assert_eq!(
            registry.admit(address(2), Side::Left),
            Admission::SideTaken(address(1))
        );
        assert_eq!(registry.admit(address(2), Side::Right), Admission::Admitted);
        assert_eq!(registry.admit(address(3), Side::Up), Admission::Full);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_lookup_and_removal() {
        let mut registry = PeerRegistry::new(4);
        registry.admit(address(10), Side::Down);

        assert_eq!(registry.side_of(&address(10)), Some(Side::Down));
        assert_eq!(registry.owner_of(Side::Down), Some(&address(10)));
        assert!(registry.touch(&address(10)));
        assert!(!registry.touch(&address(11)));

        let peer = registry.remove(&address(10)).unwrap();
        assert_eq!(peer.side, Side::Down);
        assert!(registry.remove(&address(10)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_silent_peers_time_out() {
        let mut registry = PeerRegistry::new(4);
        registry.admit(address(1), Side::Left);
        registry.admit(address(2), Side::Right);

        std::thread::sleep(Duration::from_millis(20));
        registry.touch(&address(2));

        let expired = registry.check_timeouts(Duration::from_millis(10));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].side, Side::Left);
        assert_eq!(registry.addresses(), vec![address(2)]);
    }

    #[test]
    fn test_peer_timeout_threshold() {
        let mut peer = Peer::new(address(5), Side::Up);
        assert!(!peer.is_timed_out(Duration::from_secs(60)));
        peer.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(peer.is_timed_out(Duration::from_secs(1)));
        peer.touch();
        assert!(!peer.is_timed_out(Duration::from_secs(1)));
    }
}
