//! UDP transport: addresses, datagram primitives and sessions
//!
//! There is no handshake and no reliability layer. A session simply remembers
//! which remote it talks to and refuses datagrams from anybody else.

use crate::error::TransportError;
use log::{debug, trace, warn};
use rand::Rng;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tokio::net::{lookup_host, UdpSocket};

/// Largest datagram payload accepted by `udp_send`.
pub const MAX_PAYLOAD: usize = 65536;

/// A host and port, resolved to an IP on first use.
#[derive(Debug, Clone)]
pub struct Address {
    host: String,
    port: u16,
    resolved: OnceLock<IpAddr>,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            resolved: OnceLock::new(),
        }
    }

    pub fn localhost(port: u16) -> Self {
        Self::new("localhost", port)
    }

    pub fn any_interface(port: u16) -> Self {
        Self::from(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
    }

    /// Any interface, with the port picked by the OS.
    pub fn any_local_port() -> Self {
        Self::any_interface(0)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolves the host, preferring IPv4. The result is cached.
    ///
    /// An uncached hostname is looked up with blocking DNS. Async callers should
    /// go through [`Address::resolve`] first.
    pub fn ip(&self) -> Result<IpAddr, TransportError> {
        if let Some(ip) = self.resolved.get() {
            return Ok(*ip);
        }
        let candidates: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Resolve(self.host.clone()))?
            .collect();
        self.cache(&candidates)
    }

    /// Like [`Address::ip`], but looks the host up on the tokio resolver.
    pub async fn resolve(&self) -> Result<IpAddr, TransportError> {
        if let Some(ip) = self.resolved.get() {
            return Ok(*ip);
        }
        let candidates: Vec<SocketAddr> = lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|_| TransportError::Resolve(self.host.clone()))?
            .collect();
        self.cache(&candidates)
    }

    fn cache(&self, candidates: &[SocketAddr]) -> Result<IpAddr, TransportError> {
        let ip = candidates
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| candidates.first())
            .map(SocketAddr::ip)
            .ok_or_else(|| TransportError::Resolve(self.host.clone()))?;
        Ok(*self.resolved.get_or_init(|| ip))
    }

    pub async fn resolve_socket_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(SocketAddr::new(self.resolve().await?, self.port))
    }

    /// Same resolved IP and port. Falls back to textual equality when either side
    /// cannot be resolved.
    pub fn equivalent_to(&self, other: &Address) -> bool {
        if self.port != other.port {
            return false;
        }
        match (self.ip(), other.ip()) {
            (Ok(a), Ok(b)) => a == b,
            _ => self.host == other.host,
        }
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        let address = Self::new(addr.ip().to_string(), addr.port());
        let _ = address.resolved.set(addr.ip());
        address
    }
}

impl FromStr for Address {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr.into());
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| TransportError::InvalidAddress(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| TransportError::InvalidAddress(s.to_string()))?;
        if host.is_empty() {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Probability of silently discarding an outgoing datagram.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DropRate(f32);

impl DropRate {
    pub const NONE: DropRate = DropRate(0.0);

    pub fn new(rate: f32) -> Result<Self, TransportError> {
        if (0.0..1.0).contains(&rate) {
            Ok(Self(rate))
        } else {
            Err(TransportError::InvalidDropRate(rate))
        }
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    pub fn should_drop(&self) -> bool {
        self.0 > 0.0 && rand::thread_rng().gen::<f32>() < self.0
    }
}

pub async fn udp_socket(bind_to: &Address) -> Result<UdpSocket, TransportError> {
    let socket = UdpSocket::bind(bind_to.resolve_socket_addr().await?).await?;
    debug!("Bound UDP socket on {}", socket.local_addr()?);
    Ok(socket)
}

pub async fn udp_send(
    socket: &UdpSocket,
    address: &Address,
    bytes: &[u8],
) -> Result<usize, TransportError> {
    if bytes.len() > MAX_PAYLOAD {
        return Err(TransportError::PayloadTooLarge(bytes.len()));
    }
    let sent = socket.send_to(bytes, address.resolve_socket_addr().await?).await?;
    trace!("Sent {} bytes to {}", sent, address);
    Ok(sent)
}

/// Waits for the next datagram. Socket errors are reported as `None`.
pub async fn udp_receive(socket: &UdpSocket) -> Option<(Vec<u8>, Address)> {
    let mut buffer = vec![0u8; MAX_PAYLOAD];
    match socket.recv_from(&mut buffer).await {
        Ok((len, from)) => {
            buffer.truncate(len);
            Some((buffer, Address::from(from)))
        }
        Err(e) => {
            debug!("Receive failed: {}", e);
            None
        }
    }
}

/// Non-blocking variant of `udp_receive`; `None` when nothing is queued.
pub fn udp_try_receive(socket: &UdpSocket) -> Option<(Vec<u8>, Address)> {
    let mut buffer = vec![0u8; MAX_PAYLOAD];
    match socket.try_recv_from(&mut buffer) {
        Ok((len, from)) => {
            buffer.truncate(len);
            Some((buffer, Address::from(from)))
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
        Err(e) => {
            debug!("Receive failed: {}", e);
            None
        }
    }
}

async fn send_lossy(
    socket: &UdpSocket,
    address: &Address,
    bytes: &[u8],
    drop_rate: DropRate,
) -> Result<bool, TransportError> {
    if drop_rate.should_drop() {
        warn!("Dropped {} byte datagram to {}", bytes.len(), address);
        return Ok(false);
    }
    udp_send(socket, address, bytes).await?;
    Ok(true)
}

/// A socket bound to a single remote party.
#[derive(Debug)]
pub struct UdpSession {
    socket: Arc<UdpSocket>,
    remote: Option<Address>,
    pending: Option<Vec<u8>>,
    drop_rate: DropRate,
    sent: u64,
    received: u64,
}

impl UdpSession {
    /// A session that adopts whoever sends first, unless `remote` is already known.
    pub fn new(socket: Arc<UdpSocket>, remote: Option<Address>, drop_rate: DropRate) -> Self {
        Self {
            socket,
            remote,
            pending: None,
            drop_rate,
            sent: 0,
            received: 0,
        }
    }

    /// A session opened by a datagram that has already been read off the socket.
    pub fn with_first_message(
        socket: Arc<UdpSocket>,
        remote: Address,
        first: Vec<u8>,
        drop_rate: DropRate,
    ) -> Self {
        Self {
            pending: Some(first),
            ..Self::new(socket, Some(remote), drop_rate)
        }
    }

    pub fn remote(&self) -> Option<&Address> {
        self.remote.as_ref()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    /// Datagrams sent and received so far.
    pub fn stats(&self) -> (u64, u64) {
        (self.sent, self.received)
    }

    /// Sends to the remote. Returns `Ok(false)` when simulated loss ate the datagram.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<bool, TransportError> {
        let remote = self.remote.as_ref().ok_or_else(no_remote)?;
        let delivered = send_lossy(&self.socket, remote, bytes, self.drop_rate).await?;
        if delivered {
            self.sent += 1;
        }
        Ok(delivered)
    }

    /// Waits for the next datagram from the remote.
    ///
    /// `Ok(None)` means the socket reported an error and the caller may retry.
    pub async fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if let Some(first) = self.pending.take() {
            self.received += 1;
            return Ok(Some(first));
        }
        match udp_receive(&self.socket).await {
            Some((bytes, from)) => self.accept(bytes, from).map(Some),
            None => Ok(None),
        }
    }

    pub fn try_receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if let Some(first) = self.pending.take() {
            self.received += 1;
            return Ok(Some(first));
        }
        match udp_try_receive(&self.socket) {
            Some((bytes, from)) => self.accept(bytes, from).map(Some),
            None => Ok(None),
        }
    }

    fn accept(&mut self, bytes: Vec<u8>, from: Address) -> Result<Vec<u8>, TransportError> {
        match &self.remote {
            None => {
                debug!("Session adopted remote {}", from);
                self.remote = Some(from);
            }
            Some(remote) if remote.equivalent_to(&from) => {}
            Some(remote) => {
                return Err(TransportError::UnexpectedSender {
                    expected: remote.to_string(),
                    actual: from.to_string(),
                })
            }
        }
        self.received += 1;
        Ok(bytes)
    }

    /// A cloneable send half, available once the remote is known.
    pub fn sender(&self) -> Option<SessionSender> {
        self.remote.as_ref().map(|remote| SessionSender {
            socket: Arc::clone(&self.socket),
            remote: remote.clone(),
            drop_rate: self.drop_rate,
        })
    }
}

fn no_remote() -> TransportError {
    TransportError::Io(io::Error::new(
        io::ErrorKind::NotConnected,
        "session has no remote yet",
    ))
}

/// Send half of a session, for use from another task.
#[derive(Debug, Clone)]
pub struct SessionSender {
    socket: Arc<UdpSocket>,
    remote: Address,
    drop_rate: DropRate,
}

impl SessionSender {
    pub fn remote(&self) -> &Address {
        &self.remote
    }

    pub async fn send(&self, bytes: &[u8]) -> Result<bool, TransportError> {
        send_lossy(&self.socket, &self.remote, bytes, self.drop_rate).await
    }
}

/// A socket on a well-known port that talks to anyone.
#[derive(Debug, Clone)]
pub struct UdpServer {
    socket: Arc<UdpSocket>,
    drop_rate: DropRate,
}

impl UdpServer {
    pub async fn bind(address: &Address, drop_rate: DropRate) -> Result<Self, TransportError> {
        let socket = udp_socket(address).await?;
        Ok(Self {
            socket: Arc::new(socket),
            drop_rate,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn receive(&self) -> Option<(Vec<u8>, Address)> {
        udp_receive(&self.socket).await
    }

    pub fn try_receive(&self) -> Option<(Vec<u8>, Address)> {
        udp_try_receive(&self.socket)
    }

    pub async fn send(&self, address: &Address, bytes: &[u8]) -> Result<bool, TransportError> {
        send_lossy(&self.socket, address, bytes, self.drop_rate).await
    }

    /// Waits for a datagram and opens a session with its sender, seeded with it.
    ///
    /// The session shares the server socket, so replies leave from the well-known port.
    pub async fn listen(&self) -> Option<UdpSession> {
        let (bytes, from) = self.receive().await?;
        debug!("Opening session for {}", from);
        Some(UdpSession::with_first_message(
            Arc::clone(&self.socket),
            from,
            bytes,
            self.drop_rate,
        ))
    }
}

/// A session bound to a known remote from the start.
#[derive(Debug)]
pub struct UdpClient {
    remote: Address,
    session: UdpSession,
}

impl UdpClient {
    pub async fn connect(remote: Address, drop_rate: DropRate) -> Result<Self, TransportError> {
        let local = match remote.resolve().await? {
            IpAddr::V4(_) => Address::any_local_port(),
            IpAddr::V6(_) => Address::from(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)),
        };
        let socket = udp_socket(&local).await?;
        debug!("Client session towards {}", remote);
        Ok(Self {
            session: UdpSession::new(Arc::new(socket), Some(remote.clone()), drop_rate),
            remote,
        })
    }

    pub fn remote(&self) -> &Address {
        &self.remote
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.session.local_addr()
    }

    pub async fn send(&mut self, bytes: &[u8]) -> Result<bool, TransportError> {
        self.session.send(bytes).await
    }

    pub async fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.session.receive().await
    }

    pub fn try_receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.session.try_receive()
    }

    pub fn sender(&self) -> SessionSender {
        SessionSender {
            socket: self.session.socket(),
            remote: self.remote.clone(),
            drop_rate: self.session.drop_rate,
        }
    }

    pub fn into_session(self) -> UdpSession {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_test::{assert_err, assert_ok};

    const WAIT: Duration = Duration::from_secs(2);

    async fn loopback_socket() -> UdpSocket {
        udp_socket(&Address::new("127.0.0.1", 0)).await.unwrap()
    }

    fn address_of(socket: &UdpSocket) -> Address {
        Address::from(socket.local_addr().unwrap())
    }

    #[test]
    fn test_address_parsing_and_display() {
        let address: Address = "localhost:12345".parse().unwrap();
        assert_eq!(address.host(), "localhost");
        assert_eq!(address.port(), 12345);
        assert_eq!(address.to_string(), "localhost:12345");

        let v6: Address = "[::1]:80".parse().unwrap();
        assert_eq!(v6.to_string(), "[::1]:80");

        assert_err!("localhost".parse::<Address>());
        assert_err!("localhost:notaport".parse::<Address>());
        assert_err!(":80".parse::<Address>());
    }

    #[test]
    fn test_address_equality_and_equivalence() {
        let by_name = Address::localhost(4000);
        let by_ip = Address::new("127.0.0.1", 4000);
        assert_ne!(by_name, by_ip);
        assert!(by_name.equivalent_to(&by_ip));
        assert!(!by_name.equivalent_to(&Address::new("127.0.0.1", 4001)));
        assert_eq!(by_name.ip().unwrap(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_drop_rate_bounds() {
        assert_ok!(DropRate::new(0.0));
        assert_ok!(DropRate::new(0.5));
        assert_err!(DropRate::new(1.0));
        assert_err!(DropRate::new(-0.1));
        assert!(!DropRate::NONE.should_drop());
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let a = loopback_socket().await;
        let b = loopback_socket().await;

        assert_eq!(udp_send(&a, &address_of(&b), b"ping").await.unwrap(), 4);
        let (bytes, from) = timeout(WAIT, udp_receive(&b)).await.unwrap().unwrap();
        assert_eq!(bytes, b"ping");
        assert!(from.equivalent_to(&address_of(&a)));
    }

    #[tokio::test]
    async fn test_oversized_payload_is_rejected() {
        let a = loopback_socket().await;
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let result = udp_send(&a, &address_of(&a), &payload).await;
        assert!(matches!(result, Err(TransportError::PayloadTooLarge(n)) if n == MAX_PAYLOAD + 1));
    }

    #[tokio::test]
    async fn test_try_receive_on_idle_socket() {
        let a = loopback_socket().await;
        assert!(udp_try_receive(&a).is_none());
    }

    #[tokio::test]
    async fn test_session_adopts_first_sender_and_rejects_others() {
        let local = Arc::new(loopback_socket().await);
        let mut session = UdpSession::new(Arc::clone(&local), None, DropRate::NONE);
        assert!(session.sender().is_none());

        let friend = loopback_socket().await;
        let stranger = loopback_socket().await;
        let target = address_of(&local);

        udp_send(&friend, &target, b"hello").await.unwrap();
        let first = timeout(WAIT, session.receive()).await.unwrap().unwrap();
        assert_eq!(first, Some(b"hello".to_vec()));
        assert!(session.remote().unwrap().equivalent_to(&address_of(&friend)));

        udp_send(&stranger, &target, b"intruder").await.unwrap();
        let result = timeout(WAIT, session.receive()).await.unwrap();
        assert!(matches!(result, Err(TransportError::UnexpectedSender { .. })));

        let sender = session.sender().unwrap();
        assert!(sender.send(b"reply").await.unwrap());
        let (bytes, _) = timeout(WAIT, udp_receive(&friend)).await.unwrap().unwrap();
        assert_eq!(bytes, b"reply");
        assert_eq!(session.stats(), (0, 1));
    }

    #[tokio::test]
    async fn test_session_counts_only_delivered_datagrams() {
        let local = Arc::new(loopback_socket().await);
        let peer = loopback_socket().await;
        let almost_always = DropRate::new(1.0 - f32::EPSILON / 2.0).unwrap();
        let mut session = UdpSession::new(local, Some(address_of(&peer)), almost_always);

        let mut delivered = 0;
        for _ in 0..20 {
            if session.send(b"lossy").await.unwrap() {
                delivered += 1;
            }
        }
        assert!(delivered < 20);
        assert_eq!(session.stats(), (delivered, 0));
    }

    #[tokio::test]
    async fn test_resolve_caches_without_blocking_lookup() {
        let address = Address::new("localhost", 9000);
        let ip = address.resolve().await.unwrap();
        assert!(ip.is_loopback());
        assert_eq!(address.ip().unwrap(), ip);
        assert_eq!(
            address.resolve_socket_addr().await.unwrap(),
            SocketAddr::new(ip, 9000)
        );

        let nowhere = Address::new("no-such-host.invalid", 9000);
        assert!(matches!(
            nowhere.resolve().await,
            Err(TransportError::Resolve(host)) if host == "no-such-host.invalid"
        ));
    }

    #[tokio::test]
    async fn test_session_without_remote_cannot_send() {
        let local = Arc::new(loopback_socket().await);
        let mut session = UdpSession::new(local, None, DropRate::NONE);
        assert_err!(session.send(b"nobody").await);
    }

    #[tokio::test]
    async fn test_server_listen_and_client_round_trip() {
        let server = UdpServer::bind(&Address::new("127.0.0.1", 0), DropRate::NONE)
            .await
            .unwrap();
        let port = server.local_addr().unwrap().port();

        let mut client = UdpClient::connect(Address::localhost(port), DropRate::NONE)
            .await
            .unwrap();
        assert!(client.send(b"join").await.unwrap());

        let mut session = timeout(WAIT, server.listen()).await.unwrap().unwrap();
        assert_eq!(session.receive().await.unwrap(), Some(b"join".to_vec()));

        assert!(session.send(b"welcome").await.unwrap());
        let reply = timeout(WAIT, client.receive()).await.unwrap().unwrap();
        assert_eq!(reply, Some(b"welcome".to_vec()));
        assert_eq!(client.remote().port(), port);
    }
}
