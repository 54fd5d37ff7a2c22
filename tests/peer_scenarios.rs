//! Deterministic multi-peer scenarios over an in-memory link.
//!
//! Every peer is a `PeerCore` driven by a synthetic clock, so timeouts and
//! retransmissions are exercised without sleeping.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reliant::prelude::*;
use reliant::protocol::HeaderType;

fn test_addr(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
}

const SERVER: u16 = 4000;
const CLIENT: ConnectionId = reliant::protocol::CLIENT_CONNECTION_ID;

type Filter = Box<dyn FnMut(SocketAddr, &Transmit) -> bool>;

struct Node {
    core: PeerCore,
    inbox: Vec<(SocketAddr, Vec<u8>)>,
    events: Vec<PeerEvent>,
}

/// Peers keyed by address, plus a delivery filter deciding what the link drops.
struct Network {
    nodes: HashMap<SocketAddr, Node>,
    filter: Filter,
    delivered: usize,
}

impl Network {
    fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            filter: Box::new(|_: SocketAddr, _: &Transmit| true),
            delivered: 0,
        }
    }

    fn add(&mut self, addr: SocketAddr, core: PeerCore) {
        self.nodes.insert(
            addr,
            Node {
                core,
                inbox: Vec::new(),
                events: Vec::new(),
            },
        );
    }

    fn core(&mut self, addr: SocketAddr) -> &mut PeerCore {
        &mut self.nodes.get_mut(&addr).unwrap().core
    }

    fn take_events(&mut self, addr: SocketAddr) -> Vec<PeerEvent> {
        std::mem::take(&mut self.nodes.get_mut(&addr).unwrap().events)
    }

    /// Move every queued transmit into its destination's inbox.
    fn route(&mut self) -> usize {
        let mut in_flight = Vec::new();
        for (addr, node) in self.nodes.iter_mut() {
            while let Some(transmit) = node.core.poll_transmit() {
                in_flight.push((*addr, transmit));
            }
        }
        let routed = in_flight.len();
        for (source, transmit) in in_flight {
            if !(self.filter)(source, &transmit) {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&transmit.destination) {
                node.inbox.push((source, transmit.contents));
                self.delivered += 1;
            }
        }
        routed
    }

    fn poll_all(&mut self, now: Instant) {
        for node in self.nodes.values_mut() {
            let inbox = std::mem::take(&mut node.inbox);
            node.core
                .poll(now, inbox.iter().map(|(from, d)| (*from, d.as_slice())));
            node.events.extend(node.core.drain_events());
        }
    }

    /// Exchange traffic at `now` until nothing more is sent.
    fn settle(&mut self, now: Instant) {
        self.poll_all(now);
        for _ in 0..16 {
            if self.route() == 0 {
                break;
            }
            self.poll_all(now);
        }
    }
}

fn server_core(config: TransportConfig) -> PeerCore {
    PeerCore::server(config).unwrap()
}

fn client_core(config: TransportConfig) -> PeerCore {
    PeerCore::client(config).unwrap()
}

/// Server plus one connected client.
fn connected_pair(config: TransportConfig, now: Instant) -> (Network, SocketAddr, SocketAddr) {
    let server = test_addr(SERVER);
    let client = test_addr(5001);
    let mut net = Network::new();
    net.add(server, server_core(config.clone()));
    net.add(client, client_core(config));

    net.core(client).connect(server, now).unwrap();
    net.settle(now);

    assert!(matches!(
        net.take_events(client).as_slice(),
        [PeerEvent::Connected { .. }]
    ));
    assert!(matches!(
        net.take_events(server).as_slice(),
        [PeerEvent::Connected { .. }]
    ));
    (net, server, client)
}

fn received_payloads(events: &[PeerEvent]) -> Vec<Vec<u8>> {
    events
        .iter()
        .filter_map(|e| match e {
            PeerEvent::DataReceived { payload, .. } => Some(payload.clone()),
            _ => None,
        })
        .collect()
}

fn disconnect_reasons(events: &[PeerEvent]) -> Vec<DisconnectReason> {
    events
        .iter()
        .filter_map(|e| match e {
            PeerEvent::Disconnected { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect()
}

#[test]
fn test_handshake_assigns_id() {
    let now = Instant::now();
    let (mut net, server, client) = connected_pair(TransportConfig::default(), now);

    assert_eq!(net.core(server).connection_count(), 1);
    assert_eq!(net.core(client).local_id(), Some(1));
    assert_eq!(
        net.core(client).connection(CLIENT).map(|c| c.state()),
        Some(ConnectionState::Connected)
    );
}

#[test]
fn test_server_full_rejects_second_client() {
    let now = Instant::now();
    let config = TransportConfig::builder().max_connections(1).build().unwrap();
    let server = test_addr(SERVER);
    let first = test_addr(5001);
    let second = test_addr(5002);

    let mut net = Network::new();
    net.add(server, server_core(config.clone()));
    net.add(first, client_core(config.clone()));
    net.add(second, client_core(config));

    net.core(first).connect(server, now).unwrap();
    net.settle(now);
    net.core(second).connect(server, now).unwrap();
    net.settle(now);

    assert_eq!(net.core(server).connection_count(), 1);
    assert_eq!(
        disconnect_reasons(&net.take_events(second)),
        vec![ErrorCode::Refused]
    );
    assert_eq!(
        net.core(second).reject_reason(),
        Some(RejectReason::ServerFull)
    );
    assert_eq!(net.core(second).connection_count(), 0);

    // The first client is unaffected.
    assert!(matches!(
        net.take_events(first).as_slice(),
        [PeerEvent::Connected { .. }]
    ));
}

#[test]
fn test_lost_reliable_is_retransmitted_once() {
    let now = Instant::now();
    let config = TransportConfig::builder()
        .retry_interval(Duration::from_millis(200))
        .build()
        .unwrap();
    let (mut net, server, client) = connected_pair(config, now);

    // Drop the first transmission of the ping only.
    let mut dropped = false;
    net.filter = Box::new(move |_: SocketAddr, transmit: &Transmit| {
        let is_ping = transmit.contents.first() == Some(&HeaderType::Reliable.as_byte());
        if is_ping && !dropped {
            dropped = true;
            return false;
        }
        true
    });

    net.core(client)
        .send(CLIENT, b"ping", DeliveryMode::Reliable, now)
        .unwrap();
    net.settle(now);
    assert!(received_payloads(&net.take_events(server)).is_empty());
    assert_eq!(
        net.core(client).connection(CLIENT).unwrap().reliability().len(),
        1
    );

    let retry = now + Duration::from_millis(200);
    net.settle(retry);

    assert_eq!(
        received_payloads(&net.take_events(server)),
        vec![b"ping".to_vec()]
    );
    let connection = net.core(client).connection(CLIENT).unwrap();
    assert!(connection.reliability().is_empty());
    assert_eq!(connection.stats().resends, 1);

    // Later resend events are stale and nothing else arrives.
    net.settle(retry + Duration::from_millis(1000));
    assert!(received_payloads(&net.take_events(server)).is_empty());
}

#[test]
fn test_duplicate_datagram_delivered_once() {
    let now = Instant::now();
    let (mut net, server, client) = connected_pair(TransportConfig::default(), now);

    net.core(client)
        .send(CLIENT, b"once", DeliveryMode::Notify, now)
        .unwrap();
    let transmit = net.core(client).poll_transmit().unwrap();

    let peer = net.core(server);
    peer.handle_datagram(client, &transmit.contents, now).unwrap();
    peer.handle_datagram(client, &transmit.contents, now).unwrap();

    let events = peer.drain_events();
    assert_eq!(
        events,
        vec![PeerEvent::DataReceived {
            connection: ConnectionId::new(1),
            mode: DeliveryMode::Notify,
            payload: b"once".to_vec(),
        }]
    );

    // Both copies were acknowledged.
    let acks = std::iter::from_fn(|| peer.poll_transmit())
        .filter(|t| t.contents.first() == Some(&HeaderType::Ack.as_byte()))
        .count();
    assert_eq!(acks, 2);
    assert_eq!(
        peer.connection(ConnectionId::new(1))
            .unwrap()
            .stats()
            .duplicates,
        1
    );
}

#[test]
fn test_late_copy_beyond_the_window_is_dropped() {
    let now = Instant::now();
    let (mut net, server, client) = connected_pair(TransportConfig::default(), now);

    net.core(client)
        .send(CLIENT, b"first", DeliveryMode::Reliable, now)
        .unwrap();
    let first = net.core(client).poll_transmit().unwrap();
    net.core(server)
        .handle_datagram(client, &first.contents, now)
        .unwrap();

    let mut delivered = received_payloads(&net.core(server).drain_events()).len();
    let mut sent = 1;
    while sent < 40_000 {
        let batch = (40_000 - sent).min(1000);
        for _ in 0..batch {
            net.core(client)
                .send(CLIENT, b"bulk", DeliveryMode::Reliable, now)
                .unwrap();
            sent += 1;
        }
        net.settle(now);
        delivered += received_payloads(&net.take_events(server)).len();
    }
    assert_eq!(sent, 40_000);
    assert_eq!(delivered, 40_000);
    assert!(net.core(client).connection(CLIENT).unwrap().reliability().is_empty());

    // Replay sequence 1 long after its wire value has wrapped out of reach.
    let peer = net.core(server);
    peer.handle_datagram(client, &first.contents, now).unwrap();
    assert!(peer.drain_events().is_empty());
    assert!(peer.poll_transmit().is_none());
    assert_eq!(
        peer.connection(ConnectionId::new(1))
            .unwrap()
            .stats()
            .out_of_range,
        1
    );

    net.core(client)
        .send(CLIENT, b"after", DeliveryMode::Reliable, now)
        .unwrap();
    net.settle(now);
    assert_eq!(
        received_payloads(&net.take_events(server)),
        vec![b"after".to_vec()]
    );
}

#[test]
fn test_zero_length_datagram_changes_nothing() {
    let now = Instant::now();
    let (mut net, server, client) = connected_pair(TransportConfig::default(), now);

    let err = net
        .core(server)
        .handle_datagram(client, &[], now)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidReceive);
    assert_eq!(net.core(server).connection_count(), 1);
    assert!(net.core(server).drain_events().is_empty());
}

#[test]
fn test_idle_connection_times_out() {
    let now = Instant::now();
    let config = TransportConfig::builder()
        .heartbeat_interval(Duration::from_millis(100))
        .timeout_multiplier(5)
        .build()
        .unwrap();
    let (mut net, server, client) = connected_pair(config, now);

    // Sever the link completely.
    net.filter = Box::new(|_: SocketAddr, _: &Transmit| false);

    let mut t = now;
    for _ in 0..5 {
        t += Duration::from_millis(100);
        net.settle(t);
    }
    assert!(disconnect_reasons(&net.take_events(client)).is_empty());

    net.settle(t + Duration::from_millis(1));
    assert_eq!(
        disconnect_reasons(&net.take_events(client)),
        vec![ErrorCode::Timeout]
    );
    assert_eq!(
        disconnect_reasons(&net.take_events(server)),
        vec![ErrorCode::Timeout]
    );
    assert_eq!(net.core(client).connection_count(), 0);
    assert_eq!(net.core(server).connection_count(), 0);
}

#[test]
fn test_heartbeats_keep_idle_connection_alive() {
    let now = Instant::now();
    let config = TransportConfig::builder()
        .heartbeat_interval(Duration::from_millis(100))
        .timeout_multiplier(3)
        .build()
        .unwrap();
    let (mut net, server, client) = connected_pair(config, now);

    let mut t = now;
    for _ in 0..50 {
        t += Duration::from_millis(50);
        net.settle(t);
    }

    assert!(net.take_events(client).is_empty());
    assert!(net.take_events(server).is_empty());
    assert_eq!(net.core(server).connection_count(), 1);
    assert!(net.delivered > 10);
}

#[test]
fn test_retry_ceiling_times_out() {
    let now = Instant::now();
    let config = TransportConfig::builder()
        .retry_interval(Duration::from_millis(100))
        .max_retries(3)
        .heartbeat_interval(Duration::from_secs(10))
        .build()
        .unwrap();
    let (mut net, _server, client) = connected_pair(config, now);

    net.filter = Box::new(|_: SocketAddr, _: &Transmit| false);
    net.core(client)
        .send(CLIENT, b"lost", DeliveryMode::Reliable, now)
        .unwrap();

    // Three resends at 100, 200 and 300 ms; the fourth event gives up.
    for step in 1..=3 {
        net.settle(now + Duration::from_millis(100 * step));
        assert!(net.take_events(client).is_empty());
    }
    net.settle(now + Duration::from_millis(400));

    assert_eq!(
        disconnect_reasons(&net.take_events(client)),
        vec![ErrorCode::Timeout]
    );
    assert_eq!(net.core(client).connection_count(), 0);
    assert_eq!(net.core(client).scheduled_len(), 0);
}

#[test]
fn test_handshake_times_out_without_server() {
    let now = Instant::now();
    let config = TransportConfig::builder()
        .heartbeat_interval(Duration::from_millis(100))
        .handshake_timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let client = test_addr(5001);
    let mut net = Network::new();
    net.add(client, client_core(config));

    net.core(client).connect(test_addr(SERVER), now).unwrap();

    // Connect is re-sent on every heartbeat while connecting.
    let mut connects = 0;
    let mut t = now;
    for _ in 0..4 {
        t += Duration::from_millis(100);
        net.core(client).poll(t, std::iter::empty());
        while let Some(transmit) = net.core(client).poll_transmit() {
            if transmit.contents == [HeaderType::Connect.as_byte()] {
                connects += 1;
            }
        }
    }
    // Initial Connect plus four retries.
    assert_eq!(connects, 5);
    assert!(net.core(client).drain_events().is_empty());

    net.core(client)
        .poll(now + Duration::from_millis(500), std::iter::empty());
    assert_eq!(
        disconnect_reasons(&net.core(client).drain_events()),
        vec![ErrorCode::Timeout]
    );
}

#[test]
fn test_lost_welcome_recovers() {
    let now = Instant::now();
    let config = TransportConfig::builder()
        .heartbeat_interval(Duration::from_millis(100))
        .build()
        .unwrap();
    let server = test_addr(SERVER);
    let client = test_addr(5001);
    let mut net = Network::new();
    net.add(server, server_core(config.clone()));
    net.add(client, client_core(config));

    let mut dropped = false;
    net.filter = Box::new(move |_: SocketAddr, transmit: &Transmit| {
        if transmit.contents.first() == Some(&HeaderType::Welcome.as_byte()) && !dropped {
            dropped = true;
            return false;
        }
        true
    });

    net.core(client).connect(server, now).unwrap();
    net.settle(now);
    assert!(net.take_events(client).is_empty());
    assert_eq!(net.take_events(server).len(), 1);

    net.settle(now + Duration::from_millis(100));
    assert!(matches!(
        net.take_events(client).as_slice(),
        [PeerEvent::Connected { .. }]
    ));
    // The server did not create a second connection.
    assert!(net.take_events(server).is_empty());
    assert_eq!(net.core(server).connection_count(), 1);
}

#[test]
fn test_local_close_and_grace_period() {
    let now = Instant::now();
    let config = TransportConfig::builder()
        .disconnect_grace(Duration::from_millis(100))
        .build()
        .unwrap();
    let (mut net, server, client) = connected_pair(config, now);

    net.core(client).close(CLIENT, now).unwrap();
    let err = net
        .core(client)
        .send(CLIENT, b"late", DeliveryMode::Reliable, now)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConnectionClosed);

    net.settle(now);
    // The server tears down as soon as Disconnect arrives.
    assert_eq!(
        disconnect_reasons(&net.take_events(server)),
        vec![ErrorCode::ConnectionClosed]
    );
    // The closing side waits out the grace period.
    assert!(net.take_events(client).is_empty());
    assert_eq!(
        net.core(client).connection(CLIENT).map(|c| c.state()),
        Some(ConnectionState::Disconnecting)
    );

    net.settle(now + Duration::from_millis(100));
    assert_eq!(
        disconnect_reasons(&net.take_events(client)),
        vec![ErrorCode::ConnectionClosed]
    );
    assert_eq!(net.core(client).connection_count(), 0);
}

#[test]
fn test_server_close_reaches_client() {
    let now = Instant::now();
    let (mut net, server, client) = connected_pair(TransportConfig::default(), now);

    net.core(server).close(ConnectionId::new(1), now).unwrap();
    net.settle(now);

    assert_eq!(
        disconnect_reasons(&net.take_events(client)),
        vec![ErrorCode::ConnectionClosed]
    );
    assert_eq!(net.core(client).connection_count(), 0);
}

#[test]
fn test_roster_announcements() {
    let now = Instant::now();
    let server = test_addr(SERVER);
    let first = test_addr(5001);
    let second = test_addr(5002);

    let mut net = Network::new();
    net.add(server, server_core(TransportConfig::default()));
    net.add(first, client_core(TransportConfig::default()));
    net.add(second, client_core(TransportConfig::default()));

    net.core(first).connect(server, now).unwrap();
    net.settle(now);
    net.take_events(first);
    net.core(second).connect(server, now).unwrap();
    net.settle(now);

    assert_eq!(
        net.take_events(first),
        vec![PeerEvent::ClientJoined { id: 2 }]
    );
    let second_events = net.take_events(second);
    assert!(second_events.contains(&PeerEvent::ClientJoined { id: 1 }));

    net.core(first).close(CLIENT, now).unwrap();
    net.settle(now);
    assert_eq!(net.take_events(second), vec![PeerEvent::ClientLeft { id: 1 }]);
}

#[test]
fn test_shutdown_notifies_everyone() {
    let now = Instant::now();
    let (mut net, server, client) = connected_pair(TransportConfig::default(), now);

    net.core(server).shutdown();
    assert_eq!(
        disconnect_reasons(&net.core(server).drain_events()),
        vec![ErrorCode::ConnectionClosed]
    );
    net.settle(now);

    assert_eq!(
        disconnect_reasons(&net.take_events(client)),
        vec![ErrorCode::ConnectionClosed]
    );
}

#[test]
fn test_socket_error_forces_unexpected() {
    let now = Instant::now();
    let (mut net, server, client) = connected_pair(TransportConfig::default(), now);

    net.core(server).on_socket_error(client);
    assert_eq!(
        disconnect_reasons(&net.core(server).drain_events()),
        vec![ErrorCode::Unexpected]
    );
}

#[test]
fn test_lossy_link_delivers_every_message_once() {
    let now = Instant::now();
    let config = TransportConfig::builder()
        .retry_interval(Duration::from_millis(50))
        .max_retries(60)
        .heartbeat_interval(Duration::from_millis(200))
        .timeout_multiplier(10)
        .build()
        .unwrap();
    let (mut net, server, client) = connected_pair(config, now);

    let mut rng = StdRng::seed_from_u64(0x5eed);
    net.filter = Box::new(move |_: SocketAddr, _: &Transmit| !rng.gen_bool(0.3));

    const MESSAGES: usize = 50;
    for i in 0..MESSAGES {
        let payload = format!("msg-{i}");
        net.core(client)
            .send(CLIENT, payload.as_bytes(), DeliveryMode::Reliable, now)
            .unwrap();
    }

    let mut received = Vec::new();
    let mut t = now;
    for _ in 0..400 {
        t += Duration::from_millis(10);
        net.settle(t);
        received.extend(received_payloads(&net.take_events(server)));
        if net.core(client).connection(CLIENT).unwrap().reliability().is_empty() {
            break;
        }
    }

    assert!(net
        .core(client)
        .connection(CLIENT)
        .unwrap()
        .reliability()
        .is_empty());
    assert_eq!(received.len(), MESSAGES);

    let mut expected: Vec<Vec<u8>> = (0..MESSAGES)
        .map(|i| format!("msg-{i}").into_bytes())
        .collect();
    expected.sort();
    received.sort();
    assert_eq!(received, expected);
}

#[test]
fn test_sequences_survive_wire_wrap() {
    let now = Instant::now();
    let (mut net, server, client) = connected_pair(TransportConfig::default(), now);

    // Push the sender past the 16-bit wire range in acknowledged batches.
    let total = 70_000u64;
    let mut delivered = 0;
    let mut sent = 0;
    while sent < total {
        for _ in 0..1000 {
            net.core(client)
                .send(CLIENT, b"", DeliveryMode::Notify, now)
                .unwrap();
            sent += 1;
        }
        net.settle(now);
        delivered += received_payloads(&net.take_events(server)).len() as u64;
    }

    assert_eq!(delivered, total);
    let connection = net.core(client).connection(CLIENT).unwrap();
    assert!(connection.reliability().is_empty());
    assert_eq!(connection.peek_sequence(), total + 1);
}
