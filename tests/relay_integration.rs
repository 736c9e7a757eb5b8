//! End-to-end relay behaviour over loopback TCP

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use game_relay::core::codec::PacketCodec;
use game_relay::core::packet::{Packet, PacketType};
use game_relay::core::types::SessionId;
use game_relay::protocol::handshake::parse_login;
use game_relay::service::{Registry, SessionHandler};
use game_relay::transport::{connect, RelayServer};
use game_relay::utils::metrics::Metrics;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

type Client = Framed<TcpStream, PacketCodec>;

const WAIT: Duration = Duration::from_secs(5);

struct TestRelay {
    addr: SocketAddr,
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
    task: JoinHandle<game_relay::Result<()>>,
}

async fn start_relay() -> TestRelay {
    let registry = Arc::new(Registry::new());
    let metrics = Arc::new(Metrics::new());
    let handler = SessionHandler::new(registry.clone(), metrics.clone(), 64);
    let server = RelayServer::bind_with("127.0.0.1:0", handler, Duration::from_secs(2))
        .await
        .expect("bind relay");
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(server.serve(shutdown.clone()));
    TestRelay {
        addr,
        registry,
        metrics,
        shutdown,
        task,
    }
}

async fn recv(client: &mut Client) -> Packet {
    timeout(WAIT, client.next())
        .await
        .expect("timed out waiting for a packet")
        .expect("connection closed")
        .expect("decode failed")
}

/// Connect and consume the welcome packet
async fn join(addr: SocketAddr) -> (Client, SessionId) {
    let mut client = connect(addr).await.expect("connect");
    let login = recv(&mut client).await;
    let id = parse_login(&login).expect("first packet must be LOGIN");
    (client, id)
}

fn body_with_id(id: u32, rest: &[u8]) -> Vec<u8> {
    let mut body = id.to_le_bytes().to_vec();
    body.extend_from_slice(rest);
    body
}

/// Poll until `check` holds or the wait runs out
async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn clients_receive_ascending_ids() {
    let relay = start_relay().await;

    let (_a, a) = join(relay.addr).await;
    let (_b, b) = join(relay.addr).await;
    let (_c, c) = join(relay.addr).await;

    assert_eq!((a, b, c), (SessionId(1), SessionId(2), SessionId(3)));
    assert_eq!(relay.registry.ids().unwrap(), vec![a, b, c]);
}

#[tokio::test]
async fn forged_move_is_rewritten_and_skips_sender() {
    let relay = start_relay().await;
    let (mut a, a_id) = join(relay.addr).await;
    let (mut b, b_id) = join(relay.addr).await;
    let (mut c, _) = join(relay.addr).await;

    let payload = [7u8; 12];
    a.send(Packet::new(PacketType::Move, body_with_id(99, &payload)))
        .await
        .unwrap();

    for client in [&mut b, &mut c] {
        let got = recv(client).await;
        assert_eq!(got.kind(), Some(PacketType::Move));
        assert_eq!(got.identity(), Some(a_id.get()));
        assert_eq!(&got.body[4..], &payload);
    }

    // b and c already have the move, so anything for a would be queued too
    assert!(timeout(Duration::from_millis(200), a.next()).await.is_err());

    let damage = Packet::new(PacketType::PlayerDamage, body_with_id(a_id.get(), &[50, 0]));
    b.send(damage.clone()).await.unwrap();

    assert_eq!(recv(&mut a).await, damage);
    assert_eq!(recv(&mut b).await, damage);
    assert_eq!(recv(&mut c).await, damage);
    assert_ne!(a_id, b_id);
    assert_eq!(relay.metrics.snapshot().identity_rewrites, 1);
}

#[tokio::test]
async fn attack_identity_is_enforced() {
    let relay = start_relay().await;
    let (mut a, _) = join(relay.addr).await;
    let (mut b, b_id) = join(relay.addr).await;

    b.send(Packet::new(PacketType::PlayerAttack, body_with_id(1, &[3])))
        .await
        .unwrap();

    let got = recv(&mut a).await;
    assert_eq!(got.kind(), Some(PacketType::PlayerAttack));
    assert_eq!(got.identity(), Some(b_id.get()));
    assert_eq!(got.body[4], 3);
}

#[tokio::test]
async fn unknown_types_pass_through_untouched() {
    let relay = start_relay().await;
    let (mut a, _) = join(relay.addr).await;
    let (mut b, _) = join(relay.addr).await;

    let update = Packet::new(PacketType::EnemyUpdate, vec![1, 2, 3]);
    let custom = Packet::new(42u32, Vec::new());
    a.send(update.clone()).await.unwrap();
    a.send(custom.clone()).await.unwrap();

    assert_eq!(recv(&mut b).await, update);
    assert_eq!(recv(&mut b).await, custom);
}

#[tokio::test]
async fn departed_client_does_not_block_others() {
    let relay = start_relay().await;
    let (mut a, _) = join(relay.addr).await;
    let (b, b_id) = join(relay.addr).await;
    let (mut c, _) = join(relay.addr).await;

    drop(b);
    let registry = relay.registry.clone();
    assert!(eventually(|| !registry.contains(b_id).unwrap()).await);

    let spawn = Packet::new(PacketType::EnemySpawn, vec![0u8; 20]);
    a.send(spawn.clone()).await.unwrap();
    assert_eq!(recv(&mut c).await, spawn);
    assert_eq!(relay.registry.len().unwrap(), 2);
}

#[tokio::test]
async fn oversized_declaration_drops_only_the_offender() {
    let relay = start_relay().await;
    let (mut a, _) = join(relay.addr).await;
    let (mut b, _) = join(relay.addr).await;

    let mut raw = TcpStream::connect(relay.addr).await.unwrap();
    let mut header = Vec::new();
    header.extend_from_slice(&5u32.to_le_bytes());
    header.extend_from_slice(&2000u32.to_le_bytes());
    raw.write_all(&header).await.unwrap();

    let metrics = relay.metrics.clone();
    assert!(eventually(|| metrics.snapshot().protocol_errors == 1).await);
    let registry = relay.registry.clone();
    assert!(eventually(|| registry.len().unwrap() == 2).await);

    let update = Packet::new(PacketType::EnemyUpdate, vec![4]);
    a.send(update.clone()).await.unwrap();
    assert_eq!(recv(&mut b).await, update);
}

#[tokio::test]
async fn move_without_identity_is_a_violation() {
    let relay = start_relay().await;
    let (_a, _) = join(relay.addr).await;
    let (mut b, b_id) = join(relay.addr).await;

    b.send(Packet::new(PacketType::Move, vec![1, 2])).await.unwrap();

    let closed = timeout(WAIT, b.next()).await.expect("relay kept the connection");
    assert!(!matches!(closed, Some(Ok(_))));
    let registry = relay.registry.clone();
    assert!(eventually(|| !registry.contains(b_id).unwrap()).await);
}

#[tokio::test]
async fn shutdown_disconnects_everyone() {
    let relay = start_relay().await;
    let (mut a, _) = join(relay.addr).await;
    let (mut b, _) = join(relay.addr).await;

    relay.shutdown.cancel();
    timeout(WAIT, relay.task)
        .await
        .expect("serve did not stop")
        .unwrap()
        .unwrap();

    for client in [&mut a, &mut b] {
        let next = timeout(WAIT, client.next()).await.expect("still connected");
        assert!(!matches!(next, Some(Ok(_))));
    }
    assert!(relay.registry.is_empty().unwrap());
    assert_eq!(relay.metrics.snapshot().sessions_active, 0);
}
