use std::collections::HashSet;
use std::sync::Arc;

use game_relay::core::packet::{Packet, PacketType};
use game_relay::core::types::SessionId;
use game_relay::service::{Peer, Registry, Relay};
use game_relay::utils::metrics::Metrics;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_registration_yields_unique_ids() {
    let registry = Arc::new(Registry::new());
    let tasks_n = 16usize;
    let per_task = 200usize;

    let mut tasks = JoinSet::new();
    for _ in 0..tasks_n {
        let registry = registry.clone();
        tasks.spawn(async move {
            let mut ids = Vec::with_capacity(per_task);
            for _ in 0..per_task {
                let (tx, _rx) = mpsc::channel(1);
                ids.push(registry.register(Peer::new(None, tx, CancellationToken::new())).unwrap());
            }
            ids
        });
    }

    let mut all = HashSet::new();
    while let Some(res) = tasks.join_next().await {
        for id in res.unwrap() {
            assert!(all.insert(id), "duplicate id {id}");
        }
    }

    assert_eq!(all.len(), tasks_n * per_task);
    assert_eq!(registry.len().unwrap(), tasks_n * per_task);
    let max = all.iter().map(|id| id.get()).max().unwrap();
    assert_eq!(max as usize, tasks_n * per_task);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn broadcasts_race_with_churn() {
    let registry = Arc::new(Registry::new());
    let metrics = Arc::new(Metrics::new());
    let relay = Relay::new(registry.clone(), metrics.clone());

    // one stable listener that must see every broadcast
    let (tx, mut stable_rx) = mpsc::channel(10_000);
    let stable = registry.register(Peer::new(None, tx, CancellationToken::new())).unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..4 {
        let registry = registry.clone();
        tasks.spawn(async move {
            for _ in 0..500 {
                let (tx, rx) = mpsc::channel(4);
                let id = registry.register(Peer::new(None, tx, CancellationToken::new())).unwrap();
                tokio::task::yield_now().await;
                assert!(registry.unregister(id).unwrap());
                drop(rx);
            }
        });
    }

    let broadcasts = 1_000usize;
    let sender = {
        let relay = relay.clone();
        tokio::spawn(async move {
            for i in 0..broadcasts {
                let packet = Packet::new(PacketType::EnemyUpdate, (i as u32).to_le_bytes().to_vec());
                relay.send_to_others(&packet, SessionId(u32::MAX)).unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
    sender.await.unwrap();

    let mut received = 0;
    while let Ok(packet) = stable_rx.try_recv() {
        assert_eq!(packet.kind(), Some(PacketType::EnemyUpdate));
        received += 1;
    }
    assert_eq!(received, broadcasts);
    assert_eq!(registry.ids().unwrap(), vec![stable]);
}
