//! # Discovery Announcer
//!
//! Periodically broadcasts an [`Announcement`] over UDP so clients on the
//! local network can find the relay without knowing its address. The
//! datagram is encoded once and resent unchanged every interval.
//!
//! Targets come from the configured broadcast addresses. With none
//! configured, the announcer sends to the directed broadcast address of
//! every non-loopback IPv4 interface, or to `255.255.255.255` when the host
//! has no such interface.
//!
//! A failed send is logged and retried on the next tick; discovery never
//! takes the relay down.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{DiscoveryConfig, ANNOUNCEMENT_SIZE, SERVER_NAME_FIELD};
use crate::error::Result;
use crate::protocol::discovery::Announcement;
use crate::utils::metrics::Metrics;

/// `tokio::time::interval` panics on a zero period
const MIN_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1);

pub struct DiscoveryAnnouncer {
    socket: UdpSocket,
    targets: Vec<SocketAddr>,
    datagram: [u8; ANNOUNCEMENT_SIZE],
    interval: std::time::Duration,
    metrics: Arc<Metrics>,
}

impl DiscoveryAnnouncer {
    /// Open a broadcast-capable socket advertising `game_port`
    pub async fn bind(
        config: &DiscoveryConfig,
        game_port: u16,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;

        if config.server_name.len() >= SERVER_NAME_FIELD {
            warn!(
                name = %config.server_name,
                max_bytes = SERVER_NAME_FIELD - 1,
                "Server name too long, it will be truncated"
            );
        }

        let addresses = if config.broadcast_addresses.is_empty() {
            interface_broadcasts()
        } else {
            config.broadcast_addresses.clone()
        };
        let targets = addresses
            .into_iter()
            .map(|ip| SocketAddr::new(ip, config.port))
            .collect();

        Ok(Self {
            socket,
            targets,
            datagram: Announcement::new(game_port, config.server_name.as_str()).to_bytes(),
            interval: config.interval,
            metrics,
        })
    }

    pub fn targets(&self) -> &[SocketAddr] {
        &self.targets
    }

    /// Send one announcement to every target. Returns how many sends
    /// succeeded.
    pub async fn announce_once(&self) -> usize {
        let mut sent = 0;
        for target in &self.targets {
            match self.socket.send_to(&self.datagram, *target).await {
                Ok(_) => {
                    sent += 1;
                    self.metrics.announcement_sent();
                }
                Err(e) => warn!(%target, error = %e, "Failed to send discovery broadcast"),
            }
        }
        debug!(sent, "Discovery announcement sent");
        sent
    }

    /// Announce immediately, then every interval, until `shutdown` fires
    #[instrument(name = "discovery", skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            targets = ?self.targets,
            interval = ?self.interval,
            "Discovery broadcasting"
        );

        let mut ticker = tokio::time::interval(self.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.announce_once().await;
                }
            }
        }
        info!("Discovery stopped");
    }
}

/// Directed broadcast address of every non-loopback IPv4 interface
fn interface_broadcasts() -> Vec<IpAddr> {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => broadcast_targets(
            interfaces
                .iter()
                .filter(|iface| !iface.is_loopback())
                .filter_map(|iface| match &iface.addr {
                    if_addrs::IfAddr::V4(v4) => Some((v4.ip, v4.netmask)),
                    if_addrs::IfAddr::V6(_) => None,
                }),
        ),
        Err(e) => {
            warn!(error = %e, "Failed to list network interfaces");
            broadcast_targets(std::iter::empty())
        }
    }
}

/// Broadcast address for each `(ip, netmask)` pair, first occurrence
/// order, or the limited broadcast address when there are none
fn broadcast_targets(interfaces: impl IntoIterator<Item = (Ipv4Addr, Ipv4Addr)>) -> Vec<IpAddr> {
    let mut targets: Vec<IpAddr> = Vec::new();
    for (ip, mask) in interfaces {
        let target = IpAddr::V4(directed_broadcast(ip, mask));
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    if targets.is_empty() {
        targets.push(IpAddr::V4(Ipv4Addr::BROADCAST));
    }
    targets
}

fn directed_broadcast(ip: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(mask))
}
