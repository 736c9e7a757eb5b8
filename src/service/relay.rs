//! # Relay Engine
//!
//! Fans a sanitized packet out to the registry. Each recipient gets a clone
//! of the packet (the body buffer is shared, not copied) pushed onto its
//! outbound queue; that session's writer task puts it on the wire.
//!
//! A recipient that cannot take the packet is logged and counted, and
//! delivery carries on with the rest. A recipient whose queue is full is
//! cancelled: its client must never see a stream with packets missing from
//! the middle. The relay never unregisters anyone: the recipient's
//! own session notices and tears itself down.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::packet::Packet;
use crate::core::types::SessionId;
use crate::error::Result;
use crate::protocol::sanitize::Route;
use crate::service::registry::Registry;
use crate::utils::metrics::Metrics;

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Relay {
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Relay {
    pub fn new(registry: Arc<Registry>, metrics: Arc<Metrics>) -> Self {
        Self { registry, metrics }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Send to every registered session except `origin`
    pub fn send_to_others(&self, packet: &Packet, origin: SessionId) -> Result<DeliveryReport> {
        self.fan_out(packet, Some(origin))
    }

    /// Send to every registered session
    pub fn send_to_all(&self, packet: &Packet) -> Result<DeliveryReport> {
        self.fan_out(packet, None)
    }

    /// Send along the route chosen by sanitization
    pub fn dispatch(
        &self,
        packet: &Packet,
        origin: SessionId,
        route: Route,
    ) -> Result<DeliveryReport> {
        match route {
            Route::Others => self.send_to_others(packet, origin),
            Route::All => self.send_to_all(packet),
        }
    }

    fn fan_out(&self, packet: &Packet, skip: Option<SessionId>) -> Result<DeliveryReport> {
        let mut report = DeliveryReport::default();

        self.registry.for_each(|id, peer| {
            if Some(id) == skip {
                return;
            }
            match peer.deliver(packet.clone()) {
                Ok(()) => report.delivered += 1,
                Err(reason) => {
                    report.failed += 1;
                    self.metrics.delivery_failed();
                    warn!(
                        recipient = %id,
                        peer = ?peer.addr(),
                        packet_type = packet.packet_type,
                        ?reason,
                        "Failed to relay packet"
                    );
                }
            }
        })?;

        self.metrics.packets_relayed(report.delivered as u64);
        debug!(
            packet_type = packet.packet_type,
            delivered = report.delivered,
            failed = report.failed,
            "Packet relayed"
        );
        Ok(report)
    }
}
