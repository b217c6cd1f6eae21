//! An in-process [`Gateway`] implementation for the demo binary.
//!
//! Grounded on the teacher's `Publisher` (`room.rs`), which forwarded RTP
//! packets to subscribers over per-kind `tokio::sync::broadcast` channels;
//! here the same shape stands in for the "real" peer connection / RTP relay
//! transport this crate treats as an external collaborator (SPEC_FULL.md
//! §1). A real embedding gateway would implement `Gateway` against its own
//! `RTCPeerConnection` instead.

use crate::events::EventBus;
use crate::gateway::Gateway;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

/// One demo "peer connection": just a pair of broadcast channels a test
/// client (or the demo binary's own SSE bridge) can subscribe to.
pub struct DemoPeer {
    pub video_tx: broadcast::Sender<Vec<u8>>,
    pub audio_tx: broadcast::Sender<Vec<u8>>,
}

impl DemoPeer {
    pub fn new() -> Arc<Self> {
        let (video_tx, _) = broadcast::channel(300);
        let (audio_tx, _) = broadcast::channel(300);
        Arc::new(Self { video_tx, audio_tx })
    }
}

pub struct DemoGateway {
    events: EventBus,
    started_at: Instant,
}

impl DemoGateway {
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            started_at: Instant::now(),
        }
    }
}

impl Gateway for DemoGateway {
    type PeerHandle = Arc<DemoPeer>;

    fn relay_rtp(&self, peer: &Arc<DemoPeer>, is_video: bool, bytes: &[u8]) {
        let tx = if is_video { &peer.video_tx } else { &peer.audio_tx };
        let _ = tx.send(bytes.to_vec());
    }

    fn close_pc(&self, _peer: &Arc<DemoPeer>) {}

    fn monotonic_time_us(&self) -> i64 {
        self.started_at.elapsed().as_micros() as i64
    }

    fn push_event(&self, session_id: &str, transaction: &str, json: &str) {
        self.events.emit(session_id, transaction, json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_rtp_routes_by_direction() {
        let gateway = DemoGateway::new(EventBus::new());
        let peer = DemoPeer::new();
        let mut video_rx = peer.video_tx.subscribe();
        let mut audio_rx = peer.audio_tx.subscribe();

        gateway.relay_rtp(&peer, true, b"vframe");
        gateway.relay_rtp(&peer, false, b"aframe");

        assert_eq!(video_rx.try_recv().unwrap(), b"vframe");
        assert_eq!(audio_rx.try_recv().unwrap(), b"aframe");
    }

    #[test]
    fn monotonic_clock_does_not_go_backwards() {
        let gateway = DemoGateway::new(EventBus::new());
        let a = gateway.monotonic_time_us();
        let b = gateway.monotonic_time_us();
        assert!(b >= a);
    }
}
