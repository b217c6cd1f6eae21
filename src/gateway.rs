//! The seam between this crate and its embedding real-time gateway.
//!
//! Everything the parser/scheduler/continuity engine need from the outside
//! world — relaying a packet, tearing down a peer connection, reading a
//! clock, and delivering a control-plane event — goes through this trait.
//! The gateway's RTP relay transport, peer-connection lifecycle, and
//! control-plane event delivery are explicitly external collaborators (see
//! SPEC_FULL.md §1); this crate only ever calls into them, never implements
//! them.

/// Implemented by the embedding gateway. `PeerHandle` is whatever opaque
/// identifier the gateway uses to address a live peer connection (for the
/// demo binary, a broadcast-channel sender; in a full gateway, typically an
/// `Arc<RTCPeerConnection>` or similar).
pub trait Gateway: Send + Sync + 'static {
    type PeerHandle: Clone + Send + Sync + 'static;

    /// Inject an RTP packet toward the given peer. Non-blocking, best
    /// effort — a dropped packet here is not reported back to the caller.
    fn relay_rtp(&self, peer: &Self::PeerHandle, is_video: bool, bytes: &[u8]);

    /// Request teardown of the peer connection associated with `peer`.
    fn close_pc(&self, peer: &Self::PeerHandle);

    /// A monotonic clock, in microseconds. Used for both pacing and the
    /// continuity engine's elapsed-time calculations.
    fn monotonic_time_us(&self) -> i64;

    /// Enqueue a control-plane event for delivery back to the embedder.
    /// `json` is always one of the three fixed strings from SPEC_FULL.md §6.
    fn push_event(&self, session_id: &str, transaction: &str, json: &str);
}
