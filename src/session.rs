//! Playback session: the state this crate observes and mutates for a
//! single externally-owned peer connection (SPEC_FULL.md §3).

use crate::continuity::ContinuityContext;
use crate::gateway::Gateway;
use crate::recording::RecordingHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// One entry in the [`crate::control::SessionTable`].
///
/// The session table's mutex protects only the map itself; once a session
/// is looked up, further mutation goes through this struct's own
/// `recording` mutex, per the lock order in SPEC_FULL.md §5
/// (`sessions → session.rec_mutex`).
pub struct Session<G: Gateway> {
    pub id: String,
    pub peer: G::PeerHandle,

    /// If true, playback is always refused — this session is itself being
    /// recorded from, not a playback target.
    pub is_recorder: bool,

    pub active: AtomicBool,
    pub destroyed: AtomicBool,

    /// Transaction correlator captured by the most recent `start_playing`
    /// call, echoed back with the terminal lifecycle event.
    pub transaction: Mutex<String>,

    /// Per-direction splicing state. Survives across multiple playouts.
    pub continuity: Mutex<ContinuityContext>,

    /// The currently active (or just-finished) recording handle, if any.
    /// This is the "rec_mutex" referred to by the lock-order rule above.
    pub recording: Mutex<Option<RecordingHandle>>,
}

impl<G: Gateway> Session<G> {
    pub fn new(id: impl Into<String>, peer: G::PeerHandle, is_recorder: bool) -> Self {
        Self {
            id: id.into(),
            peer,
            is_recorder,
            active: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            transaction: Mutex::new(String::new()),
            continuity: Mutex::new(ContinuityContext::default()),
            recording: Mutex::new(None),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.active.store(false, Ordering::Release);
        if let Some(handle) = self.recording.lock().unwrap().as_ref() {
            handle.request_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct NullPeer;

    struct NullGateway;
    impl Gateway for NullGateway {
        type PeerHandle = NullPeer;
        fn relay_rtp(&self, _peer: &NullPeer, _is_video: bool, _bytes: &[u8]) {}
        fn close_pc(&self, _peer: &NullPeer) {}
        fn monotonic_time_us(&self) -> i64 {
            0
        }
        fn push_event(&self, _session_id: &str, _transaction: &str, _json: &str) {}
    }

    #[test]
    fn new_session_starts_inactive_and_alive() {
        let s: Session<NullGateway> = Session::new("sess-1", NullPeer, false);
        assert!(!s.is_active());
        assert!(!s.is_destroyed());
    }

    #[test]
    fn destroy_clears_active_and_sets_destroyed() {
        let s: Session<NullGateway> = Session::new("sess-1", NullPeer, false);
        s.set_active(true);
        s.destroy();
        assert!(s.is_destroyed());
        assert!(!s.is_active());
    }
}
